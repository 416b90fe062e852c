//! The composite partition: unranked members on an O(1) list, ranked members in
//! an [`OrderStatisticsTree`], and an identity index over both.

use std::collections::HashMap;

use tracing::debug;

use crate::aggregate::{Histogram, RankAggregate};
use crate::config::Scale;
use crate::error::{Error, Result};
use crate::fast_path::FastPathList;
use crate::member::{Member, MemberId, MemberKey};
use crate::raw::Handle;
use crate::tree::{OrderStatisticsTree, TreeError};

/// Where a member of a partition is stored.
///
/// Tree members are located by key rather than by handle: removing a node with
/// two children moves its successor's element to another node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Location {
    FastPath(Handle),
    Tree(MemberKey),
}

/// Result of a rank-range query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RangeStats {
    /// Members in range whose attribute equals the queried value.
    pub matching: usize,
    /// Members in range.
    pub total: usize,
}

impl RangeStats {
    /// `100 * matching / total`; zero for an empty range.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.matching as f64 / self.total as f64
    }
}

/// Floor and ceiling on how many of the top `m` members carry an attribute,
/// taking ties at the `m`-th member's rank into account.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RankBounds {
    pub lower: usize,
    pub upper: usize,
}

/// A group of members answering rank-range and top-`m` queries in O(log n).
///
/// Members with rank zero sit on a [`FastPathList`] with an attribute
/// histogram; ranked members live in a tree ordered by `(rank, id)` whose
/// nodes cache a [`RankAggregate`].
///
/// # Examples
///
/// ```
/// use ranked_partitions::{MemberId, Partition, Scale};
///
/// let mut partition = Partition::new(Scale::new(5)?);
/// partition.add(MemberId(1), 3)?;
/// partition.add(MemberId(2), 3)?;
/// partition.promote(MemberId(1), 5)?;
///
/// assert_eq!(partition.top_average_rank(2)?, 2.5);
/// assert_eq!(partition.range_stats(0, 0, 3)?.total, 1);
/// # Ok::<(), ranked_partitions::Error>(())
/// ```
#[derive(Debug)]
pub struct Partition {
    scale: Scale,
    locations: HashMap<MemberId, Location>,
    fresh: FastPathList<Member>,
    fresh_histogram: Histogram,
    ranked: OrderStatisticsTree<Member, RankAggregate>,
    lowest: Option<MemberKey>,
    highest: Option<MemberKey>,
}

impl Partition {
    #[must_use]
    pub fn new(scale: Scale) -> Self {
        Self {
            scale,
            locations: HashMap::new(),
            fresh: FastPathList::new(),
            fresh_histogram: Histogram::new(scale),
            ranked: OrderStatisticsTree::new(scale),
            lowest: None,
            highest: None,
        }
    }

    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: MemberId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Number of members with rank zero.
    #[must_use]
    pub fn unranked_len(&self) -> usize {
        self.fresh.len()
    }

    /// Number of members with positive rank.
    #[must_use]
    pub fn ranked_len(&self) -> usize {
        self.ranked.len()
    }

    /// Key of the lowest-ranked member: the oldest unranked member if any,
    /// else the tree's minimum.
    #[must_use]
    pub const fn lowest(&self) -> Option<MemberKey> {
        self.lowest
    }

    /// Key of the highest-ranked member: the tree's maximum if any, else the
    /// newest unranked member.
    #[must_use]
    pub const fn highest(&self) -> Option<MemberKey> {
        self.highest
    }

    #[must_use]
    pub fn get(&self, id: MemberId) -> Option<Member> {
        match *self.locations.get(&id)? {
            Location::FastPath(h) => Some(*self.fresh.get(h)),
            Location::Tree(key) => self.ranked.handle_of(&key).map(|h| *self.ranked.get(h)),
        }
    }

    /// Unranked members first, then ranked members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Member> + '_ {
        self.fresh.iter().chain(self.ranked.iter())
    }

    /// Adds a new member with rank zero.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `attribute` is outside the scale,
    /// [`Error::AlreadyExists`] if `id` is already a member.
    pub fn add(&mut self, id: MemberId, attribute: u32) -> Result<()> {
        self.insert(Member::new(id, attribute))
    }

    /// Adds `member` at whatever rank it already carries.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn insert(&mut self, member: Member) -> Result<()> {
        if !self.scale.contains(member.attribute()) {
            return Err(Error::InvalidInput("attribute outside the scale"));
        }
        let id = member.id();
        if self.locations.contains_key(&id) {
            return Err(Error::AlreadyExists(id));
        }
        self.locations.try_reserve(1).map_err(|_| Error::AllocationFailure)?;

        let key = member.key();
        if member.rank() == 0 {
            let handle = self.fresh.push_front(member);
            self.fresh_histogram.increment(member.attribute());
            self.locations.insert(id, Location::FastPath(handle));
            // The oldest unranked member stays the minimum; the newest is the
            // maximum only while nothing is ranked.
            if self.lowest.is_none_or(|low| low.rank > 0) {
                self.lowest = Some(key);
            }
            if self.highest.is_none_or(|high| high.rank == 0) {
                self.highest = Some(key);
            }
        } else {
            self.ranked.insert(member).map_err(|e| tree_error(e, id))?;
            self.locations.insert(id, Location::Tree(key));
            if self.highest.is_none_or(|high| high.rank == 0 || high < key) {
                self.highest = Some(key);
            }
            if self.lowest.is_none_or(|low| low.rank > 0 && key < low) {
                self.lowest = Some(key);
            }
        }
        Ok(())
    }

    /// Removes and returns the member `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `id` is not a member.
    pub fn remove(&mut self, id: MemberId) -> Result<Member> {
        let location = self.locations.remove(&id).ok_or(Error::NotFound(id))?;
        let member = match location {
            Location::FastPath(h) => {
                let member = self.fresh.remove(h);
                self.fresh_histogram.decrement(member.attribute());
                member
            }
            Location::Tree(key) => self.ranked.remove(&key).map_err(|e| tree_error(e, id))?,
        };
        self.refresh_extremes();
        Ok(member)
    }

    /// The unranked member added just before `id`, if `id` is unranked and not
    /// the oldest. Together with [`reinstate`](Self::reinstate) this undoes a
    /// removal without reordering the fast path.
    pub(crate) fn older_unranked(&self, id: MemberId) -> Option<MemberId> {
        match self.locations.get(&id)? {
            Location::FastPath(h) => self.fresh.older(*h).map(|older| self.fresh.get(older).id()),
            Location::Tree(_) => None,
        }
    }

    /// Adds `member` back where it was: an unranked member goes just ahead of
    /// `older` (or at the back when `older` is `None`), a ranked one into the
    /// tree.
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert), plus [`Error::NotFound`] if `older` is not
    /// an unranked member.
    pub(crate) fn reinstate(&mut self, member: Member, older: Option<MemberId>) -> Result<()> {
        if member.rank() > 0 {
            return self.insert(member);
        }
        let id = member.id();
        if !self.scale.contains(member.attribute()) {
            return Err(Error::InvalidInput("attribute outside the scale"));
        }
        if self.locations.contains_key(&id) {
            return Err(Error::AlreadyExists(id));
        }
        let anchor = match older {
            Some(older) => match self.locations.get(&older) {
                Some(Location::FastPath(h)) => Some(*h),
                _ => return Err(Error::NotFound(older)),
            },
            None => None,
        };
        self.locations.try_reserve(1).map_err(|_| Error::AllocationFailure)?;

        let handle = self.fresh.insert_ahead_of(anchor, member);
        self.fresh_histogram.increment(member.attribute());
        self.locations.insert(id, Location::FastPath(handle));
        self.refresh_extremes();
        Ok(())
    }

    /// Raises the rank of `id` by `delta` and returns the updated member.
    ///
    /// An unranked member moves from the fast path into the tree; a ranked one
    /// is re-keyed. The new entry is inserted before the old one is dropped, so
    /// the member always has exactly one owner when this returns.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `delta` is zero or the rank would overflow,
    /// [`Error::NotFound`] if `id` is not a member.
    pub fn promote(&mut self, id: MemberId, delta: u64) -> Result<Member> {
        if delta == 0 {
            return Err(Error::InvalidInput("rank increase must be positive"));
        }
        let location = *self.locations.get(&id).ok_or(Error::NotFound(id))?;
        let mut member = self.get(id).ok_or(Error::NotFound(id))?;
        let rank = member.rank().checked_add(delta).ok_or(Error::InvalidInput("rank overflow"))?;
        member.set_rank(rank);

        self.ranked.insert(member).map_err(|e| tree_error(e, id))?;
        match location {
            Location::FastPath(h) => {
                let old = self.fresh.remove(h);
                self.fresh_histogram.decrement(old.attribute());
            }
            Location::Tree(key) => {
                self.ranked.remove(&key).map_err(|e| tree_error(e, id))?;
            }
        }
        self.locations.insert(id, Location::Tree(member.key()));
        self.refresh_extremes();
        Ok(member)
    }

    /// Replaces the attribute of `id`, returning the previous value.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `attribute` is outside the scale,
    /// [`Error::NotFound`] if `id` is not a member.
    pub fn set_attribute(&mut self, id: MemberId, attribute: u32) -> Result<u32> {
        if !self.scale.contains(attribute) {
            return Err(Error::InvalidInput("attribute outside the scale"));
        }
        match *self.locations.get(&id).ok_or(Error::NotFound(id))? {
            Location::FastPath(h) => {
                let member = self.fresh.get_mut(h);
                let old = member.attribute();
                member.set_attribute(attribute);
                self.fresh_histogram.decrement(old);
                self.fresh_histogram.increment(attribute);
                Ok(old)
            }
            Location::Tree(key) => {
                let h = self.ranked.handle_of(&key).ok_or(Error::NotFound(id))?;
                let old = self.ranked.get(h).attribute();
                self.ranked.update(h, |m| m.set_attribute(attribute));
                Ok(old)
            }
        }
    }

    /// Counts members with rank in `[low, high]`, and those among them whose
    /// attribute equals `attribute`. Never fails; an empty or inverted range
    /// counts zero.
    #[must_use]
    pub fn range_counts(&self, low: u64, high: u64, attribute: u32) -> RangeStats {
        let mut stats = RangeStats::default();
        if low == 0 {
            stats.total += self.fresh.len();
            stats.matching += self.fresh_histogram.get(attribute);
        }
        if high > 0 {
            let top = self.ranked.rightmost_where(|m| m.rank() <= high);
            let bottom = self.ranked.leftmost_where(|m| m.rank() >= low);
            match (bottom, top) {
                (Some(bottom), Some(top)) if self.ranked.get(bottom) <= self.ranked.get(top) => {
                    let range = self.ranked.range_aggregate(bottom, top);
                    stats.total += range.count();
                    stats.matching += range.with_attribute(attribute);
                }
                _ => {}
            }
        }
        stats
    }

    /// Like [`range_counts`](Self::range_counts), but reports a query that
    /// cannot match anything as an error.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `low > high`. [`Error::InsufficientData`] if
    /// the partition is empty, the range misses the partition's rank envelope,
    /// or no member falls in the range.
    pub fn range_stats(&self, low: u64, high: u64, attribute: u32) -> Result<RangeStats> {
        if low > high {
            return Err(Error::InvalidInput("low rank above high rank"));
        }
        let (Some(lowest), Some(highest)) = (self.lowest, self.highest) else {
            return Err(Error::InsufficientData("partition is empty"));
        };
        if high < lowest.rank || low > highest.rank {
            return Err(Error::InsufficientData("rank range outside the partition"));
        }
        let stats = self.range_counts(low, high, attribute);
        if stats.total == 0 {
            return Err(Error::InsufficientData("no members in rank range"));
        }
        Ok(stats)
    }

    /// Average rank of the `m` highest-ranked members.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `m` is zero, [`Error::InsufficientData`] if
    /// the partition has fewer than `m` members.
    #[allow(clippy::cast_precision_loss)]
    pub fn top_average_rank(&self, m: usize) -> Result<f64> {
        if m == 0 {
            return Err(Error::InvalidInput("m must be positive"));
        }
        if self.len() < m {
            return Err(Error::InsufficientData("fewer members than m"));
        }
        let sum = if self.ranked.len() <= m {
            // Every ranked member counts; the unranked remainder adds zero.
            self.ranked.total().rank_sum()
        } else {
            let (Some(kth), Some(top)) = (self.ranked.kth_from_top(m), self.ranked.rightmost()) else {
                unreachable!("tree holds more than m members");
            };
            self.ranked.range_aggregate(kth, top).rank_sum()
        };
        Ok(sum as f64 / m as f64)
    }

    /// Bounds on how many of the top `m` members have `attribute`.
    ///
    /// Members ranked strictly above the `m`-th member are always counted.
    /// Members tied with it fill the remaining quota, matching ones first for
    /// the upper bound and last for the lower bound.
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientData`] if the partition has fewer than `m` members.
    pub fn rank_bounds(&self, m: usize, attribute: u32) -> Result<RankBounds> {
        if m == 0 {
            return Ok(RankBounds::default());
        }
        if self.len() < m {
            return Err(Error::InsufficientData("fewer members than m"));
        }

        // `above`: ranked strictly higher than the m-th member. `tied`: same rank.
        let (above, tied) = if self.ranked.len() < m {
            let total = self.ranked.total();
            let above = RangeStats {
                matching: total.with_attribute(attribute),
                total: total.count(),
            };
            let tied = RangeStats {
                matching: self.fresh_histogram.get(attribute),
                total: self.fresh.len(),
            };
            (above, tied)
        } else {
            let Some(kth) = self.ranked.kth_from_top(m) else {
                unreachable!("tree holds at least m members");
            };
            let rank = self.ranked.get(kth).rank();
            let top = self.highest.map_or(rank, |k| k.rank);
            let above = if top > rank {
                self.range_counts(rank + 1, top, attribute)
            } else {
                RangeStats::default()
            };
            (above, self.range_counts(rank, rank, attribute))
        };

        let quota = m - above.total;
        let others = tied.total - tied.matching;
        Ok(RankBounds {
            lower: above.matching + quota.saturating_sub(others),
            upper: above.matching + quota.min(tied.matching),
        })
    }

    /// Moves every member of `other` into `self` and leaves `other` empty.
    ///
    /// Memory for the combined structures is reserved before anything moves;
    /// on [`Error::AllocationFailure`] both partitions are unchanged. Member
    /// identities must be disjoint.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if the scales differ, [`Error::AllocationFailure`]
    /// if memory cannot be reserved.
    pub fn absorb(&mut self, other: &mut Self) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.scale != other.scale {
            return Err(Error::InvalidInput("partitions have different scales"));
        }
        self.locations.try_reserve(other.len()).map_err(|_| Error::AllocationFailure)?;
        self.fresh.try_reserve(other.fresh.len()).map_err(|_| Error::AllocationFailure)?;
        let (before, incoming) = (self.len(), other.len());

        self.ranked.merge(&mut other.ranked).map_err(|_| Error::AllocationFailure)?;
        let locations = &mut self.locations;
        self.fresh
            .append(&mut other.fresh, |member, handle| {
                locations.insert(member.id(), Location::FastPath(handle));
            })
            .map_err(|_| Error::AllocationFailure)?;
        self.fresh_histogram += &other.fresh_histogram;
        for (id, location) in other.locations.drain() {
            if let Location::Tree(_) = location {
                self.locations.insert(id, location);
            }
        }
        other.clear();
        self.refresh_extremes();

        debug!(before, incoming, after = self.len(), "absorbed partition");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.locations.clear();
        self.fresh.clear();
        self.fresh_histogram.clear();
        self.ranked.clear();
        self.lowest = None;
        self.highest = None;
    }

    fn refresh_extremes(&mut self) {
        let tree_low = self.ranked.leftmost().map(|h| self.ranked.get(h).key());
        let tree_high = self.ranked.rightmost().map(|h| self.ranked.get(h).key());
        self.lowest = self.fresh.back().map(Member::key).or(tree_low);
        self.highest = tree_high.or_else(|| self.fresh.front().map(Member::key));
    }
}

fn tree_error(error: TreeError, id: MemberId) -> Error {
    match error {
        TreeError::AlreadyExists => Error::AlreadyExists(id),
        TreeError::NotFound => Error::NotFound(id),
        TreeError::AllocationFailure => Error::AllocationFailure,
    }
}
