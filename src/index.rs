use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::config::{Config, Scale};
use crate::disjoint_set::DisjointSet;
use crate::error::{Error, Result};
use crate::member::{Member, MemberId, PartitionId};
use crate::partition::{Partition, RangeStats, RankBounds};

/// A set of mergeable [`Partition`]s plus the implicit [`PartitionId::ALL`]
/// partition that mirrors every member.
///
/// Partition ids are handed out densely from 1. Merging two partitions keeps
/// both ids valid: each resolves to the survivor from then on.
///
/// A mutation is applied to the global partition first and then to the
/// member's home partition; if the second step fails the first is undone.
///
/// # Examples
///
/// ```
/// use ranked_partitions::{Config, MemberId, PartitionId, RankIndex};
///
/// let mut index = RankIndex::new(Config::new(2, 10))?;
/// index.add_member(PartitionId(1), MemberId(1), 4)?;
/// index.add_member(PartitionId(2), MemberId(2), 4)?;
/// index.promote(MemberId(2), 3)?;
///
/// let survivor = index.merge_partitions(PartitionId(1), PartitionId(2))?;
/// assert_eq!(index.partition_of(MemberId(2))?, survivor);
/// assert_eq!(index.range_stats(PartitionId(2), 0, 10, 4)?.total, 2);
/// assert_eq!(index.top_average_rank(PartitionId::ALL, 1)?, 3.0);
/// # Ok::<(), ranked_partitions::Error>(())
/// ```
#[derive(Debug)]
pub struct RankIndex {
    scale: Scale,
    all: Partition,
    partitions: DisjointSet<Partition>,
    homes: HashMap<MemberId, PartitionId>,
}

impl RankIndex {
    /// Builds an index with `config.partitions` empty partitions.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if the configuration does not validate.
    pub fn new(config: Config) -> Result<Self> {
        let scale = config.validate()?;
        let mut index = Self {
            scale,
            all: Partition::new(scale),
            partitions: DisjointSet::new(),
            homes: HashMap::new(),
        };
        for _ in 0..config.partitions {
            index.create_partition()?;
        }
        info!(scale = scale.get(), partitions = config.partitions, "built rank index");
        Ok(index)
    }

    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Number of partition ids handed out, including merged-away ones.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Number of members across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Adds an empty partition and returns its id.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] once the id space is exhausted.
    pub fn create_partition(&mut self) -> Result<PartitionId> {
        let id = u32::try_from(self.partitions.len() + 1).map_err(|_| Error::InvalidInput("too many partitions"))?;
        self.partitions.push(Partition::new(self.scale));
        debug!(partition = id, "created partition");
        Ok(PartitionId(id))
    }

    /// The partition currently answering for `id`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `id` was never handed out.
    pub fn partition(&self, id: PartitionId) -> Result<&Partition> {
        if id == PartitionId::ALL {
            return Ok(&self.all);
        }
        let root = self.partitions.root(self.ordinal(id)?);
        Ok(self.partitions.get(root))
    }

    /// Merges the partitions behind `a` and `b` and returns the id of the
    /// survivor. The partition holding more merged ids survives; on a tie it
    /// is `a`'s. Merging a partition with itself does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for [`PartitionId::ALL`] or an unknown id,
    /// [`Error::AllocationFailure`] if the merged partition cannot be built;
    /// both partitions are then unchanged.
    pub fn merge_partitions(&mut self, a: PartitionId, b: PartitionId) -> Result<PartitionId> {
        if a == PartitionId::ALL || b == PartitionId::ALL {
            return Err(Error::InvalidInput("the global partition cannot be merged"));
        }
        let (oa, ob) = (self.ordinal(a)?, self.ordinal(b)?);
        let survivor = self.partitions.union_with(oa, ob, |kept, gone| kept.absorb(gone))?;
        let survivor = to_id(survivor);
        debug!(%a, %b, %survivor, "merged partitions");
        Ok(survivor)
    }

    /// Adds a new, unranked member to `partition`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero id, an attribute outside the scale,
    /// or an unknown (or global) partition. [`Error::AlreadyExists`] if `id` is
    /// already a member of any partition.
    pub fn add_member(&mut self, partition: PartitionId, id: MemberId, attribute: u32) -> Result<()> {
        check_member(id)?;
        if partition == PartitionId::ALL {
            return Err(Error::InvalidInput("members cannot be added to the global partition"));
        }
        if !self.scale.contains(attribute) {
            return Err(Error::InvalidInput("attribute outside the scale"));
        }
        let ordinal = self.ordinal(partition)?;
        if self.homes.contains_key(&id) {
            return Err(Error::AlreadyExists(id));
        }
        self.homes.try_reserve(1).map_err(|_| Error::AllocationFailure)?;

        self.all.add(id, attribute)?;
        if let Err(e) = self.partitions.get_root_mut(ordinal).add(id, attribute) {
            self.all.remove(id)?;
            return Err(e);
        }
        self.homes.insert(id, partition);
        trace!(%id, %partition, attribute, "added member");
        Ok(())
    }

    /// Removes `id` from the index and returns its final state.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero id, [`Error::NotFound`] if `id` is
    /// not a member.
    pub fn remove_member(&mut self, id: MemberId) -> Result<Member> {
        let root = self.home_root(id)?;
        let older = self.all.older_unranked(id);
        let member = self.all.remove(id)?;
        if let Err(e) = self.partitions.get_mut(root).remove(id) {
            self.all.reinstate(member, older)?;
            return Err(e);
        }
        self.homes.remove(&id);
        trace!(%id, "removed member");
        Ok(member)
    }

    /// Raises the rank of `id` by `delta` and returns the updated member.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero id, a zero `delta` or a rank
    /// overflow, [`Error::NotFound`] if `id` is not a member.
    pub fn promote(&mut self, id: MemberId, delta: u64) -> Result<Member> {
        let root = self.home_root(id)?;
        let before = self.all.get(id).ok_or(Error::NotFound(id))?;
        let older = self.all.older_unranked(id);
        let member = self.all.promote(id, delta)?;
        if let Err(e) = self.partitions.get_mut(root).promote(id, delta) {
            self.all.remove(id)?;
            self.all.reinstate(before, older)?;
            return Err(e);
        }
        trace!(%id, delta, rank = member.rank(), "promoted member");
        Ok(member)
    }

    /// Replaces the attribute of `id`, returning the previous value.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero id or an attribute outside the
    /// scale, [`Error::NotFound`] if `id` is not a member.
    pub fn update_attribute(&mut self, id: MemberId, attribute: u32) -> Result<u32> {
        let root = self.home_root(id)?;
        let old = self.all.set_attribute(id, attribute)?;
        if let Err(e) = self.partitions.get_mut(root).set_attribute(id, attribute) {
            self.all.set_attribute(id, old)?;
            return Err(e);
        }
        trace!(%id, old, new = attribute, "updated attribute");
        Ok(old)
    }

    /// Current state of `id`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero id, [`Error::NotFound`] if `id` is
    /// not a member.
    pub fn member(&self, id: MemberId) -> Result<Member> {
        check_member(id)?;
        self.all.get(id).ok_or(Error::NotFound(id))
    }

    /// The partition `id` currently belongs to, after following merges.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a zero id, [`Error::NotFound`] if `id` is
    /// not a member.
    pub fn partition_of(&self, id: MemberId) -> Result<PartitionId> {
        check_member(id)?;
        let home = *self.homes.get(&id).ok_or(Error::NotFound(id))?;
        Ok(to_id(self.partitions.root(self.ordinal(home)?)))
    }

    /// Members of `partition` with rank in `[low, high]`, and how many of them
    /// have `attribute`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an unknown partition, an attribute outside
    /// the scale, or `low > high`. [`Error::InsufficientData`] if no member
    /// falls in the range.
    pub fn range_stats(&self, partition: PartitionId, low: u64, high: u64, attribute: u32) -> Result<RangeStats> {
        if !self.scale.contains(attribute) {
            return Err(Error::InvalidInput("attribute outside the scale"));
        }
        self.partition(partition)?.range_stats(low, high, attribute)
    }

    /// Average rank of the `m` highest-ranked members of `partition`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an unknown partition or `m == 0`,
    /// [`Error::InsufficientData`] if the partition has fewer than `m` members.
    pub fn top_average_rank(&self, partition: PartitionId, m: usize) -> Result<f64> {
        self.partition(partition)?.top_average_rank(m)
    }

    /// Floor and ceiling on how many of the top `m` members of `partition`
    /// have `attribute`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an unknown partition or an attribute outside
    /// the scale, [`Error::InsufficientData`] if the partition has fewer than
    /// `m` members.
    pub fn rank_bounds(&self, partition: PartitionId, m: usize, attribute: u32) -> Result<RankBounds> {
        if !self.scale.contains(attribute) {
            return Err(Error::InvalidInput("attribute outside the scale"));
        }
        self.partition(partition)?.rank_bounds(m, attribute)
    }

    fn ordinal(&self, id: PartitionId) -> Result<usize> {
        match (id.0 as usize).checked_sub(1) {
            Some(ordinal) if ordinal < self.partitions.len() => Ok(ordinal),
            _ => Err(Error::InvalidInput("unknown partition")),
        }
    }

    /// Ordinal of the root of the partition `id` was added to.
    fn home_root(&mut self, id: MemberId) -> Result<usize> {
        check_member(id)?;
        let home = *self.homes.get(&id).ok_or(Error::NotFound(id))?;
        let ordinal = self.ordinal(home)?;
        Ok(self.partitions.find(ordinal))
    }
}

fn check_member(id: MemberId) -> Result<()> {
    if id.0 == 0 {
        return Err(Error::InvalidInput("member id must be positive"));
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn to_id(ordinal: usize) -> PartitionId {
    // Ordinals come from `create_partition`, which checked the range.
    PartitionId(ordinal as u32 + 1)
}
