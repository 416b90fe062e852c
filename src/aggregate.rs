//! Combinable per-subtree summaries.
//!
//! An [`Aggregate`] is an abelian group over summaries of elements: it can be
//! built from a single element, added to and subtracted from other summaries.
//! The tree caches one per node, covering the node's whole subtree, and
//! derives prefix and range summaries by combining cached values.
//!
//! Subtraction is only defined to undo a matching earlier addition. It is used
//! to turn two prefix summaries into a range summary and never describes a
//! physical state with negative counts.

use std::ops::{AddAssign, SubAssign};

use crate::config::Scale;

/// An element that carries a rank and a bounded secondary attribute.
pub trait Ranked {
    fn rank(&self) -> u64;
    /// Secondary attribute in `[1, S]`.
    fn attribute(&self) -> u32;
}

/// An invertible, associative summary of a multiset of `T`.
pub trait Aggregate<T>: Clone + for<'a> AddAssign<&'a Self> + for<'a> SubAssign<&'a Self> {
    /// Construction-time parameters shared by every summary of one structure.
    type Domain: Copy;

    /// The summary of no elements.
    fn empty(domain: Self::Domain) -> Self;

    /// The summary of exactly `element`.
    fn of(element: &T, domain: Self::Domain) -> Self;

    /// Number of elements summarized.
    fn count(&self) -> usize;
}

/// Counters over the attribute domain `[1, S]`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Histogram {
    counts: Box<[u32]>,
}

impl Histogram {
    #[must_use]
    pub fn new(scale: Scale) -> Self {
        Self {
            counts: vec![0; scale.slots()].into_boxed_slice(),
        }
    }

    /// Returns the count at `attribute`, or zero outside the domain.
    #[must_use]
    pub fn get(&self, attribute: u32) -> usize {
        slot(attribute).and_then(|i| self.counts.get(i)).map_or(0, |&c| c as usize)
    }

    /// # Panics
    ///
    /// Panics if `attribute` is outside the domain.
    pub fn increment(&mut self, attribute: u32) {
        self.counts[index(attribute, self.counts.len())] += 1;
    }

    /// # Panics
    ///
    /// Panics if `attribute` is outside the domain.
    pub fn decrement(&mut self, attribute: u32) {
        self.counts[index(attribute, self.counts.len())] -= 1;
    }

    /// Sum over all slots.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    pub fn clear(&mut self) {
        self.counts.fill(0);
    }
}

fn slot(attribute: u32) -> Option<usize> {
    (attribute as usize).checked_sub(1)
}

fn index(attribute: u32, slots: usize) -> usize {
    match slot(attribute) {
        Some(i) if i < slots => i,
        _ => panic!("attribute {attribute} outside histogram domain [1, {slots}]"),
    }
}

impl AddAssign<&Histogram> for Histogram {
    fn add_assign(&mut self, other: &Histogram) {
        debug_assert_eq!(self.counts.len(), other.counts.len(), "histogram domains differ");
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }
}

impl SubAssign<&Histogram> for Histogram {
    fn sub_assign(&mut self, other: &Histogram) {
        debug_assert_eq!(self.counts.len(), other.counts.len(), "histogram domains differ");
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine -= theirs;
        }
    }
}

/// Count, rank sum and attribute histogram of a set of [`Ranked`] elements.
///
/// The rank sum is a `u128`: at most `usize::MAX` elements of rank at most
/// `u64::MAX` cannot overflow it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RankAggregate {
    count: usize,
    rank_sum: u128,
    histogram: Histogram,
}

impl RankAggregate {
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn rank_sum(&self) -> u128 {
        self.rank_sum
    }

    #[must_use]
    pub const fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Number of summarized elements whose attribute equals `attribute`.
    #[must_use]
    pub fn with_attribute(&self, attribute: u32) -> usize {
        self.histogram.get(attribute)
    }
}

impl<T: Ranked> Aggregate<T> for RankAggregate {
    type Domain = Scale;

    fn empty(scale: Scale) -> Self {
        Self {
            count: 0,
            rank_sum: 0,
            histogram: Histogram::new(scale),
        }
    }

    fn of(element: &T, scale: Scale) -> Self {
        let mut histogram = Histogram::new(scale);
        histogram.increment(element.attribute());
        Self {
            count: 1,
            rank_sum: u128::from(element.rank()),
            histogram,
        }
    }

    fn count(&self) -> usize {
        self.count
    }
}

impl AddAssign<&RankAggregate> for RankAggregate {
    fn add_assign(&mut self, other: &RankAggregate) {
        self.count += other.count;
        self.rank_sum += other.rank_sum;
        self.histogram += &other.histogram;
    }
}

impl SubAssign<&RankAggregate> for RankAggregate {
    fn sub_assign(&mut self, other: &RankAggregate) {
        self.count -= other.count;
        self.rank_sum -= other.rank_sum;
        self.histogram -= &other.histogram;
    }
}
