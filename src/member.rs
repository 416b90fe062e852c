use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

use crate::aggregate::Ranked;

/// External identity of a member. Zero is reserved and never valid.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a partition inside a [`RankIndex`](crate::RankIndex).
///
/// A handle stays valid after its partition is merged away; it then resolves
/// to the surviving partition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// The implicit partition that holds every member of the index.
    pub const ALL: Self = Self(0);
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Ordering key of a member: rank first, identity breaks ties.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemberKey {
    pub rank: u64,
    pub id: MemberId,
}

/// A ranked element stored by a partition.
///
/// Equality and ordering only look at the [`MemberKey`]; the attribute is
/// payload carried into the aggregates.
#[derive(Clone, Copy, Debug)]
pub struct Member {
    key: MemberKey,
    attribute: u32,
}

impl Member {
    /// A fresh, unranked member.
    #[must_use]
    pub const fn new(id: MemberId, attribute: u32) -> Self {
        Self::with_rank(id, 0, attribute)
    }

    #[must_use]
    pub const fn with_rank(id: MemberId, rank: u64, attribute: u32) -> Self {
        Self {
            key: MemberKey { rank, id },
            attribute,
        }
    }

    #[must_use]
    pub const fn id(&self) -> MemberId {
        self.key.id
    }

    #[must_use]
    pub const fn key(&self) -> MemberKey {
        self.key
    }

    #[must_use]
    pub const fn rank(&self) -> u64 {
        self.key.rank
    }

    #[must_use]
    pub const fn attribute(&self) -> u32 {
        self.attribute
    }

    pub(crate) fn set_attribute(&mut self, attribute: u32) {
        self.attribute = attribute;
    }

    pub(crate) fn set_rank(&mut self, rank: u64) {
        self.key.rank = rank;
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Member {}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Borrow<MemberKey> for Member {
    fn borrow(&self) -> &MemberKey {
        &self.key
    }
}

impl Ranked for Member {
    fn rank(&self) -> u64 {
        self.key.rank
    }

    fn attribute(&self) -> u32 {
        self.attribute
    }
}
