//! Partitioned order-statistics index for ranked members.
//!
//! This crate stores members ordered by `(rank, id)` across mergeable
//! partitions and answers, in O(log n):
//!
//! - how many members in a rank range carry a given attribute
//!   ([`range_stats`](RankIndex::range_stats)),
//! - the average rank of the top `m` members
//!   ([`top_average_rank`](RankIndex::top_average_rank)),
//! - bounds on how many of the top `m` carry an attribute when ties straddle
//!   the cut ([`rank_bounds`](RankIndex::rank_bounds)).
//!
//! # Example
//!
//! ```
//! use ranked_partitions::{Config, MemberId, PartitionId, RankIndex};
//!
//! let mut index = RankIndex::new(Config::new(2, 10))?;
//! index.add_member(PartitionId(1), MemberId(1), 3)?;
//! index.add_member(PartitionId(1), MemberId(2), 3)?;
//!
//! let stats = index.range_stats(PartitionId(1), 0, 0, 3)?;
//! assert_eq!((stats.matching, stats.total), (2, 2));
//!
//! index.promote(MemberId(1), 5)?;
//! assert_eq!(index.top_average_rank(PartitionId(1), 1)?, 5.0);
//! assert_eq!(index.top_average_rank(PartitionId(1), 2)?, 2.5);
//! # Ok::<(), ranked_partitions::Error>(())
//! ```
//!
//! # Implementation
//!
//! Each [`Partition`] keeps unranked members on an O(1) linked list with an
//! attribute histogram, and ranked members in an [`OrderStatisticsTree`]: an
//! arena-backed AVL tree whose nodes cache a [`RankAggregate`] (count, rank
//! sum, attribute histogram) of their subtree. Range queries combine prefix
//! aggregates; merging two partitions rebuilds one balanced tree in linear
//! time. Partitions are unified through a [`DisjointSet`] so that every
//! partition id stays valid after a merge.

// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod aggregate;
mod config;
mod disjoint_set;
mod error;
mod index;
mod member;
mod partition;
mod raw;

pub mod fast_path;
pub mod tree;

pub use aggregate::{Aggregate, Histogram, RankAggregate, Ranked};
pub use config::{Config, MAX_SCALE, Scale};
pub use disjoint_set::DisjointSet;
pub use error::{Error, Result};
pub use fast_path::FastPathList;
pub use index::RankIndex;
pub use member::{Member, MemberId, MemberKey, PartitionId};
pub use partition::{Partition, RangeStats, RankBounds};
pub use raw::Handle;
pub use tree::{OrderStatisticsTree, Search, TreeError};
