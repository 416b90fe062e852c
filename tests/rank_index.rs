use std::collections::HashMap;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ranked_partitions::{Config, Error, MemberId, Partition, PartitionId, RangeStats, RankIndex};

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 2_000;

const PARTITIONS: u32 = 6;

fn index() -> RankIndex {
    RankIndex::new(Config::new(PARTITIONS, 3)).unwrap()
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[test]
fn unranked_members_answer_rank_zero() {
    let mut index = index();
    index.add_member(PartitionId(1), MemberId(1), 3).unwrap();
    index.add_member(PartitionId(1), MemberId(2), 3).unwrap();
    assert_eq!(index.range_stats(PartitionId(1), 0, 0, 3), Ok(RangeStats { matching: 2, total: 2 }));
}

#[test]
fn promotion_moves_the_average() {
    let mut index = index();
    index.add_member(PartitionId(1), MemberId(1), 3).unwrap();
    index.add_member(PartitionId(1), MemberId(2), 3).unwrap();
    index.promote(MemberId(1), 5).unwrap();
    assert_eq!(index.member(MemberId(1)).map(|m| m.rank()), Ok(5));
    assert_eq!(index.top_average_rank(PartitionId(1), 1), Ok(5.0));
    assert_eq!(index.top_average_rank(PartitionId(1), 2), Ok(2.5));
}

#[test]
fn merged_partitions_answer_together() {
    let mut index = index();
    index.add_member(PartitionId(1), MemberId(1), 2).unwrap();
    index.add_member(PartitionId(2), MemberId(2), 2).unwrap();
    index.promote(MemberId(1), 3).unwrap();
    index.promote(MemberId(2), 7).unwrap();

    let survivor = index.merge_partitions(PartitionId(1), PartitionId(2)).unwrap();
    assert_eq!(index.range_stats(survivor, 0, 10, 2).map(|s| s.total), Ok(2));
    // The retired id resolves to the survivor.
    assert_eq!(index.range_stats(PartitionId(2), 0, 10, 2).map(|s| s.total), Ok(2));
    assert_eq!(index.top_average_rank(PartitionId(2), 2), Ok(5.0));
}

#[test]
fn removing_sole_member_empties_partition() {
    let mut index = index();
    index.add_member(PartitionId(4), MemberId(9), 1).unwrap();
    index.remove_member(MemberId(9)).unwrap();
    assert!(matches!(index.top_average_rank(PartitionId(4), 1), Err(Error::InsufficientData(_))));
    assert!(matches!(index.top_average_rank(PartitionId::ALL, 1), Err(Error::InsufficientData(_))));
}

#[test]
fn removed_identity_can_return() {
    let mut index = index();
    index.add_member(PartitionId(1), MemberId(1), 1).unwrap();
    index.promote(MemberId(1), 4).unwrap();
    index.remove_member(MemberId(1)).unwrap();
    index.add_member(PartitionId(2), MemberId(1), 2).unwrap();
    let member = index.member(MemberId(1)).unwrap();
    assert_eq!((member.rank(), member.attribute()), (0, 2));
    assert_eq!(index.partition_of(MemberId(1)), Ok(PartitionId(2)));
}

// ─── Operations enum for driving randomized tests ────────────────────────────

#[derive(Debug, Clone)]
enum IndexOp {
    Add(u32, u64, u32),
    Remove(u64),
    Promote(u64, u64),
    Update(u64, u32),
    Merge(u32, u32),
    Range(u32, u64, u64, u32),
    TopAverage(u32, usize),
}

fn index_op_strategy() -> impl Strategy<Value = IndexOp> {
    let partition = 1..=PARTITIONS;
    let any_partition = 0..=PARTITIONS;
    let id = 1u64..200;
    prop_oneof![
        6 => (partition.clone(), id.clone(), 1u32..=3).prop_map(|(p, id, a)| IndexOp::Add(p, id, a)),
        2 => id.clone().prop_map(IndexOp::Remove),
        4 => (id.clone(), 1u64..5).prop_map(|(id, d)| IndexOp::Promote(id, d)),
        2 => (id, 1u32..=3).prop_map(|(id, a)| IndexOp::Update(id, a)),
        1 => (partition.clone(), partition).prop_map(|(a, b)| IndexOp::Merge(a, b)),
        3 => (any_partition.clone(), 0u64..20, 0u64..20, 1u32..=3).prop_map(|(p, l, h, a)| IndexOp::Range(p, l, h, a)),
        2 => (any_partition, 1usize..30).prop_map(|(p, m)| IndexOp::TopAverage(p, m)),
    ]
}

/// Partition labels merge like the index's partitions; members carry their
/// home label and `(rank, attribute)`.
struct Model {
    label: Vec<u32>,
    members: HashMap<u64, (u32, u64, u32)>,
}

impl Model {
    fn new() -> Self {
        Self {
            label: (0..=PARTITIONS).collect(),
            members: HashMap::new(),
        }
    }

    fn in_partition(&self, partition: u32) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.members
            .values()
            .filter(move |&&(home, _, _)| partition == 0 || self.label[home as usize] == self.label[partition as usize])
            .map(|&(_, rank, attribute)| (rank, attribute))
    }

    fn merge(&mut self, a: u32, b: u32) {
        let (la, lb) = (self.label[a as usize], self.label[b as usize]);
        for l in &mut self.label {
            if *l == lb {
                *l = la;
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Replays random operations across several partitions, including merges,
    /// against a naive model.
    #[test]
    fn index_ops_match_model(ops in proptest::collection::vec(index_op_strategy(), TEST_SIZE)) {
        let mut index = index();
        let mut model = Model::new();

        for op in &ops {
            match *op {
                IndexOp::Add(p, id, attribute) => {
                    let result = index.add_member(PartitionId(p), MemberId(id), attribute);
                    if model.members.contains_key(&id) {
                        prop_assert_eq!(result, Err(Error::AlreadyExists(MemberId(id))));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        model.members.insert(id, (p, 0, attribute));
                    }
                }
                IndexOp::Remove(id) => {
                    let expected = model.members.remove(&id).map(|(_, rank, _)| rank).ok_or(Error::NotFound(MemberId(id)));
                    prop_assert_eq!(index.remove_member(MemberId(id)).map(|m| m.rank()), expected);
                }
                IndexOp::Promote(id, delta) => {
                    let expected = match model.members.get_mut(&id) {
                        Some((_, rank, _)) => {
                            *rank += delta;
                            Ok(*rank)
                        }
                        None => Err(Error::NotFound(MemberId(id))),
                    };
                    prop_assert_eq!(index.promote(MemberId(id), delta).map(|m| m.rank()), expected);
                }
                IndexOp::Update(id, attribute) => {
                    let expected = match model.members.get_mut(&id) {
                        Some((_, _, attr)) => Ok(std::mem::replace(attr, attribute)),
                        None => Err(Error::NotFound(MemberId(id))),
                    };
                    prop_assert_eq!(index.update_attribute(MemberId(id), attribute), expected);
                }
                IndexOp::Merge(a, b) => {
                    let survivor = index.merge_partitions(PartitionId(a), PartitionId(b)).unwrap();
                    model.merge(a, b);
                    prop_assert_eq!(model.label[survivor.0 as usize], model.label[a as usize]);
                }
                IndexOp::Range(p, low, high, attribute) => {
                    let mut expected = RangeStats::default();
                    for (rank, attr) in model.in_partition(p) {
                        if (low..=high).contains(&rank) {
                            expected.total += 1;
                            expected.matching += usize::from(attr == attribute);
                        }
                    }
                    let actual = index.range_stats(PartitionId(p), low, high, attribute);
                    if low > high {
                        prop_assert_eq!(actual, Err(Error::InvalidInput("low rank above high rank")));
                    } else if expected.total == 0 {
                        prop_assert!(matches!(actual, Err(Error::InsufficientData(_))), "{:?}", actual);
                    } else {
                        prop_assert_eq!(actual, Ok(expected));
                    }
                }
                IndexOp::TopAverage(p, m) => {
                    let mut ranks: Vec<u64> = model.in_partition(p).map(|(rank, _)| rank).collect();
                    ranks.sort_unstable_by(|a, b| b.cmp(a));
                    #[allow(clippy::cast_precision_loss)]
                    let expected = (ranks.len() >= m).then(|| ranks[..m].iter().sum::<u64>() as f64 / m as f64);
                    prop_assert_eq!(index.top_average_rank(PartitionId(p), m).ok(), expected);
                }
            }
        }

        prop_assert_eq!(index.len(), model.members.len());
        for (&id, &(home, rank, attribute)) in &model.members {
            let member = index.member(MemberId(id)).unwrap();
            prop_assert_eq!((member.rank(), member.attribute()), (rank, attribute));
            let resolved = index.partition_of(MemberId(id)).unwrap();
            prop_assert_eq!(model.label[resolved.0 as usize], model.label[home as usize]);
        }
        // Each merged group is counted once, at the first id resolving to it.
        let resolved: Vec<&Partition> = (1..=PARTITIONS).map(|p| index.partition(PartitionId(p)).unwrap()).collect();
        let total: usize = resolved
            .iter()
            .enumerate()
            .filter(|&(i, p)| !resolved[..i].iter().any(|q| std::ptr::eq(*q, *p)))
            .map(|(_, p)| p.len())
            .sum();
        prop_assert_eq!(total, model.members.len());
    }
}
