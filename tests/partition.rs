use std::collections::HashMap;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ranked_partitions::{Error, Member, MemberId, Partition, RangeStats, RankBounds, Scale};

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 2_000;

const SCALE: u32 = 4;

fn scale() -> Scale {
    Scale::new(SCALE).unwrap()
}

// ─── Naive model ────────────────────────────────────────────────────────────

/// `id -> (rank, attribute)`.
#[derive(Default)]
struct Model(HashMap<u64, (u64, u32)>);

impl Model {
    fn range(&self, low: u64, high: u64, attribute: u32) -> RangeStats {
        let mut stats = RangeStats::default();
        for &(rank, attr) in self.0.values() {
            if (low..=high).contains(&rank) {
                stats.total += 1;
                stats.matching += usize::from(attr == attribute);
            }
        }
        stats
    }

    fn descending(&self) -> Vec<(u64, u32)> {
        let mut members: Vec<(u64, u32)> = self.0.values().copied().collect();
        members.sort_by(|a, b| b.0.cmp(&a.0));
        members
    }

    #[allow(clippy::cast_precision_loss)]
    fn top_average(&self, m: usize) -> Option<f64> {
        if m == 0 || m > self.0.len() {
            return None;
        }
        let sum: u64 = self.descending().iter().take(m).map(|&(rank, _)| rank).sum();
        Some(sum as f64 / m as f64)
    }

    fn bounds(&self, m: usize, attribute: u32) -> Option<RankBounds> {
        if m > self.0.len() {
            return None;
        }
        if m == 0 {
            return Some(RankBounds::default());
        }
        let members = self.descending();
        let cut = members[m - 1].0;
        let above: Vec<_> = members.iter().filter(|&&(rank, _)| rank > cut).collect();
        let tied: Vec<_> = members.iter().filter(|&&(rank, _)| rank == cut).collect();
        let above_matching = above.iter().filter(|&&&(_, a)| a == attribute).count();
        let tied_matching = tied.iter().filter(|&&&(_, a)| a == attribute).count();
        let quota = m - above.len();
        Some(RankBounds {
            lower: above_matching + quota.saturating_sub(tied.len() - tied_matching),
            upper: above_matching + quota.min(tied_matching),
        })
    }
}

// ─── Operations enum for driving randomized tests ────────────────────────────

#[derive(Debug, Clone)]
enum PartitionOp {
    Add(u64, u32),
    Remove(u64),
    Promote(u64, u64),
    SetAttribute(u64, u32),
    Range(u64, u64, u32),
    TopAverage(usize),
    Bounds(usize, u32),
}

fn id_strategy() -> impl Strategy<Value = u64> {
    1u64..300
}

fn attribute_strategy() -> impl Strategy<Value = u32> {
    1..=SCALE
}

fn partition_op_strategy() -> impl Strategy<Value = PartitionOp> {
    prop_oneof![
        6 => (id_strategy(), attribute_strategy()).prop_map(|(id, a)| PartitionOp::Add(id, a)),
        2 => id_strategy().prop_map(PartitionOp::Remove),
        5 => (id_strategy(), 1u64..6).prop_map(|(id, d)| PartitionOp::Promote(id, d)),
        2 => (id_strategy(), attribute_strategy()).prop_map(|(id, a)| PartitionOp::SetAttribute(id, a)),
        3 => (0u64..30, 0u64..30, attribute_strategy()).prop_map(|(l, h, a)| PartitionOp::Range(l, h, a)),
        2 => (0usize..40).prop_map(PartitionOp::TopAverage),
        2 => (0usize..40, attribute_strategy()).prop_map(|(m, a)| PartitionOp::Bounds(m, a)),
    ]
}

fn build(ops: &[PartitionOp], partition: &mut Partition, model: &mut Model) -> Result<(), TestCaseError> {
    for op in ops {
        match *op {
            PartitionOp::Add(id, attribute) => {
                let result = partition.add(MemberId(id), attribute);
                if model.0.contains_key(&id) {
                    prop_assert_eq!(result, Err(Error::AlreadyExists(MemberId(id))));
                } else {
                    prop_assert_eq!(result, Ok(()));
                    model.0.insert(id, (0, attribute));
                }
            }
            PartitionOp::Remove(id) => match model.0.remove(&id) {
                Some((rank, attribute)) => {
                    let member = partition.remove(MemberId(id)).unwrap();
                    prop_assert_eq!((member.rank(), member.attribute()), (rank, attribute));
                }
                None => prop_assert_eq!(partition.remove(MemberId(id)), Err(Error::NotFound(MemberId(id)))),
            },
            PartitionOp::Promote(id, delta) => match model.0.get_mut(&id) {
                Some((rank, _)) => {
                    *rank += delta;
                    prop_assert_eq!(partition.promote(MemberId(id), delta).map(|m| m.rank()), Ok(*rank));
                }
                None => prop_assert_eq!(partition.promote(MemberId(id), delta), Err(Error::NotFound(MemberId(id)))),
            },
            PartitionOp::SetAttribute(id, attribute) => match model.0.get_mut(&id) {
                Some((_, attr)) => {
                    let old = std::mem::replace(attr, attribute);
                    prop_assert_eq!(partition.set_attribute(MemberId(id), attribute), Ok(old));
                }
                None => prop_assert_eq!(
                    partition.set_attribute(MemberId(id), attribute),
                    Err(Error::NotFound(MemberId(id)))
                ),
            },
            PartitionOp::Range(low, high, attribute) => {
                let expected = model.range(low, high, attribute);
                prop_assert_eq!(partition.range_counts(low, high, attribute), expected);
                if low <= high {
                    prop_assert_eq!(partition.range_stats(low, high, attribute).is_ok(), expected.total > 0);
                }
            }
            PartitionOp::TopAverage(m) => {
                prop_assert_eq!(partition.top_average_rank(m).ok(), model.top_average(m));
            }
            PartitionOp::Bounds(m, attribute) => {
                prop_assert_eq!(partition.rank_bounds(m, attribute).ok(), model.bounds(m, attribute));
            }
        }
        prop_assert_eq!(partition.len(), model.0.len());
    }
    Ok(())
}

fn check_extremes(partition: &Partition, model: &Model) -> Result<(), TestCaseError> {
    let min_rank = model.0.values().map(|&(rank, _)| rank).min();
    let max_rank = model.0.values().map(|&(rank, _)| rank).max();
    prop_assert_eq!(partition.lowest().map(|k| k.rank), min_rank);
    prop_assert_eq!(partition.highest().map(|k| k.rank), max_rank);
    Ok(())
}

// ─── Core operations ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Replays random mutations and queries on a partition and a naive model
    /// and asserts identical results at every step.
    #[test]
    fn partition_ops_match_model(ops in proptest::collection::vec(partition_op_strategy(), TEST_SIZE)) {
        let mut partition = Partition::new(scale());
        let mut model = Model::default();
        build(&ops, &mut partition, &mut model)?;
        check_extremes(&partition, &model)?;

        for (&id, &(rank, attribute)) in &model.0 {
            let member = partition.get(MemberId(id)).unwrap();
            prop_assert_eq!((member.rank(), member.attribute()), (rank, attribute));
        }
        let unranked = model.0.values().filter(|&&(rank, _)| rank == 0).count();
        prop_assert_eq!(partition.unranked_len(), unranked);
        prop_assert_eq!(partition.ranked_len(), model.0.len() - unranked);
    }

    /// Splitting a rank range in two splits its counts in two.
    #[test]
    fn range_counts_are_additive(
        ops in proptest::collection::vec(partition_op_strategy(), 500),
        low in 0u64..30,
        split in 0u64..30,
        attribute in attribute_strategy(),
    ) {
        let mut partition = Partition::new(scale());
        let mut model = Model::default();
        build(&ops, &mut partition, &mut model)?;
        let Some(max_rank) = partition.highest().map(|k| k.rank) else {
            return Ok(());
        };
        let high = low + split;
        prop_assume!(high < max_rank);

        let whole = partition.range_counts(low, max_rank, attribute);
        let left = partition.range_counts(low, high, attribute);
        let right = partition.range_counts(high + 1, max_rank, attribute);
        prop_assert_eq!(left.total + right.total, whole.total);
        prop_assert_eq!(left.matching + right.matching, whole.matching);
    }

    /// Absorbing one partition into another behaves like the union of both.
    #[test]
    fn absorb_matches_union(
        ops_a in proptest::collection::vec(partition_op_strategy(), 500),
        ops_b in proptest::collection::vec(partition_op_strategy(), 500),
    ) {
        let mut a = Partition::new(scale());
        let mut model_a = Model::default();
        build(&ops_a, &mut a, &mut model_a)?;

        // Shift identities so both sides stay disjoint.
        let shifted: Vec<PartitionOp> = ops_b
            .iter()
            .map(|op| match *op {
                PartitionOp::Add(id, x) => PartitionOp::Add(id + 1000, x),
                PartitionOp::Remove(id) => PartitionOp::Remove(id + 1000),
                PartitionOp::Promote(id, x) => PartitionOp::Promote(id + 1000, x),
                PartitionOp::SetAttribute(id, x) => PartitionOp::SetAttribute(id + 1000, x),
                ref other => other.clone(),
            })
            .collect();
        let mut b = Partition::new(scale());
        let mut model_b = Model::default();
        build(&shifted, &mut b, &mut model_b)?;

        a.absorb(&mut b).unwrap();
        model_a.0.extend(model_b.0.drain());
        prop_assert!(b.is_empty());
        prop_assert_eq!(b.iter().count(), 0);
        check_extremes(&a, &model_a)?;

        // Keep mutating the merged partition to exercise the rebuilt indexes.
        build(&shifted, &mut a, &mut model_a)?;
        build(&ops_a, &mut a, &mut model_a)?;
        check_extremes(&a, &model_a)?;
    }
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[test]
fn unranked_members_fill_rank_zero() {
    let mut partition = Partition::new(scale());
    partition.add(MemberId(1), 3).unwrap();
    partition.add(MemberId(2), 3).unwrap();
    assert_eq!(partition.range_stats(0, 0, 3), Ok(RangeStats { matching: 2, total: 2 }));
    assert_eq!(partition.range_stats(0, 0, 3).map(|s| s.percent()), Ok(100.0));
}

#[test]
fn promotion_shifts_average() {
    let mut partition = Partition::new(scale());
    partition.add(MemberId(1), 3).unwrap();
    partition.add(MemberId(2), 3).unwrap();
    assert_eq!(partition.promote(MemberId(1), 5).map(|m| m.rank()), Ok(5));
    assert_eq!(partition.top_average_rank(1), Ok(5.0));
    assert_eq!(partition.top_average_rank(2), Ok(2.5));
}

#[test]
fn sole_member_removed() {
    let mut partition = Partition::new(scale());
    partition.insert(Member::with_rank(MemberId(1), 4, 1)).unwrap();
    partition.remove(MemberId(1)).unwrap();
    assert!(matches!(partition.top_average_rank(1), Err(Error::InsufficientData(_))));
    assert!(matches!(partition.range_stats(0, 10, 1), Err(Error::InsufficientData(_))));
}
