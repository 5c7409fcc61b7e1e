//! Schedule generation by repeated bipartite matching

use crate::{builtin_design, BlockDesign, DesignSchedule, Result, ScheduleError};
use petgraph::algo::maximum_matching;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use tracing::{debug, info};

/// Resolve a symmetric regular design into `block_size` rounds.
///
/// Returns one row per element; column `j` holds the block matched to that
/// element in round `j`. Matched incidences are removed before the next
/// round, so a row never repeats a block.
pub fn resolve(design: &BlockDesign) -> Result<Vec<Vec<usize>>> {
    let n = design.universe();
    let rounds = design.block_size();

    let mut graph: UnGraph<(), ()> = UnGraph::with_capacity(2 * n, n * rounds);
    let elements: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();
    let blocks: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();

    for (b, block) in design.blocks().iter().enumerate() {
        for &x in block {
            graph.add_edge(elements[x], blocks[b], ());
        }
    }

    let mut rows: Vec<Vec<usize>> = vec![Vec::with_capacity(rounds); n];
    for round in 0..rounds {
        let matching = maximum_matching(&graph);

        for (x, row) in rows.iter_mut().enumerate() {
            let mate = matching
                .mate(elements[x])
                .ok_or(ScheduleError::NoPerfectMatching { round, element: x })?;
            row.push(mate.index() - n);
        }

        for (x, row) in rows.iter().enumerate() {
            let edge = graph
                .find_edge(elements[x], blocks[row[round]])
                .ok_or(ScheduleError::NoPerfectMatching { round, element: x })?;
            graph.remove_edge(edge);
        }

        debug!(round, remaining = graph.edge_count(), "Resolved matching round");
    }

    Ok(rows)
}

/// Build the `n × n` schedule for a symmetric `(n, r, 1)` design given as
/// zero-based blocks: `r` rounds from the design, `n - r` rounds from its
/// complement.
pub fn build_schedule(universe_size: usize, base_blocks: &[Vec<usize>]) -> Result<DesignSchedule> {
    let design = BlockDesign::new(universe_size, base_blocks.to_vec())?;
    design.check_pairwise_balanced()?;

    let direct = resolve(&design)?;
    let complement = resolve(&design.complement()?)?;

    let rows = direct
        .into_iter()
        .zip(complement)
        .map(|(mut row, tail)| {
            row.extend(tail);
            row
        })
        .collect();

    let schedule = DesignSchedule::from_rows(rows)?;
    info!(
        rows = schedule.rows(),
        width = schedule.width(),
        "Built design schedule"
    );
    Ok(schedule)
}

/// Grow a schedule to `target × target`.
///
/// Missing rows are copies of randomly chosen existing rows. Every row then
/// gets the values `width..target` appended in an independent random order.
pub fn extend_matrix<R: Rng + ?Sized>(
    schedule: &DesignSchedule,
    target: usize,
    rng: &mut R,
) -> Result<DesignSchedule> {
    let rows = schedule.rows();
    let width = schedule.width();
    if target < rows || target < width {
        return Err(ScheduleError::TargetTooSmall { rows, width, target });
    }

    let mut extended: Vec<Vec<usize>> = schedule.iter_rows().map(|r| r.to_vec()).collect();

    let mut missing_rows = target - rows;
    while missing_rows > 0 {
        let take = missing_rows.min(rows);
        for r in index::sample(rng, rows, take) {
            extended.push(schedule.row(r).to_vec());
        }
        missing_rows -= take;
    }

    let mut missing: Vec<usize> = (width..target).collect();
    for row in extended.iter_mut() {
        missing.shuffle(rng);
        row.extend_from_slice(&missing);
    }

    debug!(from = rows, to = target, "Extended design schedule");
    DesignSchedule::from_rows(extended)
}

/// `trees × trees` schedule from the largest built-in design that fits
pub fn schedule_for<R: Rng + ?Sized>(trees: usize, rng: &mut R) -> Result<DesignSchedule> {
    let design = builtin_design(trees).ok_or(ScheduleError::TargetTooSmall {
        rows: 7,
        width: 7,
        target: trees,
    })?;
    let base = build_schedule(design.universe(), design.blocks())?;
    extend_matrix(&base, trees, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{fano_plane, projective_plane_21};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn sorted(row: &[usize]) -> Vec<usize> {
        let mut v = row.to_vec();
        v.sort_unstable();
        v
    }

    #[test]
    fn test_resolve_rounds_are_permutations() {
        let design = fano_plane();
        let rows = resolve(&design).unwrap();

        assert_eq!(rows.len(), 7);
        for round in 0..3 {
            let column: HashSet<usize> = rows.iter().map(|r| r[round]).collect();
            assert_eq!(column.len(), 7);
        }
        for (x, row) in rows.iter().enumerate() {
            for &b in row {
                assert!(design.blocks()[b].contains(&x));
            }
        }
    }

    #[test]
    fn test_build_schedule_projective_plane() {
        let design = projective_plane_21();
        let schedule = build_schedule(21, design.blocks()).unwrap();

        assert_eq!(schedule.rows(), 21);
        assert_eq!(schedule.width(), 21);
        assert_eq!(schedule.first_repeating_row(5), None);
        for row in schedule.iter_rows() {
            assert_eq!(sorted(row), (0..21).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_build_schedule_rejects_unbalanced() {
        let blocks = vec![vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 0]];
        assert!(matches!(
            build_schedule(4, &blocks),
            Err(ScheduleError::NotPairwiseBalanced { .. })
        ));
    }

    #[test]
    fn test_extend_to_forty() {
        let design = projective_plane_21();
        let schedule = build_schedule(21, design.blocks()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let extended = extend_matrix(&schedule, 40, &mut rng).unwrap();
        assert_eq!(extended.rows(), 40);
        assert_eq!(extended.width(), 40);
        assert!(extended.has_distinct_rows());
        for row in extended.iter_rows() {
            assert_eq!(sorted(row), (0..40).collect::<Vec<_>>());
            // the original prefix survives untouched
            assert!(schedule.iter_rows().any(|orig| orig == &row[..21]));
        }
    }

    #[test]
    fn test_extend_copies_do_not_alias() {
        let schedule = DesignSchedule::from_rows(vec![vec![0, 1], vec![1, 0]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut extended = extend_matrix(&schedule, 4, &mut rng).unwrap();

        let before: Vec<Vec<usize>> = extended.iter_rows().map(|r| r.to_vec()).collect();
        extended.row_mut(2)[3] = 99;

        for i in [0, 1, 3] {
            assert_eq!(extended.row(i), before[i].as_slice());
        }
        assert_eq!(schedule.row(0), &[0, 1]);
    }

    #[test]
    fn test_extend_many_more_rows_than_exist() {
        let schedule = DesignSchedule::from_rows(vec![vec![0, 1], vec![1, 0]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let extended = extend_matrix(&schedule, 7, &mut rng).unwrap();

        assert_eq!(extended.rows(), 7);
        assert!(extended.has_distinct_rows());
    }

    #[test]
    fn test_schedule_for_tree_counts() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let small = schedule_for(12, &mut rng).unwrap();
        assert_eq!((small.rows(), small.width()), (12, 12));
        assert!(small.has_distinct_rows());
        assert_eq!(small.max_entry(), Some(11));

        assert!(matches!(
            schedule_for(4, &mut rng),
            Err(ScheduleError::TargetTooSmall { target: 4, .. })
        ));
    }

    #[test]
    fn test_extend_rejects_shrinking() {
        let schedule = DesignSchedule::from_rows(vec![vec![0, 1], vec![1, 0]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            extend_matrix(&schedule, 1, &mut rng),
            Err(ScheduleError::TargetTooSmall { target: 1, .. })
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::design::fano_plane;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Fuzz: extension never repeats a tree index inside a row
        #[test]
        fn fuzz_extension_keeps_rows_distinct(seed in any::<u64>(), target in 7usize..30) {
            let design = fano_plane();
            let schedule = build_schedule(7, design.blocks()).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let extended = extend_matrix(&schedule, target, &mut rng).unwrap();
            prop_assert_eq!(extended.rows(), target);
            prop_assert_eq!(extended.width(), target);
            prop_assert!(extended.has_distinct_rows());
        }
    }
}
