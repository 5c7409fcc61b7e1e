//! Tree-switching policies for the arborescence walks

use crate::hash::{node_hash, pair_hash, pick};
use clos_fabric::NodeId;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Decides which tree a walk starts on and which tree it switches to after
/// hitting a failed link
pub trait TreePolicy {
    /// Hop budget for a fabric of `node_count` nodes
    fn hop_limit(&self, node_count: usize) -> usize;

    fn initial_tree(&mut self) -> usize;

    /// Tree to continue on; `switches` already counts the current switch
    fn next_tree(&mut self, current: usize, switches: usize) -> usize;
}

/// Deterministic circular switching
#[derive(Debug, Clone)]
pub struct Circular {
    trees: usize,
    start: NodeId,
}

impl Circular {
    pub fn new(trees: usize, start: NodeId) -> Self {
        Self { trees, start }
    }
}

impl TreePolicy for Circular {
    fn hop_limit(&self, node_count: usize) -> usize {
        node_count
    }

    fn initial_tree(&mut self) -> usize {
        pick(node_hash(self.start), self.trees)
    }

    fn next_tree(&mut self, current: usize, _switches: usize) -> usize {
        (current + 1) % self.trees
    }
}

/// Random switching that never picks the tree it just left
#[derive(Debug, Clone)]
pub struct RandomNoBounce {
    trees: usize,
    start: NodeId,
    destination: NodeId,
    rng: ChaCha8Rng,
}

impl RandomNoBounce {
    pub fn new(trees: usize, start: NodeId, destination: NodeId, rng: ChaCha8Rng) -> Self {
        Self {
            trees,
            start,
            destination,
            rng,
        }
    }
}

impl TreePolicy for RandomNoBounce {
    fn hop_limit(&self, node_count: usize) -> usize {
        3 * node_count
    }

    fn initial_tree(&mut self) -> usize {
        pick(pair_hash(self.start, self.destination), self.trees)
    }

    fn next_tree(&mut self, current: usize, _switches: usize) -> usize {
        if self.trees < 2 {
            return current;
        }
        let drawn = self.rng.gen_range(0..self.trees - 1);
        if drawn >= current {
            drawn + 1
        } else {
            drawn
        }
    }
}

/// Switching order read from one row of a design schedule
#[derive(Debug, Clone)]
pub struct Scheduled<'a> {
    trees: usize,
    row: &'a [usize],
}

impl<'a> Scheduled<'a> {
    /// `row` must hold at least `trees` entries, each below `trees`
    pub fn new(trees: usize, row: &'a [usize]) -> Self {
        Self { trees, row }
    }
}

impl TreePolicy for Scheduled<'_> {
    fn hop_limit(&self, node_count: usize) -> usize {
        3 * node_count
    }

    fn initial_tree(&mut self) -> usize {
        self.row[0]
    }

    fn next_tree(&mut self, _current: usize, switches: usize) -> usize {
        self.row[switches % self.trees]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_circular_wraps() {
        let mut policy = Circular::new(3, NodeId(13));
        assert_eq!(policy.next_tree(0, 1), 1);
        assert_eq!(policy.next_tree(2, 5), 0);
        assert_eq!(policy.hop_limit(20), 20);
    }

    #[test]
    fn test_random_never_bounces() {
        let mut policy = RandomNoBounce::new(4, NodeId(13), NodeId(12), ChaCha8Rng::seed_from_u64(9));
        let mut current = policy.initial_tree();
        for s in 1..200 {
            let next = policy.next_tree(current, s);
            assert_ne!(next, current);
            assert!(next < 4);
            current = next;
        }
    }

    #[test]
    fn test_random_single_tree_stays() {
        let mut policy = RandomNoBounce::new(1, NodeId(13), NodeId(12), ChaCha8Rng::seed_from_u64(0));
        assert_eq!(policy.initial_tree(), 0);
        assert_eq!(policy.next_tree(0, 1), 0);
    }

    #[test]
    fn test_scheduled_follows_row() {
        let row = [2, 0, 1];
        let mut policy = Scheduled::new(3, &row);
        assert_eq!(policy.initial_tree(), 2);
        assert_eq!(policy.next_tree(2, 1), 0);
        assert_eq!(policy.next_tree(0, 2), 1);
        assert_eq!(policy.next_tree(1, 3), 2);
    }
}
