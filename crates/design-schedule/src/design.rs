//! Block designs

use crate::{Result, ScheduleError};
use serde::{Deserialize, Serialize};

/// Blocks of the projective plane of order 4, a (21, 5, 1) design.
/// Elements are numbered from 1.
const PROJECTIVE_PLANE_21: [[usize; 5]; 21] = [
    [3, 5, 8, 10, 11],
    [4, 11, 14, 16, 18],
    [3, 6, 12, 18, 20],
    [2, 5, 9, 17, 18],
    [1, 2, 11, 12, 13],
    [2, 10, 14, 19, 20],
    [1, 10, 15, 18, 21],
    [2, 6, 8, 16, 21],
    [8, 9, 12, 14, 15],
    [7, 9, 11, 20, 21],
    [7, 8, 13, 18, 19],
    [1, 5, 6, 7, 14],
    [4, 6, 9, 10, 13],
    [4, 5, 12, 19, 21],
    [3, 13, 14, 17, 21],
    [2, 3, 4, 7, 15],
    [6, 11, 15, 17, 19],
    [5, 13, 15, 16, 20],
    [7, 10, 12, 16, 17],
    [1, 4, 8, 17, 20],
    [1, 3, 9, 16, 19],
];

/// A block design over the universe `0..universe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDesign {
    universe: usize,
    blocks: Vec<Vec<usize>>,
}

impl BlockDesign {
    /// Build a symmetric, regular design: as many blocks as elements, equal
    /// block sizes, every element in the same number of blocks.
    pub fn new(universe: usize, blocks: Vec<Vec<usize>>) -> Result<Self> {
        let size = blocks.first().map(|b| b.len()).ok_or(ScheduleError::EmptyDesign)?;
        if blocks.len() != universe {
            return Err(ScheduleError::NotSymmetric {
                elements: universe,
                blocks: blocks.len(),
            });
        }

        let mut occurrences = vec![0usize; universe];
        for (i, block) in blocks.iter().enumerate() {
            if block.len() != size {
                return Err(ScheduleError::UnevenBlock {
                    block: i,
                    expected: size,
                    found: block.len(),
                });
            }
            let mut seen = vec![false; universe];
            for &x in block {
                if x >= universe || seen[x] {
                    return Err(ScheduleError::InvalidElement { block: i, element: x });
                }
                seen[x] = true;
                occurrences[x] += 1;
            }
        }

        if let Some((element, &found)) = occurrences.iter().enumerate().find(|&(_, &c)| c != size) {
            return Err(ScheduleError::NotRegular {
                element,
                expected: size,
                found,
            });
        }

        Ok(Self { universe, blocks })
    }

    /// Same as [`BlockDesign::new`] for blocks numbered from 1
    pub fn from_one_based(universe: usize, blocks: &[Vec<usize>]) -> Result<Self> {
        let blocks = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                block
                    .iter()
                    .map(|&x| {
                        x.checked_sub(1)
                            .ok_or(ScheduleError::InvalidElement { block: i, element: x })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(universe, blocks)
    }

    pub fn universe(&self) -> usize {
        self.universe
    }

    pub fn block_size(&self) -> usize {
        self.blocks.first().map(|b| b.len()).unwrap_or(0)
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    /// Each block replaced by the universe minus that block
    pub fn complement(&self) -> Result<Self> {
        let blocks = self
            .blocks
            .iter()
            .map(|block| {
                let mut member = vec![false; self.universe];
                for &x in block {
                    member[x] = true;
                }
                (0..self.universe).filter(|&x| !member[x]).collect()
            })
            .collect();
        Self::new(self.universe, blocks)
    }

    /// Every pair of elements shares exactly one block
    pub fn check_pairwise_balanced(&self) -> Result<()> {
        let n = self.universe;
        let mut shared = vec![0usize; n * n];
        for block in &self.blocks {
            for (i, &a) in block.iter().enumerate() {
                for &b in &block[i + 1..] {
                    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                    shared[lo * n + hi] += 1;
                }
            }
        }
        for a in 0..n {
            for b in a + 1..n {
                let found = shared[a * n + b];
                if found != 1 {
                    return Err(ScheduleError::NotPairwiseBalanced { a, b, found });
                }
            }
        }
        Ok(())
    }
}

/// The (21, 5, 1) projective plane of order 4, zero-based
pub fn projective_plane_21() -> BlockDesign {
    let blocks = PROJECTIVE_PLANE_21
        .iter()
        .map(|block| block.iter().map(|&x| x - 1).collect())
        .collect();
    BlockDesign { universe: 21, blocks }
}

/// Largest built-in design that fits `size` trees
pub fn builtin_design(size: usize) -> Option<BlockDesign> {
    match size {
        21.. => Some(projective_plane_21()),
        7..=20 => Some(fano_plane()),
        _ => None,
    }
}

/// The (7, 3, 1) Fano plane, zero-based
pub fn fano_plane() -> BlockDesign {
    let blocks = vec![
        vec![0, 1, 2],
        vec![0, 3, 4],
        vec![0, 5, 6],
        vec![1, 3, 5],
        vec![1, 4, 6],
        vec![2, 3, 6],
        vec![2, 4, 5],
    ];
    BlockDesign { universe: 7, blocks }
}
