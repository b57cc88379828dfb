//! Block catalog — every valid fixed-composition block for a block size.
//!
//! A block of size B holds exactly B/2 control and B/2 intervention
//! labels. The catalog is the full set of distinct orderings of that
//! multiset: C(B, B/2) entries (6 for B = 4). It is built once and
//! sampled with replacement.

use crate::{
    error::{RandError, RandResult},
    rng::StratumRng,
    types::Treatment,
};
use serde::{Deserialize, Serialize};

/// An immutable ordered sequence of treatment labels with an exact
/// 50/50 split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    labels: Vec<Treatment>,
}

impl Block {
    pub fn labels(&self) -> &[Treatment] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn intervention_count(&self) -> usize {
        self.labels.iter().filter(|t| **t == Treatment::Intervention).count()
    }

    pub fn control_count(&self) -> usize {
        self.labels.len() - self.intervention_count()
    }

    /// Compact form used in reports, e.g. `"CIIC"`.
    pub fn code(&self) -> String {
        self.labels
            .iter()
            .map(|t| match t {
                Treatment::Control      => 'C',
                Treatment::Intervention => 'I',
            })
            .collect()
    }
}

/// All distinct balanced blocks for one block size, in lexicographic
/// order (Control < Intervention).
#[derive(Debug, Clone)]
pub struct BlockCatalog {
    block_size: usize,
    blocks:     Vec<Block>,
}

impl BlockCatalog {
    /// Enumerate the catalog. Fails on zero or odd block sizes.
    pub fn enumerate(block_size: usize) -> RandResult<Self> {
        validate_block_size(block_size)?;

        let half = block_size / 2;
        let entries = binomial(block_size as u64, half as u64).unwrap_or(0) as usize;
        let mut blocks = Vec::with_capacity(entries);
        let mut current = Vec::with_capacity(block_size);
        extend_permutations(half, half, &mut current, &mut blocks);

        log::debug!("block catalog: size={block_size} entries={}", blocks.len());
        Ok(Self { block_size, blocks })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Draw one block uniformly at random, with replacement.
    pub fn draw(&self, rng: &mut StratumRng) -> &Block {
        let index = rng.next_u64_below(self.blocks.len() as u64) as usize;
        &self.blocks[index]
    }
}

/// Largest accepted block size. C(20, 10) = 184,756 catalog entries;
/// anything bigger is not a practical trial design.
pub const MAX_BLOCK_SIZE: usize = 20;

pub fn validate_block_size(block_size: usize) -> RandResult<()> {
    if block_size == 0 || block_size % 2 != 0 {
        return Err(RandError::InvalidBlockSize { block_size });
    }
    if block_size > MAX_BLOCK_SIZE {
        return Err(RandError::BlockSizeTooLarge { block_size, max: MAX_BLOCK_SIZE });
    }
    Ok(())
}

/// Binomial coefficient C(n, k), or `None` if it does not fit in a u64.
pub fn binomial(n: u64, k: u64) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc * (n - i) is divisible by (i + 1) at every step.
        acc = acc.checked_mul((n - i) as u128)? / (i as u128 + 1);
    }
    u64::try_from(acc).ok()
}

// Depth-first over remaining label counts; trying Control before
// Intervention yields lexicographic order and never emits duplicates.
fn extend_permutations(
    controls_left: usize,
    interventions_left: usize,
    current: &mut Vec<Treatment>,
    out: &mut Vec<Block>,
) {
    if controls_left == 0 && interventions_left == 0 {
        out.push(Block { labels: current.clone() });
        return;
    }
    if controls_left > 0 {
        current.push(Treatment::Control);
        extend_permutations(controls_left - 1, interventions_left, current, out);
        current.pop();
    }
    if interventions_left > 0 {
        current.push(Treatment::Intervention);
        extend_permutations(controls_left, interventions_left - 1, current, out);
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_small_values() {
        assert_eq!(binomial(4, 2), Some(6));
        assert_eq!(binomial(6, 3), Some(20));
        assert_eq!(binomial(2, 1), Some(2));
        assert_eq!(binomial(3, 5), Some(0));
    }

    #[test]
    fn binomial_overflow_is_none() {
        assert_eq!(binomial(64, 32), Some(1_832_624_140_942_590_534));
        assert_eq!(binomial(68, 34), None);
        assert_eq!(binomial(200, 100), None);
    }

    #[test]
    fn size_four_catalog_in_order() {
        let catalog = BlockCatalog::enumerate(4).unwrap();
        let codes: Vec<String> = catalog.blocks().iter().map(Block::code).collect();
        assert_eq!(codes, vec!["CCII", "CICI", "CIIC", "ICCI", "ICIC", "IICC"]);
    }
}
