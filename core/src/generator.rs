//! Assignment table generator.
//!
//! For each stratum (or once, if unstratified):
//!   1. draw ceil(target_n * oversample / block_size) blocks from the
//!      catalog, with replacement, using that stratum's own RNG slot
//!   2. concatenate them in draw order
//!   3. number the rows and mark them unconsumed
//!
//! Strata are emitted stratum-major in the order given.

use crate::{
    block::{validate_block_size, BlockCatalog},
    error::{RandError, RandResult},
    rng::RngBank,
    table::{AssignmentRow, AssignmentTable},
    types::StratumLabel,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_BLOCK_SIZE: usize = 4;
pub const DEFAULT_OVERSAMPLE: f64 = 2.0;

/// Upper bound on rows generated for one stratum, and for a whole table.
pub const MAX_ROWS_PER_STRATUM: usize = 1_000_000;
pub const MAX_TABLE_ROWS: usize = 10_000_000;

/// Minimum zero-padding width for row numbers in identifiers.
const MIN_ID_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorParams {
    /// Participants the table must serve, per stratum.
    pub total_target_n:    usize,
    pub block_size:        usize,
    pub oversample_factor: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            total_target_n:    100,
            block_size:        DEFAULT_BLOCK_SIZE,
            oversample_factor: DEFAULT_OVERSAMPLE,
        }
    }
}

impl GeneratorParams {
    pub fn validate(&self) -> RandResult<()> {
        validate_block_size(self.block_size)?;
        if self.total_target_n == 0 {
            return Err(RandError::InvalidTargetSize);
        }
        if !self.oversample_factor.is_finite() || self.oversample_factor < 1.0 {
            return Err(RandError::InvalidOversample { factor: self.oversample_factor });
        }
        // Bounded in floating point so blocks_per_stratum() never
        // saturates its cast.
        let requested = self.total_target_n as f64 * self.oversample_factor;
        if requested > MAX_ROWS_PER_STRATUM as f64 {
            return Err(RandError::TableTooLarge { requested, max: MAX_ROWS_PER_STRATUM });
        }
        self.blocks_per_stratum()
            .checked_mul(self.block_size)
            .filter(|rows| *rows <= MAX_ROWS_PER_STRATUM + self.block_size)
            .ok_or(RandError::TableTooLarge { requested, max: MAX_ROWS_PER_STRATUM })?;
        Ok(())
    }

    /// Blocks drawn per stratum. Never fewer than needed to cover
    /// `total_target_n` rows.
    pub fn blocks_per_stratum(&self) -> usize {
        let wanted = (self.total_target_n as f64 * self.oversample_factor
            / self.block_size as f64)
            .ceil() as usize;
        let floor = self.total_target_n.div_ceil(self.block_size);
        wanted.max(floor)
    }

    pub fn rows_per_stratum(&self) -> usize {
        self.blocks_per_stratum().saturating_mul(self.block_size)
    }
}

/// One stratification variable and its levels, e.g. `site: [1, 2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratificationFactor {
    pub name:   String,
    pub levels: Vec<String>,
}

impl StratificationFactor {
    pub fn new(name: impl Into<String>, levels: &[&str]) -> Self {
        Self {
            name:   name.into(),
            levels: levels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "labels", rename_all = "snake_case")]
pub enum Strata {
    Unstratified,
    Stratified(Vec<StratumLabel>),
}

impl Strata {
    /// Cross every level of every factor. The last factor varies
    /// fastest; levels are joined with `_`.
    pub fn cross(factors: &[StratificationFactor]) -> RandResult<Self> {
        if factors.is_empty() || factors.iter().any(|f| f.levels.is_empty()) {
            return Err(RandError::EmptyStrata);
        }
        let labels = factors.iter().fold(vec![String::new()], |acc, factor| {
            acc.iter()
                .flat_map(|prefix| {
                    factor.levels.iter().map(move |level| {
                        if prefix.is_empty() {
                            level.clone()
                        } else {
                            format!("{prefix}_{level}")
                        }
                    })
                })
                .collect()
        });
        Ok(Self::Stratified(labels))
    }

    fn validate(&self) -> RandResult<()> {
        if let Self::Stratified(labels) = self {
            if labels.is_empty() {
                return Err(RandError::EmptyStrata);
            }
            let mut seen = HashSet::new();
            for label in labels {
                if label.trim().is_empty() {
                    return Err(RandError::BlankStratum);
                }
                if !seen.insert(label.as_str()) {
                    return Err(RandError::DuplicateStratum { label: label.clone() });
                }
            }
        }
        Ok(())
    }

    /// Stratum slots in generation order. `None` is the single
    /// unstratified partition.
    fn slots(&self) -> Vec<Option<StratumLabel>> {
        match self {
            Self::Unstratified => vec![None],
            Self::Stratified(labels) => labels.iter().cloned().map(Some).collect(),
        }
    }
}

/// Build an assignment table. Each stratum draws from its own RNG slot
/// of `RngBank::new(master_seed)`, indexed by its position in `strata`.
pub fn generate(
    params: &GeneratorParams,
    strata: &Strata,
    master_seed: u64,
) -> RandResult<AssignmentTable> {
    params.validate()?;
    strata.validate()?;

    let catalog = BlockCatalog::enumerate(params.block_size)?;
    let bank = RngBank::new(master_seed);
    let n_blocks = params.blocks_per_stratum();
    let width = digit_count(params.rows_per_stratum()).max(MIN_ID_WIDTH);

    let slots = strata.slots();
    let total_rows = slots
        .len()
        .checked_mul(params.rows_per_stratum())
        .filter(|total| *total <= MAX_TABLE_ROWS)
        .ok_or(RandError::TableTooLarge {
            requested: slots.len() as f64 * params.rows_per_stratum() as f64,
            max:       MAX_TABLE_ROWS,
        })?;
    let mut rows = Vec::with_capacity(total_rows);

    for (slot, stratum) in slots.iter().enumerate() {
        let mut rng = bank.for_slot(slot);
        let mut seq = 0usize;
        for _ in 0..n_blocks {
            for &treatment in catalog.draw(&mut rng).labels() {
                seq += 1;
                let identifier = match stratum {
                    Some(label) => format!("{label}-{seq:0width$}"),
                    None => format!("{seq:0width$}"),
                };
                rows.push(AssignmentRow {
                    identifier,
                    stratum: stratum.clone(),
                    treatment,
                    randomized: false,
                });
            }
        }
        log::debug!(
            "stratum={} slot={slot} blocks={n_blocks} rows={seq}",
            stratum.as_deref().unwrap_or("(none)")
        );
    }

    log::info!(
        "generated assignment table: strata={} rows={} block_size={} seed={master_seed}",
        slots.len(),
        rows.len(),
        params.block_size
    );

    Ok(AssignmentTable::new(rows, params.block_size, strata.clone()))
}

fn digit_count(n: usize) -> usize {
    n.max(1).ilog10() as usize + 1
}
