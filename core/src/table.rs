//! Assignment table and its consumption protocol.
//!
//! A table is generated once, oversized, and consumed row by row as
//! participants enroll. Within a stratum, rows are handed out lowest
//! unconsumed index first.
//!
//! RULE: Single writer. `consume()` takes `&mut self` and nothing more;
//! if several people hand out assignments from one table they must
//! serialize access themselves. The table never locks and never
//! regenerates itself when a stratum runs dry.

use crate::{
    error::{RandError, RandResult},
    generator::Strata,
    simple::ArmCounts,
    types::{ParticipantId, StratumLabel, Treatment},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub identifier: ParticipantId,
    pub stratum:    Option<StratumLabel>,
    pub treatment:  Treatment,
    /// Flipped to true exactly once, when the row is handed out.
    pub randomized: bool,
}

/// What the statistician relays to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub identifier: ParticipantId,
    pub stratum:    Option<StratumLabel>,
    pub treatment:  Treatment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentTable {
    rows:       Vec<AssignmentRow>,
    block_size: usize,
    strata:     Strata,
}

impl AssignmentTable {
    pub(crate) fn new(rows: Vec<AssignmentRow>, block_size: usize, strata: Strata) -> Self {
        Self { rows, block_size, strata }
    }

    pub fn rows(&self) -> &[AssignmentRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn strata(&self) -> &Strata {
        &self.strata
    }

    /// Stratum keys in table order; `[None]` when unstratified.
    pub fn partitions(&self) -> Vec<Option<&str>> {
        match &self.strata {
            Strata::Unstratified => vec![None],
            Strata::Stratified(labels) => labels.iter().map(|l| Some(l.as_str())).collect(),
        }
    }

    /// Rows of one stratum, in consumption order.
    pub fn partition<'a>(
        &'a self,
        stratum: Option<&'a str>,
    ) -> impl Iterator<Item = &'a AssignmentRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.stratum.as_deref() == stratum)
    }

    /// The row the next `consume()` would hand out, without consuming it.
    pub fn next_available(&self, stratum: Option<&str>) -> RandResult<&AssignmentRow> {
        let index = self.next_index(stratum)?;
        Ok(&self.rows[index])
    }

    /// Hand out the lowest-indexed unconsumed row of the stratum and
    /// mark it randomized. Fails with `TableExhausted` rather than
    /// fabricating a row.
    pub fn consume(&mut self, stratum: Option<&str>) -> RandResult<Assignment> {
        let index = self.next_index(stratum)?;
        let row = &mut self.rows[index];
        row.randomized = true;
        log::debug!(
            "consumed {} stratum={} treatment={}",
            row.identifier,
            row.stratum.as_deref().unwrap_or("(none)"),
            row.treatment
        );
        Ok(Assignment {
            identifier: row.identifier.clone(),
            stratum:    row.stratum.clone(),
            treatment:  row.treatment,
        })
    }

    pub fn remaining(&self, stratum: Option<&str>) -> usize {
        self.partition(stratum).filter(|r| !r.randomized).count()
    }

    pub fn consumed(&self, stratum: Option<&str>) -> usize {
        self.partition(stratum).filter(|r| r.randomized).count()
    }

    pub fn arm_counts(&self, stratum: Option<&str>) -> ArmCounts {
        ArmCounts::tally(self.partition(stratum).map(|r| &r.treatment))
    }

    /// True when, in every stratum, every prefix whose length is a
    /// multiple of the block size is exactly balanced.
    pub fn is_block_balanced(&self) -> bool {
        self.partitions().into_iter().all(|stratum| {
            let mut counts = ArmCounts::default();
            self.partition(stratum).enumerate().all(|(i, row)| {
                match row.treatment {
                    Treatment::Intervention => counts.intervention += 1,
                    Treatment::Control      => counts.control += 1,
                }
                (i + 1) % self.block_size != 0 || counts.imbalance() == 0
            })
        })
    }

    fn next_index(&self, stratum: Option<&str>) -> RandResult<usize> {
        self.check_stratum(stratum)?;
        self.rows
            .iter()
            .position(|row| row.stratum.as_deref() == stratum && !row.randomized)
            .ok_or_else(|| RandError::TableExhausted {
                stratum: stratum.unwrap_or("(none)").to_string(),
            })
    }

    fn check_stratum(&self, stratum: Option<&str>) -> RandResult<()> {
        let known = self.partitions().contains(&stratum);
        if known {
            Ok(())
        } else {
            Err(RandError::UnknownStratum {
                label: stratum.unwrap_or("(none)").to_string(),
            })
        }
    }
}
