//! Change output decisions.

use tracing::debug;

use crate::error::{Stage, UtxoError};

/// Final split of the selected value between fee and change.
///
/// `selected_total == requested + fee + change` always holds. A `change` of
/// zero means the transaction carries no change output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePlan {
    pub fee: u64,
    pub change: u64,
}

impl ChangePlan {
    pub fn has_change_output(&self) -> bool {
        self.change > 0
    }
}

/// Decides whether leftover value becomes a change output or is folded
/// into the fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCalculator {
    dust_threshold: u64,
}

impl ChangeCalculator {
    pub fn new(dust_threshold: u64) -> Self {
        Self { dust_threshold }
    }

    pub fn dust_threshold(&self) -> u64 {
        self.dust_threshold
    }

    /// `selected_total - requested - fee`, failing when that is negative.
    pub fn change(&self, selected_total: u64, requested: u64, fee: u64) -> Result<u64, UtxoError> {
        let needed = requested.checked_add(fee).ok_or_else(|| {
            UtxoError::TransactionBuildError("amount plus fee overflows u64".to_string())
        })?;
        selected_total
            .checked_sub(needed)
            .ok_or(UtxoError::InsufficientFunds {
                needed,
                available: selected_total,
                stage: Stage::Fee,
            })
    }

    /// Split `selected_total` given the fee with a change output and the
    /// (smaller) fee without one.
    ///
    /// Change is kept only when it exceeds the dust threshold. Otherwise the
    /// remainder is folded into the fee and the change output is dropped.
    pub fn decide(
        &self,
        selected_total: u64,
        requested: u64,
        fee_with_change: u64,
        fee_without_change: u64,
    ) -> Result<ChangePlan, UtxoError> {
        if let Ok(change) = self.change(selected_total, requested, fee_with_change) {
            if change > self.dust_threshold {
                return Ok(ChangePlan {
                    fee: fee_with_change,
                    change,
                });
            }
        }

        self.change(selected_total, requested, fee_without_change)?;
        let fee = selected_total - requested;
        if fee > fee_without_change {
            debug!(
                folded = fee - fee_without_change,
                dust_threshold = self.dust_threshold,
                "folding sub-dust change into fee"
            );
        }
        Ok(ChangePlan { fee, change: 0 })
    }
}
