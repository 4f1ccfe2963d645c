//! Transaction size and fee estimation.

use serde::{Deserialize, Serialize};

use crate::amount::FeeRate;
use crate::network::NetworkParameters;
use crate::script::ScriptKind;
use crate::size::ScriptSizeCatalog;

/// How the fee of a transaction is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// Charge `rate` against the estimated size.
    Rate(FeeRate),
    /// Pay exactly this many base units regardless of size.
    Exact(u64),
}

impl FeePolicy {
    pub fn fee_for_size(&self, bytes: u64) -> u64 {
        match self {
            FeePolicy::Rate(rate) => rate.fee_for_size(bytes),
            FeePolicy::Exact(fee) => *fee,
        }
    }
}

/// Estimates transaction size from the script kinds of its inputs and
/// outputs, using the worst-case sizes in [`ScriptSizeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimator {
    overhead_bytes: u64,
}

impl FeeEstimator {
    pub fn new(params: &NetworkParameters) -> Self {
        Self {
            overhead_bytes: params.tx_overhead_bytes,
        }
    }

    pub fn with_overhead(overhead_bytes: u64) -> Self {
        Self { overhead_bytes }
    }

    pub fn overhead_bytes(&self) -> u64 {
        self.overhead_bytes
    }

    /// `overhead + Σ input sizes + Σ output sizes`.
    pub fn estimate_size(&self, inputs: &[ScriptKind], outputs: &[ScriptKind]) -> u64 {
        let inputs: u64 = inputs
            .iter()
            .map(|kind| ScriptSizeCatalog::input_bytes(*kind))
            .sum();
        let outputs: u64 = outputs
            .iter()
            .map(|kind| ScriptSizeCatalog::output_bytes(*kind))
            .sum();
        self.overhead_bytes + inputs + outputs
    }

    /// Fee for a transaction with the given input and output kinds.
    pub fn estimate(&self, inputs: &[ScriptKind], outputs: &[ScriptKind], policy: FeePolicy) -> u64 {
        policy.fee_for_size(self.estimate_size(inputs, outputs))
    }
}
