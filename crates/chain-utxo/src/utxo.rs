//! Unspent outputs and coin selection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::change::{ChangeCalculator, ChangePlan};
use crate::error::{Stage, UtxoError};
use crate::fee::{FeeEstimator, FeePolicy};
use crate::script::ScriptKind;
use crate::size::ScriptSizeCatalog;

/// Branch-and-bound gives up after visiting this many nodes.
const MAX_TRIES: usize = 100_000;

/// Above this many candidates branch-and-bound is skipped entirely.
const MAX_CANDIDATES: usize = 1_000;

/// A single unspent transaction output.
///
/// Deserializing goes through [`UnspentOutput::new`]; any serialized
/// `script_kind` is ignored and derived from the script again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUnspentOutput")]
pub struct UnspentOutput {
    /// Transaction id as hex in display (big-endian) order.
    pub txid: String,
    pub vout: u32,
    /// Value in base units.
    pub amount: u64,
    /// Serialized locking script.
    pub script_pubkey: Vec<u8>,
    pub script_kind: ScriptKind,
}

impl UnspentOutput {
    /// Build an output, classifying its locking script and checking the txid.
    pub fn new(
        txid: impl Into<String>,
        vout: u32,
        amount: u64,
        script_pubkey: Vec<u8>,
    ) -> Result<Self, UtxoError> {
        let txid = txid.into();
        parse_txid(&txid)?;
        let script_kind = ScriptKind::classify(&script_pubkey).ok_or_else(|| {
            UtxoError::EncodingFailure(format!(
                "output {txid}:{vout} has an unrecognised locking script"
            ))
        })?;
        Ok(Self {
            txid,
            vout,
            amount,
            script_pubkey,
            script_kind,
        })
    }

    /// Txid bytes in internal (little-endian) order, as serialized in inputs.
    pub fn txid_bytes(&self) -> Result<[u8; 32], UtxoError> {
        parse_txid(&self.txid)
    }
}

#[derive(Deserialize)]
struct RawUnspentOutput {
    txid: String,
    vout: u32,
    amount: u64,
    script_pubkey: Vec<u8>,
}

impl TryFrom<RawUnspentOutput> for UnspentOutput {
    type Error = UtxoError;

    fn try_from(raw: RawUnspentOutput) -> Result<Self, Self::Error> {
        Self::new(raw.txid, raw.vout, raw.amount, raw.script_pubkey)
    }
}

/// Parse a display-order hex txid into internal byte order.
pub fn parse_txid(txid: &str) -> Result<[u8; 32], UtxoError> {
    let bytes = hex::decode(txid)
        .map_err(|e| UtxoError::TransactionBuildError(format!("invalid txid {txid:?}: {e}")))?;
    let mut out: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        UtxoError::TransactionBuildError(format!("txid must be 32 bytes, got {}", b.len()))
    })?;
    out.reverse();
    Ok(out)
}

/// The spendable outputs of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnspentOutputSet {
    outputs: Vec<UnspentOutput>,
}

impl UnspentOutputSet {
    /// Collect outputs, keeping only the first occurrence of each outpoint.
    pub fn new(outputs: Vec<UnspentOutput>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(outputs.len());
        for output in outputs {
            if seen.insert((output.txid.to_ascii_lowercase(), output.vout)) {
                unique.push(output);
            } else {
                warn!(txid = %output.txid, vout = output.vout, "dropping duplicate outpoint");
            }
        }
        Self { outputs: unique }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UnspentOutput> {
        self.outputs.iter()
    }

    pub fn as_slice(&self) -> &[UnspentOutput] {
        &self.outputs
    }

    /// Sum of all output values.
    pub fn total(&self) -> Result<u64, UtxoError> {
        checked_total(self.outputs.iter())
    }

    /// Outputs ordered by amount descending, then txid and vout ascending.
    pub fn sorted_largest_first(&self) -> Vec<&UnspentOutput> {
        let mut sorted: Vec<&UnspentOutput> = self.outputs.iter().collect();
        sorted.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| cmp_txid(&a.txid, &b.txid))
                .then_with(|| a.vout.cmp(&b.vout))
        });
        sorted
    }
}

/// Case-insensitive txid ordering, consistent with outpoint dedup.
fn cmp_txid(a: &str, b: &str) -> std::cmp::Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

/// Sum output values, failing rather than wrapping or saturating.
pub(crate) fn checked_total<'a>(
    outputs: impl IntoIterator<Item = &'a UnspentOutput>,
) -> Result<u64, UtxoError> {
    outputs.into_iter().try_fold(0u64, |acc, o| {
        acc.checked_add(o.amount).ok_or_else(|| {
            UtxoError::TransactionBuildError("output values overflow u64".to_string())
        })
    })
}

impl FromIterator<UnspentOutput> for UnspentOutputSet {
    fn from_iter<I: IntoIterator<Item = UnspentOutput>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a UnspentOutputSet {
    type Item = &'a UnspentOutput;
    type IntoIter = std::slice::Iter<'a, UnspentOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.outputs.iter()
    }
}

/// Coin selection algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Take outputs from the largest down until the target and fee are covered.
    #[default]
    LargestFirst,
    /// Search for the subset giving the smallest transaction, falling back
    /// to largest-first when the search is too large or finds nothing.
    BranchAndBound,
}

/// What the selected inputs must pay for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTarget {
    pub amount: u64,
    pub destination: ScriptKind,
    pub change: ScriptKind,
    pub fee: FeePolicy,
}

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chosen outputs, largest first.
    pub chosen: Vec<UnspentOutput>,
    pub total: u64,
    pub estimated_fee: u64,
    pub change: u64,
}

impl Selection {
    pub fn input_kinds(&self) -> Vec<ScriptKind> {
        self.chosen.iter().map(|o| o.script_kind).collect()
    }
}

/// Fee for a payment, computed without building the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub fee: u64,
    pub estimated_size: u64,
    pub input_count: usize,
    /// Zero when no change output would be created.
    pub change: u64,
    /// False when the amount fits the balance but amount plus fee does not.
    /// The fee is then the cost of spending every output to one recipient.
    pub fully_funded: bool,
}

/// Picks the outputs that fund a transaction.
#[derive(Debug, Clone, Copy)]
pub struct CoinSelector {
    estimator: FeeEstimator,
    change: ChangeCalculator,
    strategy: SelectionStrategy,
}

struct Node {
    index: usize,
    chosen: Vec<usize>,
    total: u64,
    input_bytes: u64,
}

struct Candidate {
    size: u64,
    chosen: Vec<usize>,
    plan: ChangePlan,
}

impl CoinSelector {
    pub fn new(
        estimator: FeeEstimator,
        change: ChangeCalculator,
        strategy: SelectionStrategy,
    ) -> Self {
        Self {
            estimator,
            change,
            strategy,
        }
    }

    /// Choose outputs covering `target.amount` plus the fee for the
    /// resulting transaction. The fee depends on the number of inputs, so
    /// it is recomputed as outputs are added.
    pub fn select(
        &self,
        available: &UnspentOutputSet,
        target: &SelectionTarget,
    ) -> Result<Selection, UtxoError> {
        if target.amount == 0 {
            return Err(UtxoError::TransactionBuildError(
                "amount must be greater than zero".into(),
            ));
        }
        if available.is_empty() {
            return Err(UtxoError::InsufficientFunds {
                needed: target.amount,
                available: 0,
                stage: Stage::Selection,
            });
        }

        let sorted = available.sorted_largest_first();
        let selection = match self.strategy {
            SelectionStrategy::LargestFirst => self.largest_first(&sorted, target)?,
            SelectionStrategy::BranchAndBound => match self.branch_and_bound(&sorted, target) {
                Some(selection) => selection,
                None => {
                    debug!("branch and bound found no solution, using largest first");
                    self.largest_first(&sorted, target)?
                }
            },
        };

        debug!(
            strategy = ?self.strategy,
            inputs = selection.chosen.len(),
            total = selection.total,
            fee = selection.estimated_fee,
            change = selection.change,
            "selected inputs"
        );
        Ok(selection)
    }

    /// Quote the fee for paying `target.amount`.
    ///
    /// Unlike [`CoinSelector::select`], a balance that covers the amount but
    /// not the fee is not an error: the quote then spends every output to a
    /// single recipient so the caller can reduce the amount by the fee.
    pub fn quote(
        &self,
        available: &UnspentOutputSet,
        target: &SelectionTarget,
    ) -> Result<FeeQuote, UtxoError> {
        let total = available.total()?;
        if target.amount > total {
            return Err(UtxoError::InsufficientFunds {
                needed: target.amount,
                available: total,
                stage: Stage::Selection,
            });
        }

        match self.select(available, target) {
            Ok(selection) => {
                let kinds = selection.input_kinds();
                let outputs: &[ScriptKind] = if selection.change > 0 {
                    &[target.destination, target.change]
                } else {
                    &[target.destination]
                };
                Ok(FeeQuote {
                    fee: selection.estimated_fee,
                    estimated_size: self.estimator.estimate_size(&kinds, outputs),
                    input_count: kinds.len(),
                    change: selection.change,
                    fully_funded: true,
                })
            }
            Err(UtxoError::InsufficientFunds { .. }) => {
                let kinds: Vec<ScriptKind> = available.iter().map(|o| o.script_kind).collect();
                let outputs = [target.destination];
                let fee = self.estimator.estimate(&kinds, &outputs, target.fee);
                debug!(
                    amount = target.amount,
                    total,
                    fee,
                    "balance does not cover amount plus fee, quoting full spend"
                );
                Ok(FeeQuote {
                    fee,
                    estimated_size: self.estimator.estimate_size(&kinds, &outputs),
                    input_count: kinds.len(),
                    change: 0,
                    fully_funded: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn plan_for(
        &self,
        kinds: &[ScriptKind],
        total: u64,
        target: &SelectionTarget,
    ) -> Result<ChangePlan, UtxoError> {
        let fee_with_change =
            self.estimator
                .estimate(kinds, &[target.destination, target.change], target.fee);
        let fee_without_change = self
            .estimator
            .estimate(kinds, &[target.destination], target.fee);
        self.change
            .decide(total, target.amount, fee_with_change, fee_without_change)
    }

    fn largest_first(
        &self,
        sorted: &[&UnspentOutput],
        target: &SelectionTarget,
    ) -> Result<Selection, UtxoError> {
        let mut chosen = Vec::new();
        let mut kinds = Vec::new();
        let mut total: u64 = 0;

        for output in sorted {
            chosen.push((*output).clone());
            kinds.push(output.script_kind);
            total = total.checked_add(output.amount).ok_or_else(|| {
                UtxoError::TransactionBuildError(format!(
                    "selected output values overflow u64 at {}:{}",
                    output.txid, output.vout
                ))
            })?;

            if let Ok(plan) = self.plan_for(&kinds, total, target) {
                return Ok(Selection {
                    chosen,
                    total,
                    estimated_fee: plan.fee,
                    change: plan.change,
                });
            }
        }

        let fee = self
            .estimator
            .estimate(&kinds, &[target.destination], target.fee);
        let needed = target.amount.checked_add(fee).ok_or_else(|| {
            UtxoError::TransactionBuildError("amount plus fee overflows u64".to_string())
        })?;
        Err(UtxoError::InsufficientFunds {
            needed,
            available: total,
            stage: Stage::Selection,
        })
    }

    fn branch_and_bound(
        &self,
        sorted: &[&UnspentOutput],
        target: &SelectionTarget,
    ) -> Option<Selection> {
        let n = sorted.len();
        if n > MAX_CANDIDATES {
            debug!(candidates = n, "too many outputs for branch and bound");
            return None;
        }

        // u128 so the sum of every candidate cannot overflow.
        let mut remaining_from = vec![0u128; n + 1];
        for i in (0..n).rev() {
            remaining_from[i] = remaining_from[i + 1] + u128::from(sorted[i].amount);
        }
        let min_input_bytes = sorted
            .iter()
            .map(|o| ScriptSizeCatalog::input_bytes(o.script_kind))
            .min()
            .unwrap_or(0);
        let base_bytes = self.estimator.overhead_bytes()
            + ScriptSizeCatalog::output_bytes(target.destination);

        let mut best: Option<Candidate> = None;
        let mut stack = vec![Node {
            index: 0,
            chosen: Vec::new(),
            total: 0,
            input_bytes: 0,
        }];
        let mut tries = 0usize;

        while let Some(node) = stack.pop() {
            tries += 1;
            if tries > MAX_TRIES {
                warn!(tries = MAX_TRIES, "branch and bound search limit reached");
                break;
            }

            if !node.chosen.is_empty() {
                let kinds: Vec<ScriptKind> =
                    node.chosen.iter().map(|&i| sorted[i].script_kind).collect();
                if let Ok(plan) = self.plan_for(&kinds, node.total, target) {
                    let outputs: &[ScriptKind] = if plan.has_change_output() {
                        &[target.destination, target.change]
                    } else {
                        &[target.destination]
                    };
                    let size = self.estimator.estimate_size(&kinds, outputs);
                    let better = match &best {
                        Some(current) => (size, plan.change) < (current.size, current.plan.change),
                        None => true,
                    };
                    if better {
                        best = Some(Candidate {
                            size,
                            chosen: node.chosen,
                            plan,
                        });
                    }
                    // Adding inputs only grows the transaction.
                    continue;
                }
            }

            if node.index >= n {
                continue;
            }
            if u128::from(node.total) + remaining_from[node.index] < u128::from(target.amount) {
                continue;
            }
            if let Some(current) = &best {
                if base_bytes + node.input_bytes + min_input_bytes > current.size {
                    continue;
                }
            }

            let output = sorted[node.index];
            stack.push(Node {
                index: node.index + 1,
                chosen: node.chosen.clone(),
                total: node.total,
                input_bytes: node.input_bytes,
            });
            // A subset whose value does not fit in u64 cannot be spent.
            let Some(total) = node.total.checked_add(output.amount) else {
                continue;
            };
            let mut chosen = node.chosen;
            chosen.push(node.index);
            stack.push(Node {
                index: node.index + 1,
                chosen,
                total,
                input_bytes: node.input_bytes + ScriptSizeCatalog::input_bytes(output.script_kind),
            });
        }

        let candidate = best?;
        let chosen: Vec<UnspentOutput> = candidate
            .chosen
            .iter()
            .map(|&i| sorted[i].clone())
            .collect();
        let total = checked_total(&chosen).ok()?;
        Some(Selection {
            chosen,
            total,
            estimated_fee: candidate.plan.fee,
            change: candidate.plan.change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::FeeRate;
    use crate::script::LockingScript;

    fn p2wpkh_script() -> Vec<u8> {
        LockingScript::from_payload(ScriptKind::P2wpkh, &[0x11; 20])
            .unwrap()
            .into_bytes()
    }

    fn make_utxo(tag: u8, vout: u32, amount: u64) -> UnspentOutput {
        UnspentOutput::new(hex::encode([tag; 32]), vout, amount, p2wpkh_script()).unwrap()
    }

    fn selector(strategy: SelectionStrategy) -> CoinSelector {
        CoinSelector::new(
            FeeEstimator::with_overhead(10),
            ChangeCalculator::new(546),
            strategy,
        )
    }

    fn target(amount: u64, per_byte: u64) -> SelectionTarget {
        SelectionTarget {
            amount,
            destination: ScriptKind::P2wpkh,
            change: ScriptKind::P2wpkh,
            fee: FeePolicy::Rate(FeeRate::from_per_byte(per_byte)),
        }
    }

    #[test]
    fn new_classifies_script() {
        let utxo = make_utxo(0xaa, 0, 1_000);
        assert_eq!(utxo.script_kind, ScriptKind::P2wpkh);
    }

    #[test]
    fn new_rejects_nonstandard_script() {
        let err = UnspentOutput::new(hex::encode([0u8; 32]), 0, 1, vec![0x6a]).unwrap_err();
        assert!(matches!(err, UtxoError::EncodingFailure(_)));
    }

    #[test]
    fn new_rejects_bad_txid() {
        assert!(UnspentOutput::new("abcd", 0, 1, p2wpkh_script()).is_err());
        assert!(UnspentOutput::new("zz".repeat(32), 0, 1, p2wpkh_script()).is_err());
    }

    #[test]
    fn txid_bytes_are_reversed() {
        let mut display = [0u8; 32];
        display[0] = 0x01;
        let utxo = UnspentOutput::new(hex::encode(display), 0, 1, p2wpkh_script()).unwrap();
        let internal = utxo.txid_bytes().unwrap();
        assert_eq!(internal[31], 0x01);
        assert_eq!(internal[0], 0x00);
    }

    #[test]
    fn duplicate_outpoints_dropped() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 1_000),
            make_utxo(0xaa, 0, 1_000),
            make_utxo(0xaa, 1, 1_000),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.total().unwrap(), 2_000);
    }

    #[test]
    fn ordering_breaks_ties_by_outpoint() {
        let set: UnspentOutputSet = vec![
            make_utxo(0xbb, 0, 5_000),
            make_utxo(0xaa, 1, 5_000),
            make_utxo(0xaa, 0, 5_000),
            make_utxo(0xcc, 0, 9_000),
        ]
        .into_iter()
        .collect();
        let order: Vec<(u8, u32)> = set
            .sorted_largest_first()
            .iter()
            .map(|o| (hex::decode(&o.txid).unwrap()[0], o.vout))
            .collect();
        assert_eq!(order, vec![(0xcc, 0), (0xaa, 0), (0xaa, 1), (0xbb, 0)]);
    }

    #[test]
    fn ordering_ignores_txid_case() {
        let upper = UnspentOutput::new("AB".repeat(32), 0, 5_000, p2wpkh_script()).unwrap();
        let lower = UnspentOutput::new("ac".repeat(32), 0, 5_000, p2wpkh_script()).unwrap();
        // Case-sensitive byte order would put "AB.." ahead of "aa..".
        let first = UnspentOutput::new("aa".repeat(32), 0, 5_000, p2wpkh_script()).unwrap();
        let set = UnspentOutputSet::new(vec![lower, upper, first]);
        let order: Vec<String> = set
            .sorted_largest_first()
            .iter()
            .map(|o| o.txid.to_ascii_lowercase())
            .collect();
        assert_eq!(order, vec!["aa".repeat(32), "ab".repeat(32), "ac".repeat(32)]);
    }

    #[test]
    fn deserialize_derives_script_kind() {
        let utxo = make_utxo(0xaa, 3, 1_000);
        let mut json: serde_json::Value = serde_json::to_value(&utxo).unwrap();
        json["script_kind"] = serde_json::json!("p2tr");
        let back: UnspentOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back.script_kind, ScriptKind::P2wpkh);
        assert_eq!(back, utxo);
    }

    #[test]
    fn deserialize_rejects_nonstandard_script() {
        let json = serde_json::json!({
            "txid": "00".repeat(32),
            "vout": 0,
            "amount": 1,
            "script_pubkey": [0x6a],
            "script_kind": "p2tr",
        });
        assert!(serde_json::from_value::<UnspentOutput>(json).is_err());
    }

    #[test]
    fn total_rejects_overflow() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, u64::MAX - 10),
            make_utxo(0xbb, 0, 100),
        ]);
        assert!(matches!(
            set.total(),
            Err(UtxoError::TransactionBuildError(_))
        ));
    }

    #[test]
    fn selection_near_u64_max_does_not_wrap() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, u64::MAX - 10),
            make_utxo(0xbb, 0, 100),
        ]);
        for strategy in [SelectionStrategy::LargestFirst, SelectionStrategy::BranchAndBound] {
            let err = selector(strategy)
                .select(&set, &target(u64::MAX - 20, 1))
                .unwrap_err();
            assert_eq!(err.stage(), Stage::Build, "{strategy:?}");
        }
    }

    #[test]
    fn selects_single_large_utxo() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 100_000),
            make_utxo(0xbb, 0, 50_000),
        ]);
        let selection = selector(SelectionStrategy::LargestFirst)
            .select(&set, &target(40_000, 1))
            .unwrap();
        assert_eq!(selection.chosen.len(), 1);
        assert_eq!(selection.total, 100_000);
        // 10 + 69 + 22 + 22
        assert_eq!(selection.estimated_fee, 123);
        assert_eq!(selection.change, 100_000 - 40_000 - 123);
    }

    #[test]
    fn selects_multiple_utxos_when_needed() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 30_000),
            make_utxo(0xbb, 0, 30_000),
            make_utxo(0xcc, 0, 30_000),
        ]);
        let selection = selector(SelectionStrategy::LargestFirst)
            .select(&set, &target(55_000, 1))
            .unwrap();
        assert_eq!(selection.chosen.len(), 2);
        assert_eq!(
            selection.total,
            55_000 + selection.estimated_fee + selection.change
        );
    }

    #[test]
    fn fee_growth_pulls_in_another_input() {
        // One input covers the amount but not the fee.
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 10_000),
            make_utxo(0xbb, 0, 5_000),
        ]);
        let selection = selector(SelectionStrategy::LargestFirst)
            .select(&set, &target(10_000, 1))
            .unwrap();
        assert_eq!(selection.chosen.len(), 2);
    }

    #[test]
    fn insufficient_funds_reports_selection_stage() {
        let set = UnspentOutputSet::new(vec![make_utxo(0xaa, 0, 1_000)]);
        let err = selector(SelectionStrategy::LargestFirst)
            .select(&set, &target(500_000, 1))
            .unwrap_err();
        match err {
            UtxoError::InsufficientFunds {
                needed,
                available,
                stage,
            } => {
                assert_eq!(stage, Stage::Selection);
                assert_eq!(available, 1_000);
                assert_eq!(needed, 500_000 + 10 + 69 + 22);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn empty_set_is_insufficient() {
        let err = selector(SelectionStrategy::LargestFirst)
            .select(&UnspentOutputSet::default(), &target(1_000, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            UtxoError::InsufficientFunds { available: 0, .. }
        ));
    }

    #[test]
    fn zero_amount_rejected() {
        let set = UnspentOutputSet::new(vec![make_utxo(0xaa, 0, 1_000)]);
        let err = selector(SelectionStrategy::LargestFirst)
            .select(&set, &target(0, 1))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Build);
    }

    #[test]
    fn exact_fee_policy() {
        let set = UnspentOutputSet::new(vec![make_utxo(0xaa, 0, 20_000)]);
        let t = SelectionTarget {
            fee: FeePolicy::Exact(1_000),
            ..target(10_000, 1)
        };
        let selection = selector(SelectionStrategy::LargestFirst)
            .select(&set, &t)
            .unwrap();
        assert_eq!(selection.estimated_fee, 1_000);
        assert_eq!(selection.change, 9_000);
    }

    #[test]
    fn branch_and_bound_prefers_changeless_match() {
        // 60_101 = 60_000 + fee for one P2WPKH input and one output.
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 100_000),
            make_utxo(0xbb, 0, 60_101),
            make_utxo(0xcc, 0, 30_000),
        ]);
        let selection = selector(SelectionStrategy::BranchAndBound)
            .select(&set, &target(60_000, 1))
            .unwrap();
        assert_eq!(selection.chosen.len(), 1);
        assert_eq!(selection.total, 60_101);
        assert_eq!(selection.change, 0);
        assert_eq!(selection.estimated_fee, 101);
    }

    #[test]
    fn branch_and_bound_is_deterministic() {
        let set = UnspentOutputSet::new(
            (0..12u8)
                .map(|i| make_utxo(i, 0, 10_000 + u64::from(i) * 1_337))
                .collect(),
        );
        let s = selector(SelectionStrategy::BranchAndBound);
        let first = s.select(&set, &target(50_000, 2)).unwrap();
        let second = s.select(&set, &target(50_000, 2)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total, 50_000 + first.estimated_fee + first.change);
    }

    #[test]
    fn branch_and_bound_insufficient_falls_back_to_error() {
        let set = UnspentOutputSet::new(vec![make_utxo(0xaa, 0, 1_000)]);
        let err = selector(SelectionStrategy::BranchAndBound)
            .select(&set, &target(5_000, 1))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Selection);
    }

    #[test]
    fn quote_matches_selection_when_funded() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 100_000),
            make_utxo(0xbb, 0, 50_000),
        ]);
        let quote = selector(SelectionStrategy::LargestFirst)
            .quote(&set, &target(40_000, 1))
            .unwrap();
        assert!(quote.fully_funded);
        assert_eq!(quote.fee, 123);
        assert_eq!(quote.estimated_size, 123);
        assert_eq!(quote.input_count, 1);
        assert_eq!(quote.change, 100_000 - 40_000 - 123);
    }

    #[test]
    fn quote_for_whole_balance_spends_everything() {
        let set = UnspentOutputSet::new(vec![
            make_utxo(0xaa, 0, 30_000),
            make_utxo(0xbb, 0, 20_000),
        ]);
        let quote = selector(SelectionStrategy::LargestFirst)
            .quote(&set, &target(50_000, 1))
            .unwrap();
        assert!(!quote.fully_funded);
        assert_eq!(quote.input_count, 2);
        assert_eq!(quote.change, 0);
        // 10 + 2 * 69 + 22
        assert_eq!(quote.fee, 170);
        assert_eq!(quote.estimated_size, 170);
    }

    #[test]
    fn quote_rejects_amount_above_balance() {
        let set = UnspentOutputSet::new(vec![make_utxo(0xaa, 0, 1_000)]);
        let err = selector(SelectionStrategy::LargestFirst)
            .quote(&set, &target(1_001, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            UtxoError::InsufficientFunds {
                needed: 1_001,
                available: 1_000,
                stage: Stage::Selection
            }
        ));
    }

    #[test]
    fn quote_rejects_zero_amount_and_empty_set() {
        let s = selector(SelectionStrategy::LargestFirst);
        let set = UnspentOutputSet::new(vec![make_utxo(0xaa, 0, 1_000)]);
        assert_eq!(s.quote(&set, &target(0, 1)).unwrap_err().stage(), Stage::Build);
        assert!(s.quote(&UnspentOutputSet::default(), &target(1, 1)).is_err());
    }

    #[test]
    fn strategy_serializes_snake_case() {
        let json = serde_json::to_string(&SelectionStrategy::BranchAndBound).unwrap();
        assert_eq!(json, "\"branch_and_bound\"");
    }
}
