//! Transaction assembly.
//!
//! Building moves through typed states, each consuming the previous one:
//!
//! ```text
//! TransactionBuilder --select_inputs--> InputsSelected
//!     --size_and_fee--> SizedAndFeed --assemble--> UnsignedTransaction
//!     --finalize / sign--> SignedTransaction
//! ```
//!
//! Signing is external. [`UnsignedTransaction::signing_requests`] yields one
//! digest per input; the signatures that come back are encoded and placed
//! into the unlocking data by [`UnsignedTransaction::finalize`].

use crypto_utils::hash::{hash160, sha256, sha256d};
use crypto_utils::keys::compress_public_key;
use k256::ecdsa::Signature;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::address::{Address, LockingScriptCodec};
use crate::change::ChangeCalculator;
use crate::error::UtxoError;
use crate::fee::{FeeEstimator, FeePolicy};
use crate::network::NetworkParameters;
use crate::script::{multisig_threshold, push_data, LockingScript, ScriptKind, OP_0};
use crate::sighash::{ecdsa_sighash_type, DigestScheme, SighashContext, SIGHASH_ALL};
use crate::utxo::{
    checked_total, CoinSelector, FeeQuote, Selection, SelectionStrategy, SelectionTarget,
    UnspentOutput, UnspentOutputSet,
};

/// Length of a compact `r || s` ECDSA signature or a BIP340 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Sequence number that disables relative lock time and RBF signalling.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Append a Bitcoin CompactSize integer.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

/// Append CompactSize-prefixed bytes.
pub fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_compact_size(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// A transaction input with the prevout data needed for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Previous txid in internal byte order.
    pub txid: [u8; 32],
    pub vout: u32,
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    pub fn write_outpoint(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.txid);
        buf.extend_from_slice(&self.vout.to_le_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.amount.to_le_bytes());
        write_var_bytes(buf, &self.script_pubkey);
    }
}

/// A request to pay `amount` base units to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub destination: String,
    pub amount: u64,
    pub fee: FeePolicy,
}

/// Tunables for building a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub strategy: SelectionStrategy,
    pub sequence: u32,
    pub lock_time: u32,
    /// Overrides the chain's dust threshold.
    pub dust_threshold: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::LargestFirst,
            sequence: SEQUENCE_FINAL,
            lock_time: 0,
            dust_threshold: None,
        }
    }
}

/// The economic outcome of a build, fixed once fees are sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendPlan {
    pub requested_amount: u64,
    pub fee_amount: u64,
    pub selected_outputs: Vec<UnspentOutput>,
    /// Zero when no change output is created.
    pub change_amount: u64,
    pub estimated_size: u64,
}

impl SpendPlan {
    pub fn selected_total(&self) -> Result<u64, UtxoError> {
        checked_total(&self.selected_outputs)
    }
}

/// How the sender's outputs are unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SpendPath {
    P2pkh,
    /// P2SH over a bare `<key> OP_CHECKSIG` or a 1-of-n multisig.
    P2shScript { redeem: Vec<u8>, multisig: bool },
    P2shP2wpkh { redeem: Vec<u8> },
    P2wpkh,
    P2wshScript { witness_script: Vec<u8>, multisig: bool },
    P2tr,
}

impl SpendPath {
    fn for_address(address: &Address) -> Result<Self, UtxoError> {
        let script = |kind: ScriptKind| {
            address.redeem_script.clone().ok_or_else(|| {
                UtxoError::TransactionBuildError(format!("{kind} sender has no redeem script"))
            })
        };

        match address.script_kind {
            ScriptKind::P2pkh => Ok(SpendPath::P2pkh),
            ScriptKind::P2wpkh => Ok(SpendPath::P2wpkh),
            ScriptKind::P2tr => Ok(SpendPath::P2tr),
            ScriptKind::P2sh => {
                let redeem = script(ScriptKind::P2sh)?;
                if ScriptKind::classify(&redeem) == Some(ScriptKind::P2wpkh) {
                    return Ok(SpendPath::P2shP2wpkh { redeem });
                }
                let multisig = single_signature_multisig(&redeem)?;
                Ok(SpendPath::P2shScript { redeem, multisig })
            }
            ScriptKind::P2wsh => {
                let witness_script = script(ScriptKind::P2wsh)?;
                let multisig = single_signature_multisig(&witness_script)?;
                Ok(SpendPath::P2wshScript {
                    witness_script,
                    multisig,
                })
            }
        }
    }

    fn is_witness(&self) -> bool {
        !matches!(self, SpendPath::P2pkh | SpendPath::P2shScript { .. })
    }

    fn digest_scheme(&self, fork_id: Option<u32>) -> DigestScheme {
        match self {
            SpendPath::P2tr => DigestScheme::Taproot,
            _ if fork_id.is_some() => DigestScheme::SegwitV0,
            SpendPath::P2pkh | SpendPath::P2shScript { .. } => DigestScheme::Legacy,
            _ => DigestScheme::SegwitV0,
        }
    }
}

/// Whether `script` is a multisig that one signature satisfies. Scripts
/// needing more than one signature cannot be spent by a single signer.
fn single_signature_multisig(script: &[u8]) -> Result<bool, UtxoError> {
    match multisig_threshold(script) {
        Some((1, _)) => Ok(true),
        Some((m, n)) => Err(UtxoError::TransactionBuildError(format!(
            "{m}-of-{n} multisig needs {m} signatures"
        ))),
        None => Ok(false),
    }
}

/// Entry state: a sender on a network, nothing selected yet.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    params: NetworkParameters,
    sender: Address,
    spend: SpendPath,
    unlock_key: Vec<u8>,
    options: BuildOptions,
}

impl TransactionBuilder {
    pub fn new(params: &NetworkParameters, sender: &Address) -> Result<Self, UtxoError> {
        if !params.supports(sender.script_kind) {
            return Err(UtxoError::UnsupportedScriptVersion {
                version: sender
                    .script_kind
                    .witness_version()
                    .or_else(|| params.legacy_version(sender.script_kind))
                    .unwrap_or_default(),
                network: params.name.to_string(),
            });
        }
        if sender.locking_script.kind() != sender.script_kind {
            return Err(UtxoError::TransactionBuildError(
                "sender locking script does not match its script kind".into(),
            ));
        }

        let spend = SpendPath::for_address(sender)?;
        let payload = sender.locking_script.payload();
        let script_matches = match &spend {
            SpendPath::P2shScript { redeem, .. } | SpendPath::P2shP2wpkh { redeem } => {
                hash160(redeem) == payload
            }
            SpendPath::P2wshScript { witness_script, .. } => sha256(witness_script) == payload,
            SpendPath::P2pkh | SpendPath::P2wpkh | SpendPath::P2tr => true,
        };
        if !script_matches {
            return Err(UtxoError::TransactionBuildError(
                "redeem script does not match sender address".into(),
            ));
        }
        let unlock_key = match spend {
            SpendPath::P2pkh if !params.compress_public_keys => sender.public_key.clone(),
            _ => compress_public_key(&sender.public_key)?.to_vec(),
        };
        let key_matches = match &spend {
            SpendPath::P2pkh | SpendPath::P2wpkh => hash160(&unlock_key) == payload,
            // Classified as P2WPKH, so the key hash follows `OP_0 0x14`.
            SpendPath::P2shP2wpkh { redeem } => hash160(&unlock_key) == redeem[2..],
            _ => true,
        };
        if !key_matches {
            return Err(UtxoError::TransactionBuildError(
                "public key does not match sender address".into(),
            ));
        }

        Ok(Self {
            params: params.clone(),
            sender: sender.clone(),
            spend,
            unlock_key,
            options: BuildOptions::default(),
        })
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    fn dust_threshold(&self) -> u64 {
        self.options
            .dust_threshold
            .unwrap_or(self.params.dust_threshold)
    }

    fn target(&self, destination: &LockingScript, request: &SendRequest) -> SelectionTarget {
        SelectionTarget {
            amount: request.amount,
            destination: destination.kind(),
            change: self.sender.script_kind,
            fee: request.fee,
        }
    }

    /// Decode the destination and choose the inputs to spend.
    pub fn select_inputs(
        &self,
        available: &UnspentOutputSet,
        request: &SendRequest,
    ) -> Result<InputsSelected<'_>, UtxoError> {
        if request.amount == 0 {
            return Err(UtxoError::TransactionBuildError(
                "amount must be greater than zero".into(),
            ));
        }
        let dust = self.dust_threshold();
        if request.amount < dust {
            return Err(UtxoError::TransactionBuildError(format!(
                "amount {} is below the dust threshold {dust}",
                request.amount
            )));
        }

        let destination = self.prepare(available, request)?;
        let selection = self
            .selector()
            .select(available, &self.target(&destination, request))?;

        Ok(InputsSelected {
            builder: self,
            destination,
            request: request.clone(),
            selection,
        })
    }

    /// Quote the fee for `request` without building it.
    ///
    /// Amounts below the dust threshold are allowed, and a balance that
    /// covers the amount but not the fee yields the fee for spending
    /// everything (see [`CoinSelector::quote`]).
    pub fn quote_fee(
        &self,
        available: &UnspentOutputSet,
        request: &SendRequest,
    ) -> Result<FeeQuote, UtxoError> {
        let destination = self.prepare(available, request)?;
        let quote = self
            .selector()
            .quote(available, &self.target(&destination, request))?;
        debug!(
            network = %self.params.name,
            fee = quote.fee,
            fully_funded = quote.fully_funded,
            "quoted fee"
        );
        Ok(quote)
    }

    /// Decode the destination and check every output belongs to the sender.
    fn prepare(
        &self,
        available: &UnspentOutputSet,
        request: &SendRequest,
    ) -> Result<LockingScript, UtxoError> {
        let (_, destination) = LockingScriptCodec::new(&self.params).decode(&request.destination)?;

        let sender_script = self.sender.locking_script.as_bytes();
        if let Some(foreign) = available.iter().find(|o| o.script_pubkey != sender_script) {
            return Err(UtxoError::TransactionBuildError(format!(
                "output {}:{} is not locked to the sender",
                foreign.txid, foreign.vout
            )));
        }
        Ok(destination)
    }

    fn selector(&self) -> CoinSelector {
        CoinSelector::new(
            FeeEstimator::new(&self.params),
            ChangeCalculator::new(self.dust_threshold()),
            self.options.strategy,
        )
    }

    /// Run every stage up to the unsigned transaction.
    pub fn build_unsigned(
        &self,
        available: &UnspentOutputSet,
        request: &SendRequest,
    ) -> Result<UnsignedTransaction, UtxoError> {
        self.select_inputs(available, request)?
            .size_and_fee()?
            .assemble()
    }
}

/// Inputs chosen; fee and change not yet fixed.
#[derive(Debug, Clone)]
pub struct InputsSelected<'b> {
    builder: &'b TransactionBuilder,
    destination: LockingScript,
    request: SendRequest,
    selection: Selection,
}

impl<'b> InputsSelected<'b> {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn destination(&self) -> &LockingScript {
        &self.destination
    }

    /// Size the transaction for the chosen inputs and split the remainder
    /// between fee and change.
    pub fn size_and_fee(self) -> Result<SizedAndFeed<'b>, UtxoError> {
        let builder = self.builder;
        let estimator = FeeEstimator::new(&builder.params);
        let target = builder.target(&self.destination, &self.request);
        let kinds = self.selection.input_kinds();

        let with_change = [target.destination, target.change];
        let without_change = [target.destination];
        let plan = ChangeCalculator::new(builder.dust_threshold()).decide(
            self.selection.total,
            self.request.amount,
            estimator.estimate(&kinds, &with_change, target.fee),
            estimator.estimate(&kinds, &without_change, target.fee),
        )?;
        let outputs: &[ScriptKind] = if plan.has_change_output() {
            &with_change
        } else {
            &without_change
        };
        let estimated_size = estimator.estimate_size(&kinds, outputs);

        debug!(
            network = %builder.params.name,
            size = estimated_size,
            fee = plan.fee,
            change = plan.change,
            "sized transaction"
        );

        Ok(SizedAndFeed {
            builder,
            destination: self.destination,
            plan: SpendPlan {
                requested_amount: self.request.amount,
                fee_amount: plan.fee,
                selected_outputs: self.selection.chosen,
                change_amount: plan.change,
                estimated_size,
            },
        })
    }
}

/// Fee and change fixed; ready to lay out inputs and outputs.
#[derive(Debug, Clone)]
pub struct SizedAndFeed<'b> {
    builder: &'b TransactionBuilder,
    destination: LockingScript,
    plan: SpendPlan,
}

impl<'b> SizedAndFeed<'b> {
    pub fn plan(&self) -> &SpendPlan {
        &self.plan
    }

    /// Lay out the unsigned transaction: inputs in selection order, the
    /// destination output first and change (if any) second.
    pub fn assemble(self) -> Result<UnsignedTransaction, UtxoError> {
        let builder = self.builder;
        let inputs = self
            .plan
            .selected_outputs
            .iter()
            .map(|o| {
                Ok(TxInput {
                    txid: o.txid_bytes()?,
                    vout: o.vout,
                    amount: o.amount,
                    script_pubkey: o.script_pubkey.clone(),
                    sequence: builder.options.sequence,
                })
            })
            .collect::<Result<Vec<_>, UtxoError>>()?;

        let mut outputs = vec![TxOutput {
            amount: self.plan.requested_amount,
            script_pubkey: self.destination.into_bytes(),
        }];
        if self.plan.change_amount > 0 {
            outputs.push(TxOutput {
                amount: self.plan.change_amount,
                script_pubkey: builder.sender.locking_script.as_bytes().to_vec(),
            });
        }

        let spent = self.plan.selected_total()?;
        let paid = self
            .plan
            .requested_amount
            .checked_add(self.plan.fee_amount)
            .and_then(|v| v.checked_add(self.plan.change_amount))
            .ok_or_else(|| {
                UtxoError::TransactionBuildError("outputs plus fee overflow u64".to_string())
            })?;
        if spent != paid {
            return Err(UtxoError::TransactionBuildError(format!(
                "inputs {spent} do not balance outputs plus fee {paid}"
            )));
        }

        Ok(UnsignedTransaction {
            version: builder.params.tx_version,
            lock_time: builder.options.lock_time,
            inputs,
            outputs,
            plan: self.plan,
            spend: builder.spend.clone(),
            unlock_key: builder.unlock_key.clone(),
            fork_id: builder.params.fork_id,
        })
    }
}

/// Signature algorithm a signing request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// 64-byte compact `r || s` secp256k1 ECDSA signature.
    Ecdsa,
    /// 64-byte BIP340 signature by the BIP86-tweaked key.
    Schnorr,
}

/// One digest to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub input_index: usize,
    pub digest: [u8; 32],
    pub kind: SignatureKind,
}

/// Produces signatures for the digests of an unsigned transaction.
pub trait Signer {
    /// Return one 64-byte signature per request, in request order.
    fn sign(&self, requests: &[SigningRequest]) -> Result<Vec<Vec<u8>>, UtxoError>;
}

/// A fully laid-out transaction awaiting signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    version: u32,
    lock_time: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    plan: SpendPlan,
    spend: SpendPath,
    unlock_key: Vec<u8>,
    fork_id: Option<u32>,
}

impl UnsignedTransaction {
    pub fn plan(&self) -> &SpendPlan {
        &self.plan
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    fn context(&self) -> SighashContext<'_> {
        SighashContext {
            version: self.version,
            lock_time: self.lock_time,
            inputs: &self.inputs,
            outputs: &self.outputs,
        }
    }

    fn script_code(&self, input: &TxInput) -> Result<Vec<u8>, UtxoError> {
        match &self.spend {
            SpendPath::P2pkh => Ok(input.script_pubkey.clone()),
            SpendPath::P2shScript { redeem, .. } => Ok(redeem.clone()),
            SpendPath::P2wshScript { witness_script, .. } => Ok(witness_script.clone()),
            SpendPath::P2shP2wpkh { .. } | SpendPath::P2wpkh => {
                Ok(LockingScript::from_payload(ScriptKind::P2pkh, &hash160(&self.unlock_key))?
                    .into_bytes())
            }
            SpendPath::P2tr => Ok(Vec::new()),
        }
    }

    fn hash_type(&self) -> u32 {
        ecdsa_sighash_type(self.fork_id)
    }

    /// One digest per input, in input order.
    pub fn signing_requests(&self) -> Result<Vec<SigningRequest>, UtxoError> {
        let ctx = self.context();
        let scheme = self.spend.digest_scheme(self.fork_id);
        self.inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let digest = match scheme {
                    DigestScheme::Legacy => {
                        ctx.legacy(index, &self.script_code(input)?, SIGHASH_ALL)?
                    }
                    DigestScheme::SegwitV0 => {
                        ctx.segwit_v0(index, &self.script_code(input)?, self.hash_type())?
                    }
                    DigestScheme::Taproot => ctx.taproot_key_path(index)?,
                };
                let kind = match scheme {
                    DigestScheme::Taproot => SignatureKind::Schnorr,
                    _ => SignatureKind::Ecdsa,
                };
                Ok(SigningRequest {
                    input_index: index,
                    digest,
                    kind,
                })
            })
            .collect()
    }

    /// Convenience accessor for the raw digests.
    pub fn digests(&self) -> Result<Vec<[u8; 32]>, UtxoError> {
        Ok(self
            .signing_requests()?
            .into_iter()
            .map(|r| r.digest)
            .collect())
    }

    /// Serialization without unlocking data.
    pub fn serialize_unsigned(&self) -> Vec<u8> {
        let empty_sigs = vec![Vec::new(); self.inputs.len()];
        self.serialize(&empty_sigs, None)
    }

    /// Place one signature per input into the unlocking data.
    pub fn finalize(&self, signatures: &[Vec<u8>]) -> Result<SignedTransaction, UtxoError> {
        if signatures.len() != self.inputs.len() {
            return Err(UtxoError::SigningError(format!(
                "expected {} signatures, got {}",
                self.inputs.len(),
                signatures.len()
            )));
        }

        let hash_type = (self.hash_type() & 0xff) as u8;
        let mut script_sigs = Vec::with_capacity(signatures.len());
        let mut witnesses = Vec::with_capacity(signatures.len());
        for (index, signature) in signatures.iter().enumerate() {
            let encoded = match self.spend {
                SpendPath::P2tr => schnorr_signature(signature, index)?,
                _ => der_signature(signature, hash_type, index)?,
            };
            let (script_sig, witness) = self.unlocking_data(encoded);
            script_sigs.push(script_sig);
            witnesses.push(witness);
        }

        let witness = self.spend.is_witness().then_some(witnesses.as_slice());
        let bytes = self.serialize(&script_sigs, witness);
        let txid = compute_txid(&self.serialize(&script_sigs, None));
        info!(
            txid = %txid,
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            fee = self.plan.fee_amount,
            "transaction signed"
        );
        Ok(SignedTransaction { bytes, txid })
    }

    /// Request signatures from `signer` and finalize.
    pub fn sign(&self, signer: &dyn Signer) -> Result<SignedTransaction, UtxoError> {
        let requests = self.signing_requests()?;
        let signatures = signer.sign(&requests)?;
        self.finalize(&signatures)
    }

    fn unlocking_data(&self, signature: Vec<u8>) -> (Vec<u8>, Vec<Vec<u8>>) {
        let mut script_sig = Vec::new();
        let witness = match &self.spend {
            SpendPath::P2pkh => {
                push_data(&mut script_sig, &signature);
                push_data(&mut script_sig, &self.unlock_key);
                Vec::new()
            }
            SpendPath::P2shScript { redeem, multisig } => {
                if *multisig {
                    script_sig.push(OP_0);
                }
                push_data(&mut script_sig, &signature);
                push_data(&mut script_sig, redeem);
                Vec::new()
            }
            SpendPath::P2shP2wpkh { redeem } => {
                push_data(&mut script_sig, redeem);
                vec![signature, self.unlock_key.clone()]
            }
            SpendPath::P2wpkh => vec![signature, self.unlock_key.clone()],
            SpendPath::P2wshScript {
                witness_script,
                multisig,
            } => {
                let mut stack = Vec::with_capacity(3);
                if *multisig {
                    stack.push(Vec::new());
                }
                stack.push(signature);
                stack.push(witness_script.clone());
                stack
            }
            SpendPath::P2tr => vec![signature],
        };
        (script_sig, witness)
    }

    fn serialize(&self, script_sigs: &[Vec<u8>], witnesses: Option<&[Vec<Vec<u8>>]>) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.plan.estimated_size as usize + 64);
        buf.extend_from_slice(&self.version.to_le_bytes());
        if witnesses.is_some() {
            // Segwit marker and flag.
            buf.extend_from_slice(&[0x00, 0x01]);
        }
        write_compact_size(&mut buf, self.inputs.len() as u64);
        for (input, script_sig) in self.inputs.iter().zip(script_sigs) {
            input.write_outpoint(&mut buf);
            write_var_bytes(&mut buf, script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(&mut buf);
        }
        if let Some(witnesses) = witnesses {
            for stack in witnesses {
                write_compact_size(&mut buf, stack.len() as u64);
                for item in stack {
                    write_var_bytes(&mut buf, item);
                }
            }
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }
}

/// Low-S DER encoding of a compact ECDSA signature followed by the hash type.
fn der_signature(signature: &[u8], hash_type: u8, index: usize) -> Result<Vec<u8>, UtxoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(UtxoError::SigningError(format!(
            "input {index}: expected {SIGNATURE_LEN}-byte signature, got {}",
            signature.len()
        )));
    }
    let sig = Signature::from_slice(signature)
        .map_err(|e| UtxoError::SigningError(format!("input {index}: {e}")))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    let mut der = sig.to_der().as_bytes().to_vec();
    der.push(hash_type);
    Ok(der)
}

fn schnorr_signature(signature: &[u8], index: usize) -> Result<Vec<u8>, UtxoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(UtxoError::SigningError(format!(
            "input {index}: expected {SIGNATURE_LEN}-byte schnorr signature, got {}",
            signature.len()
        )));
    }
    Ok(signature.to_vec())
}

/// Display-order txid of a non-witness serialization.
fn compute_txid(serialized: &[u8]) -> String {
    let mut hash = sha256d(serialized);
    hash.reverse();
    hex::encode(hash)
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub bytes: Vec<u8>,
    pub txid: String,
}

impl SignedTransaction {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::FeeRate;
    use crate::error::Stage;
    use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
    use k256::ecdsa::{SigningKey, VerifyingKey};

    const DESTINATION: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    struct SoftwareSigner(SigningKey);

    impl SoftwareSigner {
        fn new() -> Self {
            Self(SigningKey::from_slice(&[0x07; 32]).unwrap())
        }

        fn public_key(&self) -> Vec<u8> {
            self.0.verifying_key().to_encoded_point(true).as_bytes().to_vec()
        }
    }

    impl Signer for SoftwareSigner {
        fn sign(&self, requests: &[SigningRequest]) -> Result<Vec<Vec<u8>>, UtxoError> {
            requests
                .iter()
                .map(|r| {
                    let sig: Signature = self
                        .0
                        .sign_prehash(&r.digest)
                        .map_err(|e| UtxoError::SigningError(e.to_string()))?;
                    Ok(sig.to_bytes().to_vec())
                })
                .collect()
        }
    }

    fn sender(params: &NetworkParameters, kind: ScriptKind) -> (SoftwareSigner, Address) {
        let signer = SoftwareSigner::new();
        let address = LockingScriptCodec::new(params)
            .encode(&signer.public_key(), kind)
            .unwrap();
        (signer, address)
    }

    fn utxos_for(address: &Address, amounts: &[u64]) -> UnspentOutputSet {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                UnspentOutput::new(
                    hex::encode([i as u8 + 1; 32]),
                    i as u32,
                    *amount,
                    address.locking_script.as_bytes().to_vec(),
                )
                .unwrap()
            })
            .collect()
    }

    fn request(destination: &str, amount: u64) -> SendRequest {
        SendRequest {
            destination: destination.into(),
            amount,
            fee: FeePolicy::Rate(FeeRate::from_per_byte(2)),
        }
    }

    #[test]
    fn compact_size_boundaries() {
        let cases: [(u64, &str); 4] = [
            (0xfc, "fc"),
            (0xfd, "fdfd00"),
            (0x1_0000, "fe00000100"),
            (0x1_0000_0000, "ff0000000001000000"),
        ];
        for (n, expected) in cases {
            let mut buf = Vec::new();
            write_compact_size(&mut buf, n);
            assert_eq!(hex::encode(buf), expected);
        }
    }

    #[test]
    fn builds_p2wpkh_with_change() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000, 30_000]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 50_000))
            .unwrap();

        let plan = unsigned.plan();
        assert_eq!(plan.selected_outputs.len(), 1);
        assert_eq!(plan.selected_outputs[0].amount, 80_000);
        // 10 + 69 + 22 + 22 bytes at 2 per byte
        assert_eq!(plan.fee_amount, 246);
        assert_eq!(plan.change_amount, 80_000 - 50_000 - 246);
        assert_eq!(
            plan.selected_total().unwrap(),
            plan.requested_amount + plan.fee_amount + plan.change_amount
        );

        let outputs = unsigned.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].amount, 50_000);
        assert_eq!(
            hex::encode(&outputs[0].script_pubkey),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert_eq!(outputs[1].script_pubkey, address.locking_script.as_bytes());
        assert_eq!(unsigned.version(), 2);
        assert_eq!(unsigned.inputs()[0].sequence, SEQUENCE_FINAL);
    }

    #[test]
    fn stages_can_be_driven_one_by_one() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000]);
        let builder = TransactionBuilder::new(&params, &address).unwrap();

        let selected = builder
            .select_inputs(&utxos, &request(DESTINATION, 50_000))
            .unwrap();
        assert_eq!(selected.selection().chosen.len(), 1);
        assert_eq!(selected.destination().kind(), ScriptKind::P2wpkh);

        let sized = selected.size_and_fee().unwrap();
        assert_eq!(sized.plan().estimated_size, 123);

        let unsigned = sized.assemble().unwrap();
        assert_eq!(unsigned.inputs().len(), 1);
    }

    #[test]
    fn sub_dust_change_is_folded() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        // 50_000 + 246 fee leaves 300 change, below dust.
        let utxos = utxos_for(&address, &[50_546]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 50_000))
            .unwrap();
        assert_eq!(unsigned.outputs().len(), 1);
        assert_eq!(unsigned.plan().change_amount, 0);
        assert_eq!(unsigned.plan().fee_amount, 546);
    }

    #[test]
    fn dust_amount_rejected() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000]);
        let err = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 545))
            .unwrap_err();
        assert!(err.to_string().contains("below the dust threshold 546"));
        assert_eq!(err.stage(), Stage::Build);
    }

    #[test]
    fn dust_threshold_override() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000]);
        let options = BuildOptions {
            dust_threshold: Some(100),
            ..BuildOptions::default()
        };
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .with_options(options)
            .build_unsigned(&utxos, &request(DESTINATION, 545))
            .unwrap();
        assert_eq!(unsigned.plan().requested_amount, 545);
    }

    #[test]
    fn wrong_network_destination_is_codec_error() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000]);
        let err = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(
                &utxos,
                &request("ltc1q5wmm9vrz55war9c0rgw26tv9un5fxnn7slyjpy", 10_000),
            )
            .unwrap_err();
        assert!(matches!(err, UtxoError::WrongAddress(_)));
        assert_eq!(err.stage(), Stage::Codec);
    }

    #[test]
    fn insufficient_funds_is_selection_error() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[10_000]);
        let err = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 10_000))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Selection);
    }

    #[test]
    fn foreign_outputs_rejected() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let foreign = UnspentOutput::new(
            hex::encode([0xee; 32]),
            0,
            90_000,
            hex::decode("0014751e76e8199196d454941c45d1b3a323f1433bd6").unwrap(),
        )
        .unwrap();
        let utxos = UnspentOutputSet::new(vec![foreign]);
        let err = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 10_000))
            .unwrap_err();
        assert!(err.to_string().contains("not locked to the sender"));
    }

    #[test]
    fn quote_allows_dust_amount() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000]);
        let quote = TransactionBuilder::new(&params, &address)
            .unwrap()
            .quote_fee(&utxos, &request(DESTINATION, 545))
            .unwrap();
        assert!(quote.fully_funded);
        assert_eq!(quote.fee, 246);
    }

    #[test]
    fn quote_whole_balance_returns_sweep_fee() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[30_000, 20_000]);
        let builder = TransactionBuilder::new(&params, &address).unwrap();
        let quote = builder
            .quote_fee(&utxos, &request(DESTINATION, 50_000))
            .unwrap();
        assert!(!quote.fully_funded);
        assert_eq!(quote.input_count, 2);
        // 10 + 2 * 69 + 22 bytes at 2 per byte
        assert_eq!(quote.fee, 340);

        // Sending the balance minus the quoted fee then builds exactly.
        let unsigned = builder
            .build_unsigned(&utxos, &request(DESTINATION, 50_000 - quote.fee))
            .unwrap();
        assert_eq!(unsigned.plan().fee_amount, quote.fee);
        assert_eq!(unsigned.outputs().len(), 1);
    }

    #[test]
    fn quote_rejects_foreign_outputs() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let (_, other) = sender(&params, ScriptKind::P2pkh);
        let utxos = utxos_for(&other, &[80_000]);
        let err = TransactionBuilder::new(&params, &address)
            .unwrap()
            .quote_fee(&utxos, &request(DESTINATION, 10_000))
            .unwrap_err();
        assert!(err.to_string().contains("not locked to the sender"));
    }

    #[test]
    fn tampered_redeem_script_rejected() {
        let params = NetworkParameters::BITCOIN;
        let (_, mut address) = sender(&params, ScriptKind::P2sh);
        let foreign = LockingScript::from_payload(ScriptKind::P2wpkh, &[0x22; 20]).unwrap();
        address.redeem_script = Some(foreign.into_bytes());
        let err = TransactionBuilder::new(&params, &address).unwrap_err();
        assert!(err.to_string().contains("redeem script does not match"));
    }

    #[test]
    fn nested_segwit_key_must_match_redeem_script() {
        let params = NetworkParameters::BITCOIN;
        let (_, mut address) = sender(&params, ScriptKind::P2sh);
        let other = SigningKey::from_slice(&[0x09; 32]).unwrap();
        address.public_key = other.verifying_key().to_encoded_point(true).as_bytes().to_vec();
        let err = TransactionBuilder::new(&params, &address).unwrap_err();
        assert!(err.to_string().contains("public key does not match"));
    }

    #[test]
    fn tampered_witness_script_rejected() {
        let params = NetworkParameters::BITCOIN;
        let signer = SoftwareSigner::new();
        let other = SigningKey::from_slice(&[0x09; 32]).unwrap();
        let codec = LockingScriptCodec::new(&params);
        let mut address = codec
            .encode_multisig(&[signer.public_key()], 1, ScriptKind::P2wsh)
            .unwrap();
        assert!(TransactionBuilder::new(&params, &address).is_ok());

        let swapped = codec
            .encode_multisig(
                &[other.verifying_key().to_encoded_point(true).as_bytes().to_vec()],
                1,
                ScriptKind::P2wsh,
            )
            .unwrap();
        address.redeem_script = swapped.redeem_script;
        let err = TransactionBuilder::new(&params, &address).unwrap_err();
        assert_eq!(err.stage(), Stage::Build);
        assert!(err.to_string().contains("redeem script does not match"));
    }

    #[test]
    fn unsupported_sender_kind_rejected() {
        let (_, address) = sender(&NetworkParameters::BITCOIN, ScriptKind::P2wpkh);
        let err = TransactionBuilder::new(&NetworkParameters::DOGECOIN, &address).unwrap_err();
        assert!(matches!(err, UtxoError::UnsupportedScriptVersion { .. }));
    }

    #[test]
    fn multi_signature_threshold_rejected() {
        let params = NetworkParameters::BITCOIN;
        let signer = SoftwareSigner::new();
        let other = SigningKey::from_slice(&[0x09; 32]).unwrap();
        let keys = vec![
            signer.public_key(),
            other.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
        ];
        let address = LockingScriptCodec::new(&params)
            .encode_multisig(&keys, 2, ScriptKind::P2wsh)
            .unwrap();
        let err = TransactionBuilder::new(&params, &address).unwrap_err();
        assert!(err.to_string().contains("2-of-2 multisig needs 2 signatures"));
    }

    #[test]
    fn finalize_rejects_wrong_signature_count() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[80_000]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 50_000))
            .unwrap();
        let err = unsigned.finalize(&[]).unwrap_err();
        assert_eq!(err.stage(), Stage::Signing);
        let err = unsigned.finalize(&[vec![0u8; 70]]).unwrap_err();
        assert!(err.to_string().contains("expected 64-byte signature"));
    }

    #[test]
    fn p2pkh_signature_verifies_and_is_low_s_der() {
        let params = NetworkParameters::BITCOIN;
        let (signer, address) = sender(&params, ScriptKind::P2pkh);
        let utxos = utxos_for(&address, &[40_000, 40_000]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 60_000))
            .unwrap();
        let requests = unsigned.signing_requests().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.kind == SignatureKind::Ecdsa));

        let signatures = signer.sign(&requests).unwrap();
        let verifying = VerifyingKey::from(&signer.0);
        for (request, sig) in requests.iter().zip(&signatures) {
            let sig = Signature::from_slice(sig).unwrap();
            verifying.verify_prehash(&request.digest, &sig).unwrap();
        }

        let signed = unsigned.finalize(&signatures).unwrap();
        // No segwit marker for legacy spends.
        assert_eq!(&signed.bytes[4..6], &[0x02, 0x01]);
        let txid = compute_txid(&signed.bytes);
        assert_eq!(signed.txid, txid);
    }

    #[test]
    fn high_s_signature_is_normalized() {
        let sig = Signature::from_scalars([0x11; 32], [0x22; 32]).unwrap();
        let high = Signature::from_scalars(sig.r().to_bytes(), (-*sig.s()).to_bytes()).unwrap();
        let der = der_signature(&high.to_bytes(), 0x01, 0).unwrap();
        let parsed = Signature::from_der(&der[..der.len() - 1]).unwrap();
        assert_eq!(parsed.normalize_s(), None);
        assert_eq!(*der.last().unwrap(), 0x01);
    }

    #[test]
    fn bitcoin_cash_uses_fork_id_hash_type() {
        let params = NetworkParameters::BITCOIN_CASH;
        let (signer, address) = sender(&params, ScriptKind::P2pkh);
        let utxos = utxos_for(&address, &[100_000]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(
                &utxos,
                &request("bitcoincash:qrpgfcqrnqvp33vsex0clktvae2pqjfxnyxq0ml0zc", 20_000),
            )
            .unwrap();
        let signed = unsigned.sign(&signer).unwrap();

        // version(4) + count(1) + outpoint(36) + scriptSig length(1) + push length(1)
        let sig_len = signed.bytes[42] as usize;
        assert_eq!(signed.bytes[42 + sig_len], 0x41);
    }

    #[test]
    fn taproot_requests_schnorr_and_builds_single_item_witness() {
        let params = NetworkParameters::BITCOIN;
        let (_, address) = sender(&params, ScriptKind::P2tr);
        let utxos = utxos_for(&address, &[100_000]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 20_000))
            .unwrap();
        let requests = unsigned.signing_requests().unwrap();
        assert_eq!(requests[0].kind, SignatureKind::Schnorr);

        let signed = unsigned.finalize(&[vec![0xab; 64]]).unwrap();
        assert_eq!(&signed.bytes[4..6], &[0x00, 0x01]);
        // Witness: one item of 64 bytes, followed by the lock time.
        let tail = &signed.bytes[signed.bytes.len() - 4 - 66..signed.bytes.len() - 4];
        assert_eq!(tail[0], 1);
        assert_eq!(tail[1], 64);
    }

    #[test]
    fn txid_ignores_witness() {
        let params = NetworkParameters::BITCOIN;
        let (signer, address) = sender(&params, ScriptKind::P2wpkh);
        let utxos = utxos_for(&address, &[100_000]);
        let unsigned = TransactionBuilder::new(&params, &address)
            .unwrap()
            .build_unsigned(&utxos, &request(DESTINATION, 20_000))
            .unwrap();
        let signed = unsigned.sign(&signer).unwrap();
        assert_eq!(signed.txid, compute_txid(&unsigned.serialize_unsigned()));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: BuildOptions = serde_json::from_str(r#"{"strategy":"branch_and_bound"}"#).unwrap();
        assert_eq!(options.strategy, SelectionStrategy::BranchAndBound);
        assert_eq!(options.sequence, SEQUENCE_FINAL);
        assert_eq!(options.lock_time, 0);
    }
}
