pub mod error;
pub mod manager;
pub mod types;

use chain_utxo::amount::{from_base_units, to_base_units};
use chain_utxo::utxo::SelectionTarget;
use chain_utxo::{
    ChangeCalculator, CoinSelector, FeeEstimator, FeePolicy, FeeRate, LockingScriptCodec,
    Rounding, ScriptKind, SelectionStrategy, SendRequest, TransactionBuilder, UnsignedTransaction,
    UnspentOutput, UnspentOutputSet,
};
use error::WalletError;
use types::{
    Chain, ChainInfo, DerivedAddress, FeeQuoteData, ScriptType, SignedTransactionData,
    SigningRequestData, SpendPlanData, UnsignedTransactionData, UtxoData,
};

uniffi::setup_scaffolding!();

pub use manager::{Broadcaster, UtxoSource, UtxoWalletManager};

// ─── UniFFI-exported functions ───────────────────────────────────────
// Note: UniFFI passes owned String/Vec<u8> across FFI, so all functions
// accept owned types (not references).

/// List every chain the engine can build transactions for
#[uniffi::export]
pub fn supported_chains() -> Vec<ChainInfo> {
    Chain::ALL.into_iter().map(ChainInfo::from).collect()
}

/// Derive the address of `script_type` for a SEC1 public key
#[uniffi::export]
pub fn derive_address(
    public_key: Vec<u8>,
    chain: Chain,
    script_type: ScriptType,
) -> Result<DerivedAddress, WalletError> {
    let params = chain.params();
    let address = LockingScriptCodec::new(&params).encode(&public_key, script_type.into())?;
    Ok(DerivedAddress {
        chain,
        address: address.display_value,
        script_type,
        script_pubkey: address.locking_script.to_hex(),
        redeem_script: address.redeem_script.map(hex::encode),
    })
}

/// Derive an m-of-n multisig address (P2SH or P2WSH)
#[uniffi::export]
pub fn derive_multisig_address(
    public_keys: Vec<Vec<u8>>,
    required: u8,
    chain: Chain,
    script_type: ScriptType,
) -> Result<DerivedAddress, WalletError> {
    let params = chain.params();
    let address =
        LockingScriptCodec::new(&params).encode_multisig(&public_keys, required, script_type.into())?;
    Ok(DerivedAddress {
        chain,
        address: address.display_value,
        script_type,
        script_pubkey: address.locking_script.to_hex(),
        redeem_script: address.redeem_script.map(hex::encode),
    })
}

/// Validate an address for a specific chain
#[uniffi::export]
pub fn validate_address(address: String, chain: Chain) -> bool {
    let params = chain.params();
    LockingScriptCodec::new(&params).validate(&address)
}

/// Electrum-protocol script hash of an address's locking script
#[uniffi::export]
pub fn address_to_script_hash(address: String, chain: Chain) -> Result<String, WalletError> {
    let params = chain.params();
    Ok(LockingScriptCodec::new(&params).script_hash(&address)?)
}

/// Convert a CashAddr (or Base58Check) address to its Base58Check form
#[uniffi::export]
pub fn to_legacy_address(address: String, chain: Chain) -> Result<String, WalletError> {
    let params = chain.params();
    Ok(LockingScriptCodec::new(&params).to_legacy(&address)?)
}

/// Parse a decimal amount such as "0.015" into base units, rounding down
#[uniffi::export]
pub fn parse_amount(amount: String, chain: Chain) -> Result<u64, WalletError> {
    Ok(to_base_units(&amount, chain.decimals(), Rounding::Down)?)
}

/// Format base units as a decimal string
#[uniffi::export]
pub fn format_amount(amount_sat: u64, chain: Chain) -> String {
    from_base_units(amount_sat, chain.decimals())
}

/// Estimate the fee for a transaction with the given input and output types
#[uniffi::export]
pub fn estimate_fee(
    chain: Chain,
    input_types: Vec<ScriptType>,
    output_types: Vec<ScriptType>,
    fee_rate_per_kvb: u64,
) -> u64 {
    let inputs: Vec<ScriptKind> = input_types.into_iter().map(Into::into).collect();
    let outputs: Vec<ScriptKind> = output_types.into_iter().map(Into::into).collect();
    FeeEstimator::new(&chain.params()).estimate(
        &inputs,
        &outputs,
        FeePolicy::Rate(FeeRate::from_per_kvb(fee_rate_per_kvb)),
    )
}

/// Quote the fee for sending `amount_sat` from `utxos`, without a sender key.
/// Dust amounts are allowed; when the balance covers the amount but not the
/// fee, the quote is the fee for sending the whole balance
#[uniffi::export]
pub fn quote_fee(
    chain: Chain,
    utxos: Vec<UtxoData>,
    destination: String,
    amount_sat: u64,
    fee_rate_per_kvb: u64,
) -> Result<FeeQuoteData, WalletError> {
    let params = chain.params();
    let (_, destination) = LockingScriptCodec::new(&params).decode(&destination)?;
    let available = utxos
        .into_iter()
        .map(UnspentOutput::try_from)
        .collect::<Result<UnspentOutputSet, _>>()?;
    // Change returns to the kind of script being spent.
    let change = available
        .iter()
        .next()
        .map(|o| o.script_kind)
        .unwrap_or(destination.kind());
    let selector = CoinSelector::new(
        FeeEstimator::new(&params),
        ChangeCalculator::new(params.dust_threshold),
        SelectionStrategy::LargestFirst,
    );
    let quote = selector.quote(
        &available,
        &SelectionTarget {
            amount: amount_sat,
            destination: destination.kind(),
            change,
            fee: FeePolicy::Rate(FeeRate::from_per_kvb(fee_rate_per_kvb)),
        },
    )?;
    Ok(quote.into())
}

/// Select inputs, size the fee and return the digests the app must sign
#[uniffi::export]
pub fn build_unsigned_transaction(
    chain: Chain,
    sender_public_key: Vec<u8>,
    sender_script_type: ScriptType,
    utxos: Vec<UtxoData>,
    destination: String,
    amount_sat: u64,
    fee_rate_per_kvb: u64,
) -> Result<UnsignedTransactionData, WalletError> {
    let unsigned = prepare_transaction(
        chain,
        &sender_public_key,
        sender_script_type,
        utxos,
        destination,
        amount_sat,
        fee_rate_per_kvb,
    )?;

    let signing_requests = unsigned
        .signing_requests()?
        .into_iter()
        .map(|r| SigningRequestData {
            input_index: r.input_index as u32,
            digest: r.digest.to_vec(),
            schnorr: r.kind == chain_utxo::transaction::SignatureKind::Schnorr,
        })
        .collect();

    Ok(UnsignedTransactionData {
        plan: SpendPlanData::from(unsigned.plan()),
        signing_requests,
        unsigned_hex: hex::encode(unsigned.serialize_unsigned()),
    })
}

/// Rebuild the transaction from the same inputs and insert 64-byte signatures
/// (one per input, in input order)
#[allow(clippy::too_many_arguments)]
#[uniffi::export]
pub fn finalize_transaction(
    chain: Chain,
    sender_public_key: Vec<u8>,
    sender_script_type: ScriptType,
    utxos: Vec<UtxoData>,
    destination: String,
    amount_sat: u64,
    fee_rate_per_kvb: u64,
    signatures: Vec<Vec<u8>>,
) -> Result<SignedTransactionData, WalletError> {
    let unsigned = prepare_transaction(
        chain,
        &sender_public_key,
        sender_script_type,
        utxos,
        destination,
        amount_sat,
        fee_rate_per_kvb,
    )?;
    let signed = unsigned.finalize(&signatures)?;
    Ok(SignedTransactionData {
        txid: signed.txid,
        raw_tx: signed.bytes,
        fee_amount: unsigned.plan().fee_amount,
    })
}

fn prepare_transaction(
    chain: Chain,
    sender_public_key: &[u8],
    sender_script_type: ScriptType,
    utxos: Vec<UtxoData>,
    destination: String,
    amount_sat: u64,
    fee_rate_per_kvb: u64,
) -> Result<UnsignedTransaction, WalletError> {
    let params = chain.params();
    let sender = LockingScriptCodec::new(&params).encode(sender_public_key, sender_script_type.into())?;
    let available = utxos
        .into_iter()
        .map(UnspentOutput::try_from)
        .collect::<Result<UnspentOutputSet, _>>()?;
    let request = SendRequest {
        destination,
        amount: amount_sat,
        fee: FeePolicy::Rate(FeeRate::from_per_kvb(fee_rate_per_kvb)),
    };
    Ok(TransactionBuilder::new(&params, &sender)?.build_unsigned(&available, &request)?)
}
