use chain_utxo::{NetworkParameters, ScriptKind, UnspentOutput};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Supported UTXO networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum Chain {
    Bitcoin,
    BitcoinCash,
    Litecoin,
    Dogecoin,
    Dash,
    Ravencoin,
    Ducatus,
    Radiant,
    Fact0rn,
    // Testnets
    BitcoinTestnet,
    BitcoinCashTestnet,
}

impl Chain {
    pub const ALL: [Chain; 11] = [
        Chain::Bitcoin,
        Chain::BitcoinCash,
        Chain::Litecoin,
        Chain::Dogecoin,
        Chain::Dash,
        Chain::Ravencoin,
        Chain::Ducatus,
        Chain::Radiant,
        Chain::Fact0rn,
        Chain::BitcoinTestnet,
        Chain::BitcoinCashTestnet,
    ];

    /// Network constants for this chain
    pub fn params(&self) -> NetworkParameters {
        match self {
            Chain::Bitcoin => NetworkParameters::BITCOIN,
            Chain::BitcoinCash => NetworkParameters::BITCOIN_CASH,
            Chain::Litecoin => NetworkParameters::LITECOIN,
            Chain::Dogecoin => NetworkParameters::DOGECOIN,
            Chain::Dash => NetworkParameters::DASH,
            Chain::Ravencoin => NetworkParameters::RAVENCOIN,
            Chain::Ducatus => NetworkParameters::DUCATUS,
            Chain::Radiant => NetworkParameters::RADIANT,
            Chain::Fact0rn => NetworkParameters::FACT0RN,
            Chain::BitcoinTestnet => NetworkParameters::BITCOIN_TESTNET,
            Chain::BitcoinCashTestnet => NetworkParameters::BITCOIN_CASH_TESTNET,
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "Bitcoin",
            Chain::BitcoinCash => "Bitcoin Cash",
            Chain::Litecoin => "Litecoin",
            Chain::Dogecoin => "Dogecoin",
            Chain::Dash => "Dash",
            Chain::Ravencoin => "Ravencoin",
            Chain::Ducatus => "Ducatus",
            Chain::Radiant => "Radiant",
            Chain::Fact0rn => "Fact0rn",
            Chain::BitcoinTestnet => "Bitcoin Testnet",
            Chain::BitcoinCashTestnet => "Bitcoin Cash Testnet",
        }
    }

    /// Native token symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Bitcoin | Chain::BitcoinTestnet => "BTC",
            Chain::BitcoinCash | Chain::BitcoinCashTestnet => "BCH",
            Chain::Litecoin => "LTC",
            Chain::Dogecoin => "DOGE",
            Chain::Dash => "DASH",
            Chain::Ravencoin => "RVN",
            Chain::Ducatus => "DUC",
            Chain::Radiant => "RXD",
            Chain::Fact0rn => "FACT",
        }
    }

    /// Decimal places of the base unit
    pub fn decimals(&self) -> u32 {
        8
    }

    /// Whether this is a testnet
    pub fn is_testnet(&self) -> bool {
        matches!(self, Chain::BitcoinTestnet | Chain::BitcoinCashTestnet)
    }
}

/// Locking script families exposed over FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
}

impl From<ScriptType> for ScriptKind {
    fn from(t: ScriptType) -> Self {
        match t {
            ScriptType::P2pkh => ScriptKind::P2pkh,
            ScriptType::P2sh => ScriptKind::P2sh,
            ScriptType::P2wpkh => ScriptKind::P2wpkh,
            ScriptType::P2wsh => ScriptKind::P2wsh,
            ScriptType::P2tr => ScriptKind::P2tr,
        }
    }
}

impl From<ScriptKind> for ScriptType {
    fn from(k: ScriptKind) -> Self {
        match k {
            ScriptKind::P2pkh => ScriptType::P2pkh,
            ScriptKind::P2sh => ScriptType::P2sh,
            ScriptKind::P2wpkh => ScriptType::P2wpkh,
            ScriptKind::P2wsh => ScriptType::P2wsh,
            ScriptKind::P2tr => ScriptType::P2tr,
        }
    }
}

/// Chain summary for the wallet UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct ChainInfo {
    pub chain: Chain,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub is_testnet: bool,
    pub script_types: Vec<ScriptType>,
    pub dust_threshold: u64,
}

impl From<Chain> for ChainInfo {
    fn from(chain: Chain) -> Self {
        let params = chain.params();
        Self {
            chain,
            name: chain.display_name().to_string(),
            symbol: chain.symbol().to_string(),
            decimals: chain.decimals(),
            is_testnet: chain.is_testnet(),
            script_types: params.supported_kinds.iter().copied().map(Into::into).collect(),
            dust_threshold: params.dust_threshold,
        }
    }
}

/// Address derived from a public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct DerivedAddress {
    pub chain: Chain,
    pub address: String,
    pub script_type: ScriptType,
    /// Hex-encoded locking script
    pub script_pubkey: String,
    /// Hex-encoded redeem or witness script, when the address commits to one
    pub redeem_script: Option<String>,
}

/// Unspent output passed in from the app's indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct UtxoData {
    pub txid: String,
    pub vout: u32,
    pub amount_sat: u64,
    pub script_pubkey: Vec<u8>,
}

impl TryFrom<UtxoData> for UnspentOutput {
    type Error = WalletError;

    fn try_from(u: UtxoData) -> Result<Self, Self::Error> {
        Ok(UnspentOutput::new(u.txid, u.vout, u.amount_sat, u.script_pubkey)?)
    }
}

impl From<&UnspentOutput> for UtxoData {
    fn from(o: &UnspentOutput) -> Self {
        Self {
            txid: o.txid.clone(),
            vout: o.vout,
            amount_sat: o.amount,
            script_pubkey: o.script_pubkey.clone(),
        }
    }
}

/// Fee, change and inputs chosen for a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct SpendPlanData {
    pub requested_amount: u64,
    pub fee_amount: u64,
    pub change_amount: u64,
    pub estimated_size: u64,
    pub selected_outputs: Vec<UtxoData>,
}

impl From<&chain_utxo::SpendPlan> for SpendPlanData {
    fn from(plan: &chain_utxo::SpendPlan) -> Self {
        Self {
            requested_amount: plan.requested_amount,
            fee_amount: plan.fee_amount,
            change_amount: plan.change_amount,
            estimated_size: plan.estimated_size,
            selected_outputs: plan.selected_outputs.iter().map(Into::into).collect(),
        }
    }
}

/// Fee quote for a send that has not been built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct FeeQuoteData {
    pub fee_amount: u64,
    pub estimated_size: u64,
    pub input_count: u32,
    pub change_amount: u64,
    /// False when the balance covers the amount but not the fee; the fee is
    /// then the cost of sending the whole balance
    pub fully_funded: bool,
}

impl From<chain_utxo::FeeQuote> for FeeQuoteData {
    fn from(quote: chain_utxo::FeeQuote) -> Self {
        Self {
            fee_amount: quote.fee,
            estimated_size: quote.estimated_size,
            input_count: quote.input_count as u32,
            change_amount: quote.change,
            fully_funded: quote.fully_funded,
        }
    }
}

/// Digest the app must sign for one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct SigningRequestData {
    pub input_index: u32,
    pub digest: Vec<u8>,
    /// True for BIP340 Schnorr (taproot), false for ECDSA
    pub schnorr: bool,
}

/// Unsigned transaction handed back to the app for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct UnsignedTransactionData {
    pub plan: SpendPlanData,
    pub signing_requests: Vec<SigningRequestData>,
    pub unsigned_hex: String,
}

/// Signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct SignedTransactionData {
    pub txid: String,
    pub raw_tx: Vec<u8>,
    pub fee_amount: u64,
}
