//! Per-chain constants.
//!
//! Everything that distinguishes one UTXO chain from another lives in a
//! [`NetworkParameters`] value. Presets for the built-in chains are `const`;
//! further chains can be loaded from JSON with [`NetworkParameters::from_json`].

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::UtxoError;
use crate::script::ScriptKind;

/// Default dust threshold in base units.
pub const DEFAULT_DUST_THRESHOLD: u64 = 546;

/// Default fixed transaction overhead in bytes (version, counts, lock time).
pub const DEFAULT_TX_OVERHEAD_BYTES: u64 = 10;

const LEGACY_KINDS: &[ScriptKind] = &[ScriptKind::P2pkh, ScriptKind::P2sh];
const P2PKH_ONLY: &[ScriptKind] = &[ScriptKind::P2pkh];
const SEGWIT_V0_KINDS: &[ScriptKind] = &[
    ScriptKind::P2pkh,
    ScriptKind::P2sh,
    ScriptKind::P2wpkh,
    ScriptKind::P2wsh,
];

fn default_tx_version() -> u32 {
    2
}

fn default_tx_overhead_bytes() -> u64 {
    DEFAULT_TX_OVERHEAD_BYTES
}

fn default_dust_threshold() -> u64 {
    DEFAULT_DUST_THRESHOLD
}

/// Address and transaction constants for one UTXO network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    /// Human-readable network name, used in errors and logs.
    pub name: Cow<'static, str>,
    /// Base58Check version byte for P2PKH addresses.
    pub p2pkh_version: u8,
    /// Base58Check version byte for P2SH addresses.
    pub p2sh_version: u8,
    /// Bech32 human-readable part; `None` on chains without segwit.
    #[serde(default)]
    pub hrp: Option<Cow<'static, str>>,
    /// CashAddr prefix; when set, P2PKH/P2SH addresses display as CashAddr.
    #[serde(default)]
    pub cashaddr_prefix: Option<Cow<'static, str>>,
    /// Script kinds this chain accepts for encoding, decoding and spending.
    pub supported_kinds: Cow<'static, [ScriptKind]>,
    /// Hash the compressed key for P2PKH/P2SH even when an uncompressed
    /// key is supplied. Witness kinds always use the compressed key.
    #[serde(default)]
    pub compress_public_keys: bool,
    #[serde(default = "default_tx_version")]
    pub tx_version: u32,
    /// Replay-protection fork id; `Some` selects the forkid digest.
    #[serde(default)]
    pub fork_id: Option<u32>,
    #[serde(default = "default_tx_overhead_bytes")]
    pub tx_overhead_bytes: u64,
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: u64,
}

impl NetworkParameters {
    pub const BITCOIN: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("bitcoin"),
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        hrp: Some(Cow::Borrowed("bc")),
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(&ScriptKind::ALL),
        compress_public_keys: false,
        tx_version: 2,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const BITCOIN_TESTNET: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("bitcoin-testnet"),
        p2pkh_version: 0x6f,
        p2sh_version: 0xc4,
        hrp: Some(Cow::Borrowed("tb")),
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(&ScriptKind::ALL),
        compress_public_keys: false,
        tx_version: 2,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const LITECOIN: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("litecoin"),
        p2pkh_version: 0x30,
        p2sh_version: 0x32,
        hrp: Some(Cow::Borrowed("ltc")),
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(SEGWIT_V0_KINDS),
        compress_public_keys: false,
        tx_version: 2,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const BITCOIN_CASH: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("bitcoin-cash"),
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        hrp: None,
        cashaddr_prefix: Some(Cow::Borrowed("bitcoincash")),
        supported_kinds: Cow::Borrowed(LEGACY_KINDS),
        compress_public_keys: true,
        tx_version: 2,
        fork_id: Some(0),
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const BITCOIN_CASH_TESTNET: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("bitcoin-cash-testnet"),
        p2pkh_version: 0x6f,
        p2sh_version: 0xc4,
        hrp: None,
        cashaddr_prefix: Some(Cow::Borrowed("bchtest")),
        supported_kinds: Cow::Borrowed(LEGACY_KINDS),
        compress_public_keys: true,
        tx_version: 2,
        fork_id: Some(0),
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const DOGECOIN: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("dogecoin"),
        p2pkh_version: 0x1e,
        p2sh_version: 0x16,
        hrp: None,
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(LEGACY_KINDS),
        compress_public_keys: true,
        tx_version: 1,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: 1_000_000,
    };

    pub const DASH: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("dash"),
        p2pkh_version: 0x4c,
        p2sh_version: 0x10,
        hrp: None,
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(LEGACY_KINDS),
        compress_public_keys: true,
        tx_version: 2,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const RAVENCOIN: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("ravencoin"),
        p2pkh_version: 0x3c,
        p2sh_version: 0x7a,
        hrp: None,
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(LEGACY_KINDS),
        compress_public_keys: true,
        tx_version: 2,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const DUCATUS: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("ducatus"),
        p2pkh_version: 0x31,
        p2sh_version: 0x33,
        hrp: None,
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(P2PKH_ONLY),
        compress_public_keys: true,
        tx_version: 1,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const RADIANT: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("radiant"),
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        hrp: None,
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(P2PKH_ONLY),
        compress_public_keys: true,
        tx_version: 1,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    pub const FACT0RN: NetworkParameters = NetworkParameters {
        name: Cow::Borrowed("fact0rn"),
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        hrp: Some(Cow::Borrowed("fact")),
        cashaddr_prefix: None,
        supported_kinds: Cow::Borrowed(&[ScriptKind::P2wpkh]),
        compress_public_keys: true,
        tx_version: 2,
        fork_id: None,
        tx_overhead_bytes: DEFAULT_TX_OVERHEAD_BYTES,
        dust_threshold: DEFAULT_DUST_THRESHOLD,
    };

    /// Load and validate parameters for a network not covered by the presets.
    pub fn from_json(json: &str) -> Result<Self, UtxoError> {
        let params: NetworkParameters = serde_json::from_str(json)
            .map_err(|e| UtxoError::InvalidNetworkParameters(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Check that the parameters describe a usable network.
    pub fn validate(&self) -> Result<(), UtxoError> {
        if self.name.is_empty() {
            return Err(UtxoError::InvalidNetworkParameters("empty name".into()));
        }
        if self.supported_kinds.is_empty() {
            return Err(UtxoError::InvalidNetworkParameters(format!(
                "{} supports no script kinds",
                self.name
            )));
        }
        if self.supports(ScriptKind::P2pkh)
            && self.supports(ScriptKind::P2sh)
            && self.p2pkh_version == self.p2sh_version
        {
            return Err(UtxoError::InvalidNetworkParameters(format!(
                "{} uses version byte {:#04x} for both P2PKH and P2SH",
                self.name, self.p2pkh_version
            )));
        }
        match self.hrp.as_deref() {
            Some(hrp) => {
                bech32::Hrp::parse(hrp).map_err(|e| {
                    UtxoError::InvalidNetworkParameters(format!("invalid hrp {hrp:?}: {e}"))
                })?;
                if hrp.chars().any(|c| c.is_ascii_uppercase()) {
                    return Err(UtxoError::InvalidNetworkParameters(format!(
                        "hrp {hrp:?} must be lowercase"
                    )));
                }
            }
            None => {
                if let Some(kind) = self.supported_kinds.iter().find(|k| k.is_witness()) {
                    return Err(UtxoError::InvalidNetworkParameters(format!(
                        "{} supports {kind} but has no hrp",
                        self.name
                    )));
                }
            }
        }
        if let Some(prefix) = self.cashaddr_prefix.as_deref() {
            if prefix.is_empty()
                || !prefix
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            {
                return Err(UtxoError::InvalidNetworkParameters(format!(
                    "invalid cashaddr prefix {prefix:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn supports(&self, kind: ScriptKind) -> bool {
        self.supported_kinds.contains(&kind)
    }

    /// Base58Check version byte for a legacy kind.
    pub fn legacy_version(&self, kind: ScriptKind) -> Option<u8> {
        match kind {
            ScriptKind::P2pkh => Some(self.p2pkh_version),
            ScriptKind::P2sh => Some(self.p2sh_version),
            _ => None,
        }
    }

    pub fn hrp(&self) -> Option<&str> {
        self.hrp.as_deref()
    }

    pub fn cashaddr_prefix(&self) -> Option<&str> {
        self.cashaddr_prefix.as_deref()
    }

    /// Segwit chains nest single-key P2SH as P2WPKH; others wrap a bare P2PK.
    pub fn has_segwit(&self) -> bool {
        self.hrp.is_some()
    }
}
