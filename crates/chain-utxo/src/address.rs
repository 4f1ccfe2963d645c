//! Address encoding and decoding.
//!
//! [`LockingScriptCodec`] turns a public key into a locking script and its
//! display address, and turns an address string back into the locking
//! script it denotes. Base58Check, CashAddr and Bech32/Bech32m forms are
//! chosen from the chain's [`NetworkParameters`].

use bech32::{Fe32, Hrp};
use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{Secp256k1, XOnlyPublicKey};
use crypto_utils::hash::{checksum4, hash160, sha256};
use crypto_utils::keys::{compress_public_key, parse_public_key, x_only_public_key};
use tracing::debug;

use crate::cashaddr;
use crate::error::UtxoError;
use crate::network::NetworkParameters;
use crate::script::{multisig_script, pay_to_pubkey_script, LockingScript, ScriptKind};

const BASE58_PAYLOAD_LEN: usize = 21;

/// A derived address and everything needed to spend from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display string (Base58Check, CashAddr or Bech32).
    pub display_value: String,
    pub script_kind: ScriptKind,
    /// The key the address was derived from, as supplied.
    pub public_key: Vec<u8>,
    pub locking_script: LockingScript,
    /// P2SH redeem script or P2WSH witness script.
    pub redeem_script: Option<Vec<u8>>,
}

/// Chain-parameterised codec between keys, locking scripts and addresses.
#[derive(Debug, Clone, Copy)]
pub struct LockingScriptCodec<'a> {
    params: &'a NetworkParameters,
}

impl<'a> LockingScriptCodec<'a> {
    pub fn new(params: &'a NetworkParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &'a NetworkParameters {
        self.params
    }

    /// Derive the address of `kind` for `public_key`.
    ///
    /// Single-key P2SH nests a P2WPKH program on segwit chains and wraps a
    /// bare `<key> OP_CHECKSIG` elsewhere. Single-key P2WSH commits to
    /// `<key> OP_CHECKSIG`. P2TR uses the BIP86 key-path tweak.
    pub fn encode(&self, public_key: &[u8], kind: ScriptKind) -> Result<Address, UtxoError> {
        self.require_supported(kind)?;
        parse_public_key(public_key)?;

        let (locking_script, redeem_script) = match kind {
            ScriptKind::P2pkh => {
                let key = self.legacy_key(public_key)?;
                (
                    LockingScript::from_payload(kind, &hash160(&key))?,
                    None,
                )
            }
            ScriptKind::P2sh => {
                let redeem = if self.params.has_segwit() {
                    let compressed = compress_public_key(public_key)?;
                    LockingScript::from_payload(ScriptKind::P2wpkh, &hash160(&compressed))?
                        .into_bytes()
                } else {
                    pay_to_pubkey_script(&self.legacy_key(public_key)?)
                };
                (
                    LockingScript::from_payload(kind, &hash160(&redeem))?,
                    Some(redeem),
                )
            }
            ScriptKind::P2wpkh => {
                let compressed = compress_public_key(public_key)?;
                (
                    LockingScript::from_payload(kind, &hash160(&compressed))?,
                    None,
                )
            }
            ScriptKind::P2wsh => {
                let compressed = compress_public_key(public_key)?;
                let witness_script = pay_to_pubkey_script(&compressed);
                (
                    LockingScript::from_payload(kind, &sha256(&witness_script))?,
                    Some(witness_script),
                )
            }
            ScriptKind::P2tr => {
                let output_key = taproot_output_key(public_key)?;
                (LockingScript::from_payload(kind, &output_key)?, None)
            }
        };

        let display_value = self.address_for_script(&locking_script)?;
        debug!(network = %self.params.name, %kind, address = %display_value, "derived address");

        Ok(Address {
            display_value,
            script_kind: kind,
            public_key: public_key.to_vec(),
            locking_script,
            redeem_script,
        })
    }

    /// Derive an m-of-n multisig address over `public_keys`.
    ///
    /// Keys are compressed and sorted lexicographically before building the
    /// redeem script, so the result does not depend on input order.
    pub fn encode_multisig(
        &self,
        public_keys: &[Vec<u8>],
        required: u8,
        kind: ScriptKind,
    ) -> Result<Address, UtxoError> {
        if !matches!(kind, ScriptKind::P2sh | ScriptKind::P2wsh) {
            return Err(UtxoError::EncodingFailure(format!(
                "multisig cannot be encoded as {kind}"
            )));
        }
        self.require_supported(kind)?;
        let first = public_keys
            .first()
            .ok_or_else(|| UtxoError::InvalidPublicKey("no keys supplied".into()))?;

        let mut keys = public_keys
            .iter()
            .map(|key| compress_public_key(key))
            .collect::<Result<Vec<_>, _>>()?;
        keys.sort();
        let redeem = multisig_script(&keys, required)?;

        let locking_script = match kind {
            ScriptKind::P2sh => LockingScript::from_payload(kind, &hash160(&redeem))?,
            _ => LockingScript::from_payload(kind, &sha256(&redeem))?,
        };
        let display_value = self.address_for_script(&locking_script)?;
        debug!(
            network = %self.params.name,
            %kind,
            required,
            keys = keys.len(),
            "derived multisig address"
        );

        Ok(Address {
            display_value,
            script_kind: kind,
            public_key: first.clone(),
            locking_script,
            redeem_script: Some(redeem),
        })
    }

    /// Decode an address into its version byte and locking script.
    ///
    /// The version is the Base58Check version byte, the CashAddr version
    /// byte, or the segwit witness version, depending on the encoding.
    pub fn decode(&self, address: &str) -> Result<(u8, LockingScript), UtxoError> {
        if address.is_empty() {
            return Err(UtxoError::WrongAddress("empty address".into()));
        }

        if let Some(expected_hrp) = self.params.hrp() {
            if let Ok((hrp, version, program)) = bech32::segwit::decode(address) {
                if hrp.to_lowercase() != expected_hrp {
                    return Err(UtxoError::WrongAddress(format!(
                        "address is for hrp {hrp}, expected {expected_hrp}"
                    )));
                }
                let version = version.to_u8();
                return Ok((version, self.witness_script(version, &program)?));
            }
        }

        if let Some(prefix) = self.params.cashaddr_prefix() {
            if looks_like_cashaddr(address) {
                return self.decode_cashaddr(address, prefix);
            }
        }

        self.decode_base58(address)
    }

    /// Whether `address` decodes to a script kind this chain supports.
    pub fn validate(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }

    /// Electrum-style script hash: SHA-256 of the locking script, byte
    /// reversed, upper-case hex.
    pub fn script_hash(&self, address: &str) -> Result<String, UtxoError> {
        let (_, script) = self.decode(address)?;
        Ok(electrum_script_hash(script.as_bytes()))
    }

    /// Render a P2PKH or P2SH address in Base58Check form, converting from
    /// CashAddr where necessary.
    pub fn to_legacy(&self, address: &str) -> Result<String, UtxoError> {
        let (_, script) = self.decode(address)?;
        let version = self.params.legacy_version(script.kind()).ok_or_else(|| {
            UtxoError::EncodingFailure(format!("{} has no legacy form", script.kind()))
        })?;
        Ok(base58_check_encode(version, script.payload()))
    }

    /// The display address for a locking script on this chain.
    pub fn address_for_script(&self, script: &LockingScript) -> Result<String, UtxoError> {
        let kind = script.kind();
        self.require_supported(kind)?;

        match kind.witness_version() {
            Some(version) => {
                let hrp = self.params.hrp().ok_or_else(|| {
                    UtxoError::EncodingFailure(format!("{} has no hrp", self.params.name))
                })?;
                let hrp = Hrp::parse(hrp)
                    .map_err(|e| UtxoError::EncodingFailure(format!("invalid hrp: {e}")))?;
                let version = Fe32::try_from(version)
                    .map_err(|e| UtxoError::EncodingFailure(format!("witness version: {e}")))?;
                bech32::segwit::encode(hrp, version, script.payload())
                    .map_err(|e| UtxoError::EncodingFailure(format!("bech32 encoding: {e}")))
            }
            None => match self.params.cashaddr_prefix() {
                Some(prefix) => {
                    let type_bits = match kind {
                        ScriptKind::P2sh => cashaddr::VERSION_P2SH,
                        _ => cashaddr::VERSION_P2PKH,
                    };
                    cashaddr::encode(prefix, type_bits, script.payload())
                }
                None => {
                    let version = self.version_byte(kind);
                    Ok(base58_check_encode(version, script.payload()))
                }
            },
        }
    }

    fn decode_base58(&self, address: &str) -> Result<(u8, LockingScript), UtxoError> {
        let (version, hash) = base58_check_decode(address)?;
        if hash.len() != BASE58_PAYLOAD_LEN - 1 {
            return Err(UtxoError::WrongAddress(format!(
                "unexpected payload length {}",
                hash.len() + 1
            )));
        }
        let kind = if version == self.params.p2pkh_version {
            ScriptKind::P2pkh
        } else if version == self.params.p2sh_version {
            ScriptKind::P2sh
        } else {
            return Err(self.unsupported(version));
        };
        if !self.params.supports(kind) {
            return Err(self.unsupported(version));
        }
        Ok((version, LockingScript::from_payload(kind, &hash)?))
    }

    fn decode_cashaddr(
        &self,
        address: &str,
        prefix: &str,
    ) -> Result<(u8, LockingScript), UtxoError> {
        let decoded = cashaddr::decode(address, prefix)?;
        if decoded.prefix != prefix {
            return Err(UtxoError::WrongAddress(format!(
                "address is for prefix {}, expected {prefix}",
                decoded.prefix
            )));
        }
        let kind = match decoded.version & 0x78 {
            cashaddr::VERSION_P2PKH => ScriptKind::P2pkh,
            cashaddr::VERSION_P2SH => ScriptKind::P2sh,
            _ => return Err(self.unsupported(decoded.version)),
        };
        if !self.params.supports(kind) {
            return Err(self.unsupported(decoded.version));
        }
        // Only 160-bit hashes are spendable by the standard templates.
        let script = LockingScript::from_payload(kind, &decoded.hash)
            .map_err(|_| self.unsupported(decoded.version))?;
        Ok((decoded.version, script))
    }

    fn witness_script(&self, version: u8, program: &[u8]) -> Result<LockingScript, UtxoError> {
        let kind = match (version, program.len()) {
            (0, 20) => ScriptKind::P2wpkh,
            (0, 32) => ScriptKind::P2wsh,
            (1, 32) => ScriptKind::P2tr,
            _ => return Err(self.unsupported(version)),
        };
        if !self.params.supports(kind) {
            return Err(self.unsupported(version));
        }
        LockingScript::from_payload(kind, program)
    }

    fn require_supported(&self, kind: ScriptKind) -> Result<(), UtxoError> {
        if self.params.supports(kind) {
            Ok(())
        } else {
            Err(self.unsupported(self.version_byte(kind)))
        }
    }

    fn version_byte(&self, kind: ScriptKind) -> u8 {
        match kind {
            ScriptKind::P2pkh => self.params.p2pkh_version,
            ScriptKind::P2sh => self.params.p2sh_version,
            ScriptKind::P2wpkh | ScriptKind::P2wsh => 0,
            ScriptKind::P2tr => 1,
        }
    }

    fn unsupported(&self, version: u8) -> UtxoError {
        UtxoError::UnsupportedScriptVersion {
            version,
            network: self.params.name.to_string(),
        }
    }

    /// Key bytes hashed by legacy templates: compressed when the chain asks
    /// for it, otherwise exactly as supplied.
    fn legacy_key(&self, public_key: &[u8]) -> Result<Vec<u8>, UtxoError> {
        if self.params.compress_public_keys {
            Ok(compress_public_key(public_key)?.to_vec())
        } else {
            Ok(public_key.to_vec())
        }
    }
}

/// BIP86 output key: the x-only internal key tweaked with an empty script tree.
fn taproot_output_key(public_key: &[u8]) -> Result<[u8; 32], UtxoError> {
    let x_only = x_only_public_key(public_key)?;
    let internal = XOnlyPublicKey::from_slice(&x_only)
        .map_err(|e| UtxoError::InvalidPublicKey(format!("x-only key: {e}")))?;
    let secp = Secp256k1::verification_only();
    let (tweaked, _parity) = internal.tap_tweak(&secp, None);
    Ok(tweaked.to_inner().serialize())
}

fn looks_like_cashaddr(address: &str) -> bool {
    address.contains(':')
        || matches!(address.as_bytes().first(), Some(b'q' | b'p' | b'Q' | b'P'))
}

/// Electrum script hash of raw locking script bytes.
pub fn electrum_script_hash(script: &[u8]) -> String {
    let mut digest = sha256(script);
    digest.reverse();
    hex::encode_upper(digest)
}

/// Base58Check-encode `version || payload`.
pub fn base58_check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = checksum4(&data);
    data.extend_from_slice(&checksum);
    bs58::encode(data).into_string()
}

/// Decode a Base58Check string into its version byte and payload.
pub fn base58_check_decode(address: &str) -> Result<(u8, Vec<u8>), UtxoError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| UtxoError::WrongAddress(format!("base58 decoding failed: {e}")))?;
    if data.len() < 5 {
        return Err(UtxoError::WrongAddress("base58 payload too short".into()));
    }
    let (body, checksum) = data.split_at(data.len() - 4);
    if checksum != checksum4(body) {
        return Err(UtxoError::WrongAddress("invalid checksum".into()));
    }
    Ok((body[0], body[1..].to_vec()))
}
