//! Standard locking script templates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UtxoError;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Maximum number of keys in a bare `OP_CHECKMULTISIG` redeem script.
pub const MAX_MULTISIG_KEYS: usize = 16;

/// The standard locking script templates the engine can build and spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 5] = [
        ScriptKind::P2pkh,
        ScriptKind::P2sh,
        ScriptKind::P2wpkh,
        ScriptKind::P2wsh,
        ScriptKind::P2tr,
    ];

    /// Whether outputs of this kind are spent through the witness.
    pub fn is_witness(self) -> bool {
        matches!(self, ScriptKind::P2wpkh | ScriptKind::P2wsh | ScriptKind::P2tr)
    }

    /// Segwit version carried by the address, `None` for Base58/CashAddr kinds.
    pub fn witness_version(self) -> Option<u8> {
        match self {
            ScriptKind::P2wpkh | ScriptKind::P2wsh => Some(0),
            ScriptKind::P2tr => Some(1),
            ScriptKind::P2pkh | ScriptKind::P2sh => None,
        }
    }

    /// Length of the hash or witness program committed to by the script.
    pub fn payload_len(self) -> usize {
        match self {
            ScriptKind::P2pkh | ScriptKind::P2sh | ScriptKind::P2wpkh => 20,
            ScriptKind::P2wsh | ScriptKind::P2tr => 32,
        }
    }

    /// Recognise one of the standard templates from raw script bytes.
    pub fn classify(script: &[u8]) -> Option<ScriptKind> {
        match script {
            [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                Some(ScriptKind::P2pkh)
            }
            [OP_HASH160, 0x14, hash @ .., OP_EQUAL] if hash.len() == 20 => Some(ScriptKind::P2sh),
            [OP_0, 0x14, program @ ..] if program.len() == 20 => Some(ScriptKind::P2wpkh),
            [OP_0, 0x20, program @ ..] if program.len() == 32 => Some(ScriptKind::P2wsh),
            [OP_1, 0x20, program @ ..] if program.len() == 32 => Some(ScriptKind::P2tr),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::P2pkh => write!(f, "p2pkh"),
            ScriptKind::P2sh => write!(f, "p2sh"),
            ScriptKind::P2wpkh => write!(f, "p2wpkh"),
            ScriptKind::P2wsh => write!(f, "p2wsh"),
            ScriptKind::P2tr => write!(f, "p2tr"),
        }
    }
}

/// A standard locking script (scriptPubKey) together with its template.
///
/// Serialized as the raw script bytes; deserializing reclassifies them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct LockingScript {
    kind: ScriptKind,
    bytes: Vec<u8>,
}

impl LockingScript {
    /// Build the locking script of `kind` committing to `payload` (a hash,
    /// witness program or x-only output key).
    pub fn from_payload(kind: ScriptKind, payload: &[u8]) -> Result<Self, UtxoError> {
        if payload.len() != kind.payload_len() {
            return Err(UtxoError::EncodingFailure(format!(
                "{kind} expects a {}-byte payload, got {}",
                kind.payload_len(),
                payload.len()
            )));
        }

        let mut bytes = Vec::with_capacity(payload.len() + 5);
        match kind {
            ScriptKind::P2pkh => {
                bytes.extend_from_slice(&[OP_DUP, OP_HASH160]);
                push_data(&mut bytes, payload);
                bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            }
            ScriptKind::P2sh => {
                bytes.push(OP_HASH160);
                push_data(&mut bytes, payload);
                bytes.push(OP_EQUAL);
            }
            ScriptKind::P2wpkh | ScriptKind::P2wsh => {
                bytes.push(OP_0);
                push_data(&mut bytes, payload);
            }
            ScriptKind::P2tr => {
                bytes.push(OP_1);
                push_data(&mut bytes, payload);
            }
        }

        Ok(Self { kind, bytes })
    }

    /// Wrap raw script bytes, rejecting anything that is not a standard template.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, UtxoError> {
        let kind = ScriptKind::classify(&bytes).ok_or_else(|| {
            UtxoError::EncodingFailure(format!(
                "unrecognised locking script {}",
                hex::encode(&bytes)
            ))
        })?;
        Ok(Self { kind, bytes })
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The committed hash or witness program.
    pub fn payload(&self) -> &[u8] {
        let start = match self.kind {
            ScriptKind::P2pkh => 3,
            _ => 2,
        };
        &self.bytes[start..start + self.kind.payload_len()]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl TryFrom<Vec<u8>> for LockingScript {
    type Error = UtxoError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<LockingScript> for Vec<u8> {
    fn from(script: LockingScript) -> Self {
        script.bytes
    }
}

impl AsRef<[u8]> for LockingScript {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Append `data` to `script` behind the minimal push opcode for its length.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// `<pubkey> OP_CHECKSIG`
pub fn pay_to_pubkey_script(public_key: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(public_key.len() + 2);
    push_data(&mut script, public_key);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_m <key>... OP_n OP_CHECKMULTISIG` over keys in the order given.
pub fn multisig_script(public_keys: &[[u8; 33]], required: u8) -> Result<Vec<u8>, UtxoError> {
    let total = public_keys.len();
    if total == 0 || total > MAX_MULTISIG_KEYS {
        return Err(UtxoError::EncodingFailure(format!(
            "multisig needs 1 to {MAX_MULTISIG_KEYS} keys, got {total}"
        )));
    }
    if required == 0 || required as usize > total {
        return Err(UtxoError::EncodingFailure(format!(
            "multisig threshold {required} out of range for {total} keys"
        )));
    }

    let mut script = Vec::with_capacity(3 + total * 34);
    script.push(OP_1 + required - 1);
    for key in public_keys {
        push_data(&mut script, key);
    }
    script.push(OP_1 + total as u8 - 1);
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

/// Threshold and key count of a bare multisig script, if `script` is one.
pub fn multisig_threshold(script: &[u8]) -> Option<(u8, u8)> {
    match script {
        [m @ OP_1..=OP_16, .., n @ OP_1..=OP_16, OP_CHECKMULTISIG] => {
            Some((m - OP_1 + 1, n - OP_1 + 1))
        }
        _ => None,
    }
}
