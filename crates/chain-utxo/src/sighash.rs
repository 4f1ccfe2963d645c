//! Signature digests.
//!
//! Three schemes are supported: the legacy pre-segwit digest, the BIP143
//! digest (segwit v0 inputs, and every input on fork-id chains), and the
//! BIP341 key-path digest for taproot inputs.

use crypto_utils::hash::{sha256, sha256d, tagged_hash};

use crate::error::UtxoError;
use crate::transaction::{write_compact_size, write_var_bytes, TxInput, TxOutput};

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_FORKID: u32 = 0x40;

/// BIP341 `SIGHASH_DEFAULT`; signatures carry no trailing hash type byte.
pub const SIGHASH_DEFAULT: u8 = 0x00;

/// Which digest an input is signed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestScheme {
    Legacy,
    SegwitV0,
    Taproot,
}

/// The transaction fields every digest commits to.
#[derive(Debug, Clone, Copy)]
pub struct SighashContext<'a> {
    pub version: u32,
    pub lock_time: u32,
    pub inputs: &'a [TxInput],
    pub outputs: &'a [TxOutput],
}

impl<'a> SighashContext<'a> {
    fn input(&self, index: usize) -> Result<&'a TxInput, UtxoError> {
        self.inputs.get(index).ok_or_else(|| {
            UtxoError::SigningError(format!(
                "input index {index} out of range for {} inputs",
                self.inputs.len()
            ))
        })
    }

    /// Pre-segwit digest with `script_code` in place of the signed input's script.
    pub fn legacy(
        &self,
        index: usize,
        script_code: &[u8],
        sighash_type: u32,
    ) -> Result<[u8; 32], UtxoError> {
        self.input(index)?;

        let mut buf = Vec::with_capacity(128 + self.inputs.len() * 41);
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut buf, self.inputs.len() as u64);
        for (i, input) in self.inputs.iter().enumerate() {
            input.write_outpoint(&mut buf);
            if i == index {
                write_var_bytes(&mut buf, script_code);
            } else {
                write_compact_size(&mut buf, 0);
            }
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in self.outputs {
            output.write_to(&mut buf);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(&sighash_type.to_le_bytes());
        Ok(sha256d(&buf))
    }

    /// BIP143 digest. Fork-id chains pass a hash type with `SIGHASH_FORKID` set.
    pub fn segwit_v0(
        &self,
        index: usize,
        script_code: &[u8],
        sighash_type: u32,
    ) -> Result<[u8; 32], UtxoError> {
        let input = self.input(index)?;

        let mut prevouts = Vec::with_capacity(self.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(self.inputs.len() * 4);
        for i in self.inputs {
            i.write_outpoint(&mut prevouts);
            sequences.extend_from_slice(&i.sequence.to_le_bytes());
        }
        let mut outputs = Vec::new();
        for output in self.outputs {
            output.write_to(&mut outputs);
        }

        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&sha256d(&prevouts));
        buf.extend_from_slice(&sha256d(&sequences));
        input.write_outpoint(&mut buf);
        write_var_bytes(&mut buf, script_code);
        buf.extend_from_slice(&input.amount.to_le_bytes());
        buf.extend_from_slice(&input.sequence.to_le_bytes());
        buf.extend_from_slice(&sha256d(&outputs));
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(&sighash_type.to_le_bytes());
        Ok(sha256d(&buf))
    }

    /// BIP341 key-path digest with `SIGHASH_DEFAULT` and no annex.
    pub fn taproot_key_path(&self, index: usize) -> Result<[u8; 32], UtxoError> {
        self.input(index)?;

        let mut prevouts = Vec::with_capacity(self.inputs.len() * 36);
        let mut amounts = Vec::with_capacity(self.inputs.len() * 8);
        let mut script_pubkeys = Vec::new();
        let mut sequences = Vec::with_capacity(self.inputs.len() * 4);
        for input in self.inputs {
            input.write_outpoint(&mut prevouts);
            amounts.extend_from_slice(&input.amount.to_le_bytes());
            write_var_bytes(&mut script_pubkeys, &input.script_pubkey);
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }
        let mut outputs = Vec::new();
        for output in self.outputs {
            output.write_to(&mut outputs);
        }

        let mut msg = Vec::with_capacity(1 + 1 + 8 + 5 * 32 + 1 + 4);
        // Epoch.
        msg.push(0x00);
        msg.push(SIGHASH_DEFAULT);
        msg.extend_from_slice(&self.version.to_le_bytes());
        msg.extend_from_slice(&self.lock_time.to_le_bytes());
        msg.extend_from_slice(&sha256(&prevouts));
        msg.extend_from_slice(&sha256(&amounts));
        msg.extend_from_slice(&sha256(&script_pubkeys));
        msg.extend_from_slice(&sha256(&sequences));
        msg.extend_from_slice(&sha256(&outputs));
        // Spend type: key path, no annex.
        msg.push(0x00);
        msg.extend_from_slice(&(index as u32).to_le_bytes());
        Ok(tagged_hash("TapSighash", &msg))
    }
}

/// Hash type committed to by ECDSA signatures on a chain.
pub fn ecdsa_sighash_type(fork_id: Option<u32>) -> u32 {
    match fork_id {
        Some(id) => SIGHASH_ALL | SIGHASH_FORKID | (id << 8),
        None => SIGHASH_ALL,
    }
}
