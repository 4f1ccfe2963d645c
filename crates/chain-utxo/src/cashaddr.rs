//! CashAddr encoding for Bitcoin Cash style chains.
//!
//! `prefix:payload` where the payload is base32 over a version byte and a
//! hash, protected by a 40-bit BCH checksum that also covers the prefix.

use crate::error::UtxoError;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const GENERATORS: [u64; 5] = [
    0x98_f2bc_8e61,
    0x79_b76d_99e2,
    0xf3_3e5f_b3c4,
    0xae_2eab_e2a8,
    0x1e_4f43_e470,
];

const CHECKSUM_LEN: usize = 8;

/// Version byte type bits for P2PKH payloads.
pub const VERSION_P2PKH: u8 = 0x00;

/// Version byte type bits for P2SH payloads.
pub const VERSION_P2SH: u8 = 0x08;

/// A decoded CashAddr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashAddr {
    pub prefix: String,
    pub version: u8,
    pub hash: Vec<u8>,
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
        for (i, generator) in GENERATORS.iter().enumerate() {
            if c0 & (1 << i) != 0 {
                c ^= generator;
            }
        }
    }
    c ^ 1
}

fn expand_prefix(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

/// Regroup `data` from `from`-bit to `to`-bit words.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        if u32::from(value) >> from != 0 {
            return None;
        }
        acc = (acc << from) | u32::from(value);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max) as u8);
        }
    } else if bits >= from || (acc << (to - bits)) & max != 0 {
        return None;
    }
    Some(out)
}

/// Hash length encoded in the low three bits of the version byte.
fn hash_len_for(version: u8) -> usize {
    match version & 0x07 {
        0 => 20,
        1 => 24,
        2 => 28,
        3 => 32,
        4 => 40,
        5 => 48,
        6 => 56,
        _ => 64,
    }
}

fn size_bits_for(hash_len: usize) -> Option<u8> {
    match hash_len {
        20 => Some(0),
        24 => Some(1),
        28 => Some(2),
        32 => Some(3),
        40 => Some(4),
        48 => Some(5),
        56 => Some(6),
        64 => Some(7),
        _ => None,
    }
}

/// Encode `hash` under `prefix` with the given type bits (`VERSION_P2PKH`
/// or `VERSION_P2SH`). The size bits of the version byte are derived from
/// the hash length.
pub fn encode(prefix: &str, type_bits: u8, hash: &[u8]) -> Result<String, UtxoError> {
    let size_bits = size_bits_for(hash.len()).ok_or_else(|| {
        UtxoError::EncodingFailure(format!("cashaddr cannot carry a {}-byte hash", hash.len()))
    })?;

    let mut payload = Vec::with_capacity(hash.len() + 1);
    payload.push(type_bits | size_bits);
    payload.extend_from_slice(hash);
    let data = convert_bits(&payload, 8, 5, true)
        .ok_or_else(|| UtxoError::EncodingFailure("cashaddr bit conversion failed".into()))?;

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend_from_slice(&data);
    checksum_input.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let checksum = polymod(&checksum_input);

    let mut address = String::with_capacity(prefix.len() + 1 + data.len() + CHECKSUM_LEN);
    address.push_str(prefix);
    address.push(':');
    for &d in &data {
        address.push(CHARSET[d as usize] as char);
    }
    for i in 0..CHECKSUM_LEN {
        let d = (checksum >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f;
        address.push(CHARSET[d as usize] as char);
    }
    Ok(address)
}

/// Decode a CashAddr. A missing prefix is taken to be `default_prefix`.
/// Mixed-case input is rejected.
pub fn decode(address: &str, default_prefix: &str) -> Result<CashAddr, UtxoError> {
    let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(UtxoError::WrongAddress("cashaddr has mixed case".into()));
    }
    let lowered = address.to_ascii_lowercase();

    let (prefix, body) = match lowered.rsplit_once(':') {
        Some((prefix, body)) => (prefix.to_string(), body),
        None => (default_prefix.to_string(), lowered.as_str()),
    };
    if prefix.is_empty() || body.len() <= CHECKSUM_LEN {
        return Err(UtxoError::WrongAddress("cashaddr too short".into()));
    }

    let mut data = Vec::with_capacity(body.len());
    for c in body.bytes() {
        let value = CHARSET.iter().position(|&x| x == c).ok_or_else(|| {
            UtxoError::WrongAddress(format!("invalid cashaddr character {:?}", c as char))
        })?;
        data.push(value as u8);
    }

    let mut checksum_input = expand_prefix(&prefix);
    checksum_input.extend_from_slice(&data);
    if polymod(&checksum_input) != 0 {
        return Err(UtxoError::WrongAddress("invalid cashaddr checksum".into()));
    }

    let payload = convert_bits(&data[..data.len() - CHECKSUM_LEN], 5, 8, false)
        .ok_or_else(|| UtxoError::WrongAddress("invalid cashaddr padding".into()))?;
    let (&version, hash) = payload
        .split_first()
        .ok_or_else(|| UtxoError::WrongAddress("empty cashaddr payload".into()))?;
    if version & 0x80 != 0 {
        return Err(UtxoError::WrongAddress("reserved cashaddr version bit set".into()));
    }
    if hash.len() != hash_len_for(version) {
        return Err(UtxoError::WrongAddress(format!(
            "cashaddr hash length {} does not match version byte {version:#04x}",
            hash.len()
        )));
    }

    Ok(CashAddr {
        prefix,
        version,
        hash: hash.to_vec(),
    })
}
