use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256, used for transaction ids, legacy sighashes, and
/// Base58Check checksums.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Compute Hash160 (RIPEMD-160(SHA-256(data))), the 20-byte hash committed to
/// by P2PKH, P2SH and P2WPKH scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// First four bytes of the double SHA-256 of `data` (Base58Check checksum).
pub fn checksum4(data: &[u8]) -> [u8; 4] {
    let digest = sha256d(data);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&digest[..4]);
    checksum
}

/// BIP340 tagged hash: SHA-256(SHA-256(tag) || SHA-256(tag) || data).
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}
