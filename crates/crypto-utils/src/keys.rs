use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use crate::error::CryptoError;

/// Length of a SEC1 compressed secp256k1 public key.
pub const COMPRESSED_KEY_LEN: usize = 33;

/// Length of a SEC1 uncompressed secp256k1 public key.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Parse a SEC1-encoded secp256k1 public key (33-byte compressed or 65-byte
/// uncompressed) and check that it is a point on the curve.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != COMPRESSED_KEY_LEN && bytes.len() != UNCOMPRESSED_KEY_LEN {
        return Err(CryptoError::InvalidPublicKey(format!(
            "expected {COMPRESSED_KEY_LEN} or {UNCOMPRESSED_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    PublicKey::from_sec1_bytes(bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(format!("not a secp256k1 point: {e}")))
}

/// Return the 33-byte compressed form of a valid public key.
pub fn compress_public_key(bytes: &[u8]) -> Result<[u8; 33], CryptoError> {
    let key = parse_public_key(bytes)?;
    let point = key.to_encoded_point(true);
    point
        .as_bytes()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey("compressed encoding has wrong length".into()))
}

/// Return the 32-byte x-only form (BIP340) of a valid public key.
pub fn x_only_public_key(bytes: &[u8]) -> Result<[u8; 32], CryptoError> {
    let compressed = compress_public_key(bytes)?;
    let mut x_only = [0u8; 32];
    x_only.copy_from_slice(&compressed[1..]);
    Ok(x_only)
}
