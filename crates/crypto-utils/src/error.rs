use thiserror::Error;

/// Cryptographic primitive errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}
