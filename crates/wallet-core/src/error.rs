use chain_utxo::UtxoError;
use thiserror::Error;

/// Errors surfaced across the FFI boundary.
#[derive(Debug, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum WalletError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported script type: {0}")]
    UnsupportedScript(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Invalid network parameters: {0}")]
    InvalidNetwork(String),

    #[error("Transaction build failed: {0}")]
    TransactionFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("UTXO source failed: {0}")]
    UtxoSource(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),
}

impl From<crypto_utils::error::CryptoError> for WalletError {
    fn from(e: crypto_utils::error::CryptoError) -> Self {
        WalletError::InvalidPublicKey(e.to_string())
    }
}

impl From<UtxoError> for WalletError {
    fn from(e: UtxoError) -> Self {
        let message = e.to_string();
        match e {
            UtxoError::InvalidPublicKey(_) => WalletError::InvalidPublicKey(message),
            UtxoError::WrongAddress(_) | UtxoError::EncodingFailure(_) => {
                WalletError::InvalidAddress(message)
            }
            UtxoError::UnsupportedScriptVersion { .. } => WalletError::UnsupportedScript(message),
            UtxoError::InsufficientFunds { .. } => WalletError::InsufficientFunds(message),
            UtxoError::InvalidNetworkParameters(_) => WalletError::InvalidNetwork(message),
            UtxoError::TransactionBuildError(_) => WalletError::TransactionFailed(message),
            UtxoError::SigningError(_) => WalletError::SigningFailed(message),
        }
    }
}
