use std::fmt;

use crypto_utils::CryptoError;
use thiserror::Error;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Codec,
    Selection,
    Fee,
    Build,
    Signing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Codec => write!(f, "codec"),
            Stage::Selection => write!(f, "selection"),
            Stage::Fee => write!(f, "fee"),
            Stage::Build => write!(f, "build"),
            Stage::Signing => write!(f, "signing"),
        }
    }
}

/// UTXO engine errors.
#[derive(Debug, Error)]
pub enum UtxoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("wrong address: {0}")]
    WrongAddress(String),

    #[error("unsupported script version {version:#04x} on {network}")]
    UnsupportedScriptVersion { version: u8, network: String },

    #[error("insufficient funds at {stage} stage: need {needed}, have {available}")]
    InsufficientFunds {
        needed: u64,
        available: u64,
        stage: Stage,
    },

    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    #[error("invalid network parameters: {0}")]
    InvalidNetworkParameters(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),
}

impl UtxoError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            UtxoError::InvalidPublicKey(_)
            | UtxoError::WrongAddress(_)
            | UtxoError::UnsupportedScriptVersion { .. }
            | UtxoError::EncodingFailure(_)
            | UtxoError::InvalidNetworkParameters(_) => Stage::Codec,
            UtxoError::InsufficientFunds { stage, .. } => *stage,
            UtxoError::TransactionBuildError(_) => Stage::Build,
            UtxoError::SigningError(_) => Stage::Signing,
        }
    }
}

impl From<CryptoError> for UtxoError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPublicKey(msg) => UtxoError::InvalidPublicKey(msg),
        }
    }
}
