//! # crypto-utils
//!
//! Hash primitives and secp256k1 public key handling shared by the UTXO
//! engine: SHA-256, double SHA-256, HASH160, BIP340 tagged hashes, and
//! SEC1 key parsing/compression.

pub mod error;
pub mod hash;
pub mod keys;

pub use error::CryptoError;
