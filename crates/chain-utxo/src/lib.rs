//! UTXO transaction construction for Bitcoin-family chains.
//!
//! Converts public keys into locking scripts and addresses, decodes
//! destination addresses, selects unspent outputs, estimates fees, decides
//! change, and assembles transactions that an external signer completes.
//! Chains differ only by their [`NetworkParameters`]; no code path is
//! specific to one coin.

pub mod address;
pub mod amount;
pub mod cashaddr;
pub mod change;
pub mod error;
pub mod fee;
pub mod network;
pub mod script;
pub mod sighash;
pub mod size;
pub mod transaction;
pub mod utxo;

pub use address::{Address, LockingScriptCodec};
pub use amount::{FeeRate, Rounding};
pub use change::{ChangeCalculator, ChangePlan};
pub use error::{Stage, UtxoError};
pub use fee::{FeeEstimator, FeePolicy};
pub use network::NetworkParameters;
pub use script::{LockingScript, ScriptKind};
pub use transaction::{
    BuildOptions, SendRequest, SignedTransaction, Signer, SpendPlan, TransactionBuilder,
    UnsignedTransaction,
};
pub use utxo::{
    CoinSelector, FeeQuote, Selection, SelectionStrategy, UnspentOutput, UnspentOutputSet,
};
