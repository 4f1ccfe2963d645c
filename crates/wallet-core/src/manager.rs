//! Send flow for one sender address: fetch spendable outputs, build, sign
//! through an external signer, broadcast.

use chain_utxo::{
    Address, BuildOptions, FeeQuote, LockingScriptCodec, NetworkParameters, SendRequest, Signer,
    TransactionBuilder, UnsignedTransaction, UnspentOutput, UnspentOutputSet,
};
use tracing::{info, warn};

use crate::error::WalletError;
use crate::types::{Chain, ScriptType};

/// Supplies the unspent outputs locked to an address.
pub trait UtxoSource {
    fn fetch_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, WalletError>;
}

/// Submits a raw transaction to the network and returns the txid it reports.
pub trait Broadcaster {
    fn submit(&self, raw_tx: &[u8]) -> Result<String, WalletError>;
}

/// Wallet for a single sender address on one chain.
pub struct UtxoWalletManager<S, B> {
    chain: Chain,
    params: NetworkParameters,
    sender: Address,
    options: BuildOptions,
    source: S,
    broadcaster: B,
}

impl<S: UtxoSource, B: Broadcaster> UtxoWalletManager<S, B> {
    pub fn new(
        chain: Chain,
        public_key: &[u8],
        script_type: ScriptType,
        source: S,
        broadcaster: B,
    ) -> Result<Self, WalletError> {
        let params = chain.params();
        let sender = LockingScriptCodec::new(&params).encode(public_key, script_type.into())?;
        Ok(Self {
            chain,
            params,
            sender,
            options: BuildOptions::default(),
            source,
            broadcaster,
        })
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn address(&self) -> &str {
        &self.sender.display_value
    }

    fn unspent_outputs(&self) -> Result<UnspentOutputSet, WalletError> {
        let outputs = self.source.fetch_unspent_outputs(self.address())?;
        Ok(UnspentOutputSet::new(outputs))
    }

    /// Sum of the sender's unspent outputs.
    pub fn balance(&self) -> Result<u64, WalletError> {
        Ok(self.unspent_outputs()?.total()?)
    }

    fn builder(&self) -> Result<TransactionBuilder, WalletError> {
        Ok(TransactionBuilder::new(&self.params, &self.sender)?.with_options(self.options))
    }

    /// Fee `request` would pay from current outputs. When the balance covers
    /// the amount but not the fee, this is the fee for sending everything.
    pub fn quote_fee(&self, request: &SendRequest) -> Result<FeeQuote, WalletError> {
        let available = self.unspent_outputs()?;
        Ok(self.builder()?.quote_fee(&available, request)?)
    }

    /// Build the unsigned transaction for `request` from current outputs.
    pub fn prepare(&self, request: &SendRequest) -> Result<UnsignedTransaction, WalletError> {
        let available = self.unspent_outputs()?;
        Ok(self.builder()?.build_unsigned(&available, request)?)
    }

    /// Build, sign with `signer`, broadcast, and return the txid.
    pub fn send(&self, request: &SendRequest, signer: &dyn Signer) -> Result<String, WalletError> {
        let unsigned = self.prepare(request)?;
        let signed = unsigned.sign(signer)?;

        let reported = self.broadcaster.submit(&signed.bytes)?;
        if !reported.eq_ignore_ascii_case(&signed.txid) {
            warn!(
                chain = ?self.chain,
                local = %signed.txid,
                reported = %reported,
                "broadcaster reported a different txid"
            );
        }
        info!(
            chain = ?self.chain,
            txid = %signed.txid,
            amount = request.amount,
            fee = unsigned.plan().fee_amount,
            "transaction broadcast"
        );
        Ok(signed.txid)
    }
}
