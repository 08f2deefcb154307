use async_trait::async_trait;
use web3::Web3;
use web3::signing::{SecretKey, SecretKeyRef};
use web3::transports::Http;
use web3::types::{
    Address, BlockId, BlockNumber, Bytes, CallRequest, H256, TransactionParameters, U64, U256,
};

use crate::error::LedgerError;

/// Outcome of a node call that reached the node.
///
/// A JSON-RPC error returned by the node is a value, not a failure: the
/// transport worked but the node refused the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeReply<T> {
    Accepted(T),
    Rejected(String),
}

/// Everything the ledger client delegates: node RPC plus the SDK's signer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn block_number(&self) -> Result<U64, LedgerError>;

    /// Transaction count of `address` at `block`, i.e. its next nonce.
    async fn transaction_count(&self, address: Address, block: U64) -> Result<U256, LedgerError>;

    async fn chain_id(&self) -> Result<U256, LedgerError>;

    /// Signs a fully populated transaction and returns its raw encoding.
    async fn sign_transaction(
        &self,
        tx: TransactionParameters,
        key: &SecretKey,
    ) -> Result<Bytes, LedgerError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<NodeReply<H256>, LedgerError>;

    /// Read-only call against the latest block.
    async fn call(&self, request: CallRequest) -> Result<NodeReply<Bytes>, LedgerError>;
}

/// `web3` over HTTP. Without an RPC URL every call fails with
/// `MissingSetting("rpc_url")`.
#[derive(Debug, Clone)]
pub struct Web3Backend {
    web3: Option<Web3<Http>>,
}

impl Web3Backend {
    pub fn new(rpc_url: Option<&str>) -> Result<Self, LedgerError> {
        let web3 = rpc_url
            .map(|url| Http::new(url).map(Web3::new))
            .transpose()?;

        Ok(Self { web3 })
    }

    fn web3(&self) -> Result<&Web3<Http>, LedgerError> {
        self.web3
            .as_ref()
            .ok_or(LedgerError::MissingSetting("rpc_url"))
    }
}

fn into_reply<T>(result: web3::Result<T>) -> Result<NodeReply<T>, LedgerError> {
    match result {
        Ok(value) => Ok(NodeReply::Accepted(value)),
        Err(web3::Error::Rpc(e)) => Ok(NodeReply::Rejected(e.message)),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl LedgerBackend for Web3Backend {
    async fn block_number(&self) -> Result<U64, LedgerError> {
        Ok(self.web3()?.eth().block_number().await?)
    }

    async fn transaction_count(&self, address: Address, block: U64) -> Result<U256, LedgerError> {
        Ok(self
            .web3()?
            .eth()
            .transaction_count(address, Some(BlockNumber::Number(block)))
            .await?)
    }

    async fn chain_id(&self) -> Result<U256, LedgerError> {
        Ok(self.web3()?.eth().chain_id().await?)
    }

    async fn sign_transaction(
        &self,
        tx: TransactionParameters,
        key: &SecretKey,
    ) -> Result<Bytes, LedgerError> {
        // nonce, gas price and chain id are always set, so this stays local
        let signed = self
            .web3()?
            .accounts()
            .sign_transaction(tx, SecretKeyRef::new(key))
            .await?;

        Ok(signed.raw_transaction)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<NodeReply<H256>, LedgerError> {
        into_reply(self.web3()?.eth().send_raw_transaction(raw).await)
    }

    async fn call(&self, request: CallRequest) -> Result<NodeReply<Bytes>, LedgerError> {
        into_reply(
            self.web3()?
                .eth()
                .call(request, Some(BlockId::Number(BlockNumber::Latest)))
                .await,
        )
    }
}
