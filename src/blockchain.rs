use tracing::{debug, error, info};
use web3::ethabi::Token;
use web3::signing::{Key, SecretKey, SecretKeyRef};
use web3::types::{Address, Bytes, CallRequest, H256, TransactionParameters, U256};

use crate::config::Settings;
use crate::contract::{
    ADD_DATA, ADD_DEVICE, ADD_OFFICE, GET_DATA, GET_DATA_LIST_SIZE, GET_DEVICE, GET_OFFICE,
    SensorLedgerAbi, int_token, token_to_string,
};
use crate::error::LedgerError;
use crate::node::{LedgerBackend, NodeReply};
use crate::reading::LedgerEntry;

/// Gas price in wei, identical for every transaction.
pub const GAS_PRICE: u64 = 125;
pub const GAS_LIMIT: u64 = 4_712_388;

/// What happens to the local nonce when the node rejects a transaction
/// inside a batch.
///
/// `HoldOnRejection` reuses the nonce for the next entry. If the rejected
/// transaction was in fact sequenced, every later entry in the batch fails
/// too. `AdvanceOnRejection` assumes it was sequenced and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoncePolicy {
    #[default]
    HoldOnRejection,
    AdvanceOnRejection,
}

struct WriteContext {
    key: SecretKey,
    sender: Address,
    contract: Address,
    chain_id: u64,
}

/// Contract client for the sensor ledger.
///
/// Owns the signing key and is the only writer for its sender address;
/// nonces are fetched once per batch and sequenced locally.
pub struct LedgerClient<B> {
    backend: B,
    abi: SensorLedgerAbi,
    key: Option<SecretKey>,
    contract: Option<Address>,
    office: Option<Address>,
    chain_id: Option<u64>,
    nonce_policy: NoncePolicy,
}

pub fn parse_address(field: &'static str, value: &str) -> Result<Address, LedgerError> {
    value
        .trim()
        .trim_start_matches("0x")
        .parse()
        .map_err(|_| LedgerError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

fn parse_key(value: &str) -> Result<SecretKey, LedgerError> {
    let key = value.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    let bytes = hex::decode(key).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
    SecretKey::from_slice(&bytes).map_err(|e| LedgerError::InvalidKey(e.to_string()))
}

impl<B: LedgerBackend> LedgerClient<B> {
    /// Builds a client from settings. Missing values are tolerated here and
    /// reported by the operations that need them; malformed values are not.
    pub fn from_settings(backend: B, settings: &Settings) -> Result<Self, LedgerError> {
        let abi = match &settings.abi_path {
            Some(path) => SensorLedgerAbi::from_artifact(path)?,
            None => SensorLedgerAbi::embedded()?,
        };

        Ok(Self {
            backend,
            abi,
            key: settings.private_key.as_deref().map(parse_key).transpose()?,
            contract: settings
                .contract_address
                .as_deref()
                .map(|a| parse_address("contract_address", a))
                .transpose()?,
            office: settings
                .office_address
                .as_deref()
                .map(|a| parse_address("office_address", a))
                .transpose()?,
            chain_id: settings.chain_id,
            nonce_policy: settings.nonce_policy(),
        })
    }

    /// Address derived from the signing key, if one is configured.
    pub fn sender(&self) -> Option<Address> {
        self.key.as_ref().map(|key| SecretKeyRef::new(key).address())
    }

    fn contract(&self) -> Result<Address, LedgerError> {
        self.contract
            .ok_or(LedgerError::MissingSetting("contract_address"))
    }

    async fn chain_id(&mut self) -> Result<u64, LedgerError> {
        if let Some(chain_id) = self.chain_id {
            return Ok(chain_id);
        }
        let chain_id = self.backend.chain_id().await?.low_u64();
        debug!(chain_id, "fetched chain id");
        self.chain_id = Some(chain_id);
        Ok(chain_id)
    }

    async fn prepare_write(&mut self) -> Result<WriteContext, LedgerError> {
        let key = self
            .key
            .clone()
            .ok_or(LedgerError::MissingSetting("private_key"))?;
        let contract = self.contract()?;
        let chain_id = self.chain_id().await?;

        Ok(WriteContext {
            sender: SecretKeyRef::new(&key).address(),
            key,
            contract,
            chain_id,
        })
    }

    async fn fetch_nonce(&self, sender: Address) -> Result<U256, LedgerError> {
        let block = self.backend.block_number().await?;
        let nonce = self.backend.transaction_count(sender, block).await?;
        debug!(%block, %nonce, "fetched nonce");
        Ok(nonce)
    }

    async fn send_function(
        &self,
        ctx: &WriteContext,
        function: &'static str,
        calldata: Vec<u8>,
        nonce: U256,
    ) -> Result<Option<H256>, LedgerError> {
        let tx = TransactionParameters {
            nonce: Some(nonce),
            to: Some(ctx.contract),
            gas: U256::from(GAS_LIMIT),
            gas_price: Some(U256::from(GAS_PRICE)),
            data: Bytes(calldata),
            chain_id: Some(ctx.chain_id),
            ..Default::default()
        };

        let raw = self.backend.sign_transaction(tx, &ctx.key).await?;
        match self.backend.send_raw_transaction(raw).await? {
            NodeReply::Accepted(tx_hash) => {
                debug!(function, %nonce, tx_hash = ?tx_hash, "transaction sent");
                Ok(Some(tx_hash))
            }
            NodeReply::Rejected(message) => {
                error!(function, %nonce, %message, "node rejected transaction");
                Ok(None)
            }
        }
    }

    async fn send_single(
        &mut self,
        function: &'static str,
        args: &[Token],
    ) -> Result<Option<H256>, LedgerError> {
        let ctx = self.prepare_write().await?;
        let calldata = self.abi.encode(function, args)?;
        let nonce = self.fetch_nonce(ctx.sender).await?;
        self.send_function(&ctx, function, calldata, nonce).await
    }

    async fn query_function(
        &self,
        function: &'static str,
        args: &[Token],
    ) -> Result<Option<Vec<Token>>, LedgerError> {
        let request = CallRequest {
            from: self.sender(),
            to: Some(self.contract()?),
            data: Some(Bytes(self.abi.encode(function, args)?)),
            ..Default::default()
        };

        match self.backend.call(request).await? {
            NodeReply::Accepted(output) => Ok(Some(self.abi.decode(function, &output.0)?)),
            NodeReply::Rejected(message) => {
                error!(function, %message, "node rejected call");
                Ok(None)
            }
        }
    }

    async fn query_single(
        &self,
        function: &'static str,
        args: &[Token],
    ) -> Result<Option<String>, LedgerError> {
        match self.query_function(function, args).await? {
            Some(tokens) => tokens
                .first()
                .map(token_to_string)
                .map(Some)
                .ok_or(LedgerError::UnexpectedOutput(function)),
            None => Ok(None),
        }
    }

    /// Records each entry with `addData`, in order, and returns one result
    /// per entry: the transaction hash, or `None` when the node rejected it.
    ///
    /// The nonce is fetched once and incremented locally after every accepted
    /// entry. A transport failure aborts the rest of the batch.
    pub async fn submit_readings(
        &mut self,
        entries: &[LedgerEntry],
    ) -> Result<Vec<Option<H256>>, LedgerError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let office = self
            .office
            .ok_or(LedgerError::MissingSetting("office_address"))?;
        let ctx = self.prepare_write().await?;
        let mut nonce = self.fetch_nonce(ctx.sender).await?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let calldata = self.abi.encode(
                ADD_DATA,
                &[
                    Token::Address(office),
                    Token::String(entry.category.clone()),
                    int_token(entry.value),
                    Token::Uint(U256::from(entry.timestamp)),
                ],
            )?;

            let tx_hash = self.send_function(&ctx, ADD_DATA, calldata, nonce).await?;
            if tx_hash.is_some() || self.nonce_policy == NoncePolicy::AdvanceOnRejection {
                nonce += U256::one();
            }
            results.push(tx_hash);
        }

        info!(
            submitted = results.len(),
            accepted = results.iter().filter(|r| r.is_some()).count(),
            "batch submitted"
        );
        Ok(results)
    }

    pub async fn register_office(&mut self, name: &str) -> Result<Option<H256>, LedgerError> {
        self.send_single(ADD_OFFICE, &[Token::String(name.to_string())])
            .await
    }

    pub async fn register_device(
        &mut self,
        device_address: &str,
        name: &str,
    ) -> Result<Option<H256>, LedgerError> {
        let device = parse_address("device_address", device_address)?;
        self.send_single(
            ADD_DEVICE,
            &[Token::Address(device), Token::String(name.to_string())],
        )
        .await
    }

    pub async fn get_office(&self) -> Result<Option<String>, LedgerError> {
        self.query_single(GET_OFFICE, &[]).await
    }

    pub async fn get_device(&self, device_address: &str) -> Result<Option<String>, LedgerError> {
        let device = parse_address("device_address", device_address)?;
        self.query_single(GET_DEVICE, &[Token::Address(device)])
            .await
    }

    pub async fn get_data_list_size(
        &self,
        office_address: &str,
        device_address: &str,
    ) -> Result<Option<String>, LedgerError> {
        let office = parse_address("office_address", office_address)?;
        let device = parse_address("device_address", device_address)?;
        self.query_single(
            GET_DATA_LIST_SIZE,
            &[Token::Address(office), Token::Address(device)],
        )
        .await
    }

    /// Returns `[category, value, timestamp]` of the stored entry at `index`.
    pub async fn get_data(
        &self,
        office_address: &str,
        device_address: &str,
        index: U256,
    ) -> Result<Option<Vec<String>>, LedgerError> {
        let office = parse_address("office_address", office_address)?;
        let device = parse_address("device_address", device_address)?;
        let tokens = self
            .query_function(
                GET_DATA,
                &[
                    Token::Address(office),
                    Token::Address(device),
                    Token::Uint(index),
                ],
            )
            .await?;

        Ok(tokens.map(|tokens| tokens.iter().map(token_to_string).collect()))
    }
}
