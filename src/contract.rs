use std::fs;
use std::path::Path;

use serde_json::Value;
use web3::ethabi::{Contract, Token};
use web3::types::U256;

use crate::error::LedgerError;

pub const ADD_DATA: &str = "addData";
pub const ADD_OFFICE: &str = "addOffice";
pub const ADD_DEVICE: &str = "addDevice";
pub const GET_OFFICE: &str = "getOffice";
pub const GET_DEVICE: &str = "getDevice";
pub const GET_DATA_LIST_SIZE: &str = "getDataListSize";
pub const GET_DATA: &str = "getData";

const EMBEDDED_ABI: &str = include_str!("../abi/SensorLedger.json");

/// ABI of the sensor ledger contract.
#[derive(Debug, Clone)]
pub struct SensorLedgerAbi {
    contract: Contract,
}

impl SensorLedgerAbi {
    pub fn embedded() -> Result<Self, LedgerError> {
        Ok(Self {
            contract: Contract::load(EMBEDDED_ABI.as_bytes())?,
        })
    }

    /// Loads an ABI from disk. Accepts either a bare ABI array or a compiler
    /// artifact whose `abi` key holds the array.
    pub fn from_artifact(path: &Path) -> Result<Self, LedgerError> {
        let abi_str = fs::read_to_string(path)?;
        let abi_json: Value = serde_json::from_str(&abi_str)?;
        let abi = match abi_json.get("abi") {
            Some(abi) => abi,
            None => &abi_json,
        };
        let abi_bytes = serde_json::to_vec(abi)?;

        Ok(Self {
            contract: Contract::load(abi_bytes.as_slice())?,
        })
    }

    pub fn encode(&self, function: &str, args: &[Token]) -> Result<Vec<u8>, LedgerError> {
        Ok(self.contract.function(function)?.encode_input(args)?)
    }

    pub fn decode(&self, function: &str, output: &[u8]) -> Result<Vec<Token>, LedgerError> {
        Ok(self.contract.function(function)?.decode_output(output)?)
    }
}

/// Two's-complement `int256` token.
pub fn int_token(value: i64) -> Token {
    let magnitude = U256::from(value.unsigned_abs());
    if value < 0 {
        Token::Int((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Token::Int(magnitude)
    }
}

/// Renders a decoded value the way it reads on chain: decimal for integers,
/// with `int256` shown signed.
pub fn token_to_string(token: &Token) -> String {
    match token {
        Token::String(s) => s.clone(),
        Token::Uint(value) => value.to_string(),
        Token::Int(value) if value.bit(255) => {
            format!("-{}", (!*value).overflowing_add(U256::one()).0)
        }
        Token::Int(value) => value.to_string(),
        Token::Address(address) => format!("{:?}", address),
        other => other.to_string(),
    }
}
