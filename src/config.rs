use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use dotenv::from_filename;
use serde::Deserialize;

use crate::blockchain::NoncePolicy;

/// Env var naming the dotenv file loaded before settings are read.
pub const ENV_FILE_VAR: &str = "SENSOR_LEDGER_ENV_FILE";
const DEFAULT_ENV_FILE: &str = "sensor-ledger.env";

/// Deployment settings, read from `LEDGER_*` environment variables.
///
/// The short key names `LEDGER_RPCHOST`, `LEDGER_PRIVATEKEY`,
/// `LEDGER_OFFICEADDRESS` and `LEDGER_CONTRACT` are accepted as aliases.
///
/// Ledger fields are optional so the client can always be built; operations
/// that need a missing value fail with `LedgerError::MissingSetting`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// JSON-RPC endpoint of the ledger node
    #[serde(alias = "rpchost")]
    pub rpc_url: Option<String>,

    /// Hex-encoded secp256k1 key, `0x` prefix optional
    #[serde(alias = "privatekey")]
    pub private_key: Option<String>,

    /// Ledger address identifying this deployment's office
    #[serde(alias = "officeaddress")]
    pub office_address: Option<String>,

    /// Address of the deployed sensor contract
    #[serde(alias = "contract")]
    pub contract_address: Option<String>,

    /// Chain id used for signing; fetched from the node when unset
    pub chain_id: Option<u64>,

    /// Compiler artifact or bare ABI array overriding the embedded ABI
    pub abi_path: Option<PathBuf>,

    /// Advance the local nonce even when the node rejects a transaction
    #[serde(default)]
    pub advance_nonce_on_rejection: bool,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    // Sensor (SHT20 over Modbus RTU)
    #[serde(default = "default_sensor_port")]
    pub sensor_port: String,

    #[serde(default = "default_sensor_baud_rate")]
    pub sensor_baud_rate: u32,

    #[serde(default = "default_sensor_slave_id")]
    pub sensor_slave_id: u8,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval_secs() -> u64 {
    3600
}

fn default_sensor_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_sensor_baud_rate() -> u32 {
    9600
}

fn default_sensor_slave_id() -> u8 {
    0x01
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            private_key: None,
            office_address: None,
            contract_address: None,
            chain_id: None,
            abi_path: None,
            advance_nonce_on_rejection: false,
            poll_interval_secs: default_poll_interval_secs(),
            sensor_port: default_sensor_port(),
            sensor_baud_rate: default_sensor_baud_rate(),
            sensor_slave_id: default_sensor_slave_id(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Loads the dotenv file (if any) into the environment, then reads settings.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = env::var(ENV_FILE_VAR).unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
        from_filename(&env_file).ok();

        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("LEDGER"))
            .build()?
            .try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn nonce_policy(&self) -> NoncePolicy {
        if self.advance_nonce_on_rejection {
            NoncePolicy::AdvanceOnRejection
        } else {
            NoncePolicy::HoldOnRejection
        }
    }
}
