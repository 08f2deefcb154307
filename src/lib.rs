//! Polls a temperature/humidity sensor and records each reading on an
//! Ethereum-compatible ledger through the sensor ledger contract.

pub mod blockchain;
pub mod config;
pub mod contract;
pub mod error;
pub mod node;
pub mod poller;
pub mod reading;
pub mod sensor;
pub mod sht20;
pub mod telemetry;

pub use blockchain::{LedgerClient, NoncePolicy};
pub use config::Settings;
pub use error::{CycleError, LedgerError, SensorError};
pub use node::{LedgerBackend, NodeReply, Web3Backend};
pub use poller::{CycleReport, Poller};
pub use reading::{LedgerEntry, Reading};
pub use sensor::SensorReader;
pub use sht20::{SerialSettings, Sht20};
