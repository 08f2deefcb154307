use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("short sensor response: expected {expected} registers, got {actual}")]
    ShortResponse { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger setting `{0}` is not configured")]
    MissingSetting(&'static str),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid address for `{field}`: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("rpc transport error: {0}")]
    Transport(#[from] web3::Error),

    #[error("abi error: {0}")]
    Abi(#[from] web3::ethabi::Error),

    #[error("failed to read abi file: {0}")]
    AbiFile(#[from] std::io::Error),

    #[error("invalid abi json: {0}")]
    AbiJson(#[from] serde_json::Error),

    #[error("unexpected output from `{0}`")]
    UnexpectedOutput(&'static str),
}

/// Failure of a single poll cycle. The poll loop logs it and waits for the next one.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("sensor read failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("ledger submission failed: {0}")]
    Ledger(#[from] LedgerError),
}
