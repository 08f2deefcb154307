use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};
use web3::types::H256;

use crate::blockchain::LedgerClient;
use crate::error::CycleError;
use crate::node::LedgerBackend;
use crate::reading::{LedgerEntry, Reading};
use crate::sensor::SensorReader;

/// Outcome of one successful capture-and-submit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub reading: Reading,
    /// Every submitted entry with its transaction hash, `None` if rejected.
    pub transactions: Vec<(LedgerEntry, Option<H256>)>,
}

/// Capture, submit, wait, repeat. Owns both the sensor and the ledger client
/// so only one cycle is ever in flight.
pub struct Poller<S, B> {
    sensor: S,
    ledger: LedgerClient<B>,
    interval: Duration,
}

impl<S: SensorReader, B: LedgerBackend> Poller<S, B> {
    pub fn new(sensor: S, ledger: LedgerClient<B>, interval: Duration) -> Self {
        Self {
            sensor,
            ledger,
            interval,
        }
    }

    pub fn ledger(&self) -> &LedgerClient<B> {
        &self.ledger
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        info!("start data capturing");
        let reading = self.sensor.read().await?;
        info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            "data received"
        );

        let entries = reading.entries();
        let hashes = self.ledger.submit_readings(&entries).await?;

        Ok(CycleReport {
            reading,
            transactions: entries.into_iter().zip(hashes).collect(),
        })
    }

    /// Runs until the process is killed. A failed cycle is logged and
    /// skipped; the loop still waits a full interval before the next one.
    pub async fn run(&mut self) {
        info!(interval_secs = self.interval.as_secs(), "poll loop started");
        loop {
            match self.run_cycle().await {
                Ok(report) => log_report(&report),
                Err(e) => error!(error = %e, "cycle skipped"),
            }
            sleep(self.interval).await;
        }
    }
}

fn log_report(report: &CycleReport) {
    for (entry, tx_hash) in &report.transactions {
        match tx_hash {
            Some(tx_hash) => info!(
                "TXN: {:?} - {}: {} at: {}",
                tx_hash,
                entry.category.to_uppercase(),
                entry.value,
                entry.timestamp
            ),
            None => warn!(
                category = %entry.category,
                value = entry.value,
                timestamp = entry.timestamp,
                "entry not confirmed by node"
            ),
        }
    }
}
