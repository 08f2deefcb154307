use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sensor_ledger::{
    CycleError, LedgerBackend, LedgerClient, LedgerEntry, LedgerError, NodeReply, Poller, Reading,
    SensorError, SensorReader, Settings,
};
use web3::signing::SecretKey;
use web3::types::{Address, Bytes, CallRequest, H256, TransactionParameters, U64, U256};

const T: u64 = 1_700_000_000_000;

/// Node that accepts everything and records what it was asked to do.
#[derive(Clone, Default)]
struct RecordingNode {
    nonce_fetches: Arc<Mutex<usize>>,
    signed: Arc<Mutex<Vec<TransactionParameters>>>,
    reject_first: bool,
}

#[async_trait]
impl LedgerBackend for RecordingNode {
    async fn block_number(&self) -> Result<U64, LedgerError> {
        Ok(U64::from(1_024))
    }

    async fn transaction_count(&self, _address: Address, _block: U64) -> Result<U256, LedgerError> {
        *self.nonce_fetches.lock().unwrap() += 1;
        Ok(U256::from(7))
    }

    async fn chain_id(&self) -> Result<U256, LedgerError> {
        Ok(U256::from(1337))
    }

    async fn sign_transaction(
        &self,
        tx: TransactionParameters,
        _key: &SecretKey,
    ) -> Result<Bytes, LedgerError> {
        let mut signed = self.signed.lock().unwrap();
        signed.push(tx);
        Ok(Bytes(vec![signed.len() as u8]))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<NodeReply<H256>, LedgerError> {
        let position = raw.0[0];
        if self.reject_first && position == 1 {
            return Ok(NodeReply::Rejected("insufficient funds for gas".to_string()));
        }
        Ok(NodeReply::Accepted(H256::from_low_u64_be(position as u64)))
    }

    async fn call(&self, _request: CallRequest) -> Result<NodeReply<Bytes>, LedgerError> {
        Ok(NodeReply::Rejected("not deployed".to_string()))
    }
}

struct ScriptedSensor {
    script: VecDeque<Result<Reading, SensorError>>,
}

#[async_trait]
impl SensorReader for ScriptedSensor {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(SensorError::Io(io::Error::other("script exhausted"))))
    }
}

fn settings() -> Settings {
    Settings {
        private_key: Some(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_string(),
        ),
        contract_address: Some("0x00000000000000000000000000000000000000c0".to_string()),
        office_address: Some("0x00000000000000000000000000000000000000a1".to_string()),
        ..Settings::default()
    }
}

fn poller(
    node: RecordingNode,
    script: Vec<Result<Reading, SensorError>>,
) -> Poller<ScriptedSensor, RecordingNode> {
    let ledger = LedgerClient::from_settings(node, &settings()).unwrap();
    let sensor = ScriptedSensor {
        script: script.into(),
    };
    Poller::new(sensor, ledger, Duration::from_secs(3600))
}

#[tokio::test]
async fn test_reading_is_recorded_with_consecutive_nonces() {
    let node = RecordingNode::default();
    let mut poller = poller(node.clone(), vec![Ok(Reading::new(21, 55, T))]);

    let report = poller.run_cycle().await.unwrap();

    assert_eq!(
        report.transactions,
        vec![
            (
                LedgerEntry::new("celsius", 21, T),
                Some(H256::from_low_u64_be(1))
            ),
            (
                LedgerEntry::new("humidity", 55, T),
                Some(H256::from_low_u64_be(2))
            ),
        ]
    );

    let contract: Address = "00000000000000000000000000000000000000c0".parse().unwrap();
    let signed = node.signed.lock().unwrap();
    let nonces: Vec<_> = signed.iter().map(|tx| tx.nonce).collect();
    assert_eq!(nonces, vec![Some(U256::from(7)), Some(U256::from(8))]);
    assert!(signed.iter().all(|tx| tx.to == Some(contract)));
    assert_eq!(*node.nonce_fetches.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_entry_is_absent_and_nonce_is_reused() {
    let node = RecordingNode {
        reject_first: true,
        ..RecordingNode::default()
    };
    let mut poller = poller(node.clone(), vec![Ok(Reading::new(21, 55, T))]);

    let report = poller.run_cycle().await.unwrap();

    let hashes: Vec<_> = report.transactions.iter().map(|(_, h)| *h).collect();
    assert_eq!(hashes, vec![None, Some(H256::from_low_u64_be(2))]);
    let nonces: Vec<_> = node
        .signed
        .lock()
        .unwrap()
        .iter()
        .map(|tx| tx.nonce)
        .collect();
    assert_eq!(nonces, vec![Some(U256::from(7)), Some(U256::from(7))]);
}

#[tokio::test]
async fn test_failed_capture_submits_nothing_and_next_cycle_recovers() {
    let node = RecordingNode::default();
    let mut poller = poller(
        node.clone(),
        vec![
            Err(SensorError::Io(io::Error::other("checksum mismatch"))),
            Ok(Reading::new(18, 62, T)),
        ],
    );

    let first = poller.run_cycle().await;
    assert!(matches!(first, Err(CycleError::Sensor(_))));
    assert!(node.signed.lock().unwrap().is_empty());
    assert_eq!(*node.nonce_fetches.lock().unwrap(), 0);

    let second = poller.run_cycle().await.unwrap();
    assert_eq!(second.reading, Reading::new(18, 62, T));
    assert_eq!(node.signed.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_query_is_absent() {
    let node = RecordingNode::default();
    let poller = poller(node.clone(), vec![]);

    assert_eq!(poller.ledger().get_office().await.unwrap(), None);
    assert!(node.signed.lock().unwrap().is_empty());
    assert_eq!(*node.nonce_fetches.lock().unwrap(), 0);
}
