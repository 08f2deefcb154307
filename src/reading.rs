use chrono::Utc;

pub const CATEGORY_CELSIUS: &str = "celsius";
pub const CATEGORY_HUMIDITY: &str = "humidity";

/// One sensor measurement, stamped when the registers were read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub temperature: i64,
    pub humidity: i64,
    /// Epoch milliseconds.
    pub captured_at: u64,
}

impl Reading {
    pub fn new(temperature: i64, humidity: i64, captured_at: u64) -> Self {
        Self {
            temperature,
            humidity,
            captured_at,
        }
    }

    pub fn now(temperature: i64, humidity: i64) -> Self {
        let captured_at = Utc::now().timestamp_millis().max(0) as u64;
        Self::new(temperature, humidity, captured_at)
    }

    /// The `addData` batch for this reading: temperature first, then humidity,
    /// both carrying the same timestamp.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        vec![
            LedgerEntry::new(CATEGORY_CELSIUS, self.temperature, self.captured_at),
            LedgerEntry::new(CATEGORY_HUMIDITY, self.humidity, self.captured_at),
        ]
    }
}

/// Arguments of a single `addData` call, minus the office address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub category: String,
    pub value: i64,
    pub timestamp: u64,
}

impl LedgerEntry {
    pub fn new(category: impl Into<String>, value: i64, timestamp: u64) -> Self {
        Self {
            category: category.into(),
            value,
            timestamp,
        }
    }
}
