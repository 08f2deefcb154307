use async_trait::async_trait;

use crate::error::SensorError;
use crate::reading::Reading;

/// A temperature/humidity source. Reads are exclusive (`&mut self`): the
/// poll loop owns the reader and never issues two reads at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorReader: Send {
    async fn read(&mut self) -> Result<Reading, SensorError>;
}
