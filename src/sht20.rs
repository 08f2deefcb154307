use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tokio_serial::SerialStream;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::SensorError;
use crate::reading::Reading;
use crate::sensor::SensorReader;

/// First input register: temperature, then humidity.
const MEASUREMENT_REGISTER: u16 = 0x0001;
const MEASUREMENT_COUNT: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub slave_id: u8,
}

impl From<&Settings> for SerialSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            port: settings.sensor_port.clone(),
            baud_rate: settings.sensor_baud_rate,
            slave_id: settings.sensor_slave_id,
        }
    }
}

/// SHT20 temperature/humidity transmitter on an RS485 Modbus RTU link.
///
/// The serial port is opened on the first read and dropped after any
/// failure, so the next cycle starts from a fresh connection.
pub struct Sht20 {
    serial: SerialSettings,
    ctx: Option<Context>,
}

impl Sht20 {
    pub fn new(serial: SerialSettings) -> Self {
        Self { serial, ctx: None }
    }

    /// Borrows only the settings, so the read future stays `Send`.
    async fn connect(serial: &SerialSettings) -> Result<Context, SensorError> {
        let builder = tokio_serial::new(&serial.port, serial.baud_rate)
            .timeout(Duration::from_secs(1))
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .data_bits(tokio_serial::DataBits::Eight)
            .flow_control(tokio_serial::FlowControl::None);

        let port = SerialStream::open(&builder)?;
        let ctx = rtu::connect_slave(port, Slave(serial.slave_id)).await?;
        debug!(port = %serial.port, slave = serial.slave_id, "sensor connected");
        Ok(ctx)
    }

    async fn read_registers(&mut self) -> Result<Vec<u16>, SensorError> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => Self::connect(&self.serial).await?,
        };

        let registers = ctx
            .read_input_registers(MEASUREMENT_REGISTER, MEASUREMENT_COUNT)
            .await?;
        self.ctx = Some(ctx);
        Ok(registers)
    }
}

/// Converts the raw register pair into whole degrees and percent.
fn decode_measurement(registers: &[u16]) -> Result<(i64, i64), SensorError> {
    match registers {
        [raw_temp, raw_humi, ..] => Ok((
            tenths_to_whole(*raw_temp as i16 as i64),
            tenths_to_whole(*raw_humi as i64),
        )),
        _ => Err(SensorError::ShortResponse {
            expected: MEASUREMENT_COUNT as usize,
            actual: registers.len(),
        }),
    }
}

fn tenths_to_whole(tenths: i64) -> i64 {
    (tenths as f64 / 10.0).round() as i64
}

#[async_trait]
impl SensorReader for Sht20 {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        let registers = self.read_registers().await.inspect_err(|e| {
            warn!(
                port = %self.serial.port,
                error = %e,
                "sensor read failed, connection dropped"
            );
        })?;

        let (temperature, humidity) = decode_measurement(&registers)?;
        Ok(Reading::now(temperature, humidity))
    }
}
