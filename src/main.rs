use std::error::Error;

use sensor_ledger::sht20::{SerialSettings, Sht20};
use sensor_ledger::{LedgerClient, Poller, Settings, Web3Backend, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load()?;
    telemetry::init_telemetry(&settings.log_level);

    let backend = Web3Backend::new(settings.rpc_url.as_deref())?;
    let ledger = LedgerClient::from_settings(backend, &settings)?;

    match ledger.sender() {
        Some(address) => info!("🔑 Using address: {:?}", address),
        None => warn!("no private key configured, ledger writes will fail"),
    }
    if settings.rpc_url.is_none() {
        warn!("no rpc url configured, ledger calls will fail");
    }

    let sensor = Sht20::new(SerialSettings::from(&settings));
    let mut poller = Poller::new(sensor, ledger, settings.poll_interval());

    match poller.ledger().get_office().await {
        Ok(Some(office)) => info!(%office, "registered office"),
        Ok(None) => warn!("office lookup rejected by node"),
        Err(e) => warn!(error = %e, "office lookup failed"),
    }

    poller.run().await;
    Ok(())
}
