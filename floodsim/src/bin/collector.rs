use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use floodsim::{CollectorConfig, FloodsimError};

fn main() -> Result<(), FloodsimError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CollectorConfig::from_env()?;
    let mut handle = floodsim::start_collector(config)?;
    info!(
        "collector accepting arrivals on {} (HTTP) and {} (UDP)",
        handle.http_addr(),
        handle.udp_addr()
    );

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!("received signal {signal}, shutting down");
    }
    handle.shutdown();
    Ok(())
}
