use std::sync::Arc;

use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floodsim::{FloodsimError, GeneratorConfig};

fn main() -> Result<(), FloodsimError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GeneratorConfig::from_env()?;
    let runtime = Arc::new(Runtime::new()?);

    let mut handle = floodsim::start_generator(config, runtime)?;
    info!("generator status available on {}", handle.status_addr());

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!("received signal {signal}, shutting down");
    }
    handle.shutdown();
    Ok(())
}
