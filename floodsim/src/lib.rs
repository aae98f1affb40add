use std::sync::Arc;

use tokio::runtime::Runtime;

pub mod collector;
pub mod config;
pub mod datagram;
pub mod error;
pub mod event_log;
pub mod generator;
pub mod stats;
pub mod workers;

pub use collector::CollectorHandle;
pub use config::{CollectorConfig, DispatchMode, GeneratorConfig};
pub use error::FloodsimError;
pub use generator::{GeneratorHandle, ReportPayload};
pub use stats::{CollectorSnapshot, CollectorStats, GeneratorSnapshot, GeneratorStats};

/// Start the jittered dispatch loop plus its status server. The runtime
/// drives the HTTP client from the loop's own thread.
pub fn start_generator(
    config: GeneratorConfig,
    runtime: Arc<Runtime>,
) -> Result<GeneratorHandle, FloodsimError> {
    generator::start(config, runtime)
}

/// Start both collector transports and the periodic stats reporter.
pub fn start_collector(config: CollectorConfig) -> Result<CollectorHandle, FloodsimError> {
    collector::start(config)
}
