use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use reqwest::Url;

use crate::error::FloodsimError;

/// How the generator shapes each outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// Plain GET, no body. The collector only bumps its HTTP counter.
    Ping,
    /// POST with `{"counter": <sent>, "host": <originator>}` so the collector
    /// can fold the generator's own count into its per-originator table.
    Report,
}

impl FromStr for DispatchMode {
    type Err = FloodsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ping" => Ok(DispatchMode::Ping),
            "report" => Ok(DispatchMode::Report),
            other => Err(FloodsimError::Config(format!(
                "unknown dispatch mode '{other}', expected 'ping' or 'report'"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub target_endpoint: String,
    /// Identity reported in the POST body; the collector keys its
    /// per-originator table on this.
    pub originator: String,
    /// Address for the generator's own status page.
    pub status_addr: SocketAddr,
    /// Upper bound of the uniform [1, max] millisecond delay between cycles.
    pub jitter_max_ms: u64,
    pub request_timeout: Duration,
    pub mode: DispatchMode,
}

impl GeneratorConfig {
    pub fn from_env() -> Result<Self, FloodsimError> {
        let config = Self {
            target_endpoint: env_or("FLOODSIM_TARGET_URL", "http://localhost:8888/attackme"),
            originator: env_or("FLOODSIM_ORIGINATOR", "pinger"),
            status_addr: env_parse("FLOODSIM_STATUS_ADDR", "0.0.0.0:8866")?,
            jitter_max_ms: env_parse("FLOODSIM_JITTER_MAX_MS", "100")?,
            request_timeout: Duration::from_millis(env_parse(
                "FLOODSIM_REQUEST_TIMEOUT_MS",
                "5000",
            )?),
            mode: env_or("FLOODSIM_MODE", "report").parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FloodsimError> {
        if self.jitter_max_ms < 1 {
            return Err(FloodsimError::Config(
                "jitter upper bound must be at least 1ms".to_string(),
            ));
        }
        Url::parse(&self.target_endpoint).map_err(|e| {
            FloodsimError::Config(format!(
                "invalid target endpoint '{}': {e}",
                self.target_endpoint
            ))
        })?;
        if self.originator.is_empty() {
            return Err(FloodsimError::Config(
                "originator identity must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub http_addr: SocketAddr,
    pub udp_addr: SocketAddr,
    pub http_workers: usize,
    pub udp_workers: usize,
    /// Synthetic per-arrival processing cost. Applied inside the worker
    /// handling the arrival, never across the whole listener.
    pub process_delay: Duration,
    /// Optional append-only arrival log.
    pub event_log: Option<PathBuf>,
}

impl CollectorConfig {
    pub fn from_env() -> Result<Self, FloodsimError> {
        let config = Self {
            http_addr: env_parse("FLOODSIM_HTTP_ADDR", "0.0.0.0:8888")?,
            udp_addr: env_parse("FLOODSIM_UDP_ADDR", "0.0.0.0:4000")?,
            http_workers: env_parse("FLOODSIM_HTTP_WORKERS", "4")?,
            udp_workers: env_parse("FLOODSIM_UDP_WORKERS", "4")?,
            process_delay: Duration::from_millis(env_parse("FLOODSIM_PROCESS_DELAY_MS", "100")?),
            event_log: env::var("FLOODSIM_EVENT_LOG").ok().map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FloodsimError> {
        if self.http_workers < 1 || self.udp_workers < 1 {
            return Err(FloodsimError::Config(
                "worker counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, FloodsimError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env_or(key, default);
    raw.parse()
        .map_err(|e| FloodsimError::Config(format!("invalid value '{raw}' for {key}: {e}")))
}
