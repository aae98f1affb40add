use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{tick, Receiver};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::{
    config::{DispatchMode, GeneratorConfig},
    error::FloodsimError,
    stats::GeneratorStats,
    workers::WorkerSet,
};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(100);
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Body of a `Report`-mode dispatch. The collector folds `counter` into its
/// per-originator table keyed by `host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub counter: u64,
    pub host: String,
}

pub struct GeneratorHandle {
    workers: WorkerSet,
    stats: Arc<GeneratorStats>,
    status_addr: SocketAddr,
}

impl GeneratorHandle {
    pub fn stats(&self) -> Arc<GeneratorStats> {
        self.stats.clone()
    }

    pub fn status_addr(&self) -> SocketAddr {
        self.status_addr
    }

    pub fn shutdown(&mut self) {
        info!("shutting down generator");
        self.workers.shutdown();
    }
}

/// Start the dispatch loop and the status server. The loop runs until
/// shutdown: one dispatch per cycle, one `sent` increment per dispatch, then
/// a fresh uniform delay from `[1, jitter_max_ms]` before the next cycle.
pub(crate) fn start(
    config: GeneratorConfig,
    runtime: Arc<Runtime>,
) -> Result<GeneratorHandle, FloodsimError> {
    config.validate()?;

    let client = Client::builder().timeout(config.request_timeout).build()?;
    let stats = Arc::new(GeneratorStats::new());
    let mut workers = WorkerSet::new();

    let status_addr = spawn_status_server(&mut workers, &config, stats.clone())?;
    spawn_dispatch_loop(&mut workers, config, runtime, client, stats.clone());

    Ok(GeneratorHandle {
        workers,
        stats,
        status_addr,
    })
}

fn spawn_dispatch_loop(
    workers: &mut WorkerSet,
    config: GeneratorConfig,
    runtime: Arc<Runtime>,
    client: Client,
    stats: Arc<GeneratorStats>,
) {
    info!(
        "starting generator loop against {} (jitter 1..={}ms)",
        config.target_endpoint, config.jitter_max_ms
    );

    workers.spawn("dispatch", move |exit, stop_rx| {
        run_loop(
            &exit,
            &stop_rx,
            REPORT_INTERVAL,
            config.jitter_max_ms,
            || {
                let succeeded = runtime.block_on(dispatch_once(&client, &config, stats.sent()));
                stats.record_attempt(succeeded);
            },
            || stats.report(&config.target_endpoint),
        );
    });
}

/// Cycle driver. The next dispatch is a fixed deadline, so a report tick
/// firing mid-wait never restarts the jitter delay: the remaining wait is
/// recomputed from the deadline and the gap between cycles stays within the
/// configured bound.
fn run_loop(
    exit: &AtomicBool,
    stop_rx: &Receiver<()>,
    report_interval: Duration,
    jitter_max_ms: u64,
    mut dispatch: impl FnMut(),
    mut report: impl FnMut(),
) {
    let report_tick = tick(report_interval);
    let mut rng = rand::thread_rng();
    // Fire the first cycle immediately.
    let mut next_dispatch = Instant::now();

    while !exit.load(Ordering::Relaxed) {
        let wait = next_dispatch.saturating_duration_since(Instant::now());
        crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(report_tick) -> _ => report(),
            default(wait) => {
                dispatch();
                next_dispatch = Instant::now() + draw_jitter(&mut rng, jitter_max_ms);
            }
        }
    }
}

/// One dispatch attempt. Success and failure are both terminal: the error is
/// observed here and the loop moves on to its next jittered cycle.
async fn dispatch_once(client: &Client, config: &GeneratorConfig, sent_so_far: u64) -> bool {
    let result = match config.mode {
        DispatchMode::Ping => client.get(&config.target_endpoint).send().await,
        DispatchMode::Report => {
            let payload = ReportPayload {
                counter: sent_so_far,
                host: config.originator.clone(),
            };
            client
                .post(&config.target_endpoint)
                .json(&payload)
                .send()
                .await
        }
    };

    match result {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            warn!(
                "dispatch to {} returned {}",
                config.target_endpoint,
                response.status()
            );
            false
        }
        Err(e) => {
            warn!("dispatch to {} failed: {e}", config.target_endpoint);
            false
        }
    }
}

fn draw_jitter(rng: &mut impl Rng, max_ms: u64) -> Duration {
    Duration::from_millis(rng.gen_range(1..=max_ms))
}

fn spawn_status_server(
    workers: &mut WorkerSet,
    config: &GeneratorConfig,
    stats: Arc<GeneratorStats>,
) -> Result<SocketAddr, FloodsimError> {
    let server = tiny_http::Server::http(config.status_addr)
        .map_err(|e| FloodsimError::Listen(e.to_string()))?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| FloodsimError::Listen("status server has no IP address".to_string()))?;
    info!("generator status server listening on {addr}");

    let target = config.target_endpoint.clone();
    workers.spawn("status", move |exit, _stop_rx| {
        while !exit.load(Ordering::Relaxed) {
            let request = match server.recv_timeout(STATUS_POLL_INTERVAL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    warn!("status server receive error: {e}");
                    continue;
                }
            };

            let response = match (request.method(), request.url()) {
                (tiny_http::Method::Get, "/") => {
                    match serde_json::to_string(&stats.snapshot(&target)) {
                        Ok(body) => crate::collector::json_response(body),
                        Err(e) => {
                            warn!("failed to serialize generator status: {e}");
                            tiny_http::Response::from_string("status unavailable")
                                .with_status_code(500)
                        }
                    }
                }
                _ => tiny_http::Response::from_string("not found").with_status_code(404),
            };
            if let Err(e) = request.respond(response) {
                warn!("failed to respond to status query: {e}");
            }
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn report_tick_does_not_reset_the_dispatch_deadline() {
        let exit = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let exit_setter = exit.clone();
        let flipper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(400));
            exit_setter.store(true, Ordering::SeqCst);
        });

        // Report ticks arrive faster than any jitter delay can elapse; cycles
        // must still fire because the deadline survives the preemption.
        let mut dispatches = 0u32;
        run_loop(
            &exit,
            &stop_rx,
            Duration::from_millis(10),
            30,
            || dispatches += 1,
            || {},
        );

        flipper.join().unwrap();
        drop(stop_tx);
        assert!(
            dispatches >= 5,
            "only {dispatches} dispatches under a fast report tick"
        );
    }

    #[test]
    fn jitter_stays_within_configured_bound() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let d = draw_jitter(&mut rng, 100);
            assert!(d >= Duration::from_millis(1));
            assert!(d <= Duration::from_millis(100));
        }
    }

    #[test]
    fn jitter_bound_of_one_always_yields_one() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_eq!(draw_jitter(&mut rng, 1), Duration::from_millis(1));
        }
    }

    #[test]
    fn report_payload_matches_wire_contract() {
        let payload = ReportPayload {
            counter: 17,
            host: "host-a".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["counter"], 17);
        assert_eq!(json["host"], "host-a");
    }
}
