use std::{
    io::{Cursor, Read},
    net::SocketAddr,
    sync::{atomic::Ordering, Arc},
    thread,
    time::Duration,
};

use crossbeam_channel::tick;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

use crate::{
    config::CollectorConfig,
    datagram,
    error::FloodsimError,
    event_log::{ArrivalEvent, EventLog, Transport},
    generator::ReportPayload,
    stats::CollectorStats,
    workers::WorkerSet,
};

const HTTP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

const ACK_BODY: &str = "thank you for attacking, please come again.";

pub struct CollectorHandle {
    workers: WorkerSet,
    stats: Arc<CollectorStats>,
    http_addr: SocketAddr,
    udp_addr: SocketAddr,
}

impl CollectorHandle {
    pub fn stats(&self) -> Arc<CollectorStats> {
        self.stats.clone()
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    pub fn shutdown(&mut self) {
        info!("shutting down collector");
        self.workers.shutdown();
    }
}

/// Start both transports. Each HTTP worker owns its arrivals end to end, so
/// the synthetic delay stalls at most one in-flight request per worker while
/// the listener keeps accepting.
pub(crate) fn start(config: CollectorConfig) -> Result<CollectorHandle, FloodsimError> {
    config.validate()?;

    let event_log = match &config.event_log {
        Some(path) => Some(Arc::new(EventLog::open(path)?)),
        None => None,
    };
    let stats = Arc::new(CollectorStats::new());
    let mut workers = WorkerSet::new();

    let server =
        Arc::new(Server::http(config.http_addr).map_err(|e| FloodsimError::Listen(e.to_string()))?);
    let http_addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| FloodsimError::Listen("HTTP listener has no IP address".to_string()))?;
    info!(
        "collector HTTP listener bound to {http_addr} with {} workers",
        config.http_workers
    );

    for i in 0..config.http_workers {
        let server = server.clone();
        let stats = stats.clone();
        let event_log = event_log.clone();
        let delay = config.process_delay;

        workers.spawn(&format!("http_{i}"), move |exit, _stop_rx| {
            while !exit.load(Ordering::Relaxed) {
                match server.recv_timeout(HTTP_POLL_INTERVAL) {
                    Ok(Some(request)) => {
                        handle_request(request, &stats, delay, event_log.as_deref())
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("HTTP listener receive error: {e}");
                    }
                }
            }
        });
    }

    let udp_addr = datagram::start(&mut workers, &config, stats.clone(), event_log)?;

    let report_stats = stats.clone();
    workers.spawn("report", move |exit, stop_rx| {
        let report_tick = tick(REPORT_INTERVAL);
        while !exit.load(Ordering::Relaxed) {
            crossbeam_channel::select! {
                recv(report_tick) -> _ => report_stats.report(),
                recv(stop_rx) -> _ => break,
            }
        }
    });

    Ok(CollectorHandle {
        workers,
        stats,
        http_addr,
        udp_addr,
    })
}

fn handle_request(
    mut request: Request,
    stats: &CollectorStats,
    delay: Duration,
    event_log: Option<&EventLog>,
) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let response = match (&method, url.as_str()) {
        (Method::Get, "/attackme") => {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            stats.record_http();
            if let Some(log) = event_log {
                log.record(&ArrivalEvent::now(Transport::Http));
            }
            Response::from_string(ACK_BODY)
        }
        (Method::Post, "/attackme") => {
            let mut body = String::new();
            let read_result = request.as_reader().read_to_string(&mut body);

            if !delay.is_zero() {
                thread::sleep(delay);
            }
            stats.record_http();

            // A broken body is still one arrival; only the fold is skipped.
            let payload = read_result
                .map_err(|e| e.to_string())
                .and_then(|_| serde_json::from_str::<ReportPayload>(&body).map_err(|e| e.to_string()));
            match payload {
                Ok(report) => {
                    stats.fold_report(&report.host, report.counter);
                    if let Some(log) = event_log {
                        log.record(&ArrivalEvent::with_report(
                            Transport::Http,
                            report.host,
                            report.counter,
                        ));
                    }
                }
                Err(e) => {
                    stats.record_malformed();
                    debug!("malformed report payload: {e}");
                    if let Some(log) = event_log {
                        log.record(&ArrivalEvent::now(Transport::Http));
                    }
                }
            }
            Response::from_string(ACK_BODY)
        }
        (Method::Get, "/attackcount") => match serde_json::to_string(&stats.snapshot()) {
            Ok(body) => json_response(body),
            Err(e) => {
                warn!("failed to serialize collector status: {e}");
                Response::from_string("status unavailable").with_status_code(500)
            }
        },
        _ => Response::from_string("not found").with_status_code(404),
    };

    if let Err(e) = request.respond(response) {
        warn!("failed to respond to {method} {url}: {e}");
    }
}

pub(crate) fn json_response(body: String) -> Response<Cursor<Vec<u8>>> {
    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid");
    Response::from_string(body).with_header(header)
}
