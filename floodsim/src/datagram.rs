use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::{atomic::Ordering, Arc},
    thread,
    time::Duration,
};

use crossbeam_channel::unbounded;
use tracing::{info, warn};

use crate::{
    config::CollectorConfig,
    error::FloodsimError,
    event_log::{ArrivalEvent, EventLog, Transport},
    stats::CollectorStats,
    workers::WorkerSet,
};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_DATAGRAM_SIZE: usize = 2048;

/// Bind the datagram socket and spawn one receive thread feeding a pool of
/// processor threads over a channel. Processors pay the synthetic delay, so a
/// slow arrival never blocks the socket read loop or its siblings. Payload
/// contents are ignored; nothing is sent back.
pub(crate) fn start(
    workers: &mut WorkerSet,
    config: &CollectorConfig,
    stats: Arc<CollectorStats>,
    event_log: Option<Arc<EventLog>>,
) -> Result<SocketAddr, FloodsimError> {
    let socket = UdpSocket::bind(config.udp_addr)?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    let addr = socket.local_addr()?;
    info!("datagram listener bound to {addr}");

    let (arrival_tx, arrival_rx) = unbounded::<SocketAddr>();

    workers.spawn("udp_recv", move |exit, _stop_rx| {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        while !exit.load(Ordering::Relaxed) {
            match socket.recv_from(&mut buf) {
                Ok((_len, src)) => {
                    if arrival_tx.send(src).is_err() {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    warn!("datagram receive error: {e}");
                }
            }
        }
    });

    let delay = config.process_delay;
    for i in 0..config.udp_workers {
        let arrival_rx = arrival_rx.clone();
        let stats = stats.clone();
        let event_log = event_log.clone();

        workers.spawn(&format!("udp_proc_{i}"), move |exit, stop_rx| {
            while !exit.load(Ordering::Relaxed) {
                crossbeam_channel::select! {
                    recv(arrival_rx) -> maybe_arrival => {
                        if maybe_arrival.is_err() {
                            break;
                        }
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        stats.record_datagram();
                        if let Some(log) = &event_log {
                            log.record(&ArrivalEvent::now(Transport::Datagram));
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
        });
    }

    Ok(addr)
}
