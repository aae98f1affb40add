use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Datagram,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Http => write!(f, "http"),
            Transport::Datagram => write!(f, "udp"),
        }
    }
}

/// One accepted arrival. Transient: dropped after the event sink sees it.
#[derive(Debug, Clone)]
pub struct ArrivalEvent {
    pub transport: Transport,
    pub originator: Option<String>,
    pub counter: Option<u64>,
    pub received_at: SystemTime,
}

impl ArrivalEvent {
    pub fn now(transport: Transport) -> Self {
        Self {
            transport,
            originator: None,
            counter: None,
            received_at: SystemTime::now(),
        }
    }

    pub fn with_report(transport: Transport, originator: String, counter: u64) -> Self {
        Self {
            transport,
            originator: Some(originator),
            counter: Some(counter),
            received_at: SystemTime::now(),
        }
    }
}

/// Append-only arrival log. Purely observational: a write failure degrades to
/// a single warning and never touches the counters.
pub struct EventLog {
    out: Mutex<BufWriter<File>>,
    write_failed: AtomicBool,
}

impl EventLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
            write_failed: AtomicBool::new(false),
        })
    }

    pub fn record(&self, event: &ArrivalEvent) {
        let millis = event
            .received_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let originator = event.originator.as_deref().unwrap_or("-");
        let counter = event
            .counter
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());

        let mut out = self.out.lock();
        let result = writeln!(out, "{millis} {} {originator} {counter}", event.transport)
            .and_then(|_| out.flush());
        if let Err(e) = result {
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                warn!("event log write failed, further failures suppressed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process;

    fn temp_log_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("floodsim-events-{tag}-{}.log", process::id()))
    }

    #[test]
    fn records_one_line_per_event() {
        let path = temp_log_path("basic");
        let _ = fs::remove_file(&path);

        let log = EventLog::open(&path).unwrap();
        log.record(&ArrivalEvent::now(Transport::Datagram));
        log.record(&ArrivalEvent::with_report(
            Transport::Http,
            "host-a".to_string(),
            42,
        ));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" udp - -"));
        assert!(lines[1].contains(" http host-a 42"));

        let _ = fs::remove_file(&path);
    }
}
