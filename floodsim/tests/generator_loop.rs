use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use floodsim::{
    start_collector, start_generator, CollectorConfig, DispatchMode, GeneratorConfig,
};
use reqwest::blocking::Client;
use serde_json::Value;
use tokio::runtime::Runtime;

fn generator_config(target: String, jitter_max_ms: u64) -> GeneratorConfig {
    GeneratorConfig {
        target_endpoint: target,
        originator: "it-pinger".to_string(),
        status_addr: "127.0.0.1:0".parse().unwrap(),
        jitter_max_ms,
        request_timeout: Duration::from_millis(500),
        mode: DispatchMode::Report,
    }
}

fn collector_config() -> CollectorConfig {
    CollectorConfig {
        http_addr: "127.0.0.1:0".parse().unwrap(),
        udp_addr: "127.0.0.1:0".parse().unwrap(),
        http_workers: 4,
        udp_workers: 1,
        process_delay: Duration::ZERO,
        event_log: None,
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn loop_survives_an_unreachable_target() {
    let runtime = Arc::new(Runtime::new().unwrap());
    // Nothing listens here; every dispatch fails fast with connection refused.
    let config = generator_config("http://127.0.0.1:9/attackme".to_string(), 5);
    let mut handle = start_generator(config, runtime).unwrap();
    let stats = handle.stats();

    assert!(
        wait_until(Duration::from_secs(10), || stats.sent() >= 10),
        "generator stalled after {} attempts",
        stats.sent()
    );

    let snapshot = stats.snapshot("http://127.0.0.1:9/attackme");
    assert_eq!(snapshot.succeeded, 0);
    assert_eq!(snapshot.failed, snapshot.sent);

    handle.shutdown();
    let sent_after_shutdown = stats.sent();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(stats.sent(), sent_after_shutdown);
}

#[test]
fn reports_flow_into_the_collector_table() {
    let mut collector = start_collector(collector_config()).unwrap();
    let target = format!("http://{}/attackme", collector.http_addr());

    let runtime = Arc::new(Runtime::new().unwrap());
    let mut generator = start_generator(generator_config(target, 3), runtime).unwrap();

    let collector_stats = collector.stats();
    let generator_stats = generator.stats();

    assert!(
        wait_until(Duration::from_secs(10), || {
            collector_stats.http_count() >= 5
        }),
        "collector saw only {} arrivals",
        collector_stats.http_count()
    );
    assert!(wait_until(Duration::from_secs(5), || {
        collector_stats
            .snapshot()
            .per_originator
            .contains_key("it-pinger")
    }));

    let reported = collector_stats.snapshot().per_originator["it-pinger"];
    assert!(reported <= generator_stats.sent());

    generator.shutdown();
    collector.shutdown();
}

#[test]
fn status_page_reports_sent_and_target() {
    let runtime = Arc::new(Runtime::new().unwrap());
    let target = "http://127.0.0.1:9/attackme".to_string();
    let mut handle = start_generator(generator_config(target.clone(), 5), runtime).unwrap();
    let stats = handle.stats();

    assert!(wait_until(Duration::from_secs(10), || stats.sent() >= 1));

    let client = Client::new();
    let body = client
        .get(format!("http://{}/", handle.status_addr()))
        .send()
        .unwrap()
        .text()
        .unwrap();
    let status: Value = serde_json::from_str(&body).unwrap();
    assert!(status["sent"].as_u64().unwrap() >= 1);
    assert_eq!(status["target"], target);

    let missing = client
        .get(format!("http://{}/nope", handle.status_addr()))
        .send()
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    handle.shutdown();
}
