//! End-to-end cycle behaviour against scripted drivers, on paused time.

mod common;

use std::time::Duration;

use common::{Call, INTERVAL, POND, POOL, Script, node};
use poolsense_common::{FIELD_NAMES, Reading, decode};
use poolsense_node::{PublishOutcome, SessionState};
use poolsense_node::sensor::ClimateSample;
use serde_json::Value;
use tokio::time::{self, Instant};

fn keys(body: &str) -> Vec<String> {
    let value: Value = serde_json::from_str(body).unwrap();
    value.as_object().unwrap().keys().cloned().collect()
}

#[tokio::test(start_paused = true)]
async fn test_reference_cycle_message() {
    let (mut node, log) = node(Script {
        pool: Some(18.1875),
        pond: None,
        ..Script::default()
    });

    let report = node.run_cycle().await;

    assert_eq!(report.outcome, PublishOutcome::Published);
    assert_eq!(
        log.published(),
        vec![
            r#"{"picotemp":21.4,"pooltemp":18.2,"pondtemp":null,"airtemp":22.0,"humidity":55,"wlanRSSI":-47}"#
                .to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_every_key_present_when_all_sensors_fail() {
    let (mut node, log) = node(Script {
        raw: None,
        fail_convert: true,
        climate: None,
        signal: None,
        ..Script::default()
    });

    let report = node.run_cycle().await;
    assert_eq!(report.outcome, PublishOutcome::Published);
    assert_eq!(report.payload.available_count(), 0);

    let body = &log.published()[0];
    let mut expected: Vec<String> = FIELD_NAMES.iter().map(|s| s.to_string()).collect();
    let mut actual = keys(body);
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
    assert!(decode::<Value>(body.as_bytes()).unwrap()
        .as_object()
        .unwrap()
        .values()
        .all(Value::is_null));
}

#[tokio::test(start_paused = true)]
async fn test_every_key_present_across_cycles() {
    let (mut node, log) = node(Script::default());

    for _ in 0..3 {
        node.run_cycle().await;
    }

    let published = log.published();
    assert_eq!(published.len(), 3);
    for body in published {
        assert_eq!(keys(&body).len(), 6);
    }
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_isolated_and_bus_settles() {
    let (mut node, log) = node(Script {
        pool: None,
        ..Script::default()
    });
    let start = Instant::now();

    let report = node.run_cycle().await;

    assert_eq!(report.payload.pooltemp, Reading::Unavailable);
    assert_eq!(report.payload.pondtemp, Reading::Value(17.9));
    assert_eq!(report.payload.picotemp, Reading::Value(21.4));
    assert_eq!(report.payload.airtemp, Reading::Value(22.0));

    // The failed pool read is followed by a full settle before the pond
    // probe's conversion starts.
    let converts = log.times_of(&Call::Convert);
    assert_eq!(converts.len(), 2);
    assert_eq!(converts[0] - start, Duration::ZERO);
    assert_eq!(converts[1] - start, Duration::from_millis(1500));

    let pool_read = log.times_of(&Call::ReadProbe(POOL.to_string()))[0];
    assert_eq!(pool_read - start, Duration::from_millis(750));
    assert!(converts[1] - pool_read >= Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn test_convert_failure_skips_probe_read() {
    let (mut node, log) = node(Script {
        fail_convert: true,
        ..Script::default()
    });
    let start = Instant::now();

    let report = node.run_cycle().await;

    assert_eq!(report.payload.pooltemp, Reading::Unavailable);
    assert_eq!(report.payload.pondtemp, Reading::Unavailable);
    assert_eq!(log.count(&Call::ReadProbe(POOL.to_string())), 0);
    assert_eq!(log.count(&Call::ReadProbe(POND.to_string())), 0);

    // Both probes still consume their settle delays.
    let measure = log.times_of(&Call::Measure)[0];
    assert_eq!(measure - start, Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_climate_failure_nulls_both_fields() {
    let (mut node, log) = node(Script {
        climate: None,
        ..Script::default()
    });

    let report = node.run_cycle().await;

    assert_eq!(report.payload.airtemp, Reading::Unavailable);
    assert_eq!(report.payload.humidity, Reading::Unavailable);
    let body = &log.published()[0];
    assert!(body.contains(r#""airtemp":null,"humidity":null"#));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_humidity_nulls_both_fields() {
    let (mut node, _log) = node(Script {
        climate: Some(ClimateSample {
            celsius: 22.0,
            humidity_percent: 140.0,
        }),
        ..Script::default()
    });

    let report = node.run_cycle().await;

    assert_eq!(report.payload.airtemp, Reading::Unavailable);
    assert_eq!(report.payload.humidity, Reading::Unavailable);
}

#[tokio::test(start_paused = true)]
async fn test_missing_network_nulls_rssi() {
    let (mut node, _log) = node(Script {
        signal: Some("weak".to_string()),
        ..Script::default()
    });

    let report = node.run_cycle().await;
    assert_eq!(report.payload.wlan_rssi, Reading::Unavailable);
    assert_eq!(report.payload.available_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_skips_publish() {
    let (mut node, log) = node(Script {
        connect_results: vec![false],
        ..Script::default()
    });

    let report = node.run_cycle().await;

    assert_eq!(report.outcome, PublishOutcome::Skipped);
    assert_eq!(log.count(&Call::Connect), 1);
    assert!(log.published().is_empty());
    assert_eq!(node.session().state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_reconnects_next_cycle() {
    let (mut node, log) = node(Script {
        publish_results: vec![false],
        ..Script::default()
    });

    let first = node.run_cycle().await;
    assert_eq!(first.outcome, PublishOutcome::Dropped);
    assert_eq!(node.session().state(), SessionState::Disconnected);

    let second = node.run_cycle().await;
    assert_eq!(second.outcome, PublishOutcome::Published);

    let broker_calls: Vec<Call> = log
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Connect | Call::Publish(_)))
        .map(|c| match c {
            Call::Publish(_) => Call::Publish(String::new()),
            other => other,
        })
        .collect();
    assert_eq!(
        broker_calls,
        vec![
            Call::Connect,
            Call::Publish(String::new()),
            Call::Connect,
            Call::Publish(String::new()),
        ]
    );
    assert_eq!(node.session().connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_broker_outage_recovers_without_restart() {
    let (mut node, log) = node(Script {
        connect_results: vec![false, false, false],
        ..Script::default()
    });

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(node.run_cycle().await.outcome);
    }

    assert_eq!(
        outcomes,
        vec![
            PublishOutcome::Skipped,
            PublishOutcome::Skipped,
            PublishOutcome::Skipped,
            PublishOutcome::Published,
        ]
    );
    assert_eq!(log.count(&Call::Connect), 4);
    assert_eq!(log.published().len(), 1);
    assert_eq!(node.session().connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connected_session_not_reopened() {
    let (mut node, log) = node(Script::default());

    node.run_cycle().await;
    node.run_cycle().await;

    assert_eq!(log.count(&Call::Connect), 1);
    assert_eq!(log.published().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_idles_interval_after_each_cycle() {
    let (node, log) = node(Script::default());
    let start = Instant::now();

    let session = node.run(time::sleep(Duration::from_secs(150))).await;

    // Each cycle samples for 3.75s, then idles for the full interval.
    let cycle = Duration::from_millis(3750) + INTERVAL;
    let pool_converts: Vec<Duration> = log
        .times_of(&Call::Convert)
        .into_iter()
        .step_by(2)
        .map(|t| t - start)
        .collect();
    assert_eq!(pool_converts, vec![Duration::ZERO, cycle, cycle * 2]);

    assert_eq!(log.published().len(), 3);
    assert_eq!(log.calls().last(), Some(&Call::Disconnect));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_cycle_to_finish() {
    let (node, log) = node(Script::default());

    // Resolves while the first cycle is still sampling.
    let session = node.run(time::sleep(Duration::from_millis(100))).await;

    assert_eq!(log.published().len(), 1);
    assert_eq!(log.count(&Call::Disconnect), 1);
    assert!(!session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_when_disconnected_is_noop() {
    let (mut node, log) = node(Script {
        connect_results: vec![false],
        ..Script::default()
    });

    node.run_cycle().await;
    node.session_mut().disconnect().await;
    node.session_mut().disconnect().await;

    assert_eq!(log.count(&Call::Disconnect), 0);
    assert_eq!(node.session().state(), SessionState::Disconnected);
}
