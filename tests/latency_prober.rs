//! Latency prober against mock ping endpoints.

use std::sync::Arc;
use std::time::Duration;

use readiness_check::probe::{FailureCause, LatencyProber, ProbeKind, ProbeOutcome};
use readiness_check::registry::{RegionTarget, Registry};
use readiness_check::sink::RecordingSink;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target(id: &str, endpoint: String) -> RegionTarget {
    RegionTarget::new(id, id, endpoint, ["relay.example.com"]).unwrap()
}

fn prober(ping_timeout: Option<Duration>) -> LatencyProber {
    LatencyProber::new(Arc::new(reqwest::Client::new()), ping_timeout)
}

#[tokio::test]
async fn test_any_response_counts_as_success() {
    let ok_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(30)))
        .mount(&ok_server)
        .await;
    // No mock mounted: wiremock answers 404
    let not_found_server = MockServer::start().await;

    let regions = Registry::new(vec![
        target("ok", format!("{}/", ok_server.uri())),
        target("missing", format!("{}/", not_found_server.uri())),
    ])
    .unwrap();
    let mut sink = RecordingSink::new();

    let results = prober(Some(Duration::from_secs(5)))
        .probe_all(regions.clone(), &mut sink)
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()));
    assert!(results[0].elapsed_millis().is_some_and(|ms| ms >= 30));
    assert_eq!(sink.results(ProbeKind::Latency).len(), 2);
}

#[tokio::test]
async fn test_ping_url_carries_random_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let regions = Registry::new(vec![target("r", format!("{}/", server.uri()))]).unwrap();
    let latency = prober(None);
    latency
        .probe_all(regions.clone(), &mut RecordingSink::new())
        .await;
    latency
        .probe_all(regions.clone(), &mut RecordingSink::new())
        .await;

    let requests = server.received_requests().await.unwrap();
    let tokens: Vec<String> = requests
        .iter()
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "x")
                .map(|(_, v)| v.into_owned())
                .expect("x parameter present")
        })
        .collect();
    assert_eq!(tokens.len(), 2);
    assert!(tokens
        .iter()
        .all(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric())));
}

#[tokio::test]
async fn test_stalled_endpoint_hits_ping_bound() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let regions = Registry::new(vec![target("slow", format!("{}/", server.uri()))]).unwrap();
    let started = std::time::Instant::now();
    let results = prober(Some(Duration::from_millis(200)))
        .probe_all(regions, &mut RecordingSink::new())
        .await;

    assert_eq!(results[0].outcome(), ProbeOutcome::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_refused_connection_is_network_error_and_run_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let regions = Registry::new(vec![
        target("dead", "http://127.0.0.1:1/".to_string()),
        target("alive", format!("{}/", server.uri())),
    ])
    .unwrap();
    let results = prober(Some(Duration::from_secs(5)))
        .probe_all(regions, &mut RecordingSink::new())
        .await;

    assert_eq!(results[0].outcome(), ProbeOutcome::Error);
    assert!(matches!(
        results[0].failure_cause(),
        Some(FailureCause::NetworkError(_))
    ));
    assert_eq!(results[1].outcome(), ProbeOutcome::Success);
}

#[tokio::test]
async fn test_probing_a_clone_leaves_registry_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let registry = Registry::new(vec![
        target("one", format!("{}/", server.uri())),
        target("two", format!("{}/", server.uri())),
    ])
    .unwrap();
    let before = registry.clone();

    prober(None)
        .probe_all(registry.clone(), &mut RecordingSink::new())
        .await;

    assert_eq!(registry, before);
    assert_eq!(registry.len(), 2);
    assert!(registry.get("two").is_some());
}
