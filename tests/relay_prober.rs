//! Relay connectivity prober properties, driven by scripted negotiators on a
//! paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use readiness_check::config::{AggregationPolicy, RELAY_NEGOTIATION_TIMEOUT};
use readiness_check::error_handling::NegotiationError;
use readiness_check::probe::{
    CandidateError, FailureCause, Negotiation, ProbeKind, ProbeOutcome, RelayNegotiator,
    RelayProber,
};
use readiness_check::registry::{IceServer, RegionTarget, Registry};
use readiness_check::sink::RecordingSink;
use readiness_check::turn::parse_turn_url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// What a scripted relay host does once gathering starts.
#[derive(Clone, Copy)]
enum Script {
    /// Sends a 401 candidate error after the delay
    Challenge(u64),
    /// Sends a non-401 candidate error immediately, then stops gathering
    OtherErrorThenDone,
    /// Never answers; gathering stays open
    Silent,
    /// Session construction fails
    FailOpen,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    hosts_opened: std::sync::Mutex<Vec<Vec<String>>>,
}

struct ScriptedNegotiator {
    scripts: HashMap<String, Script>,
    counters: Arc<Counters>,
}

impl ScriptedNegotiator {
    fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(host, script)| (host.to_string(), *script))
                .collect(),
            counters: Arc::new(Counters::default()),
        }
    }
}

struct ScriptedSession {
    relays: Vec<(String, Script)>,
    data_channel: bool,
    held: Vec<mpsc::UnboundedSender<CandidateError>>,
    tasks: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    closed: bool,
}

impl RelayNegotiator for ScriptedNegotiator {
    type Session = ScriptedSession;

    fn open(&self, server: &IceServer) -> Result<ScriptedSession, NegotiationError> {
        let mut relays = Vec::new();
        for url in &server.urls {
            let (host, _) = parse_turn_url(url)
                .ok_or_else(|| NegotiationError::InvalidServerUrl(url.clone()))?;
            let script = self.scripts.get(&host).copied().unwrap_or(Script::Silent);
            if let Script::FailOpen = script {
                return Err(NegotiationError::Unsupported(format!("{host} refused")));
            }
            relays.push((url.clone(), script));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters
            .hosts_opened
            .lock()
            .unwrap()
            .push(relays.iter().map(|(url, _)| url.clone()).collect());
        Ok(ScriptedSession {
            relays,
            data_channel: false,
            held: Vec::new(),
            tasks: Vec::new(),
            counters: Arc::clone(&self.counters),
            closed: false,
        })
    }
}

impl Negotiation for ScriptedSession {
    fn create_data_channel(&mut self, _label: &str) {
        self.data_channel = true;
    }

    fn start_gathering(&mut self) -> mpsc::UnboundedReceiver<CandidateError> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.data_channel {
            return rx;
        }
        for (url, script) in self.relays.clone() {
            let tx = tx.clone();
            match script {
                Script::Challenge(delay_ms) => self.tasks.push(tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    let _ = tx.send(CandidateError {
                        url,
                        error_code: 401,
                        error_text: "Unauthorized".into(),
                    });
                })),
                Script::OtherErrorThenDone => {
                    let _ = tx.send(CandidateError {
                        url,
                        error_code: 701,
                        error_text: "unreachable".into(),
                    });
                }
                Script::Silent => self.held.push(tx),
                Script::FailOpen => {}
            }
        }
        rx
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        self.held.clear();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn region(id: &str, hosts: &[&str]) -> RegionTarget {
    RegionTarget::new(id, id, format!("https://{id}.example.com/"), hosts.iter().copied())
        .expect("valid region")
}

fn registry(regions: Vec<RegionTarget>) -> Registry {
    Registry::new(regions).expect("valid registry")
}

#[tokio::test(start_paused = true)]
async fn test_one_result_per_region_in_order() {
    let negotiator = ScriptedNegotiator::new(&[
        ("relay-a", Script::Challenge(50)),
        ("relay-b", Script::Silent),
        ("relay-c", Script::Challenge(120)),
    ]);
    let prober = RelayProber::new(negotiator, AggregationPolicy::AnyHost);
    let regions = registry(vec![
        region("a", &["relay-a"]),
        region("b", &["relay-b"]),
        region("c", &["relay-c"]),
    ]);
    let mut sink = RecordingSink::new();

    let results = prober.probe_all(&regions, &mut sink).await;

    let ids: Vec<_> = results.iter().map(|r| r.region_id()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    let outcomes: Vec<_> = results.iter().map(|r| r.outcome()).collect();
    assert_eq!(
        outcomes,
        [
            ProbeOutcome::Success,
            ProbeOutcome::Timeout,
            ProbeOutcome::Success
        ]
    );
    assert_eq!(sink.results(ProbeKind::Connectivity).len(), 3);
    assert_eq!(
        sink.results(ProbeKind::Connectivity)[1].region_id(),
        "b"
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_challenge_times_out_at_deadline() {
    let prober = RelayProber::new(
        ScriptedNegotiator::new(&[("relay-a", Script::Silent)]),
        AggregationPolicy::AnyHost,
    );
    let target = region("a", &["relay-a"]);

    let start = Instant::now();
    let result = prober.probe_region(&target).await;
    let elapsed = start.elapsed();

    assert_eq!(result.outcome(), ProbeOutcome::Timeout);
    assert_eq!(result.failure_cause(), Some(&FailureCause::Timeout));
    assert!(result.elapsed_millis().is_none());
    assert!(elapsed >= RELAY_NEGOTIATION_TIMEOUT);
    assert!(elapsed < RELAY_NEGOTIATION_TIMEOUT + Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn test_early_end_of_gathering_still_waits_for_deadline() {
    let prober = RelayProber::new(
        ScriptedNegotiator::new(&[("relay-a", Script::OtherErrorThenDone)]),
        AggregationPolicy::AnyHost,
    );

    let start = Instant::now();
    let result = prober.probe_region(&region("a", &["relay-a"])).await;

    assert_eq!(result.outcome(), ProbeOutcome::Timeout);
    assert!(start.elapsed() >= RELAY_NEGOTIATION_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_challenge_before_deadline_is_success_with_elapsed() {
    let prober = RelayProber::new(
        ScriptedNegotiator::new(&[("relay-a", Script::Challenge(230))]),
        AggregationPolicy::AnyHost,
    );

    let start = Instant::now();
    let result = prober.probe_region(&region("a", &["relay-a"])).await;
    let elapsed = start.elapsed();

    assert_eq!(result.outcome(), ProbeOutcome::Success);
    let ms = result.elapsed_millis().expect("success carries elapsed");
    assert!((230..=231).contains(&ms), "elapsed was {ms}");
    assert!(elapsed < RELAY_NEGOTIATION_TIMEOUT);
    assert_eq!(result.relay_host(), Some("relay-a"));
}

#[tokio::test(start_paused = true)]
async fn test_construction_failure_is_isolated() {
    let negotiator = ScriptedNegotiator::new(&[
        ("relay-a", Script::Challenge(10)),
        ("relay-b", Script::FailOpen),
        ("relay-c", Script::Challenge(20)),
    ]);
    let counters = Arc::clone(&negotiator.counters);
    let prober = RelayProber::new(negotiator, AggregationPolicy::AnyHost);
    let regions = registry(vec![
        region("a", &["relay-a"]),
        region("b", &["relay-b"]),
        region("c", &["relay-c"]),
    ]);

    let results = prober
        .probe_all(&regions, &mut RecordingSink::new())
        .await;

    assert_eq!(results[1].outcome(), ProbeOutcome::Error);
    assert!(results[1]
        .failure_cause()
        .is_some_and(FailureCause::is_construction));
    assert_eq!(results[2].outcome(), ProbeOutcome::Success);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_every_opened_session_is_closed() {
    let negotiator = ScriptedNegotiator::new(&[
        ("relay-a", Script::Challenge(10)),
        ("relay-b", Script::Silent),
    ]);
    let counters = Arc::clone(&negotiator.counters);
    let prober = RelayProber::new(negotiator, AggregationPolicy::AnyHost);
    let regions = registry(vec![region("a", &["relay-a"]), region("b", &["relay-b"])]);

    prober
        .probe_all(&regions, &mut RecordingSink::new())
        .await;

    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_any_host_uses_one_session_and_first_challenge_wins() {
    let negotiator = ScriptedNegotiator::new(&[
        ("relay-slow", Script::Challenge(400)),
        ("relay-fast", Script::Challenge(80)),
    ]);
    let counters = Arc::clone(&negotiator.counters);
    let prober = RelayProber::new(negotiator, AggregationPolicy::AnyHost);

    let result = prober
        .probe_region(&region("w", &["relay-slow", "relay-fast"]))
        .await;

    assert_eq!(result.relay_host(), Some("relay-fast"));
    assert!(result.elapsed_millis().is_some_and(|ms| ms < 100));
    let opened = counters.hosts_opened.lock().unwrap();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_first_host_ignores_other_hosts() {
    let negotiator = ScriptedNegotiator::new(&[
        ("relay-1", Script::Silent),
        ("relay-2", Script::Challenge(10)),
    ]);
    let counters = Arc::clone(&negotiator.counters);
    let prober = RelayProber::new(negotiator, AggregationPolicy::FirstHost);

    let result = prober
        .probe_region(&region("w", &["relay-1", "relay-2"]))
        .await;

    assert_eq!(result.outcome(), ProbeOutcome::Timeout);
    let opened = counters.hosts_opened.lock().unwrap();
    assert_eq!(*opened, vec![vec!["turn:relay-1:3478".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn test_best_of_probes_each_host_and_keeps_fastest() {
    let negotiator = ScriptedNegotiator::new(&[
        ("relay-1", Script::Challenge(250)),
        ("relay-2", Script::Challenge(90)),
        ("relay-3", Script::Silent),
    ]);
    let counters = Arc::clone(&negotiator.counters);
    let prober = RelayProber::new(negotiator, AggregationPolicy::BestOf);

    let result = prober
        .probe_region(&region("w", &["relay-1", "relay-2", "relay-3"]))
        .await;

    assert_eq!(result.outcome(), ProbeOutcome::Success);
    assert_eq!(result.relay_host(), Some("relay-2"));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 3);
}
