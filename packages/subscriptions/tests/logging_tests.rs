//! Log output of the subscription pipeline.
//!
//! Progress lines follow the `debug` setting; failures are logged regardless.

use std::io;
use std::sync::{Arc, Mutex};

use serde_json::json;
use subscriptions::testing::{RecordingNotifier, RecordingTransport};
use subscriptions::{
    AttemptStage, Configuration, OrderEvent, OrderStatus, SubscriptionOrchestrator,
    TriggerStatus,
};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn config(debug: bool) -> Configuration {
    Configuration {
        enabled: true,
        api_key: "k-us1".into(),
        list_id: "L1".into(),
        trigger_status: TriggerStatus::OrderCompleted,
        admin_email: Some("admin@example.com".into()),
        debug,
        ..Default::default()
    }
}

/// Run one order through the pipeline and return what it logged.
fn run_attempt(debug: bool, transport: RecordingTransport, expected: AttemptStage) -> String {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let orchestrator = SubscriptionOrchestrator::new(
        Arc::new(config(debug)),
        transport.client("k-us1"),
        Arc::new(RecordingNotifier::new()),
    );
    let event = OrderEvent::new(1001, OrderStatus::Completed).with_billing("a@example.com", "A", "B");

    let outcome = tracing::subscriber::with_default(subscriber, || {
        tokio_test::block_on(orchestrator.handle(event))
    });
    assert_eq!(outcome.stage(), expected);

    logs.contents()
}

fn rejected() -> RecordingTransport {
    RecordingTransport::new().with_json(400, json!({"detail": "Invalid Resource"}))
}

#[test]
fn test_progress_lines_are_silent_without_debug() {
    let logs = run_attempt(false, rejected(), AttemptStage::Failed);

    assert!(!logs.contains("Order event received"), "{logs}");
    assert!(!logs.contains("Subscription request built"), "{logs}");
    assert!(!logs.contains("Subscribing to list L1"), "{logs}");
    assert!(!logs.contains("stage="), "{logs}");
}

#[test]
fn test_progress_lines_follow_debug_setting() {
    let logs = run_attempt(true, rejected(), AttemptStage::Failed);

    assert!(logs.contains("Order event received"), "{logs}");
    assert!(logs.contains("Order is eligible"), "{logs}");
    assert!(logs.contains("Subscription request built"), "{logs}");
    assert!(logs.contains("Subscribing to list L1"), "{logs}");
    assert!(logs.contains("stage=submitted"), "{logs}");
}

#[test]
fn test_failures_are_logged_at_error_regardless_of_debug() {
    for debug in [false, true] {
        let logs = run_attempt(debug, rejected(), AttemptStage::Failed);

        let line = logs
            .lines()
            .find(|line| line.contains("MailChimp subscription failed"))
            .unwrap_or_else(|| panic!("no failure line with debug={debug}: {logs}"));
        assert!(line.contains("ERROR"), "{line}");
        assert!(line.contains("Invalid Resource"), "{line}");
    }
}

#[test]
fn test_success_is_quiet_without_debug() {
    let quiet = run_attempt(false, RecordingTransport::new(), AttemptStage::Succeeded);
    assert!(!quiet.contains("stage="), "{quiet}");
    assert!(!quiet.contains("ERROR"), "{quiet}");

    let verbose = run_attempt(true, RecordingTransport::new(), AttemptStage::Succeeded);
    assert!(verbose.contains("stage=succeeded"), "{verbose}");
}
