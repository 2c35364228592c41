// tests/scheduler.rs
//
// Worker lifecycle on tokio's paused clock.
mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use common::{point, RecordingBus};
use data_ingestor::error::{CapabilityError, FetchError, ValidationError};
use data_ingestor::ingest::handlers::{DynHandler, Handler, HandlerRegistry};
use data_ingestor::ingest::scheduler::{prepare, run_cycle, CycleOutcome, Scheduler, StartError};
use data_ingestor::ingest::types::{Category, DataPoint, HandlerConfig, SourceDefinition};
use data_ingestor::publish::{MessageBus, Publisher};

/// Returns one point per call; optionally fails every other call.
#[derive(Default)]
struct Probe {
    calls: AtomicUsize,
    configs: Mutex<Vec<HandlerConfig>>,
    flaky: bool,
    empty: bool,
}

#[async_trait]
impl Handler for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn validate(&self, config: &HandlerConfig) -> Result<(), ValidationError> {
        match config.get("target") {
            Some(Value::String(_)) => Ok(()),
            _ => Err(ValidationError::MissingField {
                kind: "probe",
                field: "target",
            }),
        }
    }

    async fn fetch(&self, config: &HandlerConfig) -> Result<Vec<DataPoint>, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().push(config.clone());
        if self.flaky && n % 2 == 0 {
            return Err(FetchError::Request("flaky upstream".into()));
        }
        if self.empty {
            return Ok(vec![]);
        }
        Ok(vec![point(config.str_or("source", "?"), "reading", n as f64)])
    }
}

fn registry_with(probe: Arc<Probe>) -> HandlerRegistry {
    let mut reg = HandlerRegistry::with_builtins();
    reg.register("probe", move || Ok(Arc::clone(&probe) as DynHandler));
    reg
}

fn def(name: &str, kind: &str, every: Duration, config: Value) -> SourceDefinition {
    let config: Map<String, Value> = config.as_object().cloned().unwrap_or_default();
    SourceDefinition {
        name: name.to_string(),
        kind: kind.to_string(),
        category: Category::Social,
        frequency: every,
        config,
        origin: PathBuf::from("test.yaml"),
    }
}

fn publisher(bus: &Arc<RecordingBus>) -> Arc<Publisher> {
    Arc::new(Publisher::new(Arc::clone(bus) as Arc<dyn MessageBus>, "raw-data"))
}

#[tokio::test(start_paused = true)]
async fn first_cycle_is_immediate_then_periodic() {
    let probe = Arc::new(Probe::default());
    let bus = RecordingBus::new();
    let mut sched = Scheduler::new(registry_with(Arc::clone(&probe)), publisher(&bus));

    sched
        .spawn(def("p", "probe", Duration::from_secs(10), json!({"target": "x"})))
        .unwrap();
    assert_eq!(sched.running(), 1);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert_eq!(bus.call_count(), 3);

    sched.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn source_and_category_are_merged_into_config() {
    let probe = Arc::new(Probe::default());
    let bus = RecordingBus::new();
    let mut sched = Scheduler::new(registry_with(Arc::clone(&probe)), publisher(&bus));

    sched
        .spawn(def(
            "merged",
            "probe",
            Duration::from_secs(60),
            json!({"target": "x", "source": "spoofed", "category": "health"}),
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    sched.shutdown().await;

    let configs = probe.configs.lock();
    assert_eq!(configs[0].get_str("source"), Some("merged"));
    assert_eq!(configs[0].get_str("category"), Some("social"));
    assert_eq!(configs[0].get_str("target"), Some("x"));

    let msgs = bus.messages();
    assert_eq!(msgs[0].key, b"merged");
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_do_not_stop_the_worker() {
    let probe = Arc::new(Probe {
        flaky: true,
        ..Default::default()
    });
    let bus = RecordingBus::new();
    let mut sched = Scheduler::new(registry_with(Arc::clone(&probe)), publisher(&bus));

    sched
        .spawn(def("f", "probe", Duration::from_secs(5), json!({"target": "x"})))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(21)).await;

    // ticks at 0, 5, 10, 15, 20; even-numbered calls fail
    assert_eq!(probe.calls.load(Ordering::SeqCst), 5);
    assert_eq!(bus.call_count(), 2);
    sched.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_further_cycles() {
    let probe = Arc::new(Probe::default());
    let bus = RecordingBus::new();
    let mut sched = Scheduler::new(registry_with(Arc::clone(&probe)), publisher(&bus));
    let token = sched.shutdown_token();

    sched
        .spawn(def("s", "probe", Duration::from_secs(1), json!({"target": "x"})))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let before = probe.calls.load(Ordering::SeqCst);
    assert_eq!(before, 2);

    sched.shutdown().await;
    assert!(token.is_cancelled());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn bad_sources_are_not_started() {
    let probe = Arc::new(Probe::default());
    let reg = registry_with(Arc::clone(&probe));
    let every = Duration::from_secs(30);

    let unknown = prepare(&reg, &def("a", "carrier_pigeon", every, json!({}))).err();
    assert_eq!(
        unknown,
        Some(StartError::Capability(CapabilityError::Unknown("carrier_pigeon".into())))
    );

    let scraper = prepare(&reg, &def("b", "web_scraper", every, json!({}))).err();
    assert_eq!(
        scraper,
        Some(StartError::Capability(CapabilityError::NotImplemented("web_scraper".into())))
    );

    let invalid = prepare(&reg, &def("c", "probe", every, json!({}))).err();
    assert!(matches!(invalid, Some(StartError::Validation(_))));

    let no_url = prepare(&reg, &def("d", "http_fetch", every, json!({"method": "GET"}))).err();
    assert!(matches!(
        no_url,
        Some(StartError::Validation(ValidationError::MissingField { field: "url", .. }))
    ));

    let zero = prepare(&reg, &def("e", "probe", Duration::ZERO, json!({"target": "x"}))).err();
    assert_eq!(zero, Some(StartError::ZeroFrequency));
}

#[tokio::test(start_paused = true)]
async fn spawn_all_skips_bad_sources_and_keeps_good_ones() {
    let probe = Arc::new(Probe::default());
    let bus = RecordingBus::new();
    let mut sched = Scheduler::new(registry_with(Arc::clone(&probe)), publisher(&bus));
    let every = Duration::from_secs(30);

    let started = sched.spawn_all(vec![
        def("good_1", "probe", every, json!({"target": "x"})),
        def("ftp", "ftp_download", every, json!({})),
        def("bogus", "nope", every, json!({})),
        def("good_2", "probe", every, json!({"target": "y"})),
    ]);
    assert_eq!(started, 2);
    assert_eq!(sched.running(), 2);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    sched.shutdown().await;
}

#[tokio::test]
async fn run_cycle_reports_each_outcome() {
    let config = HandlerConfig::for_source(&def("rc", "probe", Duration::from_secs(1), json!({"target": "x"})));

    let ok_bus = RecordingBus::new();
    let ok = run_cycle("rc", &Probe::default(), &config, &publisher(&ok_bus)).await;
    assert_eq!(ok, CycleOutcome::Published(1));
    assert_eq!(ok_bus.messages().len(), 1);

    let empty = Probe {
        empty: true,
        ..Default::default()
    };
    let empty_bus = RecordingBus::new();
    assert_eq!(
        run_cycle("rc", &empty, &config, &publisher(&empty_bus)).await,
        CycleOutcome::Empty
    );
    assert_eq!(empty_bus.call_count(), 0);

    let flaky = Probe {
        flaky: true,
        ..Default::default()
    };
    assert_eq!(
        run_cycle("rc", &flaky, &config, &publisher(&RecordingBus::new())).await,
        CycleOutcome::FetchFailed
    );

    let down = RecordingBus::failing("no leader");
    assert_eq!(
        run_cycle("rc", &Probe::default(), &config, &publisher(&down)).await,
        CycleOutcome::PublishFailed
    );
}
