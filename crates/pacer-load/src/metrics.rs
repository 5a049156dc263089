use crate::engine::dispatcher::ACTIVE_INVOCATIONS;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::{json, Map, Value};
use std::sync::atomic::Ordering;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ACTIVE_GAUGE: Gauge = Gauge::new(
        "pacer_active_invocations",
        "Number of invocations currently in flight"
    )
    .expect("metric can be created");
    pub static ref INVOCATIONS_LAUNCHED: IntCounter = IntCounter::new(
        "pacer_invocations_launched_total",
        "Total number of invocations spawned by the paced dispatcher"
    )
    .expect("metric can be created");
    pub static ref STEPS_LAUNCHED: IntCounter = IntCounter::new(
        "pacer_steps_launched_total",
        "Total number of plan steps launched"
    )
    .expect("metric can be created");
    /// Steps whose launch phase overran their one-interval slot
    pub static ref PACING_UNDERRUNS: IntCounter = IntCounter::new(
        "pacer_pacing_underruns_total",
        "Total number of steps launched late because the previous launch overran its slot"
    )
    .expect("metric can be created");
    pub static ref OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("pacer_outcomes_total", "Recorded outcomes by result kind"),
        &["result"]
    )
    .expect("metric can be created");
}

pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(ACTIVE_GAUGE.clone()));
    let _ = REGISTRY.register(Box::new(INVOCATIONS_LAUNCHED.clone()));
    let _ = REGISTRY.register(Box::new(STEPS_LAUNCHED.clone()));
    let _ = REGISTRY.register(Box::new(PACING_UNDERRUNS.clone()));
    let _ = REGISTRY.register(Box::new(OUTCOMES.clone()));
}

/// Values of the `result` label on `pacer_outcomes_total`.
pub const OUTCOME_KINDS: [&str; 5] = [
    "success",
    "operation_error",
    "launch_error",
    "cancelled",
    "not_started",
];

fn sync_active_gauge() -> usize {
    let active = ACTIVE_INVOCATIONS.load(Ordering::SeqCst);
    ACTIVE_GAUGE.set(active as f64);
    active
}

/// Prometheus text exposition of the registry.
pub fn render_metrics() -> prometheus::Result<String> {
    sync_active_gauge();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Liveness body for `/health`: in-flight invocations and outcome totals by kind.
pub fn health_snapshot() -> Value {
    let outcomes: Map<String, Value> = OUTCOME_KINDS
        .iter()
        .map(|kind| (kind.to_string(), json!(OUTCOMES.with_label_values(&[*kind]).get())))
        .collect();

    json!({
        "status": "ok",
        "active_invocations": sync_active_gauge(),
        "steps_launched": STEPS_LAUNCHED.get(),
        "pacing_underruns": PACING_UNDERRUNS.get(),
        "outcomes": outcomes,
    })
}
