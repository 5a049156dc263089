//! Stepped, wall-clock paced fan-out of concurrent invocations.
//!
//! A run walks a [`StepPlan`]: for every step it spawns that step's
//! invocations as independent tasks, then sleeps until the next interval
//! boundary measured from the run start before launching the next step.
//! Launching never waits for earlier invocations, so slow calls from one
//! step keep running while later steps fire on schedule.
//!
//! Once the last step has launched, the run joins every outstanding task.
//! Every slot of the plan ends up with exactly one [`Outcome`] in the
//! run's [`ResultCollector`]: a value, an operation error, a panic, or a
//! cancellation.
//!
//! ## Cancellation
//! Each invocation receives a child of the caller's token. Cancelling it
//! (or hitting the optional run deadline) resolves in-flight invocations as
//! [`Failure::Cancelled`], records unlaunched slots as
//! [`Failure::NotStarted`], and bounds the join: tasks still running after
//! the grace period are aborted.

use crate::engine::collector::ResultCollector;
use crate::engine::outcome::{BoxError, Failure, InvocationId, Outcome};
use crate::engine::plan::StepPlan;
use crate::metrics;
use pacer_common::DispatchConfig;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub static ACTIVE_INVOCATIONS: AtomicUsize = AtomicUsize::new(0);

pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

struct InvocationGuard;

impl InvocationGuard {
    fn new() -> Self {
        ACTIVE_INVOCATIONS.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        ACTIVE_INVOCATIONS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One unit of work fired by the dispatcher, e.g. a single HTTP call.
///
/// Implementations should return promptly once `cancel` fires; the
/// dispatcher stops waiting on them at that point either way.
pub trait Operation: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn invoke(
        &self,
        id: InvocationId,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Self::Output, BoxError>> + Send;
}

impl<F, Fut, T> Operation for F
where
    F: Fn(InvocationId, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send,
    T: Send + Sync + 'static,
{
    type Output = T;

    fn invoke(
        &self,
        id: InvocationId,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<T, BoxError>> + Send {
        self(id, cancel)
    }
}

/// When a step was launched, relative to the run start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub step: usize,
    pub count: usize,
    pub launched_at: Duration,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct DispatchReport<T> {
    /// One entry per plan slot, in completion order.
    pub outcomes: Vec<Outcome<T>>,
    /// Steps that were actually launched.
    pub steps: Vec<StepRecord>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl<T> DispatchReport<T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &T> + '_ {
        self.outcomes.iter().filter_map(|o| o.value())
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome<T>> + '_ {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }
}

/// Delay before launching the next step.
///
/// `launched_at` is when the current step started launching and `elapsed`
/// is the time since the run started. Normally this is the time left to the
/// next interval boundary. If the current step's own launch phase took a
/// full interval or more, the next step goes out immediately; a step that
/// merely started late re-aligns to the grid instead of catching up.
pub fn pacing_delay(elapsed: Duration, launched_at: Duration, interval: Duration) -> Duration {
    if elapsed.saturating_sub(launched_at) >= interval {
        return Duration::ZERO;
    }

    let interval_nanos = interval.as_nanos();
    let into_interval = elapsed.as_nanos() % interval_nanos;
    Duration::from_nanos((interval_nanos - into_interval) as u64)
}

#[derive(Debug, Clone)]
pub struct PacedDispatcher {
    step_interval: Duration,
    cancel_grace: Duration,
    deadline: Option<Duration>,
}

impl Default for PacedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PacedDispatcher {
    pub fn new() -> Self {
        Self {
            step_interval: DEFAULT_STEP_INTERVAL,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            deadline: None,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new()
            .with_step_interval(Duration::from_millis(config.step_interval_ms))
            .with_cancel_grace(Duration::from_millis(config.cancel_grace_ms))
            .with_deadline(config.run_deadline_secs.map(Duration::from_secs))
    }

    /// # Panics
    /// Panics on a zero interval.
    pub fn with_step_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "step interval must be non-zero");
        self.step_interval = interval;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }

    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub async fn run<O: Operation>(&self, plan: &StepPlan, op: O) -> DispatchReport<O::Output> {
        self.run_with_cancel(plan, op, &CancellationToken::new())
            .await
    }

    /// Runs `plan` against `op`. Cancelling `cancel` winds the run down
    /// early; the report still accounts for every slot.
    pub async fn run_with_cancel<O: Operation>(
        &self,
        plan: &StepPlan,
        op: O,
        cancel: &CancellationToken,
    ) -> DispatchReport<O::Output> {
        let op = Arc::new(op);
        let token = cancel.child_token();
        // Teardown (including dropping this future mid-run) signals every invocation.
        let _teardown = token.clone().drop_guard();
        let collector = Arc::new(ResultCollector::with_capacity(plan.total()));
        let mut in_flight: Vec<(InvocationId, JoinHandle<()>)> = Vec::with_capacity(plan.total());
        let mut steps = Vec::with_capacity(plan.len());

        info!(
            steps = plan.len(),
            invocations = plan.total(),
            interval_ms = self.step_interval.as_millis() as u64,
            "Dispatch run started"
        );

        let t0 = Instant::now();
        let watchdog = self.deadline.map(|deadline| spawn_watchdog(deadline, token.clone()));

        let mut seq = 0;
        for (step, count) in plan.iter().enumerate() {
            if token.is_cancelled() {
                info!(step, "Run cancelled before step launch; remaining slots not started");
                skip_remaining(plan, step, seq, &collector);
                break;
            }

            let launched_at = t0.elapsed();
            for index in 0..count {
                let id = InvocationId::new(step, index, seq + index);
                let handle = spawn_invocation(
                    id,
                    Arc::clone(&op),
                    Arc::clone(&collector),
                    token.clone(),
                );
                in_flight.push((id, handle));
            }
            seq += count;

            metrics::STEPS_LAUNCHED.inc();
            metrics::INVOCATIONS_LAUNCHED.inc_by(count as u64);
            steps.push(StepRecord {
                step,
                count,
                launched_at,
            });
            debug!(
                step,
                count,
                launched_at_ms = launched_at.as_millis() as u64,
                "Step launched"
            );

            if step + 1 == plan.len() {
                break;
            }

            let elapsed = t0.elapsed();
            let delay = pacing_delay(elapsed, launched_at, self.step_interval);
            if delay.is_zero() {
                metrics::PACING_UNDERRUNS.inc();
                warn!(
                    step,
                    launch_ms = (elapsed - launched_at).as_millis() as u64,
                    "Step launch overran its interval; next step starts immediately"
                );
                continue;
            }

            tokio::select! {
                _ = sleep(delay) => {}
                _ = token.cancelled() => {
                    info!(step, "Run cancelled while pacing");
                }
            }
        }

        self.join(in_flight, &collector, &token).await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let cancelled = token.is_cancelled();
        let outcomes = collector.drain();
        if outcomes.len() != plan.total() {
            error!(
                expected = plan.total(),
                recorded = outcomes.len(),
                "Outcome count does not match plan"
            );
        }

        let report = DispatchReport {
            outcomes,
            steps,
            elapsed: t0.elapsed(),
            cancelled,
        };
        info!(
            outcomes = report.len(),
            failures = report.failure_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            cancelled,
            "Dispatch run finished"
        );
        report
    }

    /// Waits for every launched invocation. After the run token is cancelled,
    /// stragglers get `cancel_grace` before they are aborted.
    async fn join<T>(
        &self,
        in_flight: Vec<(InvocationId, JoinHandle<()>)>,
        collector: &ResultCollector<T>,
        token: &CancellationToken,
    ) {
        let grace = self.cancel_grace;
        let expired = async move {
            token.cancelled().await;
            sleep(grace).await;
        };
        tokio::pin!(expired);

        let mut pending = in_flight.into_iter();
        while let Some((id, mut handle)) = pending.next() {
            tokio::select! {
                res = &mut handle => settle(collector, id, res),
                _ = &mut expired => {
                    warn!(
                        outstanding = pending.len() + 1,
                        grace_ms = grace.as_millis() as u64,
                        "Grace period elapsed; aborting outstanding invocations"
                    );
                    for (id, handle) in std::iter::once((id, handle)).chain(pending.by_ref()) {
                        if handle.is_finished() {
                            settle(collector, id, handle.await);
                        } else {
                            // A task stuck inside a poll cannot be awaited within a bound.
                            handle.abort();
                            abandon(collector, id);
                        }
                    }
                    break;
                }
            }
        }
    }
}

fn spawn_watchdog(deadline: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = sleep(deadline) => {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Run deadline reached; cancelling"
                );
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

fn spawn_invocation<O: Operation>(
    id: InvocationId,
    op: Arc<O>,
    collector: Arc<ResultCollector<O::Output>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _guard = InvocationGuard::new();
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            res = op.invoke(id, token.clone()) => {
                res.map_err(|e| Failure::Operation(e.to_string()))
            }
            _ = token.cancelled() => Err(Failure::Cancelled),
        };
        record(
            &collector,
            Outcome {
                id,
                result,
                elapsed: started.elapsed(),
            },
        );
    })
}

fn record<T>(collector: &ResultCollector<T>, outcome: Outcome<T>) {
    let label = outcome.metric_label();
    if collector.insert(outcome) {
        metrics::OUTCOMES.with_label_values(&[label]).inc();
    }
}

/// Accounts for a joined task that did not record its own outcome.
fn settle<T>(collector: &ResultCollector<T>, id: InvocationId, res: Result<(), JoinError>) {
    if collector.contains(&id) {
        return;
    }
    let failure = match res {
        Ok(()) => Failure::Launch("invocation finished without an outcome".to_string()),
        Err(e) if e.is_panic() => Failure::Launch(panic_message(e.into_panic())),
        Err(_) => Failure::Cancelled,
    };
    warn!(invocation = %id, failure = %failure, "Invocation settled by join");
    record(collector, Outcome::failure(id, failure, Duration::ZERO));
}

/// Records an aborted invocation that has not reported back yet.
fn abandon<T>(collector: &ResultCollector<T>, id: InvocationId) {
    if collector.contains(&id) {
        return;
    }
    warn!(invocation = %id, "Invocation abandoned after grace period");
    record(collector, Outcome::failure(id, Failure::Cancelled, Duration::ZERO));
}

fn skip_remaining<T>(
    plan: &StepPlan,
    from_step: usize,
    mut seq: usize,
    collector: &ResultCollector<T>,
) {
    for (step, count) in plan.iter().enumerate().skip(from_step) {
        for index in 0..count {
            let id = InvocationId::new(step, index, seq);
            record(
                collector,
                Outcome::failure(id, Failure::NotStarted, Duration::ZERO),
            );
            seq += 1;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
