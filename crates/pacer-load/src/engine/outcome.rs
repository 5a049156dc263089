use std::fmt;
use std::time::Duration;

/// Boxed error returned by operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Identifies one invocation slot of a run.
///
/// `seq` is the global position of the slot across the whole plan:
/// the offset of its step plus its index within the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationId {
    pub seq: usize,
    pub step: usize,
    pub index: usize,
}

impl InvocationId {
    pub fn new(step: usize, index: usize, seq: usize) -> Self {
        Self { seq, step, index }
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (step {}, slot {})", self.seq, self.step, self.index)
    }
}

/// Why an invocation did not produce a success value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    #[error("operation failed: {0}")]
    Operation(String),
    #[error("invocation failed to launch or panicked: {0}")]
    Launch(String),
    #[error("cancelled while in flight")]
    Cancelled,
    #[error("cancelled before launch")]
    NotStarted,
}

impl Failure {
    /// Label used for the outcomes metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::Operation(_) => "operation_error",
            Failure::Launch(_) => "launch_error",
            Failure::Cancelled => "cancelled",
            Failure::NotStarted => "not_started",
        }
    }
}

/// Result of one invocation. Never mutated after it is produced.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub id: InvocationId,
    pub result: Result<T, Failure>,
    /// Launch-to-completion time; zero for slots that never started.
    pub elapsed: Duration,
}

impl<T> Outcome<T> {
    pub fn success(id: InvocationId, value: T, elapsed: Duration) -> Self {
        Self {
            id,
            result: Ok(value),
            elapsed,
        }
    }

    pub fn failure(id: InvocationId, failure: Failure, elapsed: Duration) -> Self {
        Self {
            id,
            result: Err(failure),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn failure_ref(&self) -> Option<&Failure> {
        self.result.as_ref().err()
    }

    pub(crate) fn metric_label(&self) -> &'static str {
        match &self.result {
            Ok(_) => "success",
            Err(f) => f.kind(),
        }
    }
}
