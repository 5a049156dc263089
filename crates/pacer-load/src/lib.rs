pub mod api;
pub mod engine;
pub mod metrics;
pub mod suite;

pub use engine::collector::ResultCollector;
pub use engine::dispatcher::{DispatchReport, Operation, PacedDispatcher, StepRecord};
pub use engine::outcome::{BoxError, Failure, InvocationId, Outcome};
pub use engine::plan::StepPlan;
