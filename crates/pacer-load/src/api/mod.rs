pub mod client;
pub mod expectation;

pub use client::{ApiClient, ApiError, ApiRequest, HttpOutcome};
pub use expectation::{BodyShape, Expectation, Mismatch};
