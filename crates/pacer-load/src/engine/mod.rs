pub mod collector;
pub mod dispatcher;
pub mod outcome;
pub mod plan;
