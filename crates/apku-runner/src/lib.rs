//! Serial execution of external command-line tools with batched, merged
//! output delivery.

mod batch;
mod events;
mod exec;
mod outcome;
mod request;
mod worker;

pub use batch::{BatchPolicy, DEFAULT_MAX_AGE, DEFAULT_MAX_LINES};
pub use events::{RunnerEvent, RunnerEventQueue, RunnerEventSender};
pub use outcome::{separator, ExecutionOutcome, SEPARATOR_WIDTH, SPAWN_ERROR_STATUS, SUCCESS_STATUS};
pub use request::{ExecutionRequest, OutputSink, RequestHandle, RequestId, SubmitError};
pub use worker::{ProcessRunner, RunnerOptions};

#[cfg(all(test, unix))]
mod tests;
