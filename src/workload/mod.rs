pub mod http;

use std::time::Duration;

use async_trait::async_trait;

/// What one request produced: a status code if a response arrived, the
/// elapsed latency, and the transport failure kind otherwise.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Option<u16>,
    pub latency: Duration,
    pub error: Option<String>,
}

/// A named boolean assertion recorded once per iteration.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub pass: bool,
}

/// One completed workload iteration: exactly one outcome and one check.
#[derive(Debug, Clone)]
pub struct Iteration {
    pub outcome: Outcome,
    pub check: CheckResult,
}

/// The unit of work each virtual user executes back-to-back while active.
///
/// `run_once` never fails: transport errors are carried in the `Outcome` so a
/// virtual user that errors on one invocation starts the next normally.
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run_once(&self) -> Iteration;
}
