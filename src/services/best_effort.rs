use serde::Serialize;
use std::fmt::Display;
use std::future::Future;

/// Result of a step whose failure must not affect the surrounding operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    Failed(String),
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done)
    }
}

/// Run a cleanup or bookkeeping step, logging and swallowing its failure
///
/// Used for upload compensation, blob deletes during a cascade and audit
/// appends. The outcome is returned for reporting only.
pub async fn best_effort<T, E, F>(step: &'static str, fut: F) -> StepOutcome
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(_) => StepOutcome::Done,
        Err(e) => {
            tracing::warn!(step, error = %e, "Best-effort step failed, continuing");
            StepOutcome::Failed(e.to_string())
        }
    }
}
