//! Helpers for driving the whole pipeline in integration tests.
//!
//! The tests exercise the stages the way the product wires them: an edit
//! goes through a [`ValidationSession`] debounce cycle, the published
//! lowered code goes to the executor, and frames are rendered against a
//! caller-owned budget.

use std::time::Instant;

use reelguard_exec::{Composition, ExecError, Executor, FrameBudget, Value, VideoConfig};
use reelguard_session::{DEFAULT_DEBOUNCE, ValidationSession, ValidationSnapshot};
use reelguard_syntax::ValidationError;
use thiserror::Error;

/// A failure from any stage of the pipeline.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The static stages rejected the source.
    #[error("source rejected with {} error(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    /// The executor rejected or failed to run the lowered source.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Runs one edit through a session's full debounce cycle.
#[must_use]
pub fn run_static_pipeline(source: &str) -> ValidationSnapshot {
    let mut session = ValidationSession::new();
    let start = Instant::now();
    session.record_edit(source, start);
    // The deadline is in the past at poll time, so this always fires.
    let _ = session.poll(start + DEFAULT_DEBOUNCE);
    session.snapshot().clone()
}

/// Validates, lowers and executes `source` into a composition.
pub fn build_composition(
    source: &str,
    budget: &FrameBudget,
) -> Result<Composition, PipelineError> {
    let snapshot = run_static_pipeline(source);
    let Some(lowered) = snapshot.lowered_code else {
        return Err(PipelineError::Rejected(snapshot.errors));
    };
    Ok(Executor::standard().execute(&lowered, budget)?)
}

/// Full chain: renders a single frame of `source` with a fresh budget.
pub fn render_frame(source: &str, frame: u32) -> Result<Value, PipelineError> {
    let budget = FrameBudget::standard();
    let composition = build_composition(source, &budget)?;
    budget.reset();
    Ok(composition.render_frame(frame, VideoConfig::default(), &budget)?)
}
