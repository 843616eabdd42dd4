//! Progress reporting for evaluation runs.
//!
//! The runner reports one unit of work per scored candidate through
//! [`ProgressCallback`]; rendering (an `indicatif` bar in the CLI, nothing
//! in tests) is chosen by the caller.

use std::sync::Arc;

/// Receives progress updates from a run.
///
/// Implementations must be `Send + Sync` so a single reporter can be
/// shared behind an `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of candidates to score.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` candidates.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
