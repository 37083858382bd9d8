//! Progress reporting for long runs.
use tracing::info;

/// Receives `(task, completed, total, description)` updates. Implementations
/// only observe; nothing waits on them.
pub trait ProgressSink: Send + Sync {
    fn update(&self, task: &str, completed: usize, total: usize, description: &str);
}

/// Logs every update at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn update(&self, task: &str, completed: usize, total: usize, description: &str) {
        info!(task, completed, total, "{description}");
    }
}
