//! Progress callbacks for long-running pipelines.

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per finished unit of work (a merged pair, an embedded section).
    fn item_done(&self, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_done(&self, _current: usize, _total: usize) {}
    fn done(&self) {}
}
