/// Trait for reporting reconciliation progress.
///
/// The CLI implements it with indicatif; library callers can use [`SilentReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_match_start(&self, _discovered: usize, _canonical: usize) {}
    fn on_match_progress(&self, _processed: usize, _total: usize) {}
    fn on_match_complete(&self, _matched: usize, _duration_secs: f64) {}
    fn on_orphan_scan_start(&self) {}
    fn on_orphan_scan_complete(&self, _orphans: usize, _duplicate_groups: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
