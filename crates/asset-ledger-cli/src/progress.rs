use std::sync::Mutex;
use std::time::Duration;

use asset_ledger_core::ProgressReporter;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Reconciliation progress on stderr.
///
/// Matching gets a bar (the discovered count is known up front), the orphan
/// scan a spinner.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars(TICK_CHARS)
}

impl ProgressReporter for CliReporter {
    fn on_match_start(&self, discovered: usize, canonical: usize) {
        let pb = ProgressBar::new(discovered as u64);
        pb.set_style(style(
            "  {spinner:.cyan} Matching [{bar:30.cyan/dim}] {pos}/{len} records {msg}",
        ));
        pb.set_message(format!("against {} assets", canonical));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_match_progress(&self, processed: usize, _total: usize) {
        // parallel workers report counts out of order; the bar only moves forward
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if processed as u64 > pb.position() {
                    pb.set_position(processed as u64);
                }
            }
        }
    }

    fn on_match_complete(&self, matched: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Matching complete: {} matched in {:.2}s",
            "✓".green(),
            matched,
            duration_secs
        );
    }

    fn on_orphan_scan_start(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(style("  {spinner:.cyan} {msg}"));
        pb.set_message("Looking for orphaned assets...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_orphan_scan_complete(&self, orphans: usize, duplicate_groups: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Orphan scan complete: {} orphans, {} duplicate serial groups in {:.2}s",
            "✓".green(),
            orphans,
            duplicate_groups,
            duration_secs
        );
    }
}
