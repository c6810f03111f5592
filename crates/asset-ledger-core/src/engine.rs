use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::analysis::reconcile::{
    collect_orphans, match_batch, reconciliation_stats, ReconcileOptions, ReconcileOutcome,
    ReconciliationStats, MIN_ACTIONABLE_CONFIDENCE,
};
use crate::config::AppConfig;
use crate::error::Result;
use crate::model::{CanonicalAsset, DiscoveredRecord};
use crate::progress::ProgressReporter;
use crate::storage::InventoryStore;

pub struct ReconcileEngine {
    options: ReconcileOptions,
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    pub stats: ReconciliationStats,
    pub match_duration: Duration,
    pub orphan_duration: Duration,
}

impl ReconcileEngine {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ReconcileOptions {
            days_threshold: config.reconciliation.orphan_days_threshold,
            min_confidence: f64::max(
                config.reconciliation.min_confidence as f64,
                MIN_ACTIONABLE_CONFIDENCE,
            ),
            flag_duplicate_serials: config.reconciliation.flag_duplicate_serials,
        })
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Run the reconciliation pipeline:
    /// 1. Parallel best-match lookup per discovered record
    /// 2. Orphan detection and duplicate-serial grouping
    /// 3. Per-tier statistics over the matches
    pub fn run(
        &self,
        discovered: &[DiscoveredRecord],
        canonical: &[CanonicalAsset],
        now: DateTime<Utc>,
        reporter: &dyn ProgressReporter,
    ) -> ReconcileReport {
        info!(
            "Reconciling {} discovered records against {} canonical assets",
            discovered.len(),
            canonical.len()
        );

        // Phase 1: Match
        reporter.on_match_start(discovered.len(), canonical.len());
        let match_start = Instant::now();
        let total = discovered.len();
        let (matches, unmatched) = match_batch(
            discovered,
            canonical,
            self.options.min_confidence,
            |processed| reporter.on_match_progress(processed, total),
        );
        let match_duration = match_start.elapsed();
        reporter.on_match_complete(matches.len(), match_duration.as_secs_f64());
        debug!(
            "Matching completed in {:.2}s - {} matched, {} unmatched",
            match_duration.as_secs_f64(),
            matches.len(),
            unmatched.len(),
        );

        // Phase 2: Orphans and duplicate serials
        reporter.on_orphan_scan_start();
        let orphan_start = Instant::now();
        let (orphaned, duplicate_serial_groups) =
            collect_orphans(canonical, discovered, self.options, now);
        let orphan_duration = orphan_start.elapsed();
        reporter.on_orphan_scan_complete(
            orphaned.len(),
            duplicate_serial_groups.len(),
            orphan_duration.as_secs_f64(),
        );
        debug!(
            "Orphan scan completed in {:.2}s - {} orphans, {} duplicate serial groups",
            orphan_duration.as_secs_f64(),
            orphaned.len(),
            duplicate_serial_groups.len(),
        );

        // Phase 3: Stats
        let stats = reconciliation_stats(&matches);

        ReconcileReport {
            outcome: ReconcileOutcome {
                matches,
                unmatched,
                orphaned,
                duplicate_serial_groups,
            },
            stats,
            match_duration,
            orphan_duration,
        }
    }

    /// [`run`](Self::run) against the live (non-archived) assets in `store`.
    /// Archived assets are retired records: they neither match nor orphan.
    pub fn run_against_store<S: InventoryStore>(
        &self,
        store: &S,
        discovered: &[DiscoveredRecord],
        now: DateTime<Utc>,
        reporter: &dyn ProgressReporter,
    ) -> Result<ReconcileReport> {
        let mut canonical = store.list_assets()?;
        let total = canonical.len();
        canonical.retain(|a| !a.is_archived);
        debug!(
            "Reconciling against {} live assets ({} archived skipped)",
            canonical.len(),
            total - canonical.len()
        );
        Ok(self.run(discovered, &canonical, now, reporter))
    }
}
