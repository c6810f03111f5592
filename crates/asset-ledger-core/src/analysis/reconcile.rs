use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tracing::{debug, info, trace};

use super::identity::{self, MatchTier, ReconciliationMatch};
use crate::model::{CanonicalAsset, DiscoveredRecord};

/// Matches scoring below this are discarded rather than reported.
pub const MIN_ACTIONABLE_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    MissingSerial,
    NotInDiscovery,
    DuplicateSerial,
}

/// A canonical asset that no current discovery signal confirms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedAsset {
    pub asset_id: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub reason: OrphanReason,
    pub last_seen_in_discovery: Option<DateTime<Utc>>,
    pub days_since_last_seen: Option<i64>,
}

/// Canonical assets sharing one case-insensitive serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSerialGroup {
    pub serial_key: String,
    /// Sorted ascending.
    pub asset_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationStats {
    pub total: usize,
    pub exact: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub with_conflicts: usize,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub days_threshold: i64,
    pub min_confidence: f64,
    /// Report surplus members of duplicate-serial groups as orphans.
    pub flag_duplicate_serials: bool,
}

impl ReconcileOptions {
    pub fn new(days_threshold: i64) -> Self {
        Self {
            days_threshold,
            min_confidence: MIN_ACTIONABLE_CONFIDENCE,
            flag_duplicate_serials: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub matches: Vec<ReconciliationMatch>,
    /// External ids of discovered records with no actionable match.
    pub unmatched: Vec<String>,
    pub orphaned: Vec<OrphanedAsset>,
    pub duplicate_serial_groups: Vec<DuplicateSerialGroup>,
}

/// Higher confidence wins; equal confidence prefers the smaller asset id.
fn better(candidate: &ReconciliationMatch, current: &ReconciliationMatch) -> bool {
    match candidate.confidence.partial_cmp(&current.confidence) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => candidate.asset_id < current.asset_id,
        _ => false,
    }
}

/// Best match for one discovered record, or `None` when the best scores
/// below [`MIN_ACTIONABLE_CONFIDENCE`].
pub fn match_one(
    discovered: &DiscoveredRecord,
    canonical: &[CanonicalAsset],
) -> Option<ReconciliationMatch> {
    match_one_with(discovered, canonical, MIN_ACTIONABLE_CONFIDENCE)
}

/// Like [`match_one`] with a stricter floor. Floors below
/// [`MIN_ACTIONABLE_CONFIDENCE`] are raised to it.
pub fn match_one_with(
    discovered: &DiscoveredRecord,
    canonical: &[CanonicalAsset],
    min_confidence: f64,
) -> Option<ReconciliationMatch> {
    let min_confidence = f64::max(min_confidence, MIN_ACTIONABLE_CONFIDENCE);
    let mut best: Option<ReconciliationMatch> = None;

    for asset in canonical {
        let candidate = identity::compare(discovered, asset);
        trace!(
            "{} vs {}: confidence {:.2}",
            discovered.external_id,
            asset.id,
            candidate.confidence
        );
        if best.as_ref().is_none_or(|b| better(&candidate, b)) {
            best = Some(candidate);
        }
    }

    best.filter(|m| m.confidence >= min_confidence)
}

/// Canonical assets with no serial, or whose serial is absent from discovery
/// and that have not been seen within `days_threshold` days of `now`.
pub fn find_orphaned_assets(
    canonical: &[CanonicalAsset],
    discovered: &[DiscoveredRecord],
    days_threshold: i64,
    now: DateTime<Utc>,
) -> Vec<OrphanedAsset> {
    let discovered_serials: AHashSet<String> =
        discovered.iter().filter_map(|d| d.serial_key()).collect();
    let cutoff = now - Duration::days(days_threshold);

    canonical
        .iter()
        .filter_map(|asset| {
            let reason = match asset.serial_key() {
                None => OrphanReason::MissingSerial,
                Some(key) if discovered_serials.contains(&key) => return None,
                Some(_) => {
                    let stale = asset
                        .last_seen_in_discovery
                        .is_none_or(|seen| seen < cutoff);
                    if !stale {
                        return None;
                    }
                    OrphanReason::NotInDiscovery
                }
            };
            Some(orphan(asset, reason, now))
        })
        .collect()
}

fn orphan(asset: &CanonicalAsset, reason: OrphanReason, now: DateTime<Utc>) -> OrphanedAsset {
    OrphanedAsset {
        asset_id: asset.id.clone(),
        name: asset.name.clone(),
        serial_number: asset.serial_number.clone(),
        reason,
        last_seen_in_discovery: asset.last_seen_in_discovery,
        days_since_last_seen: asset
            .last_seen_in_discovery
            .map(|seen| (now - seen).num_days()),
    }
}

/// Group canonical assets by case-insensitive serial; only groups of two or
/// more are returned, ordered by serial.
pub fn find_duplicate_serials(canonical: &[CanonicalAsset]) -> Vec<DuplicateSerialGroup> {
    let mut by_serial: AHashMap<String, Vec<String>> = AHashMap::new();
    for asset in canonical {
        if let Some(key) = asset.serial_key() {
            by_serial.entry(key).or_default().push(asset.id.clone());
        }
    }

    let mut groups: Vec<DuplicateSerialGroup> = by_serial
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(serial_key, mut asset_ids)| {
            asset_ids.sort();
            DuplicateSerialGroup {
                serial_key,
                asset_ids,
            }
        })
        .collect();
    groups.sort_by(|a, b| a.serial_key.cmp(&b.serial_key));
    groups
}

pub fn reconciliation_stats(matches: &[ReconciliationMatch]) -> ReconciliationStats {
    let mut stats = ReconciliationStats {
        total: matches.len(),
        ..Default::default()
    };
    let mut confidence_sum = 0.0;

    for m in matches {
        match m.tier {
            MatchTier::Exact => stats.exact += 1,
            MatchTier::High => stats.high += 1,
            MatchTier::Medium => stats.medium += 1,
            MatchTier::Low => stats.low += 1,
        }
        if m.has_conflicts() {
            stats.with_conflicts += 1;
        }
        confidence_sum += m.confidence;
    }

    if !matches.is_empty() {
        stats.average_confidence = confidence_sum / matches.len() as f64;
    }
    stats
}

/// Best match for every discovered record, evaluated in parallel.
/// `on_progress` receives the running count of processed records.
pub fn match_batch<F>(
    discovered: &[DiscoveredRecord],
    canonical: &[CanonicalAsset],
    min_confidence: f64,
    on_progress: F,
) -> (Vec<ReconciliationMatch>, Vec<String>)
where
    F: Fn(usize) + Sync,
{
    let processed = AtomicUsize::new(0);
    let results: Vec<(String, Option<ReconciliationMatch>)> = discovered
        .par_iter()
        .map(|d| {
            let best = match_one_with(d, canonical, min_confidence);
            on_progress(processed.fetch_add(1, AtomicOrdering::Relaxed) + 1);
            (d.external_id.clone(), best)
        })
        .collect();

    let mut matches = Vec::new();
    let mut unmatched = Vec::new();
    for (external_id, result) in results {
        match result {
            Some(m) => matches.push(m),
            None => unmatched.push(external_id),
        }
    }
    (matches, unmatched)
}

/// Orphans plus duplicate-serial groups for one run.
pub fn collect_orphans(
    canonical: &[CanonicalAsset],
    discovered: &[DiscoveredRecord],
    options: ReconcileOptions,
    now: DateTime<Utc>,
) -> (Vec<OrphanedAsset>, Vec<DuplicateSerialGroup>) {
    let mut orphaned = find_orphaned_assets(canonical, discovered, options.days_threshold, now);
    let duplicate_serial_groups = find_duplicate_serials(canonical);

    if options.flag_duplicate_serials {
        let already: AHashSet<String> = orphaned.iter().map(|o| o.asset_id.clone()).collect();
        let by_id: AHashMap<&str, &CanonicalAsset> =
            canonical.iter().map(|a| (a.id.as_str(), a)).collect();
        // the smallest id in each group is kept as the presumed original
        for group in &duplicate_serial_groups {
            for id in group.asset_ids.iter().skip(1) {
                if already.contains(id) {
                    continue;
                }
                if let Some(asset) = by_id.get(id.as_str()) {
                    orphaned.push(orphan(asset, OrphanReason::DuplicateSerial, now));
                }
            }
        }
    }
    (orphaned, duplicate_serial_groups)
}

/// Full read-only reconciliation of a discovered batch against a canonical
/// snapshot. Each discovered record is matched independently, so one asset
/// may be claimed by several discovered records.
pub fn reconcile(
    discovered: &[DiscoveredRecord],
    canonical: &[CanonicalAsset],
    options: ReconcileOptions,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    info!(
        "Reconciling {} discovered records against {} canonical assets",
        discovered.len(),
        canonical.len()
    );

    let (matches, unmatched) = match_batch(discovered, canonical, options.min_confidence, |_| {});
    let (orphaned, duplicate_serial_groups) = collect_orphans(canonical, discovered, options, now);

    debug!(
        "{} matched, {} unmatched, {} orphaned, {} duplicate serial groups",
        matches.len(),
        unmatched.len(),
        orphaned.len(),
        duplicate_serial_groups.len()
    );

    ReconcileOutcome {
        matches,
        unmatched,
        orphaned,
        duplicate_serial_groups,
    }
}
