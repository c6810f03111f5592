use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::seats::TrueUp;
use crate::model::{ComplianceStatus, LicenseGrant};

/// Grants used below this share of their seats are downgrade candidates.
pub const DOWNGRADE_UTILIZATION: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationCandidate {
    pub license_id: String,
    pub name: String,
    pub total_seats: u32,
    pub used_seats: u32,
    pub utilization: f64,
    pub recommended_seats: u32,
    pub potential_savings: f64,
}

/// Downgrade candidates among live grants, largest saving first.
pub fn optimization_candidates(licenses: &[LicenseGrant]) -> Vec<OptimizationCandidate> {
    let mut candidates: Vec<OptimizationCandidate> = licenses
        .iter()
        .filter(|l| !l.is_archived && l.utilization() < DOWNGRADE_UTILIZATION)
        .map(|l| {
            let used = l.used_seats();
            OptimizationCandidate {
                license_id: l.id.clone(),
                name: l.name.clone(),
                total_seats: l.total_seats,
                used_seats: used,
                utilization: l.utilization(),
                recommended_seats: used,
                potential_savings: l.total_seats.saturating_sub(used) as f64 * l.cost_per_seat(),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.potential_savings
            .partial_cmp(&a.potential_savings)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.license_id.cmp(&b.license_id))
    });
    candidates
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub compliant: usize,
    pub at_risk: usize,
    pub over_allocated: usize,
    pub under_utilized: usize,
    /// Share of grants that are not over-allocated, 0-100.
    pub score: f64,
}

pub fn compliance_summary(licenses: &[LicenseGrant]) -> ComplianceSummary {
    let mut summary = ComplianceSummary::default();
    for license in licenses.iter().filter(|l| !l.is_archived) {
        summary.total += 1;
        match license.compliance_status() {
            ComplianceStatus::Compliant => summary.compliant += 1,
            ComplianceStatus::AtRisk => summary.at_risk += 1,
            ComplianceStatus::OverAllocated => summary.over_allocated += 1,
            ComplianceStatus::UnderUtilized => summary.under_utilized += 1,
        }
    }
    summary.score = if summary.total == 0 {
        100.0
    } else {
        (summary.total - summary.over_allocated) as f64 / summary.total as f64 * 100.0
    };
    summary
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrueUpReport {
    /// Only grants with a shortfall.
    pub items: Vec<TrueUp>,
    pub total_shortfall: u32,
    pub total_cost: f64,
}

pub fn true_up_report(licenses: &[LicenseGrant]) -> TrueUpReport {
    let items: Vec<TrueUp> = licenses
        .iter()
        .map(LicenseGrant::true_up)
        .filter(|t| t.shortfall > 0)
        .collect();
    TrueUpReport {
        total_shortfall: items.iter().map(|t| t.shortfall).sum(),
        total_cost: items.iter().map(|t| t.cost).sum(),
        items,
    }
}
