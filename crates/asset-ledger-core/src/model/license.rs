use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One seat held by one user. Open until `unassigned_date` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub user_id: String,
    pub assigned_by: String,
    pub assigned_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub unassigned_date: Option<DateTime<Utc>>,
    pub unassign_reason: Option<String>,
}

impl SeatAssignment {
    pub fn is_open(&self) -> bool {
        self.unassigned_date.is_none()
    }
}

/// A purchased software entitlement.
///
/// Seat usage, compliance and date status are derived from the fields below
/// on every read (see `ledger::seats`); none of them is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseGrant {
    pub id: String,
    pub name: String,
    pub vendor: Option<String>,
    pub total_seats: u32,
    pub assigned_to: BTreeSet<String>,
    pub assignment_history: Vec<SeatAssignment>,
    /// Total price paid for `total_seats`.
    pub purchase_cost: f64,
    pub purchase_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub renewal_notification_days: i64,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archive_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLicense {
    pub name: String,
    pub vendor: Option<String>,
    pub total_seats: u32,
    pub purchase_cost: f64,
    pub purchase_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    /// Falls back to the configured default when absent.
    pub renewal_notification_days: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    #[serde(rename = "compliant")]
    Compliant,
    #[serde(rename = "at-risk")]
    AtRisk,
    #[serde(rename = "overAllocated")]
    OverAllocated,
    #[serde(rename = "underUtilized")]
    UnderUtilized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Active,
    Expiring,
    Expired,
}
