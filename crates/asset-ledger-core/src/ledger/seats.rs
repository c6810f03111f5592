//! Seat ledger for license grants.
//!
//! Used seats, utilization, cost per seat, compliance and date status are
//! all computed from `assigned_to`, `total_seats`, `purchase_cost` and the
//! expiration date on each call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EntityKind, Error, Result};
use crate::model::{
    AuditAction, AuditTrailEntry, ComplianceStatus, LicenseGrant, LicenseStatus, NewLicense,
    SeatAssignment,
};

pub const AT_RISK_UTILIZATION: f64 = 0.90;
pub const UNDER_UTILIZED_UTILIZATION: f64 = 0.30;

/// Cost of usage beyond the purchased entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueUp {
    pub license_id: String,
    pub total_seats: u32,
    pub used_seats: u32,
    pub shortfall: u32,
    pub cost_per_seat: f64,
    pub cost: f64,
}

impl LicenseGrant {
    pub fn from_new(
        id: String,
        new: NewLicense,
        default_renewal_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("License name is required".to_string()));
        }
        if new.total_seats == 0 {
            return Err(Error::Validation("License must have at least one seat".to_string()));
        }
        if new.purchase_cost < 0.0 {
            return Err(Error::Validation("Purchase cost must not be negative".to_string()));
        }
        let renewal_notification_days = new.renewal_notification_days.unwrap_or(default_renewal_days);
        if renewal_notification_days < 0 {
            return Err(Error::Validation("Renewal notification days must not be negative".to_string()));
        }

        Ok(LicenseGrant {
            id,
            name: new.name.trim().to_string(),
            vendor: new.vendor,
            total_seats: new.total_seats,
            assigned_to: Default::default(),
            assignment_history: Vec::new(),
            purchase_cost: new.purchase_cost,
            purchase_date: new.purchase_date,
            expiration_date: new.expiration_date,
            renewal_notification_days,
            is_archived: false,
            archived_at: None,
            archive_reason: None,
            created_at: now,
            version: 0,
        })
    }

    pub fn used_seats(&self) -> u32 {
        self.assigned_to.len() as u32
    }

    pub fn available_seats(&self) -> u32 {
        self.total_seats.saturating_sub(self.used_seats())
    }

    /// used / total; zero when the grant has no seats.
    pub fn utilization(&self) -> f64 {
        if self.total_seats == 0 {
            return 0.0;
        }
        self.used_seats() as f64 / self.total_seats as f64
    }

    pub fn cost_per_seat(&self) -> f64 {
        if self.total_seats == 0 {
            return 0.0;
        }
        self.purchase_cost / self.total_seats as f64
    }

    pub fn compliance_status(&self) -> ComplianceStatus {
        let utilization = self.utilization();
        if self.used_seats() > self.total_seats {
            ComplianceStatus::OverAllocated
        } else if utilization >= AT_RISK_UTILIZATION {
            ComplianceStatus::AtRisk
        } else if utilization < UNDER_UTILIZED_UTILIZATION {
            ComplianceStatus::UnderUtilized
        } else {
            ComplianceStatus::Compliant
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> LicenseStatus {
        match self.expiration_date {
            Some(expires) if now > expires => LicenseStatus::Expired,
            Some(expires) if expires - now <= Duration::days(self.renewal_notification_days) => {
                LicenseStatus::Expiring
            }
            _ => LicenseStatus::Active,
        }
    }

    pub fn open_assignment(&self, user_id: &str) -> Option<&SeatAssignment> {
        self.assignment_history
            .iter()
            .rev()
            .find(|a| a.is_open() && a.user_id == user_id)
    }

    fn audit(&self, action: AuditAction, actor: &str, now: DateTime<Utc>) -> AuditTrailEntry {
        AuditTrailEntry::new(EntityKind::License, &self.id, action, actor, now)
    }

    pub fn allocate(
        &mut self,
        user_id: &str,
        allocated_by: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        if self.is_archived {
            return Err(Error::Conflict("Cannot allocate seats on archived license".to_string()));
        }
        if user_id.trim().is_empty() {
            return Err(Error::Validation("User id is required".to_string()));
        }
        if self.assigned_to.contains(user_id) {
            return Err(Error::Conflict(format!("User {} already holds a seat", user_id)));
        }
        if self.used_seats() >= self.total_seats {
            return Err(Error::Capacity(format!(
                "No seats available ({} of {} in use)",
                self.used_seats(),
                self.total_seats
            )));
        }

        self.assigned_to.insert(user_id.to_string());
        self.assignment_history.push(SeatAssignment {
            user_id: user_id.to_string(),
            assigned_by: allocated_by.to_string(),
            assigned_date: now,
            notes: notes.map(str::to_string),
            unassigned_date: None,
            unassign_reason: None,
        });
        debug!(
            "Allocated seat on {} to {} ({}/{})",
            self.id,
            user_id,
            self.used_seats(),
            self.total_seats
        );
        Ok(self
            .audit(AuditAction::Allocate, allocated_by, now)
            .with_subject(user_id)
            .with_reason(notes))
    }

    /// Release a user's seat. Allowed on archived grants so seats can be
    /// reclaimed after retirement.
    pub fn deallocate(
        &mut self,
        user_id: &str,
        actor: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        if !self.assigned_to.remove(user_id) {
            return Err(Error::State(format!("User {} does not hold a seat", user_id)));
        }
        if let Some(open) = self
            .assignment_history
            .iter_mut()
            .rev()
            .find(|a| a.is_open() && a.user_id == user_id)
        {
            open.unassigned_date = Some(now);
            open.unassign_reason = reason.map(str::to_string);
        }
        debug!("Released seat on {} held by {}", self.id, user_id);
        Ok(self
            .audit(AuditAction::Deallocate, actor, now)
            .with_subject(user_id)
            .with_reason(reason))
    }

    pub fn archive(
        &mut self,
        actor: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        if self.is_archived {
            return Err(Error::Conflict("License is already archived".to_string()));
        }
        self.is_archived = true;
        self.archived_at = Some(now);
        self.archive_reason = reason.map(str::to_string);
        Ok(self.audit(AuditAction::Archive, actor, now).with_reason(reason))
    }

    pub fn restore(&mut self, actor: &str, now: DateTime<Utc>) -> Result<AuditTrailEntry> {
        if !self.is_archived {
            return Err(Error::State("License is not archived".to_string()));
        }
        self.is_archived = false;
        self.archived_at = None;
        self.archive_reason = None;
        Ok(self.audit(AuditAction::Restore, actor, now))
    }

    /// Change the purchased seat count. Shrinking below current usage is
    /// accepted and leaves the grant over-allocated until seats are released
    /// or trued up.
    pub fn resize(&mut self, total_seats: u32, actor: &str, now: DateTime<Utc>) -> Result<AuditTrailEntry> {
        if self.is_archived {
            return Err(Error::Conflict("Cannot resize archived license".to_string()));
        }
        if total_seats == 0 {
            return Err(Error::Validation("License must have at least one seat".to_string()));
        }
        let previous = self.total_seats;
        self.total_seats = total_seats;
        if self.used_seats() > total_seats {
            warn!(
                "License {} resized to {} seats with {} in use",
                self.id,
                total_seats,
                self.used_seats()
            );
        }
        Ok(self
            .audit(AuditAction::Resize, actor, now)
            .with_subject(&format!("{} -> {}", previous, total_seats)))
    }

    pub fn true_up(&self) -> TrueUp {
        let shortfall = self.used_seats().saturating_sub(self.total_seats);
        let cost_per_seat = self.cost_per_seat();
        TrueUp {
            license_id: self.id.clone(),
            total_seats: self.total_seats,
            used_seats: self.used_seats(),
            shortfall,
            cost_per_seat,
            cost: shortfall as f64 * cost_per_seat,
        }
    }
}
