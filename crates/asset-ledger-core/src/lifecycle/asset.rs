//! Asset state machine.
//!
//! Every method checks all preconditions before touching the asset, so a
//! failed call leaves it exactly as it was. Successful mutations return the
//! audit entry describing them; persisting it is the caller's job.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::error::{EntityKind, Error, Result};
use crate::model::{
    AssetStatus, AssetUpdate, AssignmentRecord, AuditAction, AuditTrailEntry, CanonicalAsset,
    CustomField, CustomFieldType, LocationMove, NewAsset, PurchaseInfo,
};

fn require_text(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", what)));
    }
    Ok(())
}

pub(crate) fn validate_purchase(purchase: &PurchaseInfo) -> Result<()> {
    if purchase.useful_life_years == 0 {
        return Err(Error::Validation("Useful life must be at least one year".to_string()));
    }
    if purchase.purchase_price < 0.0 || purchase.salvage_value < 0.0 {
        return Err(Error::Validation("Purchase price and salvage value must not be negative".to_string()));
    }
    if purchase.salvage_value > purchase.purchase_price {
        return Err(Error::Validation("Salvage value cannot exceed purchase price".to_string()));
    }
    Ok(())
}

fn validate_custom_field(key: &str, field: &CustomField) -> Result<()> {
    require_text(key, "Custom field key")?;
    let value = field.value.trim();
    let valid = match field.field_type {
        CustomFieldType::Text => true,
        CustomFieldType::Number => value.parse::<f64>().is_ok(),
        CustomFieldType::Boolean => matches!(value, "true" | "false"),
        CustomFieldType::Date => {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
                || DateTime::parse_from_rfc3339(value).is_ok()
        }
    };
    if !valid {
        return Err(Error::Validation(format!(
            "Custom field '{}' value '{}' is not a valid {:?}",
            key, field.value, field.field_type
        )));
    }
    Ok(())
}

impl CanonicalAsset {
    /// Build a new in-stock asset from an intake payload.
    pub fn from_new(id: String, new: NewAsset, now: DateTime<Utc>) -> Result<Self> {
        require_text(&new.name, "Asset name")?;
        if let Some(purchase) = &new.purchase {
            validate_purchase(purchase)?;
        }
        for (key, field) in &new.custom_fields {
            validate_custom_field(key, field)?;
        }

        Ok(CanonicalAsset {
            id,
            serial_number: new.serial_number.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            asset_tag: new.asset_tag.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            name: new.name.trim().to_string(),
            manufacturer: new.manufacturer,
            model: new.model,
            status: AssetStatus::InStock,
            is_archived: false,
            archived_at: None,
            archive_reason: None,
            assigned_to: None,
            assigned_date: None,
            assignment_history: Vec::new(),
            location_id: new.location_id,
            location_history: Vec::new(),
            last_seen_in_discovery: None,
            custom_fields: new.custom_fields,
            purchase: new.purchase,
            created_at: now,
            version: 0,
        })
    }

    fn audit(&self, action: AuditAction, actor: &str, now: DateTime<Utc>) -> AuditTrailEntry {
        AuditTrailEntry::new(EntityKind::Asset, &self.id, action, actor, now)
    }

    fn reject_if_archived(&self, message: &str) -> Result<()> {
        if self.is_archived {
            return Err(Error::Conflict(message.to_string()));
        }
        Ok(())
    }

    pub fn archive(
        &mut self,
        actor: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        self.reject_if_archived("Asset is already archived")?;
        if let Some(user) = &self.assigned_to {
            return Err(Error::State(format!(
                "Cannot archive asset assigned to {}; return it first",
                user
            )));
        }

        self.is_archived = true;
        self.archived_at = Some(now);
        self.archive_reason = reason.map(str::to_string);
        self.status = AssetStatus::Retired;
        debug!("Archived asset {}", self.id);
        Ok(self.audit(AuditAction::Archive, actor, now).with_reason(reason))
    }

    /// Bring an archived asset back into stock. The status it had before
    /// archival is not recovered.
    pub fn restore(&mut self, actor: &str, now: DateTime<Utc>) -> Result<AuditTrailEntry> {
        if !self.is_archived {
            return Err(Error::State("Asset is not archived".to_string()));
        }

        self.is_archived = false;
        self.archived_at = None;
        self.archive_reason = None;
        self.status = AssetStatus::InStock;
        debug!("Restored asset {}", self.id);
        Ok(self.audit(AuditAction::Restore, actor, now))
    }

    pub fn assign(
        &mut self,
        user_id: &str,
        assigned_by: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        self.reject_if_archived("Cannot assign archived asset")?;
        require_text(user_id, "User id")?;
        if let Some(current) = &self.assigned_to {
            return Err(Error::Conflict(format!("Asset is already assigned to {}", current)));
        }

        self.assigned_to = Some(user_id.to_string());
        self.assigned_date = Some(now);
        self.status = AssetStatus::Active;
        self.assignment_history.push(AssignmentRecord {
            user_id: user_id.to_string(),
            assigned_by: assigned_by.to_string(),
            assigned_date: now,
            notes: notes.map(str::to_string),
            returned_date: None,
            returned_by: None,
            return_notes: None,
        });
        debug!("Assigned asset {} to {}", self.id, user_id);
        Ok(self
            .audit(AuditAction::Assign, assigned_by, now)
            .with_subject(user_id)
            .with_reason(notes))
    }

    pub fn return_asset(
        &mut self,
        returned_by: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        self.reject_if_archived("Cannot return archived asset")?;
        let user_id = self
            .assigned_to
            .clone()
            .ok_or_else(|| Error::State("Asset is not assigned".to_string()))?;

        if let Some(open) = self
            .assignment_history
            .iter_mut()
            .rev()
            .find(|a| a.is_open() && a.user_id == user_id)
        {
            open.returned_date = Some(now);
            open.returned_by = Some(returned_by.to_string());
            open.return_notes = notes.map(str::to_string);
        }
        self.assigned_to = None;
        self.assigned_date = None;
        self.status = AssetStatus::InStock;
        debug!("Asset {} returned by {}", self.id, user_id);
        Ok(self
            .audit(AuditAction::Return, returned_by, now)
            .with_subject(&user_id)
            .with_reason(notes))
    }

    pub fn transfer(
        &mut self,
        new_location_id: &str,
        moved_by: &str,
        now: DateTime<Utc>,
    ) -> Result<AuditTrailEntry> {
        self.reject_if_archived("Cannot transfer archived asset")?;
        require_text(new_location_id, "Location id")?;

        self.location_history.push(LocationMove {
            from: self.location_id.clone(),
            to: new_location_id.to_string(),
            moved_by: moved_by.to_string(),
            moved_at: now,
        });
        self.location_id = Some(new_location_id.to_string());
        Ok(self
            .audit(AuditAction::Transfer, moved_by, now)
            .with_subject(new_location_id))
    }

    /// Insert or replace a custom field. Keys are case-sensitive.
    pub fn set_custom_field(&mut self, key: &str, field: CustomField) -> Result<()> {
        self.reject_if_archived("Cannot modify custom fields of archived asset")?;
        validate_custom_field(key, &field)?;
        self.custom_fields.insert(key.to_string(), field);
        Ok(())
    }

    /// Returns whether the key was present.
    pub fn remove_custom_field(&mut self, key: &str) -> Result<bool> {
        self.reject_if_archived("Cannot modify custom fields of archived asset")?;
        Ok(self.custom_fields.remove(key).is_some())
    }

    /// Move between operational states.
    ///
    /// Active is only reachable through [`assign`](Self::assign), and an
    /// assigned asset has to be returned before it can leave Active.
    pub fn set_status(&mut self, status: AssetStatus) -> Result<()> {
        self.reject_if_archived("Cannot change status of archived asset")?;
        if status == self.status {
            return Ok(());
        }
        if status == AssetStatus::Active {
            return Err(Error::State("Assets become Active only through assignment".to_string()));
        }
        if let Some(user) = &self.assigned_to {
            return Err(Error::State(format!(
                "Asset is assigned to {}; return it before changing status to {}",
                user, status
            )));
        }
        self.status = status;
        Ok(())
    }

    /// Apply a partial update. Nothing changes unless every field is valid.
    pub fn apply_update(&mut self, update: &AssetUpdate) -> Result<()> {
        self.reject_if_archived("Cannot update archived asset")?;
        if let Some(name) = &update.name {
            require_text(name, "Asset name")?;
        }
        if let Some(purchase) = &update.purchase {
            validate_purchase(purchase)?;
        }

        let mut next = self.clone();
        if let Some(status) = update.status {
            next.set_status(status)?;
        }
        if let Some(name) = &update.name {
            next.name = name.trim().to_string();
        }
        if let Some(serial) = &update.serial_number {
            next.serial_number = Some(serial.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(tag) = &update.asset_tag {
            next.asset_tag = Some(tag.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(manufacturer) = &update.manufacturer {
            next.manufacturer = Some(manufacturer.clone());
        }
        if let Some(model) = &update.model {
            next.model = Some(model.clone());
        }
        if let Some(purchase) = &update.purchase {
            next.purchase = Some(purchase.clone());
        }
        *self = next;
        Ok(())
    }

    pub fn record_sighting(&mut self, seen_at: DateTime<Utc>) {
        if self.last_seen_in_discovery.is_none_or(|prev| prev < seen_at) {
            self.last_seen_in_discovery = Some(seen_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn laptop() -> CanonicalAsset {
        CanonicalAsset::from_new(
            "asset-1".to_string(),
            NewAsset {
                serial_number: Some(" C02XYZ ".to_string()),
                name: "MacBook Air".to_string(),
                location_id: Some("hq".to_string()),
                ..Default::default()
            },
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_from_new_requires_name() {
        let err = CanonicalAsset::from_new("x".to_string(), NewAsset::default(), now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_from_new_trims_serial() {
        assert_eq!(laptop().serial_number.as_deref(), Some("C02XYZ"));
        assert_eq!(laptop().status, AssetStatus::InStock);
    }

    #[test]
    fn test_archive_forces_retired_and_blocks_mutation() {
        let mut asset = laptop();
        asset.archive("admin", Some("end of life"), now()).unwrap();
        assert!(asset.is_archived);
        assert_eq!(asset.status, AssetStatus::Retired);
        assert_eq!(asset.archive_reason.as_deref(), Some("end of life"));

        let field = CustomField {
            value: "x".to_string(),
            field_type: CustomFieldType::Text,
        };
        for err in [
            asset.assign("u1", "admin", None, now()).unwrap_err(),
            asset.archive("admin", None, now()).unwrap_err(),
            asset.set_custom_field("k", field).unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
    }

    #[test]
    fn test_restore_resets_to_in_stock() {
        let mut asset = laptop();
        asset.set_status(AssetStatus::Repair).unwrap();
        asset.archive("admin", None, now()).unwrap();
        asset.restore("admin", now()).unwrap();
        assert!(!asset.is_archived);
        assert!(asset.archived_at.is_none());
        assert_eq!(asset.status, AssetStatus::InStock);

        assert_eq!(asset.restore("admin", now()).unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_assign_and_return_close_history() {
        let mut asset = laptop();
        let entry = asset.assign("alice", "it-desk", Some("onboarding"), now()).unwrap();
        assert_eq!(entry.subject.as_deref(), Some("alice"));
        assert_eq!(asset.status, AssetStatus::Active);

        let err = asset.assign("bob", "it-desk", None, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        asset.return_asset("it-desk", None, now()).unwrap();
        assert_eq!(asset.status, AssetStatus::InStock);
        assert!(asset.assigned_to.is_none());
        assert_eq!(asset.assignment_history.len(), 1);
        assert_eq!(asset.assignment_history[0].returned_date, Some(now()));
        assert!(asset.open_assignment().is_none());

        let err = asset.return_asset("it-desk", None, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_cannot_archive_assigned_asset() {
        let mut asset = laptop();
        asset.assign("alice", "it-desk", None, now()).unwrap();
        let before = asset.clone();
        assert_eq!(asset.archive("admin", None, now()).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(asset, before);
    }

    #[test]
    fn test_transfer_appends_history() {
        let mut asset = laptop();
        asset.transfer("branch-2", "facilities", now()).unwrap();
        assert_eq!(asset.location_id.as_deref(), Some("branch-2"));
        assert_eq!(asset.location_history.len(), 1);
        assert_eq!(asset.location_history[0].from.as_deref(), Some("hq"));
    }

    #[test]
    fn test_custom_fields_typed_last_write_wins() {
        let mut asset = laptop();
        let number = |v: &str| CustomField {
            value: v.to_string(),
            field_type: CustomFieldType::Number,
        };
        asset.set_custom_field("ram_gb", number("16")).unwrap();
        asset.set_custom_field("ram_gb", number("32")).unwrap();
        assert_eq!(asset.custom_fields["ram_gb"].value, "32");
        assert_eq!(
            asset.set_custom_field("ram_gb", number("lots")).unwrap_err().kind(),
            ErrorKind::Validation
        );
        // keys are case-sensitive
        assert!(!asset.remove_custom_field("RAM_GB").unwrap());
        assert!(asset.remove_custom_field("ram_gb").unwrap());
    }

    #[test]
    fn test_status_rules() {
        let mut asset = laptop();
        assert_eq!(asset.set_status(AssetStatus::Active).unwrap_err().kind(), ErrorKind::State);
        asset.assign("alice", "it", None, now()).unwrap();
        assert_eq!(asset.set_status(AssetStatus::Repair).unwrap_err().kind(), ErrorKind::State);
        asset.return_asset("it", None, now()).unwrap();
        asset.set_status(AssetStatus::Repair).unwrap();
        assert_eq!(asset.status, AssetStatus::Repair);
    }

    #[test]
    fn test_failed_update_changes_nothing() {
        let mut asset = laptop();
        asset.assign("alice", "it", None, now()).unwrap();
        let before = asset.clone();
        let update = AssetUpdate {
            name: Some("Renamed".to_string()),
            status: Some(AssetStatus::Repair),
            ..AssetUpdate::new("asset-1")
        };
        assert!(asset.apply_update(&update).is_err());
        assert_eq!(asset, before);
    }
}
