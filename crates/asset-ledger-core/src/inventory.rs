//! Store-backed lifecycle and seat operations.
//!
//! Each operation loads the record, runs the state machine, and writes the
//! result together with its audit entry. A failure before the write leaves
//! the store untouched.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::identity::ReconciliationMatch;
use crate::bulk::BulkResult;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::directory::{OpenDirectory, UserDirectory};
use crate::error::{EntityKind, Error, Result};
use crate::lifecycle::DepreciationSchedule;
use crate::model::{
    AssetUpdate, AuditAction, AuditTrailEntry, CanonicalAsset, CustomField, DiscoveredRecord,
    LicenseGrant, NewAsset, NewLicense,
};
use crate::storage::InventoryStore;

pub struct Inventory<S: InventoryStore> {
    store: S,
    users: Box<dyn UserDirectory>,
    clock: Box<dyn Clock>,
    default_renewal_days: i64,
}

impl<S: InventoryStore> Inventory<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            users: Box::new(OpenDirectory),
            clock: Box::new(SystemClock),
            default_renewal_days: AppConfig::default()
                .licensing
                .default_renewal_notification_days,
        }
    }

    pub fn with_users(mut self, users: impl UserDirectory + 'static) -> Self {
        self.users = Box::new(users);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.default_renewal_days = config.licensing.default_renewal_notification_days;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn require_user(&self, user_id: &str) -> Result<()> {
        if !self.users.contains(user_id) {
            return Err(Error::Validation(format!("Unknown user {}", user_id)));
        }
        Ok(())
    }

    pub fn asset(&self, id: &str) -> Result<CanonicalAsset> {
        self.store
            .find_asset(id)?
            .ok_or_else(|| Error::not_found(EntityKind::Asset, id))
    }

    pub fn license(&self, id: &str) -> Result<LicenseGrant> {
        self.store
            .find_license(id)?
            .ok_or_else(|| Error::not_found(EntityKind::License, id))
    }

    fn mutate_asset<F>(&self, id: &str, change: F) -> Result<CanonicalAsset>
    where
        F: FnOnce(&mut CanonicalAsset, DateTime<Utc>) -> Result<AuditTrailEntry>,
    {
        let mut asset = self.asset(id)?;
        let entry = change(&mut asset, self.now())?;
        self.store.update_asset(&mut asset, &[entry])?;
        Ok(asset)
    }

    fn mutate_license<F>(&self, id: &str, change: F) -> Result<LicenseGrant>
    where
        F: FnOnce(&mut LicenseGrant, DateTime<Utc>) -> Result<AuditTrailEntry>,
    {
        let mut license = self.license(id)?;
        let entry = change(&mut license, self.now())?;
        self.store.update_license(&mut license, &[entry])?;
        Ok(license)
    }

    // ── Assets ───────────────────────────────────────────────────

    pub fn create_asset(&self, new: NewAsset, actor: &str) -> Result<CanonicalAsset> {
        let now = self.now();
        let asset = CanonicalAsset::from_new(Uuid::new_v4().to_string(), new, now)?;
        if let Some(serial) = &asset.serial_number {
            if self.store.find_asset_by_serial(serial)?.is_some() {
                return Err(Error::Conflict(format!("Serial number {} already exists", serial)));
            }
        }
        let entry = AuditTrailEntry::new(EntityKind::Asset, &asset.id, AuditAction::Create, actor, now);
        self.store.insert_asset(&asset, &[entry])?;
        debug!("Created asset {} ({})", asset.id, asset.name);
        Ok(asset)
    }

    pub fn update_asset(&self, update: &AssetUpdate, actor: &str) -> Result<CanonicalAsset> {
        self.mutate_asset(&update.id, |asset, now| {
            asset.apply_update(update)?;
            Ok(AuditTrailEntry::new(EntityKind::Asset, &asset.id, AuditAction::Update, actor, now))
        })
    }

    pub fn archive_asset(&self, id: &str, actor: &str, reason: Option<&str>) -> Result<CanonicalAsset> {
        self.mutate_asset(id, |asset, now| asset.archive(actor, reason, now))
    }

    pub fn restore_asset(&self, id: &str, actor: &str) -> Result<CanonicalAsset> {
        self.mutate_asset(id, |asset, now| asset.restore(actor, now))
    }

    pub fn assign_asset(
        &self,
        id: &str,
        user_id: &str,
        assigned_by: &str,
        notes: Option<&str>,
    ) -> Result<CanonicalAsset> {
        self.require_user(user_id)?;
        self.mutate_asset(id, |asset, now| asset.assign(user_id, assigned_by, notes, now))
    }

    pub fn return_asset(&self, id: &str, returned_by: &str, notes: Option<&str>) -> Result<CanonicalAsset> {
        self.mutate_asset(id, |asset, now| asset.return_asset(returned_by, notes, now))
    }

    pub fn transfer_asset(&self, id: &str, location_id: &str, moved_by: &str) -> Result<CanonicalAsset> {
        self.mutate_asset(id, |asset, now| asset.transfer(location_id, moved_by, now))
    }

    pub fn set_custom_field(
        &self,
        id: &str,
        key: &str,
        field: CustomField,
        actor: &str,
    ) -> Result<CanonicalAsset> {
        self.mutate_asset(id, |asset, now| {
            asset.set_custom_field(key, field)?;
            Ok(AuditTrailEntry::new(EntityKind::Asset, &asset.id, AuditAction::Update, actor, now)
                .with_subject(key))
        })
    }

    pub fn remove_custom_field(&self, id: &str, key: &str, actor: &str) -> Result<CanonicalAsset> {
        self.mutate_asset(id, |asset, now| {
            if !asset.remove_custom_field(key)? {
                return Err(Error::Validation(format!("Custom field '{}' is not set", key)));
            }
            Ok(AuditTrailEntry::new(EntityKind::Asset, &asset.id, AuditAction::Update, actor, now)
                .with_subject(key))
        })
    }

    pub fn depreciation(&self, id: &str) -> Result<DepreciationSchedule> {
        self.asset(id)?.depreciation(self.now())
    }

    /// Stamp `last_seen_in_discovery` on every matched asset with the
    /// discovered record's sighting time.
    ///
    /// Each asset is written on its own, so a failure (version conflict,
    /// deleted asset) is recorded against that asset and the rest still get
    /// stamped. `items` lists the assets that were written; archived assets
    /// and sightings older than the stored one are skipped silently.
    pub fn record_sightings(
        &self,
        matches: &[ReconciliationMatch],
        discovered: &[DiscoveredRecord],
    ) -> BulkResult<String, String> {
        let seen: AHashMap<(&str, &str), DateTime<Utc>> = discovered
            .iter()
            .map(|d| ((d.source_id.as_str(), d.external_id.as_str()), d.last_seen))
            .collect();

        let mut latest: AHashMap<&str, DateTime<Utc>> = AHashMap::new();
        for m in matches {
            if let Some(at) = seen.get(&(m.source_id.as_str(), m.external_id.as_str())) {
                let slot = latest.entry(m.asset_id.as_str()).or_insert(*at);
                if *at > *slot {
                    *slot = *at;
                }
            }
        }
        let mut targets: Vec<(&str, DateTime<Utc>)> = latest.into_iter().collect();
        targets.sort_by(|a, b| a.0.cmp(b.0));

        let mut result = BulkResult::default();
        for (asset_id, at) in targets {
            match self.stamp_sighting(asset_id, at) {
                Ok(false) => {}
                outcome => {
                    if let Err(e) = &outcome {
                        warn!("Could not record sighting for {}: {}", asset_id, e);
                    }
                    result.record(asset_id.to_string(), outcome.map(|_| asset_id.to_string()));
                }
            }
        }
        info!(
            "Recorded discovery sightings: {} updated, {} failed",
            result.success, result.failed
        );
        result
    }

    /// Returns whether the asset was written.
    fn stamp_sighting(&self, asset_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut asset = self.asset(asset_id)?;
        if asset.is_archived {
            debug!("Skipping sighting for archived asset {}", asset_id);
            return Ok(false);
        }
        let before = asset.last_seen_in_discovery;
        asset.record_sighting(at);
        if asset.last_seen_in_discovery == before {
            return Ok(false);
        }
        self.store.update_asset(&mut asset, &[])?;
        Ok(true)
    }

    // ── Licenses ─────────────────────────────────────────────────

    pub fn create_license(&self, new: NewLicense, actor: &str) -> Result<LicenseGrant> {
        let now = self.now();
        let license = LicenseGrant::from_new(
            Uuid::new_v4().to_string(),
            new,
            self.default_renewal_days,
            now,
        )?;
        let entry = AuditTrailEntry::new(EntityKind::License, &license.id, AuditAction::Create, actor, now);
        self.store.insert_license(&license, &[entry])?;
        debug!("Created license {} ({} seats)", license.id, license.total_seats);
        Ok(license)
    }

    pub fn allocate_seat(
        &self,
        license_id: &str,
        user_id: &str,
        allocated_by: &str,
        notes: Option<&str>,
    ) -> Result<LicenseGrant> {
        self.require_user(user_id)?;
        self.mutate_license(license_id, |license, now| {
            license.allocate(user_id, allocated_by, notes, now)
        })
    }

    pub fn deallocate_seat(
        &self,
        license_id: &str,
        user_id: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<LicenseGrant> {
        self.mutate_license(license_id, |license, now| {
            license.deallocate(user_id, actor, reason, now)
        })
    }

    pub fn archive_license(&self, id: &str, actor: &str, reason: Option<&str>) -> Result<LicenseGrant> {
        self.mutate_license(id, |license, now| license.archive(actor, reason, now))
    }

    pub fn restore_license(&self, id: &str, actor: &str) -> Result<LicenseGrant> {
        self.mutate_license(id, |license, now| license.restore(actor, now))
    }

    pub fn resize_license(&self, id: &str, total_seats: u32, actor: &str) -> Result<LicenseGrant> {
        self.mutate_license(id, |license, now| license.resize(total_seats, actor, now))
    }

    pub fn audit_trail(&self, entity: EntityKind, id: &str) -> Result<Vec<AuditTrailEntry>> {
        self.store.audit_trail(entity, id)
    }
}
