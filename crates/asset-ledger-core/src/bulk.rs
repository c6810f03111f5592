//! Batch application of lifecycle and seat operations.
//!
//! Items are attempted one by one and failures are collected per item.
//! Successful items are not rolled back when a later one fails.

use ahash::AHashMap;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::model::{AssetUpdate, CanonicalAsset, LicenseGrant, NewAsset};
use crate::storage::InventoryStore;

#[derive(Debug)]
pub struct BulkItemError<R> {
    /// The input item or id that failed.
    pub item: R,
    pub error: Error,
}

#[derive(Debug)]
pub struct BulkResult<T, R> {
    pub success: usize,
    pub failed: usize,
    pub items: Vec<T>,
    pub errors: Vec<BulkItemError<R>>,
}

impl<T, R> Default for BulkResult<T, R> {
    fn default() -> Self {
        Self {
            success: 0,
            failed: 0,
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T, R> BulkResult<T, R> {
    pub(crate) fn record(&mut self, item: R, outcome: Result<T>) {
        match outcome {
            Ok(value) => {
                self.success += 1;
                self.items.push(value);
            }
            Err(error) => {
                self.failed += 1;
                self.errors.push(BulkItemError { item, error });
            }
        }
    }
}

pub struct BulkCoordinator<'a, S: InventoryStore> {
    inventory: &'a Inventory<S>,
}

impl<'a, S: InventoryStore> BulkCoordinator<'a, S> {
    pub fn new(inventory: &'a Inventory<S>) -> Self {
        Self { inventory }
    }

    /// Create every item independently.
    ///
    /// The whole batch is rejected, before anything is written, when two of
    /// its items share a serial number. Collisions with serials already in
    /// the store only fail the colliding item.
    pub fn bulk_create(
        &self,
        items: Vec<NewAsset>,
        actor: &str,
    ) -> Result<BulkResult<CanonicalAsset, NewAsset>> {
        let mut seen: AHashMap<String, usize> = AHashMap::new();
        for item in &items {
            if let Some(key) = item.serial_key() {
                *seen.entry(key).or_default() += 1;
            }
        }
        let mut duplicated: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key)
            .collect();
        if !duplicated.is_empty() {
            duplicated.sort();
            warn!("Rejecting bulk create: duplicate serials {:?}", duplicated);
            return Err(Error::Validation(format!(
                "Duplicate serial numbers in batch: {}",
                duplicated.join(", ")
            )));
        }

        let mut result = BulkResult::default();
        for item in items {
            let outcome = self.inventory.create_asset(item.clone(), actor);
            if let Err(e) = &outcome {
                warn!("Bulk create failed for '{}': {}", item.name, e);
            }
            result.record(item, outcome);
        }
        info!("Bulk create: {} created, {} failed", result.success, result.failed);
        Ok(result)
    }

    pub fn bulk_update(
        &self,
        updates: Vec<AssetUpdate>,
        actor: &str,
    ) -> BulkResult<CanonicalAsset, String> {
        let mut result = BulkResult::default();
        for update in updates {
            let outcome = self.inventory.update_asset(&update, actor);
            if let Err(e) = &outcome {
                warn!("Bulk update failed for {}: {}", update.id, e);
            }
            result.record(update.id, outcome);
        }
        info!("Bulk update: {} updated, {} failed", result.success, result.failed);
        result
    }

    pub fn bulk_archive(
        &self,
        ids: &[String],
        actor: &str,
        reason: Option<&str>,
    ) -> BulkResult<CanonicalAsset, String> {
        let mut result = BulkResult::default();
        for id in ids {
            let outcome = self.inventory.archive_asset(id, actor, reason);
            if let Err(e) = &outcome {
                warn!("Bulk archive failed for {}: {}", id, e);
            }
            result.record(id.clone(), outcome);
        }
        info!("Bulk archive: {} archived, {} failed", result.success, result.failed);
        result
    }

    /// Allocate one seat per user on a single grant. The returned items are
    /// the users that received a seat; the final grant state can be re-read
    /// from the store.
    pub fn bulk_allocate(
        &self,
        license_id: &str,
        user_ids: &[String],
        allocated_by: &str,
    ) -> BulkResult<String, String> {
        let mut result = BulkResult::default();
        for user_id in user_ids {
            let outcome: Result<LicenseGrant> =
                self.inventory
                    .allocate_seat(license_id, user_id, allocated_by, None);
            if let Err(e) = &outcome {
                warn!("Seat allocation on {} failed for {}: {}", license_id, user_id, e);
            }
            result.record(user_id.clone(), outcome.map(|_| user_id.clone()));
        }
        info!(
            "Bulk allocate on {}: {} allocated, {} failed",
            license_id, result.success, result.failed
        );
        result
    }
}
