pub mod queries;
pub mod sqlite;

pub use sqlite::Database;

use crate::error::{EntityKind, Result};
use crate::model::{AuditTrailEntry, CanonicalAsset, LicenseGrant};

/// The persistent store the engine reads from and writes to.
///
/// Implementations enforce case-insensitive uniqueness of serial numbers and
/// asset tags, and reject updates whose `version` no longer matches the
/// stored one. Audit entries passed alongside a write are stored with it.
pub trait InventoryStore {
    fn find_asset(&self, id: &str) -> Result<Option<CanonicalAsset>>;
    fn find_asset_by_serial(&self, serial_number: &str) -> Result<Option<CanonicalAsset>>;
    fn list_assets(&self) -> Result<Vec<CanonicalAsset>>;
    fn count_assets(&self) -> Result<usize>;
    fn insert_asset(&self, asset: &CanonicalAsset, audit: &[AuditTrailEntry]) -> Result<()>;
    /// On success `asset.version` is advanced to the stored version.
    fn update_asset(&self, asset: &mut CanonicalAsset, audit: &[AuditTrailEntry]) -> Result<()>;

    fn find_license(&self, id: &str) -> Result<Option<LicenseGrant>>;
    fn list_licenses(&self) -> Result<Vec<LicenseGrant>>;
    fn count_licenses(&self) -> Result<usize>;
    fn insert_license(&self, license: &LicenseGrant, audit: &[AuditTrailEntry]) -> Result<()>;
    fn update_license(&self, license: &mut LicenseGrant, audit: &[AuditTrailEntry]) -> Result<()>;

    /// Entries for one record, oldest first.
    fn audit_trail(&self, entity: EntityKind, entity_id: &str) -> Result<Vec<AuditTrailEntry>>;
}
