use rusqlite::types::Type;
use rusqlite::{params, ErrorCode, OptionalExtension, Row, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::sqlite::Database;
use super::InventoryStore;
use crate::error::{EntityKind, Error, Result};
use crate::model::{identifier_key, AssetStatus, AuditAction, AuditTrailEntry, CanonicalAsset, LicenseGrant};

const ASSET_COLUMNS: &str = "id, serial_number, asset_tag, name, manufacturer, model, status, \
     is_archived, archived_at, archive_reason, assigned_to, assigned_date, location_id, \
     last_seen_in_discovery, assignment_history, location_history, custom_fields, purchase, \
     created_at, version";

const LICENSE_COLUMNS: &str = "id, name, vendor, total_seats, assigned_to, assignment_history, \
     purchase_cost, purchase_date, expiration_date, renewal_notification_days, is_archived, \
     archived_at, archive_reason, created_at, version";

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| serde_json::from_str(&r).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[derive(Debug)]
struct UnknownValue(String);

impl std::fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownValue {}

fn parse_status(value: &str) -> Option<AssetStatus> {
    Some(match value {
        "InStock" => AssetStatus::InStock,
        "Active" => AssetStatus::Active,
        "Repair" => AssetStatus::Repair,
        "Retired" => AssetStatus::Retired,
        _ => return None,
    })
}

fn entity_label(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::Asset => "asset",
        EntityKind::License => "license",
    }
}

fn asset_from_row(row: &Row) -> rusqlite::Result<CanonicalAsset> {
    let status: String = row.get(6)?;
    Ok(CanonicalAsset {
        id: row.get(0)?,
        serial_number: row.get(1)?,
        asset_tag: row.get(2)?,
        name: row.get(3)?,
        manufacturer: row.get(4)?,
        model: row.get(5)?,
        status: parse_status(&status).ok_or_else(|| conversion_error(6, UnknownValue(status)))?,
        is_archived: row.get(7)?,
        archived_at: row.get(8)?,
        archive_reason: row.get(9)?,
        assigned_to: row.get(10)?,
        assigned_date: row.get(11)?,
        location_id: row.get(12)?,
        last_seen_in_discovery: row.get(13)?,
        assignment_history: json_column(row, 14)?,
        location_history: json_column(row, 15)?,
        custom_fields: json_column(row, 16)?,
        purchase: optional_json_column(row, 17)?,
        created_at: row.get(18)?,
        version: row.get::<_, i64>(19)? as u64,
    })
}

fn license_from_row(row: &Row) -> rusqlite::Result<LicenseGrant> {
    Ok(LicenseGrant {
        id: row.get(0)?,
        name: row.get(1)?,
        vendor: row.get(2)?,
        total_seats: row.get(3)?,
        assigned_to: json_column(row, 4)?,
        assignment_history: json_column(row, 5)?,
        purchase_cost: row.get(6)?,
        purchase_date: row.get(7)?,
        expiration_date: row.get(8)?,
        renewal_notification_days: row.get(9)?,
        is_archived: row.get(10)?,
        archived_at: row.get(11)?,
        archive_reason: row.get(12)?,
        created_at: row.get(13)?,
        version: row.get::<_, i64>(14)? as u64,
    })
}

fn audit_from_row(row: &Row) -> rusqlite::Result<AuditTrailEntry> {
    let entity: String = row.get(0)?;
    let action: String = row.get(2)?;
    Ok(AuditTrailEntry {
        entity: match entity.as_str() {
            "asset" => EntityKind::Asset,
            "license" => EntityKind::License,
            _ => return Err(conversion_error(0, UnknownValue(entity))),
        },
        entity_id: row.get(1)?,
        action: AuditAction::parse(&action).ok_or_else(|| conversion_error(2, UnknownValue(action)))?,
        actor: row.get(3)?,
        reason: row.get(4)?,
        subject: row.get(5)?,
        timestamp: row.get(6)?,
    })
}

/// Turn unique-constraint failures into domain conflicts.
fn map_write_error(entity: EntityKind, e: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &e {
        if failure.code == ErrorCode::ConstraintViolation {
            let conflict = if message.contains("serial_key") {
                "Serial number already exists".to_string()
            } else if message.contains("asset_tag_key") {
                "Asset tag already exists".to_string()
            } else {
                format!("{} already exists", entity)
            };
            return Error::Conflict(conflict);
        }
    }
    Error::Database(e)
}

fn insert_audit(tx: &Transaction, entries: &[AuditTrailEntry]) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO audit_entry (entity, entity_id, action, actor, reason, subject, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for entry in entries {
        stmt.execute(params![
            entity_label(entry.entity),
            entry.entity_id,
            entry.action.as_str(),
            entry.actor,
            entry.reason,
            entry.subject,
            entry.timestamp,
        ])?;
    }
    Ok(())
}

impl Database {
    // ── Assets ───────────────────────────────────────────────────

    fn asset_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .connection()
            .query_row("SELECT 1 FROM asset WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn license_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .connection()
            .query_row("SELECT 1 FROM license WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn stale_write(&self, entity: EntityKind, id: &str, exists: bool, version: u64) -> Error {
        if !exists {
            return Error::not_found(entity, id);
        }
        Error::Conflict(format!(
            "{} {} was modified concurrently (expected version {})",
            entity, id, version
        ))
    }
}

impl InventoryStore for Database {
    fn find_asset(&self, id: &str) -> Result<Option<CanonicalAsset>> {
        let sql = format!("SELECT {} FROM asset WHERE id = ?1", ASSET_COLUMNS);
        Ok(self
            .connection()
            .query_row(&sql, params![id], asset_from_row)
            .optional()?)
    }

    fn find_asset_by_serial(&self, serial_number: &str) -> Result<Option<CanonicalAsset>> {
        let Some(key) = identifier_key(Some(serial_number)) else {
            return Ok(None);
        };
        let sql = format!("SELECT {} FROM asset WHERE serial_key = ?1", ASSET_COLUMNS);
        Ok(self
            .connection()
            .query_row(&sql, params![key], asset_from_row)
            .optional()?)
    }

    fn list_assets(&self) -> Result<Vec<CanonicalAsset>> {
        let sql = format!("SELECT {} FROM asset ORDER BY id", ASSET_COLUMNS);
        let mut stmt = self.connection().prepare(&sql)?;
        let assets = stmt
            .query_map([], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    fn count_assets(&self) -> Result<usize> {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM asset", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert_asset(&self, asset: &CanonicalAsset, audit: &[AuditTrailEntry]) -> Result<()> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO asset \
             (id, serial_number, serial_key, asset_tag, asset_tag_key, name, manufacturer, model, \
              status, is_archived, archived_at, archive_reason, assigned_to, assigned_date, \
              location_id, last_seen_in_discovery, assignment_history, location_history, \
              custom_fields, purchase, created_at, version) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                     ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                asset.id,
                asset.serial_number,
                asset.serial_key(),
                asset.asset_tag,
                asset.asset_tag_key(),
                asset.name,
                asset.manufacturer,
                asset.model,
                asset.status.to_string(),
                asset.is_archived,
                asset.archived_at,
                asset.archive_reason,
                asset.assigned_to,
                asset.assigned_date,
                asset.location_id,
                asset.last_seen_in_discovery,
                to_json(&asset.assignment_history)?,
                to_json(&asset.location_history)?,
                to_json(&asset.custom_fields)?,
                asset.purchase.as_ref().map(to_json).transpose()?,
                asset.created_at,
                asset.version as i64,
            ],
        )
        .map_err(|e| map_write_error(EntityKind::Asset, e))?;
        insert_audit(&tx, audit)?;
        tx.commit()?;
        debug!("Inserted asset {}", asset.id);
        Ok(())
    }

    fn update_asset(&self, asset: &mut CanonicalAsset, audit: &[AuditTrailEntry]) -> Result<()> {
        let tx = self.connection().unchecked_transaction()?;
        let changed = tx
            .execute(
                "UPDATE asset SET \
                 serial_number = ?2, serial_key = ?3, asset_tag = ?4, asset_tag_key = ?5, \
                 name = ?6, manufacturer = ?7, model = ?8, status = ?9, is_archived = ?10, \
                 archived_at = ?11, archive_reason = ?12, assigned_to = ?13, assigned_date = ?14, \
                 location_id = ?15, last_seen_in_discovery = ?16, assignment_history = ?17, \
                 location_history = ?18, custom_fields = ?19, purchase = ?20, \
                 version = version + 1 \
                 WHERE id = ?1 AND version = ?21",
                params![
                    asset.id,
                    asset.serial_number,
                    asset.serial_key(),
                    asset.asset_tag,
                    asset.asset_tag_key(),
                    asset.name,
                    asset.manufacturer,
                    asset.model,
                    asset.status.to_string(),
                    asset.is_archived,
                    asset.archived_at,
                    asset.archive_reason,
                    asset.assigned_to,
                    asset.assigned_date,
                    asset.location_id,
                    asset.last_seen_in_discovery,
                    to_json(&asset.assignment_history)?,
                    to_json(&asset.location_history)?,
                    to_json(&asset.custom_fields)?,
                    asset.purchase.as_ref().map(to_json).transpose()?,
                    asset.version as i64,
                ],
            )
            .map_err(|e| map_write_error(EntityKind::Asset, e))?;

        if changed == 0 {
            drop(tx);
            let exists = self.asset_exists(&asset.id)?;
            return Err(self.stale_write(EntityKind::Asset, &asset.id, exists, asset.version));
        }
        insert_audit(&tx, audit)?;
        tx.commit()?;
        asset.version += 1;
        debug!("Updated asset {} (version {})", asset.id, asset.version);
        Ok(())
    }

    // ── Licenses ─────────────────────────────────────────────────

    fn find_license(&self, id: &str) -> Result<Option<LicenseGrant>> {
        let sql = format!("SELECT {} FROM license WHERE id = ?1", LICENSE_COLUMNS);
        Ok(self
            .connection()
            .query_row(&sql, params![id], license_from_row)
            .optional()?)
    }

    fn list_licenses(&self) -> Result<Vec<LicenseGrant>> {
        let sql = format!("SELECT {} FROM license ORDER BY id", LICENSE_COLUMNS);
        let mut stmt = self.connection().prepare(&sql)?;
        let licenses = stmt
            .query_map([], license_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(licenses)
    }

    fn count_licenses(&self) -> Result<usize> {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM license", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert_license(&self, license: &LicenseGrant, audit: &[AuditTrailEntry]) -> Result<()> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO license \
             (id, name, vendor, total_seats, assigned_to, assignment_history, purchase_cost, \
              purchase_date, expiration_date, renewal_notification_days, is_archived, \
              archived_at, archive_reason, created_at, version) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                license.id,
                license.name,
                license.vendor,
                license.total_seats,
                to_json(&license.assigned_to)?,
                to_json(&license.assignment_history)?,
                license.purchase_cost,
                license.purchase_date,
                license.expiration_date,
                license.renewal_notification_days,
                license.is_archived,
                license.archived_at,
                license.archive_reason,
                license.created_at,
                license.version as i64,
            ],
        )
        .map_err(|e| map_write_error(EntityKind::License, e))?;
        insert_audit(&tx, audit)?;
        tx.commit()?;
        debug!("Inserted license {}", license.id);
        Ok(())
    }

    fn update_license(&self, license: &mut LicenseGrant, audit: &[AuditTrailEntry]) -> Result<()> {
        let tx = self.connection().unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE license SET \
             name = ?2, vendor = ?3, total_seats = ?4, assigned_to = ?5, \
             assignment_history = ?6, purchase_cost = ?7, purchase_date = ?8, \
             expiration_date = ?9, renewal_notification_days = ?10, is_archived = ?11, \
             archived_at = ?12, archive_reason = ?13, version = version + 1 \
             WHERE id = ?1 AND version = ?14",
            params![
                license.id,
                license.name,
                license.vendor,
                license.total_seats,
                to_json(&license.assigned_to)?,
                to_json(&license.assignment_history)?,
                license.purchase_cost,
                license.purchase_date,
                license.expiration_date,
                license.renewal_notification_days,
                license.is_archived,
                license.archived_at,
                license.archive_reason,
                license.version as i64,
            ],
        )?;

        if changed == 0 {
            drop(tx);
            let exists = self.license_exists(&license.id)?;
            return Err(self.stale_write(EntityKind::License, &license.id, exists, license.version));
        }
        insert_audit(&tx, audit)?;
        tx.commit()?;
        license.version += 1;
        debug!("Updated license {} (version {})", license.id, license.version);
        Ok(())
    }

    // ── Audit Trail ──────────────────────────────────────────────

    fn audit_trail(&self, entity: EntityKind, entity_id: &str) -> Result<Vec<AuditTrailEntry>> {
        let mut stmt = self.connection().prepare(
            "SELECT entity, entity_id, action, actor, reason, subject, timestamp \
             FROM audit_entry WHERE entity = ?1 AND entity_id = ?2 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![entity_label(entity), entity_id], audit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
