use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::identifier_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AssetStatus {
    #[default]
    InStock,
    Active,
    Repair,
    Retired,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetStatus::InStock => "InStock",
            AssetStatus::Active => "Active",
            AssetStatus::Repair => "Repair",
            AssetStatus::Retired => "Retired",
        };
        f.write_str(label)
    }
}

/// One assignment of an asset to a user. Open until `returned_date` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub user_id: String,
    pub assigned_by: String,
    pub assigned_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub returned_date: Option<DateTime<Utc>>,
    pub returned_by: Option<String>,
    pub return_notes: Option<String>,
}

impl AssignmentRecord {
    pub fn is_open(&self) -> bool {
        self.returned_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMove {
    pub from: Option<String>,
    pub to: String,
    pub moved_by: String,
    pub moved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldType {
    Text,
    Number,
    Boolean,
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub value: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DepreciationMethod {
    #[default]
    StraightLine,
    DoubleDeclining,
}

/// Purchase facts that feed depreciation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInfo {
    pub purchase_date: DateTime<Utc>,
    pub purchase_price: f64,
    pub salvage_value: f64,
    pub useful_life_years: u32,
    pub method: DepreciationMethod,
}

/// System-of-record hardware asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAsset {
    pub id: String,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub status: AssetStatus,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archive_reason: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub assignment_history: Vec<AssignmentRecord>,
    pub location_id: Option<String>,
    pub location_history: Vec<LocationMove>,
    pub last_seen_in_discovery: Option<DateTime<Utc>>,
    pub custom_fields: BTreeMap<String, CustomField>,
    pub purchase: Option<PurchaseInfo>,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every successful update.
    pub version: u64,
}

impl CanonicalAsset {
    pub fn serial_key(&self) -> Option<String> {
        identifier_key(self.serial_number.as_deref())
    }

    pub fn asset_tag_key(&self) -> Option<String> {
        identifier_key(self.asset_tag.as_deref())
    }

    pub fn open_assignment(&self) -> Option<&AssignmentRecord> {
        self.assignment_history.iter().rev().find(|a| a.is_open())
    }
}

/// Intake payload for a new asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAsset {
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub location_id: Option<String>,
    pub purchase: Option<PurchaseInfo>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, CustomField>,
}

impl NewAsset {
    pub fn serial_key(&self) -> Option<String> {
        identifier_key(self.serial_number.as_deref())
    }
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub id: String,
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub status: Option<AssetStatus>,
    pub purchase: Option<PurchaseInfo>,
}

impl AssetUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}
