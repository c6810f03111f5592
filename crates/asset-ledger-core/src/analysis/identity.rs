use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::similarity::similarity_ignore_case;
use crate::model::{identifier_key, CanonicalAsset, DiscoveredRecord};

pub const SERIAL_WEIGHT: f64 = 60.0;
pub const NAME_WEIGHT: f64 = 20.0;
/// Name similarity must exceed this before it earns any credit, so generic
/// names like "laptop" do not add confidence on their own.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.8;
pub const MANUFACTURER_WEIGHT: f64 = 10.0;
pub const MODEL_WEIGHT: f64 = 10.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Low,
    Medium,
    High,
    Exact,
}

impl MatchTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 90.0 {
            MatchTier::Exact
        } else if confidence >= 70.0 {
            MatchTier::High
        } else if confidence >= 50.0 {
            MatchTier::Medium
        } else {
            MatchTier::Low
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchTier::Exact => "exact",
            MatchTier::High => "high",
            MatchTier::Medium => "medium",
            MatchTier::Low => "low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchedField {
    SerialNumber,
    Name,
    Manufacturer,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: MatchedField,
    pub existing: Option<String>,
    pub discovered: Option<String>,
}

/// Outcome of scoring one discovered record against one canonical asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMatch {
    pub source_id: String,
    pub external_id: String,
    pub asset_id: String,
    pub confidence: f64,
    pub tier: MatchTier,
    pub matched_fields: BTreeSet<MatchedField>,
    pub conflicts: Vec<FieldConflict>,
}

impl ReconciliationMatch {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Score `discovered` against `canonical` with additive field weights.
///
/// Manufacturer and model compare case-insensitively; two absent values count
/// as equal, and any difference (including absent vs present) is a conflict.
pub fn compare(discovered: &DiscoveredRecord, canonical: &CanonicalAsset) -> ReconciliationMatch {
    let mut confidence = 0.0;
    let mut matched_fields = BTreeSet::new();
    let mut conflicts = Vec::new();

    if let (Some(d), Some(c)) = (discovered.serial_key(), canonical.serial_key()) {
        if d == c {
            confidence += SERIAL_WEIGHT;
            matched_fields.insert(MatchedField::SerialNumber);
        }
    }

    let name_similarity = similarity_ignore_case(&discovered.name, &canonical.name);
    if name_similarity > NAME_SIMILARITY_THRESHOLD {
        confidence += NAME_WEIGHT * name_similarity;
        matched_fields.insert(MatchedField::Name);
    }

    let attributes = [
        (
            MatchedField::Manufacturer,
            MANUFACTURER_WEIGHT,
            discovered.manufacturer.as_deref(),
            canonical.manufacturer.as_deref(),
        ),
        (
            MatchedField::Model,
            MODEL_WEIGHT,
            discovered.model.as_deref(),
            canonical.model.as_deref(),
        ),
    ];
    for (field, weight, found, existing) in attributes {
        if identifier_key(found) == identifier_key(existing) {
            confidence += weight;
            matched_fields.insert(field);
        } else {
            conflicts.push(FieldConflict {
                field,
                existing: existing.map(str::to_string),
                discovered: found.map(str::to_string),
            });
        }
    }

    let confidence = f64::min(confidence, MAX_CONFIDENCE);
    ReconciliationMatch {
        source_id: discovered.source_id.clone(),
        external_id: discovered.external_id.clone(),
        asset_id: canonical.id.clone(),
        confidence,
        tier: MatchTier::from_confidence(confidence),
        matched_fields,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetStatus, DiscoverySource, Passthrough};
    use chrono::Utc;

    fn canonical(serial: Option<&str>, name: &str, make: Option<&str>, model: Option<&str>) -> CanonicalAsset {
        CanonicalAsset {
            id: "a-1".to_string(),
            serial_number: serial.map(str::to_string),
            asset_tag: None,
            name: name.to_string(),
            manufacturer: make.map(str::to_string),
            model: model.map(str::to_string),
            status: AssetStatus::InStock,
            is_archived: false,
            archived_at: None,
            archive_reason: None,
            assigned_to: None,
            assigned_date: None,
            assignment_history: Vec::new(),
            location_id: None,
            location_history: Vec::new(),
            last_seen_in_discovery: None,
            custom_fields: Default::default(),
            purchase: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn discovered(serial: Option<&str>, name: &str, make: Option<&str>, model: Option<&str>) -> DiscoveredRecord {
        DiscoveredRecord {
            source_id: "mdm".to_string(),
            source: DiscoverySource::Manual,
            external_id: "ext-1".to_string(),
            name: name.to_string(),
            serial_number: serial.map(str::to_string),
            manufacturer: make.map(str::to_string),
            model: model.map(str::to_string),
            last_seen: Utc::now(),
            metadata: Passthrough::new(),
        }
    }

    #[test]
    fn test_full_agreement_is_capped_exact() {
        let c = canonical(Some("SN1"), "MacBook Pro", Some("Apple"), Some("A2442"));
        let d = discovered(Some("sn1"), "macbook pro", Some("apple"), Some("A2442"));
        let m = compare(&d, &c);
        assert_eq!(m.confidence, 100.0);
        assert_eq!(m.tier, MatchTier::Exact);
        assert_eq!(m.matched_fields.len(), 4);
        assert!(!m.has_conflicts());
    }

    #[test]
    fn test_serial_with_missing_manufacturer() {
        let c = canonical(Some("sn123"), "Dell Latitude 5540", Some("Dell"), None);
        let d = discovered(Some("SN123"), "Latitude 5540", None, None);
        let m = compare(&d, &c);
        assert!(m.confidence >= 60.0);
        assert!(m.tier >= MatchTier::High);
        assert!(m.matched_fields.contains(&MatchedField::SerialNumber));
        assert_eq!(m.conflicts.len(), 1);
        assert_eq!(m.conflicts[0].field, MatchedField::Manufacturer);
        assert_eq!(m.conflicts[0].existing.as_deref(), Some("Dell"));
        assert_eq!(m.conflicts[0].discovered, None);
    }

    #[test]
    fn test_name_below_threshold_earns_nothing() {
        let c = canonical(None, "Conference Room Display", Some("LG"), Some("27UL"));
        let d = discovered(None, "Reception Laptop", Some("Lenovo"), Some("T14"));
        let m = compare(&d, &c);
        assert_eq!(m.confidence, 0.0);
        assert_eq!(m.tier, MatchTier::Low);
        assert_eq!(m.conflicts.len(), 2);
    }

    #[test]
    fn test_name_above_threshold_scales_credit() {
        let c = canonical(None, "ThinkPad T14 Gen 3", None, None);
        let d = discovered(None, "ThinkPad T14 Gen 4", None, None);
        let m = compare(&d, &c);
        // 17/18 similarity plus both attribute pairs absent
        let expected = 20.0 * (1.0 - 1.0 / 18.0) + 20.0;
        assert!((m.confidence - expected).abs() < 1e-9);
        assert!(m.matched_fields.contains(&MatchedField::Name));
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(MatchTier::from_confidence(90.0), MatchTier::Exact);
        assert_eq!(MatchTier::from_confidence(89.99), MatchTier::High);
        assert_eq!(MatchTier::from_confidence(70.0), MatchTier::High);
        assert_eq!(MatchTier::from_confidence(50.0), MatchTier::Medium);
        assert_eq!(MatchTier::from_confidence(49.9), MatchTier::Low);
    }
}
