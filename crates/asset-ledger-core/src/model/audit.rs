use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Archive,
    Restore,
    Assign,
    Return,
    Transfer,
    Allocate,
    Deallocate,
    Resize,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Archive => "archive",
            AuditAction::Restore => "restore",
            AuditAction::Assign => "assign",
            AuditAction::Return => "return",
            AuditAction::Transfer => "transfer",
            AuditAction::Allocate => "allocate",
            AuditAction::Deallocate => "deallocate",
            AuditAction::Resize => "resize",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "create" => AuditAction::Create,
            "update" => AuditAction::Update,
            "archive" => AuditAction::Archive,
            "restore" => AuditAction::Restore,
            "assign" => AuditAction::Assign,
            "return" => AuditAction::Return,
            "transfer" => AuditAction::Transfer,
            "allocate" => AuditAction::Allocate,
            "deallocate" => AuditAction::Deallocate,
            "resize" => AuditAction::Resize,
            _ => return None,
        })
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a lifecycle or seat mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrailEntry {
    pub entity: EntityKind,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub reason: Option<String>,
    /// User, location or other secondary reference the action concerned.
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditTrailEntry {
    pub fn new(
        entity: EntityKind,
        entity_id: &str,
        action: AuditAction,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            entity_id: entity_id.to_string(),
            action,
            actor: actor.to_string(),
            reason: None,
            subject: None,
            timestamp,
        }
    }

    pub fn with_reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason.map(str::to_string);
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }
}
