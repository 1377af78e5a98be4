use serde::{Deserialize, Serialize};

use dealflow_auth::EntityKind;
use dealflow_core::RecordId;

/// What happened to a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Created,
    Updated,
    Deleted,
}

impl EntityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityAction::Created => "created",
            EntityAction::Updated => "updated",
            EntityAction::Deleted => "deleted",
        }
    }
}

impl core::fmt::Display for EntityAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan-out rule family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutRule {
    /// Role-aware, company-wide (deal creation).
    Broad,
    /// Company admins and super-admins, minus the actor.
    Narrow,
    /// Company admins, sales managers and super-admins, minus the actor.
    ManagerInclusiveDeletion,
}

/// A successful mutation that may need to be announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub entity: EntityKind,
    pub action: EntityAction,
    #[serde(default)]
    pub record_id: Option<RecordId>,
    /// Display name of the record (deal title, contact name, ...).
    #[serde(default)]
    pub label: Option<String>,
}

impl EntityEvent {
    pub fn new(entity: EntityKind, action: EntityAction) -> Self {
        Self {
            entity,
            action,
            record_id: None,
            label: None,
        }
    }

    pub fn created(entity: EntityKind) -> Self {
        Self::new(entity, EntityAction::Created)
    }

    pub fn deleted(entity: EntityKind) -> Self {
        Self::new(entity, EntityAction::Deleted)
    }

    pub fn with_record(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Rule per entity category.
    ///
    /// Only deal creation uses the broad rule; the deletions of the four
    /// sales-facing entities include managers. Everything else is narrow.
    pub fn fanout_rule(&self) -> FanoutRule {
        use EntityKind::*;

        match (self.entity, self.action) {
            (Deal, EntityAction::Created) => FanoutRule::Broad,
            (Contact | Quote | File | Activity, EntityAction::Deleted) => FanoutRule::ManagerInclusiveDeletion,
            _ => FanoutRule::Narrow,
        }
    }
}
