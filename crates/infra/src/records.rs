//! In-memory business record store for tests and dev.
//!
//! Rows carry their tenant and owner directly; [`RecordQuery`] is the
//! [`ScopableQuery`] implementation the scope resolver narrows.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dealflow_auth::{EntityKind, ScopableQuery, ScopedRecord};
use dealflow_core::{CompanyId, RecordId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub id: RecordId,
    pub entity: EntityKind,
    pub company_id: Option<CompanyId>,
    /// Value of the entity's owner column (`owner_id`, `uploaded_by`, `created_by`).
    pub owner_id: Option<UserId>,
    pub name: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl RecordRow {
    pub fn new(entity: EntityKind, company_id: CompanyId, owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            entity,
            company_id: Some(company_id),
            owner_id: Some(owner_id),
            name: name.into(),
            fields: serde_json::Value::Null,
        }
    }
}

impl ScopedRecord for RecordRow {
    fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordStoreError {
    #[error("record store lock poisoned")]
    Poisoned,
}

/// One scope condition. A query keeps all of them and a row must pass each.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Company(CompanyId),
    CompanyOrOwned { company: CompanyId, owner: UserId },
    Owners(Vec<UserId>),
}

impl Predicate {
    fn admits(&self, row: &RecordRow) -> bool {
        match self {
            Predicate::Company(company) => row.company_id == Some(*company),
            Predicate::CompanyOrOwned { company, owner } => match row.company_id {
                Some(c) => c == *company,
                None => row.owner_id == Some(*owner),
            },
            Predicate::Owners(owners) => row.owner_id.is_some_and(|o| owners.contains(&o)),
        }
    }
}

/// List query over one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    entity: EntityKind,
    predicates: Vec<Predicate>,
    nothing: bool,
    name_contains: Option<String>,
    /// Column names the scope filter touched, in order.
    applied: Vec<&'static str>,
}

impl RecordQuery {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            predicates: Vec::new(),
            nothing: false,
            name_contains: None,
            applied: Vec::new(),
        }
    }

    /// Case-insensitive name search.
    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into().to_lowercase());
        self
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn applied_columns(&self) -> &[&'static str] {
        &self.applied
    }

    fn matches(&self, row: &RecordRow) -> bool {
        if self.nothing || row.entity != self.entity {
            return false;
        }
        if !self.predicates.iter().all(|p| p.admits(row)) {
            return false;
        }
        self.name_contains
            .as_deref()
            .is_none_or(|needle| row.name.to_lowercase().contains(needle))
    }
}

impl ScopableQuery for RecordQuery {
    fn filter_company(mut self, column: &'static str, company_id: CompanyId) -> Self {
        self.predicates.push(Predicate::Company(company_id));
        self.applied.push(column);
        self
    }

    fn filter_company_or_owned(
        mut self,
        company_column: &'static str,
        company_id: CompanyId,
        owner_column: &'static str,
        owner: UserId,
    ) -> Self {
        self.predicates.push(Predicate::CompanyOrOwned {
            company: company_id,
            owner,
        });
        self.applied.push(company_column);
        self.applied.push(owner_column);
        self
    }

    fn filter_owners(mut self, column: &'static str, owners: &[UserId]) -> Self {
        self.predicates.push(Predicate::Owners(owners.to_vec()));
        self.applied.push(column);
        self
    }

    fn match_nothing(mut self) -> Self {
        self.nothing = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<BTreeMap<RecordId, RecordRow>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: RecordRow) -> Result<RecordId, RecordStoreError> {
        let id = row.id;
        let mut rows = self.rows.write().map_err(|_| RecordStoreError::Poisoned)?;
        rows.insert(id, row);
        Ok(id)
    }

    /// Fetch by id. No scoping here: callers check the row afterwards.
    pub fn get(&self, entity: EntityKind, id: RecordId) -> Option<RecordRow> {
        self.rows.read().ok()?.get(&id).filter(|r| r.entity == entity).cloned()
    }

    pub fn remove(&self, entity: EntityKind, id: RecordId) -> Option<RecordRow> {
        let mut rows = self.rows.write().ok()?;
        if rows.get(&id).is_some_and(|r| r.entity == entity) {
            rows.remove(&id)
        } else {
            None
        }
    }

    /// Rows matching `query`, in id order.
    pub fn fetch(&self, query: &RecordQuery) -> Vec<RecordRow> {
        match self.rows.read() {
            Ok(rows) => rows.values().filter(|r| query.matches(r)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}
