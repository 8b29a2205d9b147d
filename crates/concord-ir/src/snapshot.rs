//! IR snapshot: canonical entities, fields, and explicit alias tables.
//!
//! The snapshot is the single authority for name resolution. Aliases are
//! explicit mappings supplied by the IR configuration; nothing here infers
//! aliases beyond what the snapshot declares.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::digest::snapshot_digest_v1;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("failed to read IR snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse IR snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate entity `{name}` in IR snapshot")]
    DuplicateEntity { name: String },

    #[error("duplicate field `{field}` on entity `{entity}`")]
    DuplicateField { entity: String, field: String },

    #[error("alias `{alias}` collides with canonical name `{canonical}`")]
    AliasCollision { alias: String, canonical: String },
}

// ============================================================================
// Snapshot model
// ============================================================================

/// A field as declared in the IR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrField {
    pub name: String,
    /// Explicit alias table (never inferred).
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Declared type label, e.g. `integer`, `decimal`, `string`, `date`.
    #[serde(default)]
    pub field_type: Option<String>,
}

impl IrField {
    /// Whether the declared type is an integer domain. Category-tier bound
    /// equivalence (`>N` ≡ `≥N+1`) is only sound on integer fields.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.field_type.as_deref(),
            Some("integer") | Some("int") | Some("bigint") | Some("smallint")
        )
    }
}

/// An entity as declared in the IR, owning its fields and alias table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrEntity {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub fields: Vec<IrField>,
}

impl IrEntity {
    /// Exact, case-sensitive field lookup.
    pub fn field(&self, name: &str) -> Option<&IrField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Alias-table field lookup (explicit mappings only).
    pub fn field_by_alias(&self, alias: &str) -> Option<&IrField> {
        self.fields
            .iter()
            .find(|f| f.aliases.iter().any(|a| a == alias))
    }
}

/// The authoritative, read-only IR snapshot for one validation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrSnapshot {
    #[serde(default = "default_version")]
    pub version: String,
    pub entities: Vec<IrEntity>,
    /// Digest of the snapshot text as loaded; not part of the JSON surface.
    #[serde(skip)]
    digest: String,
}

fn default_version() -> String {
    "1".to_string()
}

impl IrSnapshot {
    /// Parse a snapshot from JSON text, validate it, and record its digest.
    pub fn from_json_str(text: &str) -> Result<Self, IrError> {
        let mut snapshot: IrSnapshot = serde_json::from_str(text)?;
        snapshot.digest = snapshot_digest_v1(text);
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Load a snapshot from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, IrError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Build a snapshot directly from entities (tests, embedding callers).
    /// The digest is computed over the canonical JSON serialization.
    pub fn from_entities(entities: Vec<IrEntity>) -> Result<Self, IrError> {
        let mut snapshot = IrSnapshot {
            version: default_version(),
            entities,
            digest: String::new(),
        };
        let text = serde_json::to_string(&snapshot)?;
        snapshot.digest = snapshot_digest_v1(&text);
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), IrError> {
        let mut seen: HashMap<&str, ()> = HashMap::new();
        for entity in &self.entities {
            if seen.insert(entity.name.as_str(), ()).is_some() {
                return Err(IrError::DuplicateEntity {
                    name: entity.name.clone(),
                });
            }
            for alias in &entity.aliases {
                if alias == &entity.name {
                    return Err(IrError::AliasCollision {
                        alias: alias.clone(),
                        canonical: entity.name.clone(),
                    });
                }
            }

            let mut seen_fields: HashMap<&str, ()> = HashMap::new();
            for field in &entity.fields {
                if seen_fields.insert(field.name.as_str(), ()).is_some() {
                    return Err(IrError::DuplicateField {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Digest of the snapshot as loaded (`"fnv1a64:<hex>"`).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Exact, case-sensitive entity lookup.
    pub fn entity(&self, name: &str) -> Option<&IrEntity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Alias-table entity lookup (explicit mappings only).
    pub fn entity_by_alias(&self, alias: &str) -> Option<&IrEntity> {
        self.entities
            .iter()
            .find(|e| e.aliases.iter().any(|a| a == alias))
    }

    pub fn entities(&self) -> &[IrEntity] {
        &self.entities
    }
}
