//! Attribute definitions and the validated schema table.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{AttributeError, SchemaError};
use crate::types::AuthLevel;

/// Where an attribute's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeStorage {
    /// Owned by this system, read from the persisted user record.
    Local,
    /// Owned by the identity provider, fetched live on every read.
    Remote,
    /// Owned by the identity provider, mirrored into the user record
    /// after the first fetch.
    Cached,
}

/// An operation gated by a per-attribute authentication threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperation {
    /// Test for the presence of a value.
    Check,
    /// Read the value.
    Get,
    /// Write the value.
    Set,
}

/// Declarative description of one attribute.
///
/// # Example (TOML)
///
/// ```toml
/// [[attributes]]
/// name = "email"
/// storage = "cached"
/// writable = true
/// check_level = 0
/// get_level = 0
/// set_level = 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name.
    pub name: String,

    /// Storage location.
    pub storage: AttributeStorage,

    /// Whether the attribute accepts writes.
    #[serde(default)]
    pub writable: bool,

    /// Minimum level to test for the presence of a value.
    #[serde(default)]
    pub check_level: AuthLevel,

    /// Minimum level to read the value.
    #[serde(default)]
    pub get_level: AuthLevel,

    /// Minimum level to write the value. Ignored for attributes that are
    /// not writable.
    #[serde(default)]
    pub set_level: AuthLevel,
}

impl AttributeDefinition {
    /// The threshold for the given operation.
    #[must_use]
    pub fn threshold(&self, operation: AttributeOperation) -> AuthLevel {
        match operation {
            AttributeOperation::Check => self.check_level,
            AttributeOperation::Get => self.get_level,
            AttributeOperation::Set => self.set_level,
        }
    }
}

/// Shape of an attribute table file.
#[derive(Debug, Deserialize)]
struct AttributeTable {
    #[serde(default)]
    attributes: Vec<AttributeDefinition>,
}

/// The validated, immutable attribute table.
///
/// Loaded once at process start. Load-time validation enforces the
/// threshold ordering invariant for every attribute: `check <= get`
/// always, and `get <= set` when the attribute is writable.
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    attributes: HashMap<String, AttributeDefinition>,
}

impl AttributeSchema {
    /// Builds a schema from a list of definitions, validating thresholds.
    ///
    /// # Errors
    ///
    /// Returns an error on a duplicate name, on `check > get`, or on
    /// `get > set` for a writable attribute.
    pub fn load(definitions: Vec<AttributeDefinition>) -> Result<Self, SchemaError> {
        let mut attributes = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            if definition.check_level > definition.get_level {
                return Err(SchemaError::CheckAboveGet {
                    name: definition.name,
                    check: definition.check_level,
                    get: definition.get_level,
                });
            }
            if definition.writable && definition.get_level > definition.set_level {
                return Err(SchemaError::GetAboveSet {
                    name: definition.name,
                    get: definition.get_level,
                    set: definition.set_level,
                });
            }
            if attributes.contains_key(&definition.name) {
                return Err(SchemaError::Duplicate {
                    name: definition.name,
                });
            }
            attributes.insert(definition.name.clone(), definition);
        }
        Ok(Self { attributes })
    }

    /// Parses and validates a TOML attribute table.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or validation
    /// fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, SchemaError> {
        let table: AttributeTable =
            toml::from_str(raw).map_err(|e| SchemaError::load(e.to_string()))?;
        Self::load(table.attributes)
    }

    /// Reads, parses, and validates a TOML attribute table from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SchemaError::load(e.to_string()))?;
        Self::from_toml_str(&raw)
    }

    /// Returns the definition for `name`, if any.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    /// Returns `true` if `name` is in the table.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns `true` if `name` is defined and writable.
    #[must_use]
    pub fn is_writable(&self, name: &str) -> bool {
        self.definition(name).is_some_and(|d| d.writable)
    }

    /// Returns the storage location for `name`, if defined.
    #[must_use]
    pub fn storage(&self, name: &str) -> Option<AttributeStorage> {
        self.definition(name).map(|d| d.storage)
    }

    /// Returns `true` if a session at `level` may perform `operation` on
    /// `name`. Undefined names never have permission.
    #[must_use]
    pub fn has_permission_for(
        &self,
        name: &str,
        operation: AttributeOperation,
        level: AuthLevel,
    ) -> bool {
        self.definition(name)
            .is_some_and(|d| level >= d.threshold(operation))
    }

    /// Rejects any requested name that is not defined.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttributeNames` listing every undefined name.
    pub fn check_defined(&self, names: &[String]) -> Result<(), AttributeError> {
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !self.is_defined(name))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AttributeError::UnknownAttributeNames { names: unknown })
        }
    }

    /// Rejects any requested name that is not writable.
    ///
    /// # Errors
    ///
    /// Returns `UnwritableAttributes` listing every unwritable name.
    pub fn check_writable(&self, names: &[String]) -> Result<(), AttributeError> {
        let unwritable: Vec<String> = names
            .iter()
            .filter(|name| !self.is_writable(name))
            .cloned()
            .collect();
        if unwritable.is_empty() {
            Ok(())
        } else {
            Err(AttributeError::UnwritableAttributes { names: unwritable })
        }
    }

    /// Checks every requested name against its threshold for `operation`.
    ///
    /// `mfa` is the session's multi-factor flag. A session whose numeric
    /// level meets an MFA-tier threshold but whose token was issued
    /// without the multi-factor flag is internally inconsistent and is
    /// refused with `MfaRequired` rather than trusted.
    ///
    /// # Errors
    ///
    /// Returns `LevelTooLow` (with the minimum satisfying level) when any
    /// threshold exceeds `level`, or `MfaRequired` for the inconsistent
    /// MFA case. Undefined names must be rejected with
    /// [`check_defined`](Self::check_defined) first; here they are
    /// skipped.
    pub fn check_level(
        &self,
        names: &[String],
        operation: AttributeOperation,
        level: AuthLevel,
        mfa: bool,
    ) -> Result<(), AttributeError> {
        let mut too_low: Vec<String> = Vec::new();
        let mut needed = AuthLevel::SINGLE_FACTOR;
        let mut missing_mfa: Vec<String> = Vec::new();

        for name in names {
            let Some(definition) = self.definition(name) else {
                continue;
            };
            let threshold = definition.threshold(operation);
            if level < threshold {
                needed = needed.max(threshold);
                too_low.push(name.clone());
            } else if threshold.requires_mfa() && !mfa {
                missing_mfa.push(name.clone());
            }
        }

        if !too_low.is_empty() {
            return Err(AttributeError::LevelTooLow {
                needed,
                names: too_low,
            });
        }
        if !missing_mfa.is_empty() {
            return Err(AttributeError::MfaRequired { names: missing_mfa });
        }
        Ok(())
    }
}
