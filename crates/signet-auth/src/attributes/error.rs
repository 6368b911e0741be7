//! Attribute permission and schema validation errors.

use crate::types::AuthLevel;

/// Errors raised by permission checks over requested attribute names.
///
/// Each variant carries the offending attribute list so the boundary can
/// report actionable detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    /// One or more requested names are not in the attribute table.
    #[error("Unknown attribute names: {}", names.join(", "))]
    UnknownAttributeNames {
        /// The undefined names.
        names: Vec<String>,
    },

    /// One or more requested names are not writable.
    #[error("Attributes are not writable: {}", names.join(", "))]
    UnwritableAttributes {
        /// The unwritable names.
        names: Vec<String>,
    },

    /// The session's authentication level is below the threshold for the
    /// requested operation.
    #[error("Authentication level {needed} required for: {}", names.join(", "))]
    LevelTooLow {
        /// The minimum level that would satisfy every requested name.
        needed: AuthLevel,
        /// The names whose thresholds are not met.
        names: Vec<String>,
    },

    /// The session's level nominally satisfies an MFA-tier threshold but
    /// the session was issued without multi-factor authentication.
    #[error("Multi-factor authentication required for: {}", names.join(", "))]
    MfaRequired {
        /// The names that demand an MFA-backed session.
        names: Vec<String>,
    },
}

/// Errors raised when loading the attribute table.
///
/// Validation fails fast: a table containing any entry that violates the
/// threshold ordering invariant is rejected at load time.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// An attribute's check threshold exceeds its get threshold.
    #[error("Attribute {name}: check level {check} exceeds get level {get}")]
    CheckAboveGet {
        /// The offending attribute.
        name: String,
        /// Its check threshold.
        check: AuthLevel,
        /// Its get threshold.
        get: AuthLevel,
    },

    /// A writable attribute's get threshold exceeds its set threshold.
    #[error("Writable attribute {name}: get level {get} exceeds set level {set}")]
    GetAboveSet {
        /// The offending attribute.
        name: String,
        /// Its get threshold.
        get: AuthLevel,
        /// Its set threshold.
        set: AuthLevel,
    },

    /// The same attribute name appears more than once.
    #[error("Duplicate attribute definition: {name}")]
    Duplicate {
        /// The duplicated name.
        name: String,
    },

    /// The attribute table could not be read or parsed.
    #[error("Failed to load attribute table: {message}")]
    Load {
        /// Description of the failure.
        message: String,
    },
}

impl SchemaError {
    /// Creates a `Load` error.
    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }
}
