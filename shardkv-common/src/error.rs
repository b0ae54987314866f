//! # Error Kinds
//!
//! Purpose: Define the error taxonomy shared by every component of the
//! control plane, so callers can match on *kind* instead of parsing strings.
//!
//! ## Design Principles
//!
//! 1. **Fixed Taxonomy**: Exactly the six kinds the control plane is allowed
//!    to surface (invalid_argument, not_found, conflict, unsupported,
//!    transient, downstream) — new failure modes must be mapped onto one of
//!    these, not bolted on as a seventh variant.
//! 2. **Offending Value Attached**: Every variant carries the field/value
//!    that caused it, so the caller never has to re-derive "what was wrong"
//!    from a bare string.
//! 3. **No Silent Recovery**: Validation and catalog errors never mutate
//!    state; this type only reports, it never decides whether to retry.

use std::fmt;

/// Shared error type for the table/shard control plane and range fanout.
///
/// Each variant corresponds to one of the error kinds from the component
/// design: validation failures, missing catalog/ring entries, naming
/// conflicts, features intentionally not implemented, transient storage/RPC
/// failures, and errors surfaced verbatim from the backend or wrapper.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ShardKvError {
    /// A validation or codec failure: the caller supplied something
    /// malformed. `reason` is the short machine-readable signal
    /// (`not_printable`, `duplicate_key`, `key_too_long`, `invalid_option`,
    /// `column_mismatch`, `key_mismatch`, ...).
    #[error("invalid argument: {reason} (field={field:?}, value={value:?})")]
    InvalidArgument {
        reason: String,
        field: String,
        value: String,
    },

    /// A lookup failed: no such table, shard, or ring entry.
    #[error("not found: {reason} ({what})")]
    NotFound { reason: String, what: String },

    /// The requested resource already exists under a globally-unique name.
    #[error("conflict: {reason} ({what})")]
    Conflict { reason: String, what: String },

    /// A feature is recognized but intentionally unimplemented at this
    /// layer (`not_supported_yet`, `type_not_supported`).
    #[error("unsupported: {reason} ({what})")]
    Unsupported { reason: String, what: String },

    /// A catalog transaction aborted, or a topology call timed out; the
    /// caller may retry.
    #[error("transient failure: {reason}")]
    Transient { reason: String },

    /// An error surfaced verbatim from the ordered backend or the bucket
    /// wrapper, neither of which this layer can recover from.
    #[error("downstream failure in {source_component}: {reason}")]
    Downstream {
        source_component: String,
        reason: String,
    },
}

impl ShardKvError {
    pub fn invalid_argument(
        reason: impl Into<String>,
        field: impl Into<String>,
        value: impl fmt::Debug,
    ) -> Self {
        ShardKvError::InvalidArgument {
            reason: reason.into(),
            field: field.into(),
            value: format!("{value:?}"),
        }
    }

    pub fn not_found(reason: impl Into<String>, what: impl Into<String>) -> Self {
        ShardKvError::NotFound {
            reason: reason.into(),
            what: what.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>, what: impl Into<String>) -> Self {
        ShardKvError::Conflict {
            reason: reason.into(),
            what: what.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>, what: impl Into<String>) -> Self {
        ShardKvError::Unsupported {
            reason: reason.into(),
            what: what.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        ShardKvError::Transient {
            reason: reason.into(),
        }
    }

    pub fn downstream(source_component: impl Into<String>, reason: impl Into<String>) -> Self {
        ShardKvError::Downstream {
            source_component: source_component.into(),
            reason: reason.into(),
        }
    }

    /// The short machine-readable reason string, regardless of variant.
    ///
    /// Validation call sites (§4.1) surface exactly this string as the
    /// error signal (`too_long_name`, `table_exists`, ...).
    pub fn reason(&self) -> &str {
        match self {
            ShardKvError::InvalidArgument { reason, .. }
            | ShardKvError::NotFound { reason, .. }
            | ShardKvError::Conflict { reason, .. }
            | ShardKvError::Unsupported { reason, .. }
            | ShardKvError::Transient { reason }
            | ShardKvError::Downstream { reason, .. } => reason,
        }
    }
}

pub type ShardKvResult<T> = Result<T, ShardKvError>;
