//! Error types for inventory access, refresh passes and lookups.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detail attached to reports whose error carries none of its own.
pub const DEFAULT_ERROR_DETAIL: &str = "Compute Engine inventory returned an error";

/// Failures raised by an [`InventorySource`](crate::inventory::InventorySource).
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Credential or authorization failure before any inventory call.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A page fetch or detail fetch failed.
    #[error("inventory fetch failed: {0}")]
    Fetch(String),

    #[error("instance {instance_id} not found in zone {zone}")]
    NotFound { instance_id: String, zone: String },

    #[error("inventory I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed inventory data: {0}")]
    Parse(#[from] serde_json::Error),
}

impl InventoryError {
    /// Human readable detail for structured reports.
    pub fn detail(&self) -> &'static str {
        match self {
            InventoryError::Authentication(_) => {
                "Compute Engine credentials were rejected; check the service account key"
            }
            InventoryError::NotFound { .. } => {
                "The cached instance no longer exists; it will drop out on the next refresh"
            }
            _ => DEFAULT_ERROR_DETAIL,
        }
    }
}

/// A refresh pass aborted.  The live indexes are left untouched.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("instance enumeration failed on page {page}: {source}")]
    Inventory {
        page: usize,
        #[source]
        source: InventoryError,
    },
}

impl RefreshError {
    pub fn report(&self) -> ErrorReport {
        let detail = match self {
            RefreshError::Inventory { source, .. } => source.detail(),
        };
        ErrorReport::new("RefreshError", self).with_detail(detail)
    }
}

/// The live fetch for a cached entity failed.
#[derive(Debug, Error)]
#[error("lookup of `{entity}` failed: {source}")]
pub struct LookupError {
    pub entity: String,
    #[source]
    pub source: InventoryError,
}

impl LookupError {
    pub fn report(&self) -> ErrorReport {
        ErrorReport::new("LookupError", self).with_detail(self.source.detail())
    }
}

/// A field-level configuration problem.  Returned in lists, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Loggable snapshot of an error and its cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub name: String,
    pub message: String,
    /// Messages of every `source()` below the top-level error, outermost first.
    pub stack: Vec<String>,
    pub detail: String,
}

impl ErrorReport {
    pub fn new(name: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        let mut stack = Vec::new();
        let mut cause = err.source();
        while let Some(inner) = cause {
            stack.push(inner.to_string());
            cause = inner.source();
        }
        Self {
            name: name.into(),
            message: err.to_string(),
            stack,
            detail: DEFAULT_ERROR_DETAIL.to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{}: {}", self.name, self.message),
        }
    }
}
