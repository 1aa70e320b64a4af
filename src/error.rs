//! Error types for the CDC core
//!
//! Every fatal error carries enough context (table identity, raw value,
//! expected vs actual column sets) to diagnose without re-running the
//! pipeline. None of these errors are retried internally: they are either a
//! transient external dependency failure (metadata fetch, left to the
//! caller's retry policy) or a logical schema mismatch that retrying cannot
//! fix.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error returned by external collaborators (metadata providers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error categories for metrics and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Metadata provider failures
    Metadata,
    /// Schema mismatch errors (drift that a refresh could not resolve)
    Schema,
    /// Value conversion errors (bad wrapper syntax, unparseable literals)
    Conversion,
    /// Configuration errors (invalid settings)
    Configuration,
    /// Other/unknown errors
    Other,
}

/// CDC core errors
#[derive(Error, Debug)]
pub enum CdcError {
    /// Metadata provider call failed while refreshing a table's schema
    #[error("metadata fetch failed for table {table}: {source}")]
    MetadataFetch {
        /// Table identity (`schema.table`)
        table: String,
        #[source]
        source: BoxError,
    },

    /// An incoming column name could not be located in the cached schema,
    /// even after a refresh
    #[error(
        "fields in table {table} are inconsistent with cached metadata: \
         event columns {}, metadata columns {}",
        json_list(.event_columns),
        json_list(.meta_columns)
    )]
    FieldInconsistency {
        /// Table identity (`schema.table`)
        table: String,
        /// Column names carried by the offending event
        event_columns: Vec<String>,
        /// Column names reported by the cached metadata
        meta_columns: Vec<String>,
    },

    /// A declared column type has no converter
    #[error("unsupported column type: {column_type}")]
    UnsupportedType {
        /// The declared type as reported by the metadata provider
        column_type: String,
    },

    /// A raw value could not be converted to its typed representation
    #[error("failed to convert value [{value}]: {message}")]
    ValueConversion {
        /// The offending raw value
        value: String,
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// JSON-encode a column name list for error diagnostics.
fn json_list(columns: &[String]) -> String {
    serde_json::to_string(columns).unwrap_or_else(|_| format!("{columns:?}"))
}

impl CdcError {
    /// Create a metadata fetch error for a table.
    pub fn metadata_fetch(table: impl Into<String>, source: BoxError) -> Self {
        Self::MetadataFetch {
            table: table.into(),
            source,
        }
    }

    /// Create a field inconsistency error.
    pub fn field_inconsistency(
        table: impl Into<String>,
        event_columns: Vec<String>,
        meta_columns: Vec<String>,
    ) -> Self {
        Self::FieldInconsistency {
            table: table.into(),
            event_columns,
            meta_columns,
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(column_type: impl Into<String>) -> Self {
        Self::UnsupportedType {
            column_type: column_type.into(),
        }
    }

    /// Create a value conversion error.
    pub fn value_conversion(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValueConversion {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Check if this error is fatal for the affected table.
    ///
    /// All surfaced errors are fatal: schema drift is resolved internally by
    /// a cache refresh and never reaches the caller as an error.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Get the error category for metrics and alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MetadataFetch { .. } => ErrorCategory::Metadata,
            Self::FieldInconsistency { .. } => ErrorCategory::Schema,
            Self::UnsupportedType { .. } => ErrorCategory::Schema,
            Self::ValueConversion { .. } => ErrorCategory::Conversion,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::InvalidState(_) => ErrorCategory::Other,
        }
    }

    /// Get a metric-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MetadataFetch { .. } => "metadata_fetch",
            Self::FieldInconsistency { .. } => "field_inconsistency",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::ValueConversion { .. } => "value_conversion",
            Self::Config(_) => "config_error",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}

/// Result type for CDC core operations
pub type Result<T> = std::result::Result<T, CdcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CdcError::value_conversion("HEXTORAW('zz')", "invalid hex payload");
        assert!(err.to_string().contains("HEXTORAW('zz')"));
        assert!(err.to_string().contains("invalid hex payload"));
    }

    #[test]
    fn test_field_inconsistency_reports_both_sides() {
        let err = CdcError::field_inconsistency(
            "S.T",
            vec!["ID".to_string(), "EXTRA".to_string()],
            vec!["ID".to_string(), "NAME".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("S.T"));
        assert!(msg.contains(r#"["ID","EXTRA"]"#));
        assert!(msg.contains(r#"["ID","NAME"]"#));
    }

    #[test]
    fn test_metadata_fetch_wraps_source() {
        let source: BoxError = "connection reset".into();
        let err = CdcError::metadata_fetch("S.T", source);
        assert!(err.to_string().contains("metadata fetch failed"));
        assert!(err.to_string().contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            CdcError::metadata_fetch("t", "x".into()).category(),
            ErrorCategory::Metadata
        );
        assert_eq!(
            CdcError::unsupported_type("BFILE").category(),
            ErrorCategory::Schema
        );
        assert_eq!(
            CdcError::value_conversion("v", "m").category(),
            ErrorCategory::Conversion
        );
        assert_eq!(
            CdcError::config("bad").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_error_code() {
        assert_eq!(
            CdcError::unsupported_type("BFILE").error_code(),
            "unsupported_type"
        );
        assert_eq!(CdcError::config("x").error_code(), "config_error");
    }

    #[test]
    fn test_all_errors_fatal() {
        assert!(CdcError::unsupported_type("BFILE").is_fatal());
        assert!(CdcError::invalid_state("x").is_fatal());
    }
}
