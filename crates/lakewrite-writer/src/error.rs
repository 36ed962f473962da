//! Error types for the session, writer and catalog layers

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Catalog unreachable or connection failed
    E001CatalogUnreachable,
    /// E002: Table already registered
    E002TableExists,
    /// E003: Schema incompatible with existing table
    E003SchemaIncompatible,
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Write operation failed
    E005WriteFailure,
    /// E006: Output format not supported
    E006UnsupportedFormat,
    /// E007: Table operation failed
    E007TableOperation,
    /// E008: Session already stopped
    E008SessionClosed,
    /// E009: Rows do not fit the declared schema
    E009InvalidData,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001CatalogUnreachable => "E001",
            Self::E002TableExists => "E002",
            Self::E003SchemaIncompatible => "E003",
            Self::E004InvalidConfig => "E004",
            Self::E005WriteFailure => "E005",
            Self::E006UnsupportedFormat => "E006",
            Self::E007TableOperation => "E007",
            Self::E008SessionClosed => "E008",
            Self::E009InvalidData => "E009",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while acquiring a session or writing a table
#[derive(Debug, Error)]
pub enum WriterError {
    /// Catalog initialization failed
    #[error("[{code}] Catalog initialization failed for '{catalog_type}' at '{endpoint}': {reason}\n\nTroubleshooting:\n  • Verify the metastore is reachable: curl {endpoint}/v1/config\n  • Check the bearer token is valid\n  • Ensure the catalog service is running")]
    CatalogInit {
        code: ErrorCode,
        catalog_type: String,
        endpoint: String,
        reason: String,
    },

    /// Table is already registered and the save mode forbids replacing it
    #[error("[{code}] Table '{table}' already exists")]
    TableExists { code: ErrorCode, table: String },

    /// Incoming data does not match the registered table
    #[error("[{code}] Schema incompatible with table '{table}': {reason}")]
    SchemaIncompatible {
        code: ErrorCode,
        table: String,
        reason: String,
    },

    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: ErrorCode, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed: {message}")]
    WriteFailure { code: ErrorCode, message: String },

    /// Format other than parquet requested
    #[error("[{code}] Unsupported format '{format}'. Supported: parquet")]
    UnsupportedFormat { code: ErrorCode, format: String },

    /// Table operation failed
    #[error("[{code}] Table operation failed for '{table}': {reason}")]
    TableOperation {
        code: ErrorCode,
        table: String,
        reason: String,
    },

    /// Session was stopped before the operation ran
    #[error("[{code}] Session '{app_name}' has been stopped")]
    SessionClosed { code: ErrorCode, app_name: String },

    /// Rows do not fit the declared schema
    #[error("[{code}] Invalid data: {message}")]
    InvalidData { code: ErrorCode, message: String },
}

impl WriterError {
    pub fn catalog_init(catalog_type: String, endpoint: String, reason: String) -> Self {
        Self::CatalogInit {
            code: ErrorCode::E001CatalogUnreachable,
            catalog_type,
            endpoint,
            reason,
        }
    }

    pub fn table_exists(table: String) -> Self {
        Self::TableExists {
            code: ErrorCode::E002TableExists,
            table,
        }
    }

    pub fn schema_incompatible(table: String, reason: String) -> Self {
        Self::SchemaIncompatible {
            code: ErrorCode::E003SchemaIncompatible,
            table,
            reason,
        }
    }

    pub fn invalid_config(message: String) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig,
            message,
        }
    }

    pub fn write_failure(message: String) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E005WriteFailure,
            message,
        }
    }

    pub fn unsupported_format(format: String) -> Self {
        Self::UnsupportedFormat {
            code: ErrorCode::E006UnsupportedFormat,
            format,
        }
    }

    pub fn table_operation(table: String, reason: String) -> Self {
        Self::TableOperation {
            code: ErrorCode::E007TableOperation,
            table,
            reason,
        }
    }

    pub fn session_closed(app_name: String) -> Self {
        Self::SessionClosed {
            code: ErrorCode::E008SessionClosed,
            app_name,
        }
    }

    pub fn invalid_data(message: String) -> Self {
        Self::InvalidData {
            code: ErrorCode::E009InvalidData,
            message,
        }
    }

    /// Error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CatalogInit { code, .. }
            | Self::TableExists { code, .. }
            | Self::SchemaIncompatible { code, .. }
            | Self::InvalidConfig { code, .. }
            | Self::WriteFailure { code, .. }
            | Self::UnsupportedFormat { code, .. }
            | Self::TableOperation { code, .. }
            | Self::SessionClosed { code, .. }
            | Self::InvalidData { code, .. } => *code,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;

/// Redact a secret for log and error output, keeping only a short prefix.
pub fn redact_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = WriterError::table_exists("hive.default.t".to_string());
        assert_eq!(err.code(), ErrorCode::E002TableExists);
        assert!(err.to_string().starts_with("[E002]"));

        let err = WriterError::catalog_init(
            "REST".to_string(),
            "http://metastore:8181".to_string(),
            "connection refused".to_string(),
        );
        assert_eq!(err.code().as_str(), "E001");
        assert!(err.to_string().contains("http://metastore:8181/v1/config"));
    }

    #[test]
    fn test_redact_secret() {
        assert_eq!(redact_secret("short"), "****");
        assert_eq!(redact_secret("minio-secret-key"), "mini****");
        assert_eq!(redact_secret(""), "****");
    }
}
