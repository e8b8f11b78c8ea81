//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export library error type
pub use dns_failover_provider::ProviderError;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Domain not found
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// Forward not found
    #[error("Forward not found: {0}")]
    ForwardNotFound(String),

    /// Admin not found
    #[error("Admin not found: {0}")]
    AdminNotFound(String),

    /// `domain:port` already managed
    #[error("Domain already exists: {0}")]
    DuplicateDomain(String),

    /// Forward domain already present under the same domain
    #[error("Forward already exists: {0}")]
    DuplicateForward(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Import line rejected; the whole batch is discarded
    #[error("Import error on line {line}: {message}")]
    ImportError { line: usize, message: String },

    /// Nothing to export
    #[error("No forwards to export")]
    ExportEmpty,

    /// Caller lacks the required role
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A check cycle is already running
    #[error("A check is already in progress")]
    CycleInProgress,

    /// Domain lacks the provider ids needed to commit
    #[error("Configuration gap: {0}")]
    ConfigurationGap(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    NotificationError(String),

    /// Provider error (converting from library)
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.) is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::DomainNotFound(_)
            | Self::ForwardNotFound(_)
            | Self::AdminNotFound(_)
            | Self::DuplicateDomain(_)
            | Self::DuplicateForward(_)
            | Self::ValidationError(_)
            | Self::ImportError { .. }
            | Self::ExportEmpty
            | Self::PermissionDenied(_)
            | Self::CycleInProgress
            | Self::ConfigurationGap(_) => true,
            Self::Provider(e) => e.is_expected(),
            _ => false,
        }
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_keep_their_classification() {
        let e: CoreError = ProviderError::NetworkError {
            provider: "check-backend".to_string(),
            detail: "refused".to_string(),
        }
        .into();
        assert!(!e.is_expected());

        let e: CoreError = ProviderError::RecordNotFound {
            provider: "cloudflare".to_string(),
            record_id: "r".to_string(),
            raw_message: None,
        }
        .into();
        assert!(e.is_expected());
    }

    #[test]
    fn import_error_names_the_line() {
        let e = CoreError::ImportError {
            line: 3,
            message: "port must be a number".to_string(),
        };
        assert_eq!(e.to_string(), "Import error on line 3: port must be a number");
    }

    #[test]
    fn serializes_with_code_tag() {
        let json = serde_json::to_string(&CoreError::CycleInProgress).unwrap();
        assert_eq!(json, r#"{"code":"CycleInProgress"}"#);
        let json = serde_json::to_string(&CoreError::StorageError("locked".into())).unwrap();
        assert_eq!(json, r#"{"code":"StorageError","details":"locked"}"#);
    }
}
