//! # Sync Error Types
//!
//! Error types for store access, cycle execution and startup.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Startup        │  │   Cycle         │  │     Per Record          │ │
//! │  │  (fatal)        │  │  (recoverable)  │  │  (skip + log)           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  AccessDenied   │  │  FetchFailed    │  │  PerRecord              │ │
//! │  │  InitialSync... │  │  EmitFailed     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Protocol      │  │     Internal            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Serialization  │  │  SubscribeFailed        │ │
//! │  │  ConfigLoad/Save│  │  Deserialization│  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//! Everything below the cycle level is absorbed and logged by the
//! coordinator. Only `AccessDenied` and `InitialSyncFailed` reach the binary,
//! which maps them to exit code 1.

use thiserror::Error;

use crate::store::AccessStatus;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Startup Errors
    // =========================================================================
    /// The store refused access to its records.
    #[error("Access to the record store was not granted (status: {0})")]
    AccessDenied(AccessStatus),

    /// The first full fetch (or its emit) failed; nothing was published yet.
    #[error("Initial synchronization failed: {0}")]
    InitialSyncFailed(String),

    // =========================================================================
    // Cycle Errors
    // =========================================================================
    /// Enumerating the store failed.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Writing a frame to the output sink failed.
    #[error("Emit failed: {0}")]
    EmitFailed(String),

    /// A single native record could not be formatted.
    #[error("Record {identifier} skipped: {reason}")]
    PerRecord { identifier: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Failed to serialize a frame.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to decode a frame.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Registering for change notifications failed.
    #[error("Change subscription failed: {0}")]
    SubscribeFailed(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Internal(format!("I/O error: {}", err))
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<notify::Error> for SyncError {
    fn from(err: notify::Error) -> Self {
        SyncError::SubscribeFailed(err.to_string())
    }
}

impl From<contact_core::CoreError> for SyncError {
    fn from(err: contact_core::CoreError) -> Self {
        match err {
            contact_core::CoreError::InvalidRecord { identifier, reason } => {
                SyncError::PerRecord { identifier, reason }
            }
            other => SyncError::PerRecord {
                identifier: "unknown".into(),
                reason: other.to_string(),
            },
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a cycle hitting this error should enter recovery
    /// instead of giving up.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::FetchFailed(_)
                | SyncError::EmitFailed(_)
                | SyncError::SerializationFailed(_)
                | SyncError::PerRecord { .. }
        )
    }

    /// Returns true if this error must terminate the process when raised
    /// during startup.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            SyncError::AccessDenied(_) | SyncError::InitialSyncFailed(_)
        ) || self.is_config_error()
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
