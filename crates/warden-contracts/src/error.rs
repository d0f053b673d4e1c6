//! Internal error types for the Warden runtime.
//!
//! These are host-side failures — configuration problems and shared-state
//! access faults. They are distinct from the protocol errors in
//! [`crate::rpc`], which are response values; an internal error that must
//! reach a caller is converted via `From<WardenError> for RpcError`.

use thiserror::Error;

/// The unified internal error type.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The shared permissions state could not be read or written.
    #[error("permissions state access failed: {reason}")]
    StateAccess { reason: String },

    /// A grant referenced a method that is not a restricted method.
    #[error("unknown restricted method: '{method}'")]
    UnknownMethod { method: String },
}

/// Convenience alias used throughout the Warden crates.
pub type WardenResult<T> = Result<T, WardenError>;
