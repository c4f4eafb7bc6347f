//! Unified error types for the mountgate workspace.
//!
//! Only initialisation can fail. Everything on the hooked call path is a
//! silent skip, so no variant here is ever produced by the entry or return
//! handlers.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MountGateError {
    /// The target function's address could not be resolved.
    #[error("could not find symbol '{symbol}'")]
    SymbolNotFound {
        /// Name that was looked up.
        symbol: String,
    },

    /// The host refused to attach the entry/return pair.
    #[error("return probe registration on '{symbol}' failed with status {status}")]
    RegistrationFailed {
        /// Symbol the probe was being attached to.
        symbol: String,
        /// Negative status code reported by the host.
        status: i32,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl MountGateError {
    /// Negative status code the owning module reports from its startup
    /// sequence for this failure.
    pub fn status(&self) -> i32 {
        match self {
            Self::SymbolNotFound { .. } => -libc::ENOENT,
            Self::RegistrationFailed { status, .. } => *status,
            Self::Io { source, .. } => -source.raw_os_error().unwrap_or(libc::EIO),
            Self::Config { .. } | Self::Serialization { .. } => -libc::EINVAL,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MountGateError>;
