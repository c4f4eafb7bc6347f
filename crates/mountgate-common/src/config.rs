//! Configuration model for the propagation hook.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::constants::{
    DEFAULT_KALLSYMS_PATH, DEFAULT_LOG_FILTER, DEFAULT_MAX_ACTIVE,
    DEFAULT_TRUSTED_DEVICE_PREFIXES, TARGET_SYMBOL,
};
use crate::error::{MountGateError, Result};
use crate::types::ScopeMode;

/// Root configuration for the propagation hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountGateConfig {
    /// Name of the internal function to intercept.
    pub symbol: String,
    /// Capacity of the per-invocation slot pool.
    pub max_active: usize,
    /// How invocations are judged in or out of scope.
    pub scope: ScopeMode,
    /// Source device prefixes that may be captured as the trusted source.
    pub trusted_device_prefixes: Vec<String>,
    /// Kernel symbol table to resolve `symbol` against.
    pub kallsyms_path: PathBuf,
    /// Fallback `tracing` filter directive.
    pub log_filter: String,
}

impl Default for MountGateConfig {
    fn default() -> Self {
        Self {
            symbol: TARGET_SYMBOL.to_owned(),
            max_active: DEFAULT_MAX_ACTIVE,
            scope: ScopeMode::default(),
            trusted_device_prefixes: DEFAULT_TRUSTED_DEVICE_PREFIXES
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            kallsyms_path: PathBuf::from(DEFAULT_KALLSYMS_PATH),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl MountGateConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading hook configuration");
        let raw = std::fs::read_to_string(path).map_err(|source| MountGateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Checks invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`MountGateError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(MountGateError::Config {
                message: "symbol must not be empty".into(),
            });
        }
        if self.max_active == 0 {
            return Err(MountGateError::Config {
                message: "max_active must be at least 1".into(),
            });
        }
        if let Err(err) = EnvFilter::try_new(&self.log_filter) {
            return Err(MountGateError::Config {
                message: format!("invalid log_filter '{}': {err}", self.log_filter),
            });
        }
        if self.scope == ScopeMode::Bootstrap
            && self.trusted_device_prefixes.iter().all(|p| p.is_empty())
        {
            return Err(MountGateError::Config {
                message: "bootstrap scope needs at least one trusted device prefix".into(),
            });
        }
        Ok(())
    }
}
