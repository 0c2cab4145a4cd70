//! Engine-wide settings shared by the library entry points and the CLI.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::framework::{OperationError, OperationPool};
use crate::io::{ExtractionOptions, ValidationMode};
use crate::window::ScorePrecision;

/// Environment variable read when no thread count is given explicitly.
pub const THREADS_ENV: &str = "TRACKENGINE_THREADS";

/// Errors raised while assembling an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The thread count is not a positive integer.
    #[error("invalid thread count '{0}': expected a positive integer")]
    InvalidThreads(String),
}

/// Worker pool size, default storage precision, log filter and validation
/// mode.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Worker threads of the operation pool.
    pub threads: usize,
    /// Precision of the lists built from extracted files.
    pub precision: ScorePrecision,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Handling of malformed input lines.
    pub validation: ValidationMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get().max(1),
            precision: ScorePrecision::default(),
            log_filter: "info".to_string(),
            validation: ValidationMode::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults, with the thread count taken from [`THREADS_ENV`] when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default();
        match std::env::var(THREADS_ENV) {
            Ok(raw) => {
                let threads = parse_threads(&raw)?;
                debug!(threads, "thread count read from {}", THREADS_ENV);
                Ok(config.with_threads(threads))
            }
            Err(_) => Ok(config),
        }
    }

    /// Set the worker thread count (at least one).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the default score precision.
    pub fn with_precision(mut self, precision: ScorePrecision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the default log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Set the validation mode.
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Build the shared operation pool.
    pub fn build_pool(&self) -> Result<Arc<OperationPool>, OperationError> {
        OperationPool::new(Some(self.threads)).map(Arc::new)
    }

    /// Extraction options carrying the validation mode.
    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions::default().with_validation(self.validation)
    }
}

fn parse_threads(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(threads) if threads > 0 => Ok(threads),
        _ => Err(ConfigError::InvalidThreads(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_setters() {
        let config = EngineConfig::default()
            .with_threads(0)
            .with_precision(ScorePrecision::Bit8)
            .with_log_filter("trackengine=debug")
            .with_validation(ValidationMode::Strict);
        assert_eq!(config.threads, 1);
        assert_eq!(config.precision, ScorePrecision::Bit8);
        assert_eq!(config.log_filter, "trackengine=debug");
        assert_eq!(
            config.extraction_options(),
            ExtractionOptions::default().with_validation(ValidationMode::Strict)
        );
        assert_eq!(config.build_pool().unwrap().threads(), 1);
    }

    #[test]
    fn thread_counts_must_be_positive() {
        assert_eq!(parse_threads(" 4 ").unwrap(), 4);
        assert!(parse_threads("0").is_err());
        assert!(parse_threads("many").is_err());
    }
}
