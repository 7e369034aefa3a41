//! Configuration types for export and the treatment client.
//!
//! Both configs use the builder pattern and are validated on `build()`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Number of archive packages scanned by default.
pub const DEFAULT_PACKAGE_COUNT: usize = 8;

/// Default JSONL output file.
pub const DEFAULT_OUTPUT_PATH: &str = "gemini_train.jsonl";

/// Default treatment endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/generate-treatment";

fn default_source_folders() -> Vec<PathBuf> {
    (1..=DEFAULT_PACKAGE_COUNT)
        .map(|i| PathBuf::from(format!("Archive/Package_{}", i)))
        .collect()
}

/// Configuration for the fine-tuning exporter.
///
/// Use [`ExportConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust
/// use aegis_processing::config::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .source_folder("data/batch_a")
///     .output_path("train.jsonl")
///     .build()
///     .unwrap();
/// assert_eq!(config.source_folders.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Folders scanned in order for `*.json` records.
    pub source_folders: Vec<PathBuf>,

    /// Destination JSONL file. Truncated on every run.
    pub output_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            source_folders: default_source_folders(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl ExportConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.source_folders.is_empty() {
            return Err(ConfigValidationError::NoSourceFolders);
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyPath("output_path".to_string()));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("At least one source folder is required")]
    NoSourceFolders,

    #[error("'{0}' must not be empty")]
    EmptyPath(String),

    #[error("Invalid endpoint '{0}' (must start with http:// or https://)")]
    InvalidEndpoint(String),

    #[error("Invalid timeout: {0:?} (must be greater than zero)")]
    InvalidTimeout(Duration),
}

/// Builder for [`ExportConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ExportConfigBuilder {
    source_folders: Option<Vec<PathBuf>>,
    output_path: Option<PathBuf>,
}

impl ExportConfigBuilder {
    /// Replace the list of source folders.
    pub fn source_folders<I, P>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.source_folders = Some(folders.into_iter().map(Into::into).collect());
        self
    }

    /// Append one source folder. The first call replaces the defaults.
    pub fn source_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.source_folders
            .get_or_insert_with(Vec::new)
            .push(folder.into());
        self
    }

    /// Set the JSONL output file.
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ExportConfig` or an error if validation fails.
    pub fn build(self) -> Result<ExportConfig, ConfigValidationError> {
        let config = ExportConfig {
            source_folders: self.source_folders.unwrap_or_else(default_source_folders),
            output_path: self
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the remote treatment endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Full URL the patient description is POSTed to.
    pub endpoint: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigValidationError::InvalidEndpoint(self.endpoint.clone()));
        }

        if self.timeout.is_zero() {
            return Err(ConfigValidationError::InvalidTimeout(self.timeout));
        }

        Ok(())
    }
}

/// Builder for [`ClientConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClientConfig, ConfigValidationError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            endpoint: self.endpoint.unwrap_or(defaults.endpoint),
            timeout: self.timeout.unwrap_or(defaults.timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
