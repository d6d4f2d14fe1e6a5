//! Server configuration with file loading and defaults-merge semantics.
//!
//! Every field is individually defaulted, so a config file only needs to name
//! the settings it overrides. Configuration problems are fatal: the process
//! must not begin accepting calls with a broken config or operation map.

use std::path::{Path, PathBuf};
use std::time::Duration;

use opsgate_core::{parse_operation_map, OperationMap, SchemaError};
use serde::Deserialize;

/// Top-level configuration for an opsgate server instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins; `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Transport-level request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Upper bound on handler execution per call, in milliseconds. A handler
    /// that exceeds it is abandoned and the call answered with a timeout
    /// envelope, so no audit record is left unfinished.
    pub handler_timeout_ms: u64,
    /// Path to the declarative operation map. None means no file-sourced
    /// operations; specs can still be registered in code.
    pub operations_path: Option<PathBuf>,
    /// Path to the append-only audit log file. None disables the file sink;
    /// audit events are still emitted through tracing.
    pub audit_log_path: Option<PathBuf>,
    /// Maximum number of audit records kept in memory. Oldest finished
    /// records are evicted past this cap; 0 means unbounded.
    pub audit_max_records: usize,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout_ms: 30_000,
            handler_timeout_ms: 30_000,
            operations_path: None,
            audit_log_path: None,
            audit_max_records: 10_000,
            max_body_bytes: 1_048_576, // 1 MB
        }
    }
}

impl ApiConfig {
    /// Loads configuration from a JSON file, merging over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file is unreadable and
    /// [`ConfigError::Parse`] if it is not valid JSON for this shape.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the declarative operation map named by `operations_path`.
    /// Returns an empty map when no path is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file is unreadable and
    /// [`ConfigError::OperationMap`] if its contents are malformed.
    pub fn load_operations(&self) -> Result<OperationMap, ConfigError> {
        let Some(path) = &self.operations_path else {
            return Ok(OperationMap::new());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        parse_operation_map(&contents).map_err(|source| ConfigError::OperationMap {
            path: path.clone(),
            source,
        })
    }

    /// Transport-level request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Per-call handler execution timeout.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

/// Configuration errors. All variants are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to load operation map {path}: {source}")]
    OperationMap {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error("failed to open audit log {path}: {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.handler_timeout(), Duration::from_secs(30));
        assert!(config.operations_path.is_none());
        assert!(config.audit_log_path.is_none());
        assert_eq!(config.audit_max_records, 10_000);
    }

    #[test]
    fn from_file_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "port": 8080, "handlerTimeoutMs": 5000 }}"#).unwrap();

        let config = ApiConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.handler_timeout_ms, 5000);
        // Untouched fields keep their defaults.
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.cors_origins, vec!["*"]);
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let err = ApiConfig::from_file(Path::new("/nonexistent/opsgate.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn from_file_malformed_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ nope").unwrap();

        let err = ApiConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_operations_without_path_is_empty() {
        let config = ApiConfig::default();
        assert!(config.load_operations().unwrap().is_empty());
    }

    #[test]
    fn load_operations_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "createUser": {{ "params": [ {{ "paramName": "email", "type": "string", "mandatory": true }} ] }} }}"#
        )
        .unwrap();

        let config = ApiConfig {
            operations_path: Some(file.path().to_path_buf()),
            ..ApiConfig::default()
        };
        let map = config.load_operations().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("createUser"));
    }

    #[test]
    fn load_operations_malformed_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        let config = ApiConfig {
            operations_path: Some(file.path().to_path_buf()),
            ..ApiConfig::default()
        };
        assert!(matches!(
            config.load_operations().unwrap_err(),
            ConfigError::OperationMap { .. }
        ));
    }
}
