use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use metri::MetricsOptions;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings file for the demo server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Bearer token required on the metrics endpoint, if set.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub metrics: MetricsOptions,
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            auth_token: None,
            metrics: MetricsOptions::default(),
        }
    }
}

impl Settings {
    /// Reads a JSON settings file, or returns defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json() {
        let settings = Settings::from_json(
            r#"{ "listen": "127.0.0.1:9000", "authToken": "s3cret", "metrics": { "path": "/stats" } }"#,
        )
        .unwrap();
        assert_eq!(settings.listen, "127.0.0.1:9000");
        assert_eq!(settings.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(settings.metrics.path, "/stats");
        assert_eq!(settings.metrics.exposition_mime_type, "text/plain");
    }

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.listen, "0.0.0.0:3000");
        assert!(settings.auth_token.is_none());
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(Settings::from_json("{"), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Settings::load(Some(Path::new("/nonexistent/metri.json"))).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/metri.json"));
    }
}
