use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::error::{MetricsError, Result};
use crate::metrics::CollectorSet;
use crate::sampler::ProcessSampler;

/// Rewrites the `path` label for a request. `None` skips the observation.
pub type FormatPaths = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// Replaces the default collector wiring.
pub type SetupCollectors = Arc<dyn Fn(&Arc<ProcessSampler>) -> Result<CollectorSet> + Send + Sync>;

/// Decides whether a request may read the metrics endpoint.
pub type AuthCheck = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// Representation served by the metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Prometheus text exposition.
    Exposition,
    /// JSON snapshot.
    Structured,
}

impl FromStr for Format {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exposition" => Ok(Self::Exposition),
            "json" => Ok(Self::Structured),
            _ => Err(MetricsError::InvalidDefaultFormat),
        }
    }
}

// ─── Raw options ─────────────────────────────────────────────────

/// Options as supplied by the host, before validation.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOptions {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_exposition_mime_type")]
    pub exposition_mime_type: String,

    #[serde(default = "default_json_mime_type")]
    pub json_mime_type: String,

    /// `exposition` or `json`
    #[serde(default = "default_format")]
    pub default_format: String,

    #[serde(skip)]
    pub auth: Option<AuthCheck>,

    #[serde(skip)]
    pub format_paths: Option<FormatPaths>,

    #[serde(skip)]
    pub setup_collectors: Option<SetupCollectors>,
}

fn default_path() -> String {
    "/metrics".into()
}
fn default_exposition_mime_type() -> String {
    "text/plain".into()
}
fn default_json_mime_type() -> String {
    "application/json".into()
}
fn default_format() -> String {
    "exposition".into()
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            path: default_path(),
            exposition_mime_type: default_exposition_mime_type(),
            json_mime_type: default_json_mime_type(),
            default_format: default_format(),
            auth: None,
            format_paths: None,
            setup_collectors: None,
        }
    }
}

impl MetricsOptions {
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn exposition_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.exposition_mime_type = mime.into();
        self
    }

    pub fn json_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.json_mime_type = mime.into();
        self
    }

    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    pub fn auth(mut self, check: impl Fn(&HeaderMap) -> bool + Send + Sync + 'static) -> Self {
        self.auth = Some(Arc::new(check));
        self
    }

    pub fn format_paths(mut self, f: impl Fn(&Request) -> Option<String> + Send + Sync + 'static) -> Self {
        self.format_paths = Some(Arc::new(f));
        self
    }

    pub fn setup_collectors(
        mut self,
        f: impl Fn(&Arc<ProcessSampler>) -> Result<CollectorSet> + Send + Sync + 'static,
    ) -> Self {
        self.setup_collectors = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for MetricsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsOptions")
            .field("path", &self.path)
            .field("exposition_mime_type", &self.exposition_mime_type)
            .field("json_mime_type", &self.json_mime_type)
            .field("default_format", &self.default_format)
            .field("auth", &self.auth.is_some())
            .field("format_paths", &self.format_paths.is_some())
            .field("setup_collectors", &self.setup_collectors.is_some())
            .finish()
    }
}

// ─── Resolved configuration ──────────────────────────────────────

/// Validated settings, fixed for the life of the plugin.
#[derive(Clone)]
pub struct MetricsConfig {
    pub path: String,
    pub exposition_mime_type: HeaderValue,
    pub json_mime_type: HeaderValue,
    pub default_format: Format,
    pub auth: Option<AuthCheck>,
    pub format_paths: Option<FormatPaths>,
    pub setup_collectors: Option<SetupCollectors>,
}

impl MetricsConfig {
    pub fn resolve(options: MetricsOptions) -> Result<Self> {
        let default_format = options.default_format.parse::<Format>()?;

        if !options.path.starts_with('/') {
            return Err(MetricsError::InvalidPath(options.path));
        }

        Ok(Self {
            path: options.path,
            exposition_mime_type: mime("expositionMimeType", &options.exposition_mime_type)?,
            json_mime_type: mime("jsonMimeType", &options.json_mime_type)?,
            default_format,
            auth: options.auth,
            format_paths: options.format_paths,
            setup_collectors: options.setup_collectors,
        })
    }
}

fn mime(option: &'static str, value: &str) -> Result<HeaderValue> {
    match HeaderValue::from_str(value) {
        Ok(v) if !value.is_empty() => Ok(v),
        _ => Err(MetricsError::InvalidMimeType {
            option,
            value: value.to_string(),
        }),
    }
}

impl fmt::Debug for MetricsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsConfig")
            .field("path", &self.path)
            .field("exposition_mime_type", &self.exposition_mime_type)
            .field("json_mime_type", &self.json_mime_type)
            .field("default_format", &self.default_format)
            .field("auth", &self.auth.is_some())
            .field("format_paths", &self.format_paths.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MetricsConfig::resolve(MetricsOptions::default()).unwrap();
        assert_eq!(config.path, "/metrics");
        assert_eq!(config.exposition_mime_type, "text/plain");
        assert_eq!(config.json_mime_type, "application/json");
        assert_eq!(config.default_format, Format::Exposition);
    }

    #[test]
    fn json_default_format() {
        let config = MetricsConfig::resolve(MetricsOptions::default().default_format("json")).unwrap();
        assert_eq!(config.default_format, Format::Structured);
    }

    #[test]
    fn invalid_default_format_message() {
        let err = MetricsConfig::resolve(MetricsOptions::default().default_format("foo")).unwrap_err();
        assert_eq!(err.to_string(), "defaultFormat must be exposition or json");
    }

    #[test]
    fn format_names_are_case_sensitive() {
        assert!("JSON".parse::<Format>().is_err());
        assert!("".parse::<Format>().is_err());
    }

    #[test]
    fn rejects_relative_path() {
        let err = MetricsConfig::resolve(MetricsOptions::default().path("metrics")).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidPath(p) if p == "metrics"));
    }

    #[test]
    fn rejects_unusable_mime_type() {
        let err = MetricsConfig::resolve(MetricsOptions::default().json_mime_type("bad\nmime")).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidMimeType { option: "jsonMimeType", .. }));
    }

    #[test]
    fn options_deserialize_with_camel_case_keys() {
        let options: MetricsOptions =
            serde_json::from_str(r#"{ "jsonMimeType": "application/foo", "defaultFormat": "json" }"#).unwrap();
        assert_eq!(options.json_mime_type, "application/foo");
        assert_eq!(options.default_format, "json");
        assert_eq!(options.path, "/metrics");
        assert!(options.format_paths.is_none());
    }
}
