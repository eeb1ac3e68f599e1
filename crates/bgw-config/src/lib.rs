// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and the typed secret abstraction.
//!
//! Provider and vision credentials travel as [`Secret`], one wrapper type
//! for the whole gateway. A `Secret` deserializes from a plain string but
//! never renders its value through `Debug`/`Display`/serialization; code
//! that genuinely needs the value calls [`Secret::expose`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// An API credential. Redacted everywhere except [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The underlying value. Call sites should hand it straight to the
    /// outbound request and not store it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the wrapped value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for Secret {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Errors & warnings
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found or unreadable.
    #[error("config file unreadable: {path}: {reason}")]
    Unreadable {
        /// Path that was requested.
        path: String,
        /// OS-level detail.
        reason: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    Parse {
        /// Human-readable parse error detail.
        reason: String,
    },
}

/// Advisory issues that do not prevent startup but deserve a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A provider is enabled but has no credential configured.
    MissingCredential {
        /// Provider name.
        provider: String,
    },
    /// Every provider is disabled; searches will always miss.
    NoProvidersEnabled,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::MissingCredential { provider } => {
                write!(f, "provider '{provider}' is enabled without an API key")
            }
            ConfigWarning::NoProvidersEnabled => f.write_str("no providers are enabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Settings for one upstream metadata provider.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    /// Whether the provider participates in fan-outs.
    pub enabled: bool,
    /// Base URL override, mainly for tests.
    pub base_url: Option<String>,
    /// API key, when the provider requires one.
    pub api_key: Option<Secret>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            api_key: None,
        }
    }
}

/// Settings for the vision model used by CSV import and shelf scans.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct VisionSettings {
    /// Model identifier sent to the vision API.
    pub model: String,
    /// API key.
    pub api_key: Option<Secret>,
    /// Base URL override, mainly for tests.
    pub base_url: Option<String>,
    /// Longest image side the model accepts, in pixels.
    pub max_side_px: u32,
    /// JPEG quality used when a resize is planned.
    pub jpeg_quality: u8,
    /// Model context window, in tokens.
    pub context_window_tokens: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            api_key: None,
            base_url: None,
            max_side_px: 3072,
            jpeg_quality: 80,
            context_window_tokens: 1_000_000,
        }
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address for the HTTP listener.
    pub bind: Option<String>,
    /// Log filter override (e.g. `"bgw=debug"`).
    pub log_filter: Option<String>,
    /// Google Books provider.
    pub google_books: ProviderSettings,
    /// OpenLibrary provider.
    pub openlibrary: ProviderSettings,
    /// ISBNdb provider.
    pub isbndb: ProviderSettings,
    /// Vision model settings.
    pub vision: VisionSettings,
    /// Shared secret required by the harvest trigger endpoint.
    pub harvest_secret: Option<Secret>,
}

impl GatewayConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlay credentials from the process environment. Environment always
    /// wins over the file so deployments can rotate keys without edits.
    pub fn apply_env(&mut self) {
        let mut from_env = |name: &str, slot: &mut Option<Secret>| {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    *slot = Some(Secret::new(value));
                }
            }
        };
        from_env("GOOGLE_BOOKS_API_KEY", &mut self.google_books.api_key);
        from_env("ISBNDB_API_KEY", &mut self.isbndb.api_key);
        from_env("GEMINI_API_KEY", &mut self.vision.api_key);
        from_env("HARVEST_SECRET", &mut self.harvest_secret);
    }

    /// Advisory validation.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        // OpenLibrary is keyless; the other two need credentials.
        for (name, settings) in [("google-books", &self.google_books), ("isbndb", &self.isbndb)] {
            if settings.enabled && settings.api_key.is_none() {
                warnings.push(ConfigWarning::MissingCredential {
                    provider: name.to_string(),
                });
            }
        }
        if !self.google_books.enabled && !self.openlibrary.enabled && !self.isbndb.enabled {
            warnings.push(ConfigWarning::NoProvidersEnabled);
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_never_prints_its_value() {
        let s = Secret::new("sk-very-secret");
        assert_eq!(format!("{s}"), "***");
        assert_eq!(format!("{s:?}"), "Secret(***)");
        assert_eq!(s.expose(), "sk-very-secret");
    }

    #[test]
    fn secret_serializes_redacted() {
        let s = Secret::new("sk-very-secret");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#""***""#);
    }

    #[test]
    fn secret_deserializes_from_plain_string() {
        let s: Secret = serde_json::from_str(r#""plain""#).unwrap();
        assert_eq!(s.expose(), "plain");
    }

    #[test]
    fn toml_roundtrip_with_defaults() {
        let cfg = GatewayConfig::from_toml_str("").unwrap();
        assert!(cfg.google_books.enabled);
        assert_eq!(cfg.vision.max_side_px, 3072);
        assert_eq!(cfg.vision.context_window_tokens, 1_000_000);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let cfg = GatewayConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:8080"

            [isbndb]
            enabled = false

            [vision]
            model = "gemini-2.5-pro"
            api_key = "vision-key"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind.as_deref(), Some("0.0.0.0:8080"));
        assert!(!cfg.isbndb.enabled);
        assert_eq!(cfg.vision.model, "gemini-2.5-pro");
        assert_eq!(cfg.vision.api_key.unwrap().expose(), "vision-key");
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = GatewayConfig::from_toml_str("bind = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn validate_flags_enabled_keyless_providers() {
        let cfg = GatewayConfig::default();
        let warnings = cfg.validate();
        assert!(warnings.contains(&ConfigWarning::MissingCredential {
            provider: "google-books".into()
        }));
        assert!(warnings.contains(&ConfigWarning::MissingCredential {
            provider: "isbndb".into()
        }));
    }

    #[test]
    fn validate_flags_all_providers_disabled() {
        let mut cfg = GatewayConfig::default();
        cfg.google_books.enabled = false;
        cfg.openlibrary.enabled = false;
        cfg.isbndb.enabled = false;
        assert!(cfg.validate().contains(&ConfigWarning::NoProvidersEnabled));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookgate.toml");
        std::fs::write(&path, "bind = \"127.0.0.1:9999\"\n").unwrap();
        let cfg = GatewayConfig::load(&path).unwrap();
        assert_eq!(cfg.bind.as_deref(), Some("127.0.0.1:9999"));
    }
}
