//! Process settings read from the environment at startup.

use std::{path::PathBuf, str::FromStr, time::Duration};

use lintbox_core::{merge, EffectiveConfig, RequestConfig};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_SHARE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 256 * 1024;
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// A setting that could not be used.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("baseline config {}: {reason}", path.display())]
    Baseline { path: PathBuf, reason: String },
}

/// Allowed cross-origin callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// No CORS headers are added.
    None,
    /// Any origin may call the API.
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: String,
    pub api_prefix: String,
    pub cors_origins: CorsOrigins,
    pub share_ttl: Duration,
    pub engine_timeout: Duration,
    pub max_source_bytes: usize,
    pub purge_interval: Duration,
    pub baseline_config: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            cors_origins: CorsOrigins::None,
            share_ttl: DEFAULT_SHARE_TTL,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            purge_interval: DEFAULT_PURGE_INTERVAL,
            baseline_config: None,
        }
    }
}

impl Settings {
    /// Read settings from `LINTBOX_*` environment variables.
    ///
    /// # Errors
    /// Returns [`SettingsError::Invalid`] naming the first malformed variable.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read settings through `lookup`. Unset and empty values take the
    /// default.
    ///
    /// # Errors
    /// Returns [`SettingsError::Invalid`] naming the first malformed variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let api_prefix = match get("LINTBOX_API_PREFIX") {
            Some(prefix) => normalise_prefix("LINTBOX_API_PREFIX", &prefix)?,
            None => defaults.api_prefix,
        };

        Ok(Self {
            listen_addr: get("LINTBOX_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            api_prefix,
            cors_origins: get("LINTBOX_CORS_ORIGINS")
                .map_or(CorsOrigins::None, |v| parse_origins(&v)),
            share_ttl: seconds(
                "LINTBOX_SHARE_TTL_SECS",
                get("LINTBOX_SHARE_TTL_SECS"),
                defaults.share_ttl,
            )?,
            engine_timeout: match get("LINTBOX_ENGINE_TIMEOUT_MS") {
                Some(v) => Duration::from_millis(positive::<u64>("LINTBOX_ENGINE_TIMEOUT_MS", &v)?),
                None => defaults.engine_timeout,
            },
            max_source_bytes: match get("LINTBOX_MAX_SOURCE_BYTES") {
                Some(v) => positive::<usize>("LINTBOX_MAX_SOURCE_BYTES", &v)?,
                None => defaults.max_source_bytes,
            },
            purge_interval: seconds(
                "LINTBOX_PURGE_INTERVAL_SECS",
                get("LINTBOX_PURGE_INTERVAL_SECS"),
                defaults.purge_interval,
            )?,
            baseline_config: get("LINTBOX_BASELINE_CONFIG").map(PathBuf::from),
        })
    }

    /// Build the process baseline: built-in defaults, overlaid with the
    /// `[lint]`/`[format]` tables of the baseline file when one is set.
    ///
    /// # Errors
    /// Returns [`SettingsError::Baseline`] if the file cannot be read,
    /// parsed or merged.
    pub fn load_baseline(&self) -> Result<EffectiveConfig, SettingsError> {
        let Some(path) = &self.baseline_config else {
            return Ok(EffectiveConfig::default());
        };
        let fail = |reason: String| SettingsError::Baseline { path: path.clone(), reason };
        let text = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        baseline_from_toml(&text).map_err(fail)
    }
}

/// Merge a TOML document with `[lint]` and `[format]` tables onto the
/// built-in defaults.
///
/// # Errors
/// Returns a description of the problem if the document does not parse or
/// does not merge.
pub fn baseline_from_toml(text: &str) -> Result<EffectiveConfig, String> {
    let overrides: RequestConfig = toml::from_str(text).map_err(|e| e.to_string())?;
    merge(&EffectiveConfig::default(), &overrides).map_err(|e| e.to_string())
}

fn normalise_prefix(var: &'static str, prefix: &str) -> Result<String, SettingsError> {
    let trimmed = prefix.trim_end_matches('/');
    if !trimmed.is_empty() && !trimmed.starts_with('/') {
        return Err(SettingsError::Invalid {
            var,
            reason: format!("'{prefix}' must start with '/'"),
        });
    }
    Ok(trimmed.to_owned())
}

fn parse_origins(value: &str) -> CorsOrigins {
    let origins: Vec<String> =
        value.split(',').map(str::trim).filter(|o| !o.is_empty()).map(str::to_owned).collect();
    if origins.iter().any(|o| o == "*") {
        CorsOrigins::Any
    } else if origins.is_empty() {
        CorsOrigins::None
    } else {
        CorsOrigins::List(origins)
    }
}

fn seconds(
    var: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, SettingsError> {
    match value {
        Some(v) => Ok(Duration::from_secs(positive::<u64>(var, &v)?)),
        None => Ok(default),
    }
}

fn positive<T>(var: &'static str, value: &str) -> Result<T, SettingsError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let parsed = value
        .parse::<T>()
        .map_err(|e| SettingsError::Invalid { var, reason: format!("'{value}': {e}") })?;
    if parsed == T::default() {
        return Err(SettingsError::Invalid { var, reason: "must be greater than zero".to_owned() });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Settings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn unset_variables_take_defaults() {
        let s = match settings(&[]) {
            Ok(s) => s,
            Err(e) => panic!("settings failed: {e}"),
        };
        assert_eq!(s.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(s.api_prefix, "/api/v1");
        assert_eq!(s.cors_origins, CorsOrigins::None);
        assert_eq!(s.share_ttl, Duration::from_secs(604_800));
        assert_eq!(s.max_source_bytes, 262_144);
        assert!(s.baseline_config.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let s = match settings(&[
            ("LINTBOX_API_PREFIX", "/v2/"),
            ("LINTBOX_CORS_ORIGINS", "https://a.example, https://b.example"),
            ("LINTBOX_SHARE_TTL_SECS", "60"),
            ("LINTBOX_ENGINE_TIMEOUT_MS", "250"),
        ]) {
            Ok(s) => s,
            Err(e) => panic!("settings failed: {e}"),
        };
        assert_eq!(s.api_prefix, "/v2");
        assert_eq!(
            s.cors_origins,
            CorsOrigins::List(vec!["https://a.example".to_owned(), "https://b.example".to_owned()])
        );
        assert_eq!(s.share_ttl, Duration::from_secs(60));
        assert_eq!(s.engine_timeout, Duration::from_millis(250));
    }

    #[test]
    fn wildcard_origin_means_any() {
        assert_eq!(parse_origins("https://a.example,*"), CorsOrigins::Any);
        assert_eq!(parse_origins(" , "), CorsOrigins::None);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        for (var, value) in [
            ("LINTBOX_SHARE_TTL_SECS", "a week"),
            ("LINTBOX_ENGINE_TIMEOUT_MS", "0"),
            ("LINTBOX_MAX_SOURCE_BYTES", "-1"),
            ("LINTBOX_API_PREFIX", "api"),
        ] {
            match settings(&[(var, value)]) {
                Err(SettingsError::Invalid { var: named, .. }) => assert_eq!(named, var),
                other => panic!("expected invalid {var}, got {other:?}"),
            }
        }
    }

    #[test]
    fn baseline_toml_overlays_defaults() {
        let text = concat!(
            "[lint]\nrequired-columns = [\"created_at\"]\nfuture-option = 3\n\n",
            "[format]\ncomma-at-beginning = false\n",
        );
        let baseline = match baseline_from_toml(text) {
            Ok(b) => b,
            Err(e) => panic!("baseline failed: {e}"),
        };
        assert_eq!(baseline.lint.required_columns, vec!["created_at".to_owned()]);
        assert_eq!(baseline.lint.extra.get("future-option"), Some(&serde_json::json!(3)));
        assert!(!baseline.format.comma_at_beginning);
        assert!(baseline.format.new_line_before_semicolon);
    }

    #[test]
    fn baseline_toml_type_mismatch_is_rejected() {
        assert!(baseline_from_toml("[format]\nlines-between-statements = \"two\"\n").is_err());
        assert!(baseline_from_toml("[linter]\nselect = []\n").is_err());
    }

    #[test]
    fn missing_baseline_file_is_reported() {
        let s = Settings {
            baseline_config: Some(PathBuf::from("/nonexistent/lintbox.toml")),
            ..Settings::default()
        };
        assert!(matches!(s.load_baseline(), Err(SettingsError::Baseline { .. })));
    }
}
