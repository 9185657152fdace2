//! Applies a per-request configuration fragment onto a baseline.
//!
//! The baseline is never touched: every call serialises it into a fresh
//! value, overlays the request's keys and deserialises the result, so each
//! invocation owns the configuration it runs with.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::config::{EffectiveConfig, RequestConfig};
use crate::error::CoreError;

/// Merge `overrides` onto `baseline`, producing the configuration for one
/// invocation.
///
/// Every key present in `overrides` replaces the baseline field; absent keys
/// keep the baseline value. A key spelled in `snake_case` is accepted for a
/// known hyphenated field; any other unrecognised key is kept verbatim.
///
/// # Errors
/// Returns [`CoreError::InvalidConfig`] when a value has the wrong type for
/// its field, or [`CoreError::InvalidPattern`] when a naming pattern does not
/// compile.
pub fn merge(
    baseline: &EffectiveConfig,
    overrides: &RequestConfig,
) -> Result<EffectiveConfig, CoreError> {
    let merged = EffectiveConfig {
        lint: overlay("lint", &baseline.lint, &overrides.lint)?,
        format: overlay("format", &baseline.format, &overrides.format)?,
    };
    merged.validate()?;
    Ok(merged)
}

fn overlay<T>(
    section: &'static str,
    base: &T,
    overrides: &Map<String, Value>,
) -> Result<T, CoreError>
where
    T: Serialize + DeserializeOwned,
{
    let mut fields = match serde_json::to_value(base) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(CoreError::InvalidConfig {
                section,
                reason: "baseline is not a table".to_owned(),
            })
        }
        Err(e) => return Err(CoreError::InvalidConfig { section, reason: e.to_string() }),
    };

    for (key, value) in overrides {
        let canonical = canonical_key(&fields, key);
        fields.insert(canonical, value.clone());
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| CoreError::InvalidConfig { section, reason: e.to_string() })
}

/// Map `snake_case` spellings of known fields onto their hyphenated form.
///
/// `known` always holds every declared field because the baseline is
/// serialised in full, so a key is only rewritten when the rewrite names one.
fn canonical_key(known: &Map<String, Value>, key: &str) -> String {
    if known.contains_key(key) {
        return key.to_owned();
    }
    let hyphenated = key.replace('_', "-");
    if hyphenated != key && known.contains_key(&hyphenated) {
        hyphenated
    } else {
        key.to_owned()
    }
}
