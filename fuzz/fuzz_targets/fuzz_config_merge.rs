//! Fuzz target: merging arbitrary request configuration onto the defaults.
//!
//! Any JSON accepted as a `RequestConfig` must either merge or fail with a
//! `CoreError`; a merged result must render to TOML without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lintbox_core::{merge, EffectiveConfig, RequestConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(overrides) = serde_json::from_slice::<RequestConfig>(data) else {
        return;
    };
    if let Ok(merged) = merge(&EffectiveConfig::default(), &overrides) {
        let _ = merged.to_toml();
    }
});
