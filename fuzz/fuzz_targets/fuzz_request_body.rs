//! Fuzz target: JSON decoding of lint, format and share request bodies.
//!
//! Arbitrary bytes must never panic the decoders; errors are expected.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lintbox_core::SharePayload;
use lintbox_gateway::routes::{FormatRequest, LintRequest};

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<LintRequest>(data);
    let _ = serde_json::from_slice::<FormatRequest>(data);
    let _ = serde_json::from_slice::<SharePayload>(data);
});
