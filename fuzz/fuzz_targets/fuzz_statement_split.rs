//! Fuzz target: statement splitting and the bundled engine.
//!
//! Split offsets must be ordered char boundaries, and neither lint nor
//! format may panic on any UTF-8 input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lintbox_core::EffectiveConfig;
use lintbox_engine::{pg::split_offsets, PgEngine, SqlEngine};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    let mut previous_end = 0;
    for (start, end) in split_offsets(source) {
        assert!(previous_end <= start && start < end && end <= source.len());
        assert!(source.is_char_boundary(start) && source.is_char_boundary(end));
        previous_end = end;
    }

    let engine = PgEngine::new();
    let config = EffectiveConfig::default();
    let _ = engine.lint(source, &config, true);
    let _ = engine.format(source, &config);
});
