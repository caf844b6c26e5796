#![no_main]
//! Fuzz target for config TOML parsing
//!
//! Feeds random bytes as TOML to the config loader to find panics
//! in deserialization and validation.

use libfuzzer_sys::fuzz_target;

use wmserver::config::WmConfig;

fuzz_target!(|data: &[u8]| {
    // Parse and validate - must never panic
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = WmConfig::from_toml_str(s);
    }
});
