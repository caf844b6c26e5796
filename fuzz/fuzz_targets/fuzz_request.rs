#![no_main]
//! Fuzz target for request lines
//!
//! Parses random bytes as a request and, when parsing succeeds, dispatches
//! it against a fresh root. Neither step may panic, and the root's
//! invariants must hold afterwards.

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use wmserver::config::WmConfig;
use wmserver::display::StaticDisplays;
use wmserver::minimize::{AbilityError, AbilityManager};
use wmserver::request;
use wmserver::window_node::AbilityToken;
use wmserver::WindowRoot;

struct NullAbility;

impl AbilityManager for NullAbility {
    fn minimize_ability(&self, _token: AbilityToken, _from_user: bool) -> Result<(), AbilityError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let config = WmConfig::default();
    let displays = Arc::new(StaticDisplays::new(config.displays.iter().map(|d| d.info())));
    let root = WindowRoot::new(config, displays, Arc::new(NullAbility));

    // One request per line, all against the same root
    for line in s.lines() {
        if let Ok(req) = request::parse_request(line) {
            let _ = request::dispatch(&root, req);
        }
    }
    if let Err(e) = root.check_invariants() {
        panic!("invariant violated: {}", e);
    }
});
