#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_devnet::patch::{set_json_strings, set_toml_string};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(mut doc) = serde_json::from_str::<serde_json::Value>(s) {
            let first = set_json_strings(&mut doc, "execution_chain_id", "15001");
            let snapshot = doc.clone();
            let second = set_json_strings(&mut doc, "execution_chain_id", "15001");
            assert_eq!(first, second);
            assert_eq!(doc, snapshot);
        }

        if let Ok(mut doc) = s.parse::<toml_edit::DocumentMut>() {
            if set_toml_string(&mut doc, "p2p.persistent_peers", "").is_ok() {
                let once = doc.to_string();
                let _ = set_toml_string(&mut doc, "p2p.persistent_peers", "");
                assert_eq!(doc.to_string(), once);
            }
        }
    }
});
