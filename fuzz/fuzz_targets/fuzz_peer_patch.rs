#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_devnet::genesis::peer_host_patch;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let Ok(s) = std::str::from_utf8(&data[1..]) else {
        return;
    };

    let hosts: Vec<String> = (0..usize::from(data[0] % 8))
        .map(|i| format!("10.0.0.{i}"))
        .collect();
    let Ok(patch) = peer_host_patch(hosts) else {
        return;
    };

    // A successful patch is idempotent.
    if let Ok(once) = patch.apply(s) {
        assert_eq!(patch.apply(&once).ok(), Some(once));
    }
});
