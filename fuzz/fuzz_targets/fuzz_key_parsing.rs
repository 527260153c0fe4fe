#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_keys::{Account, Address, NetworkKey};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(address) = s.parse::<Address>() {
            // Display output parses back to the same address.
            assert_eq!(address.to_string().parse::<Address>().ok(), Some(address));
        }

        if let Ok(account) = Account::from_private_key_hex(s) {
            let again = Account::from_private_key_hex(&account.private_key_hex()).ok();
            assert_eq!(again.map(|a| a.address()), Some(account.address()));
        }

        if let Ok(key) = NetworkKey::from_hex(s) {
            assert_eq!(key.public_id().len(), 128);
        }

        let _ = serde_json::from_str::<Address>(s);
    }
});
