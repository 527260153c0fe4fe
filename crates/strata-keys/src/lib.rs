//! # Strata Keys
//!
//! Key material for strata devnets.
//!
//! Two kinds of keys are involved when a devnet is provisioned:
//!
//! - **Network identities** ([`NetworkKey`]): secp256k1 keys whose public point
//!   identifies a node in peer discovery (`enode://<public id>@host:port`).
//! - **Signing accounts** ([`Account`]): secp256k1 keys with a derived 20-byte
//!   [`Address`], sealed into an encrypted [`Keystore`] for the execution node.
//!
//! ## Example
//!
//! ```rust
//! use strata_keys::{Account, NetworkKey};
//!
//! let key = NetworkKey::generate();
//! assert_eq!(key.public_id().len(), 128);
//!
//! let account = Account::generate();
//! assert!(account.address().to_string().starts_with("0x"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod error;
mod keystore;
mod network;

pub use account::{Account, Address};
pub use error::{KeyError, Result};
pub use keystore::Keystore;
pub use network::NetworkKey;

/// Strips an optional `0x` prefix from a hex string.
pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
