//! Signing accounts and their derived addresses.

use crate::{strip_hex_prefix, KeyError, Result};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The length of an address in bytes.
    pub const LEN: usize = 20;

    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of this address.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the address as lowercase hex without the `0x` prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn from_public_key(key: &k256::PublicKey) -> Self {
        let point = key.to_encoded_point(false);
        let digest = Keccak256::digest(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|v: Vec<u8>| {
            KeyError::InvalidAddress(format!("expected 20 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A signing account: a secp256k1 private key plus its derived address.
#[derive(Clone)]
pub struct Account {
    secret: SecretKey,
    address: Address,
}

impl Account {
    /// Generates a fresh account from the operating system's entropy source.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    /// Parses a hex encoded private key, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not 32 bytes of hex or not a valid
    /// scalar.
    pub fn from_private_key_hex(s: &str) -> Result<Self> {
        let bytes = Zeroizing::new(hex::decode(strip_hex_prefix(s.trim()))?);
        if bytes.len() != 32 {
            return Err(KeyError::InvalidSecretKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let address = Address::from_public_key(&secret.public_key());
        Self { secret, address }
    }

    /// Returns the account address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the raw private key bytes.
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Returns the private key as `0x`-prefixed lowercase hex.
    #[must_use]
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(self.secret.to_bytes())))
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Account {}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Hardhat / anvil default account #0.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn derives_known_address() {
        let account = Account::from_private_key_hex(DEV_KEY).unwrap();
        assert_eq!(account.address().to_string(), DEV_ADDRESS);
        assert_eq!(*account.private_key_hex(), DEV_KEY);
    }

    #[test]
    fn accepts_unprefixed_keys() {
        let account = Account::from_private_key_hex(&DEV_KEY[2..]).unwrap();
        assert_eq!(account.address().to_string(), DEV_ADDRESS);
    }

    #[test]
    fn generated_accounts_are_distinct() {
        let a = Account::generate();
        let b = Account::generate();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn address_parse_and_display() {
        let addr: Address = DEV_ADDRESS.parse().unwrap();
        assert_eq!(addr.to_string(), DEV_ADDRESS);
        assert_eq!(addr.to_hex(), &DEV_ADDRESS[2..]);

        let upper: Address = "0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266".parse().unwrap();
        assert_eq!(addr, upper);
    }

    #[test]
    fn address_rejects_wrong_length() {
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(KeyError::InvalidAddress(_))
        ));
    }

    #[test]
    fn address_serde_json() {
        let addr: Address = DEV_ADDRESS.parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{DEV_ADDRESS}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }

    proptest::proptest! {
        #[test]
        fn address_text_form_is_stable(bytes in proptest::prelude::any::<[u8; 20]>()) {
            let addr = Address::from_bytes(bytes);
            let text = addr.to_string();
            proptest::prop_assert!(text.starts_with("0x"));
            proptest::prop_assert_eq!(text.len(), 42);
            proptest::prop_assert_eq!(text.parse::<Address>().unwrap(), addr);
            proptest::prop_assert_eq!(text.to_uppercase().replacen("0X", "0x", 1).parse::<Address>().unwrap(), addr);
        }
    }
}
