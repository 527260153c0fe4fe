//! secp256k1 network identity used for peer discovery.

use crate::{strip_hex_prefix, KeyError, Result};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// A node's network identity key.
///
/// The public identity is the uncompressed secp256k1 point without its
/// leading `0x04` tag, which is what discovery URIs embed.
#[derive(Clone)]
pub struct NetworkKey {
    secret: SecretKey,
}

impl NetworkKey {
    /// Length of the public identity in bytes.
    pub const PUBLIC_ID_LEN: usize = 64;

    /// Generates a fresh key from the operating system's entropy source.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Parses a hex encoded private key, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not 32 bytes of hex or is not a valid
    /// scalar.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = Zeroizing::new(hex::decode(strip_hex_prefix(s.trim()))?);
        if bytes.len() != 32 {
            return Err(KeyError::InvalidSecretKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
        Ok(Self { secret })
    }

    /// Returns the private key as lowercase hex without a prefix.
    ///
    /// This is the format node key files use.
    #[must_use]
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret.to_bytes()))
    }

    /// Returns the raw public identity bytes.
    #[must_use]
    pub fn public_id_bytes(&self) -> [u8; Self::PUBLIC_ID_LEN] {
        let point = self.secret.public_key().to_encoded_point(false);
        let mut out = [0u8; Self::PUBLIC_ID_LEN];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    /// Returns the public identity as lowercase hex (128 characters).
    #[must_use]
    pub fn public_id(&self) -> String {
        hex::encode(self.public_id_bytes())
    }
}

impl std::fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkKey")
            .field("public_id", &&self.public_id()[..16])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn generated_keys_are_distinct() {
        let a = NetworkKey::generate();
        let b = NetworkKey::generate();
        assert_ne!(a.public_id(), b.public_id());
        assert_ne!(*a.secret_hex(), *b.secret_hex());
    }

    #[test]
    fn public_id_is_uncompressed_point_without_tag() {
        let key = NetworkKey::generate();
        let id = key.public_id();
        assert_eq!(id.len(), 128);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn known_vector() {
        // Secret key 1 maps to the generator point.
        let key = NetworkKey::from_hex(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        assert_eq!(
            key.public_id(),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
             483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
        );
    }

    #[test]
    fn from_hex_roundtrips_secret() {
        let key = NetworkKey::generate();
        let parsed = NetworkKey::from_hex(&key.secret_hex()).unwrap();
        assert_eq!(key.public_id(), parsed.public_id());
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(matches!(
            NetworkKey::from_hex("zz"),
            Err(KeyError::InvalidHex(_))
        ));
        assert!(matches!(
            NetworkKey::from_hex("abcd"),
            Err(KeyError::InvalidSecretKey(_))
        ));
        assert!(NetworkKey::from_hex(&"00".repeat(32)).is_err());
    }
}
