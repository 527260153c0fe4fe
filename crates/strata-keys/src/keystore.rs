//! Encrypted JSON keystores (Web3 Secret Storage, version 3).

use crate::{Account, KeyError, Result};
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};

/// Keystore file helpers.
pub struct Keystore;

impl Keystore {
    /// Returns the geth-style file name for an account's keystore:
    /// `UTC--<timestamp>--<address without 0x>`.
    #[must_use]
    pub fn file_name(account: &Account) -> String {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ");
        format!("UTC--{now}--{}", account.address().to_hex())
    }

    /// Encrypts the account's private key with `password` and writes the
    /// keystore into `dir`. Returns the path of the written file.
    ///
    /// Encryption runs a deliberately slow key derivation; call this from a
    /// blocking context.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails or the file cannot be written.
    pub fn write(dir: &Path, account: &Account, password: &str) -> Result<PathBuf> {
        let name = Self::file_name(account);
        let secret = account.secret_bytes();
        eth_keystore::encrypt_key(dir, &mut OsRng, &*secret, password, Some(name.as_str()))?;
        Ok(dir.join(name))
    }

    /// Decrypts a keystore file back into an account.
    ///
    /// # Errors
    ///
    /// Returns an error on a wrong password, a corrupt file, or a decrypted
    /// key that is not a valid secp256k1 scalar.
    pub fn decrypt(path: &Path, password: &str) -> Result<Account> {
        let secret = zeroize::Zeroizing::new(eth_keystore::decrypt_key(path, password)?);
        if secret.len() != 32 {
            return Err(KeyError::InvalidSecretKey(format!(
                "keystore holds {} bytes",
                secret.len()
            )));
        }
        Account::from_private_key_hex(&hex::encode(&*secret))
    }
}
