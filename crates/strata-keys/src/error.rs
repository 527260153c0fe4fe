//! Error types for key operations.

use thiserror::Error;

/// Errors that can occur while generating, parsing or sealing keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The secret key is malformed or outside the curve order.
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// The address is malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Keystore encryption or decryption failed.
    #[error("keystore error: {0}")]
    Keystore(#[from] eth_keystore::KeystoreError),
}

/// A specialized Result type for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;
