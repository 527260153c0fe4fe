//! Signing account sources.

use crate::error::{DevnetError, Result};
use crate::fs;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use strata_keys::{Account, Address};

/// Supplies one signing account per node, index-aligned.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Returns at least `count` accounts. Only the first `count` are used.
    async fn accounts(&self, count: usize) -> Result<Vec<Account>>;
}

/// Generates fresh accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratedAccounts;

#[async_trait]
impl AccountSource for GeneratedAccounts {
    async fn accounts(&self, count: usize) -> Result<Vec<Account>> {
        Ok((0..count).map(|_| Account::generate()).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SignerRecord {
    address: String,
    priv_key: String,
}

/// Reads accounts from a signer dump: a JSON array of
/// `{"address": "0x..", "priv_key": "0x.."}` records.
#[derive(Debug, Clone)]
pub struct SignerDump {
    path: PathBuf,
}

impl SignerDump {
    /// Reads the dump at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AccountSource for SignerDump {
    async fn accounts(&self, count: usize) -> Result<Vec<Account>> {
        let content = fs::read_to_string(&self.path).await?;
        let records: Vec<SignerRecord> =
            serde_json::from_str(&content).map_err(|source| DevnetError::Json {
                path: self.path.clone(),
                source,
            })?;

        if records.len() < count {
            return Err(DevnetError::Precondition(format!(
                "signer dump {} has {} entries, {count} nodes need signers",
                self.path.display(),
                records.len()
            )));
        }

        records
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(i, record)| {
                let account = Account::from_private_key_hex(&record.priv_key)?;
                let declared: Address = record.address.parse()?;
                if declared != account.address() {
                    return Err(DevnetError::Precondition(format!(
                        "signer {i} declares address {declared} but its key derives {}",
                        account.address()
                    )));
                }
                Ok(account)
            })
            .collect()
    }
}
