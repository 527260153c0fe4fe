//! Execution-layer signer material: passwords, keys, keystores and the
//! execution genesis copy, one set per node.

use crate::error::{DevnetError, Result};
use crate::fs;
use crate::layout::Layout;
use crate::patch::to_json_pretty;
use futures::future::try_join_all;
use serde_json::Value;
use std::path::PathBuf;
use strata_keys::{Account, Address, Keystore};

/// Keystore password of node `index`.
#[must_use]
pub fn keystore_password(index: usize) -> String {
    format!("password{index}")
}

/// What was written for one node's signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerFiles {
    /// Node index.
    pub index: usize,
    /// Signing address.
    pub address: Address,
    /// Encrypted keystore file.
    pub keystore: PathBuf,
}

/// Writes every node's signer files and execution genesis copy.
///
/// `accounts` must hold one account per node, index-aligned. Keystore
/// encryption runs on the blocking pool; nodes proceed concurrently.
///
/// # Errors
///
/// Fails if there are fewer accounts than nodes, on I/O errors, or if
/// keystore encryption fails.
pub async fn write_signer_files(
    layout: &Layout,
    accounts: &[Account],
    execution_genesis: &Value,
) -> Result<Vec<SignerFiles>> {
    if accounts.len() < layout.len() {
        return Err(DevnetError::Precondition(format!(
            "{} nodes need signers, {} accounts available",
            layout.len(),
            accounts.len()
        )));
    }

    let genesis = to_json_pretty(&layout.node(0).execution_genesis, execution_genesis)?;

    let writes = layout.nodes().zip(accounts).map(|(paths, account)| {
        let genesis = &genesis;
        async move {
            fs::create_dir_all(&paths.execution_data_dir).await?;
            fs::create_dir_all(&paths.keystore_dir).await?;

            let password = keystore_password(paths.index);
            fs::write_private(&paths.password, format!("{password}\n")).await?;
            fs::write_private(&paths.private_key, format!("{}\n", *account.private_key_hex()))
                .await?;
            fs::write(&paths.address, format!("{}\n", account.address())).await?;

            let keystore = {
                let dir = paths.keystore_dir.clone();
                let account = account.clone();
                tokio::task::spawn_blocking(move || Keystore::write(&dir, &account, &password))
                    .await??
            };

            fs::write(&paths.execution_genesis, genesis).await?;
            tracing::debug!(node = paths.index, address = %account.address(), "Wrote signer files");

            Ok::<_, DevnetError>(SignerFiles {
                index: paths.index,
                address: account.address(),
                keystore,
            })
        }
    });

    let files = try_join_all(writes).await?;
    tracing::info!(nodes = files.len(), "Execution keystores and genesis written");
    Ok(files)
}
