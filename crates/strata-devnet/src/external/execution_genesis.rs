//! Execution-layer genesis sources.

use crate::error::{DevnetError, Result};
use crate::patch::read_json;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use strata_keys::Address;

/// Balance credited to each validator signer: 10^24 wei.
pub const VALIDATOR_BALANCE: &str = "0xd3c21bcecceda1000000";

/// Produces the execution-layer genesis document.
#[async_trait]
pub trait ExecutionGenesisSource: Send + Sync {
    /// Returns the genesis for `chain_id`, funding every validator signer.
    async fn genesis(&self, chain_id: u64, validators: &[Address]) -> Result<Value>;
}

fn alloc_entries(validators: &[Address]) -> Map<String, Value> {
    validators
        .iter()
        .map(|a| (a.to_hex(), json!({ "balance": VALIDATOR_BALANCE })))
        .collect()
}

/// A geth-style genesis with every fork active from block 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExecutionGenesis;

#[async_trait]
impl ExecutionGenesisSource for DefaultExecutionGenesis {
    async fn genesis(&self, chain_id: u64, validators: &[Address]) -> Result<Value> {
        Ok(json!({
            "config": {
                "chainId": chain_id,
                "homesteadBlock": 0,
                "eip150Block": 0,
                "eip155Block": 0,
                "eip158Block": 0,
                "byzantiumBlock": 0,
                "constantinopleBlock": 0,
                "petersburgBlock": 0,
                "istanbulBlock": 0,
                "berlinBlock": 0,
                "londonBlock": 0
            },
            "nonce": "0x0",
            "timestamp": "0x0",
            "extraData": "0x",
            "gasLimit": "0x1c9c380",
            "difficulty": "0x1",
            "mixHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "coinbase": "0x0000000000000000000000000000000000000000",
            "alloc": alloc_entries(validators),
            "number": "0x0",
            "gasUsed": "0x0",
            "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000"
        }))
    }
}

/// Loads a genesis document from a JSON file and fills in the chain id and
/// validator balances. Existing alloc entries win over generated ones.
#[derive(Debug, Clone)]
pub struct ExecutionGenesisTemplate {
    path: PathBuf,
}

impl ExecutionGenesisTemplate {
    /// Uses the template at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExecutionGenesisSource for ExecutionGenesisTemplate {
    async fn genesis(&self, chain_id: u64, validators: &[Address]) -> Result<Value> {
        let mut doc = read_json(&self.path).await?;
        let root = doc.as_object_mut().ok_or_else(|| {
            DevnetError::patch(&self.path, "genesis template is not a JSON object")
        })?;

        let config = root
            .entry("config")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| DevnetError::patch(&self.path, "`config` is not an object"))?;
        config.insert("chainId".to_string(), json!(chain_id));

        let alloc = root
            .entry("alloc")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| DevnetError::patch(&self.path, "`alloc` is not an object"))?;
        for (address, entry) in alloc_entries(validators) {
            alloc.entry(address).or_insert(entry);
        }

        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[tokio::test]
    async fn default_genesis_funds_validators() {
        let doc = DefaultExecutionGenesis
            .genesis(15001, &[addr(1), addr(2)])
            .await
            .unwrap();
        assert_eq!(doc["config"]["chainId"], 15001);
        let alloc = doc["alloc"].as_object().unwrap();
        assert_eq!(alloc.len(), 2);
        assert_eq!(alloc[&addr(1).to_hex()]["balance"], VALIDATOR_BALANCE);
    }

    #[tokio::test]
    async fn template_keeps_existing_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        let existing = addr(1).to_hex();
        std::fs::write(
            &path,
            format!(r#"{{"config":{{"chainId":1,"custom":true}},"alloc":{{"{existing}":{{"balance":"0x1"}}}}}}"#),
        )
        .unwrap();

        let doc = ExecutionGenesisTemplate::new(&path)
            .genesis(77, &[addr(1), addr(2)])
            .await
            .unwrap();
        assert_eq!(doc["config"]["chainId"], 77);
        assert_eq!(doc["config"]["custom"], true);
        assert_eq!(doc["alloc"][&existing]["balance"], "0x1");
        assert_eq!(doc["alloc"][&addr(2).to_hex()]["balance"], VALIDATOR_BALANCE);
    }

    #[tokio::test]
    async fn template_must_be_an_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        std::fs::write(&path, "[]").unwrap();
        let err = ExecutionGenesisTemplate::new(&path)
            .genesis(1, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DevnetError::Patch { .. }));
    }
}
