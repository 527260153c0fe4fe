//! Consensus testnet creation and genesis patching.
//!
//! The external consensus binary writes one config skeleton per node, each
//! holding a copy of the genesis bundle. The coordinator rewires every
//! node's peer list onto the topology's hosts, then patches node 0's bundle
//! once and publishes that document to every node.

use crate::error::{DevnetError, Result};
use crate::external::run_command;
use crate::fs;
use crate::layout::Layout;
use crate::patch::{
    edit_toml_string, patch_toml_file, read_json, set_json_strings, set_toml_string,
    to_json_pretty, TextPatch,
};
use crate::request::{DevnetRequest, RootContracts};
use crate::topology::{consensus_service, Topology, CONSENSUS_HOST_PREFIX};
use futures::future::try_join_all;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Subcommand of the consensus binary that writes testnet files.
pub const CREATE_TESTNET: &str = "create-testnet";

/// Genesis field holding the execution chain id.
pub const EXECUTION_CHAIN_ID_FIELD: &str = "execution_chain_id";

/// Genesis fields holding root-chain contract addresses, paired with the
/// contract each one names.
fn contract_fields(contracts: &RootContracts) -> [(&'static str, String); 5] {
    [
        ("token_address", contracts.token.to_string()),
        ("staking_manager_address", contracts.stake_manager_proxy.to_string()),
        ("root_chain_address", contracts.root_chain_proxy.to_string()),
        ("staking_info_address", contracts.staking_info.to_string()),
        ("state_sender_address", contracts.state_sender.to_string()),
    ]
}

/// Arguments of the `create-testnet` invocation for `request`.
#[must_use]
pub fn create_testnet_args(request: &DevnetRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        CREATE_TESTNET.to_string(),
        "--v".to_string(),
        request.validators.to_string(),
        "--n".to_string(),
        request.non_validators.to_string(),
        "--chain-id".to_string(),
        request.consensus_chain_id.clone(),
        "--node-host-prefix".to_string(),
        CONSENSUS_HOST_PREFIX.to_string(),
        "--output-dir".to_string(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(request.root.clone().into_os_string());
    args
}

/// Builds the patch mapping `<prefix><idx>:` peer hosts onto `hosts[idx]:`.
///
/// # Errors
///
/// Only fails if the generated pattern is invalid.
pub fn peer_host_patch(hosts: Vec<String>) -> std::result::Result<TextPatch, regex::Error> {
    let pattern = format!(r"{}(\d+):", regex::escape(CONSENSUS_HOST_PREFIX));
    TextPatch::new().replace_with(&pattern, move |caps| {
        let index: usize = caps[1]
            .parse()
            .map_err(|_| format!("peer index `{}` is not a number", &caps[1]))?;
        hosts
            .get(index)
            .map(|host| format!("{host}:"))
            .ok_or_else(|| format!("peer index {index} is outside the {} known hosts", hosts.len()))
    })
}

/// The patched consensus genesis bundle, published to every node.
#[derive(Debug, Clone)]
pub struct ConsensusGenesis {
    /// The patched document.
    pub document: Value,
    /// Per-node copies, in index order.
    pub copies: Vec<PathBuf>,
}

/// Drives the external binary and patches its output.
#[derive(Debug)]
pub struct GenesisCoordinator<'a> {
    request: &'a DevnetRequest,
    layout: &'a Layout,
    topology: &'a Topology,
}

impl<'a> GenesisCoordinator<'a> {
    /// Creates a coordinator for one pipeline run.
    pub fn new(request: &'a DevnetRequest, layout: &'a Layout, topology: &'a Topology) -> Self {
        Self {
            request,
            layout,
            topology,
        }
    }

    /// Creates the testnet files, patches every node's config and the shared
    /// genesis, and publishes it.
    ///
    /// # Errors
    ///
    /// Fails if the binary fails, its output is incomplete, or any patch
    /// fails.
    pub async fn run(&self, binary: &Path) -> Result<ConsensusGenesis> {
        self.create_testnet(binary).await?;
        self.patch_node_configs().await?;
        self.publish_genesis().await
    }

    /// Invokes `create-testnet` and checks that every node's config
    /// directory exists afterwards.
    ///
    /// # Errors
    ///
    /// Fails on a non-zero exit or a missing node directory.
    pub async fn create_testnet(&self, binary: &Path) -> Result<()> {
        let root = self.layout.root();
        fs::create_dir_all(root).await?;

        let args = create_testnet_args(self.request);
        let output = run_command(binary, &args, root).await?;
        tracing::debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            "create-testnet finished"
        );

        for paths in self.layout.nodes() {
            if tokio::fs::metadata(&paths.consensus_config_dir).await.is_err() {
                return Err(DevnetError::Precondition(format!(
                    "{CREATE_TESTNET} did not produce {}",
                    paths.consensus_config_dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Rewires each node's persistent peers onto the topology's consensus
    /// hosts and sets its moniker. Nodes are patched concurrently.
    ///
    /// Peers are substituted before the moniker is set.
    ///
    /// # Errors
    ///
    /// Fails if a config is unreadable, lacks `p2p.persistent_peers`, or
    /// names a peer index outside the topology.
    pub async fn patch_node_configs(&self) -> Result<()> {
        let hosts: Vec<String> = self
            .topology
            .consensus_hosts()
            .into_iter()
            .map(str::to_string)
            .collect();

        let patches = self.layout.nodes().map(|paths| {
            let hosts = hosts.clone();
            async move {
                let peers = peer_host_patch(hosts)
                    .map_err(|e| DevnetError::patch(&paths.consensus_config, e.to_string()))?;
                let changed = patch_toml_file(&paths.consensus_config, |config| {
                    edit_toml_string(config, "p2p.persistent_peers", |value| peers.apply(value))?;
                    set_toml_string(config, "moniker", consensus_service(paths.index))
                })
                .await?;
                tracing::debug!(node = paths.index, changed, "Patched consensus config");
                Ok::<_, DevnetError>(())
            }
        });
        try_join_all(patches).await?;
        Ok(())
    }

    /// Patches node 0's genesis and writes the result to every node.
    ///
    /// # Errors
    ///
    /// Fails if the genesis is unreadable or has no
    /// `execution_chain_id` field.
    pub async fn publish_genesis(&self) -> Result<ConsensusGenesis> {
        let source = self.layout.node(0).consensus_genesis;
        let mut document = read_json(&source).await?;

        if set_json_strings(&mut document, EXECUTION_CHAIN_ID_FIELD, &self.request.execution_chain_id) == 0 {
            return Err(DevnetError::patch(
                &source,
                format!("no `{EXECUTION_CHAIN_ID_FIELD}` field"),
            ));
        }
        if let Some(contracts) = &self.request.root_contracts {
            for (field, address) in contract_fields(contracts) {
                let count = set_json_strings(&mut document, field, &address);
                tracing::debug!(field, count, "Patched genesis contract address");
            }
        }

        let content = to_json_pretty(&source, &document)?;
        let mut copies = Vec::with_capacity(self.layout.len());
        for paths in self.layout.nodes() {
            fs::write(&paths.consensus_genesis, &content).await?;
            copies.push(paths.consensus_genesis);
        }

        tracing::info!(nodes = copies.len(), "Consensus genesis published");
        Ok(ConsensusGenesis { document, copies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::DeploymentMode;
    use crate::topology::generate_identities;
    use pretty_assertions::assert_eq;
    use strata_keys::Address;
    use tempfile::tempdir;

    #[test]
    fn create_testnet_args_follow_invocation_contract() {
        let request = DevnetRequest::new(2, 1, DeploymentMode::CoLocated, "/out");
        let args: Vec<String> = create_testnet_args(&request)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "create-testnet",
                "--v",
                "2",
                "--n",
                "1",
                "--chain-id",
                DevnetRequest::DEFAULT_CONSENSUS_CHAIN_ID,
                "--node-host-prefix",
                "consensus",
                "--output-dir",
                "/out",
            ]
        );
    }

    #[test]
    fn peer_patch_maps_indices_to_hosts() {
        let patch = peer_host_patch(vec!["10.0.0.5".into(), "10.0.0.9".into()]).unwrap();
        assert_eq!(
            patch.apply("aa@consensus0:26656,bb@consensus1:26656").unwrap(),
            "aa@10.0.0.5:26656,bb@10.0.0.9:26656"
        );
        assert!(patch.apply("aa@consensus2:26656").is_err());
    }

    async fn skeleton(root: &Path, nodes: usize) {
        for i in 0..nodes {
            let dir = root.join(format!("node{i}/consensus/config"));
            std::fs::create_dir_all(&dir).unwrap();
            let peers: Vec<String> = (0..nodes)
                .filter(|j| *j != i)
                .map(|j| format!("id{j}@consensus{j}:26656"))
                .collect();
            std::fs::write(
                dir.join("config.toml"),
                format!(
                    "moniker = \"generated\"\n\n[p2p]\npersistent_peers = \"{}\"\n",
                    peers.join(",")
                ),
            )
            .unwrap();
            std::fs::write(
                dir.join("genesis.json"),
                r#"{"chain_id":"devnet","app_state":{"chain":{"execution_chain_id":"0"},"contracts":{"token_address":"0x0"}}}"#,
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn patches_peers_moniker_and_genesis() {
        let dir = tempdir().unwrap();
        let request = DevnetRequest::new(
            2,
            0,
            DeploymentMode::remote(["10.0.0.5", "10.0.0.9"]),
            dir.path(),
        )
        .with_root_contracts(RootContracts {
            token: Address::from_bytes([1; 20]),
            stake_manager_proxy: Address::from_bytes([2; 20]),
            root_chain_proxy: Address::from_bytes([3; 20]),
            staking_info: Address::from_bytes([4; 20]),
            state_sender: Address::from_bytes([5; 20]),
        });
        let layout = Layout::new(dir.path(), 2);
        let topology = Topology::build(&request, &generate_identities(2)).unwrap();
        skeleton(dir.path(), 2).await;

        let coordinator = GenesisCoordinator::new(&request, &layout, &topology);
        coordinator.patch_node_configs().await.unwrap();
        let genesis = coordinator.publish_genesis().await.unwrap();

        let config: toml_edit::DocumentMut = std::fs::read_to_string(layout.node(1).consensus_config)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(config["moniker"].as_str(), Some("consensus1"));
        assert_eq!(
            config["p2p"]["persistent_peers"].as_str(),
            Some("id0@10.0.0.5:26656")
        );

        assert_eq!(
            genesis.document["app_state"]["chain"]["execution_chain_id"],
            DevnetRequest::DEFAULT_EXECUTION_CHAIN_ID
        );
        assert_eq!(
            genesis.document["app_state"]["contracts"]["token_address"],
            Address::from_bytes([1; 20]).to_string()
        );
        let first = std::fs::read(&genesis.copies[0]).unwrap();
        let second = std::fs::read(&genesis.copies[1]).unwrap();
        assert_eq!(first, second);

        // A second pass changes nothing.
        let before = std::fs::read(layout.node(0).consensus_config).unwrap();
        coordinator.patch_node_configs().await.unwrap();
        coordinator.publish_genesis().await.unwrap();
        assert_eq!(before, std::fs::read(layout.node(0).consensus_config).unwrap());
        assert_eq!(first, std::fs::read(&genesis.copies[0]).unwrap());
    }

    #[tokio::test]
    async fn genesis_without_chain_id_field_is_rejected() {
        let dir = tempdir().unwrap();
        let request = DevnetRequest::new(1, 0, DeploymentMode::CoLocated, dir.path());
        let layout = Layout::new(dir.path(), 1);
        let topology = Topology::build(&request, &generate_identities(1)).unwrap();
        let config_dir = layout.node(0).consensus_config_dir;
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(layout.node(0).consensus_genesis, r#"{"chain_id":"devnet"}"#).unwrap();

        let err = GenesisCoordinator::new(&request, &layout, &topology)
            .publish_genesis()
            .await
            .unwrap_err();
        assert!(matches!(err, DevnetError::Patch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_node_directory_fails_after_create_testnet() {
        let dir = tempdir().unwrap();
        let request = DevnetRequest::new(1, 0, DeploymentMode::CoLocated, dir.path());
        let layout = Layout::new(dir.path(), 1);
        let topology = Topology::build(&request, &generate_identities(1)).unwrap();

        // `true` ignores its arguments and writes nothing.
        let err = GenesisCoordinator::new(&request, &layout, &topology)
            .create_testnet(Path::new("true"))
            .await
            .unwrap_err();
        assert!(matches!(err, DevnetError::Precondition(_)));
    }
}
