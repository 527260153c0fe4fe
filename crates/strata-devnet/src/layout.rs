//! Path layout of a devnet output root.
//!
//! Every artifact location is resolved here. Nothing else in the crate joins
//! node paths by hand.

use std::path::{Path, PathBuf};

/// File name of the consensus genesis inside a node's config directory.
pub const GENESIS_FILE: &str = "genesis.json";

/// Locations of one node's artifacts under `<root>/node<i>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePaths {
    /// Node index.
    pub index: usize,
    /// `<root>/node<i>`.
    pub dir: PathBuf,

    /// Execution-layer directory.
    pub execution_dir: PathBuf,
    /// Execution-layer data directory.
    pub execution_data_dir: PathBuf,
    /// Directory holding the signing keystore.
    pub keystore_dir: PathBuf,
    /// Network identity private key.
    pub node_key: PathBuf,
    /// This node's discovery URI.
    pub enode: PathBuf,
    /// JSON array of every node's discovery URI.
    pub static_nodes: PathBuf,
    /// Keystore password.
    pub password: PathBuf,
    /// Signing private key.
    pub private_key: PathBuf,
    /// Signing address.
    pub address: PathBuf,
    /// Copy of the execution genesis.
    pub execution_genesis: PathBuf,

    /// Consensus-layer directory, produced by the external testnet tool.
    pub consensus_dir: PathBuf,
    /// Consensus config directory.
    pub consensus_config_dir: PathBuf,
    /// General node config (moniker, persistent peers).
    pub consensus_config: PathBuf,
    /// Network-parameters config (RPC and broker endpoints).
    pub network_config: PathBuf,
    /// This node's copy of the consensus genesis bundle.
    pub consensus_genesis: PathBuf,
}

impl NodePaths {
    /// Path of a keystore file with the given name.
    #[must_use]
    pub fn keystore_file(&self, name: &str) -> PathBuf {
        self.keystore_dir.join(name)
    }
}

/// Name of node `index`'s subtree.
#[must_use]
pub fn node_dir_name(index: usize) -> String {
    format!("node{index}")
}

/// Resolves the artifact locations for node `index` under `root`.
#[must_use]
pub fn resolve(root: &Path, index: usize) -> NodePaths {
    let dir = root.join(node_dir_name(index));
    let execution_dir = dir.join("execution");
    let consensus_dir = dir.join("consensus");
    let consensus_config_dir = consensus_dir.join("config");

    NodePaths {
        index,
        execution_data_dir: execution_dir.join("data"),
        keystore_dir: execution_dir.join("keystore"),
        node_key: execution_dir.join("nodekey"),
        enode: execution_dir.join("enode.txt"),
        static_nodes: execution_dir.join("static-nodes.json"),
        password: execution_dir.join("password.txt"),
        private_key: execution_dir.join("privatekey.txt"),
        address: execution_dir.join("address.txt"),
        execution_genesis: execution_dir.join(GENESIS_FILE),
        consensus_config: consensus_config_dir.join("config.toml"),
        network_config: consensus_config_dir.join("network.toml"),
        consensus_genesis: consensus_config_dir.join(GENESIS_FILE),
        consensus_config_dir,
        consensus_dir,
        execution_dir,
        dir,
    }
}

/// A devnet output root with a fixed node count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    nodes: usize,
}

impl Layout {
    /// Creates a layout for `nodes` nodes under `root`.
    pub fn new(root: impl Into<PathBuf>, nodes: usize) -> Self {
        Self {
            root: root.into(),
            nodes,
        }
    }

    /// The output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes
    }

    /// Whether the layout has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes == 0
    }

    /// Paths for node `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> NodePaths {
        resolve(&self.root, index)
    }

    /// Paths for every node, in index order.
    pub fn nodes(&self) -> impl Iterator<Item = NodePaths> + '_ {
        (0..self.nodes).map(|i| self.node(i))
    }

    /// Path of a file at the output root.
    #[must_use]
    pub fn root_file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolve_is_rooted_in_node_dir() {
        let paths = resolve(Path::new("/out"), 3);
        assert_eq!(paths.dir, PathBuf::from("/out/node3"));
        assert_eq!(paths.node_key, PathBuf::from("/out/node3/execution/nodekey"));
        assert_eq!(
            paths.static_nodes,
            PathBuf::from("/out/node3/execution/static-nodes.json")
        );
        assert_eq!(
            paths.consensus_config,
            PathBuf::from("/out/node3/consensus/config/config.toml")
        );
        assert_eq!(
            paths.consensus_genesis,
            PathBuf::from("/out/node3/consensus/config/genesis.json")
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        assert_eq!(resolve(Path::new("/a"), 7), resolve(Path::new("/a"), 7));
        assert_ne!(resolve(Path::new("/a"), 7), resolve(Path::new("/a"), 8));
    }

    #[test]
    fn every_artifact_lives_inside_its_node() {
        let paths = resolve(Path::new("/out"), 0);
        for p in [
            &paths.execution_data_dir,
            &paths.keystore_dir,
            &paths.enode,
            &paths.password,
            &paths.private_key,
            &paths.address,
            &paths.execution_genesis,
            &paths.network_config,
        ] {
            assert!(p.starts_with(&paths.dir), "{} escapes node dir", p.display());
        }
        assert_eq!(
            paths.keystore_file("UTC--x"),
            PathBuf::from("/out/node0/execution/keystore/UTC--x")
        );
    }

    #[test]
    fn layout_iterates_all_nodes() {
        let layout = Layout::new("/out", 3);
        let dirs: Vec<_> = layout.nodes().map(|p| p.dir).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/out/node0"),
                PathBuf::from("/out/node1"),
                PathBuf::from("/out/node2"),
            ]
        );
        assert_eq!(layout.root_file("docker-compose.yml"), PathBuf::from("/out/docker-compose.yml"));
    }
}
