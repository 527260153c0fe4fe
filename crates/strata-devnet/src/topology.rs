//! Peer topology: addresses, discovery URIs and the static peer list.

use crate::error::{DevnetError, Result};
use crate::fs;
use crate::layout::Layout;
use crate::request::{DeploymentMode, DevnetRequest};
use futures::future::try_join_all;
use strata_keys::NetworkKey;

/// URI scheme of discovery records.
pub const DISCOVERY_SCHEME: &str = "enode";
/// Peer-to-peer port of the execution layer.
pub const PEER_PORT: u16 = 30303;
/// JSON-RPC port of the execution layer.
pub const EXECUTION_RPC_PORT: u16 = 8545;
/// Host every remote node uses to reach its own services.
pub const LOOPBACK_HOST: &str = "localhost";

/// First three octets of co-located execution addresses.
pub const COLOCATED_SUBNET: &str = "172.20.1";
/// Offset added to the node index to form the last octet.
pub const COLOCATED_HOST_OFFSET: usize = 100;
/// Largest co-located devnet whose last octet stays within 255.
pub const MAX_COLOCATED_NODES: usize = 256 - COLOCATED_HOST_OFFSET;

/// Host prefix the consensus testnet tool uses for peers; co-located
/// consensus services are named `<prefix><i>`.
pub const CONSENSUS_HOST_PREFIX: &str = "consensus";

/// Co-located service name of node `index`'s execution client.
#[must_use]
pub fn execution_service(index: usize) -> String {
    format!("execution{index}")
}

/// Co-located service name of node `index`'s consensus client.
#[must_use]
pub fn consensus_service(index: usize) -> String {
    format!("{CONSENSUS_HOST_PREFIX}{index}")
}

/// Co-located service name of node `index`'s message broker.
#[must_use]
pub fn broker_service(index: usize) -> String {
    format!("broker{index}")
}

/// Synthetic private address of node `index` in co-located mode.
#[must_use]
pub fn colocated_address(index: usize) -> String {
    format!("{COLOCATED_SUBNET}.{}", index + COLOCATED_HOST_OFFSET)
}

/// A node's network identity.
#[derive(Debug, Clone)]
pub struct NetworkIdentity {
    /// Node index.
    pub index: usize,
    /// Peer-discovery key.
    pub key: NetworkKey,
}

/// Generates one fresh network identity per node.
#[must_use]
pub fn generate_identities(count: usize) -> Vec<NetworkIdentity> {
    (0..count)
        .map(|index| NetworkIdentity {
            index,
            key: NetworkKey::generate(),
        })
        .collect()
}

/// Formats a discovery URI.
#[must_use]
pub fn discovery_uri(public_id: &str, host: &str, port: u16) -> String {
    format!("{DISCOVERY_SCHEME}://{public_id}@{host}:{port}")
}

/// Addressing for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePeer {
    /// Node index.
    pub index: usize,
    /// Address other execution nodes dial.
    pub execution_host: String,
    /// Address other consensus nodes dial.
    pub consensus_host: String,
    /// Discovery URI of the node.
    pub discovery_uri: String,
}

/// Peer addresses and discovery URIs for all nodes, index-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    peers: Vec<NodePeer>,
}

impl Topology {
    /// Computes the topology for `request` from the nodes' identities.
    ///
    /// # Errors
    ///
    /// Fails if the request is invalid for its mode or the identity count
    /// differs from the node count. Nothing is written.
    pub fn build(request: &DevnetRequest, identities: &[NetworkIdentity]) -> Result<Self> {
        request.validate()?;
        let total = request.total_nodes();
        if identities.len() != total {
            return Err(DevnetError::Precondition(format!(
                "expected {total} network identities, got {}",
                identities.len()
            )));
        }

        let peers = identities
            .iter()
            .enumerate()
            .map(|(i, identity)| {
                let (execution_host, consensus_host) = match &request.mode {
                    DeploymentMode::CoLocated => (colocated_address(i), consensus_service(i)),
                    DeploymentMode::Remote { hosts } => (hosts[i].clone(), hosts[i].clone()),
                };
                let discovery_uri =
                    discovery_uri(&identity.key.public_id(), &execution_host, PEER_PORT);
                NodePeer {
                    index: i,
                    execution_host,
                    consensus_host,
                    discovery_uri,
                }
            })
            .collect();

        Ok(Self { peers })
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the topology is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Per-node addressing, in index order.
    #[must_use]
    pub fn peers(&self) -> &[NodePeer] {
        &self.peers
    }

    /// Addressing of node `index`.
    #[must_use]
    pub fn peer(&self, index: usize) -> Option<&NodePeer> {
        self.peers.get(index)
    }

    /// Execution peer addresses, in index order.
    #[must_use]
    pub fn peer_addresses(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.execution_host.as_str()).collect()
    }

    /// Consensus peer hosts, in index order.
    #[must_use]
    pub fn consensus_hosts(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.consensus_host.as_str()).collect()
    }

    /// Discovery URIs, in index order.
    #[must_use]
    pub fn discovery_uris(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.discovery_uri.as_str()).collect()
    }

    /// The static peer document shared by every node.
    ///
    /// Each node lists every node, itself included.
    #[must_use]
    pub fn static_nodes_json(&self) -> String {
        // A Vec<&str> always serializes.
        serde_json::to_string_pretty(&self.discovery_uris()).unwrap_or_default()
    }

    /// Writes identity, discovery and static peer files for every node.
    ///
    /// Per-node writes run concurrently; the call returns once all nodes are
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns the first I/O failure.
    pub async fn persist(&self, layout: &Layout, identities: &[NetworkIdentity]) -> Result<()> {
        let static_nodes = self.static_nodes_json();

        let writes = self.peers.iter().zip(identities).map(|(peer, identity)| {
            let paths = layout.node(peer.index);
            let static_nodes = &static_nodes;
            async move {
                fs::create_dir_all(&paths.execution_dir).await?;
                fs::write_private(&paths.node_key, format!("{}\n", *identity.key.secret_hex()))
                    .await?;
                fs::write_private(&paths.enode, format!("{}\n", peer.discovery_uri)).await?;
                fs::write_private(&paths.static_nodes, static_nodes).await?;
                tracing::debug!(node = peer.index, uri = %peer.discovery_uri, "Wrote network identity");
                Ok::<_, DevnetError>(())
            }
        });
        try_join_all(writes).await?;

        tracing::info!(nodes = self.len(), "Network identities persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn colocated(n: usize) -> DevnetRequest {
        DevnetRequest::new(n, 0, DeploymentMode::CoLocated, "/tmp/unused")
    }

    #[test]
    fn colocated_addresses_are_offset_by_index() {
        let ids = generate_identities(2);
        let topo = Topology::build(&colocated(2), &ids).unwrap();
        assert_eq!(topo.peer_addresses(), vec!["172.20.1.100", "172.20.1.101"]);
        assert_eq!(topo.consensus_hosts(), vec!["consensus0", "consensus1"]);
    }

    #[test]
    fn remote_addresses_come_from_hosts() {
        let req = DevnetRequest::new(
            1,
            1,
            DeploymentMode::remote(["10.0.0.5", "10.0.0.9"]),
            "/tmp/unused",
        );
        let ids = generate_identities(2);
        let topo = Topology::build(&req, &ids).unwrap();
        assert_eq!(topo.peer_addresses(), vec!["10.0.0.5", "10.0.0.9"]);
        assert_eq!(topo.consensus_hosts(), vec!["10.0.0.5", "10.0.0.9"]);
    }

    #[test]
    fn discovery_uri_embeds_public_id_and_address() {
        let ids = generate_identities(1);
        let topo = Topology::build(&colocated(1), &ids).unwrap();
        assert_eq!(
            topo.discovery_uris()[0],
            format!("enode://{}@172.20.1.100:30303", ids[0].key.public_id())
        );
    }

    #[test]
    fn host_count_mismatch_is_rejected() {
        let req = DevnetRequest::new(2, 0, DeploymentMode::remote(["a"]), "/tmp/unused");
        let ids = generate_identities(2);
        assert!(matches!(
            Topology::build(&req, &ids),
            Err(DevnetError::Precondition(_))
        ));
    }

    #[test]
    fn host_with_trailing_dot_is_rejected() {
        let req = DevnetRequest::new(1, 0, DeploymentMode::remote(["node1.example."]), "/tmp/unused");
        let ids = generate_identities(1);
        assert!(matches!(
            Topology::build(&req, &ids),
            Err(DevnetError::Precondition(_))
        ));
    }

    #[test]
    fn identity_count_mismatch_is_rejected() {
        let ids = generate_identities(1);
        assert!(Topology::build(&colocated(2), &ids).is_err());
    }

    #[test]
    fn static_nodes_lists_every_node() {
        let ids = generate_identities(3);
        let topo = Topology::build(&colocated(3), &ids).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&topo.static_nodes_json()).unwrap();
        assert_eq!(parsed, topo.discovery_uris());
    }

    #[test]
    fn largest_colocated_network_stays_in_octet() {
        assert_eq!(colocated_address(MAX_COLOCATED_NODES - 1), "172.20.1.255");
    }

    proptest! {
        #[test]
        fn prop_topology_is_index_aligned(validators in 0usize..20, others in 0usize..20) {
            prop_assume!(validators + others > 0);
            let req = DevnetRequest::new(validators, others, DeploymentMode::CoLocated, "/tmp/unused");
            let ids = generate_identities(req.total_nodes());
            let topo = Topology::build(&req, &ids).unwrap();

            prop_assert_eq!(topo.len(), req.total_nodes());
            prop_assert_eq!(topo.peer_addresses().len(), req.total_nodes());
            prop_assert_eq!(topo.discovery_uris().len(), req.total_nodes());
            for (peer, id) in topo.peers().iter().zip(&ids) {
                prop_assert_eq!(peer.index, id.index);
                prop_assert!(peer.discovery_uri.contains(&id.key.public_id()));
                prop_assert!(peer.discovery_uri.contains(&peer.execution_host));
            }
        }

        #[test]
        fn prop_remote_hosts_are_used_verbatim(hosts in prop::collection::vec("[a-z]([a-z0-9.-]{0,14}[a-z0-9])?", 1..12)) {
            let req = DevnetRequest::new(hosts.len(), 0, DeploymentMode::remote(&hosts), "/tmp/unused");
            let ids = generate_identities(hosts.len());
            let topo = Topology::build(&req, &ids).unwrap();
            let expected: Vec<&str> = hosts.iter().map(String::as_str).collect();
            prop_assert_eq!(topo.peer_addresses(), expected);
        }
    }
}
