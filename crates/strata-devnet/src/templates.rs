//! Render contexts and the askama templates that consume them.
//!
//! Contexts are assembled from the request, topology and signer accounts;
//! templates never see pipeline state beyond these values.

use crate::request::DevnetRequest;
use crate::topology::{
    broker_service, execution_service, NodePeer, COLOCATED_SUBNET, EXECUTION_RPC_PORT, PEER_PORT,
};
use askama::Template;
use serde::Serialize;
use strata_keys::Address;

/// Everything known about one node once the pipeline has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    /// Node index.
    pub index: usize,
    /// Whether the node is a validator.
    pub validator: bool,
    /// Execution-layer peer address.
    pub execution_host: String,
    /// Consensus-layer peer host.
    pub consensus_host: String,
    /// Co-located execution service name.
    pub execution_service: String,
    /// Co-located message broker service name.
    pub broker_service: String,
    /// Discovery URI of the node's execution client.
    pub discovery_uri: String,
    /// Signing address.
    pub signer: Address,
}

impl NodeSummary {
    /// Combines a node's addressing with its signer.
    #[must_use]
    pub fn new(request: &DevnetRequest, peer: &NodePeer, signer: Address) -> Self {
        Self {
            index: peer.index,
            validator: request.is_validator(peer.index),
            execution_host: peer.execution_host.clone(),
            consensus_host: peer.consensus_host.clone(),
            execution_service: execution_service(peer.index),
            broker_service: broker_service(peer.index),
            discovery_uri: peer.discovery_uri.clone(),
            signer,
        }
    }
}

/// Context for templates rendered once for the whole devnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevnetView {
    /// Execution-layer chain id.
    pub execution_chain_id: String,
    /// Consensus-layer chain id.
    pub consensus_chain_id: String,
    /// Root-chain RPC URL.
    pub root_rpc_url: String,
    /// Co-located container subnet in CIDR form.
    pub subnet: String,
    /// Execution peer-to-peer port.
    pub peer_port: u16,
    /// Execution HTTP RPC port.
    pub rpc_port: u16,
    /// Every node, in index order.
    pub nodes: Vec<NodeSummary>,
}

impl DevnetView {
    /// Builds the devnet context.
    #[must_use]
    pub fn new(request: &DevnetRequest, nodes: Vec<NodeSummary>) -> Self {
        Self {
            execution_chain_id: request.execution_chain_id.clone(),
            consensus_chain_id: request.consensus_chain_id.clone(),
            root_rpc_url: request.root_rpc_url.clone(),
            subnet: format!("{COLOCATED_SUBNET}.0/24"),
            peer_port: PEER_PORT,
            rpc_port: EXECUTION_RPC_PORT,
            nodes,
        }
    }

    /// Number of validator nodes.
    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.validator).count()
    }
}

/// Context for templates rendered once per node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    /// Node index.
    pub index: usize,
    /// Whether the node is a validator.
    pub validator: bool,
    /// The node's public host.
    pub host: String,
    /// Signing address, unlocked by the execution client.
    pub signer: Address,
    /// Execution-layer chain id.
    pub execution_chain_id: String,
    /// Consensus-layer chain id.
    pub consensus_chain_id: String,
    /// Discovery URIs of every other node, comma separated.
    pub bootnodes: String,
    /// Execution peer-to-peer port.
    pub peer_port: u16,
    /// Execution HTTP RPC port.
    pub rpc_port: u16,
}

impl NodeView {
    /// Builds the context of node `index`, or `None` if there is no such
    /// node.
    #[must_use]
    pub fn new(devnet: &DevnetView, index: usize) -> Option<Self> {
        let node = devnet.nodes.get(index)?;
        let bootnodes = devnet
            .nodes
            .iter()
            .filter(|n| n.index != index)
            .map(|n| n.discovery_uri.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Some(Self {
            index,
            validator: node.validator,
            host: node.execution_host.clone(),
            signer: node.signer,
            execution_chain_id: devnet.execution_chain_id.clone(),
            consensus_chain_id: devnet.consensus_chain_id.clone(),
            bootnodes,
            peer_port: devnet.peer_port,
            rpc_port: devnet.rpc_port,
        })
    }

    /// `validator` or `non-validator`.
    #[must_use]
    pub fn role(&self) -> &'static str {
        if self.validator {
            "validator"
        } else {
            "non-validator"
        }
    }
}

#[derive(Template)]
#[template(path = "colocated/docker-compose.yml", escape = "none")]
struct DockerCompose<'a> {
    devnet: &'a DevnetView,
}

#[derive(Template)]
#[template(path = "colocated/docker-start.sh", escape = "none")]
struct DockerStart<'a> {
    devnet: &'a DevnetView,
}

#[derive(Template)]
#[template(path = "remote/setup.sh", escape = "none")]
struct Setup<'a> {
    node: &'a NodeView,
}

#[derive(Template)]
#[template(path = "remote/start-execution.sh", escape = "none")]
struct StartExecution<'a> {
    node: &'a NodeView,
}

#[derive(Template)]
#[template(path = "remote/start-consensus.sh", escape = "none")]
struct StartConsensus<'a> {
    node: &'a NodeView,
}

pub(crate) fn docker_compose(devnet: &DevnetView) -> askama::Result<String> {
    DockerCompose { devnet }.render()
}

pub(crate) fn docker_start(devnet: &DevnetView) -> askama::Result<String> {
    DockerStart { devnet }.render()
}

pub(crate) fn setup(node: &NodeView) -> askama::Result<String> {
    Setup { node }.render()
}

pub(crate) fn start_execution(node: &NodeView) -> askama::Result<String> {
    StartExecution { node }.render()
}

pub(crate) fn start_consensus(node: &NodeView) -> askama::Result<String> {
    StartConsensus { node }.render()
}

pub(crate) const DOCKER_CLEAN: &str = include_str!("../templates/colocated/docker-clean.sh");
pub(crate) const CLEAN: &str = include_str!("../templates/remote/clean.sh");

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(index: usize, validator: bool) -> NodeSummary {
        NodeSummary {
            index,
            validator,
            execution_host: format!("10.0.0.{index}"),
            consensus_host: format!("10.0.0.{index}"),
            execution_service: execution_service(index),
            broker_service: broker_service(index),
            discovery_uri: format!("enode://{index}@10.0.0.{index}:30303"),
            signer: Address::from_bytes([index as u8; 20]),
        }
    }

    fn devnet() -> DevnetView {
        let request = DevnetRequest::new(
            1,
            1,
            crate::request::DeploymentMode::remote(["10.0.0.0", "10.0.0.1"]),
            "/out",
        );
        DevnetView::new(&request, vec![summary(0, true), summary(1, false)])
    }

    #[test]
    fn node_view_excludes_itself_from_bootnodes() {
        let view = NodeView::new(&devnet(), 1).unwrap();
        assert_eq!(view.bootnodes, "enode://0@10.0.0.0:30303");
        assert_eq!(view.role(), "non-validator");
        assert!(NodeView::new(&devnet(), 2).is_none());
    }

    #[test]
    fn compose_lists_every_node_service() {
        let out = docker_compose(&devnet()).unwrap();
        for name in ["execution0", "execution1", "consensus", "broker1"] {
            assert!(out.contains(name), "missing {name}");
        }
        assert!(out.contains("\n  broker0:\n"));
        assert!(out.contains("\n  execution1:\n"));
        assert!(out.contains("      - execution1\n      - broker1\n"));
        assert!(out.contains("172.20.1.0/24"));
        assert!(out.contains("2 nodes, 1 validators"));
    }

    #[test]
    fn only_validators_mine() {
        let devnet = devnet();
        let validator = start_execution(&NodeView::new(&devnet, 0).unwrap()).unwrap();
        let follower = start_execution(&NodeView::new(&devnet, 1).unwrap()).unwrap();
        assert!(validator.contains("--mine"));
        assert!(!follower.contains("--mine"));
        assert!(follower.contains("--nat extip:10.0.0.1"));
    }

    #[test]
    fn scripts_start_with_a_shebang() {
        let devnet = devnet();
        let node = NodeView::new(&devnet, 0).unwrap();
        for script in [
            docker_start(&devnet).unwrap(),
            setup(&node).unwrap(),
            start_consensus(&node).unwrap(),
            DOCKER_CLEAN.to_string(),
            CLEAN.to_string(),
        ] {
            assert!(script.starts_with("#!/usr/bin/env"));
        }
    }
}
