//! # Strata Devnet
//!
//! Generates the on-disk topology of a two-layer devnet: a consensus layer
//! driven through an external `create-testnet` binary, and a geth-style
//! execution layer.
//!
//! A [`Pipeline`] takes an immutable [`DevnetRequest`] and runs a fixed list
//! of stages against an empty output root:
//!
//! 1. validate the request,
//! 2. load one signer account per node,
//! 3. generate network identities and write discovery and static peer files,
//! 4. obtain the consensus binary and create the consensus testnet,
//! 5. rewire consensus peers and patch the shared genesis,
//! 6. generate the execution genesis and seal keystores,
//! 7. patch per-node endpoints and render the deployment tree for the
//!    [`DeploymentMode`].
//!
//! Every path is resolved through [`Layout`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_devnet::{DeploymentMode, DevnetRequest, Pipeline, PrebuiltBinary};
//!
//! # async fn run() -> strata_devnet::Result<()> {
//! let request = DevnetRequest::new(2, 0, DeploymentMode::CoLocated, "devnet");
//! let summary = Pipeline::new(request, PrebuiltBinary::new("/usr/local/bin/consensusd"))
//!     .run()
//!     .await?;
//! for node in &summary.nodes {
//!     println!("node{} {}", node.index, node.discovery_uri);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod endpoints;
pub mod error;
pub mod external;
mod fs;
pub mod genesis;
pub mod layout;
pub mod patch;
pub mod pipeline;
pub mod render;
pub mod request;
pub mod signing;
pub mod templates;
pub mod topology;

pub use endpoints::NodeEndpoints;
pub use error::{DevnetError, Result};
pub use external::{
    AccountSource, BinaryProvider, DefaultExecutionGenesis, ExecutionGenesisSource,
    ExecutionGenesisTemplate, GeneratedAccounts, PrebuiltBinary, SignerDump, SourceBuild,
};
pub use genesis::{ConsensusGenesis, GenesisCoordinator};
pub use layout::{Layout, NodePaths};
pub use pipeline::{plan, DevnetSummary, Pipeline, Stage, StageObserver, TracingObserver};
pub use render::{RenderReport, Renderer};
pub use request::{DeploymentMode, DevnetRequest, RootContracts};
pub use templates::{DevnetView, NodeSummary, NodeView};
pub use topology::{NetworkIdentity, NodePeer, Topology};
