//! The ordered stage pipeline.
//!
//! Stages run strictly one after another. A failing stage aborts the run;
//! files already written stay where they are, and the recovery path is to
//! delete the output root and run again.

use crate::endpoints::patch_network_configs;
use crate::error::{DevnetError, Result};
use crate::external::{
    AccountSource, BinaryProvider, DefaultExecutionGenesis, ExecutionGenesisSource,
    GeneratedAccounts,
};
use crate::genesis::{ConsensusGenesis, GenesisCoordinator};
use crate::layout::Layout;
use crate::render::{RenderReport, Renderer};
use crate::request::{DeploymentMode, DevnetRequest};
use crate::signing::{write_signer_files, SignerFiles};
use crate::templates::{DevnetView, NodeSummary};
use crate::topology::{generate_identities, Topology};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_keys::{Account, Address};
use tracing::{error, info, Instrument};

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Precondition checks, before any I/O.
    ValidateRequest,
    /// One signer account per node from the account source.
    LoadAccounts,
    /// Node keys, discovery URIs and static peer files.
    NetworkIdentities,
    /// Obtaining the consensus binary.
    BuildConsensusBinary,
    /// `create-testnet`, peer rewiring and the shared consensus genesis.
    CreateConsensusTestnet,
    /// The execution genesis for the validator set.
    ExecutionGenesis,
    /// Keystores, signer files and execution genesis copies.
    ExecutionKeystores,
    /// Service-name endpoints for co-located nodes.
    ColocatedConsensusConfigs,
    /// The shared co-located deployment tree.
    ColocatedTemplates,
    /// Loopback endpoints for remote nodes.
    RemoteConsensusConfigs,
    /// Per-node remote deployment scripts.
    RemoteTemplates,
}

impl Stage {
    /// Stages run in every mode, in order.
    pub const COMMON: [Stage; 7] = [
        Stage::ValidateRequest,
        Stage::LoadAccounts,
        Stage::NetworkIdentities,
        Stage::BuildConsensusBinary,
        Stage::CreateConsensusTestnet,
        Stage::ExecutionGenesis,
        Stage::ExecutionKeystores,
    ];

    /// Human-readable title.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::ValidateRequest => "Validate devnet request",
            Self::LoadAccounts => "Load signer accounts",
            Self::NetworkIdentities => "Setup network identities",
            Self::BuildConsensusBinary => "Build consensus binary",
            Self::CreateConsensusTestnet => "Create consensus testnet files",
            Self::ExecutionGenesis => "Generate execution genesis",
            Self::ExecutionKeystores => "Setup execution keystore and genesis files",
            Self::ColocatedConsensusConfigs | Self::RemoteConsensusConfigs => {
                "Process consensus configs"
            }
            Self::ColocatedTemplates | Self::RemoteTemplates => "Process templates",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The stages run for `mode`: the common stages followed by that mode's
/// branch.
#[must_use]
pub fn plan(mode: &DeploymentMode) -> Vec<Stage> {
    let branch = match mode {
        DeploymentMode::CoLocated => [Stage::ColocatedConsensusConfigs, Stage::ColocatedTemplates],
        DeploymentMode::Remote { .. } => [Stage::RemoteConsensusConfigs, Stage::RemoteTemplates],
    };
    Stage::COMMON.into_iter().chain(branch).collect()
}

/// Receives stage progress.
pub trait StageObserver: Send + Sync {
    /// Called before `stage` runs.
    fn stage_started(&self, stage: Stage);
    /// Called after `stage` completed.
    fn stage_succeeded(&self, stage: Stage, elapsed: Duration);
    /// Called when `stage` failed; no later stage runs.
    fn stage_failed(&self, stage: Stage, error: &DevnetError);
}

/// Logs stage progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn stage_started(&self, stage: Stage) {
        info!(stage = %stage, "Stage started");
    }

    fn stage_succeeded(&self, stage: Stage, elapsed: Duration) {
        info!(stage = %stage, elapsed_ms = elapsed.as_millis() as u64, "Stage finished");
    }

    fn stage_failed(&self, stage: Stage, error: &DevnetError) {
        error!(stage = %stage, error = %error, "Stage failed");
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct DevnetSummary {
    /// Output root.
    pub root: PathBuf,
    /// Deployment mode.
    pub mode: DeploymentMode,
    /// Per-node summary, in index order.
    pub nodes: Vec<NodeSummary>,
    /// Keystore written for each node, in index order.
    pub keystores: Vec<PathBuf>,
    /// What the template stage wrote.
    pub rendered: RenderReport,
}

#[derive(Default)]
struct RunState {
    accounts: Option<Vec<Account>>,
    topology: Option<Topology>,
    binary: Option<PathBuf>,
    consensus_genesis: Option<ConsensusGenesis>,
    execution_genesis: Option<Value>,
    signers: Option<Vec<SignerFiles>>,
    rendered: Option<RenderReport>,
}

fn require<'s, T>(slot: &'s Option<T>, stage: Stage, missing: &'static str) -> Result<&'s T> {
    slot.as_ref().ok_or(DevnetError::StageOrder {
        stage: stage.title(),
        missing,
    })
}

/// Provisions one devnet from a request.
pub struct Pipeline {
    request: DevnetRequest,
    binary: Box<dyn BinaryProvider>,
    accounts: Box<dyn AccountSource>,
    execution_genesis: Box<dyn ExecutionGenesisSource>,
    observer: Arc<dyn StageObserver>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline with generated accounts, the default execution
    /// genesis and tracing progress.
    pub fn new(request: DevnetRequest, binary: impl BinaryProvider + 'static) -> Self {
        Self {
            request,
            binary: Box::new(binary),
            accounts: Box::new(GeneratedAccounts),
            execution_genesis: Box::new(DefaultExecutionGenesis),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Uses `source` for signer accounts.
    #[must_use]
    pub fn with_accounts(mut self, source: impl AccountSource + 'static) -> Self {
        self.accounts = Box::new(source);
        self
    }

    /// Uses `source` for the execution genesis.
    #[must_use]
    pub fn with_execution_genesis(mut self, source: impl ExecutionGenesisSource + 'static) -> Self {
        self.execution_genesis = Box::new(source);
        self
    }

    /// Reports stage progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The request this pipeline provisions.
    #[must_use]
    pub fn request(&self) -> &DevnetRequest {
        &self.request
    }

    /// The stages [`Pipeline::run`] will execute.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        plan(&self.request.mode)
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage; later stages do not
    /// run.
    pub async fn run(&self) -> Result<DevnetSummary> {
        let layout = Layout::new(&self.request.root, self.request.total_nodes());
        let mut state = RunState::default();

        info!(
            root = %layout.root().display(),
            mode = self.request.mode.name(),
            validators = self.request.validators,
            non_validators = self.request.non_validators,
            "Provisioning devnet"
        );

        for stage in self.stages() {
            self.observer.stage_started(stage);
            let started = Instant::now();
            let span = tracing::info_span!("stage", name = stage.title());
            match self.run_stage(stage, &layout, &mut state).instrument(span).await {
                Ok(()) => self.observer.stage_succeeded(stage, started.elapsed()),
                Err(e) => {
                    self.observer.stage_failed(stage, &e);
                    return Err(e);
                }
            }
        }

        self.summarize(state)
    }

    async fn run_stage(&self, stage: Stage, layout: &Layout, state: &mut RunState) -> Result<()> {
        let request = &self.request;
        let total = request.total_nodes();

        match stage {
            Stage::ValidateRequest => request.validate(),

            Stage::LoadAccounts => {
                let mut accounts = self.accounts.accounts(total).await?;
                if accounts.len() < total {
                    return Err(DevnetError::Precondition(format!(
                        "account source returned {} accounts for {total} nodes",
                        accounts.len()
                    )));
                }
                accounts.truncate(total);
                state.accounts = Some(accounts);
                Ok(())
            }

            Stage::NetworkIdentities => {
                let identities = generate_identities(total);
                let topology = Topology::build(request, &identities)?;
                topology.persist(layout, &identities).await?;
                state.topology = Some(topology);
                Ok(())
            }

            Stage::BuildConsensusBinary => {
                let binary = self.binary.ensure_built().await?;
                info!(binary = %binary.display(), "Consensus binary ready");
                state.binary = Some(binary);
                Ok(())
            }

            Stage::CreateConsensusTestnet => {
                let topology = require(&state.topology, stage, "a topology")?;
                let binary = require(&state.binary, stage, "a consensus binary")?;
                let genesis = GenesisCoordinator::new(request, layout, topology)
                    .run(binary)
                    .await?;
                state.consensus_genesis = Some(genesis);
                Ok(())
            }

            Stage::ExecutionGenesis => {
                let accounts = require(&state.accounts, stage, "signer accounts")?;
                let chain_id: u64 = request.execution_chain_id.parse().map_err(|_| {
                    DevnetError::Precondition(format!(
                        "execution chain id {:?} is not a number",
                        request.execution_chain_id
                    ))
                })?;
                let validators: Vec<Address> = accounts
                    .iter()
                    .take(request.validators)
                    .map(Account::address)
                    .collect();
                let genesis = self.execution_genesis.genesis(chain_id, &validators).await?;
                state.execution_genesis = Some(genesis);
                Ok(())
            }

            Stage::ExecutionKeystores => {
                let accounts = require(&state.accounts, stage, "signer accounts")?;
                let genesis = require(&state.execution_genesis, stage, "an execution genesis")?;
                let signers = write_signer_files(layout, accounts, genesis).await?;
                state.signers = Some(signers);
                Ok(())
            }

            Stage::ColocatedConsensusConfigs | Stage::RemoteConsensusConfigs => {
                require(&state.consensus_genesis, stage, "consensus testnet files")?;
                patch_network_configs(request, layout).await
            }

            Stage::ColocatedTemplates | Stage::RemoteTemplates => {
                let view = self.devnet_view(stage, state)?;
                let renderer = Renderer::new(layout);
                let report = if stage == Stage::ColocatedTemplates {
                    renderer.render_colocated(&view).await?
                } else {
                    renderer.render_remote(&view).await?
                };
                state.rendered = Some(report);
                Ok(())
            }
        }
    }

    fn node_summaries(&self, stage: Stage, state: &RunState) -> Result<Vec<NodeSummary>> {
        let topology = require(&state.topology, stage, "a topology")?;
        let accounts = require(&state.accounts, stage, "signer accounts")?;
        Ok(topology
            .peers()
            .iter()
            .zip(accounts)
            .map(|(peer, account)| NodeSummary::new(&self.request, peer, account.address()))
            .collect())
    }

    fn devnet_view(&self, stage: Stage, state: &RunState) -> Result<DevnetView> {
        Ok(DevnetView::new(&self.request, self.node_summaries(stage, state)?))
    }

    fn summarize(&self, state: RunState) -> Result<DevnetSummary> {
        let stage = Stage::ExecutionKeystores;
        let nodes = self.node_summaries(stage, &state)?;
        let keystores = require(&state.signers, stage, "signer files")?
            .iter()
            .map(|s| s.keystore.clone())
            .collect();
        Ok(DevnetSummary {
            root: self.request.root.clone(),
            mode: self.request.mode.clone(),
            nodes,
            keystores,
            rendered: state.rendered.unwrap_or_default(),
        })
    }
}
