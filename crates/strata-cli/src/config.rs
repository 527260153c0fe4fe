//! Devnet configuration intake and persistence.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`strata.toml` by default, optional),
//! 3. `STRATA_*` environment variables (`__` separates nested keys, e.g.
//!    `STRATA_CONSENSUS__BRANCH`),
//! 4. command-line flags.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_devnet::topology::MAX_COLOCATED_NODES;
use strata_devnet::{DeploymentMode, DevnetRequest, RootContracts};
use validator::{Validate, ValidationError};

/// Default configuration file name, also used when saving.
pub const CONFIG_FILE: &str = "strata.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "STRATA";

/// Deployment mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModeKind {
    /// All nodes as containers on this host.
    #[default]
    CoLocated,
    /// One node per remote host.
    Remote,
}

/// Where the consensus binary comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsensusBinaryConfig {
    /// A prebuilt binary. When set, nothing is cloned or built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Repository to build from.
    #[validate(length(min = 1))]
    pub repository: String,
    /// Branch to build.
    #[validate(length(min = 1))]
    pub branch: String,
    /// Name of the built binary.
    #[validate(length(min = 1))]
    pub binary_name: String,
    /// Checkout directory; defaults to `<output_dir>/code/consensus`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_dir: Option<PathBuf>,
}

impl Default for ConsensusBinaryConfig {
    fn default() -> Self {
        Self {
            binary: None,
            repository: "https://github.com/strata-devnet/consensusd".to_string(),
            branch: "main".to_string(),
            binary_name: "consensusd".to_string(),
            checkout_dir: None,
        }
    }
}

/// The resolved devnet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_node_counts"))]
pub struct DevnetConfig {
    /// Number of validator nodes.
    pub validators: usize,
    /// Number of non-validator nodes.
    pub non_validators: usize,
    /// Deployment mode.
    pub mode: ModeKind,
    /// Remote hosts, one per node. Prompted for when empty in remote mode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Execution-layer chain id.
    #[validate(length(min = 1))]
    pub execution_chain_id: String,
    /// Consensus-layer chain id.
    #[validate(length(min = 1))]
    pub consensus_chain_id: String,
    /// Root-chain RPC URL watched by consensus nodes.
    #[validate(url)]
    pub root_rpc_url: String,
    /// Message-broker URL template.
    #[validate(contains(pattern = "{host}"))]
    pub broker_url_template: String,
    /// Output root.
    pub output_dir: PathBuf,
    /// Signer dump to take accounts from instead of generating them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_dump: Option<PathBuf>,
    /// Execution genesis template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_genesis: Option<PathBuf>,
    /// Consensus binary source.
    #[validate(nested)]
    pub consensus: ConsensusBinaryConfig,
    /// Root-chain contracts to patch into the consensus genesis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_contracts: Option<RootContracts>,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            validators: 2,
            non_validators: 0,
            mode: ModeKind::default(),
            hosts: Vec::new(),
            execution_chain_id: DevnetRequest::DEFAULT_EXECUTION_CHAIN_ID.to_string(),
            consensus_chain_id: DevnetRequest::DEFAULT_CONSENSUS_CHAIN_ID.to_string(),
            root_rpc_url: DevnetRequest::DEFAULT_ROOT_RPC_URL.to_string(),
            broker_url_template: DevnetRequest::DEFAULT_BROKER_URL_TEMPLATE.to_string(),
            output_dir: PathBuf::from("devnet"),
            signer_dump: None,
            execution_genesis: None,
            consensus: ConsensusBinaryConfig::default(),
            root_contracts: None,
        }
    }
}

fn validate_node_counts(config: &DevnetConfig) -> std::result::Result<(), ValidationError> {
    let Some(total) = config.validators.checked_add(config.non_validators) else {
        return Err(ValidationError::new("node_count_overflow"));
    };
    if total == 0 {
        return Err(ValidationError::new("empty_devnet"));
    }
    if config.mode == ModeKind::CoLocated && total > MAX_COLOCATED_NODES {
        return Err(ValidationError::new("too_many_colocated_nodes"));
    }
    Ok(())
}

/// Command-line values that override every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub validators: Option<usize>,
    pub non_validators: Option<usize>,
    pub mode: Option<ModeKind>,
    pub hosts: Option<Vec<String>>,
    pub execution_chain_id: Option<String>,
    pub consensus_chain_id: Option<String>,
    pub root_rpc_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub consensus_binary: Option<PathBuf>,
    pub signer_dump: Option<PathBuf>,
    pub execution_genesis: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut DevnetConfig) {
        if let Some(v) = self.validators {
            config.validators = v;
        }
        if let Some(n) = self.non_validators {
            config.non_validators = n;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(hosts) = self.hosts {
            config.hosts = hosts;
        }
        if let Some(id) = self.execution_chain_id {
            config.execution_chain_id = id;
        }
        if let Some(id) = self.consensus_chain_id {
            config.consensus_chain_id = id;
        }
        if let Some(url) = self.root_rpc_url {
            config.root_rpc_url = url;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.consensus_binary.is_some() {
            config.consensus.binary = self.consensus_binary;
        }
        if self.signer_dump.is_some() {
            config.signer_dump = self.signer_dump;
        }
        if self.execution_genesis.is_some() {
            config.execution_genesis = self.execution_genesis;
        }
    }
}

impl DevnetConfig {
    /// Loads the layered configuration.
    ///
    /// A missing `path` is only an error when `required` is set.
    pub fn load(path: &Path, required: bool, overrides: Overrides) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("hosts"),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        let mut config: DevnetConfig = settings
            .try_deserialize()
            .context("invalid devnet configuration")?;
        overrides.apply(&mut config);
        config.normalise_hosts();
        Ok(config)
    }

    /// Total number of nodes, saturating on overflow.
    pub fn total_nodes(&self) -> usize {
        self.validators.saturating_add(self.non_validators)
    }

    fn normalise_hosts(&mut self) {
        self.hosts = self
            .hosts
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
    }

    /// Whether remote hosts still have to be asked for.
    pub fn needs_hosts(&self) -> bool {
        self.mode == ModeKind::Remote && self.hosts.is_empty()
    }

    /// Checks field constraints and the remote host count.
    pub fn check(&self) -> Result<()> {
        self.validate().context("invalid devnet configuration")?;
        if self.mode == ModeKind::Remote && self.hosts.len() != self.total_nodes() {
            bail!(
                "remote mode needs exactly {} hosts, got {}",
                self.total_nodes(),
                self.hosts.len()
            );
        }
        Ok(())
    }

    /// Builds the pipeline request.
    pub fn to_request(&self) -> DevnetRequest {
        let mode = match self.mode {
            ModeKind::CoLocated => DeploymentMode::CoLocated,
            ModeKind::Remote => DeploymentMode::remote(&self.hosts),
        };
        let request = DevnetRequest::new(self.validators, self.non_validators, mode, &self.output_dir)
            .with_chain_ids(&self.execution_chain_id, &self.consensus_chain_id)
            .with_root_rpc_url(&self.root_rpc_url)
            .with_broker_url_template(&self.broker_url_template);
        match &self.root_contracts {
            Some(contracts) => request.with_root_contracts(contracts.clone()),
            None => request,
        }
    }

    /// Checkout directory for source builds.
    pub fn checkout_dir(&self) -> PathBuf {
        self.consensus
            .checkout_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("code").join("consensus"))
    }

    /// Writes the configuration as TOML to `<output_dir>/strata.toml`.
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.output_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self).context("failed to encode configuration")?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
