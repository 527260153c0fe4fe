//! CLI command implementations.

use crate::config::{DevnetConfig, Overrides};
use crate::logging::LogFormat;
use crate::progress::ConsoleObserver;
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use strata_devnet::{
    DevnetSummary, ExecutionGenesisTemplate, Pipeline, PrebuiltBinary, SignerDump, SourceBuild,
    StageObserver, TracingObserver,
};
use strata_keys::{Account, NetworkKey};
use validator::Validate;

/// Splits a comma-separated host list, trimming and lower-casing each host.
pub fn parse_hosts(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Asks for exactly `count` comma-separated hosts.
pub fn prompt_hosts<R: BufRead, W: Write>(count: usize, input: &mut R, output: &mut W) -> Result<Vec<String>> {
    write!(output, "Enter {count} comma-separated host names or IPs: ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no hosts given; pass --hosts or set `hosts` in the configuration");
    }
    let hosts = parse_hosts(&line);
    if hosts.len() != count {
        bail!("expected {count} hosts, got {}", hosts.len());
    }
    Ok(hosts)
}

/// Provisions a devnet.
pub async fn devnet(config_path: &Path, config_required: bool, overrides: Overrides, format: LogFormat) -> Result<()> {
    let mut config = DevnetConfig::load(config_path, config_required, overrides)?;
    config.validate().context("invalid devnet configuration")?;
    if config.needs_hosts() {
        let stdin = std::io::stdin();
        config.hosts = prompt_hosts(config.total_nodes(), &mut stdin.lock(), &mut std::io::stderr())?;
    }
    config.check()?;

    let request = config.to_request();
    tracing::info!(?request, "Resolved devnet request");

    let mut pipeline = match &config.consensus.binary {
        Some(path) => Pipeline::new(request, PrebuiltBinary::new(path)),
        None => Pipeline::new(
            request,
            SourceBuild::new(
                &config.consensus.repository,
                &config.consensus.branch,
                config.checkout_dir(),
            )
            .with_binary_name(&config.consensus.binary_name),
        ),
    };
    if let Some(dump) = &config.signer_dump {
        pipeline = pipeline.with_accounts(SignerDump::new(dump));
    }
    if let Some(template) = &config.execution_genesis {
        pipeline = pipeline.with_execution_genesis(ExecutionGenesisTemplate::new(template));
    }
    let observer: Arc<dyn StageObserver> = match format {
        LogFormat::Pretty => Arc::new(ConsoleObserver::new(pipeline.stages().len())),
        LogFormat::Json => Arc::new(TracingObserver),
    };
    let pipeline = pipeline.with_observer(observer);

    let summary = pipeline
        .run()
        .await
        .context("devnet provisioning failed; delete the output directory before retrying")?;

    let saved = config.save()?;
    print_summary(&summary);
    println!("\nConfiguration saved to {}", saved.display());
    Ok(())
}

fn print_summary(summary: &DevnetSummary) {
    println!(
        "Devnet created in {} ({} mode, {} nodes)",
        summary.root.display(),
        summary.mode.name(),
        summary.nodes.len()
    );
    println!();
    for node in &summary.nodes {
        let role = if node.validator { "validator" } else { "non-validator" };
        println!("node{} [{role}]", node.index);
        println!("  host:    {}", node.execution_host);
        println!("  signer:  {}", node.signer);
        println!("  enode:   {}", node.discovery_uri);
    }
}

/// Generates a network identity and a signing account.
pub fn keygen(output: Option<&Path>) -> Result<()> {
    let key = NetworkKey::generate();
    let account = Account::generate();

    println!("Network identity: {}", key.public_id());
    println!("Signing address:  {}", account.address());

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let nodekey = dir.join("nodekey");
        let privatekey = dir.join("privatekey.txt");
        write_secret(&nodekey, &format!("{}\n", *key.secret_hex()))?;
        write_secret(&privatekey, &format!("{}\n", *account.private_key_hex()))?;
        println!("\nKeys saved to {}", dir.display());
    }
    Ok(())
}

fn write_secret(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict {}", path.display()))?;
    }
    Ok(())
}
