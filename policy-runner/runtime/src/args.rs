use crate::{
    core::{location::DEFAULT_AUTHORITY, LocationResolver},
    k8s::{Client, DiscoveryMapper, KubeSource},
    Config, Provider,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::{io::Write, path::PathBuf};
use tokio::time::{self, Duration};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "policy-runner",
    about = "Evaluates policy sets against cluster resources"
)]
pub struct Args {
    #[clap(long, default_value = "policy_runner=info,warn", env = "POLICY_RUNNER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// Path to the JSON config file.
    #[clap(long, default_value = "config.json")]
    config: PathBuf,

    /// Bounds each discovery and list call made while gathering.
    #[clap(long, default_value = "30")]
    list_timeout_secs: u64,

    /// Bounds a whole evaluation cycle.
    #[clap(long, default_value = "300")]
    cycle_timeout_secs: u64,

    /// Resolves every incident to the API location of its object.
    #[clap(long)]
    resolve_locations: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            config,
            list_timeout_secs,
            cycle_timeout_secs,
            resolve_locations,
        } = self;

        log_format.try_init(log_level)?;

        let config = Config::load(&config)?;
        if config.namespaces.is_empty() || config.group_version_kinds.is_empty() {
            warn!("No namespaces or kinds configured; nothing will be gathered");
        }

        let client = match config.kube_config_path {
            Some(ref path) => kubeconfig_client(path).await?,
            None => client.try_client().await?,
        };

        let source =
            KubeSource::new(client.clone()).with_timeout(Duration::from_secs(list_timeout_secs));
        let mut provider = Provider::from_config(&config, source)?;
        if resolve_locations {
            let mapper = DiscoveryMapper::discover(client)
                .await
                .context("failed to discover API resources")?;
            let authority = config
                .location_authority
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string());
            provider =
                provider.with_locations(LocationResolver::new(mapper).with_authority(authority));
        }

        let cycle_timeout = Duration::from_secs(cycle_timeout_secs);
        let report = time::timeout(cycle_timeout, provider.evaluate())
            .await
            .with_context(|| format!("evaluation did not complete within {cycle_timeout:?}"))??;
        info!(issues = report.issues.len(), "Writing report");

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;

        if let Some(error) = report.error {
            bail!("evaluation incomplete: {error}");
        }
        Ok(())
    }
}

async fn kubeconfig_client(path: &std::path::Path) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await?;
    Ok(Client::try_from(config)?)
}
