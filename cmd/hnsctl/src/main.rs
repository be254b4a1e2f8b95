mod reconcile;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pkg_constants::network::DEFAULT_NETWORK_NAME;
use pkg_constants::paths::DEFAULT_PROXY_CONFIG;
use pkg_hcn::{HostNetworkApi, InMemoryHcn};
use pkg_proxy::{Hns, LoadBalancerCache};
use pkg_types::config::{ProxyConfigFile, load_config_file};
use pkg_types::load_balancer::LoadBalancerFlags;
use pkg_types::network::NetworkType;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::reconcile::{ProgrammedService, sync_service};

#[derive(Parser, Debug)]
#[command(
    name = "hnsctl",
    about = "Program services onto a host network service (in-memory host)"
)]
struct Cli {
    /// Proxy config file (YAML)
    #[arg(long, default_value = DEFAULT_PROXY_CONFIG)]
    config: String,

    /// Host network the endpoints live in (overrides the config file)
    #[arg(long)]
    network_name: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile every configured service and print the resulting host objects
    Plan {
        /// Number of reconciliation passes; passes after the first must not create anything
        #[arg(long, default_value = "1")]
        passes: u32,
    },
    /// Reconcile every configured service, then tear one down
    Teardown {
        /// Name of the service to remove
        service: String,
    },
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn sync_all(
    hns: &Hns,
    config: &ProxyConfigFile,
    network_name: &str,
    source_vip: &str,
    cache: &LoadBalancerCache,
) -> anyhow::Result<Vec<ProgrammedService>> {
    let flags = LoadBalancerFlags {
        is_dsr: config.enable_dsr,
        ..Default::default()
    };
    let mut programmed = Vec::with_capacity(config.services.len());
    for svc in &config.services {
        let result = sync_service(hns, svc, network_name, source_vip, flags, cache)
            .await
            .with_context(|| format!("failed to program service {}", svc.name))?;
        programmed.push(result);
    }
    Ok(programmed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config: ProxyConfigFile = load_config_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config))?;
    let network_name = cli
        .network_name
        .clone()
        .or_else(|| config.network_name.clone())
        .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string());
    let source_vip = config
        .source_vip
        .clone()
        .context("config is missing source-vip")?;

    let hcn = Arc::new(InMemoryHcn::new());
    let network = hcn.add_network(&network_name, NetworkType::Overlay);
    info!(
        "Using {} host, network {} ({})",
        hcn.name(),
        network.name,
        network.id
    );

    let hns = Hns::new(hcn.clone());
    let cache = LoadBalancerCache::new();

    match &cli.command {
        Commands::Plan { passes } => {
            let mut programmed = Vec::new();
            for pass in 1..=*passes {
                let before = hcn.load_balancer_create_calls();
                programmed = sync_all(&hns, &config, &network_name, &source_vip, &cache).await?;
                info!(
                    "Pass {}: {} services, {} load balancers created",
                    pass,
                    programmed.len(),
                    hcn.load_balancer_create_calls() - before
                );
            }

            let output = serde_json::json!({
                "services": programmed,
                "endpoints": hcn.list_endpoints().await?,
                "loadBalancers": hcn.list_load_balancers().await?,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Teardown { service } => {
            let programmed = sync_all(&hns, &config, &network_name, &source_vip, &cache).await?;
            let target = programmed
                .iter()
                .find(|p| &p.name == service)
                .with_context(|| format!("service {} is not configured", service))?;

            let report = hns
                .teardown_service(
                    std::slice::from_ref(&target.identifier),
                    &target.endpoints,
                    &cache,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
