use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use guardian::admin::{AdminApi, AdminServer};
use guardian::authz::AuthzServer;
use guardian::chain::{BlacklistPredicate, Chain, LimitPredicate, WhitelistPredicate};
use guardian::config::{sync, ConfStore, GuardianConfig};
use guardian::decision::DecisionEngine;
use guardian::limit_provider::{GlobalLimitProvider, RoutePerRouteLimitProvider};
use guardian::metrics::{self, MetricReporter, NullReporter, PrometheusReporter};
use guardian::store::create_store;

#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(about = "External authorization guardian: CIDR allow/deny lists plus distributed rate limiting")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loading configuration from {:?}", args.config);

    let config = GuardianConfig::load(&args.config)?;

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let reporter: Arc<dyn MetricReporter> = if let Some(metrics_config) = &config.metrics {
        info!("Starting Prometheus metrics server on {}", metrics_config.address);
        match metrics::start_metrics_server(&metrics_config.address) {
            Ok(()) => Arc::new(PrometheusReporter::new(metrics_config.ingress_class.clone())),
            Err(e) => {
                warn!(
                    "Failed to start metrics server: {}. Continuing without metrics.",
                    e
                );
                Arc::new(NullReporter)
            }
        }
    } else {
        Arc::new(NullReporter)
    };

    let store = create_store(&config.store)
        .await
        .with_context(|| "failed to initialize store backend")?;

    let conf_store = Arc::new(ConfStore::from_defaults(&config.defaults));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let sync_handle = sync::spawn(
        conf_store.clone(),
        store.clone(),
        config.sync_interval.as_std(),
        shutdown_rx,
    );

    let chain = Chain::new(vec![
        Box::new(WhitelistPredicate),
        Box::new(BlacklistPredicate),
        Box::new(LimitPredicate::new(
            store.clone(),
            Box::new(GlobalLimitProvider),
            "global",
        )),
        Box::new(LimitPredicate::new(
            store.clone(),
            Box::new(RoutePerRouteLimitProvider),
            "route",
        )),
    ]);

    let engine = Arc::new(DecisionEngine::new(chain, conf_store.clone(), reporter));

    let authz_addr = config.authorize_address.parse()?;
    let authz_server = AuthzServer::bind(engine, authz_addr).await?;

    let admin_addr = config.admin_address.parse()?;
    let admin_api = AdminApi::new(store, conf_store);
    let admin_server = AdminServer::bind(admin_api, admin_addr).await?;

    info!("Starting guardian");

    let admin_task = tokio::spawn(admin_server.run());

    let result = authz_server.run().await;

    shutdown_tx.send(()).ok();
    admin_task.abort();
    sync_handle.abort();

    result.map_err(|e| anyhow::anyhow!("authorization listener failed: {e}"))
}
