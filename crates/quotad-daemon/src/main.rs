//! quotad - Storage-Quota Authority Daemon
//!
//! Binary entry point. Loads the TOML configuration, wires the production
//! backends (CephFS quota attributes, MUNGE credentials, NSS account lookup)
//! into [`AppState`], and serves the HTTP API until SIGTERM or SIGINT.
//!
//! The daemon must run as root on a host with the managed CephFS filesystem
//! mounted: it creates folders owned by arbitrary users and writes the
//! cluster quota attributes, both privileged operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use quotad_core::config::Config;
use quotad_core::credential::MungeCodec;
use quotad_core::identity::NssDirectory;
use quotad_core::policy::AllocationPolicy;
use quotad_core::quotafs::{CephFs, QuotaFs, ScopedFs};
use quotad_core::ratelimit::RateLimiter;
use quotad_daemon::server::router;
use quotad_daemon::state::{AppState, SharedState};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// quotad - storage-quota authority for managed project folders
#[derive(Parser, Debug)]
#[command(name = "quotad")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long, default_value = "/etc/quotad/quotad.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    let mut tiers: Vec<&str> = config.tier_dir.keys().map(String::as_str).collect();
    tiers.sort_unstable();
    info!(
        tiers = ?tiers,
        trusted_net = %config.allowed_encode_host,
        "configuration loaded"
    );

    let state = build_state(&config)?;

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    };

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "quota daemon listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    Ok(())
}

/// Assembles the shared application state from a validated configuration.
///
/// All tier directories and the project namespace are views onto a single
/// [`CephFs`] rooted at `/`, so the configured absolute paths become scope
/// prefixes relative to that root.
fn build_state(config: &Config) -> Result<SharedState> {
    let cluster: Arc<dyn QuotaFs> = Arc::new(CephFs::new("/"));

    let mut tiers = std::collections::HashMap::new();
    for (tier, dir) in &config.tier_dir {
        let scoped = ScopedFs::new(cluster.clone(), rebase(dir))
            .with_context(|| format!("invalid directory for tier {tier:?}: {}", dir.display()))?;
        tiers.insert(tier.clone(), scoped);
    }

    let namespace = ScopedFs::new(cluster, rebase(&config.project_dir)).with_context(|| {
        format!(
            "invalid project directory: {}",
            config.project_dir.display()
        )
    })?;

    Ok(Arc::new(AppState {
        codec: Arc::new(MungeCodec::with_tools(
            &config.munge_path,
            &config.unmunge_path,
        )),
        directory: Arc::new(NssDirectory::new()),
        policy: AllocationPolicy::new(config.allocations.clone()),
        trusted_net: config.allowed_encode_host,
        tiers,
        namespace,
        limiter: RateLimiter::default(),
        update_lock: tokio::sync::Mutex::new(()),
    }))
}

/// Strips the leading `/` so an absolute configured directory can serve as a
/// scope prefix under the filesystem root.
fn rebase(dir: &Path) -> String {
    dir.strip_prefix("/")
        .unwrap_or(dir)
        .to_string_lossy()
        .into_owned()
}
