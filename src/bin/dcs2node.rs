//! dcs2node binary

use clap::{Parser, Subcommand};
use dcs2node::common::metrics::METRICS;
use dcs2node::common::{now_rfc3339, parse_duration};
use dcs2node::dcs::memory::{MemoryBackend, MemoryClient, StoreHealth};
use dcs2node::{Config, Coordinator, DcsStore};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dcs2node")]
#[command(about = "Two-node degraded-mode continuity layer for DCS leader election")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    ShowConfig,

    /// Run a two-node outage simulation against the in-memory DCS
    Simulate {
        /// Name of the second node
        #[arg(long, default_value = "node2")]
        peer: String,

        /// Number of HA cycles to run
        #[arg(long, default_value = "12")]
        cycles: u64,

        /// Cycle at which the leader's DCS server dies
        #[arg(long, default_value = "4")]
        fail_at: u64,

        /// Cycle at which the DCS servers recover
        #[arg(long, default_value = "8")]
        restore_at: u64,

        /// Pause between cycles
        #[arg(long, default_value = "200ms")]
        interval: String,
    },
}

/// Node role as seen by the simulated HA loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Leader,
    Replica,
    Demoted,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::Replica => write!(f, "replica"),
            Role::Demoted => write!(f, "demoted"),
        }
    }
}

/// One step of a minimal HA loop
async fn ha_cycle(dcs: &Coordinator<MemoryClient>, role: Role, optime: u64) -> dcs2node::Result<Role> {
    dcs.touch_member(&json!({"state": "running", "role": role.to_string()}), false)
        .await?;

    let Some(cluster) = dcs.load_cluster().await? else {
        return Ok(Role::Replica);
    };

    if (cluster.is_unlocked() || cluster.has_leader(dcs.name()))
        && dcs.attempt_to_acquire_leader(false).await?
    {
        dcs.write_leader_optime(optime).await?;
        return Ok(Role::Leader);
    }
    Ok(Role::Replica)
}

async fn step(dcs: &Coordinator<MemoryClient>, role: Role, optime: u64) -> Role {
    match ha_cycle(dcs, role, optime).await {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!("{}: HA cycle failed, demoting: {}", dcs.name(), e);
            Role::Demoted
        }
    }
}

async fn simulate(
    config: Config,
    peer: String,
    cycles: u64,
    fail_at: u64,
    restore_at: u64,
    interval: std::time::Duration,
) -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    backend.initialize(chrono::Utc::now().timestamp().to_string());

    let node1 = Coordinator::from_config(backend.client(config.name.clone()), &config);
    let node2 = Coordinator::new(backend.client(peer.clone()), peer, config.two_node.enabled);

    // node1 bootstraps and takes the leader key before node2 joins the loop
    let mut role1 = step(&node1, Role::Replica, 0).await;
    let mut role2 = Role::Replica;

    for cycle in 1..=cycles {
        if cycle == fail_at {
            tracing::info!("cycle {}: {} DCS server killed", cycle, node1.name());
            node1.store().set_health(StoreHealth::Unreachable);
            node2.store().set_health(StoreHealth::NoQuorum);
        }
        if cycle == restore_at {
            tracing::info!("cycle {}: DCS servers restored", cycle);
            backend.expire_session(node1.name());
            node1.store().set_health(StoreHealth::Healthy);
            node2.store().set_health(StoreHealth::Healthy);
        }

        // node2 survives the outage with the newest data, so it runs first
        role2 = step(&node2, role2, cycle).await;
        role1 = step(&node1, role1, cycle).await;

        tracing::info!(
            "{} cycle {:>3} | {}: {:<7} ({}) | {}: {:<7} ({})",
            now_rfc3339(),
            cycle,
            node1.name(),
            role1,
            node1.mode().await,
            node2.name(),
            role2,
            node2.mode().await,
        );

        tokio::time::sleep(interval).await;
    }

    println!("{}", METRICS.to_prometheus());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load(Some(path))?,
        None => Config::load_or_name(None, "node1")?,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            peer,
            cycles,
            fail_at,
            restore_at,
            interval,
        } => {
            if restore_at <= fail_at {
                anyhow::bail!("--restore-at must come after --fail-at");
            }
            let interval = parse_duration(&interval)?;
            simulate(config, peer, cycles, fail_at, restore_at, interval).await?;
        }
    }

    Ok(())
}
