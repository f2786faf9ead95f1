//! Followlog CLI Binary
//!
//! Process wiring for the reconciliation engine: runs the polling daemon or
//! performs one-shot account-lifecycle and query actions against the local
//! store.

use anyhow::Context;
use clap::{Parser, Subcommand};
use followlog::api::FollowlogApi;
use followlog::bus::EventBus;
use followlog::config::{ConfigLoader, FollowlogConfig};
use followlog::journal::EventFilter;
use followlog::logging::init_logging;
use followlog::projection::ProjectionKind;
use followlog::scheduler::Scheduler;
use followlog::source::{Credentials, HttpMemberSource, MemberSource};
use followlog::store::{SledSnapshotStore, SnapshotStore};
use followlog::types::{AccountId, Relation};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "followlog", about = "Follower-graph change journal", version)]
struct Cli {
    /// Path to a configuration file (defaults to the global config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the polling daemon until interrupted
    Run,
    /// Authenticate an account and start tracking it
    Login {
        #[arg(long)]
        account: i64,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Stop tracking an account and remove its persisted state
    Logout {
        #[arg(long)]
        account: i64,
    },
    /// Show current membership, projections, and recent events
    Status {
        #[arg(long)]
        account: i64,
        /// Number of most recent events to print
        #[arg(long, default_value_t = 10)]
        events: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(Some(&config.logging)).context("initializing logging")?;

    match cli.command {
        Command::Run => {
            let (bus, mut batches) = EventBus::new_pair();
            let api = build_api(&config, bus).context("opening engine")?;
            // Operator-facing feed of appended events; the journal stays
            // the durable record.
            let feed = tokio::spawn(async move {
                while let Some(batch) = batches.recv().await {
                    for event in &batch.events {
                        info!(account = %batch.account, "{}", event);
                    }
                }
            });
            let result = run_daemon(&config, api).await;
            // run_daemon drops the engine, and with it the last publisher;
            // the feed drains whatever is still queued and ends on its own.
            if let Err(err) = feed.await {
                error!(%err, "notification feed task failed");
            }
            result
        }
        Command::Login {
            account,
            username,
            password,
        } => {
            let api = build_api(&config, EventBus::disconnected())?;
            api.restore_accounts().await?;
            api.login(AccountId(account), &Credentials { username, password })
                .await?;
            println!("Logged in account {}", account);
            api.shutdown()?;
            Ok(())
        }
        Command::Logout { account } => {
            let api = build_api(&config, EventBus::disconnected())?;
            api.restore_accounts().await?;
            api.logout(AccountId(account)).await?;
            println!("Logged out account {}", account);
            api.shutdown()?;
            Ok(())
        }
        Command::Status { account, events } => {
            let api = build_api(&config, EventBus::disconnected())?;
            api.restore_accounts().await?;
            print_status(&api, AccountId(account), events)?;
            Ok(())
        }
    }
}

fn build_api(config: &FollowlogConfig, bus: EventBus) -> anyhow::Result<FollowlogApi> {
    let store: Arc<dyn SnapshotStore> = Arc::new(
        SledSnapshotStore::open(&config.storage.path)
            .with_context(|| format!("opening store at {:?}", config.storage.path))?,
    );
    let source: Arc<dyn MemberSource> =
        Arc::new(HttpMemberSource::new(config.source.base_url.clone()));
    Ok(FollowlogApi::new(store, source, bus))
}

async fn run_daemon(config: &FollowlogConfig, api: FollowlogApi) -> anyhow::Result<()> {
    let restored = api.restore_accounts().await?;
    info!(accounts = restored, "daemon starting");

    let scheduler = Scheduler::new(
        api.reconciler(),
        api.registry(),
        config.scheduler.poll_interval(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    // Let any in-flight cycle finish its persist before flushing the store.
    if shutdown_tx.send(true).is_err() {
        error!("scheduler already stopped");
    }
    scheduler_task.await.context("joining scheduler")?;
    api.shutdown()?;
    Ok(())
}

fn print_status(api: &FollowlogApi, account: AccountId, event_count: usize) -> anyhow::Result<()> {
    let followers = api.members(account, Relation::Followers)?;
    let following = api.members(account, Relation::Following)?;
    println!("Followers: {}", followers.len());
    println!("Following: {}", following.len());

    for (label, kind) in [
        ("Mutual", ProjectionKind::Mutual),
        ("Not following back", ProjectionKind::NotFollowingBack),
        ("Not followed back", ProjectionKind::NotFollowedBack),
    ] {
        let set = api.projection(account, kind)?;
        println!("\n{} ({}):", label, set.len());
        for member in set.sorted_members() {
            println!("  @{} {}", member.username, member.full_name);
        }
    }

    let events = api.events(account, EventFilter::default())?;
    println!("\nRecent events:");
    for event in events.iter().rev().take(event_count).rev() {
        println!("  {}", event);
    }
    Ok(())
}
