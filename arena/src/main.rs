//! Arena command-line tool
//!
//! Computes contest results from a store snapshot, or rehearses a full
//! class walkthrough against one with every broadcast printed to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Print the computed result for contest 3
//! arena results --snapshot ./class7.json --contest 3
//!
//! # Walk class 7 through every stage with 5 second voting countdowns
//! arena rehearse --snapshot ./class7.json --class 7 --countdown 5
//!
//! # Faster ticks, settings from a file
//! ARENA_TICK_INTERVAL_MS=200 arena --config ./arena.toml rehearse --class 7
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use arena::{
    telemetry, ArenaConfig, ArenaService, ContestStage, DeliveryError, Subscriber, SubscriberId,
};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use futures::FutureExt;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (overridden by ARENA_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute and print a contest's result as JSON
    Results {
        /// Store snapshot (overrides snapshot_path)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[arg(long)]
        contest: i64,
    },

    /// Walk a class through every stage and print each broadcast
    Rehearse {
        /// Store snapshot (overrides snapshot_path)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[arg(long)]
        class: i64,

        /// Countdown per voting stage in seconds (overrides default_countdown_secs)
        #[arg(long)]
        countdown: Option<u64>,

        /// Tick length in milliseconds (overrides tick_interval_ms)
        #[arg(long)]
        tick_ms: Option<u64>,
    },
}

/// Venue screen that prints every frame on its own line
struct StdoutSubscriber {
    id: SubscriberId,
}

#[async_trait]
impl Subscriber for StdoutSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        println!("{text}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = ArenaConfig::load(args.config.as_deref()).context("Failed to load config")?;
    telemetry::init_tracing(&config.log_filter);

    match args.command {
        Command::Results { snapshot, contest } => {
            if snapshot.is_some() {
                config.snapshot_path = snapshot;
            }
            let service = open(config).await?;
            let result = service
                .reveal()
                .results(contest)
                .await
                .with_context(|| format!("Failed to compute results for contest {contest}"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Rehearse {
            snapshot,
            class,
            countdown,
            tick_ms,
        } => {
            if snapshot.is_some() {
                config.snapshot_path = snapshot;
            }
            if let Some(countdown) = countdown {
                config.default_countdown_secs = countdown;
            }
            if let Some(tick_ms) = tick_ms {
                config.tick_interval_ms = tick_ms;
            }
            config.validate().context("Invalid rehearsal settings")?;
            let service = open(config).await?;
            rehearse(&service, class).await?;
            service.shutdown();
        }
    }

    Ok(())
}

async fn open(config: ArenaConfig) -> Result<ArenaService> {
    let path = config.snapshot_path.clone();
    let service = ArenaService::from_config(config)
        .await
        .with_context(|| match &path {
            Some(path) => format!("Failed to load snapshot {}", path.display()),
            None => "Failed to create store".to_string(),
        })?;
    Ok(service)
}

async fn rehearse(service: &ArenaService, class_id: i64) -> Result<()> {
    let contest = service
        .store()
        .latest_contest(class_id)
        .await?
        .with_context(|| format!("Class {class_id} has no contest to rehearse"))?;
    service.hub().connect(
        std::sync::Arc::new(StdoutSubscriber { id: Uuid::new_v4() }),
        None,
    );

    let controller = service.controller();
    controller
        .set_stage(class_id, ContestStage::PreVoting, Some(contest.id))
        .await?;
    countdown(service, class_id).await?;
    controller
        .set_stage(class_id, ContestStage::DebateInProgress, None)
        .await?;
    controller
        .set_stage(class_id, ContestStage::PostVoting, None)
        .await?;
    countdown(service, class_id).await?;
    controller
        .set_stage(class_id, ContestStage::JudgeScoring, None)
        .await?;
    controller
        .set_stage(class_id, ContestStage::ResultsSealed, None)
        .await?;

    let outcome = service.reveal().reveal(class_id).await?;
    if outcome.result.is_none() {
        anyhow::bail!(
            "Stage revealed but contest {} could not be calculated",
            outcome.contest_id
        );
    }
    Ok(())
}

/// Run the default countdown for a class and wait for it to finish.
async fn countdown(service: &ArenaService, class_id: i64) -> Result<()> {
    let (done_tx, done_rx) = oneshot::channel();
    service.start_countdown(
        class_id,
        None,
        Some(Box::new(move |_| {
            async move {
                let _ = done_tx.send(());
            }
            .boxed()
        })),
    );
    done_rx
        .await
        .context("Countdown was cancelled before finishing")
}
