use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spool_core::{
    Arguments, Handler, Operation, OperationError, PollStatus, Spool, SpoolBuilder, SpoolConfig,
    TaskId,
};

#[derive(Parser)]
#[command(name = "spool", about = "Persistent task queue with a single background worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a sum and a failing task, run the worker until both settle
    Demo,
    /// Run the worker until Ctrl-C
    Run,
    /// Print the status of a task as JSON
    Poll {
        /// Task id as printed by enqueue (task-<ulid>)
        task_id: String,
    },
    /// Print how many tasks are waiting in the queue
    Pending,
}

// ---- demo operations ----

#[derive(Debug, Deserialize)]
struct SumArgs {
    a: i64,
    b: i64,
}

struct Sum;

impl Operation for Sum {
    const NAME: &'static str = "sum";
    type Args = SumArgs;
    type Output = i64;
}

struct SumHandler;

#[async_trait]
impl Handler<Sum> for SumHandler {
    async fn handle(&self, args: SumArgs) -> Result<i64, OperationError> {
        args.a
            .checked_add(args.b)
            .ok_or_else(|| OperationError::failed("integer overflow"))
    }
}

#[derive(Debug, Deserialize)]
struct SleepArgs {
    millis: u64,
}

struct Sleep;

impl Operation for Sleep {
    const NAME: &'static str = "sleep";
    type Args = SleepArgs;
    type Output = u64;
}

struct SleepHandler;

#[async_trait]
impl Handler<Sleep> for SleepHandler {
    async fn handle(&self, args: SleepArgs) -> Result<u64, OperationError> {
        tokio::time::sleep(Duration::from_millis(args.millis)).await;
        Ok(args.millis)
    }
}

const FAIL: &str = "fail";

async fn open(config: &SpoolConfig) -> Result<Spool> {
    SpoolBuilder::new()
        .register_typed::<Sum, _>(SumHandler)?
        .register_typed::<Sleep, _>(SleepHandler)?
        .register_fn(FAIL, |args| {
            let reason = args
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("requested failure");
            Err(OperationError::failed(reason))
        })?
        .expect_operations(&[Sum::NAME, Sleep::NAME, FAIL])
        .open(config)
        .await
        .with_context(|| format!("failed to open stores under {}", config.data_dir.display()))
}

fn arguments(value: serde_json::Value) -> Arguments {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Arguments::new(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SpoolConfig::from_env();

    match cli.command {
        Commands::Demo => demo(&config).await,
        Commands::Run => run(&config).await,
        Commands::Poll { task_id } => poll(&config, &task_id).await,
        Commands::Pending => {
            let spool = open(&config).await?;
            println!("{}", spool.queue.pending_count().await?);
            Ok(())
        }
    }
}

async fn demo(config: &SpoolConfig) -> Result<()> {
    let Spool { queue, worker } = open(config).await?;
    let handle = worker.spawn();

    let sum = queue
        .enqueue(Sum::NAME, arguments(json!({ "a": 1, "b": 2 })))
        .await
        .context("enqueue sum")?;
    let fail = queue
        .enqueue(FAIL, arguments(json!({ "reason": "demo failure" })))
        .await
        .context("enqueue fail")?;
    info!(%sum, %fail, "demo tasks enqueued");

    for id in [sum, fail] {
        let status = loop {
            let status = queue.poll(id).await?;
            if !status.is_pending() {
                break status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        };
        println!("{id}: {}", serde_json::to_string(&status)?);
    }

    handle.shutdown_and_join().await?;
    Ok(())
}

async fn run(config: &SpoolConfig) -> Result<()> {
    let Spool { queue, worker } = open(config).await?;
    info!(
        data_dir = %config.data_dir.display(),
        pending = queue.pending_count().await?,
        "starting worker"
    );
    let handle = worker.spawn();

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for ctrl-c")?;
            info!("received shutdown signal");
        }
        _ = wait_finished(&handle) => {}
    }

    handle.shutdown_and_join().await?;
    info!("worker stopped");
    Ok(())
}

// Resolves once the loop exits on its own (storage failure).
async fn wait_finished(handle: &spool_core::WorkerHandle) {
    while !handle.is_finished() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn poll(config: &SpoolConfig, raw: &str) -> Result<()> {
    let id: TaskId = raw
        .parse()
        .with_context(|| format!("invalid task id: {raw}"))?;
    let spool = open(config).await?;
    let status: PollStatus = spool.queue.poll(id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
