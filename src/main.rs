use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use code_judge::core::languages;
use code_judge::jobs::{process_job, JobResult, WorkerJob};
use code_judge::{JudgeConfig, Judger};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries results, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("code_judge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    // Load language configurations
    match std::env::var("LANGUAGES_CONFIG") {
        Ok(path) => {
            languages::init_languages_from(&path)
                .with_context(|| format!("Failed to load languages from {}", path))?;
            info!("Loaded language configurations from {}", path);
        }
        Err(_) => {
            languages::init_languages()?;
            info!("Loaded built-in language configurations");
        }
    }
    info!(
        "Supported languages: {}",
        languages::get_supported_languages().join(", ")
    );

    let config = JudgeConfig::from_env().context("Invalid judge configuration")?;
    info!(
        "Starting Judge Worker: workspace_root={:?}, max_concurrent_jobs={}",
        config.workspace_root, config.max_concurrent_jobs
    );

    let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
    let judger = Arc::new(Judger::new(config));

    let (tx, rx) = mpsc::unbounded_channel::<JobResult>();
    let writer = tokio::spawn(write_results(rx));

    info!("Waiting for jobs...");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut jobs = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let job = match serde_json::from_str::<WorkerJob>(&line) {
            Ok(job) => job,
            Err(e) => {
                warn!("Failed to parse job data: {}", e);
                continue;
            }
        };

        let permit = permits.clone().acquire_owned().await?;
        let judger = judger.clone();
        let tx = tx.clone();
        jobs.spawn(async move {
            let result = process_job(&judger, job).await;
            if tx.send(result).is_err() {
                error!("Result writer stopped, dropping result");
            }
            drop(permit);
        });

        // Reap finished jobs so the set does not grow with the input
        while let Some(done) = jobs.try_join_next() {
            if let Err(e) = done {
                error!("Job task failed: {}", e);
            }
        }
    }

    while let Some(done) = jobs.join_next().await {
        if let Err(e) = done {
            error!("Job task failed: {}", e);
        }
    }

    drop(tx);
    writer.await??;

    info!("Input closed, worker exiting");
    Ok(())
}

/// Write each result as one JSON line on stdout
async fn write_results(mut rx: mpsc::UnboundedReceiver<JobResult>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(result) = rx.recv().await {
        let mut line = serde_json::to_vec(&result)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}
