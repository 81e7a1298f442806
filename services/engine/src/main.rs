//! Engine binary
//!
//! Wires the engine task to a line-delimited JSON transport: `ApiRequest`
//! lines on stdin, `Outbound` lines on stdout. Production deployments swap
//! this for their queue and pub/sub plumbing; the engine itself only sees
//! the channels.

use anyhow::Context;
use engine::config::Settings;
use engine::messages::ApiRequest;
use engine::runtime;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let settings = Settings::load().context("failed to load configuration")?;
    info!(
        with_snapshot = settings.with_snapshot,
        snapshot_path = %settings.snapshot.path,
        "starting exchange engine"
    );

    let (engine, store) = runtime::bootstrap(&settings);
    let (request_tx, request_rx) = mpsc::channel(1024);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(1024);

    let engine_task = tokio::spawn(runtime::run(
        engine,
        request_rx,
        outbound_tx,
        store,
        Duration::from_secs(settings.snapshot.interval_seconds),
    ));

    let writer_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => {
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdout.write_all(b"\n").await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => error!(error = %e, "failed to serialize outbound message"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ApiRequest>(&line) {
            Ok(request) => {
                if request_tx.send(request).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "dropping malformed request"),
        }
    }
    drop(request_tx);

    engine_task.await?;
    writer_task.await?;
    info!("engine stopped");
    Ok(())
}
