//! Engine runtime loop
//!
//! One task owns the [`Engine`]. Commands are processed strictly in arrival
//! order and run to completion, including all emissions, before the next is
//! dequeued; snapshots are written on a timer tick between commands, never
//! concurrently with one. The loop exits after a final snapshot once the
//! request queue closes.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::dispatcher::Engine;
use crate::messages::{ApiRequest, Outbound};
use crate::snapshot::SnapshotStore;

/// Build the engine from the snapshot file when configured and present,
/// otherwise from the seed state
pub fn bootstrap(settings: &Settings) -> (Engine, SnapshotStore) {
    let store = SnapshotStore::new(&settings.snapshot.path, settings.snapshot.compress);
    let engine = if settings.with_snapshot && store.exists() {
        match store.load() {
            Ok(snapshot) => {
                info!(path = %store.path().display(), "restored engine from snapshot");
                Engine::from_snapshot(snapshot)
            }
            Err(e) => {
                error!(error = %e, "snapshot unreadable, starting from seed state");
                Engine::from_seed(&settings.seed)
            }
        }
    } else {
        Engine::from_seed(&settings.seed)
    };
    (engine, store)
}

/// Drive the engine until the request queue closes
pub async fn run(
    mut engine: Engine,
    mut requests: mpsc::Receiver<ApiRequest>,
    outbound: mpsc::Sender<Outbound>,
    store: SnapshotStore,
    snapshot_interval: Duration,
) {
    let mut tick = tokio::time::interval(snapshot_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // An interval's first tick completes immediately
    tick.tick().await;

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(request) => {
                    for message in engine.apply_command(request) {
                        if outbound.send(message).await.is_err() {
                            warn!("outbound channel closed, dropping emission");
                        }
                    }
                }
                None => {
                    info!("request queue closed, shutting down");
                    write_snapshot(&engine, &store);
                    break;
                }
            },
            _ = tick.tick() => {
                write_snapshot(&engine, &store);
            }
        }
    }
}

fn write_snapshot(engine: &Engine, store: &SnapshotStore) {
    match store.write(&engine.snapshot()) {
        Ok(()) => debug!(path = %store.path().display(), "snapshot written"),
        Err(e) => error!(error = %e, "snapshot write failed, retrying next tick"),
    }
}
