//! Timer-driven autosave.
//!
//! One scheduler instance per loaded project, owned by the session that
//! holds it, with an explicit start/stop lifecycle (no process-wide timer
//! slot). Each tick flushes only when the store is dirty; a tick that fires
//! while a flush is still in flight is skipped, not queued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use atelier_core::types::ProjectId;

use crate::gateway::PersistenceGateway;
use crate::store::FileTreeStore;

/// Default autosave period.
pub const DEFAULT_AUTOSAVE_PERIOD: Duration = Duration::from_secs(5);

/// Handle to a running autosave loop for one project.
///
/// Dropping the handle cancels the loop. Cancellation is checked before the
/// timer each iteration, so no tick can fire after [`AutosaveScheduler::stop`]
/// returns; a flush already in flight is allowed to complete (its result is
/// discarded by the store if the project was unloaded meanwhile).
#[derive(Debug)]
pub struct AutosaveScheduler {
    project_id: ProjectId,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveScheduler {
    /// Spawn the autosave loop.
    ///
    /// `flush_guard` serializes flushes with user-triggered saves: the tick
    /// path uses `try_lock` and skips when a flush is outstanding.
    pub fn start(
        store: Arc<Mutex<FileTreeStore>>,
        gateway: Arc<PersistenceGateway>,
        flush_guard: Arc<tokio::sync::Mutex<()>>,
        project_id: ProjectId,
        period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            store,
            gateway,
            flush_guard,
            project_id,
            period,
            cancel.clone(),
        ));
        tracing::debug!(%project_id, period_secs = period.as_secs(), "Autosave started");
        Self {
            project_id,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Request cancellation. Effective before any further tick fires.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run the autosave loop until cancelled.
async fn run(
    store: Arc<Mutex<FileTreeStore>>,
    gateway: Arc<PersistenceGateway>,
    flush_guard: Arc<tokio::sync::Mutex<()>>,
    project_id: ProjectId,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of a tokio interval completes immediately; consume it
    // so the first flush happens one full period after start.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%project_id, "Autosave stopped");
                break;
            }
            _ = interval.tick() => {
                tick(&store, &gateway, &flush_guard, project_id).await;
            }
        }
    }
}

/// One autosave tick: flush if dirty, skip otherwise.
async fn tick(
    store: &Mutex<FileTreeStore>,
    gateway: &PersistenceGateway,
    flush_guard: &tokio::sync::Mutex<()>,
    project_id: ProjectId,
) {
    // A flush is already outstanding; this tick is skipped, not queued.
    let Ok(_permit) = flush_guard.try_lock() else {
        tracing::debug!(%project_id, "Autosave tick skipped: flush in flight");
        return;
    };

    {
        let store = store.lock().expect("file tree store lock poisoned");
        let loaded = store.current().map(|p| p.id);
        if loaded != Some(project_id) || !store.is_dirty() {
            return;
        }
    }

    match gateway.flush(store).await {
        Ok(outcome) => {
            tracing::debug!(%project_id, ?outcome, "Autosave flush finished");
        }
        Err(error) => {
            // Local durability failed or the remote rejected the write;
            // state stays dirty and the next tick retries.
            tracing::warn!(%project_id, error = %error, "Autosave flush failed");
        }
    }
}
