//! Monitor registry: owns every target monitor of the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_cron_scheduler::JobScheduler;

use super::error::MonitorError;
use super::snapshot::SnapshotRow;
use super::target::{MonitorSettings, Target, TargetId, TargetMonitor};
use crate::input::{RejectedLine, pair_targets};
use crate::probe::Prober;

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of regenerating the target list from operator input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateResult {
    /// Ids of the new targets, in input order.
    pub created: Vec<TargetId>,
    /// Address lines that failed the format check.
    pub rejected: Vec<RejectedLine>,
}

/// Holds the target monitors of a session in insertion order.
///
/// Each monitor runs its own scheduled probe job; the registry only adds,
/// removes, starts and stops them, and aggregates their state on demand.
pub struct MonitorRegistry {
    scheduler: JobScheduler,
    settings: MonitorSettings,
    prober: Arc<dyn Prober>,
    monitors: RwLock<Vec<Arc<TargetMonitor>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("settings", &self.settings)
            .field(
                "target_count",
                &self.monitors.try_read().map(|m| m.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

impl MonitorRegistry {
    /// Create an empty registry and start its job scheduler.
    pub async fn new(
        settings: MonitorSettings,
        prober: Arc<dyn Prober>,
    ) -> Result<Self, MonitorError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| MonitorError::Scheduler(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| MonitorError::Scheduler(e.to_string()))?;

        tracing::info!(
            interval = ?settings.interval,
            window_size = settings.policy.window_size,
            min_samples = settings.policy.min_samples,
            method = %prober.method(),
            "Monitor registry started"
        );

        Ok(Self {
            scheduler,
            settings,
            prober,
            monitors: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Replace all targets with the ones built from the two input lists.
    ///
    /// Every existing monitor is stopped before the new set is created.
    pub async fn create_from_input<A, N>(&self, addresses: &[A], names: &[N]) -> CreateResult
    where
        A: AsRef<str>,
        N: AsRef<str>,
    {
        let parsed = pair_targets(addresses, names);
        let created = self.replace(parsed.targets).await;
        CreateResult {
            created,
            rejected: parsed.rejected,
        }
    }

    /// Replace all targets, stopping the previous monitors first.
    ///
    /// A monitor whose scheduler job cannot be removed is still marked
    /// stopped and never records again, so the failure is logged and the
    /// new set is built regardless.
    pub async fn replace(&self, targets: Vec<Target>) -> Vec<TargetId> {
        let mut monitors = self.monitors.write().await;
        if let Err(e) = Self::stop_each(&monitors).await {
            tracing::warn!(error = %e, "Some previous monitors did not stop cleanly");
        }
        let discarded = monitors.len();
        monitors.clear();

        let ids = targets
            .into_iter()
            .map(|target| {
                let monitor = self.build(target);
                let id = monitor.id();
                monitors.push(monitor);
                id
            })
            .collect::<Vec<_>>();

        tracing::info!(
            discarded,
            created = ids.len(),
            "Target list regenerated"
        );
        ids
    }

    /// Append a single target.
    pub async fn add_target(&self, target: Target) -> TargetId {
        let monitor = self.build(target);
        let id = monitor.id();
        tracing::info!(target_id = %id, address = %monitor.target().address, "Target added");
        self.monitors.write().await.push(monitor);
        id
    }

    /// Look up a monitor by id.
    pub async fn get(&self, id: TargetId) -> Option<Arc<TargetMonitor>> {
        self.monitors
            .read()
            .await
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// Start one target. Returns `false` if it was already running.
    pub async fn start(&self, id: TargetId) -> Result<bool, MonitorError> {
        self.get(id).await.ok_or(MonitorError::NotFound(id))?.start().await
    }

    /// Stop one target. Returns `false` if it was not running.
    pub async fn stop(&self, id: TargetId) -> Result<bool, MonitorError> {
        self.get(id).await.ok_or(MonitorError::NotFound(id))?.stop().await
    }

    /// Start every target; returns how many were newly started.
    ///
    /// Keeps going past failures and reports the first error.
    pub async fn start_all(&self) -> Result<usize, MonitorError> {
        let monitors = self.monitors.read().await.clone();
        let mut results = Vec::with_capacity(monitors.len());
        for monitor in &monitors {
            results.push((monitor.id(), monitor.start().await));
        }
        let started = tally(results, "start")?;
        tracing::info!(started, total = monitors.len(), "Started all targets");
        Ok(started)
    }

    /// Stop every target; returns how many were running.
    pub async fn stop_all(&self) -> Result<usize, MonitorError> {
        let monitors = self.monitors.read().await.clone();
        let stopped = Self::stop_each(&monitors).await?;
        tracing::info!(stopped, total = monitors.len(), "Stopped all targets");
        Ok(stopped)
    }

    /// Stop and delete one target.
    pub async fn remove(&self, id: TargetId) -> Result<(), MonitorError> {
        let mut monitors = self.monitors.write().await;
        let pos = monitors
            .iter()
            .position(|m| m.id() == id)
            .ok_or(MonitorError::NotFound(id))?;
        monitors[pos].stop().await?;
        monitors.remove(pos);
        tracing::info!(target_id = %id, "Target removed");
        Ok(())
    }

    /// Stop and delete every target; returns how many were deleted.
    pub async fn clear(&self) -> usize {
        let mut monitors = self.monitors.write().await;
        if let Err(e) = Self::stop_each(&monitors).await {
            tracing::warn!(error = %e, "Some monitors did not stop cleanly");
        }
        let count = monitors.len();
        monitors.clear();
        tracing::info!(count, "All targets removed");
        count
    }

    /// One row per target, in insertion order.
    pub async fn snapshot(&self) -> Vec<SnapshotRow> {
        let monitors = self.monitors.read().await.clone();
        let mut rows = Vec::with_capacity(monitors.len());
        for monitor in &monitors {
            rows.push(monitor.snapshot().await);
        }
        rows
    }

    pub async fn len(&self) -> usize {
        self.monitors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.monitors.read().await.is_empty()
    }

    /// Stop all targets and shut the scheduler down with default timeout.
    pub async fn shutdown(self) -> Result<(), MonitorError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Stop all targets and shut the scheduler down.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), MonitorError> {
        let stopped = self.stop_all().await;

        let result = tokio::time::timeout(timeout, async {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| MonitorError::Scheduler(e.to_string()))
        })
        .await;

        match result {
            Ok(Ok(())) => tracing::info!("Monitor registry shutdown complete"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Monitor scheduler shutdown failed");
                return Err(e);
            }
            Err(_) => tracing::warn!("Monitor scheduler shutdown timed out"),
        }
        stopped.map(|_| ())
    }

    // --- Private helpers ---

    fn build(&self, target: Target) -> Arc<TargetMonitor> {
        let id = TargetId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Arc::new(TargetMonitor::new(
            id,
            target,
            self.settings,
            Arc::clone(&self.prober),
            self.scheduler.clone(),
        ))
    }

    async fn stop_each(monitors: &[Arc<TargetMonitor>]) -> Result<usize, MonitorError> {
        let mut results = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            results.push((monitor.id(), monitor.stop().await));
        }
        tally(results, "stop")
    }
}

/// Count the monitors an action changed, logging every failure.
///
/// Returns the first error if any action failed.
fn tally(
    results: impl IntoIterator<Item = (TargetId, Result<bool, MonitorError>)>,
    action: &str,
) -> Result<usize, MonitorError> {
    let mut changed = 0;
    let mut first_err = None;
    for (id, result) in results {
        match result {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(target_id = %id, action, error = %e, "Monitor action failed");
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(changed),
    }
}
