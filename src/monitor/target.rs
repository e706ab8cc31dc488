//! Per-target probe loop and state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};

use super::error::MonitorError;
use super::snapshot::SnapshotRow;
use super::status::{ClassifyPolicy, OutcomeWindow, Status};
use crate::probe::{ProbeOutcome, Prober};

/// Minimum allowed probe interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default probe interval (1 second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Clamp a probe interval to [`MIN_INTERVAL`].
pub fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        tracing::warn!(
            requested = ?interval,
            min_interval = ?MIN_INTERVAL,
            "Probe interval is less than minimum allowed. Using minimum interval."
        );
        MIN_INTERVAL
    } else {
        interval
    }
}

/// Registry-unique identifier of a monitored target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monitored endpoint: an address and the name shown for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub address: String,
    pub display_name: String,
}

impl Target {
    /// Create a target; a blank name falls back to the address.
    pub fn new(address: impl Into<String>, name: impl AsRef<str>) -> Self {
        let address = address.into();
        let name = name.as_ref().trim();
        let display_name = if name.is_empty() {
            address.clone()
        } else {
            name.to_string()
        };
        Self {
            address,
            display_name,
        }
    }
}

/// Probe loop settings shared by every monitor in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Time between probes.
    pub interval: Duration,
    /// Window size and classification threshold.
    pub policy: ClassifyPolicy,
    /// Issue one probe immediately on `start()` instead of waiting a full interval.
    pub probe_on_start: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            policy: ClassifyPolicy::default(),
            probe_on_start: true,
        }
    }
}

#[derive(Debug)]
struct TargetState {
    window: OutcomeWindow,
    status: Status,
    last_latency_ms: Option<f64>,
    last_reply: Option<String>,
    last_probe_at: Option<DateTime<Utc>>,
    probes: u64,
    running: bool,
    job_id: Option<uuid::Uuid>,
}

impl TargetState {
    fn new(policy: &ClassifyPolicy) -> Self {
        Self {
            window: OutcomeWindow::new(policy.window_size),
            status: Status::Unknown,
            last_latency_ms: None,
            last_reply: None,
            last_probe_at: None,
            probes: 0,
            running: false,
            job_id: None,
        }
    }

    fn record(&mut self, outcome: ProbeOutcome, min_samples: usize) {
        self.window.push(outcome.success);
        if outcome.success && outcome.latency_ms.is_some() {
            self.last_latency_ms = outcome.latency_ms;
        }
        self.last_reply = Some(outcome.reply);
        self.last_probe_at = Some(Utc::now());
        self.probes += 1;
        self.status = self.window.classify(min_samples);
    }
}

/// State reachable from the scheduled job.
struct Shared {
    id: TargetId,
    target: Target,
    prober: Arc<dyn Prober>,
    min_samples: usize,
    state: RwLock<TargetState>,
    in_flight: Mutex<()>,
}

impl Shared {
    /// Run one probe and fold its outcome into the state.
    ///
    /// Returns the new status, or `None` when the tick was skipped because
    /// the monitor is stopped or a previous probe is still running.
    async fn run_probe(&self) -> Option<Status> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!(target_id = %self.id, address = %self.target.address, "Previous probe still running, skipping tick");
            return None;
        };

        if !self.state.read().await.running {
            return None;
        }

        let outcome = self.prober.probe(&self.target.address).await;
        if !outcome.success {
            tracing::warn!(
                target_id = %self.id,
                address = %self.target.address,
                reply = %outcome.reply,
                "Probe failed"
            );
        }

        let mut state = self.state.write().await;
        if !state.running {
            tracing::debug!(target_id = %self.id, address = %self.target.address, "Discarding outcome for stopped target");
            return None;
        }

        let previous = state.status;
        state.record(outcome, self.min_samples);

        if previous != state.status {
            tracing::info!(
                target_id = %self.id,
                address = %self.target.address,
                name = %self.target.display_name,
                from = %previous,
                to = %state.status,
                "Status changed"
            );
        } else {
            tracing::debug!(
                target_id = %self.id,
                address = %self.target.address,
                status = %state.status,
                latency_ms = ?state.last_latency_ms,
                "Probe recorded"
            );
        }
        Some(state.status)
    }
}

/// Monitors one target: owns its outcome window and its scheduled probe job.
pub struct TargetMonitor {
    shared: Arc<Shared>,
    settings: MonitorSettings,
    scheduler: JobScheduler,
}

impl std::fmt::Debug for TargetMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetMonitor")
            .field("id", &self.shared.id)
            .field("target", &self.shared.target)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TargetMonitor {
    /// Create a stopped monitor. Probe jobs are registered on `scheduler`.
    pub fn new(
        id: TargetId,
        target: Target,
        settings: MonitorSettings,
        prober: Arc<dyn Prober>,
        scheduler: JobScheduler,
    ) -> Self {
        let shared = Arc::new(Shared {
            id,
            target,
            prober,
            min_samples: settings.policy.min_samples,
            state: RwLock::new(TargetState::new(&settings.policy)),
            in_flight: Mutex::new(()),
        });
        Self {
            shared,
            settings,
            scheduler,
        }
    }

    pub fn id(&self) -> TargetId {
        self.shared.id
    }

    pub fn target(&self) -> &Target {
        &self.shared.target
    }

    /// Begin the periodic probe loop.
    ///
    /// Returns `Ok(false)` when the monitor was already running.
    pub async fn start(&self) -> Result<bool, MonitorError> {
        let mut state = self.shared.state.write().await;
        if state.running {
            return Ok(false);
        }

        let job = self.create_job()?;
        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| MonitorError::Scheduler(e.to_string()))?;

        state.running = true;
        state.job_id = Some(job_id);
        drop(state);

        tracing::info!(
            target_id = %self.shared.id,
            address = %self.shared.target.address,
            interval = ?self.settings.interval,
            job_id = %job_id,
            "Monitor started"
        );

        if self.settings.probe_on_start {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                shared.run_probe().await;
            });
        }
        Ok(true)
    }

    /// Halt the probe loop, keeping the last observed status.
    ///
    /// Returns `Ok(false)` when the monitor was not running. Once this
    /// returns, the state no longer changes even if a probe was in flight.
    pub async fn stop(&self) -> Result<bool, MonitorError> {
        let mut state = self.shared.state.write().await;
        if !state.running {
            return Ok(false);
        }
        state.running = false;
        let job_id = state.job_id.take();
        drop(state);

        if let Some(job_id) = job_id {
            self.scheduler
                .remove(&job_id)
                .await
                .map_err(|e| MonitorError::Scheduler(e.to_string()))?;
        }

        tracing::info!(
            target_id = %self.shared.id,
            address = %self.shared.target.address,
            "Monitor stopped"
        );
        Ok(true)
    }

    /// Run one probe now, outside the schedule.
    ///
    /// Has no effect on a stopped monitor.
    pub async fn tick(&self) -> Option<Status> {
        self.shared.run_probe().await
    }

    pub async fn is_running(&self) -> bool {
        self.shared.state.read().await.running
    }

    pub async fn status(&self) -> Status {
        self.shared.state.read().await.status
    }

    /// Outcome window contents, oldest first.
    pub async fn outcomes(&self) -> Vec<bool> {
        self.shared.state.read().await.window.to_vec()
    }

    /// Current display fields.
    pub async fn snapshot(&self) -> SnapshotRow {
        let state = self.shared.state.read().await;
        SnapshotRow {
            id: self.shared.id,
            display_name: self.shared.target.display_name.clone(),
            address: self.shared.target.address.clone(),
            status: state.status,
            last_latency_ms: state.last_latency_ms,
            running: state.running,
            last_reply: state.last_reply.clone(),
            last_probe_at: state.last_probe_at,
            probes: state.probes,
        }
    }

    fn create_job(&self) -> Result<Job, MonitorError> {
        let shared = Arc::clone(&self.shared);
        Job::new_repeated_async(self.settings.interval, move |_: uuid::Uuid, _: JobScheduler| {
            let shared = Arc::clone(&shared);
            Box::pin(async move {
                shared.run_probe().await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
        .map_err(|e| MonitorError::Scheduler(e.to_string()))
    }
}
