//! Background reconciliation of mirrored things.
//!
//! # Responsibility
//! - Delete things whose device is no longer reported live, because removal
//!   notifications are not delivered reliably around startup.
//! - Run once after `initial_delay`, then every `interval` when configured.
//!
//! # Invariants
//! - A failed sweep is logged and retried on the next tick, never fatal.
//! - `stop()` cancels a pending delay or tick immediately.

use crate::db::SharedConnection;
use crate::service::pages_service::{with_pages_service, PagesServiceResult};
use crate::sync::bridge::ActiveThings;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Sweep schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    pub initial_delay: Duration,
    /// `None` runs a single sweep.
    pub interval: Option<Duration>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10 * 60),
            interval: Some(Duration::from_secs(10 * 60)),
        }
    }
}

/// Sweeper lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    AlreadyRunning,
    NotRunning,
    /// `start` was called outside a tokio runtime.
    NoRuntime,
    TaskFailed(String),
}

impl Display for SweepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "thing sweeper is already running"),
            Self::NotRunning => write!(f, "thing sweeper is not running"),
            Self::NoRuntime => write!(f, "thing sweeper requires a tokio runtime"),
            Self::TaskFailed(message) => write!(f, "thing sweeper task failed: {message}"),
        }
    }
}

impl Error for SweepError {}

/// Cancellable background task deleting things that are no longer live.
pub struct ThingSweeper {
    conn: SharedConnection,
    active: Arc<ActiveThings>,
    config: SweepConfig,
    shutdown: Arc<Notify>,
    completed: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl ThingSweeper {
    pub fn new(conn: SharedConnection, active: Arc<ActiveThings>, config: SweepConfig) -> Self {
        Self {
            conn,
            active,
            config,
            shutdown: Arc::new(Notify::new()),
            completed: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn config(&self) -> SweepConfig {
        self.config
    }

    /// Spawns the sweep task on the current tokio runtime.
    pub fn start(&mut self) -> Result<(), SweepError> {
        if self.is_running() {
            return Err(SweepError::AlreadyRunning);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SweepError::NoRuntime)?;
        self.shutdown = Arc::new(Notify::new());

        let task = SweepTask {
            conn: Arc::clone(&self.conn),
            active: Arc::clone(&self.active),
            completed: Arc::clone(&self.completed),
        };
        self.handle = Some(runtime.spawn(sweep_loop(
            task,
            self.config,
            Arc::clone(&self.shutdown),
        )));
        info!(
            "event=sweeper_start module=sync status=ok initial_delay_ms={} interval_ms={}",
            self.config.initial_delay.as_millis(),
            self.config
                .interval
                .map_or_else(|| "none".to_string(), |value| value.as_millis().to_string())
        );
        Ok(())
    }

    /// Whether the task is spawned and has not finished.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the task and waits for it to exit.
    pub async fn stop(&mut self) -> Result<(), SweepError> {
        let handle = self.handle.take().ok_or(SweepError::NotRunning)?;
        self.shutdown.notify_one();
        handle
            .await
            .map_err(|err| SweepError::TaskFailed(err.to_string()))?;
        info!("event=sweeper_stop module=sync status=ok");
        Ok(())
    }

    /// Runs one sweep on the calling thread, outside the schedule.
    pub fn reconcile_now(&self) -> PagesServiceResult<usize> {
        let removed = reconcile(&self.conn, &self.active)?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(removed)
    }

    /// Number of sweeps that finished without error.
    pub fn completed_sweeps(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

struct SweepTask {
    conn: SharedConnection,
    active: Arc<ActiveThings>,
    completed: Arc<AtomicU64>,
}

impl SweepTask {
    fn run(&self) {
        match reconcile(&self.conn, &self.active) {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                error!("event=thing_sweep module=sync status=error error={}", err);
            }
        }
    }
}

fn reconcile(conn: &SharedConnection, active: &ActiveThings) -> PagesServiceResult<usize> {
    let live = active.snapshot();
    with_pages_service(conn, |service| service.reconcile_active_things(live))
}

async fn sweep_loop(task: SweepTask, config: SweepConfig, shutdown: Arc<Notify>) {
    tokio::select! {
        biased;

        _ = shutdown.notified() => return,
        _ = tokio::time::sleep(config.initial_delay) => {}
    }
    task.run();

    let Some(period) = config.interval else {
        return;
    };
    let period = period.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => break,
            _ = ticker.tick() => task.run(),
        }
    }
}
