//! Debounced trailing-edge trigger for automatic backups.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use zeroize::Zeroizing;

use super::BackupEngine;
use crate::accessor::LocalDataAccessor;
use crate::remote::RemoteBackupStore;

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PendingBackup { deadline: Instant },
}

struct PendingTimer {
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    pending: Option<PendingTimer>,
}

fn lock(slot: &Mutex<TimerSlot>) -> MutexGuard<'_, TimerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coalesces change notifications into one backup per quiet period.
///
/// Each notification (re)arms a single timer; the backup runs once no
/// notification arrived for `quiet_period`. A backup that already fired is
/// never cancelled, and fired backups run one at a time. Dropping the
/// scheduler cancels the pending timer.
///
/// One scheduler serves one signed-in session: there is a single pending
/// timer, so a notification for a different user replaces the backup pending
/// for the previous one. Call [`Self::cancel`] on sign-out.
///
/// Notifications must be sent from within a Tokio runtime.
pub struct AutoBackupScheduler<A, R> {
    engine: Arc<BackupEngine<A, R>>,
    quiet_period: Duration,
    slot: Arc<Mutex<TimerSlot>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<A, R> AutoBackupScheduler<A, R>
where
    A: LocalDataAccessor + 'static,
    R: RemoteBackupStore + 'static,
{
    pub fn start(engine: Arc<BackupEngine<A, R>>, quiet_period: Duration) -> Self {
        Self {
            engine,
            quiet_period,
            slot: Arc::new(Mutex::new(TimerSlot::default())),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Scheduler using the engine's configured quiet period
    pub fn with_engine_config(engine: Arc<BackupEngine<A, R>>) -> Self {
        let quiet_period = engine.config().quiet_period;
        Self::start(engine, quiet_period)
    }

    pub const fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn state(&self) -> SchedulerState {
        lock(&self.slot)
            .pending
            .as_ref()
            .map_or(SchedulerState::Idle, |pending| {
                SchedulerState::PendingBackup {
                    deadline: pending.deadline,
                }
            })
    }

    /// Record a local change and push the backup deadline to now + quiet period.
    pub fn notify_data_changed(&self, user_id: impl Into<String>, identity_key: impl Into<String>) {
        let user_id = user_id.into();
        let identity_key = Zeroizing::new(identity_key.into());
        let deadline = Instant::now() + self.quiet_period;

        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.pending.take() {
            previous.handle.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.slot);
        let gate = Arc::clone(&self.gate);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.pending = None;
            }

            let _running = gate.lock().await;
            if !engine.backup(&user_id, &identity_key).await {
                tracing::debug!("Scheduled backup for user {user_id} did not complete");
            }
        });

        slot.pending = Some(PendingTimer { deadline, handle });
        tracing::debug!("Backup scheduled in {:?}", self.quiet_period);
    }

    /// Drop any pending backup. A backup already running is left to finish.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(pending) = slot.pending.take() {
            pending.handle.abort();
            tracing::debug!("Pending backup cancelled");
        }
    }
}

impl<A, R> Drop for AutoBackupScheduler<A, R> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(pending) = slot.pending.take() {
            pending.handle.abort();
        }
    }
}

impl<A, R> std::fmt::Debug for AutoBackupScheduler<A, R> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = lock(&self.slot).pending.as_ref().map(|p| p.deadline);
        formatter
            .debug_struct("AutoBackupScheduler")
            .field("quiet_period", &self.quiet_period)
            .field("pending_deadline", &pending)
            .finish_non_exhaustive()
    }
}
