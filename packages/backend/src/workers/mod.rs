mod session_sweep;

pub use session_sweep::sweep_idle_sessions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::config::Config;
use crate::session::SessionStore;

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    sessions: Arc<SessionStore>,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(sessions: Arc<SessionStore>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            sessions,
            running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self, config: &Config) -> Result<(), WorkerError> {
        let enable_sweep = std::env::var("ENABLE_SESSION_SWEEP")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        if !enable_sweep {
            info!("ENABLE_SESSION_SWEEP disabled, skipping worker startup");
            return Ok(());
        }

        let scheduler = self.scheduler.lock().await;

        let schedule = config.sweep_schedule.clone();
        let max_idle = config.session_idle;
        let sessions = Arc::clone(&self.sessions);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let sessions = Arc::clone(&sessions);
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    _ = async { sweep_idle_sessions(&sessions, max_idle); } => {}
                }
            })
        })
        .map_err(WorkerError::Scheduler)?;
        scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
        info!(
            schedule = %schedule,
            idle_minutes = max_idle.as_secs() / 60,
            "Session sweep worker scheduled"
        );

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        self.running.store(true, Ordering::Relaxed);
        info!("All workers started");

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        self.running.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_schedule_is_rejected() {
        let manager = WorkerManager::new(Arc::new(SessionStore::new())).await.unwrap();
        let config = Config {
            sweep_schedule: "not a cron line".to_string(),
            ..Config::default()
        };
        assert!(matches!(manager.start(&config).await, Err(WorkerError::Scheduler(_))));
        assert!(!manager.is_running());
        manager.stop().await;
    }
}
