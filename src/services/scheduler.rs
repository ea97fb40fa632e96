use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::services::ExportOptions;
use crate::services::backup::BackupReport;
use crate::state::SharedState;

/// Drives the automatic backup job inside the daemon.
///
/// The cron expression is read once at startup; changing the schedule
/// requires a restart. The keep count is re-read on every run so
/// rotation follows config edits immediately.
pub struct Scheduler {
    shared: SharedState,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(shared: SharedState) -> Self {
        Self {
            shared,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let (auto_enabled, cron_expr) = {
            let config = self.shared.config.read().await;
            (config.backup.auto_enabled, config.backup.cron.clone())
        };

        if !auto_enabled {
            info!("Auto-backup is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        let mut sched = JobScheduler::new().await?;

        let shared = self.shared.clone();
        let running = Arc::clone(&self.running);
        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let shared = shared.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                let start = std::time::Instant::now();
                info!(
                    event = "job_started",
                    job_name = "auto_backup",
                    "Starting scheduled backup"
                );

                match run_backup(&shared).await {
                    Ok(report) => {
                        info!(
                            event = "job_finished",
                            job_name = "auto_backup",
                            size_bytes = report.size_bytes,
                            deleted = report.deleted,
                            duration_ms =
                                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                            "Scheduled backup finished"
                        );
                    }
                    Err(e) => {
                        error!(
                            event = "job_failed",
                            job_name = "auto_backup",
                            error = %e,
                            "Scheduled backup failed"
                        );
                    }
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Auto-backup scheduled with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn run_once(&self) -> Result<BackupReport> {
        info!("Running manual backup...");
        run_backup(&self.shared).await
    }
}

async fn run_backup(shared: &SharedState) -> Result<BackupReport> {
    let keep = shared.config.read().await.backup.keep;
    let options = ExportOptions {
        keep: Some(keep),
        ..ExportOptions::default()
    };
    shared.backups.export(&options).await
}
