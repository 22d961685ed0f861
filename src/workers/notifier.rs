use crate::config::NotifierSettings;
use crate::services::notification::{ConfirmationMailer, PgNotificationQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Drains the durable notification queue.
///
/// Delivery is at-least-once: a job is only marked sent after the mailer ran,
/// so a crash in between re-delivers on the next cycle. Per-job failure
/// isolation mirrors the sweep.
pub struct NotificationWorker {
    queue: Arc<PgNotificationQueue>,
    mailer: ConfirmationMailer,
    interval: Duration,
    batch_size: i64,
}

impl NotificationWorker {
    pub fn new(queue: Arc<PgNotificationQueue>, settings: &NotifierSettings) -> Self {
        Self {
            queue,
            mailer: ConfirmationMailer::new(),
            interval: Duration::from_secs(settings.interval_secs),
            batch_size: settings.batch_size,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "notification worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("notification worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "notification cycle failed");
                    }
                }
            }
        }

        info!("notification worker stopped");
    }

    async fn run_cycle(&self) -> Result<(), crate::store::StoreError> {
        let jobs = self.queue.fetch_unsent(self.batch_size).await?;
        if jobs.is_empty() {
            return Ok(());
        }

        let mut delivered = 0usize;
        for job in jobs {
            self.mailer.send_confirmation(&job).await;
            match self.queue.mark_sent(job.id).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        job_id = job.id,
                        order_id = %job.order_id,
                        error = %e,
                        "failed to mark notification sent; it will be redelivered"
                    );
                }
            }
        }

        info!(delivered = delivered, "confirmation notifications delivered");
        Ok(())
    }
}
