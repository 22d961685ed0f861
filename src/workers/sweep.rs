use crate::config::SweepSettings;
use crate::gateway::GatewayApi;
use crate::services::reconciler::{ReconcileOutcome, StatusReconciler};
use crate::store::{StoreError, TransactionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often the worker wakes up.
    pub interval: Duration,
    /// How long a PENDING transaction with a tracking id must have existed
    /// before the sweep considers its webhook lost. Gives the regular IPN a
    /// chance to arrive first.
    pub staleness_threshold: chrono::Duration,
    /// Maximum number of candidates fetched per cycle.
    pub batch_size: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            staleness_threshold: chrono::Duration::minutes(15),
            batch_size: 200,
        }
    }
}

impl From<&SweepSettings> for SweepConfig {
    fn from(settings: &SweepSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs),
            staleness_threshold: chrono::Duration::minutes(settings.staleness_minutes),
            batch_size: settings.batch_size,
        }
    }
}

/// What one sweep cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub transitioned: usize,
}

/// Polling fallback for transactions whose webhook never arrived.
///
/// Each candidate is handled independently; one candidate's gateway or store
/// failure is logged and the cycle moves on. The loop never dies on a failed
/// cycle; the next tick retries from a fresh candidate list.
pub struct SweepWorker {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn GatewayApi>,
    reconciler: Arc<StatusReconciler>,
    config: SweepConfig,
}

impl SweepWorker {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn GatewayApi>,
        reconciler: Arc<StatusReconciler>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
            config,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            staleness_secs = self.config.staleness_threshold.num_seconds(),
            batch_size = self.config.batch_size,
            "sweep worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("sweep worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    match self.run_cycle(&shutdown_rx).await {
                        Ok(report) => {
                            if report.examined > 0 {
                                info!(
                                    examined = report.examined,
                                    transitioned = report.transitioned,
                                    "sweep cycle finished"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "sweep cycle failed");
                        }
                    }
                }
            }
        }

        info!("sweep worker stopped");
    }

    /// One pass over the stale pending candidates.
    ///
    /// Shutdown is honored between candidates, never mid-candidate: the only
    /// write per candidate is the idempotent CAS, so there is nothing to roll
    /// back.
    pub async fn run_cycle(
        &self,
        shutdown_rx: &watch::Receiver<bool>,
    ) -> Result<SweepReport, StoreError> {
        let candidates = self
            .store
            .list_stale_pending(self.config.staleness_threshold, self.config.batch_size)
            .await?;

        let mut report = SweepReport::default();
        for tx in candidates {
            if *shutdown_rx.borrow() {
                info!(
                    examined = report.examined,
                    "sweep interrupted by shutdown"
                );
                break;
            }

            let Some(tracking_id) = tx.tracking_id.as_deref() else {
                // list_stale_pending filters these out; guard anyway.
                continue;
            };
            report.examined += 1;

            let status = match self.gateway.query_status(tracking_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        order_id = %tx.order_id,
                        tracking_id = tracking_id,
                        error = %e,
                        "gateway status query failed, skipping candidate"
                    );
                    continue;
                }
            };

            match self.reconciler.reconcile(&tx, &status.raw_description).await {
                Ok(ReconcileOutcome::Transitioned(new_status)) => {
                    report.transitioned += 1;
                    info!(
                        order_id = %tx.order_id,
                        tracking_id = tracking_id,
                        status = %new_status,
                        "sweep transitioned transaction"
                    );
                }
                Ok(ReconcileOutcome::NoChange) => {}
                Err(e) => {
                    warn!(
                        order_id = %tx.order_id,
                        tracking_id = tracking_id,
                        error = %e,
                        "reconciliation failed, skipping candidate"
                    );
                }
            }
        }

        Ok(report)
    }
}
