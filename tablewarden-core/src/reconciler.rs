//! Retry-bounded reconciliation of uploaded bulk-load files.
//!
//! There is no job table. Work is derived from the ledger on every tick:
//! `BULK_UPLOAD` records are grouped by (table, `file_name`) and each group's
//! SUCCESS and FAILED counts determine its [`LoadState`]. Eligible groups are
//! loaded through [`TableService::bulk_load_file`] and a terminal record is
//! appended for each attempt.
//!
//! Loads are not idempotent: a crash after rows are inserted but before the
//! SUCCESS record is appended makes the next tick load the whole file again.

use crate::{
    Result,
    audit::{AuditLedger, SYSTEM_USER},
    error::TableWardenError,
    models::{AuditOperation, AuditRecord, AuditStatus, LoadState},
    service::TableService,
    uploads::UploadStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

/// A (table, file) bulk-load group and its derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLoad {
    /// Target table
    pub table: String,
    /// Staged file name from the UPLOADED metadata
    pub file_name: String,
    /// State derived from the ledger
    pub state: LoadState,
}

/// Result of one load attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    /// Target table
    pub table: String,
    /// Staged file name
    pub file_name: String,
    /// Rows inserted when the load succeeded
    pub rows_inserted: Option<u64>,
    /// Error text when the load failed
    pub error: Option<String>,
}

impl LoadOutcome {
    /// Whether the load succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one reconciliation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Another tick was already running; nothing was attempted
    pub skipped: bool,
    /// One entry per load attempted in this tick
    pub outcomes: Vec<LoadOutcome>,
}

impl ReconcileReport {
    /// Number of loads that succeeded.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of loads that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

/// Groups bulk-upload events by (table, file) and derives each group's state.
///
/// Events without a `file_name` in their metadata are skipped.
pub fn derive_load_states(events: &[AuditRecord], max_failures: u32) -> Vec<PendingLoad> {
    let mut counts: BTreeMap<(String, String), (u32, u32)> = BTreeMap::new();

    for event in events {
        let Some(file_name) = event.file_name() else {
            tracing::warn!(
                "Skipping bulk-upload record {} without a file_name",
                event.audit_id
            );
            continue;
        };
        let entry = counts
            .entry((event.table_name.clone(), file_name.to_string()))
            .or_default();
        match event.status() {
            Some(AuditStatus::Success) => entry.0 = entry.0.saturating_add(1),
            Some(AuditStatus::Failed) => entry.1 = entry.1.saturating_add(1),
            Some(AuditStatus::Uploaded) => {}
            None => tracing::warn!(
                "Bulk-upload record {} has unknown status '{}'",
                event.audit_id,
                event.operation_status
            ),
        }
    }

    counts
        .into_iter()
        .map(|((table, file_name), (successes, failures))| PendingLoad {
            table,
            file_name,
            state: LoadState::from_counts(successes, failures, max_failures),
        })
        .collect()
}

/// Scheduled loader driven by the audit ledger.
#[derive(Debug)]
pub struct BulkLoadReconciler {
    service: TableService,
    ledger: AuditLedger,
    uploads: UploadStore,
    max_failures: u32,
    tick: Mutex<()>,
}

impl BulkLoadReconciler {
    /// Creates a reconciler tolerating `max_failures` FAILED attempts per file.
    pub fn new(
        service: TableService,
        ledger: AuditLedger,
        uploads: UploadStore,
        max_failures: u32,
    ) -> Self {
        Self {
            service,
            ledger,
            uploads,
            max_failures,
            tick: Mutex::new(()),
        }
    }

    /// Every (table, file) group in the ledger with its state.
    pub async fn load_states(&self) -> Result<Vec<PendingLoad>> {
        let events = self.ledger.bulk_upload_events().await?;
        Ok(derive_load_states(&events, self.max_failures))
    }

    /// Groups eligible for a load attempt, in (table, file) order.
    pub async fn pending_loads(&self) -> Result<Vec<PendingLoad>> {
        let mut loads = self.load_states().await?;
        loads.retain(|load| load.state.is_eligible());
        Ok(loads)
    }

    /// Attempts every eligible load once.
    ///
    /// A failed load is recorded and the tick moves on. Returns a skipped
    /// report when another tick is still running.
    ///
    /// # Errors
    /// Only when the ledger itself cannot be read.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let Ok(_guard) = self.tick.try_lock() else {
            tracing::warn!("Reconciliation already in progress; skipping tick");
            return Ok(ReconcileReport {
                skipped: true,
                outcomes: Vec::new(),
            });
        };

        let pending = self.pending_loads().await?;
        tracing::info!("Reconciling {} pending bulk load(s)", pending.len());

        let mut report = ReconcileReport::default();
        for load in pending {
            let outcome = match self.load(&load).await {
                Ok(rows) => {
                    tracing::info!(
                        "Loaded {} row(s) into {} from {}",
                        rows,
                        load.table,
                        load.file_name
                    );
                    self.record(
                        &load,
                        AuditStatus::Success,
                        json!({"file_name": load.file_name, "total_record_inserted": rows}),
                    )
                    .await;
                    LoadOutcome {
                        table: load.table,
                        file_name: load.file_name,
                        rows_inserted: Some(rows),
                        error: None,
                    }
                }
                Err(e) => {
                    let error = e.detail();
                    tracing::error!(
                        "Bulk load of {} into {} failed: {}",
                        load.file_name,
                        load.table,
                        error
                    );
                    self.record(
                        &load,
                        AuditStatus::Failed,
                        json!({"file_name": load.file_name, "error": error}),
                    )
                    .await;
                    LoadOutcome {
                        table: load.table,
                        file_name: load.file_name,
                        rows_inserted: None,
                        error: Some(error),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        tracing::info!(
            "Reconciliation finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    async fn load(&self, load: &PendingLoad) -> Result<u64> {
        let path = self.uploads.resolve(&load.file_name).await?;
        self.service.bulk_load_file(&load.table, &path).await
    }

    /// Appends a terminal record; a ledger failure is logged, not raised.
    async fn record(&self, load: &PendingLoad, status: AuditStatus, metadata: serde_json::Value) {
        if let Err(e) = self
            .ledger
            .append(
                Some(SYSTEM_USER),
                AuditOperation::BulkUpload,
                &load.table,
                status,
                &metadata,
            )
            .await
        {
            tracing::error!(
                "Failed to record {} for {} ({}): {}",
                status,
                load.file_name,
                load.table,
                e
            );
        }
    }

    /// Runs `reconcile` every `interval` until `shutdown` resolves.
    ///
    /// The first tick fires immediately; ticks missed while a load runs are
    /// skipped.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero interval.
    pub async fn run_scheduled<F>(&self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if interval.is_zero() {
            return Err(TableWardenError::invalid_argument(
                "reconcile interval must be greater than 0",
            ));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!("Bulk-load reconciler scheduled every {:?}", interval);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Bulk-load reconciler stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile().await {
                        tracing::error!("Reconciliation tick failed: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: i64, table: &str, status: &str, metadata: serde_json::Value) -> AuditRecord {
        AuditRecord {
            audit_id: id,
            audit_user: "alice".to_string(),
            audit_time: None,
            operation_performed: "BULK_UPLOAD".to_string(),
            table_name: table.to_string(),
            operation_status: status.to_string(),
            operation_metadata: metadata,
        }
    }

    #[test]
    fn test_failure_threshold() {
        let mut events = vec![
            event(1, "departments", "UPLOADED", json!({"file_name": "a.csv"})),
            event(2, "departments", "FAILED", json!({"file_name": "a.csv", "error": "x"})),
            event(3, "departments", "FAILED", json!({"file_name": "a.csv", "error": "x"})),
        ];

        let states = derive_load_states(&events, 2);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].state, LoadState::FailedRetryable { failures: 2 });
        assert!(states[0].state.is_eligible());

        events.push(event(4, "departments", "FAILED", json!({"file_name": "a.csv"})));
        let states = derive_load_states(&events, 2);
        assert_eq!(states[0].state, LoadState::FailedExhausted { failures: 3 });
        assert!(!states[0].state.is_eligible());
    }

    #[test]
    fn test_groups_by_table_and_file_in_order() {
        let events = vec![
            event(1, "users", "UPLOADED", json!({"file_name": "b.csv"})),
            event(2, "departments", "UPLOADED", json!({"file_name": "b.csv"})),
            event(3, "departments", "UPLOADED", json!({"file_name": "a.csv"})),
            event(4, "departments", "SUCCESS", json!({"file_name": "a.csv", "total_record_inserted": 3})),
        ];

        let states = derive_load_states(&events, 1);
        let keys: Vec<_> = states
            .iter()
            .map(|s| (s.table.as_str(), s.file_name.as_str(), s.state))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("departments", "a.csv", LoadState::Succeeded),
                ("departments", "b.csv", LoadState::Pending),
                ("users", "b.csv", LoadState::Pending),
            ]
        );
    }

    #[test]
    fn test_events_without_file_name_are_skipped() {
        let events = vec![
            event(1, "departments", "UPLOADED", json!("not an object")),
            event(2, "departments", "UPLOADED", json!({"other": 1})),
            event(3, "departments", "UPLOADED", json!({"file_name": ""})),
        ];
        assert!(derive_load_states(&events, 1).is_empty());
    }

    #[test]
    fn test_report_counts() {
        let report = ReconcileReport {
            skipped: false,
            outcomes: vec![
                LoadOutcome {
                    table: "t".into(),
                    file_name: "a.csv".into(),
                    rows_inserted: Some(2),
                    error: None,
                },
                LoadOutcome {
                    table: "t".into(),
                    file_name: "b.csv".into(),
                    rows_inserted: None,
                    error: Some("boom".into()),
                },
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[cfg(feature = "sqlite")]
    async fn memory_reconciler() -> BulkLoadReconciler {
        let adapter: std::sync::Arc<dyn crate::DatabaseAdapter> = std::sync::Arc::from(
            crate::create_adapter("sqlite::memory:", &crate::ConnectionConfig::default())
                .await
                .unwrap(),
        );
        BulkLoadReconciler::new(
            TableService::new(adapter.clone()),
            AuditLedger::new(adapter, "sct_audits"),
            UploadStore::new("unused"),
            1,
        )
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let reconciler = memory_reconciler().await;

        let _running = reconciler.tick.lock().await;
        let report = reconciler.reconcile().await.unwrap();
        assert!(report.skipped);
        assert!(report.outcomes.is_empty());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let reconciler = memory_reconciler().await;
        let result = reconciler
            .run_scheduled(Duration::ZERO, std::future::pending())
            .await;
        assert!(result.is_err());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let reconciler = memory_reconciler().await;
        reconciler.ledger.ensure_table().await.unwrap();
        let result = reconciler
            .run_scheduled(Duration::from_secs(3600), async {
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
            .await;
        assert!(result.is_ok());
    }
}
