//! Bulk-load reconciliation and CSV export tests against in-memory SQLite.
//!
//! This test suite covers:
//! - Upload, reconcile and SUCCESS bookkeeping
//! - The max_failures retry threshold
//! - Header validation failures recorded as FAILED
//! - Reprocessing after a crash before the terminal record (duplicates)
//! - Data and template export

#![cfg(feature = "sqlite")]

use serde_json::json;
use std::sync::Arc;
use tablewarden_core::{
    AuditLedger, AuditOperation, AuditStatus, BulkLoadReconciler, ConnectionConfig,
    DatabaseAdapter, ExportMode, LoadState, Result, Statement, TableService, UploadStore,
    create_adapter,
};
use tempfile::TempDir;

struct Harness {
    service: TableService,
    ledger: AuditLedger,
    uploads: UploadStore,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Result<Self> {
        let adapter: Arc<dyn DatabaseAdapter> =
            Arc::from(create_adapter("sqlite::memory:", &ConnectionConfig::default()).await?);
        let ledger = AuditLedger::new(adapter.clone(), "sct_audits");
        ledger.ensure_table().await?;

        let service = TableService::new(adapter);
        service
            .adapter()
            .execute(&Statement {
                sql: "CREATE TABLE departments (id INTEGER PRIMARY KEY AUTOINCREMENT, \
                      dept_id VARCHAR(10) NOT NULL, dept_name VARCHAR(50))"
                    .to_string(),
                params: Vec::new(),
            })
            .await?;

        let dir = tempfile::tempdir().map_err(|e| {
            tablewarden_core::TableWardenError::io("Failed to create temp dir", e)
        })?;
        Ok(Self {
            service,
            ledger,
            uploads: UploadStore::new(dir.path()),
            _dir: dir,
        })
    }

    fn reconciler(&self, max_failures: u32) -> BulkLoadReconciler {
        BulkLoadReconciler::new(
            self.service.clone(),
            self.ledger.clone(),
            self.uploads.clone(),
            max_failures,
        )
    }

    /// Stages a file and records the UPLOADED event the way the CLI does.
    async fn upload(&self, contents: &str) -> Result<String> {
        let staged = self.uploads.stage("departments.csv", contents.as_bytes()).await?;
        self.ledger
            .append(
                Some("alice"),
                AuditOperation::BulkUpload,
                "departments",
                AuditStatus::Uploaded,
                &json!({"file_name": staged.file_name}),
            )
            .await?;
        Ok(staged.file_name)
    }

    async fn row_count(&self) -> Result<u64> {
        Ok(self.service.get_table_info("departments", 1, 5).await?.table_count)
    }
}

#[tokio::test]
async fn test_reconcile_loads_pending_upload() -> Result<()> {
    let harness = Harness::new().await?;
    let file_name = harness
        .upload("dept_id,dept_name\nHR,Human Resources\nIT,Information Technology\n")
        .await?;
    let reconciler = harness.reconciler(1);

    let pending = reconciler.pending_loads().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].file_name, file_name);
    assert_eq!(pending[0].state, LoadState::Pending);

    let report = reconciler.reconcile().await?;
    assert!(!report.skipped);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].rows_inserted, Some(2));
    assert_eq!(harness.row_count().await?, 2);

    let events = harness.ledger.bulk_upload_events().await?;
    let last = events.last().cloned().unwrap();
    assert_eq!(last.audit_user, "SYSTEM");
    assert_eq!(last.status(), Some(AuditStatus::Success));
    assert_eq!(
        last.operation_metadata,
        json!({"file_name": file_name, "total_record_inserted": 2})
    );

    // Terminal state: nothing left to do
    assert!(reconciler.pending_loads().await?.is_empty());
    let again = reconciler.reconcile().await?;
    assert!(again.outcomes.is_empty());
    assert_eq!(harness.row_count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_reconcile_respects_failure_threshold() -> Result<()> {
    let harness = Harness::new().await?;
    // `id` is auto-generated, so the header is rejected on every attempt
    harness.upload("id,dept_id\n1,HR\n").await?;
    let reconciler = harness.reconciler(2);

    for attempt in 1..=3u32 {
        let report = reconciler.reconcile().await?;
        assert_eq!(report.failed(), 1, "attempt {attempt} should run and fail");
    }

    let states = reconciler.load_states().await?;
    assert_eq!(states[0].state, LoadState::FailedExhausted { failures: 3 });
    assert!(reconciler.pending_loads().await?.is_empty());

    let report = reconciler.reconcile().await?;
    assert!(report.outcomes.is_empty());
    assert_eq!(harness.row_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_two_failures_remain_eligible() -> Result<()> {
    let harness = Harness::new().await?;
    harness.upload("bogus\nx\n").await?;
    let reconciler = harness.reconciler(2);

    reconciler.reconcile().await?;
    reconciler.reconcile().await?;

    let pending = reconciler.pending_loads().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].state, LoadState::FailedRetryable { failures: 2 });
    Ok(())
}

#[tokio::test]
async fn test_header_validation_failure_is_recorded() -> Result<()> {
    let harness = Harness::new().await?;
    let file_name = harness.upload("dept_id,budget\nHR,100\n").await?;

    let report = harness.reconciler(1).reconcile().await?;
    assert_eq!(report.failed(), 1);
    let error = report.outcomes[0].error.clone().unwrap_or_default();
    assert!(error.contains("budget"));

    let events = harness.ledger.bulk_upload_events().await?;
    let failed = events.last().cloned().unwrap();
    assert_eq!(failed.status(), Some(AuditStatus::Failed));
    assert_eq!(failed.file_name(), Some(file_name.as_str()));
    assert!(failed.operation_metadata["error"].as_str().is_some_and(|e| e.contains("budget")));
    Ok(())
}

#[tokio::test]
async fn test_missing_upload_is_recorded_as_failed() -> Result<()> {
    let harness = Harness::new().await?;
    harness
        .ledger
        .append(
            Some("alice"),
            AuditOperation::BulkUpload,
            "departments",
            AuditStatus::Uploaded,
            &json!({"file_name": "gone.csv"}),
        )
        .await?;

    let report = harness.reconciler(1).reconcile().await?;
    assert_eq!(report.failed(), 1);
    assert!(report.outcomes[0].error.as_deref().is_some_and(|e| e.contains("gone.csv")));
    Ok(())
}

#[tokio::test]
async fn test_crash_before_terminal_record_duplicates_rows() -> Result<()> {
    let harness = Harness::new().await?;
    let file_name = harness.upload("dept_id,dept_name\nHR,Human Resources\n").await?;

    // Rows land but the process dies before SUCCESS is appended
    let path = harness.uploads.resolve(&file_name).await?;
    harness.service.bulk_load_file("departments", &path).await?;
    assert_eq!(harness.row_count().await?, 1);

    let report = harness.reconciler(1).reconcile().await?;
    assert_eq!(report.succeeded(), 1);
    assert_eq!(harness.row_count().await?, 2, "the whole file is loaded again");
    Ok(())
}

#[tokio::test]
async fn test_bulk_load_empty_cells_follow_column_class() -> Result<()> {
    let harness = Harness::new().await?;
    harness
        .service
        .adapter()
        .execute(&Statement {
            sql: "CREATE TABLE budgets (code TEXT PRIMARY KEY, note TEXT NOT NULL, \
                  amount INTEGER)"
                .to_string(),
            params: Vec::new(),
        })
        .await?;
    let staged = harness.uploads.stage("budgets.csv", b"code,note,amount\nA,,\n").await?;
    let path = harness.uploads.resolve(&staged.file_name).await?;

    // Empty text stays '' (NOT NULL holds); empty numeric becomes NULL
    let inserted = harness.service.bulk_load_file("budgets", &path).await?;
    assert_eq!(inserted, 1);

    let bundle = harness.service.get_table_info("budgets", 1, 5).await?;
    assert_eq!(bundle.table_data[0]["note"], json!(""));
    assert_eq!(bundle.table_data[0]["amount"], serde_json::Value::Null);

    let staged = harness.uploads.stage("budgets.csv", b"code,note,amount\nB,x,lots\n").await?;
    let path = harness.uploads.resolve(&staged.file_name).await?;
    let err = harness.service.bulk_load_file("budgets", &path).await.unwrap_err();
    assert!(matches!(err, tablewarden_core::TableWardenError::InvalidArgument { .. }));
    Ok(())
}

#[tokio::test]
async fn test_export_data_and_template() -> Result<()> {
    let harness = Harness::new().await?;
    let file_name = harness
        .upload("dept_id,dept_name\nHR,Human Resources\nIT,\"Information, Technology\"\nOPS,Operations\n")
        .await?;
    let path = harness.uploads.resolve(&file_name).await?;
    harness.service.bulk_load_file("departments", &path).await?;

    let mut template = Vec::new();
    let rows = harness
        .service
        .export_table("departments", ExportMode::Template, 2000, &mut template)
        .await?;
    assert_eq!(rows, 0);
    assert_eq!(String::from_utf8_lossy(&template), "dept_id,dept_name\n");

    let mut data = Vec::new();
    let rows = harness
        .service
        .export_table("departments", ExportMode::Data, 2, &mut data)
        .await?;
    assert_eq!(rows, 2);
    assert_eq!(
        String::from_utf8_lossy(&data),
        "id,dept_id,dept_name\n1,HR,Human Resources\n2,IT,\"Information, Technology\"\n"
    );
    Ok(())
}
