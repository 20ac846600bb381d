//! Append-only audit ledger.
//!
//! The ledger is an ordinary table in the managed database. It records
//! every data operation and doubles as the job-state store for bulk loads:
//! the reconciler derives its work purely from `BULK_UPLOAD` records.

use crate::{
    Result,
    adapters::DatabaseAdapter,
    error::TableWardenError,
    models::{AuditOperation, AuditRecord, AuditStatus, Row, TableColumns},
    statement::{Operator, Predicate, StatementBuilder, clamp_page, page_offset},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Ledger table name used when none is configured.
pub const DEFAULT_AUDIT_TABLE: &str = "sct_audits";

/// Recorded when the caller supplies no user.
pub const ANONYMOUS_USER: &str = "ANONYMOUS";

/// User recorded for reconciler outcomes.
pub const SYSTEM_USER: &str = "SYSTEM";

/// One page of ledger records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
    /// Records on this page in ascending audit_id order
    pub records: Vec<AuditRecord>,
    /// Records matching the optional predicate
    pub total: u64,
    /// Page actually served after clamping
    pub page: u64,
}

/// Handle on the ledger table.
#[derive(Clone)]
pub struct AuditLedger {
    adapter: Arc<dyn DatabaseAdapter>,
    table: String,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("table", &self.table)
            .finish()
    }
}

impl AuditLedger {
    /// Binds the ledger to `table` on `adapter`; nothing is queried yet.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>, table: impl Into<String>) -> Self {
        Self {
            adapter,
            table: table.into(),
        }
    }

    /// Name of the ledger table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the ledger table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        self.adapter.ensure_audit_table(&self.table).await?;
        tracing::info!("Audit ledger table {} is ready", self.table);
        Ok(())
    }

    async fn columns(&self) -> Result<TableColumns> {
        self.adapter.table_columns(&self.table, false).await
    }

    /// Appends one record; `audit_time` and `audit_id` are assigned by the
    /// database.
    ///
    /// # Errors
    /// `NotFound` when the ledger table does not exist, plus statement errors.
    pub async fn append(
        &self,
        user: Option<&str>,
        operation: AuditOperation,
        target_table: &str,
        status: AuditStatus,
        metadata: &JsonValue,
    ) -> Result<()> {
        let metadata_text = serde_json::to_string(metadata)
            .map_err(|e| TableWardenError::serialization("Failed to encode audit metadata", e))?;
        let user = user.filter(|u| !u.trim().is_empty()).unwrap_or(ANONYMOUS_USER);

        let mut row = Row::new();
        row.insert("audit_user".into(), user.into());
        row.insert("operation_performed".into(), operation.as_str().into());
        row.insert("table_name".into(), target_table.into());
        row.insert("operation_status".into(), status.as_str().into());
        row.insert("operation_metadata".into(), metadata_text.into());

        let columns = self.columns().await?;
        let statement = StatementBuilder::new(self.adapter.database_type(), &columns).insert(&row)?;
        self.adapter.execute(&statement).await?;

        tracing::debug!(
            "Audit: {} {} on {} by {}",
            operation,
            status,
            target_table,
            user
        );
        Ok(())
    }

    /// Records in ascending `audit_id` order, one page at a time.
    pub async fn list(&self, page: u64, page_size: u64) -> Result<AuditPage> {
        self.page(None, page, page_size).await
    }

    /// Records matching `column operator value`.
    ///
    /// `audit_id` is numeric, so `like` on it compares for equality and the
    /// value must be an integer.
    pub async fn search(
        &self,
        column: &str,
        operator: &str,
        value: &str,
        page: u64,
        page_size: u64,
    ) -> Result<AuditPage> {
        let predicate = Predicate::parse(column, operator, value)?;
        self.page(Some(&predicate), page, page_size).await
    }

    async fn page(
        &self,
        predicate: Option<&Predicate>,
        page: u64,
        page_size: u64,
    ) -> Result<AuditPage> {
        let columns = self.columns().await?;
        let builder = StatementBuilder::new(self.adapter.database_type(), &columns);
        let total = self.adapter.fetch_count(&builder.count(predicate)?).await?;
        let page = clamp_page(page, total, page_size)?;
        let statement = builder.select(predicate, Some((page_size, page_offset(page, page_size))))?;
        let records = self
            .adapter
            .fetch_rows(&statement)
            .await?
            .iter()
            .map(AuditRecord::from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(AuditPage {
            records,
            total,
            page,
        })
    }

    /// All `BULK_UPLOAD` records in ascending `audit_id` order.
    pub async fn bulk_upload_events(&self) -> Result<Vec<AuditRecord>> {
        let columns = self.columns().await?;
        let predicate = Predicate::new(
            "operation_performed",
            Operator::Eq,
            AuditOperation::BulkUpload.as_str(),
        );
        let statement =
            StatementBuilder::new(self.adapter.database_type(), &columns).select(Some(&predicate), None)?;
        self.adapter
            .fetch_rows(&statement)
            .await?
            .iter()
            .map(AuditRecord::from_row)
            .collect()
    }
}
