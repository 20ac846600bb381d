//! Engine configuration: paging, table blacklist, ledger and bulk loads.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by the table service, the ledger and the reconciler.
///
/// Built once by the caller and passed into constructors; the library
/// never reads the process environment itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows per page for table and audit listings
    pub page_size: u64,
    /// Table-name substrings hidden from table listings
    pub blacklist: Vec<String>,
    /// FAILED attempts tolerated before a bulk load stops being retried
    pub max_failures: u32,
    /// Name of the audit ledger table
    pub audit_table: String,
    /// Create the ledger table at startup when missing
    pub create_audit_table: bool,
    /// Directory holding staged bulk-load files
    pub upload_dir: PathBuf,
    /// Reconciler tick interval
    pub reconcile_interval: Duration,
    /// Maximum rows written by a data export
    pub export_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            blacklist: Vec::new(),
            max_failures: 1,
            audit_table: crate::audit::DEFAULT_AUDIT_TABLE.to_string(),
            create_audit_table: false,
            upload_dir: PathBuf::from("static/uploads"),
            reconcile_interval: Duration::from_secs(720),
            export_limit: 2000,
        }
    }
}

impl EngineConfig {
    /// Validates engine settings.
    ///
    /// # Errors
    /// Returns a configuration error for a zero page size, export limit
    /// or interval, or an empty ledger table name.
    pub fn validate(&self) -> crate::Result<()> {
        if self.page_size == 0 {
            return Err(crate::error::TableWardenError::configuration(
                "page_size must be greater than 0",
            ));
        }

        if self.export_limit == 0 {
            return Err(crate::error::TableWardenError::configuration(
                "export_limit must be greater than 0",
            ));
        }

        if self.audit_table.trim().is_empty() {
            return Err(crate::error::TableWardenError::configuration(
                "audit_table cannot be empty",
            ));
        }

        if self.reconcile_interval.is_zero() {
            return Err(crate::error::TableWardenError::configuration(
                "reconcile_interval must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Parses a comma-separated blacklist; blank entries are dropped.
    pub fn parse_blacklist(raw: &str) -> Vec<String> {
        raw.split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Builder method to set the page size.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builder method to set the blacklist.
    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Builder method to set the bulk-load failure threshold.
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Builder method to set the ledger table name.
    pub fn with_audit_table(mut self, audit_table: impl Into<String>) -> Self {
        self.audit_table = audit_table.into();
        self
    }

    /// Builder method to enable ledger table creation.
    pub fn with_create_audit_table(mut self, create: bool) -> Self {
        self.create_audit_table = create;
        self
    }

    /// Builder method to set the upload directory.
    pub fn with_upload_dir(mut self, upload_dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = upload_dir.into();
        self
    }

    /// Builder method to set the reconciler interval.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Builder method to set the export row limit.
    pub fn with_export_limit(mut self, export_limit: u64) -> Self {
        self.export_limit = export_limit;
        self
    }
}
