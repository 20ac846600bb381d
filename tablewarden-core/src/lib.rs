//! Core library for TableWarden.
//!
//! TableWarden introspects arbitrary relational tables across PostgreSQL,
//! MySQL and SQLite, builds parameterized statements for browsing and
//! editing them, records every data operation in an append-only audit
//! ledger, and reconciles uploaded bulk-load files using that ledger as
//! its job-state store.
//!
//! # Guarantees
//! - Every user-supplied value reaches the database as a bind parameter
//! - Identifiers are quoted per backend dialect
//! - Credentials are never logged; connection URLs are redacted in errors
//! - The audit ledger exposes no update or delete operation
//!
//! # Architecture
//! - [`adapters`]: `DatabaseAdapter` trait (introspection + execution) with
//!   one implementation per backend, chosen by [`adapters::create_adapter`]
//! - [`statement`]: dialect-aware statement construction
//! - [`service`]: table browsing, search, mutation, bulk load and export
//! - [`audit`]: the audit ledger
//! - [`uploads`] and [`reconciler`]: staged bulk-load files and their
//!   retry-bounded reconciliation

pub mod adapters;
pub mod audit;
pub mod error;
pub mod literal;
pub mod logging;
pub mod models;
pub mod reconciler;
pub mod service;
pub mod statement;
pub mod uploads;

// Re-export commonly used types
pub use adapters::{ConnectionConfig, DatabaseAdapter, EngineConfig, create_adapter};
pub use audit::{AuditLedger, AuditPage};
pub use error::{Result, TableWardenError};
pub use literal::{SqlValue, ValueClass};
pub use models::{
    AuditOperation, AuditRecord, AuditStatus, ColumnDescriptor, DatabaseType,
    ForeignKeyDescriptor, LoadState, Row, TableBundle, TableColumns,
};
pub use reconciler::{BulkLoadReconciler, PendingLoad, ReconcileReport};
pub use service::{ExportMode, TableService};
pub use statement::{Operator, Predicate, Statement, StatementBuilder, clamp_page};
pub use uploads::{StagedUpload, UploadStore};
