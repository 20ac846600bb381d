//! Data models shared by the adapters, the table service and the ledger.

use crate::literal::ValueClass;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

/// Description markers that exclude a column from insert and update forms.
const NON_UPDATABLE_MARKERS: [&str; 2] = ["not updatable", "no_direct_update"];

/// One column of an introspected table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the catalog
    pub name: String,
    /// Type as declared/reported by the catalog (e.g. `character varying`)
    pub declared_type: String,
    /// Backend type name usable in a parameter cast (e.g. `varchar`)
    pub native_type: String,
    /// Column comment, when the backend exposes one
    pub description: Option<String>,
    /// Character length limit for textual columns
    pub max_length: Option<i64>,
    /// Member of the primary key
    pub is_primary_key: bool,
    /// Value assigned by the engine (serial, identity, auto_increment)
    pub is_auto_generated: bool,
    /// Accepted by insert and update (not auto-generated or flagged)
    pub is_insertable: bool,
}

impl ColumnDescriptor {
    /// Creates a descriptor with the flags cleared; introspection fills them in.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            native_type: declared_type.clone(),
            declared_type,
            description: None,
            max_length: None,
            is_primary_key: false,
            is_auto_generated: false,
            is_insertable: true,
        }
    }

    /// Value class derived from the declared type.
    pub fn value_class(&self) -> ValueClass {
        crate::literal::classify(&self.declared_type)
    }

    /// Whether the column description carries a non-updatable marker.
    pub fn is_flagged_not_updatable(&self) -> bool {
        self.description.as_deref().is_some_and(|description| {
            let lowered = description.to_lowercase();
            NON_UPDATABLE_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
        })
    }

    /// Recomputes `is_insertable` from the key, generation and description flags.
    pub fn derive_insertable(&mut self) {
        self.is_insertable =
            !(self.is_primary_key && self.is_auto_generated) && !self.is_flagged_not_updatable();
    }
}

/// Foreign key from a local column to a referenced table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Referencing column in this table
    pub local_column: String,
    /// Table the key points at
    pub referenced_table: String,
    /// Column the key points at
    pub referenced_column: String,
    /// Distinct referenced values; empty unless lookup data was requested
    #[serde(default)]
    pub lookup_values: Vec<JsonValue>,
}

/// Introspected shape of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumns {
    /// Table name as introspected
    pub table: String,
    /// All columns in ordinal order
    pub view: Vec<ColumnDescriptor>,
    /// Primary key columns in key order
    pub pk_columns: Vec<String>,
    /// Foreign keys with optional lookup values
    pub fk_columns: Vec<ForeignKeyDescriptor>,
}

impl TableColumns {
    /// Columns accepted by insert and update.
    pub fn insert_columns(&self) -> Vec<&ColumnDescriptor> {
        self.view.iter().filter(|c| c.is_insertable).collect()
    }

    /// Looks a column up by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.view.iter().find(|c| c.name == name)
    }

    /// Whether the table declares a primary key.
    pub fn has_primary_key(&self) -> bool {
        !self.pk_columns.is_empty()
    }

    /// Names of all columns in ordinal order.
    pub fn view_column_names(&self) -> Vec<String> {
        self.view.iter().map(|c| c.name.clone()).collect()
    }
}

/// Row snapshot keyed by column name, keys in view column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Metadata plus one page of data for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBundle {
    /// Table name
    pub table: String,
    /// All columns in ordinal order
    pub view_columns: Vec<ColumnDescriptor>,
    /// Columns accepted by insert and update
    pub insert_columns: Vec<ColumnDescriptor>,
    /// Primary key columns in key order
    pub pk_columns: Vec<String>,
    /// Foreign keys with distinct referenced values loaded
    pub fk_columns: Vec<ForeignKeyDescriptor>,
    /// Rows matching the optional predicate, independent of pagination
    pub table_count: u64,
    /// Page actually served after clamping
    pub page: u64,
    /// Rows per page used for this response
    pub page_size: u64,
    /// Rows of the served page
    pub table_data: Vec<Row>,
}

/// Operations recorded in the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    ReadTable,
    AddRow,
    DeleteRow,
    UpdateRow,
    BulkUpload,
    ReadAudit,
    SearchTable,
    SearchAudit,
    DownloadData,
    DownloadTemplate,
}

impl AuditOperation {
    /// Name stored in `operation_performed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadTable => "READ_TABLE",
            Self::AddRow => "ADD_ROW",
            Self::DeleteRow => "DELETE_ROW",
            Self::UpdateRow => "UPDATE_ROW",
            Self::BulkUpload => "BULK_UPLOAD",
            Self::ReadAudit => "READ_AUDIT",
            Self::SearchTable => "SEARCH_TABLE",
            Self::SearchAudit => "SEARCH_AUDIT",
            Self::DownloadData => "DOWNLOAD_DATA",
            Self::DownloadTemplate => "DOWNLOAD_TEMPLATE",
        }
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded with an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failed,
    Uploaded,
}

impl AuditStatus {
    /// Text stored in `operation_status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Uploaded => "UPLOADED",
        }
    }

    /// Parses the stored status text; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "UPLOADED" => Some(Self::Uploaded),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted audit ledger entry.
///
/// Operation and status are kept as stored text so that rows written by
/// other tools remain readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Backend-assigned, monotonically increasing id
    pub audit_id: i64,
    /// User recorded with the operation
    pub audit_user: String,
    /// Set by the column default at insert time
    pub audit_time: Option<chrono::NaiveDateTime>,
    /// Operation name, e.g. `ADD_ROW`
    pub operation_performed: String,
    /// Table the operation targeted
    pub table_name: String,
    /// Status text, e.g. `SUCCESS`
    pub operation_status: String,
    /// Parsed metadata; non-JSON text is kept as a JSON string
    pub operation_metadata: JsonValue,
}

impl AuditRecord {
    /// Builds a record from a row fetched from the ledger table.
    pub fn from_row(row: &Row) -> crate::Result<Self> {
        let audit_id = match row.get("audit_id") {
            Some(JsonValue::Number(n)) => n.as_i64(),
            Some(JsonValue::String(s)) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            crate::error::TableWardenError::invalid_argument(
                "audit row is missing a numeric audit_id",
            )
        })?;

        let text = |key: &str| -> String {
            match row.get(key) {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        let raw_metadata = text("operation_metadata");
        let operation_metadata = if raw_metadata.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&raw_metadata).unwrap_or(JsonValue::String(raw_metadata))
        };

        Ok(Self {
            audit_id,
            audit_user: text("audit_user"),
            audit_time: parse_timestamp(&text("audit_time")),
            operation_performed: text("operation_performed"),
            table_name: text("table_name"),
            operation_status: text("operation_status"),
            operation_metadata,
        })
    }

    /// Status parsed into the known set.
    pub fn status(&self) -> Option<AuditStatus> {
        AuditStatus::parse(&self.operation_status)
    }

    /// The `file_name` metadata entry of a bulk-upload record.
    pub fn file_name(&self) -> Option<&str> {
        self.operation_metadata
            .get("file_name")
            .and_then(JsonValue::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// Parses the timestamp text produced by the three backends.
fn parse_timestamp(value: &str) -> Option<chrono::NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(value, format).ok())
}

/// Reconciliation state of one (table, file) bulk-load group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadState {
    Pending,
    Succeeded,
    FailedRetryable { failures: u32 },
    FailedExhausted { failures: u32 },
}

impl LoadState {
    /// Derives the state from the group's SUCCESS and FAILED record counts.
    pub fn from_counts(successes: u32, failures: u32, max_failures: u32) -> Self {
        if successes > 0 {
            Self::Succeeded
        } else if failures == 0 {
            Self::Pending
        } else if failures <= max_failures {
            Self::FailedRetryable { failures }
        } else {
            Self::FailedExhausted { failures }
        }
    }

    /// Whether the reconciler should attempt the load.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Pending | Self::FailedRetryable { .. })
    }
}
