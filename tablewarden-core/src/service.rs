//! Table data service: browsing, search, mutation, bulk load and export.
//!
//! Every call introspects the table afresh and builds its statements from
//! that snapshot. The service never writes audit records; callers append
//! them after each operation.

use crate::{
    Result,
    adapters::DatabaseAdapter,
    audit::DEFAULT_AUDIT_TABLE,
    error::TableWardenError,
    models::{Row, TableBundle, TableColumns},
    statement::{Predicate, StatementBuilder, clamp_page, page_offset},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// What `export_table` writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Header of view columns plus rows in primary key order
    Data,
    /// Header of insert columns only, for preparing bulk-load files
    Template,
}

/// Composes introspection and statement execution for one backend.
///
/// The audit ledger table is reserved: it is hidden from table listings
/// and every write path refuses it with `Unsupported`.
#[derive(Clone)]
pub struct TableService {
    adapter: Arc<dyn DatabaseAdapter>,
    audit_table: String,
}

impl std::fmt::Debug for TableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableService")
            .field("database_type", &self.adapter.database_type())
            .field("audit_table", &self.audit_table)
            .finish()
    }
}

impl TableService {
    /// Creates a service reserving the default ledger table name.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self {
            adapter,
            audit_table: DEFAULT_AUDIT_TABLE.to_string(),
        }
    }

    /// Reserves `audit_table` instead of the default ledger name.
    pub fn with_audit_table(mut self, audit_table: impl Into<String>) -> Self {
        self.audit_table = audit_table.into();
        self
    }

    /// Adapter shared with the ledger and the reconciler.
    pub fn adapter(&self) -> &Arc<dyn DatabaseAdapter> {
        &self.adapter
    }

    /// Whether `table` names the reserved ledger table.
    ///
    /// Identifiers compare case-insensitively, matching MySQL and SQLite
    /// lookup rules.
    pub fn is_audit_table(&self, table: &str) -> bool {
        table.eq_ignore_ascii_case(&self.audit_table)
    }

    fn ensure_writable(&self, operation: &str, table: &str) -> Result<()> {
        if self.is_audit_table(table) {
            return Err(TableWardenError::unsupported(
                operation,
                format!("'{}' is the append-only audit ledger", table),
            ));
        }
        Ok(())
    }

    fn builder<'a>(&self, columns: &'a TableColumns) -> StatementBuilder<'a> {
        StatementBuilder::new(self.adapter.database_type(), columns)
    }

    /// Base tables not matching the blacklist, sorted, without the ledger.
    pub async fn list_tables(
        &self,
        blacklist: &[String],
        schema: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut tables = self.adapter.list_tables(blacklist, schema).await?;
        tables.retain(|table| !self.is_audit_table(table));
        Ok(tables)
    }

    /// Introspected columns, keys and foreign keys of a table.
    pub async fn columns(&self, table: &str, load_fk_data: bool) -> Result<TableColumns> {
        self.adapter.table_columns(table, load_fk_data).await
    }

    /// Metadata and one page of rows.
    ///
    /// Out-of-range pages are clamped into `[1, last page]`.
    ///
    /// # Errors
    /// `NotFound` for an unknown table, `InvalidArgument` for a zero page size.
    pub async fn get_table_info(
        &self,
        table: &str,
        page: u64,
        page_size: u64,
    ) -> Result<TableBundle> {
        let columns = self.columns(table, true).await?;
        self.page_bundle(columns, None, page, page_size).await
    }

    /// Metadata and one page of rows matching `column operator value`.
    ///
    /// `table_count` is the filtered total.
    ///
    /// # Errors
    /// `NotFound` for an unknown table or column, `InvalidArgument` for an
    /// unsupported operator or a value that does not fit the column.
    pub async fn search_table_info(
        &self,
        table: &str,
        column: &str,
        operator: &str,
        value: &str,
        page: u64,
        page_size: u64,
    ) -> Result<TableBundle> {
        let predicate = Predicate::parse(column, operator, value)?;
        let columns = self.columns(table, true).await?;
        self.page_bundle(columns, Some(&predicate), page, page_size)
            .await
    }

    async fn page_bundle(
        &self,
        columns: TableColumns,
        predicate: Option<&Predicate>,
        page: u64,
        page_size: u64,
    ) -> Result<TableBundle> {
        let builder = self.builder(&columns);
        let table_count = self.adapter.fetch_count(&builder.count(predicate)?).await?;
        let page = clamp_page(page, table_count, page_size)?;
        let offset = page_offset(page, page_size);
        let statement = match predicate {
            Some(predicate) => builder.select_filtered(predicate, page_size, offset)?,
            None => builder.select_page(page_size, offset)?,
        };
        let table_data = self.adapter.fetch_rows(&statement).await?;

        tracing::info!(
            "Read {} of {} rows from {} (page {})",
            table_data.len(),
            table_count,
            columns.table,
            page
        );

        Ok(TableBundle {
            insert_columns: columns.insert_columns().into_iter().cloned().collect(),
            table: columns.table,
            view_columns: columns.view,
            pk_columns: columns.pk_columns,
            fk_columns: columns.fk_columns,
            table_count,
            page,
            page_size,
            table_data,
        })
    }

    /// Inserts one row from the supplied insert-column values.
    pub async fn add_record(&self, table: &str, values: &Row) -> Result<u64> {
        self.ensure_writable("add_record", table)?;
        let columns = self.columns(table, false).await?;
        let statement = self.builder(&columns).insert(values)?;
        let affected = self.adapter.execute(&statement).await?;
        tracing::info!("Inserted {} row(s) into {}", affected, table);
        Ok(affected)
    }

    /// Updates the row identified by its primary key values.
    ///
    /// # Errors
    /// `Unsupported` for a table without a primary key or for the ledger.
    pub async fn edit_record(&self, table: &str, values: &Row) -> Result<u64> {
        self.ensure_writable("edit_record", table)?;
        let columns = self.columns(table, false).await?;
        let statement = self.builder(&columns).update(values)?;
        let affected = self.adapter.execute(&statement).await?;
        tracing::info!("Updated {} row(s) in {}", affected, table);
        Ok(affected)
    }

    /// Deletes by primary key, or every row equal to `values` on a
    /// key-less table.
    pub async fn drop_record(&self, table: &str, values: &Row) -> Result<u64> {
        self.ensure_writable("drop_record", table)?;
        let columns = self.columns(table, false).await?;
        let statement = self.builder(&columns).delete(values)?;
        let affected = self.adapter.execute(&statement).await?;
        if affected > 1 {
            tracing::warn!("Deleted {} duplicate rows from {}", affected, table);
        } else {
            tracing::info!("Deleted {} row(s) from {}", affected, table);
        }
        Ok(affected)
    }

    /// Loads a CSV file (header row required) into a table.
    ///
    /// Rows are inserted one statement at a time without an enclosing
    /// transaction, so a failure part way leaves earlier rows in place.
    /// Cells bind through the column's value class: an empty cell is an
    /// empty string for textual columns and NULL for numeric ones.
    ///
    /// # Errors
    /// `InvalidArgument` when a header is not an insert column, plus any
    /// read, parse or statement error.
    pub async fn bulk_load_file(&self, table: &str, path: &Path) -> Result<u64> {
        self.ensure_writable("bulk_load_file", table)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            TableWardenError::io(format!("Failed to read bulk-load file {}", path.display()), e)
        })?;
        let columns = self.columns(table, false).await?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(bytes.as_slice());
        let headers = reader
            .headers()
            .map_err(|e| TableWardenError::csv("Failed to read CSV header", e))?
            .clone();
        validate_headers(&columns, &headers)?;

        let builder = self.builder(&columns);
        let mut inserted: u64 = 0;
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                TableWardenError::csv(format!("Malformed CSV record {}", line.saturating_add(1)), e)
            })?;
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.to_string(), JsonValue::String(cell.to_string())))
                .collect();
            let affected = self.adapter.execute(&builder.insert(&row)?).await?;
            inserted = inserted.saturating_add(affected);
        }

        tracing::info!(
            "Bulk-loaded {} row(s) into {} from {}",
            inserted,
            table,
            path.display()
        );
        Ok(inserted)
    }

    /// Writes a table as CSV and returns the number of data rows written.
    pub async fn export_table<W: Write>(
        &self,
        table: &str,
        mode: ExportMode,
        limit: u64,
        writer: W,
    ) -> Result<u64> {
        let columns = self.columns(table, false).await?;

        let (header, rows) = match mode {
            ExportMode::Template => {
                let header: Vec<String> = columns
                    .insert_columns()
                    .into_iter()
                    .map(|c| c.name.clone())
                    .collect();
                (header, Vec::new())
            }
            ExportMode::Data => {
                let statement = self.builder(&columns).select(None, Some((limit, 0)))?;
                (
                    columns.view_column_names(),
                    self.adapter.fetch_rows(&statement).await?,
                )
            }
        };

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record(&header)
            .map_err(|e| TableWardenError::csv("Failed to write CSV header", e))?;
        for row in &rows {
            let record = header
                .iter()
                .map(|name| cell_text(row.get(name).unwrap_or(&JsonValue::Null)));
            csv_writer
                .write_record(record)
                .map_err(|e| TableWardenError::csv("Failed to write CSV record", e))?;
        }
        csv_writer
            .flush()
            .map_err(|e| TableWardenError::io("Failed to flush CSV output", e))?;

        tracing::info!("Exported {} row(s) of {} ({:?})", rows.len(), table, mode);
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }
}

/// Every header must name an insert column of the table.
fn validate_headers(columns: &TableColumns, headers: &csv::StringRecord) -> Result<()> {
    if headers.is_empty() {
        return Err(TableWardenError::invalid_argument(
            "bulk-load file has no header row",
        ));
    }
    let insertable = columns.insert_columns();
    for header in headers {
        if !insertable.iter().any(|c| c.name == header) {
            return Err(TableWardenError::invalid_argument(format!(
                "column '{}' is not an insert column of table '{}'",
                header, columns.table
            )));
        }
    }
    Ok(())
}

fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDescriptor;
    use serde_json::json;

    fn departments() -> TableColumns {
        let mut id = ColumnDescriptor::new("id", "INTEGER");
        id.is_primary_key = true;
        id.is_auto_generated = true;
        id.derive_insertable();
        TableColumns {
            table: "departments".to_string(),
            view: vec![
                id,
                ColumnDescriptor::new("dept_id", "VARCHAR(10)"),
                ColumnDescriptor::new("dept_name", "VARCHAR(50)"),
            ],
            pk_columns: vec!["id".to_string()],
            fk_columns: Vec::new(),
        }
    }

    #[test]
    fn test_validate_headers_accepts_insert_columns() {
        let headers = csv::StringRecord::from(vec!["dept_name", "dept_id"]);
        assert!(validate_headers(&departments(), &headers).is_ok());
    }

    #[test]
    fn test_validate_headers_rejects_generated_key() {
        let headers = csv::StringRecord::from(vec!["id", "dept_id"]);
        let err = validate_headers(&departments(), &headers).unwrap_err();
        assert!(matches!(err, TableWardenError::InvalidArgument { .. }));
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_validate_headers_rejects_empty_header() {
        let headers = csv::StringRecord::new();
        assert!(validate_headers(&departments(), &headers).is_err());
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&JsonValue::Null), "");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!("Human Resources")), "Human Resources");
    }

    #[test]
    fn test_export_mode_serde() {
        assert_eq!(serde_json::to_string(&ExportMode::Template).unwrap(), "\"template\"");
    }
}
