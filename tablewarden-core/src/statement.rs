//! Dialect-aware statement construction.
//!
//! Every statement is produced as SQL text plus an ordered list of bind
//! parameters. Identifiers are quoted for the target dialect and values
//! never appear in the SQL text. PostgreSQL placeholders carry a cast to
//! the column's native type so that text input binds to typed columns.

use crate::{
    Result,
    error::TableWardenError,
    literal::{SqlValue, ValueClass, coerce, render},
    models::{ColumnDescriptor, DatabaseType, Row, TableColumns},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// SQL text with its bind parameters in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text with dialect placeholders
    pub sql: String,
    /// Bind values in placeholder order
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Bind parameters rendered as literals, for trace logging only.
    pub fn rendered_params(&self) -> String {
        self.params
            .iter()
            .map(|value| render(value, value.class()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{} params]", self.sql, self.params.len())
    }
}

/// Comparison operators accepted in search predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl Operator {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = TableWardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::LtEq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::GtEq),
            "like" => Ok(Self::Like),
            other => Err(TableWardenError::invalid_argument(format!(
                "unsupported operator '{}'",
                other
            ))),
        }
    }
}

/// A single `column operator value` filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Column compared
    pub column: String,
    /// Comparison operator
    pub operator: Operator,
    /// Raw comparison value, coerced per column class
    pub value: JsonValue,
}

impl Predicate {
    /// Builds a predicate from already parsed parts.
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Builds a predicate from user-supplied operator text.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an operator outside the supported set.
    pub fn parse(column: &str, operator: &str, value: impl Into<JsonValue>) -> Result<Self> {
        Ok(Self::new(column, operator.parse()?, value))
    }
}

/// Quotes an identifier for the dialect, doubling embedded quote characters.
pub fn quote_identifier(dialect: DatabaseType, name: &str) -> String {
    match dialect {
        DatabaseType::MySQL => format!("`{}`", name.replace('`', "``")),
        DatabaseType::PostgreSQL | DatabaseType::SQLite => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    }
}

/// Clamps a requested page into `[1, max(1, ceil(total / page_size))]`.
///
/// # Errors
/// Returns `InvalidArgument` when `page_size` is zero.
pub fn clamp_page(requested: u64, total: u64, page_size: u64) -> Result<u64> {
    if page_size == 0 {
        return Err(TableWardenError::invalid_argument(
            "page_size must be greater than 0",
        ));
    }
    let last_page = total.div_ceil(page_size).max(1);
    Ok(requested.clamp(1, last_page))
}

/// Row offset of a (1-based) page.
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// `SELECT DISTINCT column FROM table`, used for foreign key lookups.
pub fn distinct_values(dialect: DatabaseType, table: &str, column: &str) -> Statement {
    let column = quote_identifier(dialect, column);
    Statement {
        sql: format!(
            "SELECT DISTINCT {column} FROM {} WHERE {column} IS NOT NULL ORDER BY {column}",
            quote_identifier(dialect, table)
        ),
        params: Vec::new(),
    }
}

/// Accumulates SQL text and parameters, numbering placeholders per dialect.
struct SqlWriter {
    dialect: DatabaseType,
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlWriter {
    fn new(dialect: DatabaseType) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, value: SqlValue, native_type: Option<&str>) -> String {
        self.params.push(value);
        match self.dialect {
            DatabaseType::PostgreSQL => match native_type.filter(|t| !t.is_empty()) {
                Some(native) => format!(
                    "${}::{}",
                    self.params.len(),
                    quote_identifier(DatabaseType::PostgreSQL, native)
                ),
                None => format!("${}", self.params.len()),
            },
            DatabaseType::MySQL | DatabaseType::SQLite => "?".to_string(),
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Builds statements against one introspected table.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    dialect: DatabaseType,
    columns: &'a TableColumns,
}

impl<'a> StatementBuilder<'a> {
    /// Creates a builder for one table in `dialect`.
    pub fn new(dialect: DatabaseType, columns: &'a TableColumns) -> Self {
        Self { dialect, columns }
    }

    fn quote(&self, name: &str) -> String {
        quote_identifier(self.dialect, name)
    }

    fn table(&self) -> String {
        self.quote(&self.columns.table)
    }

    /// Select list in view order.
    ///
    /// MySQL returns non-numeric columns as character data so that every
    /// row decodes to JSON scalars without per-type handling.
    fn projection(&self) -> String {
        self.columns
            .view
            .iter()
            .map(|c| {
                let quoted = self.quote(&c.name);
                match (self.dialect, c.value_class()) {
                    (DatabaseType::MySQL, ValueClass::Textual) => {
                        format!("CAST({quoted} AS CHAR) AS {quoted}")
                    }
                    _ => quoted,
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// ` ORDER BY` over the primary key, empty for key-less tables.
    fn order_by(&self) -> String {
        if self.columns.pk_columns.is_empty() {
            return String::new();
        }
        let keys = self
            .columns
            .pk_columns
            .iter()
            .map(|k| self.quote(k))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ORDER BY {}", keys)
    }

    fn column(&self, name: &str) -> Result<&'a ColumnDescriptor> {
        self.columns
            .column(name)
            .ok_or_else(|| TableWardenError::column_not_found(&self.columns.table, name))
    }

    fn write_predicate(&self, writer: &mut SqlWriter, predicate: &Predicate) -> Result<()> {
        let column = self.column(&predicate.column)?;
        let quoted = self.quote(&column.name);
        let class = column.value_class();

        // `like` on a numeric column compares for equality
        let operator = match (predicate.operator, class) {
            (Operator::Like, ValueClass::Numeric) => Operator::Eq,
            (operator, _) => operator,
        };

        if operator == Operator::Like {
            let needle = coerce(&predicate.value, ValueClass::Textual)?
                .as_text()
                .unwrap_or_default();
            let placeholder = writer.push_param(SqlValue::Text(format!("%{}%", needle)), None);
            let target = match self.dialect {
                DatabaseType::PostgreSQL => format!("CAST({quoted} AS TEXT)"),
                DatabaseType::MySQL | DatabaseType::SQLite => quoted,
            };
            writer.sql.push_str(&format!("{target} LIKE {placeholder}"));
            return Ok(());
        }

        let value = coerce(&predicate.value, class)?;
        if value.is_null() {
            let clause = match operator {
                Operator::Eq => "IS NULL",
                Operator::NotEq => "IS NOT NULL",
                _ => {
                    return Err(TableWardenError::invalid_argument(format!(
                        "NULL can only be compared with = or != (column '{}')",
                        column.name
                    )));
                }
            };
            writer.sql.push_str(&format!("{quoted} {clause}"));
            return Ok(());
        }

        let placeholder = writer.push_param(value, Some(&column.native_type));
        writer
            .sql
            .push_str(&format!("{quoted} {} {placeholder}", operator.as_sql()));
        Ok(())
    }

    /// Paged or unbounded SELECT with an optional predicate.
    ///
    /// `window` is `(limit, offset)`.
    pub fn select(
        &self,
        predicate: Option<&Predicate>,
        window: Option<(u64, u64)>,
    ) -> Result<Statement> {
        let mut writer = SqlWriter::new(self.dialect);
        writer.sql = format!("SELECT {} FROM {}", self.projection(), self.table());
        if let Some(predicate) = predicate {
            writer.sql.push_str(" WHERE ");
            self.write_predicate(&mut writer, predicate)?;
        }
        writer.sql.push_str(&self.order_by());
        if let Some((limit, offset)) = window {
            writer
                .sql
                .push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }
        Ok(writer.finish())
    }

    /// One page of rows in primary key order.
    pub fn select_page(&self, page_size: u64, offset: u64) -> Result<Statement> {
        self.select(None, Some((page_size, offset)))
    }

    /// One page of rows matching a predicate.
    pub fn select_filtered(
        &self,
        predicate: &Predicate,
        page_size: u64,
        offset: u64,
    ) -> Result<Statement> {
        self.select(Some(predicate), Some((page_size, offset)))
    }

    /// Row count, optionally filtered.
    pub fn count(&self, predicate: Option<&Predicate>) -> Result<Statement> {
        let mut writer = SqlWriter::new(self.dialect);
        writer.sql = format!("SELECT COUNT(*) AS total FROM {}", self.table());
        if let Some(predicate) = predicate {
            writer.sql.push_str(" WHERE ");
            self.write_predicate(&mut writer, predicate)?;
        }
        Ok(writer.finish())
    }

    /// INSERT of the supplied values that belong to insert columns.
    ///
    /// # Errors
    /// `InvalidArgument` when no insertable value is supplied or a value
    /// fails coercion.
    pub fn insert(&self, values: &Row) -> Result<Statement> {
        let mut writer = SqlWriter::new(self.dialect);
        let mut names = Vec::new();
        let mut placeholders = Vec::new();

        for column in self.columns.view.iter().filter(|c| c.is_insertable) {
            let Some(raw) = values.get(&column.name) else {
                continue;
            };
            let value = coerce(raw, column.value_class())?;
            names.push(self.quote(&column.name));
            placeholders.push(writer.push_param(value, Some(&column.native_type)));
        }

        if names.is_empty() {
            return Err(TableWardenError::invalid_argument(format!(
                "no insertable values supplied for table '{}'",
                self.columns.table
            )));
        }

        writer.sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            placeholders.join(", ")
        );
        Ok(writer.finish())
    }

    /// Appends `key = value AND ...` for every primary key column.
    fn write_key_match(&self, writer: &mut SqlWriter, values: &Row) -> Result<()> {
        let mut clauses = Vec::new();
        for key in &self.columns.pk_columns {
            let column = self.column(key)?;
            let value = values
                .get(key)
                .map(|raw| coerce(raw, column.value_class()))
                .transpose()?
                .filter(|v| !v.is_null())
                .ok_or_else(|| {
                    TableWardenError::invalid_argument(format!(
                        "missing value for primary key column '{}'",
                        key
                    ))
                })?;
            let placeholder = writer.push_param(value, Some(&column.native_type));
            clauses.push(format!("{} = {}", self.quote(key), placeholder));
        }
        writer.sql.push_str(&clauses.join(" AND "));
        Ok(())
    }

    /// UPDATE of the non-key insert columns, matched by primary key.
    ///
    /// # Errors
    /// `Unsupported` for a table without a primary key; `InvalidArgument`
    /// for a missing key value, nothing to set, or a coercion failure.
    pub fn update(&self, values: &Row) -> Result<Statement> {
        if !self.columns.has_primary_key() {
            return Err(TableWardenError::unsupported(
                "update",
                format!("table '{}' has no primary key", self.columns.table),
            ));
        }

        let mut writer = SqlWriter::new(self.dialect);
        let mut assignments = Vec::new();
        for column in self
            .columns
            .view
            .iter()
            .filter(|c| c.is_insertable && !c.is_primary_key)
        {
            let Some(raw) = values.get(&column.name) else {
                continue;
            };
            let value = coerce(raw, column.value_class())?;
            let placeholder = writer.push_param(value, Some(&column.native_type));
            assignments.push(format!("{} = {}", self.quote(&column.name), placeholder));
        }

        if assignments.is_empty() {
            return Err(TableWardenError::invalid_argument(format!(
                "no updatable values supplied for table '{}'",
                self.columns.table
            )));
        }

        writer.sql = format!(
            "UPDATE {} SET {} WHERE ",
            self.table(),
            assignments.join(", ")
        );
        self.write_key_match(&mut writer, values)?;
        Ok(writer.finish())
    }

    /// DELETE by primary key, or by full-row equality for key-less tables.
    ///
    /// A full-row match removes every duplicate of the row.
    pub fn delete(&self, values: &Row) -> Result<Statement> {
        let mut writer = SqlWriter::new(self.dialect);
        writer.sql = format!("DELETE FROM {} WHERE ", self.table());

        if self.columns.has_primary_key() {
            self.write_key_match(&mut writer, values)?;
            return Ok(writer.finish());
        }

        let mut clauses = Vec::new();
        for column in &self.columns.view {
            let raw = values.get(&column.name).ok_or_else(|| {
                TableWardenError::invalid_argument(format!(
                    "table '{}' has no primary key; value for column '{}' is required",
                    self.columns.table, column.name
                ))
            })?;
            let quoted = self.quote(&column.name);
            match coerce(raw, column.value_class())? {
                SqlValue::Null => clauses.push(format!("{quoted} IS NULL")),
                value => {
                    let placeholder = writer.push_param(value, Some(&column.native_type));
                    clauses.push(format!("{quoted} = {placeholder}"));
                }
            }
        }
        writer.sql.push_str(&clauses.join(" AND "));
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn departments() -> TableColumns {
        let mut id = ColumnDescriptor::new("dept_id", "character varying");
        id.native_type = "varchar".to_string();
        id.is_primary_key = true;
        let mut name = ColumnDescriptor::new("dept_name", "character varying");
        name.native_type = "varchar".to_string();
        let mut budget = ColumnDescriptor::new("budget", "integer");
        budget.native_type = "int4".to_string();
        TableColumns {
            table: "departments".to_string(),
            view: vec![id, name, budget],
            pk_columns: vec!["dept_id".to_string()],
            fk_columns: Vec::new(),
        }
    }

    fn keyless() -> TableColumns {
        let mut table = departments();
        table.table = "event_log".to_string();
        table.pk_columns.clear();
        for column in &mut table.view {
            column.is_primary_key = false;
        }
        table
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier(DatabaseType::PostgreSQL, "a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_identifier(DatabaseType::MySQL, "a`b"), "`a``b`");
        assert_eq!(quote_identifier(DatabaseType::SQLite, "name"), "\"name\"");
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("LIKE".parse::<Operator>().unwrap(), Operator::Like);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::NotEq);
        assert!("; DROP".parse::<Operator>().is_err());
        assert!("between".parse::<Operator>().is_err());
    }

    #[test]
    fn test_select_page_orders_by_primary_key() {
        let table = departments();
        let statement = StatementBuilder::new(DatabaseType::SQLite, &table)
            .select_page(5, 10)
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT \"dept_id\", \"dept_name\", \"budget\" FROM \"departments\" ORDER BY \"dept_id\" LIMIT 5 OFFSET 10"
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_select_keyless_has_no_order() {
        let table = keyless();
        let statement = StatementBuilder::new(DatabaseType::SQLite, &table)
            .select_page(5, 0)
            .unwrap();
        assert!(!statement.sql.contains("ORDER BY"));
    }

    #[test]
    fn test_mysql_projection_casts_textual_columns() {
        let table = departments();
        let statement = StatementBuilder::new(DatabaseType::MySQL, &table)
            .select_page(5, 0)
            .unwrap();
        assert!(statement.sql.contains("CAST(`dept_name` AS CHAR) AS `dept_name`"));
        assert!(statement.sql.contains(", `budget` FROM"));
    }

    #[test]
    fn test_like_on_textual_binds_wildcards() {
        let table = departments();
        let predicate = Predicate::parse("dept_name", "like", "Work").unwrap();

        let statement = StatementBuilder::new(DatabaseType::SQLite, &table)
            .count(Some(&predicate))
            .unwrap();
        assert!(statement.sql.ends_with("WHERE \"dept_name\" LIKE ?"));
        assert_eq!(statement.params, vec![SqlValue::Text("%Work%".to_string())]);

        let statement = StatementBuilder::new(DatabaseType::PostgreSQL, &table)
            .count(Some(&predicate))
            .unwrap();
        assert!(
            statement
                .sql
                .ends_with("WHERE CAST(\"dept_name\" AS TEXT) LIKE $1")
        );
    }

    #[test]
    fn test_like_on_numeric_degrades_to_equality() {
        let table = departments();
        let predicate = Predicate::parse("budget", "like", "5").unwrap();
        let statement = StatementBuilder::new(DatabaseType::PostgreSQL, &table)
            .count(Some(&predicate))
            .unwrap();
        assert!(statement.sql.ends_with("WHERE \"budget\" = $1::\"int4\""));
        assert_eq!(statement.params, vec![SqlValue::Integer(5)]);
    }

    #[test]
    fn test_select_filtered_pages_matches() {
        let table = departments();
        let predicate = Predicate::parse("dept_name", "=", "O'Brien").unwrap();
        let statement = StatementBuilder::new(DatabaseType::SQLite, &table)
            .select_filtered(&predicate, 5, 5)
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT \"dept_id\", \"dept_name\", \"budget\" FROM \"departments\" \
             WHERE \"dept_name\" = ? ORDER BY \"dept_id\" LIMIT 5 OFFSET 5"
        );
        assert_eq!(statement.rendered_params(), "'O''Brien'");
        assert!(!statement.sql.contains("O'Brien"));
    }

    #[test]
    fn test_rendered_params_follow_value_class() {
        let statement = Statement {
            sql: "INSERT INTO t VALUES (?, ?, ?)".to_string(),
            params: vec![
                SqlValue::Integer(7),
                SqlValue::Null,
                SqlValue::Text("HR".to_string()),
            ],
        };
        assert_eq!(statement.rendered_params(), "7, NULL, 'HR'");
    }

    #[test]
    fn test_predicate_errors() {
        let table = departments();
        let builder = StatementBuilder::new(DatabaseType::SQLite, &table);

        let unknown = Predicate::parse("colour", "=", "red").unwrap();
        assert!(builder.count(Some(&unknown)).unwrap_err().is_not_found());

        let not_a_number = Predicate::parse("budget", ">", "lots").unwrap();
        assert!(matches!(
            builder.count(Some(&not_a_number)),
            Err(TableWardenError::InvalidArgument { .. })
        ));

        let null_range = Predicate::new("budget", Operator::Gt, JsonValue::Null);
        assert!(builder.count(Some(&null_range)).is_err());
    }

    #[test]
    fn test_null_equality_uses_is_null() {
        let table = departments();
        let predicate = Predicate::new("dept_name", Operator::Eq, JsonValue::Null);
        let statement = StatementBuilder::new(DatabaseType::SQLite, &table)
            .count(Some(&predicate))
            .unwrap();
        assert!(statement.sql.ends_with("\"dept_name\" IS NULL"));
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_insert_uses_only_supplied_insert_columns() {
        let mut table = departments();
        table.view[2].is_insertable = false;
        let values = row(json!({"dept_id": "IT_WK", "dept_name": "IT Work", "budget": 10, "extra": 1}));

        let statement = StatementBuilder::new(DatabaseType::PostgreSQL, &table)
            .insert(&values)
            .unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"departments\" (\"dept_id\", \"dept_name\") VALUES ($1::\"varchar\", $2::\"varchar\")"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_insert_without_values_is_rejected() {
        let table = departments();
        let values = row(json!({"unrelated": 1}));
        assert!(
            StatementBuilder::new(DatabaseType::SQLite, &table)
                .insert(&values)
                .is_err()
        );
    }

    #[test]
    fn test_update_by_primary_key() {
        let table = departments();
        let values = row(json!({"dept_id": "IT_WK", "dept_name": "Works", "budget": "12"}));
        let statement = StatementBuilder::new(DatabaseType::MySQL, &table)
            .update(&values)
            .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE `departments` SET `dept_name` = ?, `budget` = ? WHERE `dept_id` = ?"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("Works".to_string()),
                SqlValue::Integer(12),
                SqlValue::Text("IT_WK".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_requires_key_value() {
        let table = departments();
        let values = row(json!({"dept_name": "Works"}));
        let err = StatementBuilder::new(DatabaseType::SQLite, &table)
            .update(&values)
            .unwrap_err();
        assert!(matches!(err, TableWardenError::InvalidArgument { .. }));
    }

    #[test]
    fn test_update_keyless_is_unsupported() {
        let table = keyless();
        let values = row(json!({"dept_name": "Works"}));
        let err = StatementBuilder::new(DatabaseType::SQLite, &table)
            .update(&values)
            .unwrap_err();
        assert!(matches!(err, TableWardenError::Unsupported { .. }));
    }

    #[test]
    fn test_delete_keyless_matches_full_row() {
        let table = keyless();
        let values = row(json!({"dept_id": "A", "dept_name": null, "budget": 3}));
        let statement = StatementBuilder::new(DatabaseType::SQLite, &table)
            .delete(&values)
            .unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM \"event_log\" WHERE \"dept_id\" = ? AND \"dept_name\" IS NULL AND \"budget\" = ?"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_delete_by_key() {
        let table = departments();
        let values = row(json!({"dept_id": "IT_WK"}));
        let statement = StatementBuilder::new(DatabaseType::PostgreSQL, &table)
            .delete(&values)
            .unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM \"departments\" WHERE \"dept_id\" = $1::\"varchar\""
        );
    }

    #[test]
    fn test_distinct_values() {
        let statement = distinct_values(DatabaseType::MySQL, "departments", "dept_id");
        assert_eq!(
            statement.sql,
            "SELECT DISTINCT `dept_id` FROM `departments` WHERE `dept_id` IS NOT NULL ORDER BY `dept_id`"
        );
    }

    #[test]
    fn test_clamp_page_edges() {
        assert_eq!(clamp_page(0, 12, 5).unwrap(), 1);
        assert_eq!(clamp_page(2, 12, 5).unwrap(), 2);
        assert_eq!(clamp_page(99, 12, 5).unwrap(), 3);
        assert_eq!(clamp_page(4, 0, 5).unwrap(), 1);
        assert!(clamp_page(1, 10, 0).is_err());
        assert_eq!(page_offset(3, 5), 10);
        assert_eq!(page_offset(0, 5), 0);
    }

    proptest! {
        #[test]
        fn prop_clamped_page_is_in_range(requested in any::<u64>(), total in 0u64..100_000, size in 1u64..500) {
            let page = clamp_page(requested, total, size).unwrap();
            prop_assert!(page >= 1);
            prop_assert!(page <= total.div_ceil(size).max(1));
            // A clamped page never starts past the last row
            prop_assert!(total == 0 || page_offset(page, size) < total);
        }
    }
}
