//! Command handlers.
//!
//! Each data command calls the table service or ledger and then appends
//! its audit record, SUCCESS with the request metadata or FAILED with the
//! error text. A ledger write failure is logged and does not change the
//! command's own outcome.

use crate::{Cli, Command, GlobalArgs, PageArgs, PredicateArgs, RowArgs};
use anyhow::Context as _;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tablewarden_core::{
    AuditLedger, AuditOperation, AuditStatus, BulkLoadReconciler, DatabaseAdapter, EngineConfig,
    ExportMode, Row, TableService, UploadStore, create_adapter, error::redact_database_url,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Wired components for one invocation.
struct Context {
    adapter: Arc<dyn DatabaseAdapter>,
    /// Ledger connection when it differs from the data connection
    audit_adapter: Option<Arc<dyn DatabaseAdapter>>,
    service: TableService,
    ledger: AuditLedger,
    engine: EngineConfig,
    user: Option<String>,
    schema: Option<String>,
}

impl Context {
    async fn connect(global: &GlobalArgs) -> anyhow::Result<Self> {
        let engine = global.engine_config();
        engine.validate()?;

        let database_url = global
            .database_url
            .as_deref()
            .context("Database URL is required (--database-url or SCT_DATABASE_URL)")?;
        info!("Target: {}", redact_database_url(database_url));

        let adapter: Arc<dyn DatabaseAdapter> =
            Arc::from(create_adapter(database_url, &global.connection_config()).await?);
        info!("Created {} adapter", adapter.database_type());

        let audit_adapter = if global.separate_audit_store() {
            let audit_url = global.audit_database_url.as_deref().unwrap_or(database_url);
            info!("Audit ledger: {}", redact_database_url(audit_url));
            let audit: Arc<dyn DatabaseAdapter> =
                Arc::from(create_adapter(audit_url, &global.audit_connection_config()).await?);
            Some(audit)
        } else {
            None
        };

        let ledger = AuditLedger::new(
            audit_adapter.clone().unwrap_or_else(|| adapter.clone()),
            engine.audit_table.clone(),
        );
        if engine.create_audit_table {
            ledger.ensure_table().await?;
        }

        Ok(Self {
            service: TableService::new(adapter.clone())
                .with_audit_table(engine.audit_table.clone()),
            adapter,
            audit_adapter,
            ledger,
            engine,
            user: global.user.clone(),
            schema: global.schema.clone(),
        })
    }

    fn page_size(&self, page: &PageArgs) -> u64 {
        page.size.unwrap_or(self.engine.page_size)
    }

    /// Appends the audit record for an operation's outcome.
    async fn audit<T>(
        &self,
        operation: AuditOperation,
        table: &str,
        metadata: Value,
        outcome: &tablewarden_core::Result<T>,
    ) {
        let (status, metadata) = match outcome {
            Ok(_) => (AuditStatus::Success, metadata),
            Err(e) => (AuditStatus::Failed, with_error(metadata, &e.detail())),
        };
        self.record(operation, table, status, &metadata).await;
    }

    async fn record(
        &self,
        operation: AuditOperation,
        table: &str,
        status: AuditStatus,
        metadata: &Value,
    ) {
        if let Err(e) = self
            .ledger
            .append(self.user.as_deref(), operation, table, status, metadata)
            .await
        {
            warn!("Failed to append {} audit record: {}", operation, e);
        }
    }
}

fn with_error(metadata: Value, error: &str) -> Value {
    match metadata {
        Value::Object(mut map) => {
            map.insert("error".to_string(), Value::String(error.to_string()));
            Value::Object(map)
        }
        other => json!({"request": other, "error": error}),
    }
}

fn parse_row(raw: &str) -> anyhow::Result<Row> {
    serde_json::from_str(raw).context("Row values must be a JSON object")
}

/// Runs the parsed command and returns its JSON output, if any.
pub async fn run(cli: &Cli) -> anyhow::Result<Option<Value>> {
    let ctx = Context::connect(&cli.global).await?;
    let result = dispatch(&ctx, &cli.command).await;
    ctx.adapter.close().await;
    if let Some(audit) = &ctx.audit_adapter {
        audit.close().await;
    }
    result
}

async fn dispatch(ctx: &Context, command: &Command) -> anyhow::Result<Option<Value>> {
    match command {
        Command::Tables => {
            let tables = ctx
                .service
                .list_tables(&ctx.engine.blacklist, ctx.schema.as_deref())
                .await?;
            Ok(Some(json!(tables)))
        }
        Command::Columns { table, fk_data } => {
            let columns = ctx.service.columns(table, *fk_data).await?;
            Ok(Some(json!({
                "table": columns.table,
                "view_columns": columns.view,
                "insert_columns": columns.insert_columns(),
                "pk_columns": columns.pk_columns,
                "fk_columns": columns.fk_columns,
            })))
        }
        Command::Show { table, page } => {
            let page_size = ctx.page_size(page);
            let outcome = ctx.service.get_table_info(table, page.page, page_size).await;
            ctx.audit(
                AuditOperation::ReadTable,
                table,
                json!({"page": page.page, "page_size": page_size}),
                &outcome,
            )
            .await;
            Ok(Some(serde_json::to_value(outcome?)?))
        }
        Command::Search {
            table,
            predicate,
            page,
        } => {
            let page_size = ctx.page_size(page);
            let outcome = ctx
                .service
                .search_table_info(
                    table,
                    &predicate.column,
                    &predicate.operator,
                    &predicate.value,
                    page.page,
                    page_size,
                )
                .await;
            ctx.audit(
                AuditOperation::SearchTable,
                table,
                predicate_metadata(predicate),
                &outcome,
            )
            .await;
            Ok(Some(serde_json::to_value(outcome?)?))
        }
        Command::Add(args) => mutate(ctx, AuditOperation::AddRow, args).await,
        Command::Edit(args) => mutate(ctx, AuditOperation::UpdateRow, args).await,
        Command::Drop(args) => mutate(ctx, AuditOperation::DeleteRow, args).await,
        Command::Audits { page } => {
            let outcome = ctx.ledger.list(page.page, ctx.page_size(page)).await;
            ctx.audit(
                AuditOperation::ReadAudit,
                ctx.ledger.table(),
                json!({"page": page.page}),
                &outcome,
            )
            .await;
            Ok(Some(serde_json::to_value(outcome?)?))
        }
        Command::AuditSearch { predicate, page } => {
            let outcome = ctx
                .ledger
                .search(
                    &predicate.column,
                    &predicate.operator,
                    &predicate.value,
                    page.page,
                    ctx.page_size(page),
                )
                .await;
            ctx.audit(
                AuditOperation::SearchAudit,
                ctx.ledger.table(),
                predicate_metadata(predicate),
                &outcome,
            )
            .await;
            Ok(Some(serde_json::to_value(outcome?)?))
        }
        Command::Upload { table, file } => upload(ctx, table, file).await.map(Some),
        Command::Export {
            table,
            template,
            output,
        } => {
            let (mode, operation) = if *template {
                (ExportMode::Template, AuditOperation::DownloadTemplate)
            } else {
                (ExportMode::Data, AuditOperation::DownloadData)
            };
            let limit = ctx.engine.export_limit;
            let mut csv = Vec::new();
            let outcome = ctx.service.export_table(table, mode, limit, &mut csv).await;
            ctx.audit(operation, table, json!({"limit": limit}), &outcome)
                .await;
            let rows = outcome?;

            match output {
                Some(path) => {
                    tokio::fs::write(path, &csv)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote {} row(s) to {}", rows, path.display());
                    Ok(Some(json!({"rows": rows, "output": path.display().to_string()})))
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&csv).await?;
                    stdout.flush().await?;
                    Ok(None)
                }
            }
        }
        Command::Reconcile { dry_run } => {
            let reconciler = reconciler(ctx);
            if *dry_run {
                Ok(Some(serde_json::to_value(reconciler.pending_loads().await?)?))
            } else {
                Ok(Some(serde_json::to_value(reconciler.reconcile().await?)?))
            }
        }
        Command::Schedule => {
            let reconciler = reconciler(ctx);
            reconciler
                .run_scheduled(ctx.engine.reconcile_interval, shutdown_signal())
                .await?;
            Ok(None)
        }
        Command::InitAudit => {
            ctx.ledger.ensure_table().await?;
            Ok(Some(json!({"audit_table": ctx.ledger.table()})))
        }
        Command::Test => {
            ctx.adapter.test_connection().await.map_err(|e| {
                error!("Connection test failed: {}", e);
                e
            })?;
            Ok(Some(json!({
                "database_type": ctx.adapter.database_type().to_string(),
                "status": "ok",
            })))
        }
    }
}

fn predicate_metadata(predicate: &PredicateArgs) -> Value {
    json!({
        "column": predicate.column,
        "operator": predicate.operator,
        "value": predicate.value,
    })
}

async fn mutate(
    ctx: &Context,
    operation: AuditOperation,
    args: &RowArgs,
) -> anyhow::Result<Option<Value>> {
    let values = parse_row(&args.values)?;
    let outcome = match operation {
        AuditOperation::AddRow => ctx.service.add_record(&args.table, &values).await,
        AuditOperation::UpdateRow => ctx.service.edit_record(&args.table, &values).await,
        _ => ctx.service.drop_record(&args.table, &values).await,
    };
    ctx.audit(operation, &args.table, Value::Object(values), &outcome)
        .await;
    Ok(Some(json!({"rows_affected": outcome?})))
}

/// Stages the file and records the UPLOADED event the reconciler picks up.
async fn upload(ctx: &Context, table: &str, file: &Path) -> anyhow::Result<Value> {
    // Reject unknown tables before staging anything
    ctx.service.columns(table, false).await?;

    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let original_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");

    let uploads = UploadStore::new(&ctx.engine.upload_dir);
    let staged = uploads.stage(original_name, &contents).await?;
    ctx.record(
        AuditOperation::BulkUpload,
        table,
        AuditStatus::Uploaded,
        &json!({"file_name": staged.file_name, "original_file_name": original_name}),
    )
    .await;

    Ok(json!({"table": table, "file_name": staged.file_name}))
}

fn reconciler(ctx: &Context) -> BulkLoadReconciler {
    BulkLoadReconciler::new(
        ctx.service.clone(),
        ctx.ledger.clone(),
        UploadStore::new(&ctx.engine.upload_dir),
        ctx.engine.max_failures,
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_error_extends_metadata() {
        assert_eq!(
            with_error(json!({"page": 1}), "boom"),
            json!({"page": 1, "error": "boom"})
        );
        assert_eq!(
            with_error(json!("raw"), "boom"),
            json!({"request": "raw", "error": "boom"})
        );
    }

    #[test]
    fn test_parse_row_requires_object() {
        assert!(parse_row(r#"{"department_id": "HR"}"#).is_ok());
        assert!(parse_row("[1, 2]").is_err());
        assert!(parse_row("not json").is_err());
    }

    #[cfg(feature = "sqlite")]
    async fn run_args(args: &[String]) -> anyhow::Result<Option<Value>> {
        use clap::Parser;
        let argv = std::iter::once("tablewarden").chain(args.iter().map(String::as_str));
        run(&Cli::try_parse_from(argv)?).await
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_cli_commands_append_audit_records() -> anyhow::Result<()> {
        use tablewarden_core::{ConnectionConfig, Statement};

        let dir = tempfile::tempdir()?;
        let db = dir.path().join("hr.db");
        let url = db.display().to_string();
        let uploads = dir.path().join("uploads");
        let uploads = uploads.display().to_string();

        let adapter = create_adapter(&url, &ConnectionConfig::default()).await?;
        adapter
            .execute(&Statement {
                sql: "CREATE TABLE departments (department_id VARCHAR(10) PRIMARY KEY, \
                      department_type VARCHAR(50))"
                    .to_string(),
                params: Vec::new(),
            })
            .await?;
        adapter.close().await;

        let base = ["--database-url", url.as_str(), "--upload-dir", uploads.as_str()];
        let with = |rest: &[&str]| -> Vec<String> {
            let mut args: Vec<String> = base.iter().map(|s| (*s).to_string()).collect();
            args.extend(rest.iter().map(|s| (*s).to_string()));
            args
        };

        run_args(&with(&["init-audit"])).await?;
        let added = run_args(&with(&[
            "--user",
            "alice",
            "add",
            "departments",
            r#"{"department_id": "IT_WK", "department_type": "Work Place"}"#,
        ]))
        .await?;
        assert_eq!(added, Some(json!({"rows_affected": 1})));

        // A failing command still records its attempt
        assert!(
            run_args(&with(&["add", "departments", r#"{"unknown": 1}"#]))
                .await
                .is_err()
        );

        let audits = run_args(&with(&["audits", "--size", "10"])).await?.unwrap_or_default();
        let records = audits["records"].as_array().cloned().unwrap_or_default();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["audit_user"], json!("alice"));
        assert_eq!(records[0]["operation_performed"], json!("ADD_ROW"));
        assert_eq!(records[0]["operation_status"], json!("SUCCESS"));
        assert_eq!(records[1]["audit_user"], json!("ANONYMOUS"));
        assert_eq!(records[1]["operation_status"], json!("FAILED"));

        let csv = dir.path().join("departments.csv");
        std::fs::write(&csv, "department_id,department_type\nHR,Office\n")?;
        let csv = csv.display().to_string();
        let staged = run_args(&with(&["upload", "departments", csv.as_str()]))
            .await?
            .unwrap_or_default();
        assert!(staged["file_name"].as_str().is_some_and(|n| n.ends_with(".csv")));

        let report = run_args(&with(&["reconcile"])).await?.unwrap_or_default();
        assert_eq!(report["outcomes"][0]["rows_inserted"], json!(1));

        let page = run_args(&with(&["show", "departments"])).await?.unwrap_or_default();
        assert_eq!(page["table_count"], json!(2));
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn create_table(url: &str, sql: &str) -> anyhow::Result<()> {
        use tablewarden_core::{ConnectionConfig, Statement};

        let adapter = create_adapter(url, &ConnectionConfig::default()).await?;
        adapter
            .execute(&Statement {
                sql: sql.to_string(),
                params: Vec::new(),
            })
            .await?;
        adapter.close().await;
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_cli_separate_audit_database() -> anyhow::Result<()> {
        use tablewarden_core::ConnectionConfig;

        let dir = tempfile::tempdir()?;
        let data_url = dir.path().join("hr.db").display().to_string();
        let audit_url = dir.path().join("audit.db").display().to_string();
        create_table(
            &data_url,
            "CREATE TABLE departments (department_id VARCHAR(10) PRIMARY KEY, \
             department_type VARCHAR(50) NOT NULL)",
        )
        .await?;

        let with = |rest: &[&str]| -> Vec<String> {
            let mut args: Vec<String> = [
                "--database-url",
                data_url.as_str(),
                "--audit-database-url",
                audit_url.as_str(),
                "--create-audit-table",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
            args.extend(rest.iter().map(|s| (*s).to_string()));
            args
        };

        // NOT NULL violation: the driver message reaches the FAILED record
        assert!(
            run_args(&with(&["add", "departments", r#"{"department_id": "HR"}"#]))
                .await
                .is_err()
        );
        run_args(&with(&[
            "add",
            "departments",
            r#"{"department_id": "HR", "department_type": "Office"}"#,
        ]))
        .await?;

        let audits = run_args(&with(&["audits"])).await?.unwrap_or_default();
        assert_eq!(audits["total"], json!(2));
        let error = audits["records"][0]["operation_metadata"]["error"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        assert!(error.contains("NOT NULL"), "{error}");

        // The ledger lives only in the audit database
        let data = create_adapter(&data_url, &ConnectionConfig::default()).await?;
        assert_eq!(data.list_tables(&[], None).await?, vec!["departments"]);
        data.close().await;
        let audit = create_adapter(&audit_url, &ConnectionConfig::default()).await?;
        assert_eq!(audit.list_tables(&[], None).await?, vec!["sct_audits"]);
        audit.close().await;

        let out = dir.path().join("departments.csv");
        let out_arg = out.display().to_string();
        let exported = run_args(&with(&["export", "departments", "--output", out_arg.as_str()]))
            .await?
            .unwrap_or_default();
        assert_eq!(exported["rows"], json!(1));
        assert_eq!(
            std::fs::read_to_string(&out)?,
            "department_id,department_type\nHR,Office\n"
        );
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_cli_refuses_ledger_edits() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let url = dir.path().join("hr.db").display().to_string();
        let args = |rest: &[&str]| -> Vec<String> {
            let mut args = vec![
                "--database-url".to_string(),
                url.clone(),
                "--create-audit-table".to_string(),
            ];
            args.extend(rest.iter().map(|s| (*s).to_string()));
            args
        };

        run_args(&args(&["init-audit"])).await?;
        let tables = run_args(&args(&["tables"])).await?.unwrap_or_default();
        assert_eq!(tables, json!([]));

        let edit = run_args(&args(&[
            "edit",
            "sct_audits",
            r#"{"audit_id": 1, "operation_status": "SUCCESS"}"#,
        ]))
        .await;
        assert!(edit.is_err());

        let audits = run_args(&args(&["audits"])).await?.unwrap_or_default();
        assert_eq!(audits["records"][0]["operation_performed"], json!("UPDATE_ROW"));
        assert_eq!(audits["records"][0]["operation_status"], json!("FAILED"));
        Ok(())
    }
}
