//! TableWarden operator CLI.
//!
//! Browses, edits and exports tables in PostgreSQL, MySQL or SQLite
//! databases, records every data operation in the audit ledger, and runs
//! the bulk-load reconciler once or on a schedule.
//!
//! # Security Guarantees
//! - Every value reaches the database as a bind parameter
//! - No credentials stored or logged
//! - Output is JSON on stdout; logs go to stderr

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tablewarden_core::{ConnectionConfig, EngineConfig, logging::init_logging};

#[derive(Parser)]
#[command(name = "tablewarden")]
#[command(about = "Relational table administration with an audit ledger")]
#[command(version)]
#[command(long_about = "
TableWarden - audited table administration

Introspects tables across database engines, pages through and edits their
rows, and records each operation in an append-only audit ledger. Uploaded
CSV files are loaded by a reconciler that uses the ledger as its job store.

SUPPORTED DATABASES:
- PostgreSQL (postgres://)
- MySQL (mysql://)
- SQLite (sqlite:// or .db/.sqlite files)

EXAMPLES:
  tablewarden --database-url postgres://localhost/hr tables
  tablewarden show departments --page 2
  tablewarden search departments department_type like Work
  tablewarden add departments '{\"department_id\": \"IT_WK\"}'
  tablewarden upload departments ./departments.csv
  tablewarden schedule
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Database connection URL
    #[arg(
        long,
        env = "SCT_DATABASE_URL",
        global = true,
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: Option<String>,

    /// Schema whose tables are listed
    #[arg(long, env = "SCT_SCHEMA", global = true)]
    pub schema: Option<String>,

    /// User recorded in the audit ledger
    #[arg(long, env = "SCT_USER", global = true)]
    pub user: Option<String>,

    #[arg(long, env = "SCT_PAGE_SIZE", default_value_t = 5, global = true)]
    pub page_size: u64,

    /// Comma-separated substrings; matching tables are hidden
    #[arg(long, env = "SCT_BLACKLIST", default_value = "", global = true)]
    pub blacklist: String,

    /// FAILED attempts after which a bulk load is abandoned
    #[arg(long, env = "SCT_MAX_FAILURES", default_value_t = 1, global = true)]
    pub max_failures: u32,

    #[arg(long, env = "SCT_AUDIT_TABLE", default_value = "sct_audits", global = true)]
    pub audit_table: String,

    /// Database holding the audit ledger (defaults to the data database)
    #[arg(long, env = "SCT_AUDIT_DATABASE_URL", global = true)]
    pub audit_database_url: Option<String>,

    /// Schema holding the audit ledger (PostgreSQL)
    #[arg(long, env = "SCT_AUDIT_SCHEMA", global = true)]
    pub audit_schema: Option<String>,

    /// Create the audit table on startup when missing
    #[arg(long, env = "SCT_CREATE_AUDIT_TABLE", global = true)]
    pub create_audit_table: bool,

    #[arg(long, env = "SCT_UPLOAD_DIR", default_value = "static/uploads", global = true)]
    pub upload_dir: PathBuf,

    /// Seconds between scheduled reconciliation ticks
    #[arg(long, env = "SCT_RECONCILE_INTERVAL", default_value_t = 720, global = true)]
    pub reconcile_interval: u64,

    /// Maximum rows written by a data export
    #[arg(long, env = "SCT_EXPORT_LIMIT", default_value_t = 2000, global = true)]
    pub export_limit: u64,

    #[arg(long, env = "SCT_MAX_CONNECTIONS", default_value_t = 10, global = true)]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[arg(long, env = "SCT_CONNECT_TIMEOUT", default_value_t = 30, global = true)]
    pub connect_timeout: u64,

    /// Statement timeout in seconds
    #[arg(long, env = "SCT_QUERY_TIMEOUT", default_value_t = 30, global = true)]
    pub query_timeout: u64,

    /// Open the database session read-only
    #[arg(long, env = "SCT_READ_ONLY", global = true)]
    pub read_only: bool,

    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logging except errors")]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

impl GlobalArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_page_size(self.page_size)
            .with_blacklist(EngineConfig::parse_blacklist(&self.blacklist))
            .with_max_failures(self.max_failures)
            .with_audit_table(self.audit_table.clone())
            .with_create_audit_table(self.create_audit_table)
            .with_upload_dir(self.upload_dir.clone())
            .with_reconcile_interval(Duration::from_secs(self.reconcile_interval))
            .with_export_limit(self.export_limit)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::default()
            .with_max_connections(self.max_connections)
            .with_read_only(self.read_only);
        if let Some(schema) = &self.schema {
            config = config.with_schema(schema.clone());
        }
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.query_timeout = Duration::from_secs(self.query_timeout);
        config
    }

    /// Whether the ledger needs its own connection.
    pub fn separate_audit_store(&self) -> bool {
        self.audit_database_url.is_some() || self.audit_schema.is_some()
    }

    /// Settings for the ledger connection.
    ///
    /// The ledger is always writable, and uses the audit schema or the
    /// backend default rather than the data schema.
    pub fn audit_connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::default().with_max_connections(self.max_connections);
        if let Some(schema) = &self.audit_schema {
            config = config.with_schema(schema.clone());
        }
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.query_timeout = Duration::from_secs(self.query_timeout);
        config
    }
}

#[derive(Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u64,

    /// Overrides the configured page size
    #[arg(long = "size")]
    pub size: Option<u64>,
}

#[derive(Args)]
pub struct PredicateArgs {
    pub column: String,

    /// One of =, !=, <>, <, <=, >, >=, like
    pub operator: String,

    pub value: String,
}

#[derive(Args)]
pub struct RowArgs {
    pub table: String,

    /// Column values as a JSON object
    pub values: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// List tables (blacklisted tables hidden)
    Tables,
    /// Show column, key and foreign key metadata
    Columns {
        table: String,
        /// Load distinct referenced values for each foreign key
        #[arg(long)]
        fk_data: bool,
    },
    /// Show one page of a table
    Show {
        table: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Search a table by one column
    Search {
        table: String,
        #[command(flatten)]
        predicate: PredicateArgs,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Insert a row
    Add(RowArgs),
    /// Update a row by primary key
    Edit(RowArgs),
    /// Delete a row by primary key (or full-row match without one)
    Drop(RowArgs),
    /// Show one page of the audit ledger
    Audits {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Search the audit ledger by one column
    AuditSearch {
        #[command(flatten)]
        predicate: PredicateArgs,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Stage a CSV file for bulk load into a table
    Upload { table: String, file: PathBuf },
    /// Export table rows, or an insert template, as CSV
    Export {
        table: String,
        /// Write only the insert-column header
        #[arg(long)]
        template: bool,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one reconciliation tick
    Reconcile {
        /// List pending loads without loading them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the reconciler on its interval until interrupted
    Schedule,
    /// Create the audit ledger table
    InitAudit,
    /// Test database connection
    Test,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.json_logs)?;

    let output = commands::run(&cli).await?;
    if let Some(output) = output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
