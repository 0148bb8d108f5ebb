//! Définition et implémentation des commandes CLI
//!
//! - `import`: fichier statique → PostgreSQL/PostGIS
//! - `validate`: validation seule (sans DB)
//! - `init`: création du schéma
//! - `units`: registre des unités opérationnelles

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use deadpool_postgres::Pool;
use tracing::info;

use statique_pg::config::FeedConfig;
use statique_pg::db::{self, units, DatabaseConfig, DEFAULT_SCHEMA};
use statique_pg::import::{import_feed, validate_feed, ImportOptions};
use statique_pg::report::{ImportReport, ImportStatus};

/// Paramètres de connexion PostgreSQL
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / qualicharge)
    #[arg(long)]
    database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    ssl: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a static IRVE feed into PostgreSQL
    Import {
        /// Path to the CSV feed
        #[arg(short, long)]
        path: PathBuf,

        /// Target PostgreSQL schema
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: String,

        /// Config preset name (qualicharge/consolidation) or path to a JSON config
        #[arg(long, default_value = "qualicharge")]
        config: String,

        /// Re-import even if the feed checksum is already known
        #[arg(long)]
        force: bool,

        /// Run the import then roll back
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Validate a static IRVE feed (no database required)
    Validate {
        /// Path to the CSV feed
        #[arg(short, long)]
        path: PathBuf,

        /// Config preset name or path to a JSON config
        #[arg(long, default_value = "qualicharge")]
        config: String,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Create the schema, tables and indexes
    Init {
        /// Target PostgreSQL schema
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: String,

        /// Drop the schema first
        #[arg(long)]
        drop_schema: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Manage the operational unit registry
    Units {
        #[command(subcommand)]
        command: UnitsCommand,
    },
}

#[derive(Subcommand)]
pub enum UnitsCommand {
    /// Load operational units from a CSV file (code,name,type)
    Load {
        /// Path to the CSV file
        path: PathBuf,

        /// Target PostgreSQL schema
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: String,

        #[command(flatten)]
        db: DbArgs,
    },

    /// List registered operational units
    List {
        /// Target PostgreSQL schema
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: String,

        #[command(flatten)]
        db: DbArgs,
    },
}

async fn connect(args: DbArgs) -> Result<Pool> {
    let mut config = DatabaseConfig::from_env();
    config.apply_overrides(
        args.host,
        args.database,
        args.user,
        args.password,
        args.port,
        args.ssl,
    )?;
    println!(
        "Database: {}@{}:{}/{} (SSL: {:?})",
        config.user, config.host, config.port, config.dbname, config.ssl_mode
    );

    let pool = db::create_pool(&config).await?;
    db::test_connection(&pool).await?;
    Ok(pool)
}

fn finish(report: &ImportReport, output: Option<&Path>) -> Result<()> {
    report.display();

    if let Some(path) = output {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    match report.status {
        ImportStatus::Failed => anyhow::bail!("{}", report.summary()),
        _ => Ok(()),
    }
}

/// Exécute la commande import
pub async fn cmd_import(
    path: &Path,
    schema: &str,
    config_spec: &str,
    force: bool,
    dry_run: bool,
    report_path: Option<&Path>,
    db_args: DbArgs,
) -> Result<()> {
    db::schema::validate_identifier(schema)?;
    let feed = FeedConfig::resolve(config_spec)?;

    println!("=== Import {} ===", path.display());
    println!("Schema: {}", schema);
    println!("Config: {}", config_spec);
    println!("Invalid rows: {:?}", feed.on_invalid);
    println!("Force: {}", force);
    println!("Dry run: {}", dry_run);

    let pool = connect(db_args).await?;
    println!("Connected to PostgreSQL");

    let options = ImportOptions {
        schema: schema.to_string(),
        feed,
        force,
        dry_run,
    };
    let report = import_feed(&pool, path, &options).await?;

    finish(&report, report_path)
}

/// Exécute la commande validate
pub fn cmd_validate(path: &Path, config_spec: &str, report_path: Option<&Path>) -> Result<()> {
    let feed = FeedConfig::resolve(config_spec)?;
    let report = validate_feed(path, &feed)?;

    finish(&report, report_path)
}

/// Exécute la commande init
pub async fn cmd_init(schema: &str, drop_schema: bool, db_args: DbArgs) -> Result<()> {
    let pool = connect(db_args).await?;
    db::create_schema(&pool, schema, drop_schema).await?;
    println!("Schema {} ready", schema);
    Ok(())
}

/// Charge le registre des unités opérationnelles
pub async fn cmd_units_load(path: &Path, schema: &str, db_args: DbArgs) -> Result<()> {
    db::schema::validate_identifier(schema)?;
    let loaded = units::load_units_csv(path)?;

    let pool = connect(db_args).await?;
    let mut client = pool.get().await.context("Failed to get connection from pool")?;
    let tx = client.transaction().await.context("Failed to begin transaction")?;
    let created = units::upsert_units(&tx, schema, &loaded).await?;
    tx.commit().await.context("Failed to commit operational units")?;

    println!(
        "Operational units: {} loaded, {} created, {} updated",
        loaded.len(),
        created,
        loaded.len() - created
    );
    Ok(())
}

/// Affiche le registre des unités opérationnelles
pub async fn cmd_units_list(schema: &str, db_args: DbArgs) -> Result<()> {
    db::schema::validate_identifier(schema)?;
    let pool = connect(db_args).await?;
    let mut client = pool.get().await.context("Failed to get connection from pool")?;
    let tx = client.transaction().await.context("Failed to begin transaction")?;
    let registered = units::list_units(&tx, schema).await?;
    tx.commit().await?;

    for unit in &registered {
        println!("{}\t{}\t{}", unit.code, unit.unit_type.as_str(), unit.name);
    }
    println!("{} operational units", registered.len());
    Ok(())
}
