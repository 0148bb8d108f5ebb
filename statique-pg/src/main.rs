//! Point d'entrée CLI pour statique-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, UnitsCommand};

/// Importer les données statiques IRVE dans PostgreSQL/PostGIS
#[derive(Parser)]
#[command(name = "statique-pg")]
#[command(author, version)]
#[command(about = "Importer les données statiques IRVE dans PostgreSQL/PostGIS")]
#[command(long_about = "Valide un fichier IRVE statique et le réconcilie avec le schéma normalisé \
(aménageurs, opérateurs, enseignes, localisations, stations, points de charge).")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Import {
            path,
            schema,
            config,
            force,
            dry_run,
            report,
            db,
        } => {
            info!(path = %path.display(), schema = %schema, "Import vers PostgreSQL");
            cli::cmd_import(&path, &schema, &config, force, dry_run, report.as_deref(), db).await?;
        }
        Commands::Validate {
            path,
            config,
            report,
        } => {
            info!(path = %path.display(), "Validation");
            cli::cmd_validate(&path, &config, report.as_deref())?;
        }
        Commands::Init {
            schema,
            drop_schema,
            db,
        } => {
            cli::cmd_init(&schema, drop_schema, db).await?;
        }
        Commands::Units { command } => match command {
            UnitsCommand::Load { path, schema, db } => {
                cli::cmd_units_load(&path, &schema, db).await?;
            }
            UnitsCommand::List { schema, db } => {
                cli::cmd_units_list(&schema, db).await?;
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
