//! Enchaînement complet de l'import d'un fichier
//!
//! Lecture et validation, politique sur les lignes invalides, saut des
//! fichiers déjà importés, puis réconciliation dans une seule transaction.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use tracing::{info, warn};

use crate::config::{FeedConfig, InvalidRowPolicy};
use crate::db::checksums::{
    compute_file_checksum, feed_name, is_feed_already_imported, record_feed_checksum,
};
use crate::db::ImportTransaction;
use crate::importer::{ImportPlan, StatiqueImporter};
use crate::report::ImportReport;

/// Options d'un import
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Schéma PostgreSQL cible
    pub schema: String,
    /// Profil du fichier
    pub feed: FeedConfig,
    /// Réimporter même si le checksum est connu
    pub force: bool,
    /// Annuler la transaction en fin d'import
    pub dry_run: bool,
}

/// Lit et valide un fichier, applique la politique sur les lignes invalides
///
/// Retourne les lignes valides, ou `None` si le lot est rejeté. Les erreurs
/// du fichier lui-même (encodage, colonne manquante, CSV illisible) sont
/// consignées comme erreurs fatales dans le rapport.
fn read_feed(path: &Path, feed: &FeedConfig, report: &mut ImportReport) -> Result<Option<irve::ParseResult>> {
    let parse_options = feed.parse_options()?;
    let parsed = match irve::parse(path, &parse_options) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Feed could not be read, rejecting batch");
            report.record_fatal(format!("Failed to read {}: {}", path.display(), e));
            return Ok(None);
        }
    };

    report.record_parse(parsed.rows_read, parsed.records.len(), &parsed.errors);

    if !parsed.is_clean() && feed.on_invalid == InvalidRowPolicy::Reject {
        warn!(invalid = parsed.errors.len(), "Invalid rows found, rejecting batch");
        report.record_fatal(format!(
            "{} invalid rows, batch rejected",
            parsed.errors.len()
        ));
        return Ok(None);
    }

    if parsed.records.is_empty() && !parsed.is_clean() {
        warn!(invalid = parsed.errors.len(), "No valid rows left, rejecting batch");
        report.record_fatal("no valid rows, batch rejected");
        return Ok(None);
    }

    Ok(Some(parsed))
}

/// Valide un fichier sans base de données
///
/// Les incohérences entre lignes (même station décrite différemment) sont
/// détectées comme à l'import.
pub fn validate_feed(path: &Path, feed: &FeedConfig) -> Result<ImportReport> {
    let started = Instant::now();
    let mut report = ImportReport::new(&feed_name(path));
    report.validate_only = true;

    if let Some(parsed) = read_feed(path, feed, &mut report)? {
        if let Err(e) = ImportPlan::build(&parsed.statiques()) {
            report.record_fatal(e.to_string());
        }
    }

    report.set_duration(started.elapsed());
    report.finalize(false);
    Ok(report)
}

/// Importe un fichier dans le schéma cible
///
/// Les erreurs métier (lot rejeté, unité inconnue, incohérence) sont
/// consignées dans le rapport; seules les erreurs d'infrastructure sont
/// retournées.
pub async fn import_feed(pool: &Pool, path: &Path, options: &ImportOptions) -> Result<ImportReport> {
    let started = Instant::now();
    let name = feed_name(path);
    let mut report = ImportReport::new(&name);
    report.dry_run = options.dry_run;

    info!(
        feed = %name,
        schema = %options.schema,
        force = options.force,
        dry_run = options.dry_run,
        "Starting import"
    );

    let parsed = match read_feed(path, &options.feed, &mut report)? {
        Some(parsed) => parsed,
        None => {
            report.set_duration(started.elapsed());
            report.finalize(false);
            return Ok(report);
        }
    };

    let checksum = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || compute_file_checksum(&path)
    })
    .await
    .context("Checksum task failed")??;
    report.checksum = Some(checksum.clone());

    let mut client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    let tx = ImportTransaction::begin(&mut client, &name).await?;

    if !options.force
        && is_feed_already_imported(tx.transaction(), &options.schema, &name, &checksum).await?
    {
        info!(feed = %name, "Feed unchanged since last import, skipping");
        report.skipped = true;
        tx.commit().await?;
        report.set_duration(started.elapsed());
        report.finalize(false);
        return Ok(report);
    }

    let mut importer = StatiqueImporter::new(parsed.statiques(), &options.schema);
    let mut rolled_back = false;

    match importer.save(tx.transaction()).await {
        Ok(summary) => {
            report.record_summary(&summary);
            if options.dry_run {
                tx.rollback("dry run").await;
                rolled_back = true;
            } else {
                record_feed_checksum(tx.transaction(), &options.schema, &name, &checksum).await?;
                tx.commit().await?;
            }
        }
        Err(e) => {
            let reason = e.to_string();
            report.record_fatal(reason.clone());
            tx.rollback(&reason).await;
            rolled_back = true;
        }
    }

    report.set_duration(started.elapsed());
    report.finalize(rolled_back);

    info!(
        feed = %name,
        status = ?report.status,
        duration_secs = report.duration_secs,
        "Import finished"
    );

    Ok(report)
}
