//! Rapport d'import
//!
//! Collecte les lignes rejetées, les compteurs par entité et le statut
//! final d'un import, pour affichage console ou export JSON.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use irve::RowError;

use crate::importer::ImportSummary;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Import réussi sans erreur
    Success,
    /// Import réussi, lignes invalides ignorées
    PartialSuccess,
    /// Import annulé (rollback, dry-run)
    RolledBack,
    /// Import échoué
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Erreur fatale: lot abandonné
    Fatal,
    /// Erreur: ligne ignorée
    Error,
}

/// Erreur d'import avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct ImportError {
    pub level: ErrorLevel,
    /// Numéro de ligne dans le fichier (optionnel)
    pub row: Option<usize>,
    /// Colonne concernée (optionnel)
    pub column: Option<String>,
    pub message: String,
}

impl ImportError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            level: ErrorLevel::Fatal,
            row: None,
            column: None,
            message: message.into(),
        }
    }
}

impl From<&RowError> for ImportError {
    fn from(e: &RowError) -> Self {
        Self {
            level: ErrorLevel::Error,
            row: Some(e.row),
            column: Some(e.column.clone()),
            message: e.reason.clone(),
        }
    }
}

/// Statistiques par type d'entité
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl TypeStats {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Rapport complet d'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Nom du fichier importé
    pub feed: String,
    /// Checksum blake3 du fichier
    pub checksum: Option<String>,
    pub duration_secs: f64,
    pub status: ImportStatus,
    /// Import simulé (annulé en fin de transaction)
    pub dry_run: bool,
    /// Fichier déjà importé à l'identique
    pub skipped: bool,
    /// Validation seule, sans base de données
    pub validate_only: bool,

    /// Lignes de données lues
    pub rows_read: usize,
    /// Lignes valides
    pub rows_valid: usize,
    /// Lignes rejetées à la validation
    pub rows_invalid: usize,

    /// Statistiques par type d'entité
    pub by_entity: HashMap<String, TypeStats>,

    pub errors: Vec<ImportError>,
}

impl Default for ImportReport {
    fn default() -> Self {
        Self {
            feed: String::new(),
            checksum: None,
            duration_secs: 0.0,
            status: ImportStatus::Success,
            dry_run: false,
            skipped: false,
            validate_only: false,
            rows_read: 0,
            rows_valid: 0,
            rows_invalid: 0,
            by_entity: HashMap::new(),
            errors: Vec::new(),
        }
    }
}

impl ImportReport {
    /// Crée un nouveau rapport pour un fichier
    pub fn new(feed: &str) -> Self {
        Self {
            feed: feed.to_string(),
            ..Default::default()
        }
    }

    /// Enregistre le résultat de la validation
    pub fn record_parse(&mut self, rows_read: usize, rows_valid: usize, errors: &[RowError]) {
        self.rows_read = rows_read;
        self.rows_valid = rows_valid;
        self.rows_invalid = rows_read.saturating_sub(rows_valid);
        self.errors.extend(errors.iter().map(ImportError::from));
    }

    /// Enregistre les compteurs de l'importeur
    pub fn record_summary(&mut self, summary: &ImportSummary) {
        for (entity, upserts) in summary.entities() {
            let stats = self.by_entity.entry(entity.to_string()).or_default();
            stats.inserted += upserts.inserted;
            stats.updated += upserts.updated;
            stats.unchanged += upserts.unchanged;
        }
    }

    /// Enregistre une erreur fatale
    pub fn record_fatal(&mut self, message: impl Into<String>) {
        self.errors.push(ImportError::fatal(message));
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    ///
    /// `rolled_back` indique que la transaction a été annulée sans erreur
    /// fatale (dry-run). En validation seule, les lignes valides comptent
    /// comme succès puisque rien n'est écrit.
    pub fn finalize(&mut self, rolled_back: bool) {
        let has_fatal = self.errors.iter().any(|e| e.level == ErrorLevel::Fatal);
        let has_errors = !self.errors.is_empty();
        let has_success = self.total_entities() > 0
            || self.skipped
            || (self.validate_only && self.rows_valid > 0);

        self.status = if has_fatal {
            ImportStatus::Failed
        } else if rolled_back {
            ImportStatus::RolledBack
        } else if has_errors && has_success {
            ImportStatus::PartialSuccess
        } else if has_errors {
            ImportStatus::Failed
        } else {
            ImportStatus::Success
        };
    }

    /// Nombre total d'entités traitées
    pub fn total_entities(&self) -> usize {
        self.by_entity.values().map(TypeStats::total).sum()
    }

    fn totals(&self) -> TypeStats {
        self.by_entity
            .values()
            .fold(TypeStats::default(), |mut acc, s| {
                acc.inserted += s.inserted;
                acc.updated += s.updated;
                acc.unchanged += s.unchanged;
                acc
            })
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("IMPORT REPORT - {}", self.feed);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if self.dry_run {
            println!("Dry run: changes rolled back");
        }
        if self.skipped {
            println!("Skipped: feed already imported with the same checksum");
        }

        println!("\n--- SUMMARY ---");
        println!(
            "Rows: {} read, {} valid, {} invalid",
            self.rows_read, self.rows_valid, self.rows_invalid
        );
        let totals = self.totals();
        println!(
            "Entities: {} inserted, {} updated, {} unchanged",
            totals.inserted, totals.updated, totals.unchanged
        );

        if !self.by_entity.is_empty() {
            println!("\n--- BY ENTITY ---");
            let mut entities: Vec<_> = self.by_entity.iter().collect();
            entities.sort_by_key(|(k, _)| k.as_str());
            for (name, stats) in entities {
                println!(
                    "  {}: {} inserted, {} updated, {} unchanged",
                    name, stats.inserted, stats.updated, stats.unchanged
                );
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                let location = match (&e.row, &e.column) {
                    (Some(row), Some(column)) => format!("[row {}:{}]", row, column),
                    (Some(row), None) => format!("[row {}]", row),
                    _ => String::new(),
                };
                println!("  {:?} {} {}", e.level, location, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let totals = self.totals();
        format!(
            "{}: {} inserted, {} updated, {} unchanged, {} errors",
            self.feed,
            totals.inserted,
            totals.updated,
            totals.unchanged,
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::UpsertResult;

    fn summary() -> ImportSummary {
        let mut summary = ImportSummary::default();
        summary.station.record(UpsertResult::Inserted);
        summary.pointdecharge.record(UpsertResult::Inserted);
        summary.pointdecharge.record(UpsertResult::Unchanged);
        summary
    }

    #[test]
    fn test_import_report_default() {
        let report = ImportReport::default();
        assert_eq!(report.status, ImportStatus::Success);
        assert_eq!(report.rows_read, 0);
        assert_eq!(report.total_entities(), 0);
    }

    #[test]
    fn test_record_summary() {
        let mut report = ImportReport::new("irve.csv");
        report.record_summary(&summary());

        assert_eq!(report.total_entities(), 3);
        assert_eq!(report.by_entity.get("station").unwrap().inserted, 1);
        assert_eq!(report.by_entity.get("pointdecharge").unwrap().unchanged, 1);
        assert_eq!(report.by_entity.get("amenageur").unwrap().total(), 0);
    }

    #[test]
    fn test_record_parse() {
        let mut report = ImportReport::new("irve.csv");
        let errors = vec![RowError::new(3, "nbre_pdc", "'x' is not an integer")];
        report.record_parse(10, 9, &errors);

        assert_eq!(report.rows_invalid, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].level, ErrorLevel::Error);
        assert_eq!(report.errors[0].row, Some(3));
        assert_eq!(report.errors[0].column.as_deref(), Some("nbre_pdc"));
    }

    #[test]
    fn test_finalize_success() {
        let mut report = ImportReport::new("irve.csv");
        report.record_summary(&summary());
        report.finalize(false);

        assert_eq!(report.status, ImportStatus::Success);
    }

    #[test]
    fn test_finalize_partial_success() {
        let mut report = ImportReport::new("irve.csv");
        report.record_parse(2, 1, &[RowError::new(3, "horaires", "invalid")]);
        report.record_summary(&summary());
        report.finalize(false);

        assert_eq!(report.status, ImportStatus::PartialSuccess);
    }

    #[test]
    fn test_finalize_validate_only_partial_success() {
        let mut report = ImportReport::new("irve.csv");
        report.validate_only = true;
        report.record_parse(2, 1, &[RowError::new(3, "horaires", "invalid")]);
        report.finalize(false);

        assert_eq!(report.status, ImportStatus::PartialSuccess);
    }

    #[test]
    fn test_finalize_validate_only_without_valid_rows() {
        let mut report = ImportReport::new("irve.csv");
        report.validate_only = true;
        report.record_parse(1, 0, &[RowError::new(2, "horaires", "invalid")]);
        report.finalize(false);

        assert_eq!(report.status, ImportStatus::Failed);
    }

    #[test]
    fn test_finalize_failed() {
        let mut report = ImportReport::new("irve.csv");
        report.record_summary(&summary());
        report.record_fatal("unknown operational units: FRS63");
        report.finalize(true);

        assert_eq!(report.status, ImportStatus::Failed);
    }

    #[test]
    fn test_finalize_dry_run() {
        let mut report = ImportReport::new("irve.csv");
        report.record_summary(&summary());
        report.finalize(true);

        assert_eq!(report.status, ImportStatus::RolledBack);
    }

    #[test]
    fn test_save_to_file() {
        let mut report = ImportReport::new("irve.csv");
        report.record_summary(&summary());
        report.finalize(false);

        let file = tempfile::NamedTempFile::new().unwrap();
        report.save_to_file(file.path()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(json["status"], "Success");
        assert_eq!(json["by_entity"]["station"]["inserted"], 1);
    }

    #[test]
    fn test_summary() {
        let mut report = ImportReport::new("irve.csv");
        report.record_summary(&summary());

        let summary = report.summary();
        assert!(summary.contains("irve.csv"));
        assert!(summary.contains("2 inserted"));
    }
}
