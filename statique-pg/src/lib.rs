//! # statique-pg
//!
//! Import des données statiques IRVE dans un schéma PostgreSQL/PostGIS
//! normalisé.
//!
//! ## Features
//!
//! - Upsert par clé naturelle (insertion, mise à jour, inchangé)
//! - Vérification des unités opérationnelles avant toute écriture
//! - Import atomique: une transaction par fichier
//! - Saut des fichiers déjà importés (checksum blake3)
//! - Rapport console et JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! statique-pg init
//! statique-pg units load ./operational_units.csv
//! statique-pg import --path ./irve-statique.csv
//! statique-pg validate --path ./irve-statique.csv --config consolidation
//! ```

pub mod config;
pub mod db;
pub mod import;
pub mod importer;
pub mod report;

pub use config::{FeedConfig, InvalidRowPolicy};
pub use db::{create_pool, DatabaseConfig};
pub use import::{import_feed, validate_feed, ImportOptions};
pub use importer::{ImportSummary, ImporterError, StatiqueImporter};
pub use report::{ImportReport, ImportStatus};
