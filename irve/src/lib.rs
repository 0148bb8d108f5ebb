//! # irve
//!
//! Parser pour les fichiers IRVE statiques (infrastructures de recharge pour
//! véhicules électriques, schéma national v2.3).
//!
//! ## Features
//!
//! - Décodage UTF-8 / Windows-1252 avec `encoding_rs`, BOM retiré
//! - Lecture CSV tolérante (`csv`), renommage de colonnes
//! - Validation champ par champ en parallèle (`rayon`)
//! - Projection en entités normalisées (aménageur, opérateur, enseigne,
//!   localisation, station, point de charge)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use irve::{parse, ParseOptions};
//! use std::path::Path;
//!
//! let result = parse(Path::new("irve-statique.csv"), &ParseOptions::default())?;
//! println!("{} valid rows, {} errors", result.records.len(), result.errors.len());
//! ```

pub mod entities;
pub mod error;
pub mod feed;
pub mod parser;
pub mod types;

pub use entities::{
    operational_unit_code, Amenageur, Enseigne, Entity, Localisation, Operateur, PointDeCharge,
    Station,
};
pub use error::{IrveError, RowError};
pub use types::{ParseOptions, ParseResult, Record, Statique};

use std::path::Path;

use tracing::info;

/// Parse un fichier IRVE statique.
///
/// # Arguments
///
/// * `path` - Chemin vers le fichier CSV
/// * `options` - Séparateur, encodage, renommages de colonnes
///
/// # Returns
///
/// Un `ParseResult` contenant les lignes valides et les lignes rejetées.
///
/// # Errors
///
/// Retourne `IrveError` si le fichier est illisible, si l'en-tête est vide
/// ou s'il manque une colonne obligatoire.
pub fn parse(path: &Path, options: &ParseOptions) -> Result<ParseResult, IrveError> {
    let data = std::fs::read(path)?;
    let result = parse_bytes(&data, options)?;

    info!(
        path = %path.display(),
        rows = result.rows_read,
        valid = result.records.len(),
        errors = result.errors.len(),
        "Parsed IRVE feed"
    );

    Ok(result)
}

/// Parse un contenu IRVE déjà en mémoire
pub fn parse_bytes(data: &[u8], options: &ParseOptions) -> Result<ParseResult, IrveError> {
    let (raw, mut errors) = feed::read(data, options)?;
    let rows_read = raw.len() + errors.len();

    let (records, row_errors) = parser::parse_feed(&raw, options.reference_date);
    errors.extend(row_errors);
    errors.sort_by_key(|e| e.row);

    Ok(ParseResult {
        records,
        errors,
        rows_read,
    })
}
