//! Types d'erreurs pour le crate irve

use serde::Serialize;
use thiserror::Error;

/// Erreurs fatales pouvant survenir lors de la lecture d'un fichier IRVE
#[derive(Debug, Error)]
pub enum IrveError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur du lecteur CSV (guillemets non fermés, etc.)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Fichier vide (pas même une ligne d'en-tête)
    #[error("Empty feed: no header row")]
    EmptyFeed,

    /// Colonne obligatoire absente de l'en-tête
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Colonne présente plusieurs fois dans l'en-tête
    #[error("Duplicated column: {0}")]
    DuplicatedColumn(String),

    /// Encodage non supporté
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Erreur de validation d'une ligne du fichier
///
/// Non fatale: la ligne est écartée et l'erreur remontée dans le rapport.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("row {row}: {column}: {reason}")]
pub struct RowError {
    /// Numéro de ligne dans le fichier (1 = en-tête)
    pub row: usize,

    /// Colonne en cause
    pub column: String,

    /// Description du problème
    pub reason: String,
}

impl RowError {
    pub fn new(row: usize, column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row,
            column: column.into(),
            reason: reason.into(),
        }
    }
}

/// Erreur de validation d'un champ, avant rattachement à une ligne
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{column}: {reason}")]
pub struct FieldError {
    pub column: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(column: &'static str, reason: impl Into<String>) -> Self {
        Self {
            column,
            reason: reason.into(),
        }
    }

    /// Rattache l'erreur à une ligne du fichier
    pub fn at_row(self, row: usize) -> RowError {
        RowError::new(row, self.column, self.reason)
    }
}
