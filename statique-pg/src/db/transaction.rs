//! Transaction atomique pour l'import d'un fichier
//!
//! Tout le lot est validé ou annulé d'un bloc.

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Transaction};
use tracing::{error, info, warn};

/// Gestionnaire de transaction pour l'import d'un fichier
///
/// Encapsule une transaction PostgreSQL; la transaction est annulée si
/// elle est droppée sans `commit`.
pub struct ImportTransaction<'a> {
    transaction: Transaction<'a>,
    feed_name: String,
}

impl<'a> ImportTransaction<'a> {
    /// Démarre une nouvelle transaction d'import
    ///
    /// # Arguments
    /// * `client` - Connexion PostgreSQL (doit rester vivante pendant la transaction)
    /// * `feed_name` - Nom du fichier importé, pour les logs
    ///
    /// # Errors
    /// Retourne une erreur si la transaction ne peut pas être démarrée
    pub async fn begin(client: &'a mut Object, feed_name: &str) -> Result<Self> {
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        info!(feed = %feed_name, "Starting import transaction");

        Ok(Self {
            transaction,
            feed_name: feed_name.to_string(),
        })
    }

    /// Accède à la transaction sous-jacente pour exécuter des requêtes
    pub fn transaction(&self) -> &Transaction<'a> {
        &self.transaction
    }

    pub fn feed_name(&self) -> &str {
        &self.feed_name
    }

    /// Valide et commit la transaction
    ///
    /// # Errors
    /// Retourne une erreur si le commit échoue
    pub async fn commit(self) -> Result<()> {
        self.transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        info!(feed = %self.feed_name, "Import committed");
        Ok(())
    }

    /// Annule la transaction (rollback)
    ///
    /// La transaction est également annulée si droppée.
    pub async fn rollback(self, reason: &str) {
        warn!(feed = %self.feed_name, reason = %reason, "Rolling back import");

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }
    }
}
