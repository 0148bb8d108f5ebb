//! Suivi des fichiers déjà importés (skip incrémental)

use std::path::Path;

use anyhow::{Context, Result};
use deadpool_postgres::Transaction;

/// Calcule le checksum blake3 d'un fichier
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    use std::fs::File;
    use std::io::Read;

    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Nom sous lequel un fichier est suivi (nom de fichier sans répertoire)
pub fn feed_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Vérifie si un fichier a déjà été importé avec le même contenu
pub async fn is_feed_already_imported(
    tx: &Transaction<'_>,
    schema: &str,
    feed_name: &str,
    checksum: &str,
) -> Result<bool> {
    let row = tx
        .query_opt(
            &format!(
                "SELECT 1 FROM {}._feed_checksums WHERE feed_name = $1 AND checksum = $2",
                schema
            ),
            &[&feed_name, &checksum],
        )
        .await
        .context("Failed to check feed checksum")?;

    Ok(row.is_some())
}

/// Enregistre le checksum d'un fichier après import réussi
pub async fn record_feed_checksum(
    tx: &Transaction<'_>,
    schema: &str,
    feed_name: &str,
    checksum: &str,
) -> Result<()> {
    tx.execute(
        &format!(
            r#"
            INSERT INTO {}._feed_checksums (feed_name, checksum)
            VALUES ($1, $2)
            ON CONFLICT (feed_name) DO UPDATE SET checksum = $2, imported_at = NOW()
            "#,
            schema
        ),
        &[&feed_name, &checksum],
    )
    .await
    .context("Failed to record feed checksum")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_checksum_is_content_based() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"id_pdc_itinerance\nFRS63E0001\n").unwrap();
        b.write_all(b"id_pdc_itinerance\nFRS63E0001\n").unwrap();

        let ca = compute_file_checksum(a.path()).unwrap();
        let cb = compute_file_checksum(b.path()).unwrap();
        assert_eq!(ca, cb);
        assert_eq!(ca.len(), 64);

        b.write_all(b"FRS63E0002\n").unwrap();
        assert_ne!(ca, compute_file_checksum(b.path()).unwrap());
    }

    #[test]
    fn test_feed_name() {
        assert_eq!(feed_name(Path::new("/data/irve/statique-2024-06.csv")), "statique-2024-06.csv");
    }
}
