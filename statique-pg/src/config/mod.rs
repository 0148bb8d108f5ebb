//! Configuration du format des fichiers à importer

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use irve::ParseOptions;

/// Noms des presets embarqués
pub const PRESETS: &[&str] = &["qualicharge", "consolidation"];

/// Politique appliquée aux lignes invalides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    /// Une seule ligne invalide annule tout l'import
    #[default]
    Reject,
    /// Les lignes invalides sont écartées et rapportées
    Skip,
}

/// Profil d'un fichier statique
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Séparateur de champs (caractère ASCII)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Label d'encodage (utf-8, windows-1252, ...)
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Traitement des lignes invalides
    #[serde(default)]
    pub on_invalid: InvalidRowPolicy,

    /// Renommage de colonnes: nom dans le fichier -> nom IRVE
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_delimiter() -> char {
    ','
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            encoding: default_encoding(),
            on_invalid: InvalidRowPolicy::default(),
            aliases: HashMap::new(),
        }
    }
}

impl FeedConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "qualicharge" => Self::load_embedded(include_str!("presets/qualicharge.json")),
            "consolidation" => Self::load_embedded(include_str!("presets/consolidation.json")),
            _ => anyhow::bail!(
                "Unknown preset: {}. Use: {}",
                preset,
                PRESETS.join(", ")
            ),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn resolve(spec: &str) -> Result<Self> {
        if PRESETS.contains(&spec) {
            Self::from_preset(spec)
        } else {
            Self::load(Path::new(spec))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Options de lecture pour le parser
    pub fn parse_options(&self) -> Result<ParseOptions> {
        if !self.delimiter.is_ascii() {
            anyhow::bail!("Delimiter must be an ASCII character, got '{}'", self.delimiter);
        }

        Ok(ParseOptions {
            delimiter: self.delimiter as u8,
            encoding: self.encoding.clone(),
            aliases: self.aliases.clone(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets_load() {
        for preset in PRESETS {
            let config = FeedConfig::from_preset(preset).unwrap();
            assert!(config.parse_options().is_ok(), "preset {}", preset);
        }
    }

    #[test]
    fn test_qualicharge_preset_is_strict() {
        let config = FeedConfig::from_preset("qualicharge").unwrap();
        assert_eq!(config.on_invalid, InvalidRowPolicy::Reject);
        assert_eq!(config.delimiter, ',');
    }

    #[test]
    fn test_consolidation_preset_skips_invalid_rows() {
        let config = FeedConfig::from_preset("consolidation").unwrap();
        assert_eq!(config.on_invalid, InvalidRowPolicy::Skip);
        assert_eq!(
            config.aliases.get("coordonnees_xy").map(String::as_str),
            Some("coordonneesXY")
        );
    }

    #[test]
    fn test_v1_layout_is_not_a_preset() {
        // Les fichiers v1 n'ont pas les colonnes obligatoires du schéma v2.3
        assert!(!PRESETS.contains(&"irve-v1"));
        assert!(FeedConfig::from_preset("irve-v1").is_err());
    }

    #[test]
    fn test_unknown_preset() {
        assert!(FeedConfig::from_preset("nope").is_err());
    }

    #[test]
    fn test_load_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"on_invalid": "skip"}"#).unwrap();

        let config = FeedConfig::resolve(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.on_invalid, InvalidRowPolicy::Skip);
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.encoding, "utf-8");
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_non_ascii_delimiter() {
        let config = FeedConfig {
            delimiter: '§',
            ..Default::default()
        };
        assert!(config.parse_options().is_err());
    }
}
