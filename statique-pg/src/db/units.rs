//! Registre des unités opérationnelles
//!
//! Une unité opérationnelle est le préfixe de 5 caractères (ex: `FRS63`)
//! autorisé à émettre des identifiants de stations et de points de charge.
//! Le registre est alimenté à part; l'import ne le modifie jamais.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use deadpool_postgres::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use irve::parser::rules::OPERATIONAL_UNIT_CODE_LEN;

/// Type d'unité opérationnelle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    #[default]
    Charging,
    Mobility,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Charging => "charging",
            UnitType::Mobility => "mobility",
        }
    }
}

/// Une unité opérationnelle du registre
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperationalUnit {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
}

impl OperationalUnit {
    /// Vérifie le format du code (5 caractères alphanumériques majuscules)
    pub fn validate(&self) -> Result<()> {
        let valid = self.code.len() == OPERATIONAL_UNIT_CODE_LEN
            && self
                .code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            anyhow::bail!(
                "Invalid operational unit code '{}': expected {} uppercase alphanumeric characters",
                self.code,
                OPERATIONAL_UNIT_CODE_LEN
            );
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("Operational unit {} has an empty name", self.code);
        }
        Ok(())
    }
}

/// Lit un fichier CSV `code,name,type`
pub fn load_units_csv(path: &Path) -> Result<Vec<OperationalUnit>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    read_units(file).with_context(|| format!("Failed to read units from {}", path.display()))
}

/// Ligne du fichier CSV (type optionnel)
#[derive(Debug, Deserialize)]
struct UnitRow {
    code: String,
    name: String,
    #[serde(rename = "type")]
    unit_type: Option<UnitType>,
}

/// Lit des unités depuis un flux CSV avec en-tête
pub fn read_units(reader: impl std::io::Read) -> Result<Vec<OperationalUnit>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut units = Vec::new();
    for (idx, record) in csv.deserialize::<UnitRow>().enumerate() {
        let row = record.with_context(|| format!("Invalid unit at row {}", idx + 2))?;
        let unit = OperationalUnit {
            code: row.code,
            name: row.name,
            unit_type: row.unit_type.unwrap_or_default(),
        };
        unit.validate()?;
        units.push(unit);
    }
    Ok(units)
}

/// Codes requis absents du registre, triés
pub fn missing_codes<'a>(
    required: impl IntoIterator<Item = &'a str>,
    found: &HashMap<String, Uuid>,
) -> Vec<String> {
    required
        .into_iter()
        .filter(|code| !found.contains_key(*code))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Récupère les identifiants des unités demandées
///
/// Les codes absents du registre n'apparaissent pas dans le résultat.
pub async fn find_ids(
    tx: &Transaction<'_>,
    schema: &str,
    codes: &[String],
) -> Result<HashMap<String, Uuid>> {
    let rows = tx
        .query(
            &format!(
                "SELECT code, id FROM {}.operational_unit WHERE code = ANY($1)",
                schema
            ),
            &[&codes],
        )
        .await
        .context("Failed to look up operational units")?;

    let found: HashMap<String, Uuid> = rows
        .iter()
        .map(|row| (row.get::<_, String>("code"), row.get::<_, Uuid>("id")))
        .collect();

    debug!(requested = codes.len(), found = found.len(), "Operational units looked up");
    Ok(found)
}

/// Insère ou met à jour des unités (par code)
///
/// Retourne le nombre d'unités créées.
pub async fn upsert_units(
    tx: &Transaction<'_>,
    schema: &str,
    units: &[OperationalUnit],
) -> Result<usize> {
    let sql = format!(
        r#"
        INSERT INTO {}.operational_unit (id, code, name, type)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, type = EXCLUDED.type, updated_at = NOW()
        RETURNING (xmax = 0) AS inserted
        "#,
        schema
    );
    let statement = tx
        .prepare(&sql)
        .await
        .context("Failed to prepare operational unit upsert")?;

    let mut created = 0;
    for unit in units {
        let row = tx
            .query_one(
                &statement,
                &[&Uuid::new_v4(), &unit.code, &unit.name, &unit.unit_type.as_str()],
            )
            .await
            .with_context(|| format!("Failed to upsert operational unit {}", unit.code))?;
        if row.get::<_, bool>("inserted") {
            created += 1;
        }
    }

    info!(total = units.len(), created = created, "Operational units saved");
    Ok(created)
}

/// Liste le registre, trié par code
pub async fn list_units(tx: &Transaction<'_>, schema: &str) -> Result<Vec<OperationalUnit>> {
    let rows = tx
        .query(
            &format!(
                "SELECT code, name, type FROM {}.operational_unit ORDER BY code",
                schema
            ),
            &[],
        )
        .await
        .context("Failed to list operational units")?;

    Ok(rows
        .iter()
        .map(|row| OperationalUnit {
            code: row.get("code"),
            name: row.get("name"),
            unit_type: match row.get::<_, &str>("type") {
                "mobility" => UnitType::Mobility,
                _ => UnitType::Charging,
            },
        })
        .collect())
}
