//! Import d'un lot statique dans le schéma normalisé
//!
//! Un lot validé est réconcilié entité par entité, dans l'ordre des
//! dépendances: aménageurs, opérateurs, enseignes, localisations, stations,
//! points de charge. Les unités opérationnelles du lot doivent toutes être
//! enregistrées avant la première écriture.

pub mod plan;
pub mod upsert;

use std::collections::HashMap;

use deadpool_postgres::Transaction;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use irve::{Entity, Statique};

use crate::db::units;
pub use plan::{ImportPlan, StationLinks};
pub use upsert::{UpsertReport, UpsertResult};
use upsert::{PreparedUpsert, StationForeignKeys};

#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("this importer has already been saved")]
    AlreadySaved,

    #[error("unknown operational units: {}", .0.join(", "))]
    MissingOperationalUnits(Vec<String>),

    #[error("conflicting {entity} values for key {key} (batch position {position})")]
    ConflictingEntity {
        entity: &'static str,
        key: String,
        position: usize,
    },

    #[error("{entity} key {key} was not resolved")]
    UnresolvedKey { entity: &'static str, key: String },

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Résultat d'un import, par type d'entité
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub amenageur: UpsertReport,
    pub operateur: UpsertReport,
    pub enseigne: UpsertReport,
    pub localisation: UpsertReport,
    pub station: UpsertReport,
    pub pointdecharge: UpsertReport,
}

impl ImportSummary {
    /// Rapports dans l'ordre d'import
    pub fn entities(&self) -> [(&'static str, &UpsertReport); 6] {
        [
            ("amenageur", &self.amenageur),
            ("operateur", &self.operateur),
            ("enseigne", &self.enseigne),
            ("localisation", &self.localisation),
            ("station", &self.station),
            ("pointdecharge", &self.pointdecharge),
        ]
    }
}

/// Importeur à usage unique d'un lot de lignes validées
pub struct StatiqueImporter {
    statiques: Vec<Statique>,
    schema: String,
    saved: bool,
}

impl StatiqueImporter {
    pub fn new(statiques: Vec<Statique>, schema: &str) -> Self {
        Self {
            statiques,
            schema: schema.to_string(),
            saved: false,
        }
    }

    pub fn len(&self) -> usize {
        self.statiques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statiques.is_empty()
    }

    /// Enregistre le lot dans la transaction fournie
    ///
    /// L'importeur ne peut être sauvé qu'une fois, même après un échec.
    /// La transaction n'est ni validée ni annulée ici.
    ///
    /// # Errors
    /// - `AlreadySaved` au second appel
    /// - `ConflictingEntity` si le lot est incohérent
    /// - `MissingOperationalUnits` si une unité est absente du registre
    ///   (aucune écriture n'a eu lieu)
    pub async fn save(&mut self, tx: &Transaction<'_>) -> Result<ImportSummary, ImporterError> {
        if self.saved {
            return Err(ImporterError::AlreadySaved);
        }
        self.saved = true;

        let plan = ImportPlan::build(&self.statiques)?;
        let codes = plan.operational_unit_codes();
        let unit_ids = units::find_ids(tx, &self.schema, &codes).await?;
        let missing = units::missing_codes(codes.iter().map(String::as_str), &unit_ids);
        if !missing.is_empty() {
            warn!(missing = ?missing, "Batch references unknown operational units");
            return Err(ImporterError::MissingOperationalUnits(missing));
        }

        info!(
            rows = self.statiques.len(),
            stations = plan.stations.len(),
            points_de_charge = plan.points_de_charge.len(),
            "Saving statique batch"
        );

        let summary = self.write(tx, &plan, &unit_ids).await?;

        for (entity, report) in summary.entities() {
            debug!(
                entity,
                inserted = report.inserted,
                updated = report.updated,
                unchanged = report.unchanged,
                "Entities reconciled"
            );
        }

        Ok(summary)
    }

    async fn write(
        &self,
        tx: &Transaction<'_>,
        plan: &ImportPlan,
        unit_ids: &HashMap<String, Uuid>,
    ) -> Result<ImportSummary, ImporterError> {
        let schema = self.schema.as_str();
        let mut summary = ImportSummary::default();

        let stmt = PreparedUpsert::prepare(tx, schema, upsert::AMENAGEUR).await?;
        let mut amenageur_ids = HashMap::with_capacity(plan.amenageurs.len());
        for (e, _) in plan.amenageurs.iter() {
            let (id, result) = upsert::upsert_amenageur(tx, &stmt, e).await?;
            summary.amenageur.record(result);
            amenageur_ids.insert(e.key(), id);
        }

        let stmt = PreparedUpsert::prepare(tx, schema, upsert::OPERATEUR).await?;
        let mut operateur_ids = HashMap::with_capacity(plan.operateurs.len());
        for (e, _) in plan.operateurs.iter() {
            let (id, result) = upsert::upsert_operateur(tx, &stmt, e).await?;
            summary.operateur.record(result);
            operateur_ids.insert(e.key(), id);
        }

        let stmt = PreparedUpsert::prepare(tx, schema, upsert::ENSEIGNE).await?;
        let mut enseigne_ids = HashMap::with_capacity(plan.enseignes.len());
        for (e, _) in plan.enseignes.iter() {
            let (id, result) = upsert::upsert_enseigne(tx, &stmt, e).await?;
            summary.enseigne.record(result);
            enseigne_ids.insert(e.key(), id);
        }

        let stmt = PreparedUpsert::prepare(tx, schema, upsert::LOCALISATION).await?;
        let mut localisation_ids = HashMap::with_capacity(plan.localisations.len());
        for (e, _) in plan.localisations.iter() {
            let (id, result) = upsert::upsert_localisation(tx, &stmt, e).await?;
            summary.localisation.record(result);
            localisation_ids.insert(e.key(), id);
        }

        let stmt = PreparedUpsert::prepare(tx, schema, upsert::STATION).await?;
        let mut station_ids = HashMap::with_capacity(plan.stations.len());
        for (station, links) in plan.stations.iter() {
            let fk = StationForeignKeys {
                amenageur_id: resolve(&amenageur_ids, &links.amenageur, "amenageur")?,
                operateur_id: resolve(&operateur_ids, &links.operateur, "operateur")?,
                enseigne_id: resolve(&enseigne_ids, &links.enseigne, "enseigne")?,
                localisation_id: resolve(&localisation_ids, &links.localisation, "localisation")?,
                operational_unit_id: resolve(
                    unit_ids,
                    station.operational_unit_code(),
                    "operational_unit",
                )?,
            };
            let (id, result) = upsert::upsert_station(tx, &stmt, station, &fk).await?;
            summary.station.record(result);
            station_ids.insert(station.key(), id);
        }

        let stmt = PreparedUpsert::prepare(tx, schema, upsert::POINT_DE_CHARGE).await?;
        for (pdc, station_key) in plan.points_de_charge.iter() {
            let station_id = resolve(&station_ids, station_key.as_str(), "station")?;
            let (_, result) = upsert::upsert_point_de_charge(tx, &stmt, pdc, station_id).await?;
            summary.pointdecharge.record(result);
        }

        Ok(summary)
    }
}

fn resolve<K, Q>(ids: &HashMap<K, Uuid>, key: &Q, entity: &'static str) -> Result<Uuid, ImporterError>
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + std::fmt::Debug + ?Sized,
{
    ids.get(key)
        .copied()
        .ok_or_else(|| ImporterError::UnresolvedKey {
            entity,
            key: format!("{:?}", key),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ImporterError::MissingOperationalUnits(vec!["FRA68".into(), "FRS63".into()]);
        assert_eq!(err.to_string(), "unknown operational units: FRA68, FRS63");

        let err = ImporterError::ConflictingEntity {
            entity: "station",
            key: "\"FRS63P0001\"".into(),
            position: 3,
        };
        assert!(err.to_string().contains("conflicting station values"));
        assert!(err.to_string().contains("position 3"));
    }

    #[test]
    fn test_resolve() {
        let id = Uuid::new_v4();
        let ids: HashMap<String, Uuid> = [("FRS63P0001".to_string(), id)].into_iter().collect();

        assert_eq!(resolve(&ids, "FRS63P0001", "station").unwrap(), id);
        assert!(matches!(
            resolve(&ids, "FRS63P0002", "station"),
            Err(ImporterError::UnresolvedKey { entity: "station", .. })
        ));
    }

    #[test]
    fn test_summary_order() {
        let mut summary = ImportSummary::default();
        summary.station.record(UpsertResult::Inserted);

        let names: Vec<_> = summary.entities().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["amenageur", "operateur", "enseigne", "localisation", "station", "pointdecharge"]
        );
        assert_eq!(summary.entities()[4].1.inserted, 1);
    }

    #[test]
    fn test_new_importer() {
        let importer = StatiqueImporter::new(Vec::new(), "qualicharge");
        assert!(importer.is_empty());
        assert_eq!(importer.len(), 0);
    }
}
