//! Upsert des entités par clé naturelle
//!
//! Chaque entité est insérée, mise à jour si ses attributs ont changé, ou
//! laissée telle quelle. L'identifiant de la ligne (nouvelle ou existante)
//! est toujours retourné pour câbler les clés étrangères.

use anyhow::{Context, Result};
use deadpool_postgres::Transaction;
use geo::{Geometry, Point};
use serde::Serialize;
use tokio_postgres::types::ToSql;
use tokio_postgres::Statement;
use tracing::trace;
use uuid::Uuid;
use wkb::geom_to_wkb;

use irve::types::Coordinates;
use irve::{Amenageur, Enseigne, Localisation, Operateur, PointDeCharge, Station};

/// SRID des coordonnées IRVE (WGS84)
pub const WGS84: u32 = 4326;

type Param<'a> = &'a (dyn ToSql + Sync);

/// Résultat d'un upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertResult {
    /// Nouvelle entité insérée
    Inserted,
    /// Entité existante mise à jour (attributs changés)
    Updated,
    /// Entité existante inchangée
    Unchanged,
}

/// Rapport d'upsert pour un type d'entité
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    /// Nombre d'entités insérées
    pub inserted: usize,
    /// Nombre d'entités mises à jour
    pub updated: usize,
    /// Nombre d'entités inchangées
    pub unchanged: usize,
}

impl UpsertReport {
    pub fn total_processed(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn record(&mut self, result: UpsertResult) {
        match result {
            UpsertResult::Inserted => self.inserted += 1,
            UpsertResult::Updated => self.updated += 1,
            UpsertResult::Unchanged => self.unchanged += 1,
        }
    }
}

/// Description d'une table cible
#[derive(Debug, Clone, Copy)]
pub struct EntityTable {
    pub name: &'static str,
    /// Colonnes de la clé naturelle
    pub key_columns: &'static [&'static str],
    /// Autres colonnes, mises à jour en cas de conflit
    pub value_columns: &'static [&'static str],
    /// Colonnes géométriques (paramètre EWKB)
    pub geometry_columns: &'static [&'static str],
}

pub const AMENAGEUR: EntityTable = EntityTable {
    name: "amenageur",
    key_columns: &["nom_amenageur", "siren_amenageur", "contact_amenageur"],
    value_columns: &[],
    geometry_columns: &[],
};

pub const OPERATEUR: EntityTable = EntityTable {
    name: "operateur",
    key_columns: &["nom_operateur", "contact_operateur", "telephone_operateur"],
    value_columns: &[],
    geometry_columns: &[],
};

pub const ENSEIGNE: EntityTable = EntityTable {
    name: "enseigne",
    key_columns: &["nom_enseigne"],
    value_columns: &[],
    geometry_columns: &[],
};

pub const LOCALISATION: EntityTable = EntityTable {
    name: "localisation",
    key_columns: &["coordonnees_xy"],
    value_columns: &["adresse_station", "code_insee_commune"],
    geometry_columns: &["coordonnees_xy"],
};

pub const STATION: EntityTable = EntityTable {
    name: "station",
    key_columns: &["id_station_itinerance"],
    value_columns: &[
        "id_station_local",
        "nom_station",
        "implantation_station",
        "nbre_pdc",
        "condition_acces",
        "horaires",
        "station_deux_roues",
        "raccordement",
        "num_pdl",
        "date_maj",
        "date_mise_en_service",
        "amenageur_id",
        "operateur_id",
        "enseigne_id",
        "localisation_id",
        "operational_unit_id",
    ],
    geometry_columns: &[],
};

pub const POINT_DE_CHARGE: EntityTable = EntityTable {
    name: "pointdecharge",
    key_columns: &["id_pdc_itinerance"],
    value_columns: &[
        "id_pdc_local",
        "puissance_nominale",
        "prise_type_ef",
        "prise_type_2",
        "prise_type_combo_ccs",
        "prise_type_chademo",
        "prise_type_autre",
        "gratuit",
        "paiement_acte",
        "paiement_cb",
        "paiement_autre",
        "tarification",
        "reservation",
        "accessibilite_pmr",
        "restriction_gabarit",
        "observations",
        "cable_t2_attache",
        "station_id",
    ],
    geometry_columns: &[],
};

impl EntityTable {
    fn placeholder(&self, column: &str, index: usize) -> String {
        if self.geometry_columns.contains(&column) {
            format!("ST_GeomFromEWKB(${})", index)
        } else {
            format!("${}", index)
        }
    }

    /// Requête d'upsert: `$1` est l'identifiant, puis clés, puis valeurs
    ///
    /// Ne retourne aucune ligne si l'entité existe déjà à l'identique.
    pub fn upsert_sql(&self, schema: &str) -> String {
        let columns: Vec<&str> = self
            .key_columns
            .iter()
            .chain(self.value_columns)
            .copied()
            .collect();

        let placeholders: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| self.placeholder(c, i + 2))
            .collect();

        let on_conflict = if self.value_columns.is_empty() {
            "DO NOTHING".to_string()
        } else {
            let assignments: Vec<String> = self
                .value_columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect();
            let current: Vec<String> = self
                .value_columns
                .iter()
                .map(|c| format!("{}.{}", self.name, c))
                .collect();
            let incoming: Vec<String> = self
                .value_columns
                .iter()
                .map(|c| format!("EXCLUDED.{}", c))
                .collect();
            format!(
                "DO UPDATE SET {}, updated_at = NOW() WHERE ({}) IS DISTINCT FROM ({})",
                assignments.join(", "),
                current.join(", "),
                incoming.join(", ")
            )
        };

        format!(
            "INSERT INTO {schema}.{table} AS {table} (id, {columns}) VALUES ($1, {placeholders}) \
             ON CONFLICT ON CONSTRAINT {table}_natural_key {on_conflict} \
             RETURNING id, (xmax = 0) AS inserted",
            schema = schema,
            table = self.name,
            columns = columns.join(", "),
            placeholders = placeholders.join(", "),
            on_conflict = on_conflict,
        )
    }

    /// Requête de lecture de l'identifiant par clé naturelle (`$1..$n`)
    pub fn select_id_sql(&self, schema: &str) -> String {
        let conditions: Vec<String> = self
            .key_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} IS NOT DISTINCT FROM {}", c, self.placeholder(c, i + 1)))
            .collect();

        format!(
            "SELECT id FROM {}.{} WHERE {}",
            schema,
            self.name,
            conditions.join(" AND ")
        )
    }
}

/// Requêtes préparées pour une table
pub struct PreparedUpsert {
    table: EntityTable,
    upsert: Statement,
    select_id: Statement,
}

impl PreparedUpsert {
    pub async fn prepare(tx: &Transaction<'_>, schema: &str, table: EntityTable) -> Result<Self> {
        let upsert = tx
            .prepare(&table.upsert_sql(schema))
            .await
            .with_context(|| format!("Failed to prepare upsert for {}", table.name))?;
        let select_id = tx
            .prepare(&table.select_id_sql(schema))
            .await
            .with_context(|| format!("Failed to prepare id lookup for {}", table.name))?;

        Ok(Self {
            table,
            upsert,
            select_id,
        })
    }

    /// Exécute l'upsert d'une entité
    ///
    /// `keys` et `values` suivent l'ordre de `key_columns` et `value_columns`.
    pub async fn execute(
        &self,
        tx: &Transaction<'_>,
        keys: &[Param<'_>],
        values: &[Param<'_>],
    ) -> Result<(Uuid, UpsertResult)> {
        let id = Uuid::new_v4();
        let mut params: Vec<Param<'_>> = Vec::with_capacity(1 + keys.len() + values.len());
        params.push(&id);
        params.extend_from_slice(keys);
        params.extend_from_slice(values);

        let row = tx
            .query_opt(&self.upsert, &params)
            .await
            .with_context(|| format!("Failed to upsert {}", self.table.name))?;

        match row {
            Some(row) => {
                let id: Uuid = row.get("id");
                let result = if row.get::<_, bool>("inserted") {
                    UpsertResult::Inserted
                } else {
                    UpsertResult::Updated
                };
                trace!(table = self.table.name, %id, ?result, "Entity upserted");
                Ok((id, result))
            }
            None => {
                let row = tx
                    .query_one(&self.select_id, keys)
                    .await
                    .with_context(|| format!("Failed to read back {} id", self.table.name))?;
                let id: Uuid = row.get("id");
                trace!(table = self.table.name, %id, "Entity unchanged");
                Ok((id, UpsertResult::Unchanged))
            }
        }
    }
}

/// Convertit des coordonnées en EWKB PostGIS (SRID 4326)
pub fn point_to_ewkb(coordinates: &Coordinates) -> Result<Vec<u8>> {
    let geometry = Geometry::Point(Point::new(coordinates.longitude, coordinates.latitude));
    let wkb = geom_to_wkb(&geometry)
        .map_err(|e| anyhow::anyhow!("Failed to convert point to WKB: {:?}", e))?;

    if wkb.len() < 5 {
        anyhow::bail!("WKB output too short ({} bytes)", wkb.len());
    }

    // Ajouter le SRID au WKB (format EWKB)
    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);

    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    if wkb[0] == 1 {
        let geom_type = u32::from_le_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&WGS84.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&WGS84.to_be_bytes());
    }
    ewkb.extend_from_slice(&wkb[5..]);

    Ok(ewkb)
}

/// Clés étrangères d'une station
#[derive(Debug, Clone, Copy)]
pub struct StationForeignKeys {
    pub amenageur_id: Uuid,
    pub operateur_id: Uuid,
    pub enseigne_id: Uuid,
    pub localisation_id: Uuid,
    pub operational_unit_id: Uuid,
}

pub async fn upsert_amenageur(
    tx: &Transaction<'_>,
    stmt: &PreparedUpsert,
    e: &Amenageur,
) -> Result<(Uuid, UpsertResult)> {
    stmt.execute(
        tx,
        &[&e.nom_amenageur, &e.siren_amenageur, &e.contact_amenageur],
        &[],
    )
    .await
}

pub async fn upsert_operateur(
    tx: &Transaction<'_>,
    stmt: &PreparedUpsert,
    e: &Operateur,
) -> Result<(Uuid, UpsertResult)> {
    stmt.execute(
        tx,
        &[&e.nom_operateur, &e.contact_operateur, &e.telephone_operateur],
        &[],
    )
    .await
}

pub async fn upsert_enseigne(
    tx: &Transaction<'_>,
    stmt: &PreparedUpsert,
    e: &Enseigne,
) -> Result<(Uuid, UpsertResult)> {
    stmt.execute(tx, &[&e.nom_enseigne], &[]).await
}

pub async fn upsert_localisation(
    tx: &Transaction<'_>,
    stmt: &PreparedUpsert,
    e: &Localisation,
) -> Result<(Uuid, UpsertResult)> {
    let ewkb = point_to_ewkb(&e.coordonnees_xy)?;
    stmt.execute(tx, &[&ewkb], &[&e.adresse_station, &e.code_insee_commune])
        .await
}

pub async fn upsert_station(
    tx: &Transaction<'_>,
    stmt: &PreparedUpsert,
    e: &Station,
    fk: &StationForeignKeys,
) -> Result<(Uuid, UpsertResult)> {
    let implantation = e.implantation_station.as_str();
    let condition_acces = e.condition_acces.as_str();
    let raccordement = e.raccordement.map(|r| r.as_str());

    stmt.execute(
        tx,
        &[&e.id_station_itinerance],
        &[
            &e.id_station_local,
            &e.nom_station,
            &implantation,
            &e.nbre_pdc,
            &condition_acces,
            &e.horaires,
            &e.station_deux_roues,
            &raccordement,
            &e.num_pdl,
            &e.date_maj,
            &e.date_mise_en_service,
            &fk.amenageur_id,
            &fk.operateur_id,
            &fk.enseigne_id,
            &fk.localisation_id,
            &fk.operational_unit_id,
        ],
    )
    .await
}

pub async fn upsert_point_de_charge(
    tx: &Transaction<'_>,
    stmt: &PreparedUpsert,
    e: &PointDeCharge,
    station_id: Uuid,
) -> Result<(Uuid, UpsertResult)> {
    let accessibilite = e.accessibilite_pmr.as_str();

    stmt.execute(
        tx,
        &[&e.id_pdc_itinerance],
        &[
            &e.id_pdc_local,
            &e.puissance_nominale,
            &e.prise_type_ef,
            &e.prise_type_2,
            &e.prise_type_combo_ccs,
            &e.prise_type_chademo,
            &e.prise_type_autre,
            &e.gratuit,
            &e.paiement_acte,
            &e.paiement_cb,
            &e.paiement_autre,
            &e.tarification,
            &e.reservation,
            &accessibilite,
            &e.restriction_gabarit,
            &e.observations,
            &e.cable_t2_attache,
            &station_id,
        ],
    )
    .await
}
