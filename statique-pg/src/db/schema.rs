//! Création du schéma relationnel cible

use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use tracing::{info, warn};

/// Schéma par défaut
pub const DEFAULT_SCHEMA: &str = "qualicharge";

/// Tables gérées, dans l'ordre de création (dépendances d'abord)
pub const TABLES: &[&str] = &[
    "operational_unit",
    "amenageur",
    "operateur",
    "enseigne",
    "localisation",
    "station",
    "pointdecharge",
    "_feed_checksums",
];

/// Vérifie qu'un nom de schéma peut être interpolé sans échappement
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid_start || !valid_rest || name.len() > 63 {
        anyhow::bail!(
            "Invalid schema name '{}': expected lowercase letters, digits and '_'",
            name
        );
    }
    Ok(())
}

/// DDL des tables, dans l'ordre de `TABLES`
pub fn table_definitions(schema: &str) -> Vec<String> {
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.operational_unit (
                id UUID PRIMARY KEY,
                code VARCHAR(5) NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'charging',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT operational_unit_code_key UNIQUE (code),
                CONSTRAINT operational_unit_type_check CHECK (type IN ('charging', 'mobility'))
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.amenageur (
                id UUID PRIMARY KEY,
                nom_amenageur TEXT,
                siren_amenageur VARCHAR(9),
                contact_amenageur TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT amenageur_natural_key
                    UNIQUE NULLS NOT DISTINCT (nom_amenageur, siren_amenageur, contact_amenageur)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.operateur (
                id UUID PRIMARY KEY,
                nom_operateur TEXT,
                contact_operateur TEXT NOT NULL,
                telephone_operateur TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT operateur_natural_key
                    UNIQUE NULLS NOT DISTINCT (nom_operateur, contact_operateur, telephone_operateur)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.enseigne (
                id UUID PRIMARY KEY,
                nom_enseigne TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT enseigne_natural_key UNIQUE (nom_enseigne)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.localisation (
                id UUID PRIMARY KEY,
                adresse_station TEXT NOT NULL,
                code_insee_commune VARCHAR(5),
                coordonnees_xy geometry(Point, 4326) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT localisation_natural_key UNIQUE (coordonnees_xy)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.station (
                id UUID PRIMARY KEY,
                id_station_itinerance VARCHAR(35) NOT NULL,
                id_station_local TEXT,
                nom_station TEXT NOT NULL,
                implantation_station TEXT NOT NULL,
                nbre_pdc INTEGER NOT NULL,
                condition_acces TEXT NOT NULL,
                horaires TEXT NOT NULL,
                station_deux_roues BOOLEAN NOT NULL,
                raccordement TEXT,
                num_pdl VARCHAR(64),
                date_maj DATE NOT NULL,
                date_mise_en_service DATE,
                amenageur_id UUID REFERENCES {schema}.amenageur (id),
                operateur_id UUID REFERENCES {schema}.operateur (id),
                enseigne_id UUID REFERENCES {schema}.enseigne (id),
                localisation_id UUID REFERENCES {schema}.localisation (id),
                operational_unit_id UUID NOT NULL REFERENCES {schema}.operational_unit (id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT station_natural_key UNIQUE (id_station_itinerance),
                CONSTRAINT station_nbre_pdc_check CHECK (nbre_pdc >= 1)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.pointdecharge (
                id UUID PRIMARY KEY,
                id_pdc_itinerance VARCHAR(36) NOT NULL,
                id_pdc_local TEXT,
                puissance_nominale DOUBLE PRECISION NOT NULL,
                prise_type_ef BOOLEAN NOT NULL,
                prise_type_2 BOOLEAN NOT NULL,
                prise_type_combo_ccs BOOLEAN NOT NULL,
                prise_type_chademo BOOLEAN NOT NULL,
                prise_type_autre BOOLEAN NOT NULL,
                gratuit BOOLEAN,
                paiement_acte BOOLEAN NOT NULL,
                paiement_cb BOOLEAN,
                paiement_autre BOOLEAN,
                tarification TEXT,
                reservation BOOLEAN NOT NULL,
                accessibilite_pmr TEXT NOT NULL,
                restriction_gabarit TEXT NOT NULL,
                observations TEXT,
                cable_t2_attache BOOLEAN,
                station_id UUID NOT NULL REFERENCES {schema}.station (id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT pointdecharge_natural_key UNIQUE (id_pdc_itinerance),
                CONSTRAINT pointdecharge_puissance_check CHECK (puissance_nominale > 0)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}._feed_checksums (
                feed_name TEXT PRIMARY KEY,
                checksum TEXT NOT NULL,
                imported_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
    ]
}

/// Index secondaires (clés étrangères et spatial)
pub fn index_definitions(schema: &str) -> Vec<String> {
    vec![
        format!("CREATE INDEX IF NOT EXISTS station_amenageur_idx ON {schema}.station (amenageur_id)"),
        format!("CREATE INDEX IF NOT EXISTS station_operateur_idx ON {schema}.station (operateur_id)"),
        format!("CREATE INDEX IF NOT EXISTS station_enseigne_idx ON {schema}.station (enseigne_id)"),
        format!(
            "CREATE INDEX IF NOT EXISTS station_localisation_idx ON {schema}.station (localisation_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS station_operational_unit_idx ON {schema}.station (operational_unit_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS pointdecharge_station_idx ON {schema}.pointdecharge (station_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS localisation_coordonnees_gist ON {schema}.localisation USING GIST (coordonnees_xy)"
        ),
    ]
}

/// Crée le schéma, l'extension PostGIS, les tables et les index
pub async fn create_schema(pool: &Pool, schema: &str, drop_existing: bool) -> Result<()> {
    validate_identifier(schema)?;
    let client = pool.get().await?;

    if drop_existing {
        client
            .execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema), &[])
            .await
            .context("Failed to drop schema")?;
        info!(schema = schema, "Dropped schema");
    }

    client
        .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
        .await
        .context("Failed to create schema")?;

    // L'extension peut nécessiter des droits superuser: si elle existe déjà
    // on continue.
    if let Err(e) = client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
        let exists = client
            .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
            .await
            .context("Failed to check pg_extension")?
            .is_some();
        if !exists {
            return Err(anyhow::anyhow!(
                "PostGIS extension is not installed and could not be created: {e}"
            ));
        }
    }

    for (name, sql) in TABLES.iter().zip(table_definitions(schema)) {
        client
            .execute(&sql, &[])
            .await
            .with_context(|| format!("Failed to create table {}.{}", schema, name))?;
    }

    for sql in index_definitions(schema) {
        client
            .execute(&sql, &[])
            .await
            .with_context(|| format!("Failed to create index: {}", sql))?;
    }

    info!(schema = schema, tables = TABLES.len(), "Schema ready");
    Ok(())
}
