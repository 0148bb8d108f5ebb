//! Tests d'intégration sur des fichiers IRVE complets

use std::io::Write;

use chrono::NaiveDate;
use irve::feed::COLUMNS;
use irve::{Entity, ParseOptions, Station};

/// Ligne valide, dans l'ordre de `COLUMNS`
fn row(station: &str, pdc: &str, coords: &str) -> Vec<String> {
    COLUMNS
        .iter()
        .map(|c| match *c {
            "nom_amenageur" => "Mairie de Clermont".to_string(),
            "siren_amenageur" => "216301130".to_string(),
            "contact_amenageur" => "mobilite@clermont.fr".to_string(),
            "nom_operateur" => "Recharge Auvergne".to_string(),
            "contact_operateur" => "support@recharge-auvergne.fr".to_string(),
            "telephone_operateur" => "04 73 00 00 00".to_string(),
            "nom_enseigne" => "Réseau Volcans".to_string(),
            "id_station_itinerance" => station.to_string(),
            "nom_station" => "Place de Jaude".to_string(),
            "implantation_station" => "Voirie".to_string(),
            "adresse_station" => "Place de Jaude 63000 Clermont-Ferrand".to_string(),
            "code_insee_commune" => "63113".to_string(),
            "coordonneesXY" => coords.to_string(),
            "nbre_pdc" => "2".to_string(),
            "id_pdc_itinerance" => pdc.to_string(),
            "puissance_nominale" => "22".to_string(),
            "prise_type_ef" | "prise_type_combo_ccs" | "prise_type_chademo" | "prise_type_autre" => {
                "false".to_string()
            }
            "prise_type_2" | "paiement_acte" | "paiement_cb" => "true".to_string(),
            "gratuit" | "reservation" | "station_deux_roues" => "false".to_string(),
            "condition_acces" => "Accès libre".to_string(),
            "horaires" => "24/7".to_string(),
            "accessibilite_pmr" => "Accessibilité inconnue".to_string(),
            "restriction_gabarit" => "Aucune".to_string(),
            "raccordement" => "Direct".to_string(),
            "date_maj" => "2024-01-15".to_string(),
            _ => String::new(),
        })
        .collect()
}

fn to_csv(rows: &[Vec<String>], delimiter: char) -> String {
    let sep = delimiter.to_string();
    let mut out = COLUMNS.join(&sep);
    out.push('\n');
    for r in rows {
        let quoted: Vec<String> = r.iter().map(|v| format!("\"{}\"", v)).collect();
        out.push_str(&quoted.join(&sep));
        out.push('\n');
    }
    out
}

fn options() -> ParseOptions {
    ParseOptions {
        reference_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ..Default::default()
    }
}

#[test]
fn test_parse_file() {
    let rows = vec![
        row("FRS63P0001", "FRS63E0001", "[3.0826, 45.7772]"),
        row("FRS63P0001", "FRS63E0002", "[3.0826, 45.7772]"),
        row("FRS63P0002", "FRS63E0003", "[3.0901, 45.7790]"),
    ];

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(to_csv(&rows, ',').as_bytes()).unwrap();

    let result = irve::parse(file.path(), &options()).unwrap();
    assert!(result.is_clean(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.rows_read, 3);
    assert_eq!(result.records.len(), 3);

    let stations: std::collections::HashSet<String> = result
        .records
        .iter()
        .map(|r| Station::from_statique(&r.statique).key())
        .collect();
    assert_eq!(stations.len(), 2);
}

#[test]
fn test_parse_reports_invalid_rows_and_keeps_valid_ones() {
    let mut bad = row("FRS63P0002", "FRS63E0003", "[3.0901, 45.7790]");
    let idx = COLUMNS.iter().position(|c| *c == "siren_amenageur").unwrap();
    bad[idx] = "21630113".to_string();

    let rows = vec![
        row("FRS63P0001", "FRS63E0001", "[3.0826, 45.7772]"),
        bad,
        row("FRS63P0001", "FRS63E0001", "[3.0826, 45.7772]"),
    ];

    let result = irve::parse_bytes(to_csv(&rows, ',').as_bytes(), &options()).unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].row, 3);
    assert_eq!(result.errors[0].column, "siren_amenageur");
    assert_eq!(result.errors[1].row, 4);
    assert_eq!(result.errors[1].column, "id_pdc_itinerance");
}

#[test]
fn test_parse_windows_1252_semicolon_feed() {
    let rows = vec![row("FRS63P0001", "FRS63E0001", "[3.0826, 45.7772]")];
    let csv = to_csv(&rows, ';');
    let (encoded, _, had_errors) = encoding_rs::WINDOWS_1252.encode(&csv);
    assert!(!had_errors);

    let opts = ParseOptions {
        delimiter: b';',
        encoding: "windows-1252".into(),
        ..options()
    };

    let result = irve::parse_bytes(&encoded, &opts).unwrap();
    assert!(result.is_clean(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.records[0].statique.nom_enseigne, "Réseau Volcans");
}

#[test]
fn test_parse_missing_file() {
    let result = irve::parse(std::path::Path::new("nonexistent.csv"), &options());
    assert!(matches!(result, Err(irve::IrveError::Io(_))));
}
