//! Conversion des lignes brutes en enregistrements `Statique` validés

pub mod fields;
pub mod rules;

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{FieldError, RowError};
use crate::feed::{RawFeed, RawRow};
use crate::types::{Raccordement, Record, Statique};

/// Accumulateur d'erreurs de champs pour une ligne
struct RowReader<'a> {
    row: &'a RawRow,
    reference_date: NaiveDate,
    errors: Vec<FieldError>,
}

impl<'a> RowReader<'a> {
    fn new(row: &'a RawRow, reference_date: NaiveDate) -> Self {
        Self {
            row,
            reference_date,
            errors: Vec::new(),
        }
    }

    fn keep<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn missing(&mut self, column: &'static str) {
        self.errors.push(FieldError::new(column, "value is required"));
    }

    fn required_text(&mut self, column: &'static str) -> Option<String> {
        match self.row.get(column) {
            Some(v) => Some(v.to_string()),
            None => {
                self.missing(column);
                None
            }
        }
    }

    fn optional_text(&self, column: &'static str) -> Option<String> {
        self.row.get(column).map(str::to_string)
    }

    /// Texte obligatoire devant respecter un motif
    fn required_matching(
        &mut self,
        column: &'static str,
        is_valid: fn(&str) -> bool,
        expected: &str,
    ) -> Option<String> {
        let value = self.required_text(column)?;
        if is_valid(&value) {
            Some(value)
        } else {
            self.errors.push(FieldError::new(
                column,
                format!("'{}' is not a valid {}", value, expected),
            ));
            None
        }
    }

    /// Texte optionnel devant respecter un motif s'il est renseigné
    fn optional_matching(
        &mut self,
        column: &'static str,
        is_valid: fn(&str) -> bool,
        expected: &str,
    ) -> Option<String> {
        let value = self.optional_text(column)?;
        if is_valid(&value) {
            Some(value)
        } else {
            self.errors.push(FieldError::new(
                column,
                format!("'{}' is not a valid {}", value, expected),
            ));
            None
        }
    }

    fn required<T>(
        &mut self,
        column: &'static str,
        convert: impl FnOnce(&'static str, &str) -> Result<T, FieldError>,
    ) -> Option<T> {
        match self.row.get(column) {
            Some(v) => {
                let result = convert(column, v);
                self.keep(result)
            }
            None => {
                self.missing(column);
                None
            }
        }
    }

    fn optional<T>(
        &mut self,
        column: &'static str,
        convert: impl FnOnce(&'static str, &str) -> Result<T, FieldError>,
    ) -> Option<T> {
        let v = self.row.get(column)?;
        let result = convert(column, v);
        self.keep(result)
    }

    fn required_vocabulary<T: FromStr<Err = String>>(&mut self, column: &'static str) -> Option<T> {
        self.required(column, |c, v| v.parse().map_err(|e| FieldError::new(c, e)))
    }

    fn required_date(&mut self, column: &'static str) -> Option<NaiveDate> {
        let reference = self.reference_date;
        self.required(column, |c, v| fields::parse_date(c, v, reference))
    }

    fn optional_date(&mut self, column: &'static str) -> Option<NaiveDate> {
        let reference = self.reference_date;
        self.optional(column, |c, v| fields::parse_date(c, v, reference))
    }

    fn check(&mut self, column: &'static str, ok: bool, reason: impl Into<String>) {
        if !ok {
            self.errors.push(FieldError::new(column, reason));
        }
    }
}

/// Convertit et valide une ligne brute
///
/// Retourne toutes les erreurs de la ligne, pas seulement la première.
pub fn parse_row(row: &RawRow, reference_date: NaiveDate) -> Result<Statique, Vec<RowError>> {
    let mut r = RowReader::new(row, reference_date);

    let nom_amenageur = r.optional_text("nom_amenageur");
    let siren_amenageur = r.optional_matching("siren_amenageur", rules::is_siren, "SIREN");
    let contact_amenageur = r.optional_matching("contact_amenageur", rules::is_email, "e-mail");
    let nom_operateur = r.optional_text("nom_operateur");
    let contact_operateur = r.required_matching("contact_operateur", rules::is_email, "e-mail");
    let telephone_operateur =
        r.optional_matching("telephone_operateur", rules::is_french_phone, "phone number");
    let nom_enseigne = r.required_text("nom_enseigne");
    let id_station_itinerance =
        r.required_matching("id_station_itinerance", rules::is_station_id, "station id");
    let id_station_local = r.optional_text("id_station_local");
    let nom_station = r.required_text("nom_station");
    let implantation_station = r.required_vocabulary("implantation_station");
    let adresse_station = r.required_text("adresse_station");
    let code_insee_commune =
        r.optional_matching("code_insee_commune", rules::is_code_insee, "INSEE code");
    let coordonnees_xy = r.required("coordonneesXY", fields::parse_coordinates);
    let nbre_pdc = r.required("nbre_pdc", fields::parse_int);
    let id_pdc_itinerance = r.required_matching("id_pdc_itinerance", rules::is_pdc_id, "pdc id");
    let id_pdc_local = r.optional_text("id_pdc_local");
    let puissance_nominale = r.required("puissance_nominale", fields::parse_float);
    let prise_type_ef = r.required("prise_type_ef", fields::parse_bool);
    let prise_type_2 = r.required("prise_type_2", fields::parse_bool);
    let prise_type_combo_ccs = r.required("prise_type_combo_ccs", fields::parse_bool);
    let prise_type_chademo = r.required("prise_type_chademo", fields::parse_bool);
    let prise_type_autre = r.required("prise_type_autre", fields::parse_bool);
    let gratuit = r.optional("gratuit", fields::parse_bool);
    let paiement_acte = r.required("paiement_acte", fields::parse_bool);
    let paiement_cb = r.optional("paiement_cb", fields::parse_bool);
    let paiement_autre = r.optional("paiement_autre", fields::parse_bool);
    let tarification = r.optional_text("tarification");
    let condition_acces = r.required_vocabulary("condition_acces");
    let reservation = r.required("reservation", fields::parse_bool);
    let horaires = r.required_matching("horaires", rules::is_horaires, "opening hours");
    let accessibilite_pmr = r.required_vocabulary("accessibilite_pmr");
    let restriction_gabarit = r.required_text("restriction_gabarit");
    let station_deux_roues = r.required("station_deux_roues", fields::parse_bool);
    let raccordement = r.optional("raccordement", |c, v| {
        v.parse::<Raccordement>().map_err(|e| FieldError::new(c, e))
    });
    let num_pdl = r.optional_text("num_pdl");
    let date_mise_en_service = r.optional_date("date_mise_en_service");
    let observations = r.optional_text("observations");
    let date_maj = r.required_date("date_maj");
    let cable_t2_attache = r.optional("cable_t2_attache", fields::parse_bool);

    if let Some(n) = nbre_pdc {
        r.check("nbre_pdc", n >= 1, format!("{} must be >= 1", n));
    }
    if let Some(p) = puissance_nominale {
        r.check("puissance_nominale", p > 0.0, format!("{} kW must be > 0", p));
    }
    if let Some(pdl) = &num_pdl {
        r.check(
            "num_pdl",
            pdl.chars().count() <= rules::NUM_PDL_MAX_LEN,
            format!("longer than {} characters", rules::NUM_PDL_MAX_LEN),
        );
    }

    let row_number = row.row;
    let errors = std::mem::take(&mut r.errors);
    if !errors.is_empty() {
        return Err(errors.into_iter().map(|e| e.at_row(row_number)).collect());
    }

    let (
        Some(contact_operateur),
        Some(nom_enseigne),
        Some(id_station_itinerance),
        Some(nom_station),
        Some(implantation_station),
        Some(adresse_station),
        Some(coordonnees_xy),
        Some(nbre_pdc),
        Some(id_pdc_itinerance),
        Some(puissance_nominale),
        Some(prise_type_ef),
        Some(prise_type_2),
        Some(prise_type_combo_ccs),
        Some(prise_type_chademo),
        Some(prise_type_autre),
        Some(paiement_acte),
        Some(condition_acces),
        Some(reservation),
        Some(horaires),
        Some(accessibilite_pmr),
        Some(restriction_gabarit),
        Some(station_deux_roues),
        Some(date_maj),
    ) = (
        contact_operateur,
        nom_enseigne,
        id_station_itinerance,
        nom_station,
        implantation_station,
        adresse_station,
        coordonnees_xy,
        nbre_pdc,
        id_pdc_itinerance,
        puissance_nominale,
        prise_type_ef,
        prise_type_2,
        prise_type_combo_ccs,
        prise_type_chademo,
        prise_type_autre,
        paiement_acte,
        condition_acces,
        reservation,
        horaires,
        accessibilite_pmr,
        restriction_gabarit,
        station_deux_roues,
        date_maj,
    )
    else {
        // Chaque valeur manquante a déjà enregistré une erreur
        return Err(vec![RowError::new(row_number, "*", "incomplete row")]);
    };

    Ok(Statique {
        nom_amenageur,
        siren_amenageur,
        contact_amenageur,
        nom_operateur,
        contact_operateur,
        telephone_operateur,
        nom_enseigne,
        id_station_itinerance,
        id_station_local,
        nom_station,
        implantation_station,
        adresse_station,
        code_insee_commune,
        coordonnees_xy,
        nbre_pdc,
        id_pdc_itinerance,
        id_pdc_local,
        puissance_nominale,
        prise_type_ef,
        prise_type_2,
        prise_type_combo_ccs,
        prise_type_chademo,
        prise_type_autre,
        gratuit,
        paiement_acte,
        paiement_cb,
        paiement_autre,
        tarification,
        condition_acces,
        reservation,
        horaires,
        accessibilite_pmr,
        restriction_gabarit,
        station_deux_roues,
        raccordement,
        num_pdl,
        date_mise_en_service,
        observations,
        date_maj,
        cable_t2_attache,
    })
}

/// Valide toutes les lignes d'un fichier
///
/// Les lignes sont converties en parallèle; l'ordre du fichier est conservé.
/// Un `id_pdc_itinerance` déjà vu plus haut dans le fichier rejette la ligne,
/// que la première occurrence soit valide ou non.
pub fn parse_feed(feed: &RawFeed, reference_date: NaiveDate) -> (Vec<Record>, Vec<RowError>) {
    let parsed: Vec<Result<Statique, Vec<RowError>>> = feed
        .rows
        .par_iter()
        .map(|row| parse_row(row, reference_date))
        .collect();

    let mut records = Vec::with_capacity(parsed.len());
    let mut errors = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (raw, result) in feed.rows.iter().zip(parsed) {
        let row = raw.row;
        match result {
            Ok(statique) => {
                if let Some(&first) = first_seen.get(&statique.id_pdc_itinerance) {
                    errors.push(RowError::new(
                        row,
                        "id_pdc_itinerance",
                        format!(
                            "'{}' already declared at row {}",
                            statique.id_pdc_itinerance, first
                        ),
                    ));
                    continue;
                }
                first_seen.insert(statique.id_pdc_itinerance.clone(), row);
                records.push(Record { row, statique });
            }
            Err(row_errors) => {
                if let Some(id) = raw.get("id_pdc_itinerance").map(str::trim) {
                    first_seen.entry(id.to_string()).or_insert(row);
                }
                errors.extend(row_errors);
            }
        }
    }

    debug!(valid = records.len(), errors = errors.len(), "Feed validated");
    (records, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessibilitePmr, ImplantationStation};

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn valid_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("nom_amenageur", "Aménageur SAS"),
            ("siren_amenageur", "123456789"),
            ("contact_amenageur", "amenageur@example.com"),
            ("nom_operateur", "Opérateur"),
            ("contact_operateur", "operateur@example.com"),
            ("telephone_operateur", "0144276350"),
            ("nom_enseigne", "Réseau Recharge"),
            ("id_station_itinerance", "FRS63P0001"),
            ("id_station_local", ""),
            ("nom_station", "Place de la Mairie"),
            ("implantation_station", "Voirie"),
            ("adresse_station", "1 place de la Mairie 63000 Clermont-Ferrand"),
            ("code_insee_commune", "63113"),
            ("coordonneesXY", "[3.0863, 45.7772]"),
            ("nbre_pdc", "2"),
            ("id_pdc_itinerance", "FRS63E0001"),
            ("id_pdc_local", ""),
            ("puissance_nominale", "22"),
            ("prise_type_ef", "false"),
            ("prise_type_2", "true"),
            ("prise_type_combo_ccs", "false"),
            ("prise_type_chademo", "false"),
            ("prise_type_autre", "false"),
            ("gratuit", "false"),
            ("paiement_acte", "true"),
            ("paiement_cb", "true"),
            ("paiement_autre", ""),
            ("tarification", "0,35 €/kWh"),
            ("condition_acces", "Accès libre"),
            ("reservation", "false"),
            ("horaires", "24/7"),
            ("accessibilite_pmr", "Accessible mais non réservé PMR"),
            ("restriction_gabarit", "Hauteur maximale 2m"),
            ("station_deux_roues", "false"),
            ("raccordement", "Direct"),
            ("num_pdl", "12345678901234"),
            ("date_mise_en_service", "2023-03-01"),
            ("observations", ""),
            ("date_maj", "2024-05-20"),
            ("cable_t2_attache", "false"),
        ]
    }

    fn row_with(row: usize, overrides: &[(&'static str, &'static str)]) -> RawRow {
        let pairs = valid_pairs().into_iter().map(|(k, v)| {
            let v = overrides
                .iter()
                .find(|(ok, _)| *ok == k)
                .map(|(_, ov)| *ov)
                .unwrap_or(v);
            (k, v)
        });
        RawRow::from_pairs(row, pairs)
    }

    #[test]
    fn test_parse_valid_row() {
        let statique = parse_row(&row_with(2, &[]), reference()).unwrap();
        assert_eq!(statique.id_station_itinerance, "FRS63P0001");
        assert_eq!(statique.implantation_station, ImplantationStation::Voirie);
        assert_eq!(
            statique.accessibilite_pmr,
            AccessibilitePmr::NonReserve
        );
        assert_eq!(statique.id_station_local, None);
        assert_eq!(statique.paiement_autre, None);
        assert_eq!(statique.nbre_pdc, 2);
        assert_eq!(statique.coordonnees_xy.latitude, 45.7772);
    }

    #[test]
    fn test_parse_row_collects_all_errors() {
        let errors = parse_row(
            &row_with(
                7,
                &[
                    ("siren_amenageur", "1234"),
                    ("nom_enseigne", ""),
                    ("nbre_pdc", "0"),
                    ("horaires", "toujours"),
                ],
            ),
            reference(),
        )
        .unwrap_err();

        let columns: Vec<&str> = errors.iter().map(|e| e.column.as_str()).collect();
        assert_eq!(errors.len(), 4);
        assert!(columns.contains(&"siren_amenageur"));
        assert!(columns.contains(&"nom_enseigne"));
        assert!(columns.contains(&"nbre_pdc"));
        assert!(columns.contains(&"horaires"));
        assert!(errors.iter().all(|e| e.row == 7));
    }

    #[test]
    fn test_parse_row_rejects_non_concerne_station() {
        let errors = parse_row(
            &row_with(2, &[("id_station_itinerance", "Non concerné")]),
            reference(),
        )
        .unwrap_err();
        assert_eq!(errors[0].column, "id_station_itinerance");
    }

    #[test]
    fn test_parse_row_future_date_maj() {
        let errors =
            parse_row(&row_with(2, &[("date_maj", "2030-01-01")]), reference()).unwrap_err();
        assert_eq!(errors[0].column, "date_maj");
    }

    #[test]
    fn test_parse_row_power_must_be_positive() {
        let errors =
            parse_row(&row_with(2, &[("puissance_nominale", "0")]), reference()).unwrap_err();
        assert_eq!(errors[0].column, "puissance_nominale");
    }

    #[test]
    fn test_parse_feed_rejects_duplicated_pdc() {
        let feed = RawFeed::from_rows(vec![
            row_with(2, &[]),
            row_with(3, &[("nom_station", "Autre")]),
            row_with(
                4,
                &[
                    ("id_pdc_itinerance", "FRS63E0002"),
                    ("id_station_itinerance", "FRS63P0001"),
                ],
            ),
        ]);

        let (records, errors) = parse_feed(&feed, reference());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 2);
        assert_eq!(records[1].row, 4);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row, 3);
        assert!(errors[0].reason.contains("row 2"));
    }

    #[test]
    fn test_parse_feed_duplicate_of_invalid_row() {
        let feed = RawFeed::from_rows(vec![
            row_with(2, &[("puissance_nominale", "0")]),
            row_with(3, &[]),
        ]);

        let (records, errors) = parse_feed(&feed, reference());
        assert!(records.is_empty());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].column, "puissance_nominale");
        assert_eq!(errors[1].row, 3);
        assert_eq!(errors[1].column, "id_pdc_itinerance");
        assert!(errors[1].reason.contains("row 2"));
    }
}
