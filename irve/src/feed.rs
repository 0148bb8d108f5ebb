//! Lecture brute d'un fichier IRVE (décodage, CSV, en-têtes)

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::error::{IrveError, RowError};
use crate::types::ParseOptions;

/// Colonnes du schéma IRVE v2.3 reconnues par le parser
pub const COLUMNS: &[&str] = &[
    "nom_amenageur",
    "siren_amenageur",
    "contact_amenageur",
    "nom_operateur",
    "contact_operateur",
    "telephone_operateur",
    "nom_enseigne",
    "id_station_itinerance",
    "id_station_local",
    "nom_station",
    "implantation_station",
    "adresse_station",
    "code_insee_commune",
    "coordonneesXY",
    "nbre_pdc",
    "id_pdc_itinerance",
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
    "condition_acces",
    "reservation",
    "horaires",
    "accessibilite_pmr",
    "restriction_gabarit",
    "station_deux_roues",
    "raccordement",
    "num_pdl",
    "date_mise_en_service",
    "observations",
    "date_maj",
    "cable_t2_attache",
];

/// Colonnes devant figurer dans l'en-tête (leur valeur est obligatoire)
pub const REQUIRED_COLUMNS: &[&str] = &[
    "contact_operateur",
    "nom_enseigne",
    "id_station_itinerance",
    "nom_station",
    "implantation_station",
    "adresse_station",
    "coordonneesXY",
    "nbre_pdc",
    "id_pdc_itinerance",
    "puissance_nominale",
    "prise_type_ef",
    "prise_type_2",
    "prise_type_combo_ccs",
    "prise_type_chademo",
    "prise_type_autre",
    "paiement_acte",
    "condition_acces",
    "reservation",
    "horaires",
    "accessibilite_pmr",
    "restriction_gabarit",
    "station_deux_roues",
    "date_maj",
];

/// Contenu tabulaire d'un fichier, en-têtes résolus
#[derive(Debug)]
pub struct RawFeed {
    /// Position de chaque colonne reconnue
    columns: HashMap<&'static str, usize>,

    /// Nombre de colonnes de l'en-tête
    width: usize,

    /// Lignes de données
    pub rows: Vec<RawRow>,
}

/// Une ligne de données brute
#[derive(Debug, Clone)]
pub struct RawRow {
    /// Numéro de ligne (1 = en-tête)
    pub row: usize,
    values: HashMap<&'static str, String>,
}

impl RawRow {
    /// Construit une ligne depuis des paires (colonne, valeur)
    pub fn from_pairs<'a>(row: usize, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = pairs
            .into_iter()
            .filter_map(|(name, value)| {
                canonical_column(name).map(|column| (column, value.trim().to_string()))
            })
            .collect();
        Self { row, values }
    }

    /// Valeur d'une colonne; `None` si absente ou vide
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

impl RawFeed {
    /// Construit un contenu depuis des lignes déjà extraites
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        Self {
            columns: HashMap::new(),
            width: 0,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Vrai si la colonne figure dans l'en-tête
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    fn build_row(&self, row: usize, record: &StringRecord) -> RawRow {
        let values = self
            .columns
            .iter()
            .map(|(&name, &idx)| (name, record.get(idx).unwrap_or("").to_string()))
            .collect();
        RawRow { row, values }
    }
}

/// Retrouve le nom canonique (statique) d'une colonne
fn canonical_column(name: &str) -> Option<&'static str> {
    COLUMNS.iter().copied().find(|c| *c == name)
}

/// Décode les octets bruts selon l'encodage demandé
///
/// Un BOM éventuel l'emporte sur le label et est retiré.
pub fn decode(data: &[u8], label: &str) -> Result<String, IrveError> {
    let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IrveError::UnsupportedEncoding(label.to_string()))?;

    let (decoded, used, had_errors) = encoding.decode(data);
    if had_errors {
        warn!(
            encoding = used.name(),
            "Feed contains byte sequences invalid for the declared encoding"
        );
    }
    Ok(decoded.into_owned())
}

/// Lit un fichier IRVE et résout ses en-têtes
///
/// Retourne le contenu brut et les lignes mal formées (nombre de champs
/// incohérent), qui sont écartées.
pub fn read(data: &[u8], options: &ParseOptions) -> Result<(RawFeed, Vec<RowError>), IrveError> {
    let text = decode(data, &options.encoding)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(IrveError::EmptyFeed);
    }

    let columns = resolve_headers(&headers, &options.aliases)?;
    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(required) {
            return Err(IrveError::MissingColumn((*required).to_string()));
        }
    }

    let mut feed = RawFeed {
        columns,
        width: headers.len(),
        rows: Vec::new(),
    };
    let mut malformed = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        if record.len() != feed.width {
            malformed.push(RowError::new(
                row,
                "*",
                format!("expected {} fields, found {}", feed.width, record.len()),
            ));
            continue;
        }

        let raw = feed.build_row(row, &record);
        feed.rows.push(raw);
    }

    debug!(
        rows = feed.rows.len(),
        malformed = malformed.len(),
        columns = feed.columns.len(),
        "Feed read"
    );

    Ok((feed, malformed))
}

/// Associe chaque colonne reconnue à sa position, après renommage
fn resolve_headers(
    headers: &StringRecord,
    aliases: &HashMap<String, String>,
) -> Result<HashMap<&'static str, usize>, IrveError> {
    let mut columns = HashMap::new();

    for (idx, raw) in headers.iter().enumerate() {
        let name = raw.trim().trim_start_matches('\u{feff}');
        let name = aliases.get(name).map(String::as_str).unwrap_or(name);

        let Some(column) = canonical_column(name) else {
            debug!(column = name, "Ignoring unknown column");
            continue;
        };

        if columns.insert(column, idx).is_some() {
            return Err(IrveError::DuplicatedColumn(column.to_string()));
        }
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> String {
        COLUMNS.join(",")
    }

    #[test]
    fn test_read_missing_required_column() {
        let data = "nom_amenageur,nom_enseigne\nA,B\n";
        let err = read(data.as_bytes(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IrveError::MissingColumn(ref c) if c == "contact_operateur"));
    }

    #[test]
    fn test_read_empty_feed() {
        let err = read(b"", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IrveError::EmptyFeed));
    }

    #[test]
    fn test_read_duplicated_column() {
        let data = format!("{},nom_enseigne\n", header());
        let err = read(data.as_bytes(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IrveError::DuplicatedColumn(ref c) if c == "nom_enseigne"));
    }

    #[test]
    fn test_read_aliases_and_unknown_columns() {
        let mut options = ParseOptions::default();
        options
            .aliases
            .insert("n_enseigne".to_string(), "nom_enseigne".to_string());

        let cols: Vec<&str> = COLUMNS
            .iter()
            .map(|c| if *c == "nom_enseigne" { "n_enseigne" } else { c })
            .chain(std::iter::once("extra"))
            .collect();
        let values: Vec<&str> = cols
            .iter()
            .map(|c| if *c == "n_enseigne" { "Réseau" } else { "" })
            .collect();
        let data = format!("{}\n{}\n", cols.join(","), values.join(","));

        let (feed, malformed) = read(data.as_bytes(), &options).unwrap();
        assert!(malformed.is_empty());
        assert!(feed.has_column("nom_enseigne"));
        assert_eq!(feed.rows.len(), 1);
        assert_eq!(feed.rows[0].get("nom_enseigne"), Some("Réseau"));
        assert_eq!(feed.rows[0].get("nom_station"), None);
        assert_eq!(feed.rows[0].row, 2);
    }

    #[test]
    fn test_read_ragged_row() {
        let data = format!("{}\na,b,c\n", header());
        let (feed, malformed) = read(data.as_bytes(), &ParseOptions::default()).unwrap();
        assert!(feed.is_empty());
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].row, 2);
    }

    #[test]
    fn test_decode_windows_1252() {
        // "é" en windows-1252
        let decoded = decode(&[b'P', b'r', 0xE9], "windows-1252").unwrap();
        assert_eq!(decoded, "Pré");
    }

    #[test]
    fn test_decode_strips_bom() {
        let decoded = decode(b"\xEF\xBB\xBFabc", "utf-8").unwrap();
        assert_eq!(decoded, "abc");
    }

    #[test]
    fn test_decode_unknown_label() {
        assert!(matches!(
            decode(b"abc", "klingon"),
            Err(IrveError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let options = ParseOptions {
            delimiter: b';',
            ..Default::default()
        };
        let data = format!("{}\n", COLUMNS.join(";"));
        let (feed, _) = read(data.as_bytes(), &options).unwrap();
        assert!(feed.has_column("date_maj"));
    }
}
