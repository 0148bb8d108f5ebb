//! Types de données pour le crate irve

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RowError;

/// Résultat du parsing d'un fichier IRVE statique
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Lignes valides, dans l'ordre du fichier
    pub records: Vec<Record>,

    /// Lignes rejetées (non fatales)
    pub errors: Vec<RowError>,

    /// Nombre de lignes de données lues (hors en-tête)
    pub rows_read: usize,
}

impl ParseResult {
    /// Vrai si aucune ligne n'a été rejetée
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Extrait les enregistrements statiques, sans les numéros de ligne
    pub fn statiques(&self) -> Vec<Statique> {
        self.records.iter().map(|r| r.statique.clone()).collect()
    }
}

/// Une ligne valide avec sa position dans le fichier
#[derive(Debug, Clone)]
pub struct Record {
    /// Numéro de ligne (1 = en-tête)
    pub row: usize,
    pub statique: Statique,
}

/// Options de lecture d'un fichier
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Séparateur de champs
    pub delimiter: u8,

    /// Label d'encodage WHATWG (utf-8, windows-1252, ...)
    pub encoding: String,

    /// Renommage de colonnes: nom dans le fichier -> nom canonique
    pub aliases: HashMap<String, String>,

    /// Date de référence pour rejeter les dates dans le futur
    pub reference_date: NaiveDate,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: "utf-8".into(),
            aliases: HashMap::new(),
            reference_date: chrono::Local::now().date_naive(),
        }
    }
}

/// Description statique d'un point de charge (une ligne du schéma IRVE v2.3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statique {
    pub nom_amenageur: Option<String>,
    pub siren_amenageur: Option<String>,
    pub contact_amenageur: Option<String>,
    pub nom_operateur: Option<String>,
    pub contact_operateur: String,
    pub telephone_operateur: Option<String>,
    pub nom_enseigne: String,
    pub id_station_itinerance: String,
    pub id_station_local: Option<String>,
    pub nom_station: String,
    pub implantation_station: ImplantationStation,
    pub adresse_station: String,
    pub code_insee_commune: Option<String>,
    #[serde(rename = "coordonneesXY")]
    pub coordonnees_xy: Coordinates,
    pub nbre_pdc: i32,
    pub id_pdc_itinerance: String,
    pub id_pdc_local: Option<String>,
    pub puissance_nominale: f64,
    pub prise_type_ef: bool,
    pub prise_type_2: bool,
    pub prise_type_combo_ccs: bool,
    pub prise_type_chademo: bool,
    pub prise_type_autre: bool,
    pub gratuit: Option<bool>,
    pub paiement_acte: bool,
    pub paiement_cb: Option<bool>,
    pub paiement_autre: Option<bool>,
    pub tarification: Option<String>,
    pub condition_acces: ConditionAcces,
    pub reservation: bool,
    pub horaires: String,
    pub accessibilite_pmr: AccessibilitePmr,
    pub restriction_gabarit: String,
    pub station_deux_roues: bool,
    pub raccordement: Option<Raccordement>,
    pub num_pdl: Option<String>,
    pub date_mise_en_service: Option<NaiveDate>,
    pub observations: Option<String>,
    pub date_maj: NaiveDate,
    pub cable_t2_attache: Option<bool>,
}

/// Coordonnées WGS84 d'une station (`[longitude, latitude]`)
///
/// Égalité et hash bit à bit: les valeurs sont toujours finies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        // -0.0 et 0.0 doivent être la même clé
        Self {
            longitude: longitude + 0.0,
            latitude: latitude + 0.0,
        }
    }
}

impl PartialEq for Coordinates {
    fn eq(&self, other: &Self) -> bool {
        self.longitude.to_bits() == other.longitude.to_bits()
            && self.latitude.to_bits() == other.latitude.to_bits()
    }
}

impl Eq for Coordinates {}

impl Hash for Coordinates {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.longitude.to_bits().hash(state);
        self.latitude.to_bits().hash(state);
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.longitude, self.latitude)
    }
}

/// Génère une énumération à vocabulaire fermé (libellés français du schéma)
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Toutes les valeurs admises
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Libellé tel qu'il apparaît dans le schéma
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .find(|v| v.as_str() == s || v.as_str().to_lowercase() == s.to_lowercase())
                    .copied()
                    .ok_or_else(|| {
                        let labels: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        format!("'{}' is not one of: {}", s, labels.join(" | "))
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Type d'implantation de la station
    ImplantationStation {
        Voirie => "Voirie",
        ParkingPublic => "Parking public",
        ParkingPriveUsagePublic => "Parking privé à usage public",
        ParkingPriveClientele => "Parking privé réservé à la clientèle",
        StationRecharge => "Station dédiée à la recharge rapide",
    }
}

vocabulary! {
    /// Condition d'accès à la station
    ConditionAcces {
        AccesLibre => "Accès libre",
        AccesReserve => "Accès réservé",
    }
}

vocabulary! {
    /// Accessibilité aux personnes à mobilité réduite
    AccessibilitePmr {
        ReservePmr => "Réservé PMR",
        NonReserve => "Accessible mais non réservé PMR",
        NonAccessible => "Non accessible",
        Inconnue => "Accessibilité inconnue",
    }
}

vocabulary! {
    /// Type de raccordement au réseau
    Raccordement {
        Direct => "Direct",
        Indirect => "Indirect",
    }
}
