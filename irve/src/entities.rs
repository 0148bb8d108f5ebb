//! Vues normalisées d'un enregistrement statique
//!
//! Chaque entité est une projection d'un sous-ensemble de colonnes de la
//! ligne dénormalisée, identifiée par sa clé naturelle:
//!
//! | entité        | clé naturelle                                           |
//! |---------------|---------------------------------------------------------|
//! | Amenageur     | (nom_amenageur, siren_amenageur, contact_amenageur)     |
//! | Operateur     | (nom_operateur, contact_operateur, telephone_operateur) |
//! | Enseigne      | nom_enseigne                                            |
//! | Localisation  | coordonneesXY                                           |
//! | Station       | id_station_itinerance                                   |
//! | PointDeCharge | id_pdc_itinerance                                       |

use std::fmt::Debug;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use crate::parser::rules::OPERATIONAL_UNIT_CODE_LEN;
use crate::types::{
    AccessibilitePmr, ConditionAcces, Coordinates, ImplantationStation, Raccordement, Statique,
};

/// Entité extraite d'une ligne statique
pub trait Entity: Clone + Debug + PartialEq {
    /// Clé naturelle de l'entité
    type Key: Clone + Debug + Eq + Hash;

    /// Nom de la table cible
    const NAME: &'static str;

    fn from_statique(statique: &Statique) -> Self;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Amenageur {
    pub nom_amenageur: Option<String>,
    pub siren_amenageur: Option<String>,
    pub contact_amenageur: Option<String>,
}

impl Entity for Amenageur {
    type Key = Amenageur;
    const NAME: &'static str = "amenageur";

    fn from_statique(s: &Statique) -> Self {
        Self {
            nom_amenageur: s.nom_amenageur.clone(),
            siren_amenageur: s.siren_amenageur.clone(),
            contact_amenageur: s.contact_amenageur.clone(),
        }
    }

    fn key(&self) -> Self::Key {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Operateur {
    pub nom_operateur: Option<String>,
    pub contact_operateur: String,
    pub telephone_operateur: Option<String>,
}

impl Entity for Operateur {
    type Key = Operateur;
    const NAME: &'static str = "operateur";

    fn from_statique(s: &Statique) -> Self {
        Self {
            nom_operateur: s.nom_operateur.clone(),
            contact_operateur: s.contact_operateur.clone(),
            telephone_operateur: s.telephone_operateur.clone(),
        }
    }

    fn key(&self) -> Self::Key {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Enseigne {
    pub nom_enseigne: String,
}

impl Entity for Enseigne {
    type Key = String;
    const NAME: &'static str = "enseigne";

    fn from_statique(s: &Statique) -> Self {
        Self {
            nom_enseigne: s.nom_enseigne.clone(),
        }
    }

    fn key(&self) -> Self::Key {
        self.nom_enseigne.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Localisation {
    pub adresse_station: String,
    pub code_insee_commune: Option<String>,
    pub coordonnees_xy: Coordinates,
}

impl Entity for Localisation {
    type Key = Coordinates;
    const NAME: &'static str = "localisation";

    fn from_statique(s: &Statique) -> Self {
        Self {
            adresse_station: s.adresse_station.clone(),
            code_insee_commune: s.code_insee_commune.clone(),
            coordonnees_xy: s.coordonnees_xy,
        }
    }

    fn key(&self) -> Self::Key {
        self.coordonnees_xy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id_station_itinerance: String,
    pub id_station_local: Option<String>,
    pub nom_station: String,
    pub implantation_station: ImplantationStation,
    pub nbre_pdc: i32,
    pub condition_acces: ConditionAcces,
    pub horaires: String,
    pub station_deux_roues: bool,
    pub raccordement: Option<Raccordement>,
    pub num_pdl: Option<String>,
    pub date_maj: NaiveDate,
    pub date_mise_en_service: Option<NaiveDate>,
}

impl Station {
    /// Code de l'unité opérationnelle émettrice de l'identifiant
    pub fn operational_unit_code(&self) -> &str {
        operational_unit_code(&self.id_station_itinerance)
    }
}

impl Entity for Station {
    type Key = String;
    const NAME: &'static str = "station";

    fn from_statique(s: &Statique) -> Self {
        Self {
            id_station_itinerance: s.id_station_itinerance.clone(),
            id_station_local: s.id_station_local.clone(),
            nom_station: s.nom_station.clone(),
            implantation_station: s.implantation_station,
            nbre_pdc: s.nbre_pdc,
            condition_acces: s.condition_acces,
            horaires: s.horaires.clone(),
            station_deux_roues: s.station_deux_roues,
            raccordement: s.raccordement,
            num_pdl: s.num_pdl.clone(),
            date_maj: s.date_maj,
            date_mise_en_service: s.date_mise_en_service,
        }
    }

    fn key(&self) -> Self::Key {
        self.id_station_itinerance.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointDeCharge {
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
    pub reservation: bool,
    pub accessibilite_pmr: AccessibilitePmr,
    pub restriction_gabarit: String,
    pub observations: Option<String>,
    pub cable_t2_attache: Option<bool>,
}

impl Entity for PointDeCharge {
    type Key = String;
    const NAME: &'static str = "pointdecharge";

    fn from_statique(s: &Statique) -> Self {
        Self {
            id_pdc_itinerance: s.id_pdc_itinerance.clone(),
            id_pdc_local: s.id_pdc_local.clone(),
            puissance_nominale: s.puissance_nominale,
            prise_type_ef: s.prise_type_ef,
            prise_type_2: s.prise_type_2,
            prise_type_combo_ccs: s.prise_type_combo_ccs,
            prise_type_chademo: s.prise_type_chademo,
            prise_type_autre: s.prise_type_autre,
            gratuit: s.gratuit,
            paiement_acte: s.paiement_acte,
            paiement_cb: s.paiement_cb,
            paiement_autre: s.paiement_autre,
            tarification: s.tarification.clone(),
            reservation: s.reservation,
            accessibilite_pmr: s.accessibilite_pmr,
            restriction_gabarit: s.restriction_gabarit.clone(),
            observations: s.observations.clone(),
            cable_t2_attache: s.cable_t2_attache,
        }
    }

    fn key(&self) -> Self::Key {
        self.id_pdc_itinerance.clone()
    }
}

/// Préfixe de 5 caractères identifiant l'unité opérationnelle (ex: `FRS63`)
///
/// Les identifiants validés sont ASCII; un identifiant plus court est
/// retourné tel quel.
pub fn operational_unit_code(id_itinerance: &str) -> &str {
    id_itinerance
        .get(..OPERATIONAL_UNIT_CODE_LEN)
        .unwrap_or(id_itinerance)
}
