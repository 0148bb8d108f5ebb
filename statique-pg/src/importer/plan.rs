//! Plan d'import: entités dédupliquées et liens par clé naturelle
//!
//! Construit sans base de données à partir des lignes validées.

use std::collections::{BTreeSet, HashMap};

use irve::{
    Amenageur, Enseigne, Entity, Localisation, Operateur, PointDeCharge, Station, Statique,
};

use super::ImporterError;

/// Liens d'une station vers ses entités parentes (clés naturelles)
#[derive(Debug, Clone, PartialEq)]
pub struct StationLinks {
    pub amenageur: <Amenageur as Entity>::Key,
    pub operateur: <Operateur as Entity>::Key,
    pub enseigne: <Enseigne as Entity>::Key,
    pub localisation: <Localisation as Entity>::Key,
}

/// Entités d'un type, uniques par clé, dans l'ordre de première apparition
#[derive(Debug, Clone)]
pub struct UniqueEntities<E: Entity, L = ()> {
    items: Vec<(E, L)>,
    index: HashMap<E::Key, usize>,
}

impl<E: Entity, L: PartialEq> Default for UniqueEntities<E, L> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<E: Entity, L: PartialEq> UniqueEntities<E, L> {
    /// Ajoute une entité; une clé déjà vue doit porter les mêmes valeurs
    fn insert(&mut self, entity: E, links: L, position: usize) -> Result<(), ImporterError> {
        let key = entity.key();
        match self.index.get(&key) {
            Some(&idx) => {
                let (existing, existing_links) = &self.items[idx];
                if *existing != entity || *existing_links != links {
                    return Err(ImporterError::ConflictingEntity {
                        entity: E::NAME,
                        key: format!("{:?}", key),
                        position,
                    });
                }
            }
            None => {
                self.index.insert(key, self.items.len());
                self.items.push((entity, links));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(E, L)> {
        self.items.iter()
    }

    pub fn get(&self, key: &E::Key) -> Option<&(E, L)> {
        self.index.get(key).map(|&idx| &self.items[idx])
    }
}

/// Plan d'import d'un lot
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub amenageurs: UniqueEntities<Amenageur>,
    pub operateurs: UniqueEntities<Operateur>,
    pub enseignes: UniqueEntities<Enseigne>,
    pub localisations: UniqueEntities<Localisation>,
    pub stations: UniqueEntities<Station, StationLinks>,
    /// Chaque point de charge avec la clé de sa station
    pub points_de_charge: UniqueEntities<PointDeCharge, String>,
}

impl ImportPlan {
    /// Construit le plan à partir de lignes validées
    ///
    /// # Errors
    /// `ConflictingEntity` si deux lignes partagent une clé de localisation,
    /// de station ou de point de charge avec des valeurs différentes.
    pub fn build(statiques: &[Statique]) -> Result<Self, ImporterError> {
        let mut plan = Self::default();

        for (idx, statique) in statiques.iter().enumerate() {
            let position = idx + 1;
            let amenageur = Amenageur::from_statique(statique);
            let operateur = Operateur::from_statique(statique);
            let enseigne = Enseigne::from_statique(statique);
            let localisation = Localisation::from_statique(statique);
            let station = Station::from_statique(statique);
            let pdc = PointDeCharge::from_statique(statique);

            let links = StationLinks {
                amenageur: amenageur.key(),
                operateur: operateur.key(),
                enseigne: enseigne.key(),
                localisation: localisation.key(),
            };
            let station_key = station.key();

            plan.amenageurs.insert(amenageur, (), position)?;
            plan.operateurs.insert(operateur, (), position)?;
            plan.enseignes.insert(enseigne, (), position)?;
            plan.localisations.insert(localisation, (), position)?;
            plan.stations.insert(station, links, position)?;
            plan.points_de_charge.insert(pdc, station_key, position)?;
        }

        Ok(plan)
    }

    /// Codes d'unités opérationnelles requis par les stations, triés
    pub fn operational_unit_codes(&self) -> Vec<String> {
        self.stations
            .iter()
            .map(|(station, _)| station.operational_unit_code().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.points_de_charge.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use irve::types::{
        AccessibilitePmr, ConditionAcces, Coordinates, ImplantationStation,
    };

    fn statique(station: &str, pdc: &str) -> Statique {
        Statique {
            nom_amenageur: Some("Aménageur".into()),
            siren_amenageur: Some("123456789".into()),
            contact_amenageur: Some("a@example.com".into()),
            nom_operateur: Some("Opérateur".into()),
            contact_operateur: "o@example.com".into(),
            telephone_operateur: None,
            nom_enseigne: "Enseigne".into(),
            id_station_itinerance: station.into(),
            id_station_local: None,
            nom_station: "Station".into(),
            implantation_station: ImplantationStation::Voirie,
            adresse_station: "1 rue de la Paix".into(),
            code_insee_commune: Some("63113".into()),
            coordonnees_xy: Coordinates::new(3.08, 45.77),
            nbre_pdc: 2,
            id_pdc_itinerance: pdc.into(),
            id_pdc_local: None,
            puissance_nominale: 22.0,
            prise_type_ef: false,
            prise_type_2: true,
            prise_type_combo_ccs: false,
            prise_type_chademo: false,
            prise_type_autre: false,
            gratuit: None,
            paiement_acte: true,
            paiement_cb: None,
            paiement_autre: None,
            tarification: None,
            condition_acces: ConditionAcces::AccesLibre,
            reservation: false,
            horaires: "24/7".into(),
            accessibilite_pmr: AccessibilitePmr::Inconnue,
            restriction_gabarit: "Aucune".into(),
            station_deux_roues: false,
            raccordement: None,
            num_pdl: None,
            date_mise_en_service: None,
            observations: None,
            date_maj: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            cable_t2_attache: None,
        }
    }

    #[test]
    fn test_build_deduplicates_by_key() {
        let rows = vec![
            statique("FRS63P0001", "FRS63E0001"),
            statique("FRS63P0001", "FRS63E0002"),
        ];

        let plan = ImportPlan::build(&rows).unwrap();

        assert_eq!(plan.amenageurs.len(), 1);
        assert_eq!(plan.operateurs.len(), 1);
        assert_eq!(plan.enseignes.len(), 1);
        assert_eq!(plan.localisations.len(), 1);
        assert_eq!(plan.stations.len(), 1);
        assert_eq!(plan.points_de_charge.len(), 2);

        let (_, station_key) = plan
            .points_de_charge
            .get(&"FRS63E0002".to_string())
            .unwrap();
        assert_eq!(station_key, "FRS63P0001");
    }

    #[test]
    fn test_build_keeps_first_occurrence_order() {
        let mut second = statique("FRA68P0002", "FRA68E0002");
        second.coordonnees_xy = Coordinates::new(7.33, 47.75);
        second.nom_enseigne = "Autre".into();
        let rows = vec![statique("FRS63P0001", "FRS63E0001"), second];

        let plan = ImportPlan::build(&rows).unwrap();

        let stations: Vec<_> = plan
            .stations
            .iter()
            .map(|(s, _)| s.id_station_itinerance.as_str())
            .collect();
        assert_eq!(stations, vec!["FRS63P0001", "FRA68P0002"]);
        let enseignes: Vec<_> = plan
            .enseignes
            .iter()
            .map(|(e, _)| e.nom_enseigne.as_str())
            .collect();
        assert_eq!(enseignes, vec!["Enseigne", "Autre"]);
    }

    #[test]
    fn test_station_links() {
        let plan = ImportPlan::build(&[statique("FRS63P0001", "FRS63E0001")]).unwrap();
        let (_, links) = plan.stations.get(&"FRS63P0001".to_string()).unwrap();

        assert_eq!(links.enseigne, "Enseigne");
        assert_eq!(links.localisation, Coordinates::new(3.08, 45.77));
        assert_eq!(links.amenageur.siren_amenageur.as_deref(), Some("123456789"));
    }

    #[test]
    fn test_conflicting_station_attributes() {
        let mut other = statique("FRS63P0001", "FRS63E0002");
        other.nom_station = "Autre nom".into();
        let rows = vec![statique("FRS63P0001", "FRS63E0001"), other];

        let err = ImportPlan::build(&rows).unwrap_err();
        match err {
            ImporterError::ConflictingEntity { entity, position, .. } => {
                assert_eq!(entity, "station");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_station_links() {
        let mut other = statique("FRS63P0001", "FRS63E0002");
        other.nom_enseigne = "Autre".into();
        let rows = vec![statique("FRS63P0001", "FRS63E0001"), other];

        assert!(matches!(
            ImportPlan::build(&rows),
            Err(ImporterError::ConflictingEntity { entity: "station", .. })
        ));
    }

    #[test]
    fn test_conflicting_localisation_address() {
        let mut other = statique("FRS63P0002", "FRS63E0002");
        other.adresse_station = "2 rue de la Paix".into();
        let rows = vec![statique("FRS63P0001", "FRS63E0001"), other];

        assert!(matches!(
            ImportPlan::build(&rows),
            Err(ImporterError::ConflictingEntity { entity: "localisation", .. })
        ));
    }

    #[test]
    fn test_operational_unit_codes() {
        let rows = vec![
            statique("FRS63P0001", "FRS63E0001"),
            statique("FRS63P0001", "FRS63E0002"),
            {
                let mut s = statique("FRA68P0001", "FRA68E0001");
                s.coordonnees_xy = Coordinates::new(7.33, 47.75);
                s
            },
        ];

        let plan = ImportPlan::build(&rows).unwrap();
        assert_eq!(plan.operational_unit_codes(), vec!["FRA68", "FRS63"]);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ImportPlan::build(&[]).unwrap();
        assert!(plan.is_empty());
        assert!(plan.operational_unit_codes().is_empty());
    }
}
