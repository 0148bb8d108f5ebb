//! Motifs de validation du schéma IRVE

use once_cell::sync::Lazy;
use regex::Regex;

static SIREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{9}$").expect("valid regex"));

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

static PHONE_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\+33|0033|0)\s*\(?0?\)?\s*[1-9](?:[\s.\-]*\d{2}){4}$").expect("valid regex")
});

static ID_STATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}P[A-Z0-9]{1,30}$").expect("valid regex"));

static ID_PDC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}E[A-Z0-9]{1,30}$").expect("valid regex"));

static CODE_INSEE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([013-9]\d|2[AB1-9])\d{3}$").expect("valid regex"));

static HORAIRES: Lazy<Regex> = Lazy::new(|| {
    let day = "(?:Mo|Tu|We|Th|Fr|Sa|Su|PH)";
    let days = format!("{day}(?:-{day})?(?:,{day}(?:-{day})?)*");
    let time = r"(?:(?:[01]\d|2[0-3]):[0-5]\d|24:00)";
    let range = format!("{time}-{time}");
    let times = format!("(?:{range}(?:,{range})*|off)");
    let rule = format!(r"{days}\s+{times}");
    Regex::new(&format!(r"^(?:24/7|{rule}(?:\s*;\s*{rule})*)$")).expect("valid regex")
});

/// Longueur maximale du numéro de point de livraison
pub const NUM_PDL_MAX_LEN: usize = 64;

/// Longueur d'un code d'unité opérationnelle (préfixe des identifiants)
pub const OPERATIONAL_UNIT_CODE_LEN: usize = 5;

pub fn is_siren(value: &str) -> bool {
    SIREN.is_match(value)
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

pub fn is_french_phone(value: &str) -> bool {
    PHONE_FR.is_match(value)
}

pub fn is_station_id(value: &str) -> bool {
    ID_STATION.is_match(value)
}

pub fn is_pdc_id(value: &str) -> bool {
    ID_PDC.is_match(value)
}

pub fn is_code_insee(value: &str) -> bool {
    CODE_INSEE.is_match(value)
}

pub fn is_horaires(value: &str) -> bool {
    HORAIRES.is_match(value)
}
