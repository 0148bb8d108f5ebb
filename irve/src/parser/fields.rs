//! Conversion des valeurs textuelles en types du schéma

use chrono::NaiveDate;

use crate::error::FieldError;
use crate::types::Coordinates;

/// Convertit un booléen (`true/false`, `1/0`, `oui/non`)
pub fn parse_bool(column: &'static str, value: &str) -> Result<bool, FieldError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "oui" | "vrai" | "t" => Ok(true),
        "false" | "0" | "non" | "faux" | "f" => Ok(false),
        other => Err(FieldError::new(
            column,
            format!("'{}' is not a boolean", other),
        )),
    }
}

/// Convertit une date ISO 8601 (`YYYY-MM-DD`) et refuse les dates futures
pub fn parse_date(
    column: &'static str,
    value: &str,
    reference: NaiveDate,
) -> Result<NaiveDate, FieldError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        FieldError::new(column, format!("'{}' is not a YYYY-MM-DD date", value))
    })?;

    if date > reference {
        return Err(FieldError::new(
            column,
            format!("{} is in the future", date),
        ));
    }

    Ok(date)
}

/// Convertit un entier
pub fn parse_int(column: &'static str, value: &str) -> Result<i32, FieldError> {
    value
        .trim()
        .parse()
        .map_err(|_| FieldError::new(column, format!("'{}' is not an integer", value)))
}

/// Convertit un décimal (virgule décimale acceptée)
pub fn parse_float(column: &'static str, value: &str) -> Result<f64, FieldError> {
    let normalized = value.trim().replace(',', ".");
    let parsed: f64 = normalized
        .parse()
        .map_err(|_| FieldError::new(column, format!("'{}' is not a number", value)))?;

    if !parsed.is_finite() {
        return Err(FieldError::new(column, "number must be finite"));
    }
    Ok(parsed)
}

/// Convertit `[longitude, latitude]` (les crochets sont optionnels)
pub fn parse_coordinates(column: &'static str, value: &str) -> Result<Coordinates, FieldError> {
    let trimmed = value.trim();
    let json = if trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        format!("[{}]", trimmed)
    };

    let [longitude, latitude]: [f64; 2] = serde_json::from_str(&json).map_err(|_| {
        FieldError::new(
            column,
            format!("'{}' is not a [longitude, latitude] pair", value),
        )
    })?;

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(FieldError::new(
            column,
            format!("longitude {} out of [-180, 180]", longitude),
        ));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(FieldError::new(
            column,
            format!("latitude {} out of [-90, 90]", latitude),
        ));
    }

    Ok(Coordinates::new(longitude, latitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("gratuit", "TRUE"), Ok(true));
        assert_eq!(parse_bool("gratuit", "0"), Ok(false));
        assert_eq!(parse_bool("gratuit", "Non"), Ok(false));
        assert!(parse_bool("gratuit", "peut-être").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("date_maj", "2024-01-15", today()),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert!(parse_date("date_maj", "15/01/2024", today()).is_err());
        assert!(parse_date("date_maj", "2024-02-30", today()).is_err());
    }

    #[test]
    fn test_parse_date_in_future() {
        let err = parse_date("date_maj", "2024-06-02", today()).unwrap_err();
        assert!(err.reason.contains("future"));
        assert!(parse_date("date_maj", "2024-06-01", today()).is_ok());
    }

    #[test]
    fn test_parse_float_decimal_comma() {
        assert_eq!(parse_float("puissance_nominale", "22,5"), Ok(22.5));
        assert_eq!(parse_float("puissance_nominale", "150"), Ok(150.0));
        assert!(parse_float("puissance_nominale", "NaN").is_err());
        assert!(parse_float("puissance_nominale", "22 kW").is_err());
    }

    #[test]
    fn test_parse_coordinates() {
        let c = parse_coordinates("coordonneesXY", "[2.3522, 48.8566]").unwrap();
        assert_eq!(c.longitude, 2.3522);
        assert_eq!(c.latitude, 48.8566);

        let c = parse_coordinates("coordonneesXY", "-1.5,47.2").unwrap();
        assert_eq!(c.longitude, -1.5);
        assert_eq!(c.latitude, 47.2);
    }

    #[test]
    fn test_parse_coordinates_out_of_range() {
        // latitude/longitude inversées
        assert!(parse_coordinates("coordonneesXY", "[48.8566, 182.3]").is_err());
        assert!(parse_coordinates("coordonneesXY", "[2.35, 95.0]").is_err());
        assert!(parse_coordinates("coordonneesXY", "[2.35]").is_err());
        assert!(parse_coordinates("coordonneesXY", "POINT(2 48)").is_err());
    }
}
