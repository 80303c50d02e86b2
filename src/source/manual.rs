use serde_json::{Map, Value};

use crate::error::BuildError;

/// Parse a manual settings string of comma-separated `key=value` pairs.
///
/// Values stay untyped strings here; the validator types them against the
/// constraint schema. Commas inside values are not escapable.
pub fn parse_manual_settings(input: &str) -> Result<Map<String, Value>, BuildError> {
    let mut settings = Map::new();

    for pair in input.split(',') {
        if pair.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            return Err(BuildError::MalformedManualSettings(format!(
                "pair {:?} is missing '='",
                pair.trim()
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(BuildError::MalformedManualSettings(format!(
                "pair {:?} has an empty key",
                pair.trim()
            )));
        }
        settings.insert(key.to_string(), Value::String(value.trim().to_string()));
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_pairs() {
        let settings =
            parse_manual_settings("layer_height=0.16,infill_sparse_density=25").unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(
            settings.get("layer_height").and_then(Value::as_str),
            Some("0.16")
        );
        assert_eq!(
            settings.get("infill_sparse_density").and_then(Value::as_str),
            Some("25")
        );
    }

    #[test]
    fn test_trims_whitespace() {
        let settings = parse_manual_settings(" layer_height = 0.2 , speed_print = 50 ").unwrap();
        assert_eq!(
            settings.get("layer_height").and_then(Value::as_str),
            Some("0.2")
        );
        assert_eq!(
            settings.get("speed_print").and_then(Value::as_str),
            Some("50")
        );
    }

    #[test]
    fn test_missing_equals_is_rejected() {
        let err = parse_manual_settings("layer_height=0.2,oops").unwrap_err();
        assert!(matches!(err, BuildError::MalformedManualSettings(_)));
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = parse_manual_settings("=0.2").unwrap_err();
        assert!(matches!(err, BuildError::MalformedManualSettings(_)));
    }

    #[test]
    fn test_trailing_comma_is_tolerated() {
        let settings = parse_manual_settings("layer_height=0.2,").unwrap();
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn test_empty_value_is_allowed() {
        let settings = parse_manual_settings("machine_start_gcode=").unwrap();
        assert_eq!(
            settings.get("machine_start_gcode").and_then(Value::as_str),
            Some("")
        );
    }

    #[test]
    fn test_later_pair_wins_on_duplicate_key() {
        let settings = parse_manual_settings("speed_print=50,speed_print=60").unwrap();
        assert_eq!(settings.get("speed_print").and_then(Value::as_str), Some("60"));
    }
}
