//! Schema-aware validation: coerces raw source values to their declared
//! types and checks bounds and enum membership, collecting every failure in
//! one pass so a bad build source is fixable in a single round-trip.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{FailureKind, ValidationFailure};
use crate::schema::{ConstraintEntry, ConstraintSchema, SettingType};
use crate::source::ResolvedProfile;

/// A typed setting value, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SettingValue {
    /// Best-effort typing for keys without a constraint entry.
    pub fn from_json_lossy(value: &Value) -> Self {
        match value {
            Value::Bool(b) => SettingValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SettingValue::Int(i),
                None => SettingValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => SettingValue::Str(s.clone()),
            other => SettingValue::Str(other.to_string()),
        }
    }

    /// Render for a `[values]` line: booleans lowercase, floats without
    /// trailing zeros, strings unquoted with newlines/tabs escaped (start
    /// and end G-code settings are multi-line).
    pub fn render(&self) -> String {
        match self {
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Float(f) => format!("{}", f),
            SettingValue::Str(s) => s.replace('\n', "\\n").replace('\t', "\\t"),
        }
    }

    fn as_numeric(&self) -> Option<f64> {
        match self {
            SettingValue::Int(i) => Some(*i as f64),
            SettingValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// A resolved profile whose every constrained value satisfies its entry.
#[derive(Debug)]
pub struct ValidatedProfile {
    pub settings: Vec<(String, SettingValue)>,
    pub extruder_overrides: BTreeMap<usize, Vec<(String, SettingValue)>>,
}

impl ValidatedProfile {
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Validate every setting in the profile, including per-extruder overrides.
///
/// Unknown keys pass through unchanged: the host application may define
/// settings this tool's schema snapshot does not know about.
pub fn validate(
    profile: &ResolvedProfile,
    schema: &ConstraintSchema,
) -> Result<ValidatedProfile, Vec<ValidationFailure>> {
    let mut failures = Vec::new();

    let settings = validate_map(&profile.settings, schema, None, &mut failures);
    let mut extruder_overrides = BTreeMap::new();
    for (index, overrides) in &profile.extruder_overrides {
        let validated = validate_map(overrides, schema, Some(*index), &mut failures);
        extruder_overrides.insert(*index, validated);
    }

    if failures.is_empty() {
        Ok(ValidatedProfile {
            settings,
            extruder_overrides,
        })
    } else {
        Err(failures)
    }
}

fn validate_map(
    raw: &Map<String, Value>,
    schema: &ConstraintSchema,
    extruder: Option<usize>,
    failures: &mut Vec<ValidationFailure>,
) -> Vec<(String, SettingValue)> {
    let mut validated = Vec::with_capacity(raw.len());

    for (key, value) in raw {
        let Some(entry) = schema.get(key) else {
            debug!("No constraint entry for {:?}; passing value through", key);
            validated.push((key.clone(), SettingValue::from_json_lossy(value)));
            continue;
        };

        let display_key = match extruder {
            Some(index) => format!("{key} (extruder {index})"),
            None => key.clone(),
        };

        match coerce(value, entry) {
            Ok(typed) => {
                if let Some(failure) = check_bounds(&display_key, &typed, entry) {
                    failures.push(failure);
                } else {
                    warn_soft_bounds(&display_key, &typed, entry);
                    validated.push((key.clone(), typed));
                }
            }
            Err((kind, detail)) => failures.push(ValidationFailure {
                key: display_key,
                kind,
                detail,
            }),
        }
    }

    validated
}

fn coerce(value: &Value, entry: &ConstraintEntry) -> Result<SettingValue, (FailureKind, String)> {
    match entry.setting_type {
        SettingType::Int => coerce_int(value),
        SettingType::Float => coerce_float(value),
        SettingType::Bool => coerce_bool(value),
        SettingType::Enum => coerce_enum(value, entry),
        SettingType::Str => Ok(SettingValue::Str(stringify(value))),
    }
}

fn coerce_int(value: &Value) -> Result<SettingValue, (FailureKind, String)> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(SettingValue::Int(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(SettingValue::Int(f as i64)),
                _ => Err(mismatch(value, "int")),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(SettingValue::Int)
            .map_err(|_| mismatch(value, "int")),
        _ => Err(mismatch(value, "int")),
    }
}

fn coerce_float(value: &Value) -> Result<SettingValue, (FailureKind, String)> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(SettingValue::Float)
            .ok_or_else(|| mismatch(value, "float")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(SettingValue::Float)
            .map_err(|_| mismatch(value, "float")),
        _ => Err(mismatch(value, "float")),
    }
}

fn coerce_bool(value: &Value) -> Result<SettingValue, (FailureKind, String)> {
    match value {
        Value::Bool(b) => Ok(SettingValue::Bool(*b)),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(SettingValue::Bool(false)),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(SettingValue::Bool(true)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(SettingValue::Bool(true)),
            "false" | "0" | "no" => Ok(SettingValue::Bool(false)),
            _ => Err(mismatch(value, "bool")),
        },
        _ => Err(mismatch(value, "bool")),
    }
}

fn coerce_enum(
    value: &Value,
    entry: &ConstraintEntry,
) -> Result<SettingValue, (FailureKind, String)> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Err(mismatch(value, "enum")),
    };

    match &entry.options {
        Some(options) if !options.contains(&text) => Err((
            FailureKind::InvalidEnumValue,
            format!("invalid option {:?}; valid: {}", text, options.join(", ")),
        )),
        _ => Ok(SettingValue::Str(text)),
    }
}

fn check_bounds(
    key: &str,
    value: &SettingValue,
    entry: &ConstraintEntry,
) -> Option<ValidationFailure> {
    let numeric = value.as_numeric()?;

    if let Some(min) = entry.minimum {
        if numeric < min {
            return Some(ValidationFailure {
                key: key.to_string(),
                kind: FailureKind::OutOfRange,
                detail: format!("value {} below minimum {}", value.render(), min),
            });
        }
    }
    if let Some(max) = entry.maximum {
        if numeric > max {
            return Some(ValidationFailure {
                key: key.to_string(),
                kind: FailureKind::OutOfRange,
                detail: format!("value {} above maximum {}", value.render(), max),
            });
        }
    }
    None
}

fn warn_soft_bounds(key: &str, value: &SettingValue, entry: &ConstraintEntry) {
    let Some(numeric) = value.as_numeric() else {
        return;
    };
    if let Some(min) = entry.minimum_warning {
        if numeric < min {
            warn!("{}: value {} below recommended {}", key, value.render(), min);
        }
    }
    if let Some(max) = entry.maximum_warning {
        if numeric > max {
            warn!("{}: value {} above recommended {}", key, value.render(), max);
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn mismatch(value: &Value, wanted: &str) -> (FailureKind, String) {
    (
        FailureKind::TypeMismatch,
        format!("cannot coerce {} to {}", value, wanted),
    )
}
