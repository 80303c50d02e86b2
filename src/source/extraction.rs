use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::BuildError;

/// A parsed settings extraction document.
///
/// Per-extruder overrides are carried through to the partitioner verbatim
/// rather than re-derived from scope data.
#[derive(Debug, Default)]
pub struct ExtractionDoc {
    pub settings: Map<String, Value>,
    pub extruder_overrides: BTreeMap<usize, Map<String, Value>>,
    /// Machine definition id embedded in the document, when present.
    pub definition: Option<String>,
}

/// Parse an extraction JSON document.
///
/// Three shapes are recognized:
/// - extractor-tool documents carrying `_key_settings` and/or
///   `machine.effective_settings`;
/// - nested documents with `global` and `extruders` sections;
/// - flat `{key: value}` objects.
pub fn parse_extraction(text: &str) -> Result<ExtractionDoc, BuildError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| BuildError::MalformedExtraction(e.to_string()))?;
    let Some(obj) = value.as_object() else {
        return Err(BuildError::MalformedExtraction(
            "top level is not a JSON object".into(),
        ));
    };

    let mut doc = ExtractionDoc::default();

    if obj.contains_key("_key_settings") || obj.contains_key("machine") {
        parse_extractor_document(obj, &mut doc)?;
    } else if obj.contains_key("global") || obj.contains_key("extruders") {
        parse_nested_document(obj, &mut doc)?;
    } else {
        parse_flat_document(obj, &mut doc);
    }

    if doc.settings.is_empty() && doc.extruder_overrides.is_empty() {
        return Err(BuildError::MalformedExtraction(
            "no recognizable setting entries".into(),
        ));
    }

    debug!(
        "Parsed extraction: {} flat setting(s), {} extruder section(s)",
        doc.settings.len(),
        doc.extruder_overrides.len()
    );
    Ok(doc)
}

/// Documents produced by the profile extractor tool. `_key_settings` holds
/// curated values and wins over the machine's effective settings.
fn parse_extractor_document(
    obj: &Map<String, Value>,
    doc: &mut ExtractionDoc,
) -> Result<(), BuildError> {
    if let Some(key_settings) = obj.get("_key_settings") {
        let entries = key_settings.as_object().ok_or_else(|| {
            BuildError::MalformedExtraction("_key_settings is not an object".into())
        })?;
        for (key, info) in entries {
            let value = match info {
                Value::Object(inner) => inner.get("value"),
                other => Some(other),
            };
            if let Some(value) = value.filter(|v| !v.is_null()) {
                doc.settings.insert(key.clone(), value.clone());
            }
        }
    }

    if let Some(machine) = obj.get("machine").and_then(Value::as_object) {
        if let Some(effective) = machine.get("effective_settings").and_then(Value::as_object) {
            for (key, info) in effective {
                if doc.settings.contains_key(key) {
                    continue;
                }
                let value = info.as_object().and_then(|inner| {
                    ["effective_value", "value", "default_value"]
                        .iter()
                        .find_map(|prop| inner.get(*prop).filter(|v| !v.is_null()))
                });
                if let Some(value) = value {
                    doc.settings.insert(key.clone(), value.clone());
                }
            }
        }

        doc.definition = machine
            .get("inheritance_chain")
            .and_then(Value::as_array)
            .and_then(|chain| chain.first())
            .and_then(|root| root.get("name"))
            .and_then(Value::as_str)
            .map(String::from);
    }

    Ok(())
}

/// Nested documents separating global settings from per-extruder overrides.
fn parse_nested_document(
    obj: &Map<String, Value>,
    doc: &mut ExtractionDoc,
) -> Result<(), BuildError> {
    if let Some(global) = obj.get("global") {
        let entries = global
            .as_object()
            .ok_or_else(|| BuildError::MalformedExtraction("global is not an object".into()))?;
        copy_settings(entries, &mut doc.settings);
    }

    match obj.get("extruders") {
        None => {}
        Some(Value::Array(extruders)) => {
            for (index, section) in extruders.iter().enumerate() {
                let entries = section.as_object().ok_or_else(|| {
                    BuildError::MalformedExtraction(format!(
                        "extruder {} section is not an object",
                        index
                    ))
                })?;
                let target = doc.extruder_overrides.entry(index).or_default();
                copy_settings(entries, target);
            }
        }
        Some(Value::Object(extruders)) => {
            for (raw_index, section) in extruders {
                let index: usize = raw_index.parse().map_err(|_| {
                    BuildError::MalformedExtraction(format!(
                        "extruder index {:?} is not a number",
                        raw_index
                    ))
                })?;
                let entries = section.as_object().ok_or_else(|| {
                    BuildError::MalformedExtraction(format!(
                        "extruder {} section is not an object",
                        index
                    ))
                })?;
                let target = doc.extruder_overrides.entry(index).or_default();
                copy_settings(entries, target);
            }
        }
        Some(_) => {
            return Err(BuildError::MalformedExtraction(
                "extruders is neither an array nor an object".into(),
            ));
        }
    }

    Ok(())
}

/// Flat `{key: value}` documents. Keys starting with `_` are extractor
/// metadata, not settings.
fn parse_flat_document(obj: &Map<String, Value>, doc: &mut ExtractionDoc) {
    for (key, value) in obj {
        if key.starts_with('_') || value.is_null() {
            continue;
        }
        doc.settings.insert(key.clone(), value.clone());
    }
}

fn copy_settings(from: &Map<String, Value>, into: &mut Map<String, Value>) {
    for (key, value) in from {
        if key.starts_with('_') || value.is_null() {
            continue;
        }
        into.insert(key.clone(), value.clone());
    }
}
