use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::archive::inst_cfg::parse_inst_cfg;
use crate::error::BuildError;

use super::paths::CuraPaths;
use super::types::{
    ConstraintEntry, ConstraintSchema, SettingScope, SettingType, DEFAULT_SETTING_VERSION,
};

/// Definition properties carried into the constraint lookup. Everything else
/// (labels, descriptions, enable expressions) is irrelevant to validation.
const TRACKED_PROPS: &[&str] = &[
    "type",
    "default_value",
    "minimum_value",
    "maximum_value",
    "minimum_value_warning",
    "maximum_value_warning",
    "options",
    "settable_per_extruder",
];

impl ConstraintSchema {
    /// Load the constraint schema for one machine definition.
    ///
    /// Parses `fdmprinter.def.json` (the shared base definition), then
    /// overlays the named machine definition's `overrides`. Fails with
    /// `SchemaUnavailable` when the installation root is missing or a
    /// definition file cannot be parsed.
    pub fn load(paths: &CuraPaths, definition_id: &str) -> Result<Self, BuildError> {
        let defs_dir = paths
            .definitions_dir()
            .ok_or_else(|| BuildError::SchemaUnavailable("no Cura installation found".into()))?;

        let base = read_definition(&defs_dir.join("fdmprinter.def.json"))?;
        let mut raw: HashMap<String, Map<String, Value>> = HashMap::new();

        if let Some(settings) = base.get("settings").and_then(Value::as_object) {
            for (category_key, category) in settings {
                walk_definition_node(category_key, category, &mut raw);
            }
        }
        apply_overrides(&base, &mut raw);

        if definition_id != "fdmprinter" {
            let machine_path = defs_dir.join(format!("{definition_id}.def.json"));
            if machine_path.exists() {
                let machine = read_definition(&machine_path)?;
                apply_overrides(&machine, &mut raw);
            } else {
                warn!(
                    "Machine definition {:?} not found under {:?}; using base constraints only",
                    definition_id, defs_dir
                );
            }
        }

        let entries: HashMap<String, ConstraintEntry> = raw
            .iter()
            .map(|(key, props)| (key.clone(), entry_from_raw(props)))
            .collect();

        let extruder_count = entries
            .get("machine_extruder_count")
            .and_then(|e| e.default_value.as_ref())
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .filter(|n| *n >= 1)
            .unwrap_or(1);

        let setting_version = detect_setting_version(paths.appdata_root.as_deref())
            .unwrap_or(DEFAULT_SETTING_VERSION);

        debug!(
            "Loaded {} constraint entries for {:?} ({} extruder(s), setting_version {})",
            entries.len(),
            definition_id,
            extruder_count,
            setting_version
        );

        Ok(Self {
            entries,
            setting_version,
            extruder_count,
        })
    }

    /// Load, degrading to an empty schema on failure.
    ///
    /// Schema problems are recoverable: the tool still builds archives
    /// without a local Cura installation, it just cannot check values.
    pub fn load_or_empty(paths: &CuraPaths, definition_id: &str) -> Self {
        match Self::load(paths, definition_id) {
            Ok(schema) => schema,
            Err(err) => {
                warn!("{err}; settings will pass through unchecked");
                Self::empty()
            }
        }
    }
}

/// List machine definition ids shipped with the installation, sorted.
/// The abstract base definitions are not buildable targets and are skipped.
pub fn available_definitions(paths: &CuraPaths) -> Vec<String> {
    let Some(defs_dir) = paths.definitions_dir() else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(&defs_dir) else {
        return Vec::new();
    };

    let mut ids: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let id = name.strip_suffix(".def.json")?.to_string();
            (id != "fdmprinter" && id != "fdmextruder").then_some(id)
        })
        .collect();
    ids.sort();
    ids
}

/// Recover `setting_version` from existing user configs.
///
/// Scans `quality_changes/` and `extruders/` for `.inst.cfg` files and
/// returns the first `[metadata] setting_version` found.
pub fn detect_setting_version(appdata_root: Option<&Path>) -> Option<u32> {
    let root = appdata_root?;
    for sub in ["quality_changes", "extruders"] {
        let dir = root.join(sub);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let name = path.file_name().map(|n| n.to_string_lossy());
            if !name.is_some_and(|n| n.ends_with(".inst.cfg")) {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(path) else {
                continue;
            };
            let sections = parse_inst_cfg(&text);
            let version = sections
                .get("metadata")
                .and_then(|meta| meta.get("setting_version"))
                .and_then(|v| v.parse().ok());
            if let Some(version) = version {
                debug!("Detected setting_version {} from {:?}", version, path);
                return Some(version);
            }
        }
    }
    None
}

fn read_definition(path: &Path) -> Result<Value, BuildError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        BuildError::SchemaUnavailable(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        BuildError::SchemaUnavailable(format!("cannot parse {}: {e}", path.display()))
    })
}

/// Walk the nested `settings.<category>.children...` tree, recording the
/// tracked properties of every real setting node (categories are containers,
/// not settings).
fn walk_definition_node(key: &str, node: &Value, acc: &mut HashMap<String, Map<String, Value>>) {
    let Some(obj) = node.as_object() else {
        return;
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("category") | None => {}
        Some(_) => record_props(key, obj, acc),
    }

    if let Some(children) = obj.get("children").and_then(Value::as_object) {
        for (child_key, child) in children {
            walk_definition_node(child_key, child, acc);
        }
    }
}

fn apply_overrides(definition: &Value, acc: &mut HashMap<String, Map<String, Value>>) {
    if let Some(overrides) = definition.get("overrides").and_then(Value::as_object) {
        for (key, props) in overrides {
            if let Some(obj) = props.as_object() {
                record_props(key, obj, acc);
            }
        }
    }
}

fn record_props(key: &str, obj: &Map<String, Value>, acc: &mut HashMap<String, Map<String, Value>>) {
    let entry = acc.entry(key.to_string()).or_default();
    for prop in TRACKED_PROPS {
        if let Some(value) = obj.get(*prop) {
            entry.insert((*prop).to_string(), value.clone());
        }
    }
}

fn entry_from_raw(props: &Map<String, Value>) -> ConstraintEntry {
    let setting_type = props
        .get("type")
        .and_then(Value::as_str)
        .map(SettingType::from_definition)
        .unwrap_or(SettingType::Str);

    let mut entry = ConstraintEntry::new(setting_type);
    entry.minimum = numeric_bound(props.get("minimum_value"));
    entry.maximum = numeric_bound(props.get("maximum_value"));
    entry.minimum_warning = numeric_bound(props.get("minimum_value_warning"));
    entry.maximum_warning = numeric_bound(props.get("maximum_value_warning"));
    entry.options = props
        .get("options")
        .and_then(Value::as_object)
        .map(|options| options.keys().cloned().collect());
    if props.get("settable_per_extruder").and_then(Value::as_bool) == Some(true) {
        entry.scope = SettingScope::PerExtruder;
    }
    entry.default_value = props.get("default_value").cloned();
    entry
}

/// Bounds appear as numbers or as strings; Cura also allows Python
/// expressions here, which cannot be evaluated and are treated as absent.
fn numeric_bound(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const FDMPRINTER: &str = r#"{
        "settings": {
            "resolution": {
                "type": "category",
                "children": {
                    "layer_height": {
                        "type": "float",
                        "default_value": 0.2,
                        "minimum_value": "0.001",
                        "maximum_value_warning": "0.8"
                    }
                }
            },
            "material": {
                "type": "category",
                "children": {
                    "material_print_temperature": {
                        "type": "float",
                        "default_value": 210,
                        "minimum_value": "0",
                        "maximum_value": "365",
                        "settable_per_extruder": true
                    }
                }
            },
            "infill": {
                "type": "category",
                "children": {
                    "infill_sparse_density": {
                        "type": "float",
                        "default_value": 20,
                        "minimum_value": "0",
                        "maximum_value": "100"
                    },
                    "infill_pattern": {
                        "type": "enum",
                        "default_value": "grid",
                        "options": {
                            "grid": "Grid",
                            "lines": "Lines",
                            "gyroid": "Gyroid"
                        }
                    }
                }
            },
            "machine_settings": {
                "type": "category",
                "children": {
                    "machine_extruder_count": {
                        "type": "int",
                        "default_value": 1
                    },
                    "machine_width": {
                        "type": "float",
                        "default_value": 100,
                        "minimum_value": "max(extruderValues('machine_nozzle_offset_x'))"
                    }
                }
            }
        },
        "overrides": {}
    }"#;

    const DUAL_MACHINE: &str = r#"{
        "name": "Test Dual",
        "inherits": "fdmprinter",
        "overrides": {
            "machine_extruder_count": { "default_value": 2 },
            "material_print_temperature": { "maximum_value": "300" }
        }
    }"#;

    fn write_install(dir: &Path) -> CuraPaths {
        let defs = dir.join("share").join("cura").join("resources").join("definitions");
        std::fs::create_dir_all(&defs).unwrap();
        std::fs::write(defs.join("fdmprinter.def.json"), FDMPRINTER).unwrap();
        std::fs::write(defs.join("test_dual.def.json"), DUAL_MACHINE).unwrap();
        CuraPaths {
            install_root: Some(dir.to_path_buf()),
            appdata_root: None,
        }
    }

    #[test]
    fn test_load_base_definition() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_install(dir.path());
        let schema = ConstraintSchema::load(&paths, "fdmprinter").unwrap();

        let layer = schema.get("layer_height").expect("layer_height present");
        assert_eq!(layer.setting_type, SettingType::Float);
        assert_eq!(layer.minimum, Some(0.001));
        assert_eq!(layer.maximum, None);
        assert_eq!(layer.maximum_warning, Some(0.8));
        assert_eq!(layer.scope, SettingScope::Global);

        let temp = schema.get("material_print_temperature").unwrap();
        assert_eq!(temp.scope, SettingScope::PerExtruder);
        assert_eq!(temp.maximum, Some(365.0));

        let pattern = schema.get("infill_pattern").unwrap();
        assert_eq!(pattern.setting_type, SettingType::Enum);
        let options = pattern.options.as_ref().unwrap();
        assert!(options.contains(&"gyroid".to_string()));

        assert_eq!(schema.extruder_count, 1);
        assert_eq!(schema.setting_version, DEFAULT_SETTING_VERSION);
    }

    #[test]
    fn test_machine_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_install(dir.path());
        let schema = ConstraintSchema::load(&paths, "test_dual").unwrap();

        assert_eq!(schema.extruder_count, 2);
        let temp = schema.get("material_print_temperature").unwrap();
        assert_eq!(temp.maximum, Some(300.0), "machine override should win");
        // Per-extruder marker from the base definition survives the overlay
        assert_eq!(temp.scope, SettingScope::PerExtruder);
    }

    #[test]
    fn test_expression_bounds_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_install(dir.path());
        let schema = ConstraintSchema::load(&paths, "fdmprinter").unwrap();
        assert_eq!(schema.get("machine_width").unwrap().minimum, None);
    }

    #[test]
    fn test_missing_install_is_schema_unavailable() {
        let paths = CuraPaths {
            install_root: None,
            appdata_root: None,
        };
        let err = ConstraintSchema::load(&paths, "fdmprinter").unwrap_err();
        assert!(matches!(err, BuildError::SchemaUnavailable(_)));
    }

    #[test]
    fn test_unparseable_definition_is_schema_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let defs = dir
            .path()
            .join("share")
            .join("cura")
            .join("resources")
            .join("definitions");
        std::fs::create_dir_all(&defs).unwrap();
        std::fs::write(defs.join("fdmprinter.def.json"), "{ not json").unwrap();
        let paths = CuraPaths {
            install_root: Some(dir.path().to_path_buf()),
            appdata_root: None,
        };
        let err = ConstraintSchema::load(&paths, "fdmprinter").unwrap_err();
        assert!(matches!(err, BuildError::SchemaUnavailable(_)));
    }

    #[test]
    fn test_load_or_empty_degrades() {
        let paths = CuraPaths {
            install_root: Some(PathBuf::from("/nonexistent/curaforge")),
            appdata_root: None,
        };
        let schema = ConstraintSchema::load_or_empty(&paths, "fdmprinter");
        assert!(schema.is_empty());
        assert_eq!(schema.extruder_count, 1);
    }

    #[test]
    fn test_unknown_machine_definition_falls_back_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_install(dir.path());
        let schema = ConstraintSchema::load(&paths, "no_such_printer").unwrap();
        assert_eq!(schema.extruder_count, 1);
        assert!(schema.get("layer_height").is_some());
    }

    #[test]
    fn test_available_definitions_skips_abstract_bases() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_install(dir.path());
        let defs = paths.definitions_dir().unwrap();
        std::fs::write(defs.join("fdmextruder.def.json"), "{}").unwrap();

        let ids = available_definitions(&paths);
        assert_eq!(ids, vec!["test_dual".to_string()]);
    }

    #[test]
    fn test_setting_version_detection() {
        let dir = tempfile::tempdir().unwrap();
        let quality_changes = dir.path().join("quality_changes");
        std::fs::create_dir_all(&quality_changes).unwrap();
        std::fs::write(
            quality_changes.join("old.inst.cfg"),
            "[general]\nversion = 4\nname = Old\ndefinition = fdmprinter\n\n\
             [metadata]\ntype = quality_changes\nquality_type = normal\nsetting_version = 21\n\n\
             [values]\nlayer_height = 0.2\n",
        )
        .unwrap();

        assert_eq!(detect_setting_version(Some(dir.path())), Some(21));
        assert_eq!(detect_setting_version(None), None);
    }
}
