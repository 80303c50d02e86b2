use std::collections::HashMap;

use serde_json::Value;

/// Setting version written when no existing config reveals one.
/// Cura 5.x installs use 20-23.
pub const DEFAULT_SETTING_VERSION: u32 = 23;

/// Declared type of a setting, from the definition file.
///
/// Cura definitions use a wider vocabulary (`polygon`, `extruder`, `[int]`,
/// ...); everything outside the validated subset is treated as a free string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Bool,
    Int,
    Float,
    Enum,
    Str,
}

impl SettingType {
    pub fn from_definition(raw: &str) -> Self {
        match raw {
            "bool" => SettingType::Bool,
            "int" => SettingType::Int,
            "float" => SettingType::Float,
            "enum" => SettingType::Enum,
            _ => SettingType::Str,
        }
    }
}

/// Whether a setting applies machine-wide or independently per extruder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingScope {
    #[default]
    Global,
    PerExtruder,
}

/// Constraints for one setting key, merged from fdmprinter and the machine
/// definition's overrides. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ConstraintEntry {
    pub setting_type: SettingType,
    /// Hard bounds, inclusive. Definitions encode bounds as numbers or as
    /// Python expressions; only numeric constants are honored here.
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// Soft bounds: values beyond these pass with a warning.
    pub minimum_warning: Option<f64>,
    pub maximum_warning: Option<f64>,
    /// Allowed values for enum settings.
    pub options: Option<Vec<String>>,
    pub scope: SettingScope,
    pub default_value: Option<Value>,
}

impl ConstraintEntry {
    pub fn new(setting_type: SettingType) -> Self {
        Self {
            setting_type,
            minimum: None,
            maximum: None,
            minimum_warning: None,
            maximum_warning: None,
            options: None,
            scope: SettingScope::Global,
            default_value: None,
        }
    }
}

/// In-memory constraint lookup for one machine definition.
///
/// An empty schema is legal: every value passes through unchecked, which is
/// how builds proceed when no Cura installation can be found.
#[derive(Debug, Clone)]
pub struct ConstraintSchema {
    pub entries: HashMap<String, ConstraintEntry>,
    pub setting_version: u32,
    pub extruder_count: usize,
}

impl ConstraintSchema {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            setting_version: DEFAULT_SETTING_VERSION,
            extruder_count: 1,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConstraintEntry> {
        self.entries.get(key)
    }

    /// Scope for a key; unknown keys default to global.
    pub fn scope_of(&self, key: &str) -> SettingScope {
        self.entries
            .get(key)
            .map(|e| e.scope)
            .unwrap_or(SettingScope::Global)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
