//! Static preset catalog: material x quality bundles for profile building.
//!
//! The catalog is embedded at compile time and never mutated; a bundle is
//! the merge of one quality entry and one material entry.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::BuildError;

/// Preset definitions embedded in the binary. Loaded from `config/presets.toml`.
const EMBEDDED_PRESETS: &str = include_str!("../config/presets.toml");

#[derive(Debug, Deserialize)]
struct CatalogConfig {
    materials: BTreeMap<String, PresetEntry>,
    qualities: BTreeMap<String, PresetEntry>,
}

#[derive(Debug, Deserialize)]
struct PresetEntry {
    description: String,
    settings: Map<String, Value>,
}

/// A merged material x quality setting bundle.
#[derive(Debug, Clone)]
pub struct PresetBundle {
    pub material: String,
    pub quality: String,
    pub description: String,
    pub settings: Map<String, Value>,
}

/// One (material, quality) pair for informational display.
#[derive(Debug, Clone)]
pub struct PresetSummary {
    pub material: String,
    pub quality: String,
    pub description: String,
}

pub struct Catalog {
    config: CatalogConfig,
}

impl Catalog {
    /// The catalog embedded in the binary.
    ///
    /// # Panics
    /// Panics if the embedded TOML is invalid (a compile-time bug).
    pub fn embedded() -> Self {
        let config: CatalogConfig =
            toml::from_str(EMBEDDED_PRESETS).expect("embedded presets.toml must be valid TOML");
        Self { config }
    }

    /// Look up a bundle by material and quality id, case-insensitively.
    ///
    /// Quality settings apply first, then material settings, so a material
    /// may override a quality default.
    pub fn bundle(&self, material: &str, quality: &str) -> Result<PresetBundle, BuildError> {
        let material_id = material.to_uppercase();
        let quality_id = quality.to_lowercase();

        let material_entry = self.config.materials.get(&material_id).ok_or_else(|| {
            BuildError::UnknownPreset(format!(
                "material {:?}; available: {}",
                material,
                join_keys(&self.config.materials)
            ))
        })?;
        let quality_entry = self.config.qualities.get(&quality_id).ok_or_else(|| {
            BuildError::UnknownPreset(format!(
                "quality {:?}; available: {}",
                quality,
                join_keys(&self.config.qualities)
            ))
        })?;

        let mut settings = quality_entry.settings.clone();
        for (key, value) in &material_entry.settings {
            settings.insert(key.clone(), value.clone());
        }

        Ok(PresetBundle {
            material: material_id,
            quality: quality_id,
            description: material_entry.description.clone(),
            settings,
        })
    }

    /// Every (material, quality) pair with a one-line description.
    pub fn list(&self) -> Vec<PresetSummary> {
        let mut summaries = Vec::new();
        for (material, material_entry) in &self.config.materials {
            for (quality, quality_entry) in &self.config.qualities {
                summaries.push(PresetSummary {
                    material: material.clone(),
                    quality: quality.clone(),
                    description: format!(
                        "{}; {}",
                        material_entry.description, quality_entry.description
                    ),
                });
            }
        }
        summaries
    }

    pub fn material_ids(&self) -> Vec<&str> {
        self.config.materials.keys().map(String::as_str).collect()
    }

    pub fn quality_ids(&self) -> Vec<&str> {
        self.config.qualities.keys().map(String::as_str).collect()
    }
}

fn join_keys(map: &BTreeMap<String, PresetEntry>) -> String {
    map.keys().cloned().collect::<Vec<_>>().join(", ")
}
