//! Build-source resolution: exactly one of preset, extraction, or manual
//! settings becomes a flat resolved profile for the validator.

pub mod extraction;
pub mod manual;

pub use extraction::{parse_extraction, ExtractionDoc};
pub use manual::parse_manual_settings;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::BuildError;

/// The caller's source selection, as it arrives from the CLI.
#[derive(Debug, Default, Clone)]
pub struct SourceSpec {
    /// `MATERIAL/quality` preset id, e.g. `PLA/normal`.
    pub preset: Option<String>,
    /// Path to an extraction JSON document.
    pub extraction: Option<PathBuf>,
    /// Comma-separated `key=value` pairs. Combined with a preset these act
    /// as explicit user overrides on top of the bundle.
    pub manual: Option<String>,
}

/// One flat setting mapping with source-supplied metadata.
#[derive(Debug, Default)]
pub struct ResolvedProfile {
    pub settings: Map<String, Value>,
    /// Explicit per-extruder values from a nested extraction, applied by the
    /// partitioner for their extruder only.
    pub extruder_overrides: BTreeMap<usize, Map<String, Value>>,
    /// Quality tier implied by the source (preset bundles carry one).
    pub quality_type: Option<String>,
    /// Machine definition id embedded in the source, when present.
    pub definition: Option<String>,
    /// Name suggestion derived from the source, used when the caller
    /// supplies none.
    pub default_name: Option<String>,
}

impl SourceSpec {
    /// Produce the resolved profile for the selected source.
    ///
    /// An extraction is a complete profile on its own, so combining it with
    /// either other source is ambiguous. Manual pairs on top of a preset are
    /// the documented override path and win over the bundle.
    pub fn resolve(&self, catalog: &Catalog) -> Result<ResolvedProfile, BuildError> {
        if self.extraction.is_some() && (self.preset.is_some() || self.manual.is_some()) {
            return Err(BuildError::AmbiguousSource(
                "an extraction already carries a full profile; \
                 drop the preset/manual settings or build from them alone"
                    .into(),
            ));
        }

        match (&self.preset, &self.extraction, &self.manual) {
            (None, None, None) => Err(BuildError::NoSourceSelected),
            (Some(preset), None, manual) => self.resolve_preset(catalog, preset, manual.as_deref()),
            (None, None, Some(manual)) => {
                let settings = parse_manual_settings(manual)?;
                debug!("Resolved {} manual setting(s)", settings.len());
                Ok(ResolvedProfile {
                    settings,
                    ..Default::default()
                })
            }
            (None, Some(path), None) => resolve_extraction(path),
            // Guarded above
            (Some(_), Some(_), _) | (None, Some(_), Some(_)) => unreachable!(),
        }
    }

    fn resolve_preset(
        &self,
        catalog: &Catalog,
        preset: &str,
        manual: Option<&str>,
    ) -> Result<ResolvedProfile, BuildError> {
        let Some((material, quality)) = preset.split_once('/') else {
            return Err(BuildError::UnknownPreset(format!(
                "{:?}; expected MATERIAL/quality, e.g. PLA/normal",
                preset
            )));
        };

        let bundle = catalog.bundle(material.trim(), quality.trim())?;
        let mut settings = bundle.settings;

        if let Some(manual) = manual {
            let overrides = parse_manual_settings(manual)?;
            debug!(
                "Overlaying {} manual override(s) on preset {}/{}",
                overrides.len(),
                bundle.material,
                bundle.quality
            );
            for (key, value) in overrides {
                settings.insert(key, value);
            }
        }

        let default_name = format!("{} {}", bundle.material, title_case(&bundle.quality));
        Ok(ResolvedProfile {
            settings,
            extruder_overrides: BTreeMap::new(),
            quality_type: Some(bundle.quality),
            definition: None,
            default_name: Some(default_name),
        })
    }
}

fn resolve_extraction(path: &Path) -> Result<ResolvedProfile, BuildError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        BuildError::MalformedExtraction(format!("cannot read {}: {e}", path.display()))
    })?;
    let doc = parse_extraction(&text)?;

    Ok(ResolvedProfile {
        settings: doc.settings,
        extruder_overrides: doc.extruder_overrides,
        quality_type: None,
        definition: doc.definition,
        default_name: default_name_from_path(path),
    })
}

/// Derive a presentable profile name from an extraction filename, e.g.
/// `cura_profile_ender3_petg.json` -> "Ender3 Petg".
fn default_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let stem = stem.strip_prefix("cura_profile_").unwrap_or(&stem);
    let name = title_case(&stem.replace('_', " "));
    (!name.trim().is_empty()).then_some(name)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::embedded()
    }

    #[test]
    fn test_no_source_selected() {
        let spec = SourceSpec::default();
        assert!(matches!(
            spec.resolve(&catalog()),
            Err(BuildError::NoSourceSelected)
        ));
    }

    #[test]
    fn test_extraction_plus_preset_is_ambiguous() {
        let spec = SourceSpec {
            preset: Some("PLA/normal".into()),
            extraction: Some(PathBuf::from("extraction.json")),
            manual: None,
        };
        assert!(matches!(
            spec.resolve(&catalog()),
            Err(BuildError::AmbiguousSource(_))
        ));
    }

    #[test]
    fn test_extraction_plus_manual_is_ambiguous() {
        let spec = SourceSpec {
            preset: None,
            extraction: Some(PathBuf::from("extraction.json")),
            manual: Some("layer_height=0.2".into()),
        };
        assert!(matches!(
            spec.resolve(&catalog()),
            Err(BuildError::AmbiguousSource(_))
        ));
    }

    #[test]
    fn test_preset_resolves_bundle_verbatim() {
        let spec = SourceSpec {
            preset: Some("PLA/normal".into()),
            ..Default::default()
        };
        let resolved = spec.resolve(&catalog()).unwrap();
        assert_eq!(
            resolved.settings.get("layer_height").and_then(Value::as_f64),
            Some(0.2)
        );
        assert_eq!(resolved.quality_type.as_deref(), Some("normal"));
        assert_eq!(resolved.default_name.as_deref(), Some("PLA Normal"));
    }

    #[test]
    fn test_manual_overrides_win_over_preset() {
        let spec = SourceSpec {
            preset: Some("PLA/normal".into()),
            extraction: None,
            manual: Some("layer_height=0.16,infill_sparse_density=25".into()),
        };
        let resolved = spec.resolve(&catalog()).unwrap();
        assert_eq!(
            resolved.settings.get("layer_height").and_then(Value::as_str),
            Some("0.16"),
            "manual pair should replace the bundle value"
        );
        assert_eq!(
            resolved
                .settings
                .get("infill_sparse_density")
                .and_then(Value::as_str),
            Some("25")
        );
        // Untouched bundle values survive
        assert_eq!(
            resolved
                .settings
                .get("material_print_temperature")
                .and_then(Value::as_i64),
            Some(200)
        );
    }

    #[test]
    fn test_preset_without_slash_is_unknown() {
        let spec = SourceSpec {
            preset: Some("PLA".into()),
            ..Default::default()
        };
        assert!(matches!(
            spec.resolve(&catalog()),
            Err(BuildError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_manual_only() {
        let spec = SourceSpec {
            manual: Some("layer_height=0.2".into()),
            ..Default::default()
        };
        let resolved = spec.resolve(&catalog()).unwrap();
        assert_eq!(resolved.settings.len(), 1);
        assert_eq!(resolved.quality_type, None);
        assert_eq!(resolved.default_name, None);
    }

    #[test]
    fn test_extraction_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cura_profile_ender3_petg.json");
        std::fs::write(&path, r#"{"layer_height": 0.2}"#).unwrap();

        let spec = SourceSpec {
            extraction: Some(path),
            ..Default::default()
        };
        let resolved = spec.resolve(&catalog()).unwrap();
        assert_eq!(resolved.settings.len(), 1);
        assert_eq!(resolved.default_name.as_deref(), Some("Ender3 Petg"));
    }

    #[test]
    fn test_missing_extraction_file_is_malformed() {
        let spec = SourceSpec {
            extraction: Some(PathBuf::from("/nonexistent/extraction.json")),
            ..Default::default()
        };
        assert!(matches!(
            spec.resolve(&catalog()),
            Err(BuildError::MalformedExtraction(_))
        ));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("normal"), "Normal");
        assert_eq!(title_case("my petg profile"), "My Petg Profile");
    }
}
