//! Rendering and parsing of Cura `.inst.cfg` instance containers.
//!
//! Section and key names are a compatibility contract: Cura parses these
//! files positionally by section header and filename convention.

use std::collections::BTreeMap;

use crate::validate::SettingValue;

/// Container format version Cura expects in `[general]`.
const CONTAINER_VERSION: u32 = 4;

/// One `.inst.cfg` file: a quality-changes container for either the global
/// stack or a single extruder.
#[derive(Debug)]
pub struct InstCfg<'a> {
    pub profile_name: &'a str,
    pub definition: &'a str,
    pub quality_type: &'a str,
    pub setting_version: u32,
    /// Extruder position; `None` for the global container.
    pub position: Option<usize>,
    pub values: &'a [(String, SettingValue)],
}

impl InstCfg<'_> {
    /// Render the INI text: `[general]`, `[metadata]`, then `[values]`.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("[general]\n");
        out.push_str(&format!("version = {}\n", CONTAINER_VERSION));
        out.push_str(&format!("name = {}\n", self.profile_name));
        out.push_str(&format!("definition = {}\n", self.definition));
        out.push('\n');

        out.push_str("[metadata]\n");
        out.push_str("type = quality_changes\n");
        out.push_str(&format!("quality_type = {}\n", self.quality_type));
        out.push_str(&format!("setting_version = {}\n", self.setting_version));
        if let Some(position) = self.position {
            out.push_str(&format!("position = {}\n", position));
        }
        out.push('\n');

        out.push_str("[values]\n");
        for (key, value) in self.values {
            out.push_str(&format!("{} = {}\n", key, value.render()));
        }

        out
    }
}

/// Parse INI text into section -> key -> raw value string.
///
/// Tolerates `key=value` without spaces and blank/comment lines; values keep
/// their serialized form (no type recovery).
pub fn parse_inst_cfg(text: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            current = Some(name.to_string());
            sections.entry(name.to_string()).or_default();
            continue;
        }
        let Some(section) = &current else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_string(), value.trim().to_string());
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> Vec<(String, SettingValue)> {
        vec![
            ("layer_height".to_string(), SettingValue::Float(0.2)),
            ("speed_print".to_string(), SettingValue::Int(50)),
            ("support_enable".to_string(), SettingValue::Bool(false)),
            (
                "machine_start_gcode".to_string(),
                SettingValue::Str("G28\nG1 Z5".to_string()),
            ),
        ]
    }

    #[test]
    fn test_render_sections_in_order() {
        let values = sample_values();
        let cfg = InstCfg {
            profile_name: "PLA Normal",
            definition: "creality_ender3pro",
            quality_type: "normal",
            setting_version: 23,
            position: None,
            values: &values,
        };
        let text = cfg.render();

        let general = text.find("[general]").unwrap();
        let metadata = text.find("[metadata]").unwrap();
        let values_at = text.find("[values]").unwrap();
        assert!(general < metadata && metadata < values_at);

        assert!(text.contains("version = 4"));
        assert!(text.contains("name = PLA Normal"));
        assert!(text.contains("definition = creality_ender3pro"));
        assert!(text.contains("type = quality_changes"));
        assert!(text.contains("quality_type = normal"));
        assert!(text.contains("setting_version = 23"));
        assert!(text.contains("layer_height = 0.2"));
        assert!(text.contains("support_enable = false"));
        assert!(text.contains("machine_start_gcode = G28\\nG1 Z5"));
        assert!(!text.contains("position ="), "global container has no position");
    }

    #[test]
    fn test_extruder_container_carries_position() {
        let values = sample_values();
        let cfg = InstCfg {
            profile_name: "PLA Normal",
            definition: "creality_ender3pro",
            quality_type: "normal",
            setting_version: 23,
            position: Some(1),
            values: &values,
        };
        let text = cfg.render();
        assert!(text.contains("position = 1"));
    }

    #[test]
    fn test_round_trip_recovers_values() {
        let values = sample_values();
        let cfg = InstCfg {
            profile_name: "Round Trip",
            definition: "fdmprinter",
            quality_type: "fine",
            setting_version: 21,
            position: None,
            values: &values,
        };

        let sections = parse_inst_cfg(&cfg.render());

        let general = sections.get("general").unwrap();
        assert_eq!(general.get("name").map(String::as_str), Some("Round Trip"));
        assert_eq!(
            general.get("definition").map(String::as_str),
            Some("fdmprinter")
        );

        let metadata = sections.get("metadata").unwrap();
        assert_eq!(metadata.get("quality_type").map(String::as_str), Some("fine"));
        assert_eq!(metadata.get("setting_version").map(String::as_str), Some("21"));

        let parsed = sections.get("values").unwrap();
        assert_eq!(parsed.len(), values.len());
        for (key, value) in &values {
            assert_eq!(
                parsed.get(key).map(String::as_str),
                Some(value.render().as_str()),
                "value for {} should survive the round trip",
                key
            );
        }
    }

    #[test]
    fn test_parse_tolerates_dense_pairs_and_comments() {
        let text = "# exported\n[values]\nlayer_height=0.2\n; note\nspeed_print = 50\n";
        let sections = parse_inst_cfg(text);
        let values = sections.get("values").unwrap();
        assert_eq!(values.get("layer_height").map(String::as_str), Some("0.2"));
        assert_eq!(values.get("speed_print").map(String::as_str), Some("50"));
    }

    #[test]
    fn test_parse_ignores_pairs_outside_sections() {
        let sections = parse_inst_cfg("orphan = 1\n[values]\nspeed_print = 50\n");
        assert!(!sections.contains_key("orphan"));
        assert_eq!(sections.len(), 1);
    }
}
