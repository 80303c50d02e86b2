//! Splits a validated profile into the single global mapping and one mapping
//! per configured extruder. Partitioning is total and exclusive: every key
//! lands in exactly one role.

use tracing::warn;

use crate::schema::{ConstraintSchema, SettingScope};
use crate::validate::{SettingValue, ValidatedProfile};

#[derive(Debug)]
pub struct PartitionedProfile {
    pub global: Vec<(String, SettingValue)>,
    pub extruders: Vec<Vec<(String, SettingValue)>>,
}

/// Partition by declared scope.
///
/// Per-extruder keys are replicated across all configured extruders;
/// explicit per-extruder overrides from the source then replace the
/// replicated value for their extruder only. Keys without a schema entry
/// default to global.
pub fn partition(profile: &ValidatedProfile, schema: &ConstraintSchema) -> PartitionedProfile {
    let count = schema.extruder_count.max(1);
    let mut global: Vec<(String, SettingValue)> = Vec::new();
    let mut extruders: Vec<Vec<(String, SettingValue)>> = vec![Vec::new(); count];

    for (key, value) in &profile.settings {
        match schema.scope_of(key) {
            SettingScope::Global => global.push((key.clone(), value.clone())),
            SettingScope::PerExtruder => {
                for slot in extruders.iter_mut() {
                    slot.push((key.clone(), value.clone()));
                }
            }
        }
    }

    for (index, overrides) in &profile.extruder_overrides {
        if *index >= count {
            warn!(
                "Dropping override section for extruder {} (machine has {})",
                index, count
            );
            continue;
        }
        for (key, value) in overrides {
            let in_flat = profile.settings.iter().any(|(k, _)| k == key);
            if in_flat && schema.scope_of(key) == SettingScope::Global {
                // The key already lives in the global partition; honoring the
                // override would put it in two roles at once.
                warn!(
                    "Ignoring extruder {} override for global-scope setting {:?}",
                    index, key
                );
                continue;
            }
            upsert(&mut extruders[*index], key, value.clone());
        }
    }

    PartitionedProfile { global, extruders }
}

fn upsert(slot: &mut Vec<(String, SettingValue)>, key: &str, value: SettingValue) {
    match slot.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => *existing = value,
        None => slot.push((key.to_string(), value)),
    }
}
