pub mod loader;
pub mod paths;
pub mod types;

pub use loader::{available_definitions, detect_setting_version};
pub use paths::CuraPaths;
pub use types::{
    ConstraintEntry, ConstraintSchema, SettingScope, SettingType, DEFAULT_SETTING_VERSION,
};
