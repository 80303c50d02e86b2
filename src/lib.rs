//! curaforge builds importable `.curaprofile` archives for the Cura slicer
//! from preset bundles, extraction documents, or manual settings.
//!
//! The pipeline is source resolution -> validation -> scope partitioning ->
//! archive writing, with the constraint schema and preset catalog as
//! read-only inputs.

pub mod archive;
pub mod builder;
pub mod catalog;
pub mod error;
pub mod partition;
pub mod schema;
pub mod source;
pub mod validate;

pub use builder::{BuildReport, BuildRequest, ProfileBuilder};
pub use catalog::{Catalog, PresetBundle, PresetSummary};
pub use error::{BuildError, FailureKind, Result, ValidationFailure};
pub use partition::{partition, PartitionedProfile};
pub use schema::{ConstraintSchema, CuraPaths};
pub use source::SourceSpec;
pub use validate::{validate, SettingValue, ValidatedProfile};
