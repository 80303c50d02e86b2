//! Pipeline orchestration: resolve the build source, validate against the
//! constraint schema, partition by scope, and write the archive.

use std::path::PathBuf;

use tracing::debug;

use crate::archive::{write_profile_archive, ArchiveRequest};
use crate::catalog::Catalog;
use crate::error::BuildError;
use crate::partition::partition;
use crate::schema::ConstraintSchema;
use crate::source::SourceSpec;
use crate::validate::validate;

/// A fully-parsed build order, as supplied by the CLI.
#[derive(Debug, Default)]
pub struct BuildRequest {
    pub source: SourceSpec,
    /// Profile name shown in Cura; derived from the source when absent.
    pub profile_name: Option<String>,
    /// Machine definition id; the extraction's embedded id or `fdmprinter`
    /// when absent.
    pub definition: Option<String>,
    /// Quality tier for the archive metadata; the preset's quality or
    /// `normal` when absent.
    pub quality_type: Option<String>,
    pub output: Option<PathBuf>,
}

/// What a successful build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub output_path: PathBuf,
    pub profile_name: String,
    pub definition: String,
    pub quality_type: String,
    pub global_settings: usize,
    /// Setting count per extruder container (empty containers are not
    /// written to the archive).
    pub extruder_settings: Vec<usize>,
}

/// Builds `.curaprofile` archives against one loaded constraint schema.
///
/// The schema is injected rather than detected here, so the pipeline is
/// testable without a Cura installation; pass `ConstraintSchema::empty()`
/// to build with validation disabled.
pub struct ProfileBuilder {
    schema: ConstraintSchema,
    catalog: Catalog,
}

impl ProfileBuilder {
    pub fn new(schema: ConstraintSchema) -> Self {
        Self {
            schema,
            catalog: Catalog::embedded(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn schema(&self) -> &ConstraintSchema {
        &self.schema
    }

    /// Run the full pipeline for one request.
    ///
    /// Fails without touching the output path unless every resolved value
    /// passes validation.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        let resolved = request.source.resolve(&self.catalog)?;

        let definition = request
            .definition
            .clone()
            .or_else(|| resolved.definition.clone())
            .unwrap_or_else(|| "fdmprinter".to_string());
        let quality_type = request
            .quality_type
            .clone()
            .or_else(|| resolved.quality_type.clone())
            .unwrap_or_else(|| "normal".to_string());
        let profile_name = request
            .profile_name
            .clone()
            .or_else(|| resolved.default_name.clone())
            .unwrap_or_else(|| definition.clone());

        debug!(
            "Building {:?} (definition {}, quality {}): {} setting(s), {} extruder section(s)",
            profile_name,
            definition,
            quality_type,
            resolved.settings.len(),
            resolved.extruder_overrides.len()
        );

        let validated = validate(&resolved, &self.schema).map_err(BuildError::Validation)?;
        let partitioned = partition(&validated, &self.schema);

        let output_path = write_profile_archive(&ArchiveRequest {
            profile_name: &profile_name,
            definition: &definition,
            quality_type: &quality_type,
            setting_version: self.schema.setting_version,
            profile: &partitioned,
            output: request.output.as_deref(),
        })?;

        Ok(BuildReport {
            output_path,
            profile_name,
            definition,
            quality_type,
            global_settings: partitioned.global.len(),
            extruder_settings: partitioned.extruders.iter().map(Vec::len).collect(),
        })
    }
}
