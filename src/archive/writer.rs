//! Packages rendered `.inst.cfg` containers into a `.curaprofile` ZIP.
//!
//! The archive is assembled in memory and lands on disk through a
//! same-directory temp file rename, so a failed build never leaves a
//! partial archive at the output path.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::BuildError;
use crate::partition::PartitionedProfile;

use super::inst_cfg::InstCfg;

/// Everything the writer needs to emit one archive.
pub struct ArchiveRequest<'a> {
    pub profile_name: &'a str,
    pub definition: &'a str,
    pub quality_type: &'a str,
    pub setting_version: u32,
    pub profile: &'a PartitionedProfile,
    /// Output file or directory; defaults to `<name>.curaprofile` in the
    /// working directory.
    pub output: Option<&'a Path>,
}

/// Write the archive, returning the final output path.
pub fn write_profile_archive(request: &ArchiveRequest) -> Result<PathBuf, BuildError> {
    let safe_name = safe_file_name(request.profile_name);
    let output_path = resolve_output_path(request.output, &safe_name);

    let mut entries: Vec<(String, String)> = Vec::new();
    entries.push((
        format!("{safe_name}.inst.cfg"),
        InstCfg {
            profile_name: request.profile_name,
            definition: request.definition,
            quality_type: request.quality_type,
            setting_version: request.setting_version,
            position: None,
            values: &request.profile.global,
        }
        .render(),
    ));

    for (index, values) in request.profile.extruders.iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        entries.push((
            format!("{safe_name}_extruder_{index}.inst.cfg"),
            InstCfg {
                profile_name: request.profile_name,
                definition: request.definition,
                quality_type: request.quality_type,
                setting_version: request.setting_version,
                position: Some(index),
                values,
            }
            .render(),
        ));
    }

    let archive_error = |source: std::io::Error| BuildError::ArchiveWrite {
        path: output_path.clone(),
        source,
    };

    let bytes = build_zip(&entries).map_err(archive_error)?;
    persist_atomic(&output_path, &bytes).map_err(archive_error)?;

    info!(
        "Wrote {} ({} container(s), {} bytes)",
        output_path.display(),
        entries.len(),
        bytes.len()
    );
    Ok(output_path)
}

fn build_zip(entries: &[(String, String)]) -> std::io::Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(6));

    for (name, content) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(std::io::Error::other)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish().map_err(std::io::Error::other)?;

    Ok(buffer.into_inner())
}

/// Temp file in the target directory, then rename onto the output path.
fn persist_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reduce a display name to filesystem-safe characters, the same way the
/// archive's internal entry names are derived.
pub fn safe_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "profile".to_string()
    } else {
        safe
    }
}

fn resolve_output_path(output: Option<&Path>, safe_name: &str) -> PathBuf {
    let default_name = format!("{safe_name}.curaprofile");
    match output {
        None => PathBuf::from(default_name),
        Some(path) if path.is_dir() => path.join(default_name),
        Some(path) => {
            let mut path = path.to_path_buf();
            if path.extension().and_then(|e| e.to_str()) != Some("curaprofile") {
                path.set_extension("curaprofile");
                debug!("Normalized output extension to {:?}", path);
            }
            path
        }
    }
}
