use std::path::PathBuf;

use tracing::{debug, warn};

/// Resolved locations of a Cura installation and its user data.
///
/// Either root may be absent; the schema loader degrades accordingly.
/// Detection is plain environment probing, kept separate from the build
/// pipeline so tests can supply schemas directly.
pub struct CuraPaths {
    /// Installation root (contains `share/cura/resources/`).
    pub install_root: Option<PathBuf>,
    /// Versioned user data directory (contains `cura.cfg`, `quality_changes/`).
    pub appdata_root: Option<PathBuf>,
}

impl CuraPaths {
    /// Probe platform-conventional locations for Cura.
    pub fn detect() -> Self {
        Self::with_overrides(None, None)
    }

    /// Use explicit paths where given, falling back to detection.
    pub fn with_overrides(install: Option<PathBuf>, appdata: Option<PathBuf>) -> Self {
        let install_root = match install {
            Some(path) if path.exists() => Some(path),
            Some(path) => {
                warn!("Supplied install path not found: {:?}", path);
                None
            }
            None => find_install_root(),
        };
        let appdata_root = match appdata {
            Some(path) if path.exists() => Some(path),
            Some(path) => {
                warn!("Supplied appdata path not found: {:?}", path);
                None
            }
            None => find_appdata_root(),
        };

        Self {
            install_root,
            appdata_root,
        }
    }

    /// Machine definition directory under the installation root.
    pub fn definitions_dir(&self) -> Option<PathBuf> {
        self.install_root.as_ref().map(|root| {
            root.join("share")
                .join("cura")
                .join("resources")
                .join("definitions")
        })
    }
}

fn find_install_root() -> Option<PathBuf> {
    let found = newest_install_under(&install_search_roots());
    match &found {
        Some(path) => debug!("Found Cura installation at {:?}", path),
        None => debug!("No Cura installation found in conventional locations"),
    }
    found
}

fn find_appdata_root() -> Option<PathBuf> {
    let found = newest_appdata_under(&appdata_search_roots());
    match &found {
        Some(path) => debug!("Found Cura appdata at {:?}", path),
        None => debug!("No Cura appdata found in conventional locations"),
    }
    found
}

/// Scan base directories for Cura install candidates, newest version first.
///
/// A candidate is a directory whose name contains "cura" (case-insensitive)
/// and which carries the `share/cura/resources` subtree.
fn newest_install_under(bases: &[PathBuf]) -> Option<PathBuf> {
    let mut candidates: Vec<(Vec<u32>, PathBuf)> = Vec::new();

    for base in bases {
        let Ok(entries) = std::fs::read_dir(base) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !name.contains("cura") {
                continue;
            }
            if !path.join("share").join("cura").join("resources").exists() {
                continue;
            }
            let version = parse_version(&name).unwrap_or_default();
            candidates.push((version, path));
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.into_iter().next().map(|(_, path)| path)
}

/// Scan base directories for versioned appdata dirs, newest first.
///
/// A candidate directory name starts with `<major>.<minor>` and contains
/// either `cura.cfg` or `machine_instances/`.
fn newest_appdata_under(bases: &[PathBuf]) -> Option<PathBuf> {
    let mut candidates: Vec<(Vec<u32>, PathBuf)> = Vec::new();

    for base in bases {
        let Ok(entries) = std::fs::read_dir(base) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let Some(version) = parse_version(&name) else {
                continue;
            };
            if !path.join("cura.cfg").exists() && !path.join("machine_instances").is_dir() {
                continue;
            }
            candidates.push((version, path));
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.into_iter().next().map(|(_, path)| path)
}

/// Extract the first dotted version number from a name, e.g.
/// "ultimaker cura 5.11.0" -> [5, 11, 0]. Requires at least major.minor.
fn parse_version(name: &str) -> Option<Vec<u32>> {
    let mut run = String::new();
    let mut runs: Vec<String> = Vec::new();
    for c in name.chars() {
        if c.is_ascii_digit() || c == '.' {
            run.push(c);
        } else if !run.is_empty() {
            runs.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }

    for candidate in runs {
        let parts: Vec<u32> = candidate
            .split('.')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .take(3)
            .collect();
        if parts.len() >= 2 {
            return Some(parts);
        }
    }
    None
}

#[cfg(target_os = "windows")]
fn install_search_roots() -> Vec<PathBuf> {
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .collect()
}

#[cfg(target_os = "linux")]
fn install_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".local").join("share"));
    }
    roots.push(PathBuf::from("/usr/share"));
    roots.push(PathBuf::from("/opt"));
    roots
}

#[cfg(target_os = "macos")]
fn install_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("Applications"));
    }
    roots.push(PathBuf::from("/Applications"));
    roots
}

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
fn install_search_roots() -> Vec<PathBuf> {
    Vec::new()
}

#[cfg(target_os = "windows")]
fn appdata_search_roots() -> Vec<PathBuf> {
    std::env::var_os("APPDATA")
        .map(|appdata| vec![PathBuf::from(appdata).join("cura")])
        .unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn appdata_search_roots() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    vec![
        home.join(".config").join("cura"),
        home.join(".local").join("share").join("cura"),
    ]
}

#[cfg(target_os = "macos")]
fn appdata_search_roots() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| {
            vec![home
                .join("Library")
                .join("Application Support")
                .join("cura")]
        })
        .unwrap_or_default()
}

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
fn appdata_search_roots() -> Vec<PathBuf> {
    Vec::new()
}
