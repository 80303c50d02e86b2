//! curaforge CLI - build importable Cura quality profiles.
//!
//! Thin plumbing over the library: parses flags, detects the local Cura
//! installation, and reports the build result.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::warn;

use curaforge::schema::available_definitions;
use curaforge::{BuildRequest, Catalog, ConstraintSchema, CuraPaths, ProfileBuilder, SourceSpec};

#[derive(Parser)]
#[command(name = "curaforge")]
#[command(version)]
#[command(about = "Build importable Cura quality profiles", long_about = None)]
struct Cli {
    /// Build from a preset: MATERIAL/quality (e.g. PLA/normal)
    #[arg(long)]
    preset: Option<String>,

    /// Build from an extraction JSON file
    #[arg(long, value_name = "FILE")]
    from_json: Option<PathBuf>,

    /// Manual settings: key=value,key=value (alone, or as overrides on --preset)
    #[arg(long, value_name = "PAIRS")]
    settings: Option<String>,

    /// Machine definition id (e.g. creality_ender3pro)
    #[arg(short, long)]
    definition: Option<String>,

    /// Profile name shown in Cura
    #[arg(short, long)]
    name: Option<String>,

    /// Quality type for the archive metadata: draft, normal, fine, ultra
    #[arg(short, long)]
    quality_type: Option<String>,

    /// Output file path (default: <name>.curaprofile)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cura installation path (auto-detected when omitted)
    #[arg(long)]
    install: Option<PathBuf>,

    /// Cura user data path (auto-detected when omitted)
    #[arg(long)]
    appdata: Option<PathBuf>,

    /// List available material and quality presets
    #[arg(long)]
    list_presets: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_presets {
        print_presets(&Catalog::embedded());
        return Ok(());
    }

    if cli.preset.is_none() && cli.from_json.is_none() && cli.settings.is_none() {
        bail!(
            "no build source; use --preset MATERIAL/quality, --from-json FILE, \
             or --settings key=value,... (run with --list-presets to see presets)"
        );
    }
    if cli.preset.is_some() && cli.definition.is_none() {
        bail!("--definition is required with --preset (e.g. --definition creality_ender3pro)");
    }
    if cli.settings.is_some() && cli.preset.is_none() && cli.name.is_none() {
        bail!("--name is required with --settings");
    }

    let paths = CuraPaths::with_overrides(cli.install.clone(), cli.appdata.clone());
    let definition_id = cli.definition.as_deref().unwrap_or("fdmprinter");
    let schema = ConstraintSchema::load_or_empty(&paths, definition_id);

    if let Some(definition) = cli.definition.as_deref() {
        let known = available_definitions(&paths);
        if !known.is_empty() && definition != "fdmprinter" && !known.iter().any(|id| id == definition)
        {
            warn!(
                "Definition {:?} not found in the local installation; \
                 Cura may not recognize the profile's target machine",
                definition
            );
        }
    }

    let builder = ProfileBuilder::new(schema);
    let report = builder.build(&BuildRequest {
        source: SourceSpec {
            preset: cli.preset,
            extraction: cli.from_json,
            manual: cli.settings,
        },
        profile_name: cli.name,
        definition: cli.definition,
        quality_type: cli.quality_type,
        output: cli.output,
    })?;

    println!("Created: {}", report.output_path.display());
    println!();
    println!("To import into Cura:");
    println!("  1. Open Cura");
    println!("  2. Preferences -> Profiles -> Import");
    println!("  3. Select: {}", report.output_path.display());

    Ok(())
}

fn print_presets(catalog: &Catalog) {
    println!("Available presets (MATERIAL/quality):");
    for summary in catalog.list() {
        println!(
            "  {:<4}/{:<6} - {}",
            summary.material, summary.quality, summary.description
        );
    }
}
