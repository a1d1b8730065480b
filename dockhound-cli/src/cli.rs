//! CLI argument definitions for dockhound.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Docker Hub image vulnerability cataloging pipeline.
///
/// Enumerates images of one type from Docker Hub, pulls them one at a
/// time, scans them with a local Clair deployment, and writes a
/// per-image analysis file plus a global vulnerability catalog.
#[derive(Parser, Debug)]
#[command(name = "dockhound")]
#[command(version, about, long_about = None)]
pub struct DockhoundCli {
    /// Image type to analyze (certified, verified, official, community).
    pub image_type: String,

    /// Number of community images to sample. Required for (and only
    /// valid for) the community type.
    pub x_images: Option<usize>,

    /// Path to dockhound.toml configuration file.
    ///
    /// When the file does not exist, built-in defaults plus
    /// DOCKHOUND_* environment variables are used.
    #[arg(short, long, default_value = "dockhound.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the output directory for analysis/vulnerability files.
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Build the parent-image database for the given type (official or
    /// verified) instead of running an analysis.
    ///
    /// Walks every repository of the type, collects the layer
    /// combination of each tag, and writes a timestamped JSON file into
    /// the configured parent database directory.
    #[arg(long)]
    pub build_parent_db: bool,

    /// Validate configuration and scanner environment, then exit
    /// without analyzing any image.
    #[arg(long)]
    pub check: bool,
}
