use clap::{Parser, Subcommand};
use df_core::{Quality, QualityTier};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashforge")]
#[command(author, version, about = "MPEG-DASH encoding around ffmpeg and MP4Box")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode a file into an MPEG-DASH presentation
    Encode(EncodeArgs),

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(clap::Args)]
pub struct EncodeArgs {
    /// Input file to encode
    #[arg(required = true)]
    pub input: PathBuf,

    /// Directory for the manifest and segments (defaults to the input's directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Base name for the manifest and pieces (defaults to the input's file stem)
    #[arg(short = 'n', long)]
    pub basename: Option<String>,

    /// Directory for intermediate pieces (defaults to the output directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Rendition as WIDTHxHEIGHT@KBPS[:preset]; repeat for a ladder, highest first
    #[arg(short, long = "quality")]
    pub qualities: Vec<Quality>,

    /// Built-in ladder used when no --quality is given
    #[arg(long)]
    pub tier: Option<QualityTier>,

    /// Output frame rate (defaults to the source's)
    #[arg(long)]
    pub framerate: Option<f64>,

    /// GOP size in frames (defaults to three seconds of video)
    #[arg(long)]
    pub keyframe_interval: Option<u32>,

    /// Copy the source video into the top rendition when compatible
    #[arg(long)]
    pub copy: bool,

    /// Keep renditions above the source bitrate
    #[arg(long)]
    pub no_crush: bool,

    /// Fraction of the source bitrate a rendition must stay below
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}
