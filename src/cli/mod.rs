use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::gemini::ModelTier;
use crate::strategies::{Granularity, StrategyKind};

#[derive(Parser)]
#[command(
    name = "ytscribe",
    about = "Turn a YouTube video into a transcript, summary, or outline",
    version,
    long_about = "Retrieves a textual representation of a YouTube video by trying cheap strategies first: existing caption tracks, then direct Gemini processing of the video URL, then a local yt-dlp audio download pushed through the Gemini file API."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retrieve the text artifact for a video
    Fetch {
        /// Video URL or bare 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        reference: String,

        /// Level of detail of the artifact
        #[arg(short, long, value_enum, default_value = "transcript")]
        granularity: Granularity,

        /// Model tier (overrides the config file)
        #[arg(short, long, value_enum)]
        model: Option<ModelTier>,

        /// Output file path (auto-generated if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print to stdout instead of writing a file
        #[arg(long)]
        no_save: bool,

        /// Preferred caption languages in priority order (e.g. en,de)
        #[arg(short, long, value_delimiter = ',', value_name = "LANGS")]
        languages: Vec<String>,

        /// Prefix caption lines with [MM:SS] offsets
        #[arg(long)]
        timestamps: bool,

        /// Use a single strategy and disable fallback
        #[arg(long, value_enum, value_name = "STRATEGY")]
        force: Option<StrategyKind>,

        /// Attempt budget per strategy for transient failures
        #[arg(long, value_name = "COUNT")]
        max_retries: Option<u32>,

        /// Disable granularity downgrade and fatal-escalation
        #[arg(long)]
        no_escalation: bool,

        /// Keep the downloaded audio next to the artifact
        #[arg(long)]
        keep_audio: bool,

        /// Gemini API key (overrides the config file)
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// List available caption tracks for a video
    Languages {
        /// Video URL or bare 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        reference: String,
    },

    /// Show retrieval strategies and whether each is usable right now
    Strategies,

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
