//! ytscribe - A Rust CLI tool for turning YouTube videos into text
//!
//! This library retrieves a transcript, summary, or outline for a video by
//! trying progressively heavier strategies: existing caption tracks first,
//! then direct Gemini processing of the video URL, then a local audio
//! download pushed through the Gemini file API.

pub mod captions;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod gemini;
pub mod orchestrator;
pub mod output;
pub mod reference;
pub mod retry;
pub mod strategies;
pub mod utils;

pub use config::Config;
pub use orchestrator::{
    AttemptRecord, EscalationPolicy, Orchestrator, RetrievalFailure, RetrievalRequest,
    RetrievalResult,
};
pub use reference::{resolve, VideoId, VideoReference};
pub use strategies::{Granularity, RetrievalStrategy, SkipReason, StrategyKind, StrategyOutcome};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to ytscribe
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("could not extract a video id from '{0}'")]
    InvalidReference(String),

    #[error("no Gemini API key available (set GEMINI_API_KEY or gemini.api_key in the config file)")]
    MissingApiKey,

    #[error("yt-dlp is not available: {0}")]
    DownloaderUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}
