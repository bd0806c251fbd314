use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::gemini::ModelTier;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Inference service settings
    pub gemini: GeminiConfig,

    /// Caption retrieval settings
    pub captions: CaptionsConfig,

    /// yt-dlp settings
    pub downloader: DownloaderConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key; the GEMINI_API_KEY environment variable takes precedence
    pub api_key: Option<String>,

    /// Model tier used for generation
    pub model: ModelTier,

    /// Attempt budget per strategy for transient failures
    pub max_retries: u32,

    /// Timeout for a single generation request, in seconds
    pub request_timeout_secs: u64,

    /// Sleep between upload-readiness checks, in seconds
    pub upload_poll_interval_secs: u64,

    /// Overall ceiling for upload readiness, in seconds
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Preferred caption languages in priority order; empty accepts any
    pub preferred_languages: Vec<String>,

    /// Prefix caption lines with [MM:SS] offsets
    pub include_timestamps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Path or name of the yt-dlp binary
    pub yt_dlp_path: String,

    /// yt-dlp audio quality, 0 (best) to 10 (worst)
    pub audio_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for artifacts; defaults to the working directory
    pub output_dir: Option<PathBuf>,

    /// Keep downloaded audio files next to the artifact
    pub keep_audio: bool,

    /// Still try the download strategy when the direct strategy fails
    /// fatally for a reason other than input size
    pub escalate_on_direct_fatal: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelTier::Pro,
            max_retries: 5,
            request_timeout_secs: 600,
            upload_poll_interval_secs: 2,
            upload_timeout_secs: 600,
        }
    }
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            preferred_languages: Vec::new(),
            include_timestamps: false,
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            audio_quality: "0".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            keep_audio: false,
            escalate_on_direct_fatal: false,
        }
    }
}

impl GeminiConfig {
    /// Key from the environment first, then the config file. Empty strings
    /// count as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("ytscribe").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.gemini.max_retries == 0 {
            anyhow::bail!("gemini.max_retries must be at least 1");
        }
        if self.gemini.upload_poll_interval_secs == 0 {
            anyhow::bail!("gemini.upload_poll_interval_secs must be at least 1");
        }
        if self.gemini.upload_timeout_secs < self.gemini.upload_poll_interval_secs {
            anyhow::bail!("gemini.upload_timeout_secs must cover at least one poll interval");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!(
            "  Gemini API Key: {}",
            if self.gemini.resolved_api_key().is_some() {
                "configured"
            } else {
                "not set (export GEMINI_API_KEY)"
            }
        );
        println!("  Model: {}", self.gemini.model.model_id());
        println!("  Max Retries: {}", self.gemini.max_retries);
        if self.captions.preferred_languages.is_empty() {
            println!("  Caption Languages: any");
        } else {
            println!(
                "  Caption Languages: {}",
                self.captions.preferred_languages.join(", ")
            );
        }
        println!("  yt-dlp Path: {}", self.downloader.yt_dlp_path);
        println!("  Keep Audio: {}", self.app.keep_audio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let mut config = Config::default();
        config.gemini.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn timeout_shorter_than_poll_interval_is_rejected() {
        let mut config = Config::default();
        config.gemini.upload_poll_interval_secs = 10;
        config.gemini.upload_timeout_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config = serde_yaml::from_str("gemini:\n  model: flash\n").unwrap();
        assert_eq!(config.gemini.model, ModelTier::Flash);
        assert_eq!(config.gemini.max_retries, 5);
        assert_eq!(config.downloader.yt_dlp_path, "yt-dlp");
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let mut config = Config::default();
        config.captions.preferred_languages = vec!["en".into(), "de".into()];
        config.app.keep_audio = true;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.captions.preferred_languages, vec!["en", "de"]);
        assert!(parsed.app.keep_audio);
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let mut config = GeminiConfig::default();
        config.api_key = Some("   ".into());
        // The environment variable may legitimately be set on dev machines;
        // only assert when it is absent.
        if std::env::var("GEMINI_API_KEY").is_err() {
            assert!(config.resolved_api_key().is_none());
        }
        config.api_key = Some("key123".into());
        assert!(config.resolved_api_key().is_some());
    }
}
