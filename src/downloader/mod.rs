//! Local audio acquisition via the yt-dlp binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use uuid::Uuid;

use crate::Result;

/// Audio containers yt-dlp may hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "mp4" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" | "webm" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
        }
    }
}

/// MIME type for an audio file path, defaulting to `audio/mpeg`.
pub fn mime_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::from_extension)
        .map(|format| format.mime_type())
        .unwrap_or("audio/mpeg")
}

/// Metadata about a remote video, as reported by yt-dlp.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub duration_secs: Option<f64>,
    pub uploader: Option<String>,
    /// `YYYYMMDD`.
    pub upload_date: Option<String>,
}

/// Thin wrapper around the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct MediaDownloader {
    yt_dlp_path: String,
    audio_quality: String,
}

impl MediaDownloader {
    pub fn new(yt_dlp_path: impl Into<String>, audio_quality: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            audio_quality: audio_quality.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Probe title, duration and uploader without downloading anything.
    pub async fn probe(&self, url: &str) -> Result<VideoMetadata> {
        tracing::debug!("probing video metadata for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", "--no-warnings", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp probe failed: {}", error.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        Ok(parse_metadata(&info))
    }

    /// Download the audio track into `dir`, converted to mp3, and return
    /// the resulting file path.
    pub async fn download_audio(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let stem = format!("audio_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let template = dir.join(format!("{stem}.%(ext)s"));
        let template_arg = template.to_string_lossy().into_owned();

        tracing::debug!("downloading audio for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                template_arg.as_str(),
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                self.audio_quality.as_str(),
                "--no-playlist",
                "--no-warnings",
                "--quiet",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed to download audio: {}", error.trim());
        }

        resolve_downloaded(dir, &stem)
    }
}

fn parse_metadata(info: &Value) -> VideoMetadata {
    VideoMetadata {
        title: info["title"].as_str().map(|s| s.to_string()),
        duration_secs: info["duration"].as_f64(),
        uploader: info["uploader"].as_str().map(|s| s.to_string()),
        upload_date: info["upload_date"].as_str().map(|s| s.to_string()),
    }
}

/// Find the file yt-dlp produced for `stem`. Conversion normally yields an
/// mp3, but yt-dlp keeps the source container when ffmpeg is missing.
fn resolve_downloaded(dir: &Path, stem: &str) -> Result<PathBuf> {
    let expected = dir.join(format!("{stem}.mp3"));
    if expected.exists() {
        return Ok(expected);
    }
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some(stem) {
            return Ok(path);
        }
    }
    anyhow::bail!("downloaded audio not found under {}", dir.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_metadata_fields() {
        let info = json!({
            "title": "A Video",
            "duration": 213.0,
            "uploader": "someone",
            "upload_date": "20240115",
            "id": "dQw4w9WgXcQ"
        });
        let metadata = parse_metadata(&info);
        assert_eq!(metadata.title.as_deref(), Some("A Video"));
        assert_eq!(metadata.duration_secs, Some(213.0));
        assert_eq!(metadata.uploader.as_deref(), Some("someone"));
        assert_eq!(metadata.upload_date.as_deref(), Some("20240115"));
    }

    #[test]
    fn missing_metadata_fields_become_none() {
        let metadata = parse_metadata(&json!({"id": "x"}));
        assert!(metadata.title.is_none());
        assert!(metadata.duration_secs.is_none());
    }

    #[test]
    fn integer_duration_is_read_as_float() {
        let metadata = parse_metadata(&json!({"duration": 90}));
        assert_eq!(metadata.duration_secs, Some(90.0));
    }

    #[test]
    fn resolves_expected_mp3_first() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("audio_ab12cd34.mp3"), b"x").unwrap();
        let path = resolve_downloaded(dir.path(), "audio_ab12cd34").unwrap();
        assert_eq!(path, dir.path().join("audio_ab12cd34.mp3"));
    }

    #[test]
    fn falls_back_to_other_container_with_same_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("audio_ab12cd34.m4a"), b"x").unwrap();
        let path = resolve_downloaded(dir.path(), "audio_ab12cd34").unwrap();
        assert_eq!(
            path.extension().and_then(|e| e.to_str()),
            Some("m4a")
        );
    }

    #[test]
    fn errors_when_nothing_was_produced() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_downloaded(dir.path(), "audio_missing").is_err());
    }

    #[test]
    fn mime_types_cover_common_containers() {
        assert_eq!(mime_type_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(mime_type_for(Path::new("a.m4a")), "audio/mp4");
        assert_eq!(mime_type_for(Path::new("a.opus")), "audio/ogg");
        assert_eq!(mime_type_for(Path::new("a.unknown")), "audio/mpeg");
    }
}
