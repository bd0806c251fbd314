//! Heaviest strategy: download the audio locally, push it through the file
//! store, and generate from the upload.
//!
//! Every attempt is self-contained. The scratch directory is dropped and the
//! uploaded file is deleted on all exit paths, including cancellation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;

use super::{Granularity, RetrievalStrategy, StrategyKind, StrategyOutcome};
use crate::downloader::{self, MediaDownloader};
use crate::gemini::{GeminiClient, GeminiError, RemoteFile};
use crate::reference::VideoReference;
use crate::utils::format_file_size;

pub struct DownloadStrategy {
    downloader: MediaDownloader,
    client: GeminiClient,
    poll_interval: Duration,
    poll_timeout: Duration,
    /// Copy the downloaded audio here on success instead of discarding it.
    keep_audio_dir: Option<PathBuf>,
}

impl DownloadStrategy {
    pub fn new(
        downloader: MediaDownloader,
        client: GeminiClient,
        poll_interval: Duration,
        poll_timeout: Duration,
        keep_audio_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            client,
            poll_interval,
            poll_timeout,
            keep_audio_dir,
        }
    }

    async fn generate_from_upload(
        &self,
        uploaded: &RemoteFile,
        granularity: Granularity,
    ) -> StrategyOutcome {
        let ready = match self
            .client
            .wait_until_active(uploaded, self.poll_interval, self.poll_timeout)
            .await
        {
            Ok(file) => file,
            Err(error) => return outcome_from_error(error),
        };
        tracing::info!(
            model = self.client.model_id(),
            %granularity,
            "generating from uploaded audio"
        );
        match self
            .client
            .generate_from_file(&ready, instruction_for(granularity))
            .await
        {
            Ok(text) => StrategyOutcome::Success(text),
            Err(error) => outcome_from_error(error),
        }
    }
}

fn instruction_for(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Transcript => {
            "Please provide a detailed transcription of this audio file. \
             Include all spoken content and maintain the structure of the \
             conversation or presentation."
        }
        Granularity::Summary => {
            "Please provide a comprehensive summary of this audio file, \
             including key points, main topics discussed, and important \
             takeaways. Try to capture as much detail as possible."
        }
        Granularity::Outline => {
            "Please provide a detailed outline of this audio content with \
             main sections, key points discussed in each section, and \
             important quotes or insights."
        }
    }
}

/// Same classification as the direct strategy, except a "too large" report
/// cannot legitimately happen for extracted audio. If the service reports
/// it anyway, surface it instead of recovering silently.
fn outcome_from_error(error: GeminiError) -> StrategyOutcome {
    match error {
        GeminiError::Overloaded(reason) => StrategyOutcome::Transient(reason),
        GeminiError::Http(e) => StrategyOutcome::Transient(format!("http error: {e}")),
        GeminiError::InputTooLarge(reason) => StrategyOutcome::Fatal(format!(
            "service reported oversized input for extracted audio: {reason}"
        )),
        GeminiError::Api(reason) => StrategyOutcome::Fatal(reason),
    }
}

/// Deletes the uploaded remote file when the attempt ends, even if the
/// future driving it is cancelled mid-flight.
struct UploadGuard {
    client: GeminiClient,
    name: Option<String>,
}

impl UploadGuard {
    fn new(client: GeminiClient, name: String) -> Self {
        Self {
            client,
            name: Some(name),
        }
    }

    async fn delete_now(&mut self) {
        if let Some(name) = self.name.take() {
            match self.client.delete_file(&name).await {
                Ok(()) => tracing::debug!("deleted uploaded file {name}"),
                Err(e) => tracing::warn!("could not delete uploaded file {name}: {e}"),
            }
        }
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let client = self.client.clone();
                handle.spawn(async move {
                    let _ = client.delete_file(&name).await;
                });
            }
        }
    }
}

#[async_trait]
impl RetrievalStrategy for DownloadStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Download
    }

    async fn attempt(
        &self,
        reference: &VideoReference,
        granularity: Granularity,
    ) -> StrategyOutcome {
        let scratch = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                return StrategyOutcome::Fatal(format!("could not create scratch directory: {e}"))
            }
        };

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        progress.set_message("Downloading audio with yt-dlp...");

        let audio_path = match self
            .downloader
            .download_audio(&reference.watch_url(), scratch.path())
            .await
        {
            Ok(path) => path,
            Err(e) => {
                progress.finish_with_message("Audio download failed");
                return StrategyOutcome::Fatal(format!("audio download failed: {e:#}"));
            }
        };
        if let Ok(metadata) = fs_err::metadata(&audio_path) {
            progress.finish_with_message(format!(
                "Downloaded audio ({})",
                format_file_size(metadata.len())
            ));
        } else {
            progress.finish_with_message("Downloaded audio");
        }

        let mime_type = downloader::mime_type_for(&audio_path);
        let uploaded = match self.client.upload_file(&audio_path, mime_type).await {
            Ok(file) => file,
            Err(error) => return outcome_from_error(error),
        };
        tracing::debug!(name = %uploaded.name, "uploaded audio to the file store");

        let mut guard = UploadGuard::new(self.client.clone(), uploaded.name.clone());
        let outcome = self.generate_from_upload(&uploaded, granularity).await;
        guard.delete_now().await;

        if outcome.is_success() {
            if let Some(dir) = &self.keep_audio_dir {
                keep_audio_copy(&audio_path, dir, reference);
            }
        }

        outcome
    }
}

fn keep_audio_copy(audio_path: &Path, dir: &Path, reference: &VideoReference) {
    let extension = audio_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("mp3");
    let destination = dir.join(format!("{}.{extension}", reference.id()));
    match fs_err::copy(audio_path, &destination) {
        Ok(_) => tracing::info!("kept audio at {}", destination.display()),
        Err(e) => tracing::warn!("could not keep audio: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::SkipReason;

    #[test]
    fn overload_during_generation_is_transient() {
        let outcome = outcome_from_error(GeminiError::Overloaded("HTTP 503: busy".into()));
        assert!(matches!(outcome, StrategyOutcome::Transient(_)));
    }

    #[test]
    fn oversized_report_for_audio_is_fatal_not_a_skip() {
        let outcome = outcome_from_error(GeminiError::InputTooLarge("tokens".into()));
        match outcome {
            StrategyOutcome::Fatal(reason) => {
                assert!(reason.contains("oversized input for extracted audio"))
            }
            other => panic!("expected fatal, got {other:?}"),
        }
        assert_ne!(
            outcome_from_error(GeminiError::InputTooLarge("tokens".into())),
            StrategyOutcome::NotApplicable(SkipReason::InputTooLarge)
        );
    }

    #[test]
    fn api_failure_is_fatal() {
        assert!(matches!(
            outcome_from_error(GeminiError::Api("processing failed".into())),
            StrategyOutcome::Fatal(_)
        ));
    }

    #[test]
    fn audio_instructions_differ_by_granularity() {
        assert!(instruction_for(Granularity::Transcript).contains("transcription"));
        assert!(instruction_for(Granularity::Summary).contains("summary"));
        assert!(instruction_for(Granularity::Outline).contains("outline"));
    }
}
