//! Direct strategy: hand the watch URL to the model without downloading.

use async_trait::async_trait;

use super::{Granularity, RetrievalStrategy, SkipReason, StrategyKind, StrategyOutcome};
use crate::gemini::{GeminiClient, GeminiError};
use crate::reference::VideoReference;

pub struct DirectStrategy {
    client: GeminiClient,
}

impl DirectStrategy {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

fn instruction_for(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Transcript => {
            "Please provide a detailed transcription of this YouTube video. \
             Include all spoken content, and note any significant visual \
             elements or context when relevant."
        }
        Granularity::Summary => {
            "Please provide a comprehensive summary of this YouTube video, \
             including key points, main topics discussed, and important \
             takeaways. Try to capture as much detail as possible."
        }
        Granularity::Outline => {
            "Please provide a detailed outline of this YouTube video with \
             timestamps (if visible), main sections, key points discussed \
             in each section, and important quotes or insights."
        }
    }
}

/// An oversized input is a skip signal that hands the video to the next
/// strategy; overload and transport problems are retryable; the rest is
/// fatal.
fn outcome_from_error(error: GeminiError) -> StrategyOutcome {
    match error {
        GeminiError::InputTooLarge(_) => StrategyOutcome::NotApplicable(SkipReason::InputTooLarge),
        GeminiError::Overloaded(reason) => StrategyOutcome::Transient(reason),
        GeminiError::Http(e) => StrategyOutcome::Transient(format!("http error: {e}")),
        GeminiError::Api(reason) => StrategyOutcome::Fatal(reason),
    }
}

#[async_trait]
impl RetrievalStrategy for DirectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    async fn attempt(
        &self,
        reference: &VideoReference,
        granularity: Granularity,
    ) -> StrategyOutcome {
        tracing::info!(
            model = self.client.model_id(),
            %granularity,
            "processing video URL directly"
        );
        match self
            .client
            .generate_from_video_url(&reference.watch_url(), instruction_for(granularity))
            .await
        {
            Ok(text) => StrategyOutcome::Success(text),
            Err(error) => outcome_from_error(error),
        }
    }
}
