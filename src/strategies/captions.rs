//! Cheapest strategy: reuse captions the video already has.

use async_trait::async_trait;

use super::{Granularity, RetrievalStrategy, SkipReason, StrategyKind, StrategyOutcome};
use crate::captions::{self, CaptionsClient};
use crate::reference::VideoReference;

/// Fetches an existing caption track. Granularity is ignored: captions are
/// inherently a transcript, and a video without usable captions is a
/// fallback signal rather than a failure.
pub struct CaptionStrategy {
    client: CaptionsClient,
    preferred_languages: Vec<String>,
    include_timestamps: bool,
}

impl CaptionStrategy {
    pub fn new(
        client: CaptionsClient,
        preferred_languages: Vec<String>,
        include_timestamps: bool,
    ) -> Self {
        Self {
            client,
            preferred_languages,
            include_timestamps,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for CaptionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Captions
    }

    async fn attempt(
        &self,
        reference: &VideoReference,
        _granularity: Granularity,
    ) -> StrategyOutcome {
        let tracks = match self.client.list_tracks(reference.id()).await {
            Ok(tracks) => tracks,
            Err(e) => return StrategyOutcome::Transient(format!("caption listing failed: {e}")),
        };
        if tracks.is_empty() {
            return StrategyOutcome::NotApplicable(SkipReason::NoCaptions);
        }

        let Some(track) = captions::select_track(&tracks, &self.preferred_languages) else {
            tracing::info!(
                available = tracks.len(),
                "no caption track matches the preferred languages"
            );
            return StrategyOutcome::NotApplicable(SkipReason::NoCaptions);
        };
        tracing::info!(
            language = %track.language_code,
            auto_generated = track.is_auto_generated,
            "fetching caption track"
        );

        match self.client.fetch_track(track).await {
            Ok(lines) if lines.is_empty() => {
                StrategyOutcome::NotApplicable(SkipReason::NoCaptions)
            }
            Ok(lines) => {
                let text = if self.include_timestamps {
                    captions::format_timestamped(&lines)
                } else {
                    captions::format_plain(&lines)
                };
                StrategyOutcome::Success(text)
            }
            Err(e) => StrategyOutcome::Transient(format!("caption fetch failed: {e}")),
        }
    }
}
