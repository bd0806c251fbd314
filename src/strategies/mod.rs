//! Retrieval strategies and the outcome taxonomy the orchestrator runs on.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::reference::VideoReference;

pub mod captions;
pub mod direct;
pub mod download;

pub use captions::CaptionStrategy;
pub use direct::DirectStrategy;
pub use download::DownloadStrategy;

/// Level of detail of the produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Full spoken content.
    Transcript,
    /// Key points and takeaways.
    Summary,
    /// Sectioned structure with timestamps.
    Outline,
}

impl Granularity {
    /// The next coarser level, or `None` at the coarsest.
    pub fn downgraded(self) -> Option<Granularity> {
        match self {
            Granularity::Transcript => Some(Granularity::Summary),
            Granularity::Summary => Some(Granularity::Outline),
            Granularity::Outline => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Transcript => "transcript",
            Granularity::Summary => "summary",
            Granularity::Outline => "outline",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a strategy declined an input without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The video has no usable caption tracks.
    NoCaptions,
    /// The input exceeds the model's token budget.
    InputTooLarge,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCaptions => f.write_str("no captions available"),
            SkipReason::InputTooLarge => f.write_str("input too large for this strategy"),
        }
    }
}

/// Classified result of a single strategy attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    /// The artifact text was produced.
    Success(String),
    /// This strategy cannot handle the input; fall back to the next one.
    NotApplicable(SkipReason),
    /// Infrastructure flakiness, eligible for retry.
    Transient(String),
    /// Unretryable failure.
    Fatal(String),
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StrategyOutcome::Success(_))
    }

    /// Log-friendly view of the outcome, without the artifact body.
    pub fn summary(&self) -> OutcomeSummary {
        match self {
            StrategyOutcome::Success(_) => OutcomeSummary::Success,
            StrategyOutcome::NotApplicable(reason) => OutcomeSummary::NotApplicable(*reason),
            StrategyOutcome::Transient(reason) => OutcomeSummary::Transient(reason.clone()),
            StrategyOutcome::Fatal(reason) => OutcomeSummary::Fatal(reason.clone()),
        }
    }
}

/// [`StrategyOutcome`] minus the artifact text, recorded in the attempt log.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeSummary {
    Success,
    NotApplicable(SkipReason),
    Transient(String),
    Fatal(String),
}

impl fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeSummary::Success => f.write_str("succeeded"),
            OutcomeSummary::NotApplicable(reason) => write!(f, "not applicable: {reason}"),
            OutcomeSummary::Transient(reason) => write!(f, "transient failure: {reason}"),
            OutcomeSummary::Fatal(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Identifies one retrieval technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Captions,
    Direct,
    Download,
}

impl StrategyKind {
    /// Canonical cheapest-first order.
    pub fn default_order() -> [StrategyKind; 3] {
        [
            StrategyKind::Captions,
            StrategyKind::Direct,
            StrategyKind::Download,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Captions => "captions",
            StrategyKind::Direct => "direct",
            StrategyKind::Download => "download",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independent technique for producing a text artifact from a video.
///
/// Implementations classify every failure themselves; callers never inspect
/// error messages to decide control flow.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Run one attempt at the given granularity.
    async fn attempt(&self, reference: &VideoReference, granularity: Granularity)
        -> StrategyOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_downgrade_ladder() {
        assert_eq!(
            Granularity::Transcript.downgraded(),
            Some(Granularity::Summary)
        );
        assert_eq!(Granularity::Summary.downgraded(), Some(Granularity::Outline));
        assert_eq!(Granularity::Outline.downgraded(), None);
    }

    #[test]
    fn outcome_summary_drops_artifact_body() {
        let outcome = StrategyOutcome::Success("a very long transcript".into());
        assert_eq!(outcome.summary(), OutcomeSummary::Success);
        assert!(outcome.is_success());
    }

    #[test]
    fn outcome_summary_keeps_failure_reasons() {
        let outcome = StrategyOutcome::Transient("503".into());
        assert_eq!(
            outcome.summary().to_string(),
            "transient failure: 503"
        );
        let outcome = StrategyOutcome::NotApplicable(SkipReason::NoCaptions);
        assert_eq!(
            outcome.summary().to_string(),
            "not applicable: no captions available"
        );
    }

    #[test]
    fn default_order_is_cheapest_first() {
        assert_eq!(
            StrategyKind::default_order(),
            [
                StrategyKind::Captions,
                StrategyKind::Direct,
                StrategyKind::Download
            ]
        );
    }
}
