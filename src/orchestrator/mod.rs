//! The strategy-fallback state machine.
//!
//! Strategies run in the caller's order, each wrapped in the retry policy.
//! `NotApplicable` falls through to the next strategy, a fatal direct
//! failure aborts (unless policy says otherwise), and the download strategy
//! walks the granularity ladder before giving up. Every attempt lands in an
//! append-only log that survives into both the success and the failure case.

use std::fmt;

use crate::reference::VideoReference;
use crate::retry::RetryPolicy;
use crate::strategies::{
    Granularity, OutcomeSummary, RetrievalStrategy, StrategyKind, StrategyOutcome,
};

/// Everything one retrieval run needs. Built once per video, immutable
/// while the run is in flight.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub reference: VideoReference,
    pub granularity: Granularity,
    /// Strategies the caller permits, in the order they should be tried.
    pub strategies: Vec<StrategyKind>,
    /// Attempt budget per strategy for transient failures.
    pub max_retries: u32,
    /// Whether granularity downgrade and fatal-escalation are permitted.
    pub escalation_enabled: bool,
}

impl RetrievalRequest {
    pub fn new(reference: VideoReference, granularity: Granularity) -> Self {
        Self {
            reference,
            granularity,
            strategies: StrategyKind::default_order().to_vec(),
            max_retries: 5,
            escalation_enabled: true,
        }
    }
}

/// One row of the audit trail.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub strategy: StrategyKind,
    pub granularity: Granularity,
    pub outcome: OutcomeSummary,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.strategy, self.granularity, self.outcome)
    }
}

/// The artifact plus its provenance.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub artifact: String,
    pub strategy: StrategyKind,
    pub granularity: Granularity,
    pub attempts: Vec<AttemptRecord>,
}

/// Terminal failure carrying the full attempt log, not just the last error.
#[derive(Debug, thiserror::Error)]
#[error("no strategy produced an artifact ({} attempted)", attempts.len())]
pub struct RetrievalFailure {
    pub attempts: Vec<AttemptRecord>,
}

/// Process-wide policy knobs, as opposed to per-request settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationPolicy {
    /// Keep falling through to the download strategy when the direct
    /// strategy fails fatally for a reason other than input size.
    pub escalate_on_direct_fatal: bool,
}

enum Flow {
    Produced {
        artifact: String,
        granularity: Granularity,
    },
    FallThrough,
    Abort,
}

pub struct Orchestrator {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
    policy: EscalationPolicy,
}

impl Orchestrator {
    pub fn new(strategies: Vec<Box<dyn RetrievalStrategy>>) -> Self {
        Self {
            strategies,
            policy: EscalationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn strategy(&self, kind: StrategyKind) -> Option<&dyn RetrievalStrategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.kind() == kind)
            .map(|boxed| boxed.as_ref())
    }

    /// Run the fallback machine to completion: exactly one artifact or one
    /// terminal failure per invocation.
    pub async fn run(&self, request: &RetrievalRequest) -> Result<RetrievalResult, RetrievalFailure> {
        let retry = RetryPolicy::new(request.max_retries);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for &kind in &request.strategies {
            let Some(strategy) = self.strategy(kind) else {
                tracing::warn!(strategy = %kind, "strategy requested but not constructed; skipping");
                continue;
            };
            tracing::info!(strategy = %kind, "trying strategy");

            let flow = match kind {
                StrategyKind::Download => {
                    self.run_download_ladder(strategy, request, &retry, &mut attempts)
                        .await
                }
                _ => {
                    self.run_plain(strategy, request, &retry, &mut attempts)
                        .await
                }
            };

            match flow {
                Flow::Produced {
                    artifact,
                    granularity,
                } => {
                    return Ok(RetrievalResult {
                        artifact,
                        strategy: kind,
                        granularity,
                        attempts,
                    });
                }
                Flow::FallThrough => continue,
                Flow::Abort => return Err(RetrievalFailure { attempts }),
            }
        }

        Err(RetrievalFailure { attempts })
    }

    /// Captions and direct: one retry-wrapped attempt at the requested
    /// granularity, no ladder.
    async fn run_plain(
        &self,
        strategy: &dyn RetrievalStrategy,
        request: &RetrievalRequest,
        retry: &RetryPolicy,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Flow {
        let kind = strategy.kind();
        let outcome = retry
            .run(|| strategy.attempt(&request.reference, request.granularity))
            .await;
        attempts.push(AttemptRecord {
            strategy: kind,
            granularity: request.granularity,
            outcome: outcome.summary(),
        });

        match outcome {
            StrategyOutcome::Success(artifact) => Flow::Produced {
                artifact,
                granularity: request.granularity,
            },
            StrategyOutcome::NotApplicable(reason) => {
                tracing::info!(strategy = %kind, %reason, "strategy not applicable, falling back");
                Flow::FallThrough
            }
            StrategyOutcome::Transient(reason) | StrategyOutcome::Fatal(reason) => {
                if kind == StrategyKind::Direct {
                    if self.policy.escalate_on_direct_fatal && request.escalation_enabled {
                        tracing::warn!(%reason, "direct strategy failed, policy permits escalation");
                        Flow::FallThrough
                    } else {
                        tracing::error!(%reason, "direct strategy failed, aborting request");
                        Flow::Abort
                    }
                } else {
                    // Exhausted captions still fall through to heavier
                    // strategies.
                    tracing::info!(strategy = %kind, %reason, "strategy exhausted, falling back");
                    Flow::FallThrough
                }
            }
        }
    }

    /// The download strategy walks the granularity ladder: each failed rung
    /// downgrades once until the coarsest granularity fails too. A ladder
    /// that exhausts is terminal for the whole request.
    async fn run_download_ladder(
        &self,
        strategy: &dyn RetrievalStrategy,
        request: &RetrievalRequest,
        retry: &RetryPolicy,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Flow {
        let mut granularity = request.granularity;
        loop {
            let outcome = retry
                .run(|| strategy.attempt(&request.reference, granularity))
                .await;
            attempts.push(AttemptRecord {
                strategy: strategy.kind(),
                granularity,
                outcome: outcome.summary(),
            });

            match outcome {
                StrategyOutcome::Success(artifact) => {
                    return Flow::Produced {
                        artifact,
                        granularity,
                    };
                }
                StrategyOutcome::NotApplicable(reason) => {
                    tracing::info!(%reason, "download strategy not applicable, falling back");
                    return Flow::FallThrough;
                }
                StrategyOutcome::Transient(reason) | StrategyOutcome::Fatal(reason) => {
                    if request.escalation_enabled {
                        if let Some(coarser) = granularity.downgraded() {
                            tracing::info!(
                                %reason,
                                from = %granularity,
                                to = %coarser,
                                "downgrading granularity and retrying download strategy"
                            );
                            granularity = coarser;
                            continue;
                        }
                    }
                    tracing::error!(%reason, "download strategy exhausted");
                    return Flow::Abort;
                }
            }
        }
    }
}
