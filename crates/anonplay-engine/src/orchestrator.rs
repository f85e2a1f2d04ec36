//! Per-item evaluate → rewrite → evaluate loop.
//!
//! Version `k` is fully assessed (privacy and utility) before version `k+1`
//! is synthesized from it. Each version gets a bounded number of evaluation
//! passes; a pass only requests the assessments still missing.

use std::sync::Arc;

use anonplay_ai::{
    AiError, AttributeInferrer, CompletionClient, RetryPolicy, Rewriter, UtilityJudge,
};
use anonplay_core::{PrivacyAssessment, ResultRecord, TextVersion, UtilityAssessment};
use tracing::{debug, error, info, warn};

use crate::RunConfig;

/// How an item's processing ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    /// Every round's version exists and is assessed.
    Complete,
    /// Retries ran out; the record holds what was finished.
    Incomplete { reason: String },
    /// A data or programming defect that retrying cannot fix.
    Defect { message: String },
}

impl ItemStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Incomplete { .. } => "incomplete",
            Self::Defect { .. } => "defect",
        }
    }
}

/// A processed record and how far it got.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub record: ResultRecord,
    pub status: ItemStatus,
}

pub struct RoundOrchestrator {
    inferrer: AttributeInferrer,
    judge: UtilityJudge,
    rewriter: Rewriter,
    round: usize,
    step: RetryPolicy,
}

impl RoundOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, config: &RunConfig) -> Self {
        Self {
            inferrer: AttributeInferrer::new(client.clone())
                .with_max_output_tokens(config.max_output_tokens),
            judge: UtilityJudge::new(client.clone())
                .with_max_output_tokens(config.max_output_tokens),
            rewriter: Rewriter::new(client)
                .with_retry(config.rewrite_policy())
                .with_max_output_tokens(config.max_output_tokens),
            round: config.round,
            step: config.step_policy(),
        }
    }

    /// Drive `record` through `round` rewrite rounds.
    ///
    /// Never fails: exhausted retries and defects are reported in the status
    /// with whatever versions were finished.
    pub async fn process(&self, mut record: ResultRecord) -> ItemReport {
        let id = record.id;
        if record.texts.is_empty() {
            error!(%id, "record has no text versions");
            return ItemReport {
                record,
                status: ItemStatus::Defect {
                    message: "record has no text versions".into(),
                },
            };
        }

        debug!(%id, round = self.round, "processing item");
        let mut version = 0;
        let mut budget = self.step.budget();
        loop {
            if version > self.round {
                info!(%id, versions = record.texts.len(), "item complete");
                return ItemReport {
                    record,
                    status: ItemStatus::Complete,
                };
            }

            if version == record.texts.len() {
                let previous = &record.texts[version - 1];
                let targets = previous.privacy.clone().unwrap_or_default();
                let rewrite = self.rewriter.anonymize(&previous.text, &targets).await;
                if rewrite.is_empty() {
                    let reason = format!("rewrite of version {} failed", version - 1);
                    warn!(%id, version, "{reason}");
                    return ItemReport {
                        record,
                        status: ItemStatus::Incomplete { reason },
                    };
                }
                debug!(%id, version, "rewrite appended");
                record.texts.push(TextVersion::new(rewrite));
            }

            if version == 0 && record.texts[0].utility.is_none() {
                record.texts[0].utility = Some(UtilityAssessment::neutral());
            }

            if record.texts[version].is_evaluated() {
                version += 1;
                budget.reset();
                continue;
            }

            let Some(attempt) = budget.next_attempt() else {
                let reason = format!(
                    "version {version} not assessed after {} attempts",
                    budget.max()
                );
                warn!(%id, version, "{reason}");
                return ItemReport {
                    record,
                    status: ItemStatus::Incomplete { reason },
                };
            };
            if attempt > 1 {
                self.step.pause().await;
            }

            if let Err(e) = self.evaluate(&mut record, version, attempt).await {
                error!(%id, version, error = %e, "item aborted");
                return ItemReport {
                    record,
                    status: ItemStatus::Defect {
                        message: e.to_string(),
                    },
                };
            }
        }
    }

    /// One evaluation pass over `version`: run the missing assessments
    /// concurrently and keep whichever succeed. Only fatal errors escape.
    async fn evaluate(
        &self,
        record: &mut ResultRecord,
        version: usize,
        attempt: u32,
    ) -> Result<(), AiError> {
        let snapshot: &ResultRecord = &*record;
        let current = &snapshot.texts[version];

        let privacy = async {
            if current.privacy.is_some() {
                return None;
            }
            Some(self.assess_privacy(snapshot, version).await)
        };
        let utility = async {
            if current.utility.is_some() {
                return None;
            }
            Some(
                self.judge
                    .judge_utility(&current.text, &snapshot.original().text)
                    .await,
            )
        };
        let (privacy, utility) = futures::join!(privacy, utility);

        let id = record.id;
        let slot = &mut record.texts[version];
        match privacy {
            Some(Ok(assessment)) => slot.privacy = Some(assessment),
            Some(Err(e)) if e.is_fatal() => return Err(e),
            Some(Err(e)) => warn!(%id, version, attempt, error = %e, "privacy inference failed"),
            None => {}
        }
        match utility {
            Some(Ok(assessment)) => slot.utility = Some(assessment),
            Some(Err(e)) => warn!(%id, version, attempt, error = %e, "utility judging failed"),
            None => {}
        }
        Ok(())
    }

    /// The original is scored against the supplied truth, if any. Rewrites
    /// are scored against the original's confident top guesses.
    async fn assess_privacy(
        &self,
        record: &ResultRecord,
        version: usize,
    ) -> Result<PrivacyAssessment, AiError> {
        let input = record.privacy_input(version);
        if version == 0 {
            return match &record.ground_truth {
                Some(truth) => self.inferrer.infer_with_raw_truth(&input, truth).await,
                None => self.inferrer.infer_attributes(&input, None).await,
            };
        }
        let truth = record
            .original()
            .privacy
            .as_ref()
            .map(PrivacyAssessment::confident_truth)
            .unwrap_or_default();
        self.inferrer.infer_attributes(&input, Some(&truth)).await
    }
}
