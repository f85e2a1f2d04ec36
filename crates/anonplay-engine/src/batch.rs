//! Concurrent processing of a whole input set.

use std::sync::Arc;

use anonplay_ai::{CompletionClient, TimeoutClient};
use anonplay_core::{AggregateStats, InputItem, ResultRecord};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::orchestrator::{ItemReport, ItemStatus, RoundOrchestrator};
use crate::{EngineError, RunConfig};

/// Outcome of one batch run, in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.items.iter().map(|item| &item.record)
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.items.into_iter().map(|item| item.record).collect()
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.status, ItemStatus::Incomplete { .. }))
    }

    pub fn defects(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.status, ItemStatus::Defect { .. }))
    }

    pub fn completed(&self) -> usize {
        self.items.iter().filter(|item| item.status.is_complete()).count()
    }

    /// Aggregate statistics over the first rewrite of every record.
    pub fn stats(&self) -> AggregateStats {
        AggregateStats::compute(self.records())
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Runs one [`RoundOrchestrator`] per item over a shared client.
pub struct BatchCoordinator {
    orchestrator: RoundOrchestrator,
    round: usize,
}

impl BatchCoordinator {
    /// Every call through `client` is bounded by the configured call timeout.
    pub fn new(client: Arc<dyn CompletionClient>, config: &RunConfig) -> Self {
        let client: Arc<dyn CompletionClient> =
            Arc::new(TimeoutClient::new(client, config.call_timeout));
        Self {
            orchestrator: RoundOrchestrator::new(client, config),
            round: config.round,
        }
    }

    /// Process all items concurrently and wait for every one to settle.
    ///
    /// Fails only on preconditions, before any model call. One item's
    /// failure never cancels its siblings.
    pub async fn run_all(&self, items: Vec<InputItem>) -> Result<BatchReport, EngineError> {
        check_items(&items)?;

        let started_at = Utc::now();
        info!(items = items.len(), round = self.round, "batch started");
        let items = join_all(
            items
                .into_iter()
                .map(|item| self.orchestrator.process(ResultRecord::from(item))),
        )
        .await;
        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            items,
        };

        let incomplete = report.incomplete().count();
        let defects = report.defects().count();
        if incomplete + defects > 0 {
            warn!(incomplete, defects, "batch finished with unfinished items");
        }
        info!(
            completed = report.completed(),
            incomplete,
            defects,
            elapsed_ms = report.elapsed().num_milliseconds(),
            "batch finished"
        );
        Ok(report)
    }
}

fn check_items(items: &[InputItem]) -> Result<(), EngineError> {
    match items.iter().position(|item| item.text.is_empty()) {
        Some(index) => Err(EngineError::EmptyText {
            index,
            id: items[index].id,
        }),
        None => Ok(()),
    }
}

/// Run a batch against the OpenAI Responses API.
///
/// Refuses to start without a credential or when any item's text is empty.
#[cfg(feature = "openai")]
pub async fn run_all(items: Vec<InputItem>, config: &RunConfig) -> Result<BatchReport, EngineError> {
    use anonplay_ai::{OpenAiClient, OpenAiConfig};

    let credential = config.credential().ok_or(EngineError::MissingCredential)?;
    check_items(&items)?;

    let mut provider = OpenAiConfig {
        api_key: Some(credential.to_string()),
        ..OpenAiConfig::default()
    };
    if let Some(model) = &config.model {
        provider.model = model.clone();
    }
    if let Some(base_url) = &config.base_url {
        provider.base_url = base_url.clone();
    }
    let client = OpenAiClient::new(provider)?;
    info!(model = client.model(), "using OpenAI provider");

    BatchCoordinator::new(Arc::new(client), config)
        .run_all(items)
        .await
}
