use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::error::ScoringError;
use crate::models::{
    ActivityMetrics, AnalyticsReport, DashboardSummary, EntityRef, EntityType, OrderSignal,
    PerformanceRanking, TopPerformer,
};
use crate::scoring::ActivityScorer;
use crate::source::{placeholder_label, EntityDirectory, OrderDataProvider, ScoringWindow};
use crate::{analytics, dashboard, ranking};

/// An entity the batch could not score, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringFailure {
    pub entity: EntityRef,
    pub error: ScoringError,
}

/// Per-entity results of a batch run. Failures never abort the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub metrics: Vec<ActivityMetrics>,
    pub failures: Vec<ScoringFailure>,
}

impl BatchOutcome {
    pub fn degraded_count(&self) -> usize {
        self.metrics.iter().filter(|m| m.degraded).count()
    }
}

/// Entry point for callers: scoring, ranking, summaries and analytics.
///
/// Collaborators are injected; the service holds no global state.
#[derive(Clone)]
pub struct ScoringService {
    scorer: ActivityScorer,
    orders: Arc<dyn OrderDataProvider>,
    directory: Arc<dyn EntityDirectory>,
    window_days: i64,
    concurrency: usize,
}

impl ScoringService {
    pub fn new(
        config: ScoringConfig,
        orders: Arc<dyn OrderDataProvider>,
        directory: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            scorer: ActivityScorer::new(config),
            orders,
            directory,
            window_days: 30,
            concurrency: 8,
        }
    }

    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn score_entity(
        &self,
        entity: &EntityRef,
        signal: &OrderSignal,
        now: DateTime<Utc>,
    ) -> Result<ActivityMetrics, ScoringError> {
        self.scorer.score(entity, signal, now)
    }

    /// Fetches and scores every entity. Output order follows input order.
    pub async fn score_batch(&self, entities: &[EntityRef], now: DateTime<Utc>) -> BatchOutcome {
        let window = ScoringWindow::trailing(self.window_days, now);
        info!(entities = entities.len(), window_days = window.days, "scoring batch");

        let results: Vec<Result<ActivityMetrics, ScoringFailure>> = stream::iter(entities)
            .map(|entity| self.score_one(entity, window, now))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                Ok(metrics) => outcome.metrics.push(metrics),
                Err(failure) => outcome.failures.push(failure),
            }
        }

        info!(
            scored = outcome.metrics.len(),
            degraded = outcome.degraded_count(),
            rejected = outcome.failures.len(),
            "batch scored"
        );
        outcome
    }

    async fn score_one(
        &self,
        entity: &EntityRef,
        window: ScoringWindow,
        now: DateTime<Utc>,
    ) -> Result<ActivityMetrics, ScoringFailure> {
        let (signal, degraded) = match self.orders.get_order_signal(entity, window).await {
            Ok(signal) => (signal, false),
            Err(err) => {
                warn!(
                    entity = %entity,
                    error = %err,
                    "order data unavailable; scoring zeroed signal"
                );
                (OrderSignal::zeroed(), true)
            }
        };

        match self.scorer.score(entity, &signal, now) {
            Ok(mut metrics) => {
                metrics.degraded = degraded;
                debug!(entity = %entity, score = metrics.activity_score, "entity scored");
                Ok(metrics)
            }
            Err(error) => {
                warn!(entity = %entity, error = %error, "rejected order signal");
                Err(ScoringFailure {
                    entity: entity.clone(),
                    error,
                })
            }
        }
    }

    pub fn rank(&self, metrics: &[ActivityMetrics]) -> Vec<PerformanceRanking> {
        ranking::rank(metrics)
    }

    pub fn summarize(&self, metrics: &[ActivityMetrics]) -> DashboardSummary {
        dashboard::summarize(metrics)
    }

    pub fn analyze(
        &self,
        metrics: &[ActivityMetrics],
        entity_type: Option<EntityType>,
    ) -> Result<AnalyticsReport, ScoringError> {
        analytics::analyze(metrics, entity_type)
    }

    pub async fn display_name(&self, entity: &EntityRef) -> String {
        match self.directory.get_display_name(entity).await {
            Ok(name) => name,
            Err(err) => {
                debug!(
                    entity = %entity,
                    error = %err,
                    "directory lookup failed; using placeholder"
                );
                placeholder_label(entity)
            }
        }
    }

    pub async fn top_performers(
        &self,
        metrics: &[ActivityMetrics],
        limit: usize,
        entity_type: Option<EntityType>,
    ) -> Vec<TopPerformer> {
        let mut top = ranking::top_performers(metrics, limit, entity_type, |m| {
            placeholder_label(&m.entity)
        });
        for performer in &mut top {
            performer.display_name = self.display_name(&performer.entity).await;
        }
        top
    }
}
