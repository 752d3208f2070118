use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::{LevelThresholds, ScoringConfig};
use crate::error::ScoringError;
use crate::models::{ActivityLevel, ActivityMetrics, EntityRef, OrderSignal};

/// Turns raw order facts into activity metrics. Pure: same inputs and `now`, same output.
#[derive(Debug, Clone, Default)]
pub struct ActivityScorer {
    config: ScoringConfig,
}

impl ActivityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(
        &self,
        entity: &EntityRef,
        signal: &OrderSignal,
        now: DateTime<Utc>,
    ) -> Result<ActivityMetrics, ScoringError> {
        validate_signal(entity, signal)?;

        let frequency_score = self.frequency_score(signal.orders_in_window);
        let recency_score = self.recency_score(signal.last_order_at, now);
        let value_score = self.value_score(signal.avg_order_value);
        let activity_score = self.combine(frequency_score, recency_score, value_score);

        Ok(ActivityMetrics {
            entity: entity.clone(),
            activity_score,
            activity_level: ActivityLevel::from_score(activity_score, &self.config.thresholds),
            frequency_score,
            recency_score,
            value_score,
            orders_30d: signal.orders_in_window as u64,
            revenue_30d: signal.total_revenue_in_window,
            avg_order_value: signal.avg_order_value,
            growth_rate: growth_rate(signal),
            trend_percentage: trend_percentage(signal),
            calculated_at: now,
            degraded: false,
        })
    }

    pub fn frequency_score(&self, orders_in_window: i64) -> f64 {
        let ratio = orders_in_window.max(0) as f64 / self.config.max_orders_30d;
        ratio.min(1.0) * 100.0
    }

    pub fn recency_score(&self, last_order_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let Some(last_order_at) = last_order_at else {
            return 0.0;
        };
        let days_since = (now - last_order_at).num_days().max(0);
        let max_days = self.config.max_days_recency as f64;
        ((max_days - days_since as f64) / max_days * 100.0).max(0.0)
    }

    pub fn value_score(&self, avg_order_value: Decimal) -> f64 {
        if avg_order_value <= Decimal::ZERO {
            return 0.0;
        }
        let ratio = avg_order_value
            .checked_div(self.config.baseline_order_value)
            .and_then(|ratio| ratio.to_f64())
            .unwrap_or(f64::MAX);
        ratio.min(2.0) * 50.0
    }

    /// Weighted sum truncated toward zero, never rounded.
    pub fn combine(&self, frequency: f64, recency: f64, value: f64) -> u8 {
        let w = self.config.weights;
        let raw = frequency * w.frequency + recency * w.recency + value * w.value;
        raw.floor().clamp(0.0, 100.0) as u8
    }
}

impl ActivityLevel {
    pub fn from_score(score: u8, thresholds: &LevelThresholds) -> Self {
        if score >= thresholds.active {
            ActivityLevel::Active
        } else if score >= thresholds.medium {
            ActivityLevel::Medium
        } else if score >= thresholds.low {
            ActivityLevel::Low
        } else {
            ActivityLevel::Dormant
        }
    }
}

fn validate_signal(entity: &EntityRef, signal: &OrderSignal) -> Result<(), ScoringError> {
    if signal.orders_in_window < 0 {
        return Err(ScoringError::invalid(entity, "orders_in_window is negative"));
    }
    if signal.avg_order_value < Decimal::ZERO {
        return Err(ScoringError::invalid(entity, "avg_order_value is negative"));
    }
    if signal.total_revenue_in_window < Decimal::ZERO {
        return Err(ScoringError::invalid(entity, "total_revenue_in_window is negative"));
    }
    // Growth is reported in percent, so the total must survive scaling by 100.
    if signal.total_revenue_in_window.checked_mul(Decimal::ONE_HUNDRED).is_none() {
        return Err(ScoringError::invalid(entity, "total_revenue_in_window is too large"));
    }
    if signal.previous_revenue.is_some_and(|value| value < Decimal::ZERO) {
        return Err(ScoringError::invalid(entity, "previous_revenue is negative"));
    }
    if signal.previous_orders.is_some_and(|value| value < 0) {
        return Err(ScoringError::invalid(entity, "previous_orders is negative"));
    }
    Ok(())
}

fn growth_rate(signal: &OrderSignal) -> Option<f64> {
    let previous = signal.previous_revenue.filter(|value| *value > Decimal::ZERO)?;
    signal
        .total_revenue_in_window
        .checked_sub(previous)?
        .checked_div(previous)?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_f64()
}

fn trend_percentage(signal: &OrderSignal) -> f64 {
    match signal.previous_orders {
        Some(previous) if previous > 0 => {
            (signal.orders_in_window - previous) as f64 / previous as f64 * 100.0
        }
        _ => 0.0,
    }
}

pub fn window_start(now: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    now - Duration::days(window_days.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoreWeights;
    use crate::models::EntityType;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn entity() -> EntityRef {
        EntityRef::new("co-001", EntityType::Company)
    }

    fn sample_signal(orders: i64, days_ago: Option<i64>, avg_value: i64) -> OrderSignal {
        OrderSignal {
            orders_in_window: orders,
            last_order_at: days_ago.map(|days| now() - Duration::days(days)),
            avg_order_value: Decimal::from(avg_value),
            total_revenue_in_window: Decimal::from(avg_value * orders),
            previous_revenue: None,
            previous_orders: None,
        }
    }

    #[test]
    fn fully_active_entity_scores_one_hundred() {
        let scorer = ActivityScorer::default();
        let metrics = scorer
            .score(&entity(), &sample_signal(100, Some(0), 10_000), now())
            .expect("valid signal");
        assert_eq!(metrics.frequency_score, 100.0);
        assert_eq!(metrics.recency_score, 100.0);
        assert_eq!(metrics.value_score, 100.0);
        assert_eq!(metrics.activity_score, 100);
        assert_eq!(metrics.activity_level, ActivityLevel::Active);
    }

    #[test]
    fn entity_without_orders_is_dormant() {
        let scorer = ActivityScorer::default();
        let metrics = scorer
            .score(&entity(), &sample_signal(0, None, 0), now())
            .expect("valid signal");
        assert_eq!(metrics.frequency_score, 0.0);
        assert_eq!(metrics.recency_score, 0.0);
        assert_eq!(metrics.value_score, 0.0);
        assert_eq!(metrics.activity_score, 0);
        assert_eq!(metrics.activity_level, ActivityLevel::Dormant);
    }

    #[test]
    fn halfway_entity_lands_on_medium_lower_bound() {
        let scorer = ActivityScorer::default();
        let metrics = scorer
            .score(&entity(), &sample_signal(50, Some(45), 5_000), now())
            .expect("valid signal");
        assert_eq!(metrics.frequency_score, 50.0);
        assert_eq!(metrics.recency_score, 50.0);
        assert_eq!(metrics.value_score, 50.0);
        assert_eq!(metrics.activity_score, 50);
        assert_eq!(metrics.activity_level, ActivityLevel::Medium);
    }

    #[test]
    fn frequency_is_monotonic_and_saturates() {
        let scorer = ActivityScorer::default();
        let mut previous = -1.0;
        for orders in 0..=150 {
            let score = scorer.frequency_score(orders);
            assert!(score >= previous);
            previous = score;
        }
        assert_eq!(scorer.frequency_score(100), 100.0);
        assert_eq!(scorer.frequency_score(250), 100.0);
    }

    #[test]
    fn recency_decays_linearly() {
        let scorer = ActivityScorer::default();
        let at = |days: i64| scorer.recency_score(Some(now() - Duration::days(days)), now());
        assert_eq!(at(0), 100.0);
        assert!((at(30) - 200.0 / 3.0).abs() < 1e-9);
        assert!((at(60) - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(at(90), 0.0);
        assert_eq!(at(400), 0.0);
        assert_eq!(scorer.recency_score(None, now()), 0.0);
    }

    #[test]
    fn future_order_counts_as_today() {
        let scorer = ActivityScorer::default();
        let tomorrow = now() + Duration::days(1);
        assert_eq!(scorer.recency_score(Some(tomorrow), now()), 100.0);
    }

    #[test]
    fn value_score_saturates_at_twice_baseline() {
        let scorer = ActivityScorer::default();
        assert_eq!(scorer.value_score(Decimal::ZERO), 0.0);
        assert_eq!(scorer.value_score(Decimal::from(2_500)), 25.0);
        assert_eq!(scorer.value_score(Decimal::from(10_000)), 100.0);
        assert_eq!(scorer.value_score(Decimal::from(75_000)), 100.0);
    }

    #[test]
    fn combined_score_truncates() {
        let scorer = ActivityScorer::default();
        // 99*0.40 + 0 + 0 = 39.6
        assert_eq!(scorer.combine(99.0, 0.0, 0.0), 39);
        assert_eq!(scorer.combine(100.0, 100.0, 100.0), 100);
    }

    #[test]
    fn float_artifacts_truncate_like_integer_conversion() {
        // 0.40 * 1 + 0.35 * 90 + 0.25 * 72.4 lands a hair under 50.
        let scorer = ActivityScorer::default();
        let metrics = scorer
            .score(&entity(), &sample_signal(1, Some(9), 7_240), now())
            .expect("valid signal");
        assert_eq!(metrics.activity_score, 49);
        assert_eq!(metrics.activity_level, ActivityLevel::Low);
    }

    #[test]
    fn level_boundaries_follow_thresholds() {
        let thresholds = LevelThresholds::default();
        assert_eq!(ActivityLevel::from_score(24, &thresholds), ActivityLevel::Dormant);
        assert_eq!(ActivityLevel::from_score(25, &thresholds), ActivityLevel::Low);
        assert_eq!(ActivityLevel::from_score(49, &thresholds), ActivityLevel::Low);
        assert_eq!(ActivityLevel::from_score(50, &thresholds), ActivityLevel::Medium);
        assert_eq!(ActivityLevel::from_score(69, &thresholds), ActivityLevel::Medium);
        assert_eq!(ActivityLevel::from_score(70, &thresholds), ActivityLevel::Active);
        assert_eq!(ActivityLevel::from_score(100, &thresholds), ActivityLevel::Active);
    }

    #[test]
    fn overridden_constants_change_the_outcome() {
        let scorer = ActivityScorer::new(ScoringConfig {
            max_orders_30d: 10.0,
            weights: ScoreWeights {
                frequency: 1.0,
                recency: 0.0,
                value: 0.0,
            },
            thresholds: LevelThresholds {
                active: 90,
                medium: 60,
                low: 30,
            },
            ..ScoringConfig::default()
        });
        let metrics = scorer
            .score(&entity(), &sample_signal(8, None, 0), now())
            .expect("valid signal");
        assert_eq!(metrics.activity_score, 80);
        assert_eq!(metrics.activity_level, ActivityLevel::Medium);
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let scorer = ActivityScorer::default();
        let mut signal = sample_signal(3, Some(1), 100);
        signal.orders_in_window = -1;
        assert!(matches!(
            scorer.score(&entity(), &signal, now()),
            Err(ScoringError::InvalidSignal { .. })
        ));

        let mut signal = sample_signal(3, Some(1), 100);
        signal.avg_order_value = Decimal::from(-5);
        assert!(scorer.score(&entity(), &signal, now()).is_err());

        let mut signal = sample_signal(3, Some(1), 100);
        signal.total_revenue_in_window = Decimal::from(-5);
        assert!(scorer.score(&entity(), &signal, now()).is_err());
    }

    #[test]
    fn growth_and_trend_use_previous_window() {
        let scorer = ActivityScorer::default();
        let mut signal = sample_signal(12, Some(2), 1_000);
        signal.previous_revenue = Some(Decimal::from(10_000));
        signal.previous_orders = Some(8);
        let metrics = scorer.score(&entity(), &signal, now()).expect("valid signal");
        assert_eq!(metrics.growth_rate, Some(20.0));
        assert_eq!(metrics.trend_percentage, 50.0);

        let signal = sample_signal(12, Some(2), 1_000);
        let metrics = scorer.score(&entity(), &signal, now()).expect("valid signal");
        assert_eq!(metrics.growth_rate, None);
        assert_eq!(metrics.trend_percentage, 0.0);
    }

    #[test]
    fn score_stays_in_range_for_extreme_inputs() {
        let scorer = ActivityScorer::default();
        let cases = [
            (0, Some(0), 1),
            (1_000_000, Some(0), 1_000_000_000),
            (1, Some(10_000), 0),
        ];
        for (orders, days, value) in cases {
            let metrics = scorer
                .score(&entity(), &sample_signal(orders, days, value), now())
                .expect("valid signal");
            assert!(metrics.activity_score <= 100);
        }
    }

    #[test]
    fn unrepresentable_growth_is_absent() {
        let scorer = ActivityScorer::default();
        let mut signal = sample_signal(3, Some(1), 100);
        signal.total_revenue_in_window = Decimal::from_i128_with_scale(7 * 10_i128.pow(26), 0);
        signal.previous_revenue = Some(Decimal::new(1, 4));
        let metrics = scorer.score(&entity(), &signal, now()).expect("valid signal");
        assert_eq!(metrics.growth_rate, None);
    }

    #[test]
    fn revenue_too_large_to_scale_is_rejected() {
        let scorer = ActivityScorer::default();
        let mut signal = sample_signal(3, Some(1), 100);
        signal.total_revenue_in_window = Decimal::from_i128_with_scale(7 * 10_i128.pow(28), 0);
        signal.previous_revenue = Some(Decimal::ONE);
        assert!(matches!(
            scorer.score(&entity(), &signal, now()),
            Err(ScoringError::InvalidSignal { .. })
        ));
    }

    #[test]
    fn window_start_respects_days() {
        assert_eq!(window_start(now(), 30), now() - Duration::days(30));
        assert_eq!(window_start(now(), 0), now() - Duration::days(1));
    }
}
