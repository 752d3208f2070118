//! Distribution, concentration and growth analytics over a metrics batch.
//!
//! The growth forecast is a fixed-multiplier heuristic over the mean growth
//! rate. It is not a statistical projection.

use rust_decimal::Decimal;

use crate::error::ScoringError;
use crate::models::{
    ActivityMetrics, AnalyticsReport, EntityType, GrowthOutlook, LevelCounts, OrderPatterns,
    RevenueConcentration, ScoreBuckets, ScoreDistribution, TrendDirection,
};
use crate::ranking::decimal_to_f64;

const HIGH_VOLUME_FACTOR: f64 = 1.5;
const LOW_VOLUME_FACTOR: f64 = 0.5;
const FORECAST_NEXT_MONTH_FACTOR: f64 = 0.8;
const FORECAST_NEXT_QUARTER_FACTOR: f64 = 2.2;
/// Mean growth beyond +/- this many percent counts as a trend.
const TREND_BAND_PCT: f64 = 5.0;

pub fn analyze(
    metrics: &[ActivityMetrics],
    entity_type: Option<EntityType>,
) -> Result<AnalyticsReport, ScoringError> {
    let scoped: Vec<&ActivityMetrics> = metrics
        .iter()
        .filter(|m| entity_type.map_or(true, |kind| m.entity.entity_type == kind))
        .collect();

    if scoped.is_empty() {
        return Err(ScoringError::EmptyBatch {
            operation: "analytics",
        });
    }

    Ok(AnalyticsReport {
        entity_type_filter: entity_type,
        entity_count: scoped.len(),
        distribution: score_distribution(&scoped),
        concentration: revenue_concentration(&scoped),
        order_patterns: order_patterns(&scoped),
        growth: growth_outlook(&scoped),
    })
}

fn score_distribution(metrics: &[&ActivityMetrics]) -> ScoreDistribution {
    let mut by_level = LevelCounts::default();
    let mut buckets = ScoreBuckets::default();
    for entry in metrics {
        by_level.record(entry.activity_level);
        match entry.activity_score {
            0..=24 => buckets.below_25 += 1,
            25..=49 => buckets.from_25_to_50 += 1,
            50..=74 => buckets.from_50_to_75 += 1,
            _ => buckets.from_75_to_100 += 1,
        }
    }

    let mut scores: Vec<u8> = metrics.iter().map(|m| m.activity_score).collect();
    scores.sort_unstable();
    let values: Vec<f64> = scores.iter().map(|s| f64::from(*s)).collect();
    let avg_score = mean(&values);

    ScoreDistribution {
        by_level,
        buckets,
        avg_score,
        // Lower-middle element for even-sized batches.
        median_score: scores[(scores.len() - 1) / 2],
        score_std_dev: population_variance(&values, avg_score).sqrt(),
    }
}

fn revenue_concentration(metrics: &[&ActivityMetrics]) -> RevenueConcentration {
    let mut revenues: Vec<Decimal> = metrics.iter().map(|m| m.revenue_30d).collect();
    revenues.sort_by(|a, b| b.cmp(a));

    let n = revenues.len();
    let total_revenue = saturating_sum(&revenues);
    let top_20_pct_count = (n / 5).max(1);
    let top_10_pct_count = (n / 10).max(1);
    let bottom_50_pct_count = n / 2;

    let share = |slice: &[Decimal]| -> f64 {
        if total_revenue.is_zero() {
            return 0.0;
        }
        saturating_sum(slice)
            .checked_div(total_revenue)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map_or(0.0, decimal_to_f64)
    };

    RevenueConcentration {
        total_revenue,
        top_20_pct_count,
        pareto_ratio_80_20: share(&revenues[..top_20_pct_count]),
        top_10_pct_share: share(&revenues[..top_10_pct_count]),
        bottom_50_pct_share: share(&revenues[n - bottom_50_pct_count..]),
    }
}

fn order_patterns(metrics: &[&ActivityMetrics]) -> OrderPatterns {
    let orders: Vec<f64> = metrics.iter().map(|m| m.orders_30d as f64).collect();
    let avg_orders = mean(&orders);

    OrderPatterns {
        avg_orders,
        high_volume_count: orders
            .iter()
            .filter(|o| **o > avg_orders * HIGH_VOLUME_FACTOR)
            .count(),
        low_volume_count: orders
            .iter()
            .filter(|o| **o < avg_orders * LOW_VOLUME_FACTOR)
            .count(),
        order_variance: population_variance(&orders, avg_orders),
    }
}

fn growth_outlook(metrics: &[&ActivityMetrics]) -> GrowthOutlook {
    let rates: Vec<f64> = metrics.iter().filter_map(|m| m.growth_rate).collect();
    let avg_growth_rate = if rates.is_empty() { 0.0 } else { mean(&rates) };

    let direction = if avg_growth_rate > TREND_BAND_PCT {
        TrendDirection::Up
    } else if avg_growth_rate < -TREND_BAND_PCT {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };

    GrowthOutlook {
        avg_growth_rate,
        entities_reporting_growth: rates.len(),
        direction,
        forecast_next_month: avg_growth_rate * FORECAST_NEXT_MONTH_FACTOR,
        forecast_next_quarter: avg_growth_rate * FORECAST_NEXT_QUARTER_FACTOR,
    }
}

fn saturating_sum(values: &[Decimal]) -> Decimal {
    values
        .iter()
        .fold(Decimal::ZERO, |total, value| total.saturating_add(*value))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
