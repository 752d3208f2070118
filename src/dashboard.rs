use rust_decimal::Decimal;

use crate::models::{ActivityLevel, ActivityMetrics, DashboardSummary, LevelCounts, TypeCounts};

/// Reduces a metrics batch into portfolio totals. An empty batch gives an all-zero summary.
/// Revenue totals saturate at `Decimal::MAX`.
pub fn summarize(metrics: &[ActivityMetrics]) -> DashboardSummary {
    let total_entities = metrics.len();
    if total_entities == 0 {
        return DashboardSummary::default();
    }

    let mut by_type = TypeCounts::default();
    let mut by_level = LevelCounts::default();
    let mut total_revenue_30d = Decimal::ZERO;
    let mut total_orders_30d = 0u64;
    let mut score_sum = 0u64;
    let mut top_performer_score = 0u8;
    let mut growth_sum = 0.0;
    let mut growth_count = 0usize;
    let mut degraded_entities = 0usize;

    for entry in metrics {
        by_type.record(entry.entity.entity_type);
        by_level.record(entry.activity_level);
        total_revenue_30d = total_revenue_30d.saturating_add(entry.revenue_30d);
        total_orders_30d += entry.orders_30d;
        score_sum += u64::from(entry.activity_score);
        top_performer_score = top_performer_score.max(entry.activity_score);
        if let Some(growth) = entry.growth_rate {
            growth_sum += growth;
            growth_count += 1;
        }
        if entry.degraded {
            degraded_entities += 1;
        }
    }

    let n = total_entities as f64;
    DashboardSummary {
        total_entities,
        active_entities_percentage: by_level.get(ActivityLevel::Active) as f64 / n * 100.0,
        by_type,
        by_level,
        total_revenue_30d,
        total_orders_30d,
        avg_revenue_per_entity: total_revenue_30d
            .checked_div(Decimal::from(total_entities))
            .unwrap_or_default(),
        avg_orders_per_entity: total_orders_30d as f64 / n,
        avg_activity_score: score_sum as f64 / n,
        top_performer_score,
        growth_rate_overall: if growth_count == 0 {
            0.0
        } else {
            growth_sum / growth_count as f64
        },
        degraded_entities,
    }
}
