use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{ActivityMetrics, EntityType, PerformanceRanking, TopPerformer};

/// Ranks every entity against the rest of the batch (its peer group).
///
/// Each rank is an independent stable sort by its own metric, descending;
/// ties keep input order. An empty batch yields an empty ranking.
pub fn rank(metrics: &[ActivityMetrics]) -> Vec<PerformanceRanking> {
    let n = metrics.len();
    if n == 0 {
        return Vec::new();
    }

    let overall = positions(metrics, |a, b| b.activity_score.cmp(&a.activity_score));
    let revenue = positions(metrics, |a, b| b.revenue_30d.cmp(&a.revenue_30d));
    let orders = positions(metrics, |a, b| b.orders_30d.cmp(&a.orders_30d));
    let growth = positions(metrics, |a, b| compare_growth(b.growth_rate, a.growth_rate));

    let revenues: Vec<f64> = metrics.iter().map(|m| decimal_to_f64(m.revenue_30d)).collect();
    let avg_revenue = revenues.iter().sum::<f64>() / n as f64;
    let avg_orders = metrics.iter().map(|m| m.orders_30d as f64).sum::<f64>() / n as f64;
    let top_revenue = revenues.iter().copied().fold(0.0_f64, f64::max);

    metrics
        .iter()
        .enumerate()
        .map(|(index, entry)| PerformanceRanking {
            entity: entry.entity.clone(),
            overall_rank: overall[index],
            revenue_rank: revenue[index],
            order_volume_rank: orders[index],
            growth_rank: growth[index],
            overall_percentile: percentile(overall[index], n),
            revenue_percentile: percentile(revenue[index], n),
            order_volume_percentile: percentile(orders[index], n),
            growth_percentile: percentile(growth[index], n),
            peer_group_size: n,
            vs_peer_avg_revenue: relative_delta(revenues[index], avg_revenue),
            vs_peer_avg_orders: relative_delta(entry.orders_30d as f64, avg_orders),
            vs_top_performer: relative_delta(revenues[index], top_revenue),
        })
        .collect()
}

/// Best entities by activity score, optionally restricted to one entity type.
pub fn top_performers<F>(
    metrics: &[ActivityMetrics],
    limit: usize,
    entity_type: Option<EntityType>,
    mut label: F,
) -> Vec<TopPerformer>
where
    F: FnMut(&ActivityMetrics) -> String,
{
    let mut candidates: Vec<&ActivityMetrics> = metrics
        .iter()
        .filter(|m| entity_type.map_or(true, |kind| m.entity.entity_type == kind))
        .collect();
    candidates.sort_by(|a, b| b.activity_score.cmp(&a.activity_score));

    candidates
        .into_iter()
        .take(limit)
        .map(|m| TopPerformer {
            entity: m.entity.clone(),
            display_name: label(m),
            activity_score: m.activity_score,
            activity_level: m.activity_level,
            revenue_30d: m.revenue_30d,
            orders_30d: m.orders_30d,
        })
        .collect()
}

/// `(N - rank + 1) / N * 100` for a 1-based rank; 0 when the rank is outside `1..=N`.
pub fn percentile(rank: usize, n: usize) -> f64 {
    if rank == 0 || rank > n {
        return 0.0;
    }
    (n - rank + 1) as f64 / n as f64 * 100.0
}

/// Returns the 1-based rank of every input position under `compare`.
fn positions<F>(metrics: &[ActivityMetrics], mut compare: F) -> Vec<usize>
where
    F: FnMut(&ActivityMetrics, &ActivityMetrics) -> Ordering,
{
    let mut order: Vec<usize> = (0..metrics.len()).collect();
    order.sort_by(|&a, &b| compare(&metrics[a], &metrics[b]));

    let mut ranks = vec![0; metrics.len()];
    for (position, index) in order.into_iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}

// Entities without a growth figure sort after every entity that has one.
fn compare_growth(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn relative_delta(value: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        (value - reference) / reference * 100.0
    }
}

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLevel, EntityRef};
    use chrono::{TimeZone, Utc};

    fn sample_metrics(
        id: &str,
        score: u8,
        revenue: i64,
        orders: u64,
        growth: Option<f64>,
    ) -> ActivityMetrics {
        ActivityMetrics {
            entity: EntityRef::new(id, EntityType::Location),
            activity_score: score,
            activity_level: ActivityLevel::Low,
            frequency_score: 0.0,
            recency_score: 0.0,
            value_score: 0.0,
            orders_30d: orders,
            revenue_30d: Decimal::from(revenue),
            avg_order_value: Decimal::ZERO,
            growth_rate: growth,
            trend_percentage: 0.0,
            calculated_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            degraded: false,
        }
    }

    #[test]
    fn empty_batch_yields_no_rankings() {
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn ranks_form_a_permutation_with_matching_percentiles() {
        let batch = vec![
            sample_metrics("a", 40, 100, 5, None),
            sample_metrics("b", 90, 300, 2, Some(5.0)),
            sample_metrics("c", 65, 200, 9, Some(-3.0)),
            sample_metrics("d", 10, 0, 0, None),
        ];
        let rankings = rank(&batch);
        let n = batch.len();

        let mut overall: Vec<usize> = rankings.iter().map(|r| r.overall_rank).collect();
        overall.sort_unstable();
        assert_eq!(overall, vec![1, 2, 3, 4]);

        for r in &rankings {
            assert_eq!(r.peer_group_size, n);
            let expected = (n - r.overall_rank + 1) as f64 / n as f64 * 100.0;
            assert!((r.overall_percentile - expected).abs() < 1e-9);
        }
        assert_eq!(rankings[1].overall_rank, 1);
        assert_eq!(rankings[1].overall_percentile, 100.0);
        assert_eq!(rankings[3].overall_percentile, 25.0);
    }

    #[test]
    fn percentile_outside_the_peer_group_is_zero() {
        assert_eq!(percentile(1, 4), 100.0);
        assert_eq!(percentile(4, 4), 25.0);
        assert_eq!(percentile(0, 4), 0.0);
        assert_eq!(percentile(5, 4), 0.0);
        assert_eq!(percentile(1, 0), 0.0);
    }

    #[test]
    fn metric_ranks_are_sorted_independently() {
        let batch = vec![
            sample_metrics("a", 40, 100, 5, None),
            sample_metrics("b", 90, 300, 2, Some(5.0)),
            sample_metrics("c", 65, 200, 9, Some(-3.0)),
        ];
        let rankings = rank(&batch);
        assert_eq!(rankings[2].order_volume_rank, 1);
        assert_eq!(rankings[1].order_volume_rank, 3);
        assert_eq!(rankings[1].revenue_rank, 1);
        assert_eq!(rankings[1].growth_rank, 1);
        assert_eq!(rankings[2].growth_rank, 2);
        assert_eq!(rankings[0].growth_rank, 3);
    }

    #[test]
    fn ties_keep_input_order() {
        let batch = vec![
            sample_metrics("first", 50, 10, 1, None),
            sample_metrics("second", 50, 10, 1, None),
            sample_metrics("third", 50, 10, 1, None),
        ];
        let rankings = rank(&batch);
        let ranks: Vec<usize> = rankings.iter().map(|r| r.overall_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        let revenue_ranks: Vec<usize> = rankings.iter().map(|r| r.revenue_rank).collect();
        assert_eq!(revenue_ranks, vec![1, 2, 3]);
    }

    #[test]
    fn peer_deltas_compare_against_batch_average_and_top() {
        let batch = vec![
            sample_metrics("a", 40, 100, 10, None),
            sample_metrics("b", 90, 300, 30, None),
        ];
        let rankings = rank(&batch);
        assert!((rankings[0].vs_peer_avg_revenue - -50.0).abs() < 1e-9);
        assert!((rankings[1].vs_peer_avg_revenue - 50.0).abs() < 1e-9);
        assert!((rankings[0].vs_peer_avg_orders - -50.0).abs() < 1e-9);
        assert!((rankings[0].vs_top_performer - (-200.0 / 3.0)).abs() < 1e-9);
        assert_eq!(rankings[1].vs_top_performer, 0.0);
    }

    #[test]
    fn zero_revenue_batch_has_zero_deltas() {
        let batch = vec![
            sample_metrics("a", 0, 0, 0, None),
            sample_metrics("b", 0, 0, 0, None),
        ];
        for r in rank(&batch) {
            assert_eq!(r.vs_peer_avg_revenue, 0.0);
            assert_eq!(r.vs_peer_avg_orders, 0.0);
            assert_eq!(r.vs_top_performer, 0.0);
        }
    }

    #[test]
    fn top_performers_filter_and_limit() {
        let mut batch = vec![
            sample_metrics("a", 40, 100, 5, None),
            sample_metrics("b", 90, 300, 2, None),
            sample_metrics("c", 65, 200, 9, None),
        ];
        batch[1].entity.entity_type = EntityType::Company;

        let top = top_performers(&batch, 2, None, |m| m.entity.entity_id.to_uppercase());
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].display_name, "B");
        assert_eq!(top[1].display_name, "C");

        let locations = top_performers(&batch, 5, Some(EntityType::Location), |m| {
            m.entity.entity_id.clone()
        });
        let ids: Vec<&str> = locations.iter().map(|t| t.entity.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
