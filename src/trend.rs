use rust_decimal::Decimal;

use crate::models::{ActivitySnapshot, ActivityTrend, EntityRef, TrendDirection, TrendPoint};
use crate::ranking::decimal_to_f64;

/// Net score movement (in points) needed before a series counts as trending.
const SCORE_TREND_BAND: i32 = 5;

/// Builds a time-ordered trend for one entity from its persisted snapshots.
/// Snapshots belonging to other entities are ignored.
pub fn build_trend(entity: &EntityRef, snapshots: &[ActivitySnapshot]) -> ActivityTrend {
    let mut history: Vec<&ActivitySnapshot> =
        snapshots.iter().filter(|s| &s.entity == entity).collect();
    history.sort_by_key(|s| s.calculated_at);

    let mut points = Vec::with_capacity(history.len());
    let mut previous: Option<&ActivitySnapshot> = None;
    for snapshot in history {
        let (score_delta, revenue_change_pct) = match previous {
            Some(prev) => (
                i32::from(snapshot.activity_score) - i32::from(prev.activity_score),
                revenue_change(prev.revenue_30d, snapshot.revenue_30d),
            ),
            None => (0, None),
        };
        points.push(TrendPoint {
            calculated_at: snapshot.calculated_at,
            activity_score: snapshot.activity_score,
            activity_level: snapshot.activity_level,
            revenue_30d: snapshot.revenue_30d,
            score_delta,
            revenue_change_pct,
        });
        previous = Some(snapshot);
    }

    let net_score_change = match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            i32::from(last.activity_score) - i32::from(first.activity_score)
        }
        _ => 0,
    };
    let direction = if net_score_change >= SCORE_TREND_BAND {
        TrendDirection::Up
    } else if net_score_change <= -SCORE_TREND_BAND {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };

    ActivityTrend {
        entity: entity.clone(),
        points,
        direction,
        net_score_change,
    }
}

/// Percent change between snapshots; absent from a zero base or when it overflows.
fn revenue_change(previous: Decimal, current: Decimal) -> Option<f64> {
    if previous.is_zero() {
        return None;
    }
    current
        .checked_sub(previous)?
        .checked_div(previous)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(decimal_to_f64)
}
