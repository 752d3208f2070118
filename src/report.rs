use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{
    ActivityLevel, ActivityMetrics, AnalyticsReport, DashboardSummary, EntityType, TopPerformer,
};

pub fn build_report(
    scope: Option<EntityType>,
    window_days: i64,
    generated_at: DateTime<Utc>,
    summary: &DashboardSummary,
    analytics: Option<&AnalyticsReport>,
    top: &[TopPerformer],
    metrics: &[ActivityMetrics],
) -> String {
    let mut output = String::new();
    let scope_label = scope.map_or("all entity types", EntityType::label);

    let _ = writeln!(output, "# Activity Scoring Report");
    let _ = writeln!(
        output,
        "Generated {} for {} (trailing {} days)",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        scope_label,
        window_days
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Portfolio Summary");

    if summary.total_entities == 0 {
        let _ = writeln!(output, "No entities scored in this window.");
        return output;
    }

    let _ = writeln!(
        output,
        "- Entities: {} ({} groups, {} companies, {} locations, {} business units)",
        summary.total_entities,
        summary.by_type.groups,
        summary.by_type.companies,
        summary.by_type.locations,
        summary.by_type.business_units
    );
    let _ = writeln!(
        output,
        "- Revenue: {} total, {} per entity",
        summary.total_revenue_30d.round_dp(2),
        summary.avg_revenue_per_entity.round_dp(2)
    );
    let _ = writeln!(
        output,
        "- Orders: {} total, {:.1} per entity",
        summary.total_orders_30d, summary.avg_orders_per_entity
    );
    let _ = writeln!(
        output,
        "- Activity: average score {:.1}, top score {}, {:.1}% active",
        summary.avg_activity_score, summary.top_performer_score, summary.active_entities_percentage
    );
    let _ = writeln!(output, "- Overall growth: {:+.1}%", summary.growth_rate_overall);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Levels");
    for level in ActivityLevel::ordered() {
        let _ = writeln!(output, "- {}: {}", level.label(), summary.by_level.get(level));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    for (index, performer) in top.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({}) score {} [{}], revenue {}, {} orders",
            index + 1,
            performer.display_name,
            performer.entity.entity_type.label(),
            performer.activity_score,
            performer.activity_level.label(),
            performer.revenue_30d.round_dp(2),
            performer.orders_30d
        );
    }

    if let Some(analytics) = analytics {
        let c = &analytics.concentration;
        let d = &analytics.distribution;
        let g = &analytics.growth;
        let _ = writeln!(output);
        let _ = writeln!(output, "## Distribution & Concentration");
        let _ = writeln!(
            output,
            "- Scores: median {}, std dev {:.1}",
            d.median_score, d.score_std_dev
        );
        let _ = writeln!(
            output,
            "- Top 20% of entities ({}) hold {:.1}% of revenue; \
             top 10% hold {:.1}%; bottom half {:.1}%",
            c.top_20_pct_count, c.pareto_ratio_80_20, c.top_10_pct_share, c.bottom_50_pct_share
        );
        let _ = writeln!(
            output,
            "- High-volume entities: {}, low-volume entities: {}",
            analytics.order_patterns.high_volume_count, analytics.order_patterns.low_volume_count
        );
        let _ = writeln!(
            output,
            "- Growth trend {} ({:+.1}% across {} reporting entities; \
             heuristic next month {:+.1}%)",
            g.direction.label(),
            g.avg_growth_rate,
            g.entities_reporting_growth,
            g.forecast_next_month
        );
    }

    let degraded: Vec<&ActivityMetrics> = metrics.iter().filter(|m| m.degraded).collect();
    if !degraded.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Degraded Data");
        let _ = writeln!(
            output,
            "Order data was unavailable for these entities; they were scored as dormant:"
        );
        for entry in degraded {
            let _ = writeln!(output, "- {}", entry.entity);
        }
    }

    output
}
