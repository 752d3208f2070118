use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Group,
    Company,
    Location,
    BusinessUnit,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Group => "group",
            EntityType::Company => "company",
            EntityType::Location => "location",
            EntityType::BusinessUnit => "business_unit",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            EntityType::Group => "Group",
            EntityType::Company => "Company",
            EntityType::Location => "Location",
            EntityType::BusinessUnit => "Business Unit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "group" => Some(EntityType::Group),
            "company" => Some(EntityType::Company),
            "location" => Some(EntityType::Location),
            "business_unit" | "business-unit" | "bu" => Some(EntityType::BusinessUnit),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a scored hierarchy entity. The hierarchy itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_id: String,
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn new(entity_id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// Raw order facts for one entity over one scoring window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSignal {
    pub orders_in_window: i64,
    pub last_order_at: Option<DateTime<Utc>>,
    pub avg_order_value: Decimal,
    pub total_revenue_in_window: Decimal,
    /// Revenue in the preceding window of equal length, when known.
    #[serde(default)]
    pub previous_revenue: Option<Decimal>,
    #[serde(default)]
    pub previous_orders: Option<i64>,
}

impl OrderSignal {
    /// Neutral signal substituted when the order source cannot answer.
    pub fn zeroed() -> Self {
        Self {
            orders_in_window: 0,
            last_order_at: None,
            avg_order_value: Decimal::ZERO,
            total_revenue_in_window: Decimal::ZERO,
            previous_revenue: None,
            previous_orders: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Active,
    Medium,
    Low,
    Dormant,
}

impl ActivityLevel {
    pub const fn ordered() -> [ActivityLevel; 4] {
        [
            ActivityLevel::Active,
            ActivityLevel::Medium,
            ActivityLevel::Low,
            ActivityLevel::Dormant,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            ActivityLevel::Active => "active",
            ActivityLevel::Medium => "medium",
            ActivityLevel::Low => "low",
            ActivityLevel::Dormant => "dormant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ActivityLevel::Active),
            "medium" => Some(ActivityLevel::Medium),
            "low" => Some(ActivityLevel::Low),
            "dormant" => Some(ActivityLevel::Dormant),
            _ => None,
        }
    }
}

/// One immutable scoring snapshot for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    pub entity: EntityRef,
    pub activity_score: u8,
    pub activity_level: ActivityLevel,
    pub frequency_score: f64,
    pub recency_score: f64,
    pub value_score: f64,
    pub orders_30d: u64,
    pub revenue_30d: Decimal,
    pub avg_order_value: Decimal,
    pub growth_rate: Option<f64>,
    pub trend_percentage: f64,
    pub calculated_at: DateTime<Utc>,
    /// Set when the order source failed and a zeroed signal was scored instead.
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRanking {
    pub entity: EntityRef,
    pub overall_rank: usize,
    pub revenue_rank: usize,
    pub order_volume_rank: usize,
    pub growth_rank: usize,
    pub overall_percentile: f64,
    pub revenue_percentile: f64,
    pub order_volume_percentile: f64,
    pub growth_percentile: f64,
    pub peer_group_size: usize,
    pub vs_peer_avg_revenue: f64,
    pub vs_peer_avg_orders: f64,
    pub vs_top_performer: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPerformer {
    pub entity: EntityRef,
    pub display_name: String,
    pub activity_score: u8,
    pub activity_level: ActivityLevel,
    pub revenue_30d: Decimal,
    pub orders_30d: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub groups: usize,
    pub companies: usize,
    pub locations: usize,
    pub business_units: usize,
}

impl TypeCounts {
    pub fn record(&mut self, entity_type: EntityType) {
        match entity_type {
            EntityType::Group => self.groups += 1,
            EntityType::Company => self.companies += 1,
            EntityType::Location => self.locations += 1,
            EntityType::BusinessUnit => self.business_units += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.groups + self.companies + self.locations + self.business_units
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub active: usize,
    pub medium: usize,
    pub low: usize,
    pub dormant: usize,
}

impl LevelCounts {
    pub fn record(&mut self, level: ActivityLevel) {
        match level {
            ActivityLevel::Active => self.active += 1,
            ActivityLevel::Medium => self.medium += 1,
            ActivityLevel::Low => self.low += 1,
            ActivityLevel::Dormant => self.dormant += 1,
        }
    }

    pub fn get(&self, level: ActivityLevel) -> usize {
        match level {
            ActivityLevel::Active => self.active,
            ActivityLevel::Medium => self.medium,
            ActivityLevel::Low => self.low,
            ActivityLevel::Dormant => self.dormant,
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.medium + self.low + self.dormant
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_entities: usize,
    pub by_type: TypeCounts,
    pub by_level: LevelCounts,
    pub active_entities_percentage: f64,
    pub total_revenue_30d: Decimal,
    pub total_orders_30d: u64,
    pub avg_revenue_per_entity: Decimal,
    pub avg_orders_per_entity: f64,
    pub avg_activity_score: f64,
    pub top_performer_score: u8,
    pub growth_rate_overall: f64,
    pub degraded_entities: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBuckets {
    pub below_25: usize,
    pub from_25_to_50: usize,
    pub from_50_to_75: usize,
    pub from_75_to_100: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDistribution {
    pub by_level: LevelCounts,
    pub buckets: ScoreBuckets,
    pub avg_score: f64,
    pub median_score: u8,
    pub score_std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueConcentration {
    pub total_revenue: Decimal,
    pub top_20_pct_count: usize,
    pub pareto_ratio_80_20: f64,
    pub top_10_pct_share: f64,
    pub bottom_50_pct_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPatterns {
    pub avg_orders: f64,
    pub high_volume_count: usize,
    pub low_volume_count: usize,
    pub order_variance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub const fn label(self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Flat => "flat",
        }
    }
}

/// Heuristic growth outlook. Not a statistical projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthOutlook {
    pub avg_growth_rate: f64,
    pub entities_reporting_growth: usize,
    pub direction: TrendDirection,
    pub forecast_next_month: f64,
    pub forecast_next_quarter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub entity_type_filter: Option<EntityType>,
    pub entity_count: usize,
    pub distribution: ScoreDistribution,
    pub concentration: RevenueConcentration,
    pub order_patterns: OrderPatterns,
    pub growth: GrowthOutlook,
}

/// A persisted scoring snapshot, as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySnapshot {
    pub entity: EntityRef,
    pub activity_score: u8,
    pub activity_level: ActivityLevel,
    pub revenue_30d: Decimal,
    pub orders_30d: u64,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub calculated_at: DateTime<Utc>,
    pub activity_score: u8,
    pub activity_level: ActivityLevel,
    pub revenue_30d: Decimal,
    pub score_delta: i32,
    pub revenue_change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityTrend {
    pub entity: EntityRef,
    pub points: Vec<TrendPoint>,
    pub direction: TrendDirection,
    pub net_score_change: i32,
}
