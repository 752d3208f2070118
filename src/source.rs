use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ScoringError;
use crate::models::{EntityRef, EntityType, OrderSignal};

/// Trailing window the order facts cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWindow {
    pub days: i64,
    pub end: DateTime<Utc>,
}

impl ScoringWindow {
    pub fn trailing(days: i64, end: DateTime<Utc>) -> Self {
        Self {
            days: days.max(1),
            end,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        crate::scoring::window_start(self.end, self.days)
    }

    /// Start of the window of equal length immediately before this one.
    pub fn previous_start(&self) -> DateTime<Utc> {
        crate::scoring::window_start(self.start(), self.days)
    }
}

/// Supplies raw order facts per entity. Failures surface as `ScoringError::DataUnavailable`.
#[async_trait]
pub trait OrderDataProvider: Send + Sync {
    async fn get_order_signal(
        &self,
        entity: &EntityRef,
        window: ScoringWindow,
    ) -> Result<OrderSignal, ScoringError>;
}

/// Resolves human-readable labels for entities.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn get_display_name(&self, entity: &EntityRef) -> anyhow::Result<String>;
}

pub fn placeholder_label(entity: &EntityRef) -> String {
    format!("{} {}", entity.entity_type.label(), entity.entity_id)
}

/// Signals and names held in memory, keyed by entity. Used for offline scoring and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    signals: HashMap<EntityRef, OrderSignal>,
    names: HashMap<EntityRef, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityRef, name: Option<String>, signal: OrderSignal) {
        if let Some(name) = name {
            self.names.insert(entity.clone(), name);
        }
        self.signals.insert(entity, signal);
    }

    /// Entities in a stable order (by type, then id).
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut entities: Vec<EntityRef> = self.signals.keys().cloned().collect();
        entities.sort_by(|a, b| {
            a.entity_type
                .as_str()
                .cmp(b.entity_type.as_str())
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        entities
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Loads precomputed signals from CSV with columns
    /// `entity_id`, `entity_type`, `display_name`, `orders_in_window`, `last_order_at`,
    /// `avg_order_value`, `total_revenue_in_window`, `previous_revenue`, `previous_orders`.
    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_reader(reader)
    }

    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct CsvRow {
            entity_id: String,
            entity_type: String,
            display_name: Option<String>,
            orders_in_window: i64,
            last_order_at: Option<DateTime<Utc>>,
            avg_order_value: Decimal,
            total_revenue_in_window: Decimal,
            previous_revenue: Option<Decimal>,
            previous_orders: Option<i64>,
        }

        let mut source = Self::new();
        for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = result?;
            let entity_type = EntityType::parse(&row.entity_type).ok_or_else(|| {
                anyhow::anyhow!(
                    "row {}: unknown entity_type '{}'",
                    line + 1,
                    row.entity_type
                )
            })?;
            source.insert(
                EntityRef::new(row.entity_id, entity_type),
                row.display_name.filter(|name| !name.is_empty()),
                OrderSignal {
                    orders_in_window: row.orders_in_window,
                    last_order_at: row.last_order_at,
                    avg_order_value: row.avg_order_value,
                    total_revenue_in_window: row.total_revenue_in_window,
                    previous_revenue: row.previous_revenue,
                    previous_orders: row.previous_orders,
                },
            );
        }
        Ok(source)
    }
}

#[async_trait]
impl OrderDataProvider for InMemorySource {
    async fn get_order_signal(
        &self,
        entity: &EntityRef,
        _window: ScoringWindow,
    ) -> Result<OrderSignal, ScoringError> {
        self.signals
            .get(entity)
            .cloned()
            .ok_or_else(|| ScoringError::unavailable(entity, "no signal recorded"))
    }
}

#[async_trait]
impl EntityDirectory for InMemorySource {
    async fn get_display_name(&self, entity: &EntityRef) -> anyhow::Result<String> {
        self.names
            .get(entity)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no display name for {entity}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_CSV: &str = "\
entity_id,entity_type,display_name,orders_in_window,last_order_at,\
avg_order_value,total_revenue_in_window,previous_revenue,previous_orders
grp-1,group,Northwind Group,42,2026-02-27T10:00:00Z,1250.50,52521.00,40000,30
loc-7,location,,0,,0,0,,
";

    fn load_sample() -> InMemorySource {
        let reader = csv::Reader::from_reader(SAMPLE_CSV.as_bytes());
        InMemorySource::from_reader(reader).expect("sample csv parses")
    }

    #[test]
    fn csv_rows_become_signals() {
        let source = load_sample();
        assert_eq!(source.len(), 2);
        let entities = source.entities();
        assert_eq!(entities[0], EntityRef::new("grp-1", EntityType::Group));
        assert_eq!(entities[1], EntityRef::new("loc-7", EntityType::Location));

        let signal = &source.signals[&entities[0]];
        assert_eq!(signal.orders_in_window, 42);
        assert_eq!(signal.avg_order_value, Decimal::new(125050, 2));
        assert_eq!(signal.previous_orders, Some(30));
        assert_eq!(
            signal.last_order_at,
            Some(Utc.with_ymd_and_hms(2026, 2, 27, 10, 0, 0).unwrap())
        );

        let empty = &source.signals[&entities[1]];
        assert_eq!(empty.last_order_at, None);
        assert_eq!(empty.previous_revenue, None);
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let csv = "entity_id,entity_type,display_name,orders_in_window,last_order_at,\
                   avg_order_value,total_revenue_in_window,previous_revenue,previous_orders\n\
                   x,region,,1,,1,1,,\n";
        let reader = csv::Reader::from_reader(csv.as_bytes());
        assert!(InMemorySource::from_reader(reader).is_err());
    }

    #[tokio::test]
    async fn missing_entities_are_unavailable() {
        let source = load_sample();
        let window = ScoringWindow::trailing(30, Utc::now());
        let missing = EntityRef::new("nope", EntityType::Company);
        let err = source
            .get_order_signal(&missing, window)
            .await
            .expect_err("entity was never loaded");
        assert!(matches!(err, ScoringError::DataUnavailable { .. }));
        assert!(source.get_display_name(&missing).await.is_err());
        assert_eq!(
            source
                .get_display_name(&EntityRef::new("grp-1", EntityType::Group))
                .await
                .expect("name recorded"),
            "Northwind Group"
        );
    }

    #[test]
    fn previous_window_abuts_current_window() {
        let end = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
        let window = ScoringWindow::trailing(30, end);
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(window.previous_start(), Utc.with_ymd_and_hms(2026, 1, 30, 0, 0, 0).unwrap());
    }
}
