use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ScoringError;
use crate::models::{
    ActivityLevel, ActivityMetrics, ActivitySnapshot, EntityRef, EntityType, OrderSignal,
};
use crate::source::{EntityDirectory, OrderDataProvider, ScoringWindow};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let entities = vec![
        ("grp-northwind", EntityType::Group, "Northwind Holdings"),
        ("co-contoso", EntityType::Company, "Contoso Retail"),
        ("co-fabrikam", EntityType::Company, "Fabrikam Supply"),
        ("loc-harbor", EntityType::Location, "Harbor Street Store"),
        ("loc-midtown", EntityType::Location, "Midtown Depot"),
        ("bu-wholesale", EntityType::BusinessUnit, "Wholesale Division"),
    ];

    for (id, entity_type, name) in &entities {
        upsert_entity(pool, &EntityRef::new(*id, *entity_type), name).await?;
    }

    // (entity, orders, spacing in days, amount in cents, offset of first order in days)
    let order_plan: [(&str, EntityType, i64, i64, i64, i64); 6] = [
        ("grp-northwind", EntityType::Group, 60, 1, 780_000, 0),
        ("co-contoso", EntityType::Company, 24, 2, 410_000, 1),
        ("co-fabrikam", EntityType::Company, 6, 9, 1_250_000, 3),
        ("loc-harbor", EntityType::Location, 12, 4, 95_000, 2),
        ("loc-midtown", EntityType::Location, 2, 20, 60_000, 45),
        ("bu-wholesale", EntityType::BusinessUnit, 1, 1, 15_000, 120),
    ];

    for (id, entity_type, count, spacing, cents, offset) in order_plan {
        for n in 0..count {
            let ordered_at = now - Duration::days(offset + n * spacing);
            sqlx::query(
                r#"
                INSERT INTO activity_scoring.orders
                (id, entity_id, entity_type, amount, ordered_at, source_key)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(entity_type.as_str())
            .bind(Decimal::new(cents + n * 1_250, 2))
            .bind(ordered_at)
            .bind(format!("seed-{id}-{n:03}"))
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

async fn upsert_entity(
    pool: &PgPool,
    entity: &EntityRef,
    display_name: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activity_scoring.entities (id, entity_type, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id, entity_type) DO UPDATE
        SET display_name = EXCLUDED.display_name
        "#,
    )
    .bind(&entity.entity_id)
    .bind(entity.entity_type.as_str())
    .bind(display_name)
    .execute(pool)
    .await?;
    Ok(())
}

/// Imports raw orders from CSV. Rows without a `source_key` get a generated one.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        entity_id: String,
        entity_type: String,
        display_name: String,
        amount: Decimal,
        ordered_at: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let entity_type = EntityType::parse(&row.entity_type).with_context(|| {
            format!("row {}: unknown entity_type '{}'", line + 1, row.entity_type)
        })?;
        if row.amount < Decimal::ZERO {
            anyhow::bail!("row {}: amount must not be negative", line + 1);
        }
        let entity = EntityRef::new(row.entity_id, entity_type);
        upsert_entity(pool, &entity, &row.display_name).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO activity_scoring.orders
            (id, entity_id, entity_type, amount, ordered_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entity.entity_id)
        .bind(entity.entity_type.as_str())
        .bind(row.amount)
        .bind(row.ordered_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn list_entities(
    pool: &PgPool,
    entity_type: Option<EntityType>,
) -> anyhow::Result<Vec<EntityRef>> {
    let mut query = String::from("SELECT id, entity_type FROM activity_scoring.entities");
    if entity_type.is_some() {
        query.push_str(" WHERE entity_type = $1");
    }
    query.push_str(" ORDER BY entity_type, id");

    let mut rows = sqlx::query(&query);
    if let Some(kind) = entity_type {
        rows = rows.bind(kind.as_str());
    }

    let mut entities = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let raw_type: String = row.get("entity_type");
        let kind = EntityType::parse(&raw_type)
            .with_context(|| format!("unknown entity_type '{raw_type}' in entities table"))?;
        entities.push(EntityRef::new(row.get::<String, _>("id"), kind));
    }
    Ok(entities)
}

pub async fn store_snapshots(pool: &PgPool, metrics: &[ActivityMetrics]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    for entry in metrics {
        sqlx::query(
            r#"
            INSERT INTO activity_scoring.metric_snapshots
            (id, entity_id, entity_type, activity_score, activity_level, frequency_score,
             recency_score, value_score, orders_30d, revenue_30d, avg_order_value,
             growth_rate, trend_percentage, degraded, calculated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.entity.entity_id)
        .bind(entry.entity.entity_type.as_str())
        .bind(i16::from(entry.activity_score))
        .bind(entry.activity_level.label())
        .bind(entry.frequency_score)
        .bind(entry.recency_score)
        .bind(entry.value_score)
        .bind(i64::try_from(entry.orders_30d).unwrap_or(i64::MAX))
        .bind(entry.revenue_30d)
        .bind(entry.avg_order_value)
        .bind(entry.growth_rate)
        .bind(entry.trend_percentage)
        .bind(entry.degraded)
        .bind(entry.calculated_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(metrics.len())
}

pub async fn fetch_snapshots(
    pool: &PgPool,
    entity: &EntityRef,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<ActivitySnapshot>> {
    let rows = sqlx::query(
        r#"
        SELECT activity_score, activity_level, revenue_30d, orders_30d, calculated_at
        FROM activity_scoring.metric_snapshots
        WHERE entity_id = $1 AND entity_type = $2 AND calculated_at >= $3
        ORDER BY calculated_at
        "#,
    )
    .bind(&entity.entity_id)
    .bind(entity.entity_type.as_str())
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let raw_level: String = row.get("activity_level");
        let activity_level = ActivityLevel::parse(&raw_level)
            .with_context(|| format!("unknown activity_level '{raw_level}' in snapshot"))?;
        let score: i16 = row.get("activity_score");
        let orders: i64 = row.get("orders_30d");
        snapshots.push(ActivitySnapshot {
            entity: entity.clone(),
            activity_score: score.clamp(0, 100) as u8,
            activity_level,
            revenue_30d: row.get("revenue_30d"),
            orders_30d: orders.max(0) as u64,
            calculated_at: row.get("calculated_at"),
        });
    }
    Ok(snapshots)
}

/// Order facts aggregated straight from the orders table.
#[derive(Debug, Clone)]
pub struct PgOrderSource {
    pool: PgPool,
}

impl PgOrderSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_signal(
        &self,
        entity: &EntityRef,
        window: ScoringWindow,
    ) -> Result<OrderSignal, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE ordered_at >= $3 AND ordered_at <= $4) AS orders_in_window,
                MAX(ordered_at) FILTER (WHERE ordered_at <= $4) AS last_order_at,
                AVG(amount) FILTER (WHERE ordered_at >= $3 AND ordered_at <= $4) AS avg_order_value,
                COALESCE(SUM(amount) FILTER (WHERE ordered_at >= $3 AND ordered_at <= $4), 0)
                    AS total_revenue,
                COALESCE(SUM(amount) FILTER (WHERE ordered_at >= $5 AND ordered_at < $3), 0)
                    AS previous_revenue,
                COUNT(*) FILTER (WHERE ordered_at >= $5 AND ordered_at < $3) AS previous_orders
            FROM activity_scoring.orders
            WHERE entity_id = $1 AND entity_type = $2
            "#,
        )
        .bind(&entity.entity_id)
        .bind(entity.entity_type.as_str())
        .bind(window.start())
        .bind(window.end)
        .bind(window.previous_start())
        .fetch_one(&self.pool)
        .await?;

        let avg_order_value: Option<Decimal> = row.get("avg_order_value");
        Ok(OrderSignal {
            orders_in_window: row.get("orders_in_window"),
            last_order_at: row.get("last_order_at"),
            avg_order_value: avg_order_value.unwrap_or(Decimal::ZERO).round_dp(2),
            total_revenue_in_window: row.get("total_revenue"),
            previous_revenue: Some(row.get("previous_revenue")),
            previous_orders: Some(row.get("previous_orders")),
        })
    }
}

#[async_trait]
impl OrderDataProvider for PgOrderSource {
    async fn get_order_signal(
        &self,
        entity: &EntityRef,
        window: ScoringWindow,
    ) -> Result<OrderSignal, ScoringError> {
        self.fetch_signal(entity, window)
            .await
            .map_err(|err| ScoringError::unavailable(entity, err.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct PgEntityDirectory {
    pool: PgPool,
}

impl PgEntityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityDirectory for PgEntityDirectory {
    async fn get_display_name(&self, entity: &EntityRef) -> anyhow::Result<String> {
        let row = sqlx::query(
            "SELECT display_name FROM activity_scoring.entities WHERE id = $1 AND entity_type = $2",
        )
        .bind(&entity.entity_id)
        .bind(entity.entity_type.as_str())
        .fetch_optional(&self.pool)
        .await?
        .with_context(|| format!("{entity} is not in the entity directory"))?;
        Ok(row.get("display_name"))
    }
}
