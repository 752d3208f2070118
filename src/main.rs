use std::path::PathBuf;
use std::sync::Arc;

use activity_scoring::config::AppConfig;
use activity_scoring::db::{self, PgEntityDirectory, PgOrderSource};
use activity_scoring::models::{EntityRef, EntityType};
use activity_scoring::source::InMemorySource;
use activity_scoring::{report, telemetry, trend, ScoringService};
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

#[derive(Parser)]
#[command(name = "activity-scoring")]
#[command(about = "Activity scoring and ranking for hierarchy entities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed entities and orders
    Seed,
    /// Import raw orders from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score entities and list them by activity score
    Score {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Store the run as snapshots for trend tracking (database mode only)
        #[arg(long)]
        persist: bool,
    },
    /// Rank entities against their peer group
    Rank {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print distribution, concentration and growth analytics as JSON
    Analyze {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Generate a markdown portfolio report
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long, default_value = "activity-report.md")]
        out: PathBuf,
    },
    /// Show the stored score history of one entity
    Trend {
        #[arg(long)]
        entity_id: String,
        #[arg(long, value_parser = parse_entity_type)]
        entity_type: EntityType,
        #[arg(long, default_value_t = 180)]
        since_days: i64,
    },
}

#[derive(Args)]
struct ScopeArgs {
    /// Score precomputed signals from CSV instead of the database
    #[arg(long)]
    signals: Option<PathBuf>,
    #[arg(long, value_parser = parse_entity_type)]
    entity_type: Option<EntityType>,
    /// Overrides ACTIVITY_WINDOW_DAYS
    #[arg(long)]
    window_days: Option<i64>,
}

fn parse_entity_type(value: &str) -> Result<EntityType, String> {
    EntityType::parse(value).ok_or_else(|| {
        format!(
            "unknown entity type '{value}' (expected group, company, location or business_unit)"
        )
    })
}

struct Scope {
    service: ScoringService,
    entities: Vec<EntityRef>,
    pool: Option<PgPool>,
    window_days: i64,
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_scope(config: &AppConfig, args: &ScopeArgs) -> anyhow::Result<Scope> {
    let window_days = args.window_days.unwrap_or(config.window_days).max(1);

    let (service, entities, pool) = match &args.signals {
        Some(path) => {
            let source = Arc::new(
                InMemorySource::from_csv(path)
                    .with_context(|| format!("failed to load signals from {}", path.display()))?,
            );
            let entities: Vec<EntityRef> = source
                .entities()
                .into_iter()
                .filter(|e| args.entity_type.map_or(true, |kind| e.entity_type == kind))
                .collect();
            let service = ScoringService::new(config.scoring.clone(), source.clone(), source);
            (service, entities, None)
        }
        None => {
            let pool = connect(config).await?;
            let entities = db::list_entities(&pool, args.entity_type).await?;
            let service = ScoringService::new(
                config.scoring.clone(),
                Arc::new(PgOrderSource::new(pool.clone())),
                Arc::new(PgEntityDirectory::new(pool.clone())),
            );
            (service, entities, Some(pool))
        }
    };

    Ok(Scope {
        service: service
            .with_window_days(window_days)
            .with_concurrency(config.concurrency),
        entities,
        pool,
        window_days,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.log_level)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool, Utc::now()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} orders from {}.", csv.display());
        }
        Commands::Score {
            scope,
            limit,
            persist,
        } => {
            let scope = open_scope(&config, &scope).await?;
            let outcome = scope.service.score_batch(&scope.entities, Utc::now()).await;

            if outcome.metrics.is_empty() && outcome.failures.is_empty() {
                println!("No entities found for this scope.");
                return Ok(());
            }

            let top = scope
                .service
                .top_performers(&outcome.metrics, limit, None)
                .await;
            println!("Top entities by activity score:");
            for performer in &top {
                println!(
                    "- {} ({}) score {} [{}], revenue {}, {} orders",
                    performer.display_name,
                    performer.entity.entity_type.label(),
                    performer.activity_score,
                    performer.activity_level.label(),
                    performer.revenue_30d.round_dp(2),
                    performer.orders_30d
                );
            }
            for failure in &outcome.failures {
                println!("! {}: {}", failure.entity, failure.error);
            }

            if persist {
                let pool = scope
                    .pool
                    .as_ref()
                    .context("--persist requires database mode (omit --signals)")?;
                let stored = db::store_snapshots(pool, &outcome.metrics).await?;
                info!(stored, "snapshots persisted");
                println!("Stored {stored} snapshots.");
            }
        }
        Commands::Rank { scope, limit } => {
            let scope = open_scope(&config, &scope).await?;
            let outcome = scope.service.score_batch(&scope.entities, Utc::now()).await;
            let mut rankings = scope.service.rank(&outcome.metrics);
            if rankings.is_empty() {
                println!("No entities found for this scope.");
                return Ok(());
            }

            rankings.sort_by_key(|r| r.overall_rank);
            println!("Peer rankings ({} entities):", rankings.len());
            for r in rankings.iter().take(limit) {
                let name = scope.service.display_name(&r.entity).await;
                println!(
                    "#{} {} (p{:.0}) revenue #{} orders #{} growth #{}, \
                     {:+.1}% vs peer revenue, {:+.1}% vs top",
                    r.overall_rank,
                    name,
                    r.overall_percentile,
                    r.revenue_rank,
                    r.order_volume_rank,
                    r.growth_rank,
                    r.vs_peer_avg_revenue,
                    r.vs_top_performer
                );
            }
        }
        Commands::Analyze { scope } => {
            let entity_type = scope.entity_type;
            let scope = open_scope(&config, &scope).await?;
            let outcome = scope.service.score_batch(&scope.entities, Utc::now()).await;
            let analytics = scope.service.analyze(&outcome.metrics, entity_type)?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
        }
        Commands::Report { scope, top, out } => {
            let entity_type = scope.entity_type;
            let scope = open_scope(&config, &scope).await?;
            let now = Utc::now();
            let outcome = scope.service.score_batch(&scope.entities, now).await;
            let summary = scope.service.summarize(&outcome.metrics);
            let analytics = scope.service.analyze(&outcome.metrics, entity_type).ok();
            let top = scope
                .service
                .top_performers(&outcome.metrics, top, entity_type)
                .await;
            let report = report::build_report(
                entity_type,
                scope.window_days,
                now,
                &summary,
                analytics.as_ref(),
                &top,
                &outcome.metrics,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Trend {
            entity_id,
            entity_type,
            since_days,
        } => {
            let pool = connect(&config).await?;
            let entity = EntityRef::new(entity_id, entity_type);
            let since = Utc::now() - Duration::days(since_days.max(1));
            let snapshots = db::fetch_snapshots(&pool, &entity, since).await?;
            let series = trend::build_trend(&entity, &snapshots);

            if series.points.is_empty() {
                println!("No snapshots stored for {entity}.");
                return Ok(());
            }

            println!(
                "{entity}: trend {} ({:+} points over {} snapshots)",
                series.direction.label(),
                series.net_score_change,
                series.points.len()
            );
            for point in &series.points {
                println!(
                    "- {} score {} [{}] ({:+}), revenue {}",
                    point.calculated_at.format("%Y-%m-%d"),
                    point.activity_score,
                    point.activity_level.label(),
                    point.score_delta,
                    point.revenue_30d.round_dp(2)
                );
            }
        }
    }

    Ok(())
}
