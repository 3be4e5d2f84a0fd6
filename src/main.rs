mod config;
mod error;
mod indicator;
mod market_data;
mod model;
mod prediction;
mod storage;

use std::path::Path;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use market_data::MarketData;
use market_data::yahoo::YahooMarketData;
use model::{SubscriptionTier, Timeframe, User, normalize_ticker};
use prediction::scoring::build_scoring;
use prediction::{PredictionService, PredictionSettings};
use storage::Storage;
use storage::sqlite::SqliteStorage;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("market data error")]
    MarketData,
    #[display("unknown user")]
    UnknownUser,
    #[display("prediction not found")]
    UnknownPrediction,
    #[display("prediction failed")]
    Prediction,
    #[display("failed to write output")]
    Output,
}

#[derive(Parser)]
#[command(name = "stock-predictor", about = "Technical-indicator stock direction predictions")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict the direction of a ticker for the given user
    Predict {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, value_parser = parse_ticker)]
        ticker: String,
        /// One of 1d, 1w, 1m
        #[arg(long, default_value = "1d", value_parser = parse_timeframe)]
        timeframe: Timeframe,
    },
    /// List a user's past predictions, newest first
    History {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, value_parser = parse_ticker)]
        ticker: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one of a user's predictions by id
    Show {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        id: String,
    },
    /// Show prediction counts and the daily limit for a user
    Stats {
        #[arg(short, long)]
        user: String,
    },
    /// Register a user or change their subscription tier
    AddUser {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        /// One of free, pro, elite
        #[arg(long, default_value = "free", value_parser = parse_tier)]
        tier: SubscriptionTier,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    // ── Storage ───────────────────────────────────────────────────────────────
    let data_dir = &config.general.data_dir;
    std::fs::create_dir_all(data_dir)
        .change_context(AppError::Storage)
        .attach_with(|| format!("data_dir: {data_dir}"))?;

    let db_path = format!("{data_dir}/stock-predictor.db");
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::open(Path::new(&db_path))
            .await
            .change_context(AppError::Storage)?,
    );

    // ── Market data ───────────────────────────────────────────────────────────
    let market_data: Arc<dyn MarketData> = Arc::new(
        YahooMarketData::new(&config.market_data).change_context(AppError::MarketData)?,
    );

    let service = PredictionService::new(
        Arc::clone(&storage),
        market_data,
        build_scoring(&config.heuristic),
        PredictionSettings::from_config(&config),
    )
    .change_context(AppError::Prediction)?;

    match cli.command {
        Command::Predict {
            user,
            ticker,
            timeframe,
        } => {
            let user = resolve_user(storage.as_ref(), &user).await?;
            let record = service
                .predict(&user, &ticker, timeframe)
                .await
                .change_context(AppError::Prediction)?;
            print_json(&record)
        }
        Command::History {
            user,
            ticker,
            skip,
            limit,
        } => {
            let user = resolve_user(storage.as_ref(), &user).await?;
            let records = service
                .history(&user, ticker.as_deref(), skip, limit)
                .await
                .change_context(AppError::Prediction)?;
            print_json(&records)
        }
        Command::Show { user, id } => {
            let user = resolve_user(storage.as_ref(), &user).await?;
            let record = service
                .get(&user, &id)
                .await
                .change_context(AppError::Prediction)?
                .ok_or_else(|| {
                    Report::new(AppError::UnknownPrediction).attach(format!("prediction id: {id}"))
                })?;
            print_json(&record)
        }
        Command::Stats { user } => {
            let user = resolve_user(storage.as_ref(), &user).await?;
            let stats = service
                .stats(&user)
                .await
                .change_context(AppError::Prediction)?;
            print_json(&stats)
        }
        Command::AddUser { id, email, tier } => {
            let existing = storage
                .get_user(&id)
                .await
                .change_context(AppError::Storage)?;
            let user = User {
                created_at: existing
                    .map(|u| u.created_at)
                    .unwrap_or_else(|| Utc::now().trunc_subsecs(6)),
                id,
                email,
                tier,
            };
            storage
                .upsert_user(&user)
                .await
                .change_context(AppError::Storage)?;
            info!(user = %user.id, tier = %user.tier, "user saved");
            print_json(&user)
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    // stdout carries command output, so logs go to stderr
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn resolve_user(storage: &dyn Storage, id: &str) -> Result<User, Report<AppError>> {
    storage
        .get_user(id)
        .await
        .change_context(AppError::Storage)?
        .ok_or_else(|| Report::new(AppError::UnknownUser).attach(format!("user id: {id}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Report<AppError>> {
    let json = serde_json::to_string_pretty(value).change_context(AppError::Output)?;
    println!("{json}");
    Ok(())
}

fn parse_ticker(s: &str) -> Result<String, String> {
    normalize_ticker(s).ok_or_else(|| {
        format!("invalid ticker \"{s}\" (1-12 letters, digits or . - ^ =)")
    })
}

fn parse_timeframe(s: &str) -> Result<Timeframe, String> {
    Timeframe::from_str(s).ok_or_else(|| format!("unknown timeframe \"{s}\" (expected 1d, 1w, 1m)"))
}

fn parse_tier(s: &str) -> Result<SubscriptionTier, String> {
    SubscriptionTier::from_str(s)
        .ok_or_else(|| format!("unknown tier \"{s}\" (expected free, pro, elite)"))
}
