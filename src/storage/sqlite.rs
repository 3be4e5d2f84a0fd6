use chrono::{DateTime, SecondsFormat, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::path::Path;
use std::str::FromStr;

use crate::error::StorageError;
use crate::model::{
    Direction, FeatureVector, PredictionOutcome, PredictionRecord, SubscriptionTier, TickerCount,
    Timeframe, User,
};
use crate::storage::Storage;

type PredictionRow = (
    String,
    String,
    String,
    String,
    f64,
    f64,
    String,
    String,
    f64,
    f64,
    String,
);

type UserRow = (String, String, String, String);

const PREDICTION_COLUMNS: &str = "id, user_id, ticker, direction, probability, confidence, \
     timeframe, features, target_price, stop_loss, created_at";

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, Report<StorageError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(StorageError::Migration)
                .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(StorageError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(StorageError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, Report<StorageError>> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(StorageError::Migration)?;

        Ok(Self { pool })
    }
}

impl Storage for SqliteStorage {
    fn upsert_user(&self, user: &User) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let user = user.clone();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO users (id, email, tier, created_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (id) DO UPDATE SET email = excluded.email, tier = excluded.tier",
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(user.tier.as_str())
            .bind(format_time(user.created_at))
            .execute(&self.pool)
            .await
            .change_context(StorageError::Insert)
            .attach_with(|| format!("user: {}", user.id))?;
            Ok(())
        })
    }

    fn get_user(&self, id: &str) -> BoxFuture<'_, Result<Option<User>, Report<StorageError>>> {
        let id = id.to_string();
        Box::pin(async move {
            let row: Option<UserRow> =
                sqlx::query_as("SELECT id, email, tier, created_at FROM users WHERE id = ?")
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await
                    .change_context(StorageError::Query)?;

            row.map(map_user_row).transpose()
        })
    }

    fn append_prediction(
        &self,
        record: &PredictionRecord,
        since: DateTime<Utc>,
        cap: u32,
    ) -> BoxFuture<'_, Result<Option<String>, Report<StorageError>>> {
        let record = record.clone();
        Box::pin(async move {
            let features =
                serde_json::to_string(&record.features).change_context(StorageError::Insert)?;

            let result = sqlx::query(
                "INSERT INTO predictions \
                 (id, user_id, ticker, direction, probability, confidence, timeframe, features, \
                  target_price, stop_loss, created_at) \
                 SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ? \
                 WHERE (SELECT COUNT(*) FROM predictions WHERE user_id = ? AND created_at >= ?) < ?",
            )
            .bind(&record.id)
            .bind(&record.user_id)
            .bind(&record.ticker)
            .bind(record.outcome.direction.as_str())
            .bind(record.outcome.probability)
            .bind(record.outcome.confidence)
            .bind(record.timeframe.as_str())
            .bind(&features)
            .bind(record.outcome.target_price)
            .bind(record.outcome.stop_loss)
            .bind(format_time(record.created_at))
            .bind(&record.user_id)
            .bind(format_time(since))
            .bind(i64::from(cap))
            .execute(&self.pool)
            .await
            .change_context(StorageError::Insert)
            .attach_with(|| format!("prediction: {}", record.id))?;

            if result.rows_affected() == 0 {
                return Ok(None);
            }
            Ok(Some(record.id))
        })
    }

    fn count_predictions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, Report<StorageError>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM predictions WHERE user_id = ? AND created_at >= ?",
            )
            .bind(&user_id)
            .bind(format_time(since))
            .fetch_one(&self.pool)
            .await
            .change_context(StorageError::Query)?;

            Ok(count.max(0) as u64)
        })
    }

    fn count_all_predictions(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, Result<u64, Report<StorageError>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM predictions WHERE user_id = ?")
                    .bind(&user_id)
                    .fetch_one(&self.pool)
                    .await
                    .change_context(StorageError::Query)?;

            Ok(count.max(0) as u64)
        })
    }

    fn get_prediction(
        &self,
        id: &str,
    ) -> BoxFuture<'_, Result<Option<PredictionRecord>, Report<StorageError>>> {
        let id = id.to_string();
        Box::pin(async move {
            let sql = format!("SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = ? LIMIT 1");
            let row: Option<PredictionRow> = sqlx::query_as(&sql)
                .bind(&id)
                .fetch_optional(&self.pool)
                .await
                .change_context(StorageError::Query)?;

            row.map(map_prediction_row).transpose()
        })
    }

    fn list_predictions(
        &self,
        user_id: &str,
        ticker: Option<&str>,
        skip: usize,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<PredictionRecord>, Report<StorageError>>> {
        let user_id = user_id.to_string();
        let ticker = ticker.map(str::to_string);
        Box::pin(async move {
            let sql = format!(
                "SELECT {PREDICTION_COLUMNS} FROM predictions \
                 WHERE user_id = ? AND (? IS NULL OR ticker = ?) \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT ? OFFSET ?"
            );
            let rows: Vec<PredictionRow> = sqlx::query_as(&sql)
                .bind(&user_id)
                .bind(&ticker)
                .bind(&ticker)
                .bind(limit as i64)
                .bind(skip as i64)
                .fetch_all(&self.pool)
                .await
                .change_context(StorageError::Query)?;

            rows.into_iter().map(map_prediction_row).collect()
        })
    }

    fn top_tickers(
        &self,
        user_id: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TickerCount>, Report<StorageError>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let rows: Vec<(String, i64)> = sqlx::query_as(
                "SELECT ticker, COUNT(*) AS n FROM predictions \
                 WHERE user_id = ? \
                 GROUP BY ticker \
                 ORDER BY n DESC, ticker ASC \
                 LIMIT ?",
            )
            .bind(&user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .change_context(StorageError::Query)?;

            Ok(rows
                .into_iter()
                .map(|(ticker, n)| TickerCount {
                    ticker,
                    count: n.max(0) as u64,
                })
                .collect())
        })
    }
}

fn map_user_row((id, email, tier, created_at): UserRow) -> Result<User, Report<StorageError>> {
    let tier = SubscriptionTier::from_str(&tier).ok_or_else(|| {
        Report::new(StorageError::Query).attach(format!("unknown tier \"{tier}\" for user {id}"))
    })?;
    Ok(User {
        created_at: parse_time_utc(&created_at)?,
        id,
        email,
        tier,
    })
}

fn map_prediction_row(
    (
        id,
        user_id,
        ticker,
        direction,
        probability,
        confidence,
        timeframe,
        features,
        target_price,
        stop_loss,
        created_at,
    ): PredictionRow,
) -> Result<PredictionRecord, Report<StorageError>> {
    let direction = Direction::from_str(&direction).ok_or_else(|| {
        Report::new(StorageError::Query).attach(format!("unknown direction \"{direction}\""))
    })?;
    let timeframe = Timeframe::from_str(&timeframe).ok_or_else(|| {
        Report::new(StorageError::Query).attach(format!("unknown timeframe \"{timeframe}\""))
    })?;
    let features: FeatureVector = serde_json::from_str(&features)
        .change_context(StorageError::Query)
        .attach_with(|| format!("features of prediction {id}"))?;

    Ok(PredictionRecord {
        created_at: parse_time_utc(&created_at)?,
        id,
        user_id,
        ticker,
        timeframe,
        outcome: PredictionOutcome {
            direction,
            probability,
            confidence,
            target_price,
            stop_loss,
        },
        features,
    })
}

/// Fixed-width UTC timestamp, so text comparison in SQL is chronological.
fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time_utc(value: &str) -> Result<DateTime<Utc>, Report<StorageError>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .change_context(StorageError::Query)
        .attach_with(|| format!("timestamp: {value}"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    /// Single-connection in-memory database with migrations applied.
    pub async fn in_memory_storage() -> SqliteStorage {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        SqliteStorage::from_pool(pool).await.unwrap()
    }
}
