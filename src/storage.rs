pub mod sqlite;

use chrono::{DateTime, Utc};
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::StorageError;
use crate::model::{PredictionRecord, TickerCount, User};

pub trait Storage: Send + Sync {
    fn upsert_user(&self, user: &User) -> BoxFuture<'_, Result<(), Report<StorageError>>>;

    /// Resolve a caller id to its user, tier included.
    fn get_user(&self, id: &str) -> BoxFuture<'_, Result<Option<User>, Report<StorageError>>>;

    /// Append `record` unless its user already has `cap` predictions at or
    /// after `since`.
    ///
    /// The count and the insert run as one statement, so concurrent callers
    /// cannot push a user past the cap. Returns `None` when the cap is reached.
    fn append_prediction(
        &self,
        record: &PredictionRecord,
        since: DateTime<Utc>,
        cap: u32,
    ) -> BoxFuture<'_, Result<Option<String>, Report<StorageError>>>;

    fn count_predictions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, Report<StorageError>>>;

    fn count_all_predictions(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, Result<u64, Report<StorageError>>>;

    fn get_prediction(
        &self,
        id: &str,
    ) -> BoxFuture<'_, Result<Option<PredictionRecord>, Report<StorageError>>>;

    /// Newest first, optionally restricted to one ticker.
    fn list_predictions(
        &self,
        user_id: &str,
        ticker: Option<&str>,
        skip: usize,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<PredictionRecord>, Report<StorageError>>>;

    /// Most predicted tickers for a user, highest count first.
    fn top_tickers(
        &self,
        user_id: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TickerCount>, Report<StorageError>>>;
}
