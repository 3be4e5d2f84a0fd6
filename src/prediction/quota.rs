use chrono::{DateTime, Duration, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;

use crate::config::RateLimits;
use crate::error::PredictionError;
use crate::model::User;
use crate::storage::Storage;

/// Length of the rolling window the daily cap applies to.
const WINDOW_HOURS: i64 = 24;

/// Predictions already made in the current window against the tier cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: u64,
    pub limit: u32,
}

impl QuotaUsage {
    pub fn remaining(&self) -> u64 {
        u64::from(self.limit).saturating_sub(self.used)
    }
}

/// Start of the rolling quota window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(WINDOW_HOURS)
}

/// Check whether `user` may make another prediction at `now`.
///
/// Returns the current usage when below the cap, `RateLimited` otherwise.
/// This is a read-then-decide pre-check; the cap is enforced atomically when
/// the prediction is appended.
pub fn check_quota<'a>(
    storage: &'a dyn Storage,
    user: &'a User,
    limits: &'a RateLimits,
    now: DateTime<Utc>,
) -> BoxFuture<'a, Result<QuotaUsage, Report<PredictionError>>> {
    Box::pin(async move {
        let limit = limits.limit_for(user.tier);
        let used = storage
            .count_predictions(&user.id, window_start(now))
            .await
            .change_context(PredictionError::Storage)?;

        if used >= u64::from(limit) {
            return Err(Report::new(PredictionError::RateLimited {
                limit,
                tier: user.tier,
            })
            .attach(format!("user: {}, used: {used}", user.id)));
        }
        Ok(QuotaUsage { used, limit })
    })
}
