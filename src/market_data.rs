pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::MarketDataError;
use crate::model::{Lookback, PriceSeries};

/// Source of historical daily prices.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketData`).
pub trait MarketData: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the close/volume history of `ticker`, oldest first.
    ///
    /// An unknown ticker yields an empty series rather than an error.
    fn fetch_history(
        &self,
        ticker: &str,
        lookback: Lookback,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<MarketDataError>>>;
}
