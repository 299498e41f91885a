use skyfare_core::search::days_in_range;
use skyfare_core::{FareQuote, QuoteProvider, RangeSearchRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Expands a date range into one provider call per day, paced so the shared
/// provider quota is never burst.
#[derive(Clone)]
pub struct RangeSearchEngine {
    provider: Arc<dyn QuoteProvider>,
    pacing: Duration,
}

impl RangeSearchEngine {
    pub fn new(provider: Arc<dyn QuoteProvider>, pacing: Duration) -> Self {
        Self { provider, pacing }
    }

    /// All fares for the range, unsorted, each tagged with its search day.
    pub async fn search_range(&self, request: &RangeSearchRequest) -> Vec<FareQuote> {
        self.search_range_until(request, &CancellationToken::new()).await
    }

    /// Like [`search_range`](Self::search_range) but stops at the next day
    /// boundary once `cancel` fires, returning what was collected so far.
    pub async fn search_range_until(
        &self,
        request: &RangeSearchRequest,
        cancel: &CancellationToken,
    ) -> Vec<FareQuote> {
        let mut results = Vec::new();

        for (index, day) in days_in_range(request.start_date, request.end_date).enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.pacing) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            let fetch = self.provider.fetch_day(
                &request.origin,
                &request.destination,
                day,
                request.passengers,
            );
            let fares = tokio::select! {
                fares = fetch => fares,
                _ = cancel.cancelled() => break,
            };

            debug!(%day, count = fares.len(), "Range search day done");
            results.extend(fares.into_iter().map(|fare| fare.on_day(day)));
        }

        results
    }
}
