use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::iata::AirportCode;
use crate::search::FareQuote;

/// One fare item exactly as the pricing provider reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFare {
    pub origin: String,
    pub destination: String,
    pub departure_at: String,
    pub price: Option<i64>,
    pub airline: Option<String>,
    pub link: Option<String>,
}

impl ProviderFare {
    /// Tags the fare with the calendar day whose query produced it.
    pub fn on_day(self, search_date: NaiveDate) -> FareQuote {
        FareQuote {
            origin: self.origin,
            destination: self.destination,
            departure_at: self.departure_at,
            price: self.price,
            airline: self.airline,
            link: self.link,
            search_date,
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch every fare for one route on one day.
    ///
    /// Never fails: transient errors are retried internally and an exhausted
    /// retry budget is reported as an empty list, the same as a day without
    /// availability.
    async fn fetch_day(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
        passengers: u32,
    ) -> Vec<ProviderFare>;
}
