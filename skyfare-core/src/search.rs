use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::iata::AirportCode;

/// Rank assigned to fares without a price so they sort after every priced
/// fare. Only used for ordering, never for threshold checks.
pub const MISSING_PRICE_RANK: i64 = 999_999;

pub const AIRLINE_PLACEHOLDER: &str = "—";

#[derive(Debug, Clone)]
pub struct RangeSearchRequest {
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub passengers: u32,
}

/// A fare returned for one searched day. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareQuote {
    pub origin: String,
    pub destination: String,
    pub departure_at: String,
    pub price: Option<i64>,
    pub airline: Option<String>,
    pub link: Option<String>,
    pub search_date: NaiveDate,
}

impl FareQuote {
    pub fn ranking_price(&self) -> i64 {
        self.price.unwrap_or(MISSING_PRICE_RANK)
    }

    /// A fare matches only when it has a price at or below the ceiling.
    pub fn matches_threshold(&self, threshold: i64) -> bool {
        matches!(self.price, Some(price) if price <= threshold)
    }

    pub fn airline_display(&self) -> &str {
        self.airline.as_deref().unwrap_or(AIRLINE_PLACEHOLDER)
    }

    pub fn deep_link(&self, base_url: &str) -> String {
        format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            self.link.as_deref().unwrap_or("")
        )
    }
}

/// Every calendar day from `start` to `end` inclusive; empty when inverted.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Cheapest first, unpriced fares last, keeping at most `limit`.
pub fn rank_cheapest(mut quotes: Vec<FareQuote>, limit: usize) -> Vec<FareQuote> {
    quotes.sort_by_key(FareQuote::ranking_price);
    quotes.truncate(limit);
    quotes
}

/// Fares at or below `threshold`, cheapest first, capped at `cap`.
pub fn select_matches(quotes: Vec<FareQuote>, threshold: i64, cap: usize) -> Vec<FareQuote> {
    let matching = quotes
        .into_iter()
        .filter(|quote| quote.matches_threshold(threshold))
        .collect();
    rank_cheapest(matching, cap)
}
