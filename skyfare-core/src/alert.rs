use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::iata::AirportCode;

/// Opaque identifier of the chat user that owns a subscription.
pub type OwnerId = i64;
pub type AlertId = i64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid airport code '{0}', expected three letters such as MOW")]
    InvalidAirportCode(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date {date} is in the past (today is {today})")]
    DateInPast { date: NaiveDate, today: NaiveDate },
    #[error("end date {end} is before start date {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("price threshold must be a positive number, got {0}")]
    NonPositiveThreshold(i64),
    #[error("passenger count must be at least 1, got {0}")]
    InvalidPassengers(i64),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.trim().to_string()))
}

/// Parses a date that must not be before `today`.
pub fn parse_future_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = parse_date(raw)?;
    if date < today {
        return Err(ValidationError::DateInPast { date, today });
    }
    Ok(date)
}

/// A persisted price-alert subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSubscription {
    pub id: AlertId,
    pub owner_id: OwnerId,
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub passengers: u32,
    pub threshold_price: i64,
    pub created_at: DateTime<Utc>,
}

impl AlertSubscription {
    /// True once the whole date range lies before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date < today
    }

    /// Days still worth searching: `[max(start, today), end]`, or `None` when
    /// nothing of the range is left.
    pub fn effective_window(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start_date.max(today);
        if start > self.end_date {
            None
        } else {
            Some((start, self.end_date))
        }
    }
}

/// Input for creating a subscription. Validated before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub owner_id: OwnerId,
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub passengers: u32,
    pub threshold_price: i64,
}

impl NewAlert {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if self.start_date < today {
            return Err(ValidationError::DateInPast {
                date: self.start_date,
                today,
            });
        }
        if self.end_date < self.start_date {
            return Err(ValidationError::InvertedRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.passengers < 1 {
            return Err(ValidationError::InvalidPassengers(i64::from(self.passengers)));
        }
        if self.threshold_price <= 0 {
            return Err(ValidationError::NonPositiveThreshold(self.threshold_price));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn new_alert(start: &str, end: &str, threshold: i64) -> NewAlert {
        NewAlert {
            owner_id: 42,
            origin: AirportCode::parse("MOW").unwrap(),
            destination: AirportCode::parse("LED").unwrap(),
            start_date: date(start),
            end_date: date(end),
            passengers: 1,
            threshold_price: threshold,
        }
    }

    fn subscription(start: &str, end: &str) -> AlertSubscription {
        AlertSubscription {
            id: 1,
            owner_id: 42,
            origin: AirportCode::parse("MOW").unwrap(),
            destination: AirportCode::parse("LED").unwrap(),
            start_date: date(start),
            end_date: date(end),
            passengers: 1,
            threshold_price: 5000,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_alert_passes() {
        let alert = new_alert("2025-09-10", "2025-09-12", 5000);
        assert!(alert.validate(date("2025-09-01")).is_ok());
    }

    #[test]
    fn test_single_day_range_is_valid() {
        let alert = new_alert("2025-09-10", "2025-09-10", 5000);
        assert!(alert.validate(date("2025-09-10")).is_ok());
    }

    #[test]
    fn test_past_start_rejected() {
        let alert = new_alert("2025-01-01", "2025-01-05", 5000);
        let err = alert.validate(date("2025-06-01")).unwrap_err();
        assert!(matches!(err, ValidationError::DateInPast { .. }));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let alert = new_alert("2025-09-12", "2025-09-10", 5000);
        let err = alert.validate(date("2025-09-01")).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedRange { .. }));
    }

    #[test]
    fn test_threshold_must_be_positive() {
        let today = date("2025-09-01");
        assert_eq!(
            new_alert("2025-09-10", "2025-09-12", 0).validate(today),
            Err(ValidationError::NonPositiveThreshold(0))
        );
        assert!(new_alert("2025-09-10", "2025-09-12", -10).validate(today).is_err());
    }

    #[test]
    fn test_zero_passengers_rejected() {
        let mut alert = new_alert("2025-09-10", "2025-09-12", 5000);
        alert.passengers = 0;
        assert_eq!(
            alert.validate(date("2025-09-01")),
            Err(ValidationError::InvalidPassengers(0))
        );
    }

    #[test]
    fn test_parse_date_is_strict() {
        assert!(parse_date("2025-09-10").is_ok());
        assert!(parse_date("10.09.2025").is_err());
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_future_date("2025-09-09", date("2025-09-10")).is_err());
    }

    #[test]
    fn test_effective_window_clamps_to_today() {
        let sub = subscription("2025-09-10", "2025-09-15");
        assert_eq!(
            sub.effective_window(date("2025-09-12")),
            Some((date("2025-09-12"), date("2025-09-15")))
        );
        // Future start is searched as-is.
        assert_eq!(
            sub.effective_window(date("2025-09-01")),
            Some((date("2025-09-10"), date("2025-09-15")))
        );
        assert_eq!(sub.effective_window(date("2025-09-16")), None);
    }

    #[test]
    fn test_expiry_is_strictly_after_end_date() {
        let sub = subscription("2025-09-10", "2025-09-15");
        assert!(!sub.is_expired(date("2025-09-15")));
        assert!(sub.is_expired(date("2025-09-16")));
    }
}
