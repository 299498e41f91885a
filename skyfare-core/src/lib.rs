pub mod alert;
pub mod iata;
pub mod notify;
pub mod repository;
pub mod retry;
pub mod search;
pub mod supplier;

pub use alert::{AlertId, AlertSubscription, NewAlert, OwnerId, ValidationError};
pub use iata::AirportCode;
pub use notify::{DeliveryError, NotificationSink};
pub use repository::AlertRepository;
pub use search::{FareQuote, RangeSearchRequest};
pub use supplier::{ProviderFare, QuoteProvider};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Calendar day used for "not in the past" checks and expiry sweeps.
pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
