#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::{NaiveDate, Utc};
use skyfare_core::{
    AirportCode, AlertId, AlertRepository, AlertSubscription, CoreError, CoreResult,
    DeliveryError, NewAlert, NotificationSink, OwnerId, ProviderFare, QuoteProvider,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn code(s: &str) -> AirportCode {
    AirportCode::parse(s).unwrap()
}

pub fn subscription(owner_id: OwnerId, start: &str, end: &str, threshold: i64) -> AlertSubscription {
    AlertSubscription {
        id: 0,
        owner_id,
        origin: code("MOW"),
        destination: code("LED"),
        start_date: day(start),
        end_date: day(end),
        passengers: 1,
        threshold_price: threshold,
        created_at: Utc::now(),
    }
}

pub fn fare(date: NaiveDate, price: Option<i64>) -> ProviderFare {
    ProviderFare {
        origin: "MOW".into(),
        destination: "LED".into(),
        departure_at: format!("{date}T06:15:00+03:00"),
        price,
        airline: Some("SU".into()),
        link: Some(format!("/search/MOW{}LED1", date.format("%d%m"))),
    }
}

/// Alert store kept in a `Vec`, with switches to make calls fail.
#[derive(Default)]
pub struct MemoryAlerts {
    alerts: Mutex<Vec<AlertSubscription>>,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_count: AtomicBool,
}

impl MemoryAlerts {
    /// Stores `alert` as-is, bypassing validation, and returns its id.
    pub fn insert(&self, mut alert: AlertSubscription) -> AlertId {
        alert.id = self.next_id.fetch_add(1, Ordering::SeqCst) as AlertId + 1;
        let id = alert.id;
        self.alerts.lock().unwrap().push(alert);
        id
    }

    pub fn snapshot(&self) -> Vec<AlertSubscription> {
        self.alerts.lock().unwrap().clone()
    }

    fn unavailable() -> CoreError {
        CoreError::Storage("database is unavailable".into())
    }
}

#[async_trait]
impl AlertRepository for MemoryAlerts {
    async fn create(&self, alert: NewAlert) -> CoreResult<AlertSubscription> {
        alert.validate(skyfare_core::today())?;
        let mut stored = AlertSubscription {
            id: 0,
            owner_id: alert.owner_id,
            origin: alert.origin,
            destination: alert.destination,
            start_date: alert.start_date,
            end_date: alert.end_date,
            passengers: alert.passengers,
            threshold_price: alert.threshold_price,
            created_at: Utc::now(),
        };
        stored.id = self.insert(stored.clone());
        Ok(stored)
    }

    async fn list_all(&self) -> CoreResult<Vec<AlertSubscription>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.snapshot())
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> CoreResult<Vec<AlertSubscription>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|alert| alert.owner_id == owner_id)
            .collect())
    }

    async fn delete_by_owner(&self, id: AlertId, owner_id: OwnerId) -> CoreResult<bool> {
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|alert| !(alert.id == id && alert.owner_id == owner_id));
        Ok(alerts.len() < before)
    }

    async fn delete(&self, id: AlertId) -> CoreResult<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|alert| alert.id != id);
        Ok(alerts.len() < before)
    }

    async fn purge_expired(&self, today: NaiveDate) -> CoreResult<u64> {
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|alert| alert.end_date >= today);
        Ok((before - alerts.len()) as u64)
    }

    async fn count_all(&self) -> CoreResult<i64> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.alerts.lock().unwrap().len() as i64)
    }
}

/// Provider answering from a fixed per-day table and recording each call.
#[derive(Default)]
pub struct ScriptedProvider {
    fares: Mutex<HashMap<NaiveDate, Vec<ProviderFare>>>,
    pub calls: Mutex<Vec<NaiveDate>>,
}

impl ScriptedProvider {
    pub fn with_fare(self, date: NaiveDate, price: Option<i64>) -> Self {
        self.fares
            .lock()
            .unwrap()
            .entry(date)
            .or_default()
            .push(fare(date, price));
        self
    }

    pub fn called_days(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteProvider for ScriptedProvider {
    async fn fetch_day(
        &self,
        _origin: &AirportCode,
        _destination: &AirportCode,
        date: NaiveDate,
        _passengers: u32,
    ) -> Vec<ProviderFare> {
        self.calls.lock().unwrap().push(date);
        self.fares
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .unwrap_or_default()
    }
}

/// Sink that records delivered messages; owners listed in `failures` get
/// that error on every attempt instead.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(OwnerId, String)>>,
    pub failures: Mutex<HashMap<OwnerId, DeliveryError>>,
    pub attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn failing_for(self, owner_id: OwnerId, error: DeliveryError) -> Self {
        self.failures.lock().unwrap().insert(owner_id, error);
        self
    }

    pub fn messages_to(&self, owner_id: OwnerId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == owner_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_to(&self, owner_id: OwnerId) -> String {
        self.messages_to(owner_id).pop().unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_message(&self, recipient: OwnerId, text: &str) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().get(&recipient) {
            return Err(err.clone());
        }
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        Ok(())
    }
}

/// Serves `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
