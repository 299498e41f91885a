use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use skyfare_core::alert::{AlertId, AlertSubscription, NewAlert, OwnerId};
use skyfare_core::repository::AlertRepository;
use skyfare_core::{today, AirportCode, CoreError, CoreResult};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

const ALERT_COLUMNS: &str =
    "id, owner_id, origin, destination, start_date, end_date, passengers, threshold_price, created_at";

pub struct SqliteAlertRepository {
    pub pool: SqlitePool,
}

impl SqliteAlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts after validating against an explicit `today`.
    pub async fn create_as_of(&self, alert: NewAlert, today: NaiveDate) -> CoreResult<AlertSubscription> {
        alert.validate(today)?;

        let sql = format!(
            "INSERT INTO alerts (owner_id, origin, destination, start_date, end_date, passengers, threshold_price, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {ALERT_COLUMNS}"
        );
        let row: AlertRow = sqlx::query_as(&sql)
            .bind(alert.owner_id)
            .bind(alert.origin.as_str())
            .bind(alert.destination.as_str())
            .bind(alert.start_date)
            .bind(alert.end_date)
            .bind(i64::from(alert.passengers))
            .bind(alert.threshold_price)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        let created = AlertSubscription::try_from(row)?;
        info!(
            alert_id = created.id,
            owner_id = created.owner_id,
            route = %format!("{}-{}", created.origin, created.destination),
            "Alert created"
        );
        Ok(created)
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    owner_id: i64,
    origin: String,
    destination: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    passengers: i64,
    threshold_price: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for AlertSubscription {
    type Error = CoreError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| CoreError::Storage(format!("alert {} is corrupt: {}", row.id, what));

        let passengers = u32::try_from(row.passengers)
            .map_err(|_| corrupt(format!("passenger count {}", row.passengers)))?;
        let origin = AirportCode::parse(&row.origin).map_err(|e| corrupt(e.to_string()))?;
        let destination = AirportCode::parse(&row.destination).map_err(|e| corrupt(e.to_string()))?;

        Ok(AlertSubscription {
            id: row.id,
            owner_id: row.owner_id,
            origin,
            destination,
            start_date: row.start_date,
            end_date: row.end_date,
            passengers,
            threshold_price: row.threshold_price,
            created_at: row.created_at,
        })
    }
}

fn storage_error(err: sqlx::Error) -> CoreError {
    CoreError::Storage(err.to_string())
}

/// Rows that no longer decode are logged and left out, so one bad record
/// cannot hide the rest.
fn into_subscriptions(rows: Vec<AlertRow>) -> Vec<AlertSubscription> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match AlertSubscription::try_from(row) {
                Ok(alert) => Some(alert),
                Err(err) => {
                    error!(alert_id = id, error = %err, "Skipping unreadable alert row");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn create(&self, alert: NewAlert) -> CoreResult<AlertSubscription> {
        self.create_as_of(alert, today()).await
    }

    async fn list_all(&self) -> CoreResult<Vec<AlertSubscription>> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY id");
        let rows: Vec<AlertRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(into_subscriptions(rows))
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> CoreResult<Vec<AlertSubscription>> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE owner_id = ? ORDER BY id");
        let rows: Vec<AlertRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(into_subscriptions(rows))
    }

    async fn delete_by_owner(&self, id: AlertId, owner_id: OwnerId) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        let removed = result.rows_affected() > 0;
        debug!(alert_id = id, owner_id, removed, "Delete by owner");
        Ok(removed)
    }

    async fn delete(&self, id: AlertId) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, today: NaiveDate) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM alerts WHERE end_date < ?")
            .bind(today)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, %today, "Expired alerts purged");
        }
        Ok(purged)
    }

    async fn count_all(&self) -> CoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(count)
    }
}
