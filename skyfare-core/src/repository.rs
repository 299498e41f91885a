use async_trait::async_trait;
use chrono::NaiveDate;

use crate::alert::{AlertId, AlertSubscription, NewAlert, OwnerId};
use crate::CoreResult;

/// Durable storage for alert subscriptions.
///
/// Every method is one atomic unit against the store; callers may use it
/// concurrently from the monitor and from interactive requests.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Validates and inserts a subscription, assigning a fresh id.
    async fn create(&self, alert: NewAlert) -> CoreResult<AlertSubscription>;

    /// Every subscription regardless of owner, in id order.
    async fn list_all(&self) -> CoreResult<Vec<AlertSubscription>>;

    async fn list_by_owner(&self, owner_id: OwnerId) -> CoreResult<Vec<AlertSubscription>>;

    /// Deletes `id` only when it belongs to `owner_id`. Returns whether a
    /// subscription was removed.
    async fn delete_by_owner(&self, id: AlertId, owner_id: OwnerId) -> CoreResult<bool>;

    /// Unconditional delete, used when the owner can no longer be reached.
    async fn delete(&self, id: AlertId) -> CoreResult<bool>;

    /// Deletes subscriptions whose end date is strictly before `today`.
    async fn purge_expired(&self, today: NaiveDate) -> CoreResult<u64>;

    async fn count_all(&self) -> CoreResult<i64>;
}
