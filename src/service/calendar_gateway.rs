use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::event::{InsertedEvent, NewEvent, RemoteEvent};
use crate::models::time::AbsoluteTime;

/// The three calendar operations the executor relies on.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Fails with `BackendUnavailable` or `BackendRejected`.
    async fn insert(&self, event: &NewEvent) -> Result<InsertedEvent, GatewayError>;

    /// Events overlapping `[from, to]`, ordered by start, recurring series
    /// expanded into single instances.
    async fn list(
        &self,
        from: &AbsoluteTime,
        to: &AbsoluteTime,
    ) -> Result<Vec<RemoteEvent>, GatewayError>;

    /// Fails with `NotFound` when the event is already gone.
    async fn delete(&self, event_id: &str) -> Result<(), GatewayError>;
}
