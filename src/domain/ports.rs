use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::event::{Event, EventId};
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::registration::{Registration, RegistrationId};
use crate::domain::team::{Team, TeamId};
use crate::error::Result;

/// All `store` methods are whole-document upserts; the stores guarantee
/// atomicity per document and nothing across documents.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn store(&self, profile: Profile) -> Result<()>;
    async fn get(&self, id: &ProfileId) -> Result<Option<Profile>>;
    async fn find_by_principal(&self, principal_id: &str) -> Result<Option<Profile>>;
    /// Case-insensitive match on display name or email.
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>>;
    async fn all(&self) -> Result<Vec<Profile>>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn store(&self, team: Team) -> Result<()>;
    async fn get(&self, id: &TeamId) -> Result<Option<Team>>;
    /// Case-insensitive name lookup, used for uniqueness checks.
    async fn find_by_name(&self, name: &str) -> Result<Option<Team>>;
    async fn delete(&self, id: &TeamId) -> Result<()>;
    async fn all(&self) -> Result<Vec<Team>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn store(&self, event: Event) -> Result<()>;
    async fn get(&self, id: &EventId) -> Result<Option<Event>>;
    async fn all(&self) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn store(&self, registration: Registration) -> Result<()>;
    async fn get(&self, id: &RegistrationId) -> Result<Option<Registration>>;
    async fn find_by_team_event(
        &self,
        team: &TeamId,
        event: &EventId,
    ) -> Result<Option<Registration>>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Registration>>;
    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Registration>>;
    /// Number of settled (paid or manually verified) registrations for an
    /// event, used for capacity checks.
    async fn count_settled(&self, event: &EventId) -> Result<u32>;
    async fn all(&self) -> Result<Vec<Registration>>;
}

/// Gateway order as returned by the payment processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount_minor: u64,
    pub currency: String,
}

/// A verified notification from the payment gateway. Deliveries may be
/// duplicated; handlers must be idempotent.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayNotification {
    PaymentCaptured {
        order_id: String,
        payment_id: String,
        amount_minor: u64,
    },
    PaymentFailed {
        order_id: String,
        payment_id: Option<String>,
        error: Option<String>,
    },
    RefundCreated {
        payment_id: String,
        refund_id: String,
    },
}

/// Boundary to the external payment processor. Order creation is the only
/// outbound call; everything else arrives as signed webhooks.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder>;
}

pub type ProfileStoreRef = Arc<dyn ProfileStore>;
pub type TeamStoreRef = Arc<dyn TeamStore>;
pub type EventStoreRef = Arc<dyn EventStore>;
pub type RegistrationStoreRef = Arc<dyn RegistrationStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
