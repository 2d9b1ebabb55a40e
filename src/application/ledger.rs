use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::event::EventId;
use crate::domain::ports::{
    EventStoreRef, GatewayNotification, GatewayOrder, PaymentGatewayRef, ProfileStoreRef,
    RegistrationStoreRef, TeamStoreRef,
};
use crate::domain::profile::ProfileId;
use crate::domain::registration::{Registration, RegistrationId};
use crate::domain::team::{Team, TeamId};
use crate::error::{FestError, Result};

/// All gateway orders are denominated in INR minor units (paise).
pub const CURRENCY: &str = "INR";

/// Result of a registration attempt.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// Free event: settled immediately, team locked.
    Settled(Registration),
    /// Paid event: order created; payment completes out of band and lands via
    /// webhook.
    OrderCreated {
        registration: Registration,
        order: GatewayOrder,
    },
}

/// Owns registration records and their payment state transitions.
///
/// The webhook is the single source of truth for `Paid`; deliveries may be
/// duplicated, so every mutation here is written to converge when replayed.
pub struct RegistrationLedger {
    profiles: ProfileStoreRef,
    teams: TeamStoreRef,
    events: EventStoreRef,
    registrations: RegistrationStoreRef,
    gateway: PaymentGatewayRef,
}

impl RegistrationLedger {
    pub fn new(
        profiles: ProfileStoreRef,
        teams: TeamStoreRef,
        events: EventStoreRef,
        registrations: RegistrationStoreRef,
        gateway: PaymentGatewayRef,
    ) -> Self {
        Self {
            profiles,
            teams,
            events,
            registrations,
            gateway,
        }
    }

    /// Registers the caller's team for an event. Only the team leader may
    /// initiate this.
    pub async fn register(
        &self,
        leader: &ProfileId,
        event_id: &EventId,
        selected_members: Option<Vec<ProfileId>>,
    ) -> Result<RegisterOutcome> {
        let leader_profile = self
            .profiles
            .get(leader)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no profile with id {leader}")))?;
        let team_id = leader_profile.current_team.ok_or_else(|| {
            FestError::Forbidden(format!(
                "{} does not belong to any team",
                leader_profile.display_name
            ))
        })?;
        let team = self
            .teams
            .get(&team_id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no team with id {team_id}")))?;
        if !team.is_leader(leader) {
            return Err(FestError::Forbidden(format!(
                "only the leader of team '{}' may register it for events",
                team.name
            )));
        }

        let event = self
            .events
            .get(event_id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no event with id {event_id}")))?;
        if !event.is_live {
            return Err(FestError::Validation(format!(
                "event '{}' is not open for registration",
                event.name
            )));
        }
        if event.deadline_passed(Utc::now()) {
            return Err(FestError::DeadlinePassed);
        }
        if !event.accepts_team_of(team.members.len()) {
            return Err(FestError::Validation(format!(
                "event '{}' requires {} to {} members, team '{}' has {}",
                event.name,
                event.min_team_size,
                event.max_team_size,
                team.name,
                team.members.len()
            )));
        }

        let selected = match selected_members {
            Some(selected) => {
                for member in &selected {
                    if !team.is_member(member) {
                        return Err(FestError::Validation(format!(
                            "selected profile {member} is not a member of team '{}'",
                            team.name
                        )));
                    }
                }
                selected
            }
            None => team.members.clone(),
        };

        let existing = self
            .registrations
            .find_by_team_event(&team.id, event_id)
            .await?;
        if let Some(reg) = &existing
            && reg.status.is_settled()
        {
            return Err(FestError::Conflict(format!(
                "team '{}' is already registered for event '{}'",
                team.name, event.name
            )));
        }
        if let Some(cap) = event.max_registrations
            && self.registrations.count_settled(event_id).await? >= cap
        {
            return Err(FestError::CapacityExceeded(format!(
                "event '{}' has reached its registration capacity of {cap}",
                event.name
            )));
        }

        // Re-registration after a failure reuses the same logical record.
        let mut registration = existing.unwrap_or_else(|| {
            Registration::new(team.id.clone(), event_id.clone(), event.fee, selected.clone())
        });
        registration.amount_expected = event.fee;
        registration.selected_members = selected;

        if event.is_free() {
            registration.settle_free();
            self.registrations.store(registration.clone()).await?;
            // Lock only once the paid write has landed; a crash in between
            // leaves a paid-but-unlocked team, which a retry repairs.
            self.lock_team(team).await?;
            info!(event = %event_id, team = %registration.team, "free event registration settled");
            return Ok(RegisterOutcome::Settled(registration));
        }

        // The order is obtained before any write, so a gateway failure leaves
        // no registration state behind.
        let amount_minor = event.fee_minor_units()?;
        let order = self
            .gateway
            .create_order(amount_minor, CURRENCY, registration.id.as_str())
            .await?;
        registration.record_order(order.order_id.clone());
        self.registrations.store(registration.clone()).await?;
        info!(event = %event_id, order = %order.order_id, "payment order created");
        Ok(RegisterOutcome::OrderCreated {
            registration,
            order,
        })
    }

    /// Applies a signature-verified gateway notification. Safe to call more
    /// than once with the same delivery.
    pub async fn apply_notification(&self, notification: GatewayNotification) -> Result<()> {
        match notification {
            GatewayNotification::PaymentCaptured {
                order_id,
                payment_id,
                amount_minor,
            } => {
                let mut reg = self.registration_for_order(&order_id).await?;
                let amount = Decimal::from(amount_minor) / Decimal::from(100);
                if !reg.capture(&payment_id, amount) {
                    info!(order_id, payment_id, "duplicate capture delivery ignored");
                    return Ok(());
                }
                self.registrations.store(reg.clone()).await?;
                // Lock after the paid write has landed (see register()).
                if let Some(team) = self.teams.get(&reg.team).await? {
                    self.lock_team(team).await?;
                }
                info!(order_id, payment_id, "payment captured");
                Ok(())
            }
            GatewayNotification::PaymentFailed {
                order_id, error, ..
            } => {
                let mut reg = self.registration_for_order(&order_id).await?;
                if !reg.fail(error) {
                    info!(order_id, "stale failure delivery ignored");
                    return Ok(());
                }
                warn!(order_id, "payment failed");
                self.registrations.store(reg).await?;
                // The team stays unlocked and mutable.
                Ok(())
            }
            GatewayNotification::RefundCreated {
                payment_id,
                refund_id,
            } => {
                let mut reg = self
                    .registrations
                    .find_by_payment_id(&payment_id)
                    .await?
                    .ok_or_else(|| {
                        FestError::NotFound(format!("no registration for payment {payment_id}"))
                    })?;
                reg.refund();
                self.registrations.store(reg).await?;
                // Deliberately no unlock: an automatic unlock would race with
                // an in-progress second registration attempt.
                info!(payment_id, refund_id, "refund recorded");
                Ok(())
            }
        }
    }

    /// Administrator asserts out-of-band payment proof for a registration.
    pub async fn mark_manual_verified(&self, id: &RegistrationId) -> Result<Registration> {
        let mut reg = self
            .registrations
            .get(id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no registration with id {id}")))?;
        reg.mark_manual_verified();
        self.registrations.store(reg.clone()).await?;
        if let Some(team) = self.teams.get(&reg.team).await? {
            self.lock_team(team).await?;
        }
        Ok(reg)
    }

    /// Administrative override reversing a payment lock.
    pub async fn unlock_team(&self, team_id: &TeamId) -> Result<()> {
        let mut team = self
            .teams
            .get(team_id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no team with id {team_id}")))?;
        team.unlock();
        self.teams.store(team).await
    }

    async fn lock_team(&self, mut team: Team) -> Result<()> {
        if !team.locked {
            team.lock();
            self.teams.store(team).await?;
        }
        Ok(())
    }

    async fn registration_for_order(&self, order_id: &str) -> Result<Registration> {
        self.registrations
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no registration for order {order_id}")))
    }
}
