use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::io::BufRead;
use uuid::Uuid;

use crate::application::checkin::CheckInVerifier;
use crate::application::ledger::{RegisterOutcome, RegistrationLedger};
use crate::application::membership::{Decision, InviteTarget, MembershipBroker};
use crate::domain::event::{Event, EventId};
use crate::domain::ports::{
    EventStoreRef, ProfileStoreRef, RegistrationStoreRef, TeamStoreRef,
};
use crate::domain::profile::ProfileId;
use crate::domain::registration::Registration;
use crate::domain::team::Team;
use crate::error::{FestError, Result};
use crate::interfaces::webhook;

fn default_live() -> bool {
    true
}

/// One line of the action script. Every operation's input is an explicit
/// tagged record validated here, at the boundary, before it reaches the
/// engines. Profiles are addressed by handle (display name or email,
/// case-insensitive), teams by name, events by id.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateProfile {
        principal: String,
        name: String,
        email: String,
    },
    CreateTeam {
        leader: String,
        name: String,
    },
    Invite {
        leader: String,
        target: String,
    },
    CancelInvite {
        leader: String,
        target: String,
    },
    RequestToJoin {
        profile: String,
        team: String,
    },
    CancelRequest {
        profile: String,
        team: String,
    },
    AcceptInvitation {
        profile: String,
        team: String,
    },
    RejectInvitation {
        profile: String,
        team: String,
    },
    AcceptRequest {
        leader: String,
        profile: String,
    },
    RejectRequest {
        leader: String,
        profile: String,
    },
    Leave {
        profile: String,
    },
    AddEvent {
        id: String,
        name: String,
        #[serde(default)]
        fee: Decimal,
        min_team_size: usize,
        max_team_size: usize,
        #[serde(default)]
        max_registrations: Option<u32>,
        #[serde(default)]
        registration_deadline: Option<DateTime<Utc>>,
        #[serde(default = "default_live")]
        is_live: bool,
    },
    Register {
        leader: String,
        event: String,
        #[serde(default)]
        members: Option<Vec<String>>,
    },
    /// The driver plays the gateway: it builds the signed webhook body for the
    /// registration's current order and submits it through the verifying
    /// handler.
    PaymentCaptured {
        team: String,
        event: String,
        #[serde(default)]
        payment_id: Option<String>,
    },
    PaymentFailed {
        team: String,
        event: String,
        #[serde(default)]
        error: Option<String>,
    },
    RefundCreated {
        team: String,
        event: String,
    },
    ManualVerify {
        team: String,
        event: String,
    },
    CheckIn {
        team: String,
        event: String,
    },
}

/// Applies a script of actions against the engines, line by line.
///
/// Per-action failures are reported to stderr and processing continues, the
/// same way a request handler would reject one request without taking down the
/// service.
pub struct ScriptRunner {
    broker: MembershipBroker,
    ledger: RegistrationLedger,
    verifier: CheckInVerifier,
    profiles: ProfileStoreRef,
    teams: TeamStoreRef,
    events: EventStoreRef,
    registrations: RegistrationStoreRef,
    webhook_secret: String,
}

impl ScriptRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: MembershipBroker,
        ledger: RegistrationLedger,
        verifier: CheckInVerifier,
        profiles: ProfileStoreRef,
        teams: TeamStoreRef,
        events: EventStoreRef,
        registrations: RegistrationStoreRef,
        webhook_secret: String,
    ) -> Self {
        Self {
            broker,
            ledger,
            verifier,
            teams,
            registrations,
            events,
            profiles,
            webhook_secret,
        }
    }

    pub async fn run<R: BufRead>(&self, source: R) -> Result<()> {
        for (line_no, line) in source.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Action>(&line) {
                Ok(action) => {
                    if let Err(e) = self.apply(action).await {
                        eprintln!("Error processing action on line {}: {e}", line_no + 1);
                    }
                }
                Err(e) => {
                    eprintln!("Error reading action on line {}: {e}", line_no + 1);
                }
            }
        }
        Ok(())
    }

    async fn profile_id(&self, handle: &str) -> Result<ProfileId> {
        self.profiles
            .find_by_handle(handle)
            .await?
            .map(|p| p.id)
            .ok_or_else(|| FestError::NotFound(format!("no profile matching '{handle}'")))
    }

    async fn team_by_name(&self, name: &str) -> Result<Team> {
        self.teams
            .find_by_name(name)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no team named '{name}'")))
    }

    async fn registration_for(&self, team: &str, event: &str) -> Result<Registration> {
        let team = self.team_by_name(team).await?;
        self.registrations
            .find_by_team_event(&team.id, &EventId::new(event))
            .await?
            .ok_or_else(|| {
                FestError::NotFound(format!(
                    "no registration of team '{}' for event '{event}'",
                    team.name
                ))
            })
    }

    /// Builds and submits a signed gateway delivery, exercising the same
    /// verification path a real webhook would take.
    async fn deliver_webhook(&self, body: serde_json::Value) -> Result<()> {
        let body = body.to_string();
        let signature = webhook::sign(body.as_bytes(), &self.webhook_secret);
        webhook::process(
            &self.ledger,
            body.as_bytes(),
            &signature,
            &self.webhook_secret,
        )
        .await
    }

    async fn apply(&self, action: Action) -> Result<()> {
        match action {
            Action::CreateProfile {
                principal,
                name,
                email,
            } => {
                self.broker
                    .find_or_create_profile(&principal, &name, &email)
                    .await?;
                Ok(())
            }
            Action::CreateTeam { leader, name } => {
                let leader = self.profile_id(&leader).await?;
                self.broker.create_team(&leader, &name).await?;
                Ok(())
            }
            Action::Invite { leader, target } => {
                let leader = self.profile_id(&leader).await?;
                self.broker
                    .invite(&leader, InviteTarget::Handle(target))
                    .await
            }
            Action::CancelInvite { leader, target } => {
                let leader = self.profile_id(&leader).await?;
                let target = self.profile_id(&target).await?;
                self.broker.cancel_invite(&leader, &target).await
            }
            Action::RequestToJoin { profile, team } => {
                let profile = self.profile_id(&profile).await?;
                let team = self.team_by_name(&team).await?;
                self.broker.request_to_join(&profile, &team.id).await
            }
            Action::CancelRequest { profile, team } => {
                let profile = self.profile_id(&profile).await?;
                let team = self.team_by_name(&team).await?;
                self.broker.cancel_request(&profile, &team.id).await
            }
            Action::AcceptInvitation { profile, team } => {
                let profile = self.profile_id(&profile).await?;
                let team = self.team_by_name(&team).await?;
                self.broker
                    .respond(&profile, Decision::AcceptInvitation { team: team.id })
                    .await
            }
            Action::RejectInvitation { profile, team } => {
                let profile = self.profile_id(&profile).await?;
                let team = self.team_by_name(&team).await?;
                self.broker
                    .respond(&profile, Decision::RejectInvitation { team: team.id })
                    .await
            }
            Action::AcceptRequest { leader, profile } => {
                let leader = self.profile_id(&leader).await?;
                let profile = self.profile_id(&profile).await?;
                self.broker
                    .respond(&leader, Decision::AcceptRequest { profile })
                    .await
            }
            Action::RejectRequest { leader, profile } => {
                let leader = self.profile_id(&leader).await?;
                let profile = self.profile_id(&profile).await?;
                self.broker
                    .respond(&leader, Decision::RejectRequest { profile })
                    .await
            }
            Action::Leave { profile } => {
                let profile = self.profile_id(&profile).await?;
                self.broker.leave(&profile).await
            }
            Action::AddEvent {
                id,
                name,
                fee,
                min_team_size,
                max_team_size,
                max_registrations,
                registration_deadline,
                is_live,
            } => {
                self.events
                    .store(Event {
                        id: EventId::new(id),
                        name,
                        fee,
                        min_team_size,
                        max_team_size,
                        max_registrations,
                        registration_deadline,
                        is_live,
                    })
                    .await
            }
            Action::Register {
                leader,
                event,
                members,
            } => {
                let leader = self.profile_id(&leader).await?;
                let selected = match members {
                    Some(handles) => {
                        let mut ids = Vec::with_capacity(handles.len());
                        for handle in &handles {
                            ids.push(self.profile_id(handle).await?);
                        }
                        Some(ids)
                    }
                    None => None,
                };
                match self
                    .ledger
                    .register(&leader, &EventId::new(event), selected)
                    .await?
                {
                    RegisterOutcome::Settled(_) => Ok(()),
                    RegisterOutcome::OrderCreated { .. } => Ok(()),
                }
            }
            Action::PaymentCaptured {
                team,
                event,
                payment_id,
            } => {
                let reg = self.registration_for(&team, &event).await?;
                let order_id = reg.order_id.ok_or_else(|| {
                    FestError::Validation(format!(
                        "registration of '{team}' for '{event}' has no pending order"
                    ))
                })?;
                let amount_minor: u64 = (reg.amount_expected * Decimal::from(100))
                    .to_u64()
                    .ok_or_else(|| {
                        FestError::Validation("amount not expressible in minor units".to_string())
                    })?;
                let payment_id =
                    payment_id.unwrap_or_else(|| format!("pay_{}", Uuid::new_v4().simple()));
                self.deliver_webhook(serde_json::json!({
                    "event": "payment.captured",
                    "payload": { "payment": { "entity": {
                        "id": payment_id,
                        "order_id": order_id,
                        "amount": amount_minor,
                        "error_description": null,
                    }}}
                }))
                .await
            }
            Action::PaymentFailed { team, event, error } => {
                let reg = self.registration_for(&team, &event).await?;
                let order_id = reg.order_id.ok_or_else(|| {
                    FestError::Validation(format!(
                        "registration of '{team}' for '{event}' has no pending order"
                    ))
                })?;
                self.deliver_webhook(serde_json::json!({
                    "event": "payment.failed",
                    "payload": { "payment": { "entity": {
                        "id": format!("pay_{}", Uuid::new_v4().simple()),
                        "order_id": order_id,
                        "amount": null,
                        "error_description": error,
                    }}}
                }))
                .await
            }
            Action::RefundCreated { team, event } => {
                let reg = self.registration_for(&team, &event).await?;
                let payment_id = reg.payment_id.ok_or_else(|| {
                    FestError::Validation(format!(
                        "registration of '{team}' for '{event}' has no captured payment"
                    ))
                })?;
                self.deliver_webhook(serde_json::json!({
                    "event": "refund.created",
                    "payload": { "refund": { "entity": {
                        "id": format!("rfnd_{}", Uuid::new_v4().simple()),
                        "payment_id": payment_id,
                    }}}
                }))
                .await
            }
            Action::ManualVerify { team, event } => {
                let reg = self.registration_for(&team, &event).await?;
                self.ledger.mark_manual_verified(&reg.id).await?;
                Ok(())
            }
            Action::CheckIn { team, event } => {
                let reg = self.registration_for(&team, &event).await?;
                self.verifier.check_in(&reg.id).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_deserialization() {
        let line = r#"{"action":"create_team","leader":"alice","name":"Orion"}"#;
        let action: Action = serde_json::from_str(line).unwrap();
        assert!(matches!(action, Action::CreateTeam { .. }));

        let line = r#"{"action":"add_event","id":"hackathon","name":"Hackathon","fee":"400","min_team_size":2,"max_team_size":4}"#;
        let action: Action = serde_json::from_str(line).unwrap();
        let Action::AddEvent { fee, is_live, max_registrations, .. } = action else {
            panic!("expected add_event");
        };
        assert_eq!(fee, Decimal::from(400));
        assert!(is_live);
        assert!(max_registrations.is_none());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let line = r#"{"action":"drop_tables"}"#;
        assert!(serde_json::from_str::<Action>(line).is_err());

        let line = r#"{"action":"leave"}"#;
        assert!(serde_json::from_str::<Action>(line).is_err(), "missing field");
    }
}
