//! End-to-end scenarios across the membership broker, registration ledger and
//! check-in verifier, including the signed webhook path.

use std::sync::Arc;

use festreg::application::checkin::CheckInVerifier;
use festreg::application::ledger::{RegisterOutcome, RegistrationLedger};
use festreg::application::membership::{Decision, InviteTarget, MembershipBroker};
use festreg::domain::event::{Event, EventId};
use festreg::domain::ports::{
    EventStoreRef, ProfileStoreRef, RegistrationStoreRef, TeamStoreRef,
};
use festreg::domain::profile::{Profile, ProfileId};
use festreg::domain::registration::PaymentStatus;
use festreg::domain::team::TeamId;
use festreg::error::FestError;
use festreg::infrastructure::in_memory::{
    InMemoryEventStore, InMemoryProfileStore, InMemoryRegistrationStore, InMemoryTeamStore,
};
use festreg::infrastructure::mock_gateway::MockGateway;
use festreg::interfaces::webhook;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SECRET: &str = "test-webhook-secret";

struct World {
    broker: MembershipBroker,
    ledger: RegistrationLedger,
    verifier: CheckInVerifier,
    profiles: ProfileStoreRef,
    teams: TeamStoreRef,
    events: EventStoreRef,
    registrations: RegistrationStoreRef,
}

fn world() -> World {
    let profiles: ProfileStoreRef = Arc::new(InMemoryProfileStore::new());
    let teams: TeamStoreRef = Arc::new(InMemoryTeamStore::new());
    let events: EventStoreRef = Arc::new(InMemoryEventStore::new());
    let registrations: RegistrationStoreRef = Arc::new(InMemoryRegistrationStore::new());

    World {
        broker: MembershipBroker::new(profiles.clone(), teams.clone()),
        ledger: RegistrationLedger::new(
            profiles.clone(),
            teams.clone(),
            events.clone(),
            registrations.clone(),
            Arc::new(MockGateway::new()),
        ),
        verifier: CheckInVerifier::new(registrations.clone(), teams.clone(), profiles.clone()),
        profiles,
        teams,
        events,
        registrations,
    }
}

async fn user(w: &World, name: &str) -> Profile {
    w.broker
        .find_or_create_profile(&format!("auth|{name}"), name, &format!("{name}@fest.dev"))
        .await
        .unwrap()
}

async fn add_event(w: &World, id: &str, fee: Decimal) -> EventId {
    let event = Event {
        id: EventId::new(id),
        name: id.to_string(),
        fee,
        min_team_size: 1,
        max_team_size: 5,
        max_registrations: None,
        registration_deadline: None,
        is_live: true,
    };
    w.events.store(event.clone()).await.unwrap();
    event.id
}

async fn join(w: &World, leader: &ProfileId, team: &TeamId, member: &ProfileId) {
    w.broker
        .invite(leader, InviteTarget::Id(member.clone()))
        .await
        .unwrap();
    w.broker
        .respond(
            member,
            Decision::AcceptInvitation { team: team.clone() },
        )
        .await
        .unwrap();
}

/// Every profile appears in the members of at most one team, every leader is a
/// member of their own team, and no roster exceeds five.
async fn assert_membership_invariants(w: &World) {
    let teams = w.teams.all().await.unwrap();
    for profile in w.profiles.all().await.unwrap() {
        let containing: Vec<_> = teams
            .iter()
            .filter(|t| t.is_member(&profile.id))
            .collect();
        assert!(
            containing.len() <= 1,
            "profile {} belongs to {} teams",
            profile.id,
            containing.len()
        );
        match &profile.current_team {
            Some(team_id) => assert!(containing.iter().any(|t| t.id == *team_id)),
            None => assert!(containing.is_empty()),
        }
    }
    for team in &teams {
        assert!(team.is_member(&team.leader));
        assert!(team.members.len() <= 5);
    }
}

#[tokio::test]
async fn scenario_free_event_locks_team_against_joiners() {
    let w = world();
    let alice = user(&w, "alice").await;
    let bob = user(&w, "bob").await;
    let team = w.broker.create_team(&alice.id, "Orion").await.unwrap();
    join(&w, &alice.id, &team.id, &bob.id).await;

    let quiz = add_event(&w, "quiz", Decimal::ZERO).await;
    let outcome = w.ledger.register(&alice.id, &quiz, None).await.unwrap();
    let RegisterOutcome::Settled(reg) = outcome else {
        panic!("free event must settle synchronously");
    };
    assert_eq!(reg.status, PaymentStatus::Paid);
    assert_eq!(reg.amount_paid, Decimal::ZERO);
    assert!(w.teams.get(&team.id).await.unwrap().unwrap().locked);

    let carol = user(&w, "carol").await;
    assert!(matches!(
        w.broker.request_to_join(&carol.id, &team.id).await,
        Err(FestError::Locked)
    ));
    assert_membership_invariants(&w).await;
}

#[tokio::test]
async fn scenario_paid_event_settles_via_signed_webhook_and_replays_converge() {
    let w = world();
    let alice = user(&w, "alice").await;
    let team = w.broker.create_team(&alice.id, "Orion").await.unwrap();

    let hackathon = add_event(&w, "hackathon", dec!(400)).await;
    let RegisterOutcome::OrderCreated { order, .. } =
        w.ledger.register(&alice.id, &hackathon, None).await.unwrap()
    else {
        panic!("paid event must create an order");
    };
    assert_eq!(order.amount_minor, 40_000);

    let body = serde_json::json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_1",
            "order_id": order.order_id,
            "amount": 40_000,
            "error_description": null,
        }}}
    })
    .to_string();
    let signature = webhook::sign(body.as_bytes(), SECRET);

    // A forged delivery is rejected with no side effects.
    assert!(matches!(
        webhook::process(&w.ledger, body.as_bytes(), &signature, "wrong-secret").await,
        Err(FestError::InvalidSignature)
    ));
    assert!(!w.teams.get(&team.id).await.unwrap().unwrap().locked);

    webhook::process(&w.ledger, body.as_bytes(), &signature, SECRET)
        .await
        .unwrap();
    let reg = w
        .registrations
        .find_by_team_event(&team.id, &hackathon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reg.status, PaymentStatus::Paid);
    assert_eq!(reg.amount_paid, dec!(400));
    assert!(w.teams.get(&team.id).await.unwrap().unwrap().locked);

    // The gateway redelivers the identical webhook; state is unchanged.
    webhook::process(&w.ledger, body.as_bytes(), &signature, SECRET)
        .await
        .unwrap();
    let replayed = w
        .registrations
        .find_by_team_event(&team.id, &hackathon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reg, replayed);
    assert_membership_invariants(&w).await;
}

#[tokio::test]
async fn scenario_refund_after_check_in_does_not_unlock() {
    let w = world();
    let alice = user(&w, "alice").await;
    let team = w.broker.create_team(&alice.id, "Orion").await.unwrap();
    let hackathon = add_event(&w, "hackathon", dec!(400)).await;

    let RegisterOutcome::OrderCreated { registration, order } =
        w.ledger.register(&alice.id, &hackathon, None).await.unwrap()
    else {
        panic!("expected order");
    };

    let capture = serde_json::json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_1", "order_id": order.order_id, "amount": 40_000,
            "error_description": null,
        }}}
    })
    .to_string();
    let signature = webhook::sign(capture.as_bytes(), SECRET);
    webhook::process(&w.ledger, capture.as_bytes(), &signature, SECRET)
        .await
        .unwrap();

    let record = w.verifier.check_in(&registration.id).await.unwrap();
    assert_eq!(record.team_name, "Orion");

    let refund = serde_json::json!({
        "event": "refund.created",
        "payload": { "refund": { "entity": { "id": "rfnd_1", "payment_id": "pay_1" }}}
    })
    .to_string();
    let signature = webhook::sign(refund.as_bytes(), SECRET);
    webhook::process(&w.ledger, refund.as_bytes(), &signature, SECRET)
        .await
        .unwrap();

    let reg = w.registrations.get(&registration.id).await.unwrap().unwrap();
    assert_eq!(reg.status, PaymentStatus::Refunded);
    assert!(reg.checked_in);
    // No automatic unlock on refund.
    assert!(w.teams.get(&team.id).await.unwrap().unwrap().locked);
}

#[tokio::test]
async fn scenario_membership_churn_preserves_invariants() {
    let w = world();
    let alice = user(&w, "alice").await;
    let bob = user(&w, "bob").await;
    let carol = user(&w, "carol").await;

    let orion = w.broker.create_team(&alice.id, "Orion").await.unwrap();
    join(&w, &alice.id, &orion.id, &bob.id).await;

    // Bob leaves, founds his own team, and carol joins him via request.
    w.broker.leave(&bob.id).await.unwrap();
    let vega = w.broker.create_team(&bob.id, "Vega").await.unwrap();
    w.broker
        .request_to_join(&carol.id, &vega.id)
        .await
        .unwrap();
    w.broker
        .respond(
            &bob.id,
            Decision::AcceptRequest {
                profile: carol.id.clone(),
            },
        )
        .await
        .unwrap();

    // Carol cannot also hold membership in Orion.
    assert!(matches!(
        w.broker.request_to_join(&carol.id, &orion.id).await,
        Err(FestError::Conflict(_))
    ));

    // Alice disbands Orion; her pointer clears, Vega is untouched.
    w.broker.leave(&alice.id).await.unwrap();
    assert!(w.teams.get(&orion.id).await.unwrap().is_none());
    assert_eq!(w.teams.get(&vega.id).await.unwrap().unwrap().members.len(), 2);

    assert_membership_invariants(&w).await;
}

#[tokio::test]
async fn scenario_overfill_blocked_at_accept_time() {
    let w = world();
    let alice = user(&w, "alice").await;
    let team = w.broker.create_team(&alice.id, "Orion").await.unwrap();
    for name in ["b", "c", "d"] {
        let p = user(&w, name).await;
        join(&w, &alice.id, &team.id, &p.id).await;
    }

    let eve = user(&w, "eve").await;
    let frank = user(&w, "frank").await;
    w.broker.request_to_join(&eve.id, &team.id).await.unwrap();
    w.broker.request_to_join(&frank.id, &team.id).await.unwrap();

    w.broker
        .respond(
            &alice.id,
            Decision::AcceptRequest {
                profile: eve.id.clone(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        w.broker
            .respond(
                &alice.id,
                Decision::AcceptRequest {
                    profile: frank.id.clone(),
                },
            )
            .await,
        Err(FestError::CapacityExceeded(_))
    ));

    assert_eq!(w.teams.get(&team.id).await.unwrap().unwrap().members.len(), 5);
    assert_membership_invariants(&w).await;
}
