use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::event::{Event, EventId};
use crate::domain::ports::{EventStore, ProfileStore, RegistrationStore, TeamStore};
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::registration::{Registration, RegistrationId};
use crate::domain::team::{Team, TeamId};
use crate::error::Result;

/// Thread-safe in-memory profile store.
///
/// `Clone` shares the underlying map, so engines holding separate handles see
/// the same data.
#[derive(Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<ProfileId, Profile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn store(&self, profile: Profile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn get(&self, id: &ProfileId) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(id).cloned())
    }

    async fn find_by_principal(&self, principal_id: &str) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .values()
            .find(|p| p.principal_id == principal_id)
            .cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().find(|p| p.matches_handle(handle)).cloned())
    }

    async fn all(&self) -> Result<Vec<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().cloned().collect())
    }
}

/// Thread-safe in-memory team store.
#[derive(Default, Clone)]
pub struct InMemoryTeamStore {
    teams: Arc<RwLock<HashMap<TeamId, Team>>>,
}

impl InMemoryTeamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TeamStore for InMemoryTeamStore {
    async fn store(&self, team: Team) -> Result<()> {
        let mut teams = self.teams.write().await;
        teams.insert(team.id.clone(), team);
        Ok(())
    }

    async fn get(&self, id: &TeamId) -> Result<Option<Team>> {
        let teams = self.teams.read().await;
        Ok(teams.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Team>> {
        let teams = self.teams.read().await;
        Ok(teams
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn delete(&self, id: &TeamId) -> Result<()> {
        let mut teams = self.teams.write().await;
        teams.remove(id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Team>> {
        let teams = self.teams.read().await;
        Ok(teams.values().cloned().collect())
    }
}

/// Thread-safe in-memory event catalog.
#[derive(Default, Clone)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn store(&self, event: Event) -> Result<()> {
        let mut events = self.events.write().await;
        events.insert(event.id.clone(), event);
        Ok(())
    }

    async fn get(&self, id: &EventId) -> Result<Option<Event>> {
        let events = self.events.read().await;
        Ok(events.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        Ok(events.values().cloned().collect())
    }
}

/// Thread-safe in-memory registration ledger storage.
#[derive(Default, Clone)]
pub struct InMemoryRegistrationStore {
    registrations: Arc<RwLock<HashMap<RegistrationId, Registration>>>,
}

impl InMemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn store(&self, registration: Registration) -> Result<()> {
        let mut registrations = self.registrations.write().await;
        registrations.insert(registration.id.clone(), registration);
        Ok(())
    }

    async fn get(&self, id: &RegistrationId) -> Result<Option<Registration>> {
        let registrations = self.registrations.read().await;
        Ok(registrations.get(id).cloned())
    }

    async fn find_by_team_event(
        &self,
        team: &TeamId,
        event: &EventId,
    ) -> Result<Option<Registration>> {
        let registrations = self.registrations.read().await;
        Ok(registrations
            .values()
            .find(|r| r.team == *team && r.event == *event)
            .cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Registration>> {
        let registrations = self.registrations.read().await;
        Ok(registrations
            .values()
            .find(|r| r.order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Registration>> {
        let registrations = self.registrations.read().await;
        Ok(registrations
            .values()
            .find(|r| r.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn count_settled(&self, event: &EventId) -> Result<u32> {
        let registrations = self.registrations.read().await;
        Ok(registrations
            .values()
            .filter(|r| r.event == *event && r.status.is_settled())
            .count() as u32)
    }

    async fn all(&self) -> Result<Vec<Registration>> {
        let registrations = self.registrations.read().await;
        Ok(registrations.values().cloned().collect())
    }
}
