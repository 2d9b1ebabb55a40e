use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

use crate::domain::event::{Event, EventId};
use crate::domain::ports::{EventStore, ProfileStore, RegistrationStore, TeamStore};
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::registration::{Registration, RegistrationId};
use crate::domain::team::{Team, TeamId};
use crate::error::{FestError, Result};

/// Column family per logical collection.
pub const CF_PROFILES: &str = "profiles";
pub const CF_TEAMS: &str = "teams";
pub const CF_EVENTS: &str = "events";
pub const CF_REGISTRATIONS: &str = "registrations";

/// A persistent store implementation using RocksDB.
///
/// Each collection lives in its own column family with JSON-encoded values
/// keyed by entity id. This struct is thread-safe (`Clone` shares the
/// underlying `Arc<DB>`), so one instance can back all four store ports.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring the
    /// required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_PROFILES, CF_TEAMS, CF_EVENTS, CF_REGISTRATIONS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| FestError::Internal(Box::new(e)))?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            FestError::Internal(Box::new(std::io::Error::other(format!(
                "column family {name} not found"
            ))))
        })
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db
            .put_cf(cf, key.as_bytes(), bytes)
            .map_err(|e| FestError::Internal(Box::new(e)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let result = self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| FestError::Internal(Box::new(e)))?;
        match result {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut entities = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| FestError::Internal(Box::new(e)))?;
            entities.push(serde_json::from_slice(&value)?);
        }
        Ok(entities)
    }
}

#[async_trait]
impl ProfileStore for RocksDbStore {
    async fn store(&self, profile: Profile) -> Result<()> {
        self.put_json(CF_PROFILES, profile.id.as_str(), &profile)
    }

    async fn get(&self, id: &ProfileId) -> Result<Option<Profile>> {
        self.get_json(CF_PROFILES, id.as_str())
    }

    async fn find_by_principal(&self, principal_id: &str) -> Result<Option<Profile>> {
        Ok(self
            .scan::<Profile>(CF_PROFILES)?
            .into_iter()
            .find(|p| p.principal_id == principal_id))
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>> {
        Ok(self
            .scan::<Profile>(CF_PROFILES)?
            .into_iter()
            .find(|p| p.matches_handle(handle)))
    }

    async fn all(&self) -> Result<Vec<Profile>> {
        self.scan(CF_PROFILES)
    }
}

#[async_trait]
impl TeamStore for RocksDbStore {
    async fn store(&self, team: Team) -> Result<()> {
        self.put_json(CF_TEAMS, team.id.as_str(), &team)
    }

    async fn get(&self, id: &TeamId) -> Result<Option<Team>> {
        self.get_json(CF_TEAMS, id.as_str())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Team>> {
        Ok(self
            .scan::<Team>(CF_TEAMS)?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    async fn delete(&self, id: &TeamId) -> Result<()> {
        let cf = self.cf(CF_TEAMS)?;
        self.db
            .delete_cf(cf, id.as_str().as_bytes())
            .map_err(|e| FestError::Internal(Box::new(e)))
    }

    async fn all(&self) -> Result<Vec<Team>> {
        self.scan(CF_TEAMS)
    }
}

#[async_trait]
impl EventStore for RocksDbStore {
    async fn store(&self, event: Event) -> Result<()> {
        self.put_json(CF_EVENTS, event.id.as_str(), &event)
    }

    async fn get(&self, id: &EventId) -> Result<Option<Event>> {
        self.get_json(CF_EVENTS, id.as_str())
    }

    async fn all(&self) -> Result<Vec<Event>> {
        self.scan(CF_EVENTS)
    }
}

#[async_trait]
impl RegistrationStore for RocksDbStore {
    async fn store(&self, registration: Registration) -> Result<()> {
        self.put_json(CF_REGISTRATIONS, registration.id.as_str(), &registration)
    }

    async fn get(&self, id: &RegistrationId) -> Result<Option<Registration>> {
        self.get_json(CF_REGISTRATIONS, id.as_str())
    }

    async fn find_by_team_event(
        &self,
        team: &TeamId,
        event: &EventId,
    ) -> Result<Option<Registration>> {
        Ok(self
            .scan::<Registration>(CF_REGISTRATIONS)?
            .into_iter()
            .find(|r| r.team == *team && r.event == *event))
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Registration>> {
        Ok(self
            .scan::<Registration>(CF_REGISTRATIONS)?
            .into_iter()
            .find(|r| r.order_id.as_deref() == Some(order_id)))
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Registration>> {
        Ok(self
            .scan::<Registration>(CF_REGISTRATIONS)?
            .into_iter()
            .find(|r| r.payment_id.as_deref() == Some(payment_id)))
    }

    async fn count_settled(&self, event: &EventId) -> Result<u32> {
        Ok(self
            .scan::<Registration>(CF_REGISTRATIONS)?
            .iter()
            .filter(|r| r.event == *event && r.status.is_settled())
            .count() as u32)
    }

    async fn all(&self) -> Result<Vec<Registration>> {
        self.scan(CF_REGISTRATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).expect("failed to open RocksDB");

        for name in [CF_PROFILES, CF_TEAMS, CF_EVENTS, CF_REGISTRATIONS] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let profile = Profile::new(ProfileId::new("p1"), "auth|p1", "Alice", "alice@fest.dev");
        ProfileStore::store(&store, profile.clone()).await.unwrap();

        let retrieved = ProfileStore::get(&store, &profile.id).await.unwrap();
        assert_eq!(retrieved, Some(profile.clone()));
        let by_handle = store.find_by_handle("alice@FEST.dev").await.unwrap();
        assert_eq!(by_handle, Some(profile));
    }

    #[tokio::test]
    async fn test_team_round_trip_and_delete() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let team = Team::new(TeamId::new("t1"), "Orion", ProfileId::new("p1"));
        TeamStore::store(&store, team.clone()).await.unwrap();
        assert_eq!(
            store.find_by_name("ORION").await.unwrap(),
            Some(team.clone())
        );

        TeamStore::delete(&store, &team.id).await.unwrap();
        assert!(TeamStore::get(&store, &team.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registration_lookups_survive_reopen() {
        let dir = tempdir().unwrap();
        let mut reg = Registration::new(
            TeamId::new("t1"),
            EventId::new("e1"),
            dec!(400),
            vec![ProfileId::new("p1")],
        );
        reg.record_order("order_1".to_string());
        reg.capture("pay_1", dec!(400));

        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            RegistrationStore::store(&store, reg.clone()).await.unwrap();
        }

        let store = RocksDbStore::open(dir.path()).unwrap();
        assert_eq!(
            store.find_by_order_id("order_1").await.unwrap(),
            Some(reg.clone())
        );
        assert_eq!(
            store.find_by_payment_id("pay_1").await.unwrap(),
            Some(reg.clone())
        );
        assert_eq!(store.count_settled(&reg.event).await.unwrap(), 1);
    }
}
