use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::profile::ProfileId;
use crate::error::{FestError, Result};

/// Hard upper bound on team size, leader included.
pub const MAX_TEAM_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A team assembled by one leader.
///
/// The leader is always part of `members` and cannot be replaced. Once
/// `locked` is set (on successful payment for any event) membership is frozen
/// until an administrative unlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    /// Globally unique, compared case-insensitively.
    pub name: String,
    pub leader: ProfileId,
    pub members: Vec<ProfileId>,
    /// Profiles awaiting the leader's decision.
    pub join_requests: Vec<ProfileId>,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, leader: ProfileId) -> Self {
        Self {
            id,
            name: name.into(),
            members: vec![leader.clone()],
            leader,
            join_requests: Vec::new(),
            locked: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_leader(&self, profile: &ProfileId) -> bool {
        self.leader == *profile
    }

    pub fn is_member(&self, profile: &ProfileId) -> bool {
        self.members.contains(profile)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_TEAM_SIZE
    }

    pub fn has_join_request(&self, profile: &ProfileId) -> bool {
        self.join_requests.contains(profile)
    }

    /// Checks that the team can still take one more member. Called both when an
    /// invite/request is issued and again at acceptance time, since the roster
    /// may have changed in between.
    pub fn ensure_open(&self) -> Result<()> {
        if self.locked {
            return Err(FestError::Locked);
        }
        if self.is_full() {
            return Err(FestError::CapacityExceeded(format!(
                "team '{}' already has {MAX_TEAM_SIZE} members",
                self.name
            )));
        }
        Ok(())
    }

    /// Adds a member, re-validating lock and capacity at the moment of the write.
    pub fn add_member(&mut self, profile: ProfileId) -> Result<()> {
        self.ensure_open()?;
        if self.members.contains(&profile) {
            return Err(FestError::Conflict(format!(
                "profile {profile} is already a member of team '{}'",
                self.name
            )));
        }
        self.members.push(profile);
        Ok(())
    }

    /// Removes a regular member. The leader leaves only by disbanding.
    pub fn remove_member(&mut self, profile: &ProfileId) -> Result<()> {
        if self.locked {
            return Err(FestError::Locked);
        }
        if self.is_leader(profile) {
            return Err(FestError::Forbidden(
                "the leader cannot leave without disbanding the team".to_string(),
            ));
        }
        if !self.members.contains(profile) {
            return Err(FestError::NotFound(format!(
                "profile {profile} is not a member of team '{}'",
                self.name
            )));
        }
        self.members.retain(|m| m != profile);
        Ok(())
    }

    pub fn add_join_request(&mut self, profile: ProfileId) -> Result<()> {
        self.ensure_open()?;
        if self.members.contains(&profile) {
            return Err(FestError::Conflict(format!(
                "profile {profile} is already a member of team '{}'",
                self.name
            )));
        }
        if self.join_requests.contains(&profile) {
            return Err(FestError::Conflict(format!(
                "profile {profile} already has a pending request to team '{}'",
                self.name
            )));
        }
        self.join_requests.push(profile);
        Ok(())
    }

    pub fn remove_join_request(&mut self, profile: &ProfileId) {
        self.join_requests.retain(|p| p != profile);
    }

    /// Freezes membership. Entered on successful payment for any event; only an
    /// administrative unlock reverses it.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Administrative override.
    pub fn unlock(&mut self) {
        self.locked = false;
    }
}
