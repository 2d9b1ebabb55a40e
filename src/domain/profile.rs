use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::team::TeamId;
use crate::error::{FestError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
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

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A participant profile.
///
/// Created on first sight of an external principal id; the core trusts that id
/// and never manages credentials itself. A profile belongs to at most one team
/// at a time, as leader or member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub principal_id: String,
    pub display_name: String,
    pub email: String,
    pub current_team: Option<TeamId>,
    /// Pending invites addressed to this profile, by team id.
    pub invitations: Vec<TeamId>,
}

impl Profile {
    pub fn new(
        id: ProfileId,
        principal_id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            principal_id: principal_id.into(),
            display_name: display_name.into(),
            email: email.into(),
            current_team: None,
            invitations: Vec::new(),
        }
    }

    pub fn has_team(&self) -> bool {
        self.current_team.is_some()
    }

    pub fn has_invitation_from(&self, team: &TeamId) -> bool {
        self.invitations.contains(team)
    }

    /// Records a pending invite from a team.
    pub fn add_invitation(&mut self, team: TeamId) -> Result<()> {
        if self.invitations.contains(&team) {
            return Err(FestError::Conflict(format!(
                "{} already has a pending invite from this team",
                self.display_name
            )));
        }
        self.invitations.push(team);
        Ok(())
    }

    pub fn remove_invitation(&mut self, team: &TeamId) {
        self.invitations.retain(|t| t != team);
    }

    /// Case-insensitive match against display name or email.
    pub fn matches_handle(&self, handle: &str) -> bool {
        self.display_name.eq_ignore_ascii_case(handle) || self.email.eq_ignore_ascii_case(handle)
    }
}
