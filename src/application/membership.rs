use tracing::debug;

use crate::domain::ports::{ProfileStoreRef, TeamStoreRef};
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::team::{Team, TeamId};
use crate::error::{FestError, Result};

/// How an invite target is addressed: by profile id, or by a case-insensitive
/// display-name/email handle.
#[derive(Debug, Clone)]
pub enum InviteTarget {
    Id(ProfileId),
    Handle(String),
}

/// The four ways the invite/request handshake resolves. Invitees decide on
/// invitations; leaders decide on join requests.
#[derive(Debug, Clone)]
pub enum Decision {
    AcceptInvitation { team: TeamId },
    RejectInvitation { team: TeamId },
    AcceptRequest { profile: ProfileId },
    RejectRequest { profile: ProfileId },
}

/// Implements the invite/request/accept/reject/leave handshake over the
/// identity store and the team registry.
///
/// A profile's `invitations` and a team's `join_requests` are the two halves of
/// the handshake; each operation touches one profile document and one team
/// document, validated before either write.
pub struct MembershipBroker {
    profiles: ProfileStoreRef,
    teams: TeamStoreRef,
}

impl MembershipBroker {
    pub fn new(profiles: ProfileStoreRef, teams: TeamStoreRef) -> Self {
        Self { profiles, teams }
    }

    /// Resolves the profile for an external principal, creating it on first
    /// sight.
    pub async fn find_or_create_profile(
        &self,
        principal_id: &str,
        display_name: &str,
        email: &str,
    ) -> Result<Profile> {
        if let Some(existing) = self.profiles.find_by_principal(principal_id).await? {
            return Ok(existing);
        }
        let profile = Profile::new(ProfileId::generate(), principal_id, display_name, email);
        self.profiles.store(profile.clone()).await?;
        debug!(principal_id, "created profile on first sight");
        Ok(profile)
    }

    async fn profile_or_not_found(&self, id: &ProfileId) -> Result<Profile> {
        self.profiles
            .get(id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no profile with id {id}")))
    }

    async fn team_or_not_found(&self, id: &TeamId) -> Result<Team> {
        self.teams
            .get(id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no team with id {id}")))
    }

    /// Loads the caller's team and checks they lead it.
    async fn led_team(&self, leader: &ProfileId) -> Result<Team> {
        let profile = self.profile_or_not_found(leader).await?;
        let team_id = profile.current_team.ok_or_else(|| {
            FestError::Forbidden(format!("{} does not belong to any team", profile.display_name))
        })?;
        let team = self.team_or_not_found(&team_id).await?;
        if !team.is_leader(leader) {
            return Err(FestError::Forbidden(format!(
                "only the leader of team '{}' may do this",
                team.name
            )));
        }
        Ok(team)
    }

    /// Creates a team with the caller as sole member and leader.
    pub async fn create_team(&self, leader: &ProfileId, name: &str) -> Result<Team> {
        let mut leader_profile = self.profile_or_not_found(leader).await?;
        if leader_profile.has_team() {
            return Err(FestError::Conflict(format!(
                "{} already belongs to a team",
                leader_profile.display_name
            )));
        }
        if self.teams.find_by_name(name).await?.is_some() {
            return Err(FestError::Conflict(format!(
                "a team named '{name}' already exists"
            )));
        }

        let team = Team::new(TeamId::generate(), name, leader.clone());
        self.teams.store(team.clone()).await?;
        leader_profile.current_team = Some(team.id.clone());
        self.profiles.store(leader_profile).await?;
        debug!(team = %team.id, name, "team created");
        Ok(team)
    }

    /// Leader invites a target profile; the invite lands in the target's
    /// pending set and waits for their decision.
    pub async fn invite(&self, leader: &ProfileId, target: InviteTarget) -> Result<()> {
        let team = self.led_team(leader).await?;
        team.ensure_open()?;

        let mut target_profile = match target {
            InviteTarget::Id(id) => self.profile_or_not_found(&id).await?,
            InviteTarget::Handle(handle) => self
                .profiles
                .find_by_handle(&handle)
                .await?
                .ok_or_else(|| FestError::NotFound(format!("no profile matching '{handle}'")))?,
        };

        if target_profile.id == *leader {
            return Err(FestError::Validation(
                "you cannot invite yourself".to_string(),
            ));
        }
        if target_profile.has_team() {
            return Err(FestError::Conflict(format!(
                "{} already belongs to a team",
                target_profile.display_name
            )));
        }
        target_profile.add_invitation(team.id.clone())?;
        self.profiles.store(target_profile).await?;
        Ok(())
    }

    /// Leader withdraws a pending invite.
    pub async fn cancel_invite(&self, leader: &ProfileId, target: &ProfileId) -> Result<()> {
        let team = self.led_team(leader).await?;
        let mut target_profile = self.profile_or_not_found(target).await?;
        if !target_profile.has_invitation_from(&team.id) {
            return Err(FestError::NotFound(format!(
                "{} has no pending invite from team '{}'",
                target_profile.display_name, team.name
            )));
        }
        target_profile.remove_invitation(&team.id);
        self.profiles.store(target_profile).await?;
        Ok(())
    }

    /// Profile asks to join a team; the request lands in the team's pending
    /// set and waits for the leader's decision.
    pub async fn request_to_join(&self, profile_id: &ProfileId, team_id: &TeamId) -> Result<()> {
        let profile = self.profile_or_not_found(profile_id).await?;
        if profile.has_team() {
            return Err(FestError::Conflict(format!(
                "{} already belongs to a team",
                profile.display_name
            )));
        }
        let mut team = self.team_or_not_found(team_id).await?;
        team.add_join_request(profile_id.clone())?;
        self.teams.store(team).await?;
        Ok(())
    }

    /// Requester withdraws a pending join request.
    pub async fn cancel_request(&self, profile_id: &ProfileId, team_id: &TeamId) -> Result<()> {
        let mut team = self.team_or_not_found(team_id).await?;
        if !team.has_join_request(profile_id) {
            return Err(FestError::NotFound(format!(
                "no pending request to team '{}' from profile {profile_id}",
                team.name
            )));
        }
        team.remove_join_request(profile_id);
        self.teams.store(team).await?;
        Ok(())
    }

    /// Settles one pending invite or request.
    ///
    /// Acceptance re-validates lock and capacity against the team's current
    /// state, not the state at invite/request time; rejection is a pure
    /// removal and needs no re-check. A failed acceptance keeps the pending
    /// entry, so the decision can be retried once the roster has room again;
    /// an unwanted entry is dropped by an explicit reject or cancel.
    pub async fn respond(&self, actor: &ProfileId, decision: Decision) -> Result<()> {
        match decision {
            Decision::AcceptInvitation { team } => self.accept_invitation(actor, &team).await,
            Decision::RejectInvitation { team } => self.reject_invitation(actor, &team).await,
            Decision::AcceptRequest { profile } => self.accept_request(actor, &profile).await,
            Decision::RejectRequest { profile } => self.reject_request(actor, &profile).await,
        }
    }

    async fn accept_invitation(&self, actor: &ProfileId, team_id: &TeamId) -> Result<()> {
        let mut profile = self.profile_or_not_found(actor).await?;
        if !profile.has_invitation_from(team_id) {
            return Err(FestError::NotFound(
                "no pending invitation from this team".to_string(),
            ));
        }
        if profile.has_team() {
            return Err(FestError::Conflict(format!(
                "{} already belongs to a team",
                profile.display_name
            )));
        }

        let Some(mut team) = self.teams.get(team_id).await? else {
            // The team was disbanded after the invite went out; drop the
            // dangling entry so the invitee is not stuck with it.
            profile.remove_invitation(team_id);
            self.profiles.store(profile).await?;
            return Err(FestError::NotFound(
                "the inviting team no longer exists".to_string(),
            ));
        };

        team.add_member(actor.clone())?;
        self.teams.store(team.clone()).await?;

        profile.remove_invitation(team_id);
        profile.current_team = Some(team.id);
        self.profiles.store(profile).await?;
        Ok(())
    }

    async fn reject_invitation(&self, actor: &ProfileId, team_id: &TeamId) -> Result<()> {
        let mut profile = self.profile_or_not_found(actor).await?;
        if !profile.has_invitation_from(team_id) {
            return Err(FestError::NotFound(
                "no pending invitation from this team".to_string(),
            ));
        }
        profile.remove_invitation(team_id);
        self.profiles.store(profile).await?;
        Ok(())
    }

    async fn accept_request(&self, actor: &ProfileId, candidate: &ProfileId) -> Result<()> {
        let mut team = self.led_team(actor).await?;
        if !team.has_join_request(candidate) {
            return Err(FestError::NotFound(format!(
                "no pending request to team '{}' from profile {candidate}",
                team.name
            )));
        }
        let mut candidate_profile = self.profile_or_not_found(candidate).await?;
        if candidate_profile.has_team() {
            return Err(FestError::Conflict(format!(
                "{} already belongs to a team",
                candidate_profile.display_name
            )));
        }

        team.remove_join_request(candidate);
        team.add_member(candidate.clone())?;
        self.teams.store(team.clone()).await?;

        candidate_profile.current_team = Some(team.id);
        self.profiles.store(candidate_profile).await?;
        Ok(())
    }

    async fn reject_request(&self, actor: &ProfileId, candidate: &ProfileId) -> Result<()> {
        let mut team = self.led_team(actor).await?;
        if !team.has_join_request(candidate) {
            return Err(FestError::NotFound(format!(
                "no pending request to team '{}' from profile {candidate}",
                team.name
            )));
        }
        team.remove_join_request(candidate);
        self.teams.store(team).await?;
        Ok(())
    }

    /// A member leaves their team; the leader leaving disbands the whole team
    /// and clears every member's team pointer. A locked team refuses both.
    pub async fn leave(&self, profile_id: &ProfileId) -> Result<()> {
        let mut profile = self.profile_or_not_found(profile_id).await?;
        let team_id = profile
            .current_team
            .clone()
            .ok_or_else(|| {
                FestError::NotFound(format!(
                    "{} does not belong to any team",
                    profile.display_name
                ))
            })?;

        let Some(mut team) = self.teams.get(&team_id).await? else {
            // Dangling pointer after a disband that did not reach this
            // profile; clean it up and treat the leave as done.
            profile.current_team = None;
            self.profiles.store(profile).await?;
            return Ok(());
        };

        if team.locked {
            return Err(FestError::Locked);
        }

        if team.is_leader(profile_id) {
            self.disband(team).await
        } else {
            team.remove_member(profile_id)?;
            self.teams.store(team).await?;
            profile.current_team = None;
            self.profiles.store(profile).await?;
            Ok(())
        }
    }

    async fn disband(&self, team: Team) -> Result<()> {
        debug!(team = %team.id, name = %team.name, "disbanding team");
        for member_id in &team.members {
            if let Some(mut member) = self.profiles.get(member_id).await?
                && member.current_team.as_ref() == Some(&team.id)
            {
                member.current_team = None;
                self.profiles.store(member).await?;
            }
        }
        self.teams.delete(&team.id).await
    }
}
