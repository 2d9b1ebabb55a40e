use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::domain::ports::{ProfileStoreRef, RegistrationStoreRef, TeamStoreRef};
use crate::domain::registration::{Registration, RegistrationId};
use crate::error::{FestError, Result};

/// What the operator sees after a successful scan.
#[derive(Debug, Clone)]
pub struct CheckInRecord {
    pub registration: Registration,
    pub team_name: String,
    /// Display names of the fielded members, for on-site verification.
    pub roster: Vec<String>,
}

/// Structured QR payload; the registration id is the only field the verifier
/// needs.
#[derive(Deserialize)]
struct ScanPayload {
    registration_id: String,
}

/// Decodes a scan input: either a structured JSON payload carrying the
/// registration id, or the bare id typed in manually.
pub fn registration_id_from_scan(input: &str) -> RegistrationId {
    if let Ok(payload) = serde_json::from_str::<ScanPayload>(input) {
        return RegistrationId::new(payload.registration_id);
    }
    RegistrationId::new(input.trim())
}

/// Performs at-most-once admission scanning against settled registrations.
pub struct CheckInVerifier {
    registrations: RegistrationStoreRef,
    teams: TeamStoreRef,
    profiles: ProfileStoreRef,
}

impl CheckInVerifier {
    pub fn new(
        registrations: RegistrationStoreRef,
        teams: TeamStoreRef,
        profiles: ProfileStoreRef,
    ) -> Self {
        Self {
            registrations,
            teams,
            profiles,
        }
    }

    pub async fn check_in(&self, id: &RegistrationId) -> Result<CheckInRecord> {
        let mut registration = self
            .registrations
            .get(id)
            .await?
            .ok_or_else(|| FestError::NotFound(format!("no registration with id {id}")))?;

        registration.check_in(Utc::now())?;
        self.registrations.store(registration.clone()).await?;
        info!(registration = %id, event = %registration.event, "checked in");

        let team_name = match self.teams.get(&registration.team).await? {
            Some(team) => team.name,
            None => registration.team.to_string(),
        };
        let mut roster = Vec::with_capacity(registration.selected_members.len());
        for member in &registration.selected_members {
            let name = match self.profiles.get(member).await? {
                Some(profile) => profile.display_name,
                None => member.to_string(),
            };
            roster.push(name);
        }

        Ok(CheckInRecord {
            registration,
            team_name,
            roster,
        })
    }
}
