use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FestError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Competition reference data.
///
/// Mutated only by administrative action; the registration ledger treats it as
/// read-only. The fee is in major currency units (rupees), the gateway works in
/// minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub fee: Decimal,
    pub min_team_size: usize,
    pub max_team_size: usize,
    #[serde(default)]
    pub max_registrations: Option<u32>,
    #[serde(default)]
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_live")]
    pub is_live: bool,
}

fn default_live() -> bool {
    true
}

impl Event {
    pub fn is_free(&self) -> bool {
        self.fee.is_zero()
    }

    pub fn fee_minor_units(&self) -> Result<u64> {
        (self.fee * Decimal::from(100)).to_u64().ok_or_else(|| {
            FestError::Validation(format!(
                "event '{}' has a fee that cannot be expressed in minor units: {}",
                self.name, self.fee
            ))
        })
    }

    pub fn accepts_team_of(&self, size: usize) -> bool {
        size >= self.min_team_size && size <= self.max_team_size
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.registration_deadline.is_some_and(|d| now > d)
    }
}
