use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::event::EventId;
use crate::domain::profile::ProfileId;
use crate::domain::team::TeamId;
use crate::error::{FestError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(String);

impl RegistrationId {
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

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment state machine: `Initiated -> Paid | Failed`, `Paid -> Refunded`.
/// `ManualVerified` is the administrator-asserted equivalent of `Paid` for
/// out-of-band payment proof. Re-registration after `Failed` re-enters
/// `Initiated` on the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initiated,
    Paid,
    Failed,
    Refunded,
    ManualVerified,
}

impl PaymentStatus {
    /// Settled means the entry fee is accounted for, by gateway or by hand.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::ManualVerified)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::ManualVerified => "manual_verified",
        };
        f.write_str(s)
    }
}

/// One entry in the append-only payment attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub at: DateTime<Utc>,
    pub order_id: Option<String>,
    pub status: PaymentStatus,
    pub error: Option<String>,
}

/// The durable record of one team's entry into one event.
///
/// At most one active record exists per (team, event) pair; retries after a
/// failed payment upsert the same record and append to `attempts`. Records are
/// never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub team: TeamId,
    pub event: EventId,
    pub status: PaymentStatus,
    /// Gateway correlation ids, opaque to this system.
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub amount_expected: Decimal,
    pub amount_paid: Decimal,
    pub attempts: Vec<PaymentAttempt>,
    /// Subset of the roster actually fielded for this event.
    pub selected_members: Vec<ProfileId>,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Registration {
    pub fn new(
        team: TeamId,
        event: EventId,
        amount_expected: Decimal,
        selected_members: Vec<ProfileId>,
    ) -> Self {
        Self {
            id: RegistrationId::generate(),
            team,
            event,
            status: PaymentStatus::Initiated,
            order_id: None,
            payment_id: None,
            amount_expected,
            amount_paid: Decimal::ZERO,
            attempts: Vec::new(),
            selected_members,
            checked_in: false,
            checked_in_at: None,
        }
    }

    fn push_attempt(&mut self, status: PaymentStatus, error: Option<String>) {
        self.attempts.push(PaymentAttempt {
            at: Utc::now(),
            order_id: self.order_id.clone(),
            status,
            error,
        });
    }

    /// Records a freshly created gateway order and (re-)enters `Initiated`.
    pub fn record_order(&mut self, order_id: String) {
        self.order_id = Some(order_id);
        self.status = PaymentStatus::Initiated;
        self.push_attempt(PaymentStatus::Initiated, None);
    }

    /// Settles a free event entry without gateway involvement.
    pub fn settle_free(&mut self) {
        self.status = PaymentStatus::Paid;
        self.amount_expected = Decimal::ZERO;
        self.amount_paid = Decimal::ZERO;
        self.push_attempt(PaymentStatus::Paid, None);
    }

    /// Applies a `payment.captured` notification. Returns `false` when this
    /// payment id was already applied or the record is already refunded, so
    /// redelivered and reordered webhooks converge without re-mutating.
    pub fn capture(&mut self, payment_id: &str, amount_paid: Decimal) -> bool {
        if self.payment_id.as_deref() == Some(payment_id) {
            return false;
        }
        if self.status == PaymentStatus::Refunded {
            return false;
        }
        self.status = PaymentStatus::Paid;
        self.payment_id = Some(payment_id.to_string());
        self.amount_paid = amount_paid;
        self.push_attempt(PaymentStatus::Paid, None);
        true
    }

    /// Applies a `payment.failed` notification with the gateway's description.
    /// Returns `false` when the record is already settled or refunded: the
    /// gateway may deliver a stale failure after the capture, and a failure
    /// must never downgrade a paid record.
    pub fn fail(&mut self, error: Option<String>) -> bool {
        if self.status.is_settled() || self.status == PaymentStatus::Refunded {
            return false;
        }
        self.status = PaymentStatus::Failed;
        self.push_attempt(PaymentStatus::Failed, error);
        true
    }

    /// Applies a `refund.created` notification. The owning team's lock is not
    /// touched here; unlocking after a refund is an explicit administrative act.
    pub fn refund(&mut self) {
        self.status = PaymentStatus::Refunded;
        self.push_attempt(PaymentStatus::Refunded, None);
    }

    /// Administrator-asserted payment proof received out of band.
    pub fn mark_manual_verified(&mut self) {
        self.status = PaymentStatus::ManualVerified;
        self.push_attempt(PaymentStatus::ManualVerified, None);
    }

    /// At-most-once admission. Distinguishes "duplicate scan" from "invalid
    /// code" so the operator can tell the two apart.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.status.is_settled() {
            return Err(FestError::Unpaid {
                status: self.status,
            });
        }
        if self.checked_in {
            return Err(FestError::AlreadyCheckedIn);
        }
        self.checked_in = true;
        self.checked_in_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn registration() -> Registration {
        Registration::new(
            TeamId::new("t1"),
            EventId::new("e1"),
            dec!(400),
            vec![ProfileId::new("leader")],
        )
    }

    #[test]
    fn test_capture_is_idempotent_per_payment_id() {
        let mut reg = registration();
        reg.record_order("order_1".to_string());

        assert!(reg.capture("pay_1", dec!(400)));
        assert_eq!(reg.status, PaymentStatus::Paid);
        assert_eq!(reg.amount_paid, dec!(400));
        let attempts_after_first = reg.attempts.len();

        // Redelivery of the same webhook must not mutate anything.
        assert!(!reg.capture("pay_1", dec!(400)));
        assert_eq!(reg.attempts.len(), attempts_after_first);
    }

    #[test]
    fn test_failed_then_retried_appends_attempts() {
        let mut reg = registration();
        reg.record_order("order_1".to_string());
        assert!(reg.fail(Some("card declined".to_string())));
        assert_eq!(reg.status, PaymentStatus::Failed);

        reg.record_order("order_2".to_string());
        assert_eq!(reg.status, PaymentStatus::Initiated);
        assert_eq!(reg.order_id.as_deref(), Some("order_2"));

        assert_eq!(reg.attempts.len(), 3);
        assert_eq!(
            reg.attempts[1].error.as_deref(),
            Some("card declined")
        );
    }

    #[test]
    fn test_check_in_requires_settlement() {
        let mut reg = registration();
        let err = reg.check_in(Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            FestError::Unpaid {
                status: PaymentStatus::Initiated
            }
        ));

        reg.record_order("order_1".to_string());
        reg.capture("pay_1", dec!(400));
        reg.check_in(Utc::now()).unwrap();
        assert!(reg.checked_in);
        assert!(reg.checked_in_at.is_some());

        assert!(matches!(
            reg.check_in(Utc::now()),
            Err(FestError::AlreadyCheckedIn)
        ));
    }

    #[test]
    fn test_manual_verified_counts_as_settled() {
        let mut reg = registration();
        reg.mark_manual_verified();
        assert!(reg.status.is_settled());
        reg.check_in(Utc::now()).unwrap();
    }

    #[test]
    fn test_stale_failure_does_not_downgrade_paid() {
        let mut reg = registration();
        reg.record_order("order_1".to_string());
        assert!(reg.capture("pay_1", dec!(400)));

        // The gateway reorders deliveries: the failure lands after the capture.
        assert!(!reg.fail(Some("late delivery".to_string())));
        assert_eq!(reg.status, PaymentStatus::Paid);
        assert_eq!(reg.amount_paid, dec!(400));
        assert_eq!(reg.attempts.len(), 2);
    }

    #[test]
    fn test_refunded_record_cannot_be_resurrected() {
        let mut reg = registration();
        reg.record_order("order_1".to_string());
        reg.capture("pay_1", dec!(400));
        reg.refund();

        assert!(!reg.capture("pay_2", dec!(400)));
        assert!(!reg.fail(None));
        assert_eq!(reg.status, PaymentStatus::Refunded);
        assert_eq!(reg.payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_refund_preserves_audit_trail() {
        let mut reg = registration();
        reg.record_order("order_1".to_string());
        reg.capture("pay_1", dec!(400));
        reg.refund();

        assert_eq!(reg.status, PaymentStatus::Refunded);
        assert_eq!(reg.attempts.len(), 3);
        // Correlation ids survive for the audit trail.
        assert_eq!(reg.payment_id.as_deref(), Some("pay_1"));
    }
}
