//! Application engines orchestrating the domain entities.
//!
//! Each engine owns handles to the stores it needs and performs short-lived
//! read-validate-write sequences; guards are re-checked immediately before
//! every mutating write.

pub mod checkin;
pub mod ledger;
pub mod membership;
