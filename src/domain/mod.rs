//! Domain entities and the ports they are persisted through.
//!
//! Entities enforce their own invariants through guarded mutators; the
//! application layer composes them and re-validates guards immediately before
//! every store write, since the stores only guarantee per-document atomicity.

pub mod event;
pub mod ports;
pub mod profile;
pub mod registration;
pub mod team;
