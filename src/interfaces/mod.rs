//! Boundary codecs: the gateway webhook, the action script consumed by the
//! binary, and the final CSV report.

pub mod report;
pub mod script;
pub mod webhook;
