//! Domain models for Vigil.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod blocked_attempt;
pub mod device;
pub mod permission;
pub mod role;
pub mod session;
pub mod suspicious_login;
pub mod user;
