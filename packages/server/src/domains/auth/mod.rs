//! Auth domain - phone-identity reconciliation and session provisioning.
//!
//! Flow: challenge lifecycle (models/challenge) -> verification adapter
//! (verification) -> identity resolution (identity) -> provisioning
//! (actions/provision) -> role grant (models/role_grant) -> session issuance
//! (session).

pub mod actions;
pub mod errors;
pub mod identity;
pub mod models;
pub mod session;
pub mod types;
pub mod verification;

pub use errors::AuthError;
pub use types::{Role, SessionCredential, VerifiedIdentity};
