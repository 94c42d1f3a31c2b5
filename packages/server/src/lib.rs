// Vitrina Platform Auth - service core
//
// Phone-identity reconciliation and session provisioning for the storefront
// platform: one-time-code challenges, provider-backed verification with a
// local fallback, idempotent account provisioning, role grants, and session
// exchange-token issuance.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
