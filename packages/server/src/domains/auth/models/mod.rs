// Auth domain models. SQL stays here, on the row structs.

pub mod challenge;
pub mod credential;
pub mod profile;
pub mod role_grant;

pub use challenge::{Challenge, ChallengeStatus, CHALLENGE_TTL, DEFAULT_MAX_ATTEMPTS};
pub use credential::Credential;
pub use profile::Profile;
pub use role_grant::RoleGrant;
