// Auth domain actions - the flows behind the HTTP surface.

pub mod provision;
pub mod reissue_session;
pub mod request_code;
pub mod verify_code;

pub use provision::{decide, provision, ProvisionStep, ProvisionedIdentity};
pub use reissue_session::reissue_session;
pub use request_code::{request_code, RequestCodeOutcome};
pub use verify_code::{verify_code, VerifyOutcome};
