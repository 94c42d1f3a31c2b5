//! Kernel module - server infrastructure and dependencies.

pub mod delivery;
pub mod deps;
pub mod session_client;
pub mod store;
pub mod test_dependencies;
pub mod traits;

pub use delivery::{NoopDeliveryChannel, WebhookDeliveryChannel};
pub use deps::{AuthSettings, PreludeAdapter, ServerDeps};
pub use session_client::SessionServiceClient;
pub use store::PostgresAuthStore;
pub use test_dependencies::TestDependencies;
pub use traits::*;
