#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the claimcheck application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod handlers;
pub mod metrics;
pub mod models;
pub mod oauth;
pub mod reconcile;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use handlers::{configure_services, health, provider_return, provider_sign_in, whoami};
pub use metrics::MetricsSink;
pub use models::{CurrentUser, EmailClaim, IdentityAssertion, PendingClaim};
pub use oauth::{IdentityProvider, ProviderRegistry};
pub use reconcile::{AssertionReconciler, ReconcileFailure, SessionOutcome};
pub use session::{PendingClaimStore, SessionManager};
pub use settings::ClaimcheckSettings;
