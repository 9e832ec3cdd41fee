//! Testing utilities for claimcheck
//!
//! - [`fixtures`] - Pre-built settings, assertions and session managers
//! - [`mock`] - In-memory stand-ins for the session store, metrics sink and
//!   identity provider
//!
//! ## Usage
//!
//! ```rust,ignore
//! use claimcheck::testing::mock::{MemorySession, RecordingMetrics};
//!
//! let mut session = MemorySession::with_claim("claimed@bar.com", "/dashboard");
//! let metrics = std::sync::Arc::new(RecordingMetrics::default());
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;

/// Common test constants
pub mod constants {
    pub const TEST_PROVIDER: &str = "yahoo";

    pub const TEST_CLAIMED_EMAIL: &str = "CLAIMED@bar.com";

    pub const TEST_PROVIDER_EMAIL: &str = "claimed@bar.com";

    pub const TEST_REDIRECT: &str = "/dashboard";

    /// Session secret for predictable cookie encryption in tests
    pub const TEST_SESSION_SECRET: &[u8] = b"test_key_32_bytes_long_for_test_";
}
