//! Test fixtures providing pre-built test objects
//!
//! Commonly used settings, assertions and session managers, so tests do not
//! rebuild the same objects by hand.

use crate::models::{IdentityAssertion, PendingClaim};
use crate::session::SessionManager;
use crate::settings::{ClaimcheckSettings, CookieSettings, ProviderSettings, SessionSettings};
use actix_web::cookie::Cookie;
use actix_web::test::TestRequest;
use actix_web::HttpRequest;

use super::constants::{
    TEST_CLAIMED_EMAIL, TEST_PROVIDER, TEST_PROVIDER_EMAIL, TEST_REDIRECT, TEST_SESSION_SECRET,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Settings with a fixed secret, plain-HTTP cookies and one provider
    #[must_use]
    pub fn settings() -> ClaimcheckSettings {
        ClaimcheckSettings {
            session: SessionSettings {
                session_secret: String::from_utf8_lossy(TEST_SESSION_SECRET).into_owned(),
                ..SessionSettings::default()
            },
            cookies: CookieSettings { secure: false },
            providers: vec![Self::provider_settings(TEST_PROVIDER)],
            ..ClaimcheckSettings::default()
        }
    }

    #[must_use]
    pub fn provider_settings(name: &str) -> ProviderSettings {
        ProviderSettings {
            name: name.to_string(),
            authorization_endpoint: format!("https://{name}.test/authorize"),
            token_endpoint: format!("https://{name}.test/token"),
            userinfo_endpoint: format!("https://{name}.test/userinfo"),
            client_id: Some(format!("{name}-client")),
            client_secret: Some(format!("{name}-secret")),
            ..ProviderSettings::default()
        }
    }

    #[must_use]
    pub fn session_manager() -> SessionManager {
        SessionManager::new(TEST_SESSION_SECRET, false, 24, 15)
    }

    /// Pending claim for the standard test email and redirect
    #[must_use]
    pub fn pending_claim() -> PendingClaim {
        PendingClaim::new(TEST_CLAIMED_EMAIL, TEST_REDIRECT)
    }

    /// Assertion whose single email matches [`Self::pending_claim`]
    #[must_use]
    pub fn matching_assertion() -> IdentityAssertion {
        IdentityAssertion::with_emails("https://me.yahoo.test/a/fixture", &[TEST_PROVIDER_EMAIL])
    }

    #[must_use]
    pub fn mismatching_assertion() -> IdentityAssertion {
        IdentityAssertion::with_emails(
            "https://me.yahoo.test/a/other",
            &["someone@else.test", "another@else.test"],
        )
    }

    /// # Panics
    ///
    /// Panics if the cookie cannot be encrypted
    #[must_use]
    pub fn pending_claim_cookie(manager: &SessionManager) -> Cookie<'static> {
        manager
            .pending_claim_cookie(&Self::pending_claim())
            .expect("encrypt pending claim")
    }

    #[must_use]
    pub fn request_with_cookie(cookie: Cookie) -> HttpRequest {
        TestRequest::default().cookie(cookie).to_http_request()
    }
}
