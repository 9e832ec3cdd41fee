//! Session Manager - Stateless Encrypted Session Handling
//!
//! The `SessionManager` reads the encrypted pending-claim and user cookies of
//! an incoming request into a [`RequestSession`], and turns whatever the
//! request changed back into `Set-Cookie` headers. It never stores anything
//! server-side.

use crate::models::{CurrentUser, PendingClaim};
use crate::session::cookie::{
    capped_lifetime_minutes, CookieFactory, PENDING_CLAIM_COOKIE, USER_COOKIE_NAME,
};
use crate::session::PendingClaimStore;
use crate::settings::ClaimcheckSettings;
use crate::utils::crypto::derive_encryption_key;
use actix_web::cookie::Cookie;
use actix_web::HttpRequest;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::debug;

/// Session state of a single request.
///
/// Mutations are recorded rather than written immediately, so a failed
/// reconciliation leaves the browser's cookies untouched.
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    claimed_email: Option<String>,
    redirect_target: Option<String>,
    pending_created_at: Option<DateTime<Utc>>,
    pending_modified: bool,
    current_user: Option<String>,
}

impl RequestSession {
    #[must_use]
    pub fn from_pending_claim(claim: Option<PendingClaim>) -> Self {
        claim.map_or_else(Self::default, |claim| Self {
            claimed_email: Some(claim.claimed_email),
            redirect_target: Some(claim.redirect_target),
            pending_created_at: Some(claim.created_at),
            ..Self::default()
        })
    }

    /// Whether the pending claim was cleared or changed during this request
    #[must_use]
    pub fn pending_modified(&self) -> bool {
        self.pending_modified
    }

    /// User set during this request, if any
    #[must_use]
    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }
}

impl PendingClaimStore for RequestSession {
    fn claimed_email(&self) -> Option<String> {
        self.claimed_email.clone()
    }

    fn redirect_target(&self) -> Option<String> {
        self.redirect_target.clone()
    }

    fn clear_claimed_email(&mut self) {
        self.claimed_email = None;
        self.pending_modified = true;
    }

    fn clear_redirect_target(&mut self) {
        self.redirect_target = None;
        self.pending_modified = true;
    }

    fn set_current_user(&mut self, email: &str) {
        self.current_user = Some(email.to_string());
    }
}

/// Session Manager for stateless encrypted session handling
#[derive(Clone)]
pub struct SessionManager {
    encryption_key: [u8; 32],
    cookie_factory: CookieFactory,
    pending_claim_ttl: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        key: &[u8],
        cookie_secure: bool,
        session_duration_hours: u64,
        pending_claim_minutes: u64,
    ) -> Self {
        let encryption_key = derive_encryption_key(key);
        let cookie_factory = CookieFactory::new(
            encryption_key,
            cookie_secure,
            session_duration_hours,
            pending_claim_minutes,
        );

        Self {
            encryption_key,
            cookie_factory,
            pending_claim_ttl: Duration::minutes(capped_lifetime_minutes(pending_claim_minutes)),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ClaimcheckSettings) -> Self {
        Self::new(
            settings.session.session_secret.as_bytes(),
            settings.cookies.secure,
            settings.session.session_duration_hours,
            settings.session.pending_claim_minutes,
        )
    }

    /// Key used for cookies and the OAuth state parameter
    #[must_use]
    pub fn encryption_key(&self) -> &[u8] {
        &self.encryption_key
    }

    /// Cookie recording the claim a user makes before the provider redirect
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn pending_claim_cookie(&self, claim: &PendingClaim) -> Result<Cookie<'static>> {
        self.cookie_factory.create_pending_claim_cookie(claim)
    }

    /// Load the pending claim from the request's cookies.
    ///
    /// A claim older than the configured lifetime is treated as absent even
    /// if the browser still sent it.
    #[must_use]
    pub fn load_request_session(&self, req: &HttpRequest) -> RequestSession {
        let claim = self
            .cookie_factory
            .read_cookie::<PendingClaim>(req, PENDING_CLAIM_COOKIE)
            .filter(|claim| {
                let fresh = Utc::now() - claim.created_at <= self.pending_claim_ttl;
                if !fresh {
                    debug!("Ignoring pending claim created at {}", claim.created_at);
                }
                fresh
            });

        RequestSession::from_pending_claim(claim)
    }

    /// Translate a request session's recorded changes into cookies
    ///
    /// # Errors
    ///
    /// Returns an error if a cookie cannot be encrypted
    pub fn session_cookies(
        &self,
        session: &RequestSession,
        provider: &str,
    ) -> Result<Vec<Cookie<'static>>> {
        let mut cookies = Vec::new();

        if session.pending_modified {
            match (&session.claimed_email, &session.redirect_target) {
                (None, None) => {
                    cookies.push(self.cookie_factory.create_expired_cookie(PENDING_CLAIM_COOKIE));
                }
                (claimed_email, redirect_target) => {
                    let remaining = PendingClaim {
                        claimed_email: claimed_email.clone().unwrap_or_default(),
                        redirect_target: redirect_target.clone().unwrap_or_default(),
                        created_at: session.pending_created_at.unwrap_or_else(Utc::now),
                    };
                    cookies.push(self.cookie_factory.create_pending_claim_cookie(&remaining)?);
                }
            }
        }

        if let Some(email) = &session.current_user {
            let user = CurrentUser {
                email: email.clone(),
                provider: provider.to_string(),
                authenticated_at: Utc::now(),
            };
            cookies.push(self.cookie_factory.create_user_cookie(&user)?);
        }

        Ok(cookies)
    }

    /// Authenticated user of the request, if any
    #[must_use]
    pub fn current_user(&self, req: &HttpRequest) -> Option<CurrentUser> {
        self.cookie_factory.read_cookie(req, USER_COOKIE_NAME)
    }
}
