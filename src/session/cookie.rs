use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::HttpRequest;
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{CurrentUser, PendingClaim};
use crate::utils::crypto::{decrypt_data, encrypt_data};

/// Common cookie names used across the application
pub const PENDING_CLAIM_COOKIE: &str = "claimcheck_pending";
pub const USER_COOKIE_NAME: &str = "claimcheck_user";

/// Upper bound on any configured cookie or claim lifetime (one year)
pub const MAX_LIFETIME_MINUTES: i64 = 365 * 24 * 60;

/// Configured minutes as a signed count, capped at [`MAX_LIFETIME_MINUTES`]
#[must_use]
pub fn capped_lifetime_minutes(minutes: u64) -> i64 {
    i64::try_from(minutes).map_or(MAX_LIFETIME_MINUTES, |m| m.min(MAX_LIFETIME_MINUTES))
}

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            // Lax so the cookie survives the top-level redirect back from the provider
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Duration::hours(24),
        }
    }
}

/// Cookie factory for creating encrypted cookies with proper configuration
#[derive(Clone)]
pub struct CookieFactory {
    encryption_key: [u8; 32],
    cookie_secure: bool,
    session_duration_hours: u64,
    pending_claim_minutes: u64,
}

impl CookieFactory {
    #[must_use]
    pub fn new(
        encryption_key: [u8; 32],
        cookie_secure: bool,
        session_duration_hours: u64,
        pending_claim_minutes: u64,
    ) -> Self {
        Self {
            encryption_key,
            cookie_secure,
            session_duration_hours,
            pending_claim_minutes,
        }
    }

    /// Generic method to create a cookie with encrypted data
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        options: CookieOptions,
    ) -> Result<Cookie<'static>> {
        let value = encrypt_data(data, &self.encryption_key)?;

        Ok(Cookie::build(name.to_owned(), value)
            .http_only(options.http_only)
            .secure(self.cookie_secure && options.secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the short-lived cookie holding the claim made before the provider redirect
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_pending_claim_cookie(&self, claim: &PendingClaim) -> Result<Cookie<'static>> {
        self.create_cookie(
            PENDING_CLAIM_COOKIE,
            claim,
            CookieOptions {
                max_age: Duration::minutes(capped_lifetime_minutes(self.pending_claim_minutes)),
                ..Default::default()
            },
        )
    }

    /// Create the cookie identifying the authenticated user
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_user_cookie(&self, user: &CurrentUser) -> Result<Cookie<'static>> {
        self.create_cookie(
            USER_COOKIE_NAME,
            user,
            CookieOptions {
                max_age: Duration::minutes(capped_lifetime_minutes(
                    self.session_duration_hours.saturating_mul(60),
                )),
                ..Default::default()
            },
        )
    }

    #[must_use]
    pub fn create_expired_cookie(&self, name: &str) -> Cookie<'static> {
        create_expired_cookie(name, self.cookie_secure)
    }

    /// Decrypt a named cookie from the request.
    ///
    /// Missing cookies and cookies that fail to decrypt both yield `None`;
    /// the latter is logged since it means tampering or a rotated secret.
    #[must_use]
    pub fn read_cookie<T: DeserializeOwned>(&self, req: &HttpRequest, name: &str) -> Option<T> {
        let cookie = req.cookie(name)?;
        if cookie.value().is_empty() {
            return None;
        }
        match decrypt_data::<T>(cookie.value(), &self.encryption_key) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("Failed to decrypt {name} cookie: {e}");
                None
            }
        }
    }
}

/// Build an already-expired cookie that makes the browser drop `name`
#[must_use]
pub fn create_expired_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(-1))
        .finish()
}
