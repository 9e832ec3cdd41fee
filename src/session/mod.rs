//! Session Management Module
//!
//! Sessions are stateless: the pending claim and the authenticated user both
//! live in AES-GCM encrypted cookies.
//!
//! # Modules
//!
//! - [`cookie`] - Cookie creation for pending claims and users
//! - [`manager`] - Loading per-request session state and turning it back into cookies

pub mod cookie;
pub mod manager;

pub use cookie::{CookieFactory, CookieOptions, PENDING_CLAIM_COOKIE, USER_COOKIE_NAME};
pub use manager::{RequestSession, SessionManager};

/// The narrow view of session state the reconciler works against.
///
/// Implementations own persistence and expiry; callers only read the pending
/// claim, clear it, and record who is now signed in.
pub trait PendingClaimStore {
    /// Email the user claimed before the provider redirect
    fn claimed_email(&self) -> Option<String>;

    /// Where to send the user after a verified match
    fn redirect_target(&self) -> Option<String>;

    fn clear_claimed_email(&mut self);

    fn clear_redirect_target(&mut self);

    /// Record the authenticated identity for this session
    fn set_current_user(&mut self, email: &str);
}
