// Centralized log lines for the provider handshake and reconciliation
use crate::models::{EmailClaim, IdentityAssertion};
use log::{debug, error, info, warn};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log the startup-derived provider endpoints
    pub fn log_provider_endpoints(provider: &str, hostname: &str, return_url: &str, realm: &str) {
        debug!("{provider} hostname {hostname}");
        debug!("{provider} return_url {return_url}");
        debug!("{provider} realm {realm}");
    }

    pub fn log_provider_configured(display_name: &str, provider_name: &str) {
        info!("✅ {display_name} sign-in configured ({provider_name})");
    }

    pub fn log_provider_not_configured(display_name: &str) {
        info!("❌ {display_name} sign-in not configured - missing client credentials");
    }

    pub fn log_provider_disabled(provider_name: &str) {
        info!("⏭️  Provider {provider_name} is disabled, skipping");
    }

    pub fn log_providers_summary(provider_names: &[&str]) {
        info!("🎯 Configured identity providers: {provider_names:?}");
    }

    /// Provider returned no user object or no email list at all
    pub fn log_no_emails(provider: &str, assertion: Option<&IdentityAssertion>) {
        match assertion {
            Some(assertion) => warn!(
                "{provider} should have returned a list of emails for {}, got none",
                assertion.identifier
            ),
            None => warn!("{provider} should have returned a user with emails, got no user"),
        }
    }

    /// One claim in the list lacks its value
    pub fn log_missing_email_value(provider: &str, index: usize, claim: &EmailClaim) {
        warn!("{provider} should have a value on every email claim, claim {index} was {claim:?}");
    }

    pub fn log_no_pending_claim(provider: &str) {
        warn!("{provider} return reached with no pending email claim in the session");
    }

    pub fn log_email_matched(provider: &str, identifier: &str) {
        info!("{provider} assertion {identifier} matched the pending claim");
    }

    /// Every usable claim was compared and none matched
    pub fn log_no_email_matched(provider: &str, assertion: &IdentityAssertion) {
        error!(
            "No email matched for {provider} assertion {}: {:?}",
            assertion.identifier, assertion.email_claims
        );
    }

    pub fn log_token_exchange_start(provider: &str) {
        info!("🔄 Exchanging authorization code for tokens with {provider}");
    }

    pub fn log_userinfo_raw(provider: &str, body: &str) {
        debug!("Raw {provider} userinfo response: {body}");
    }

    /// Log return endpoint details in development mode
    pub fn log_return_debug(req: &actix_web::HttpRequest, callback: &crate::oauth::OAuthCallback) {
        debug!("Provider return received via {}: {callback:?}", req.method());
        debug!("Return request connection info: {:?}", req.connection_info());
    }
}
