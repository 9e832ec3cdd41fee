//! Identity provider integration
//!
//! The provider handshake is plumbing around the reconciler: build the
//! authorization redirect, and on return turn the authorization code into an
//! [`IdentityAssertion`](crate::models::IdentityAssertion).

pub mod client;
pub mod endpoints;
pub mod profile;

pub use client::OAuthClient;
pub use endpoints::ProviderEndpoints;

use crate::models::IdentityAssertion;
use crate::settings::ClaimcheckSettings;
use crate::utils::crypto::{decrypt_data, encrypt_data};
use crate::utils::logging::LoggingHelper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth provider error: {0}")]
    Provider(String),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Userinfo request failed: {0}")]
    UserInfo(String),
    #[error("Invalid OAuth state: {0}")]
    State(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A configured identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// URL that starts the handshake, carrying `state` back to the return route
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's authorization endpoint is unusable
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Exchange an authorization code for the provider's identity assertion.
    ///
    /// `Ok(None)` means the exchange succeeded but the provider returned no
    /// usable user object.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or userinfo request fails
    async fn fetch_assertion(&self, code: &str) -> Result<Option<IdentityAssertion>, OAuthError>;
}

/// Parameters the provider sends to the return route
#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// OAuth state structure for CSRF protection and flow tracking
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub state: String,
    pub provider: String,
}

/// Encrypt `state` for the `state` query parameter
///
/// # Errors
///
/// Returns an error if encryption fails
pub fn encrypt_state(state: &OAuthState, key: &[u8]) -> Result<String, OAuthError> {
    encrypt_data(state, key).map_err(|e| OAuthError::State(format!("encryption failed: {e}")))
}

/// Decrypt the returned `state` parameter and check it was issued for `provider`
///
/// # Errors
///
/// Returns an error if the state cannot be decrypted or names another provider
pub fn get_state_from_callback(
    received_state: &str,
    provider: &str,
    key: &[u8],
) -> Result<OAuthState, OAuthError> {
    log::debug!(
        "Received OAuth state parameter: length = {} characters",
        received_state.len()
    );

    let state = decrypt_data::<OAuthState>(received_state, key).map_err(|e| {
        log::debug!("Failed to decrypt OAuth state: {e}");
        OAuthError::State("cannot decrypt state parameter".to_string())
    })?;

    if state.provider != provider {
        return Err(OAuthError::State(format!(
            "state issued for {} returned to {provider}",
            state.provider
        )));
    }

    Ok(state)
}

/// Identity providers by name, fixed at startup
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an [`OAuthClient`] for every enabled provider with credentials
    ///
    /// # Errors
    ///
    /// Returns an error if a configured provider has invalid endpoints
    pub fn from_settings(settings: &ClaimcheckSettings) -> Result<Self, OAuthError> {
        let mut registry = Self::new();

        for provider in settings.providers.iter().filter(|p| !p.enabled) {
            LoggingHelper::log_provider_disabled(&provider.name);
        }

        for provider in settings.get_enabled_providers() {
            let (Some(client_id), client_secret) =
                (provider.get_client_id(), provider.get_client_secret())
            else {
                LoggingHelper::log_provider_not_configured(provider.label());
                continue;
            };

            let endpoints = ProviderEndpoints::new(&settings.application, &provider.name);
            let client = OAuthClient::new(provider, endpoints, client_id, client_secret)?;
            registry.register(Arc::new(client));
            LoggingHelper::log_provider_configured(provider.label(), &provider.name);
        }

        LoggingHelper::log_providers_summary(&registry.names());
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
