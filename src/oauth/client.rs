use super::{IdentityProvider, OAuthError, ProviderEndpoints};
use crate::models::IdentityAssertion;
use crate::oauth::profile::assertion_from_userinfo;
use crate::settings::ProviderSettings;
use crate::utils::logging::LoggingHelper;
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Authorization-code client for a single configured provider
pub struct OAuthClient {
    name: String,
    authorization_endpoint: url::Url,
    token_endpoint: url::Url,
    userinfo_endpoint: url::Url,
    scopes: Vec<String>,
    extra_auth_params: Vec<(String, String)>,
    client_id: String,
    client_secret: Option<String>,
    endpoints: ProviderEndpoints,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// # Errors
    ///
    /// Returns an error if an endpoint is not an absolute URL or the HTTP
    /// client cannot be built
    pub fn new(
        settings: &ProviderSettings,
        endpoints: ProviderEndpoints,
        client_id: String,
        client_secret: Option<String>,
    ) -> Result<Self, OAuthError> {
        let parse = |label: &str, value: &str| {
            url::Url::parse(value).map_err(|e| {
                OAuthError::Configuration(format!(
                    "{} {label} endpoint '{value}' is invalid: {e}",
                    settings.name
                ))
            })
        };

        // The return route is GET only; a form_post return would arrive
        // without the SameSite=Lax pending-claim cookie
        let mut extra_auth_params: Vec<(String, String)> = settings
            .extra_auth_params
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, value)| {
                let keep = key != "response_mode";
                if !keep {
                    warn!("Ignoring response_mode={value} for {}", settings.name);
                }
                keep
            })
            .collect();
        extra_auth_params.sort();

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| OAuthError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: settings.name.clone(),
            authorization_endpoint: parse("authorization", &settings.authorization_endpoint)?,
            token_endpoint: parse("token", &settings.token_endpoint)?,
            userinfo_endpoint: parse("userinfo", &settings.userinfo_endpoint)?,
            scopes: settings.scopes.clone(),
            extra_auth_params,
            client_id,
            client_secret,
            endpoints,
            http_client,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", self.endpoints.return_url.as_str());
        params.insert("client_id", self.client_id.as_str());
        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret.as_str());
        }

        LoggingHelper::log_token_exchange_start(&self.name);
        let response = self
            .http_client
            .post(self.token_endpoint.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuthError::TokenExchange(format!(
                "status {status}: {error_text}"
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("failed to read response: {e}")))?;

        serde_json::from_str(&response_text)
            .map_err(|e| OAuthError::TokenExchange(format!("failed to parse response: {e}")))
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<serde_json::Value, OAuthError> {
        let response = self
            .http_client
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::UserInfo(format!("status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OAuthError::UserInfo(format!("failed to read response: {e}")))?;
        LoggingHelper::log_userinfo_raw(&self.name, &body);

        serde_json::from_str(&body)
            .map_err(|e| OAuthError::UserInfo(format!("failed to parse response: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        let mut url = self.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.endpoints.return_url)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state);
            for (key, value) in &self.extra_auth_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    async fn fetch_assertion(&self, code: &str) -> Result<Option<IdentityAssertion>, OAuthError> {
        let token = self.exchange_code(code).await?;
        let profile = self.fetch_userinfo(&token.access_token).await?;
        Ok(assertion_from_userinfo(&profile))
    }
}
