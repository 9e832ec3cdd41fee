// Sign-in start: record the claim, then hand the browser to the provider
use crate::models::PendingClaim;
use crate::oauth::{encrypt_state, OAuthState, ProviderRegistry};
use crate::session::SessionManager;
use crate::settings::ClaimcheckSettings;
use crate::utils::crypto::generate_csrf_token;
use crate::utils::redirect_validator::validate_post_auth_redirect;
use crate::utils::response_builder::ResponseBuilder;
use actix_web::{web, HttpResponse, Result};
use log::{debug, error, warn};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct SignInQuery {
    /// Email the user claims to own
    pub email: Option<String>,
    /// Where to land after a verified sign-in
    pub rd: Option<String>,
}

/// `GET /auth/{provider}`
pub async fn provider_sign_in(
    path: web::Path<String>,
    query: web::Query<SignInQuery>,
    registry: web::Data<ProviderRegistry>,
    session_manager: web::Data<SessionManager>,
    settings: web::Data<ClaimcheckSettings>,
) -> Result<HttpResponse> {
    let provider_name = path.into_inner();

    let Some(provider) = registry.get(&provider_name) else {
        warn!("Sign-in requested for unsupported provider {provider_name}");
        return Ok(ResponseBuilder::error_redirect(
            &settings.routes.login_path,
            "unsupported_provider",
        ));
    };

    let state = OAuthState {
        state: generate_csrf_token(),
        provider: provider_name.clone(),
    };
    let authorization_url = match encrypt_state(&state, session_manager.encryption_key())
        .and_then(|encrypted| provider.authorization_url(&encrypted))
    {
        Ok(url) => url,
        Err(e) => {
            error!("Failed to build {provider_name} authorization URL: {e}");
            return Ok(ResponseBuilder::error_redirect(
                &settings.routes.error_path,
                "auth_failed",
            ));
        }
    };

    let mut cookies = Vec::new();
    if let Some(email) = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        let redirect_target = resolve_redirect_target(query.rd.as_deref(), &settings);
        let claim = PendingClaim::new(email, redirect_target);
        match session_manager.pending_claim_cookie(&claim) {
            Ok(cookie) => cookies.push(cookie),
            Err(e) => {
                error!("Failed to store pending claim: {e}");
                return Ok(ResponseBuilder::error_redirect(
                    &settings.routes.error_path,
                    "auth_failed",
                ));
            }
        }
    } else {
        debug!("{provider_name} sign-in started without an email claim");
    }

    Ok(ResponseBuilder::redirect(&authorization_url, Some(cookies)))
}

/// Validated `rd`, or the configured default
fn resolve_redirect_target(rd: Option<&str>, settings: &ClaimcheckSettings) -> String {
    match rd {
        Some(target) => validate_post_auth_redirect(target).unwrap_or_else(|e| {
            warn!("Rejected post-login redirect {target:?}: {e}");
            settings.routes.default_redirect.clone()
        }),
        None => settings.routes.default_redirect.clone(),
    }
}
