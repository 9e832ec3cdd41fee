// Provider return handler
use crate::metrics::MetricsSink;
use crate::oauth::{get_state_from_callback, OAuthCallback, OAuthState, ProviderRegistry};
use crate::reconcile::{AssertionReconciler, SessionOutcome};
use crate::session::SessionManager;
use crate::settings::ClaimcheckSettings;
use crate::utils::logging::LoggingHelper;
use crate::utils::response_builder::ResponseBuilder;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::{debug, error};
use std::sync::Arc;

/// `GET /auth/{provider}/return`
///
/// Handshake failures (provider error, missing code, bad state, failed
/// exchange) send the user to the error page and leave the pending claim in
/// place so a retry can still succeed. Everything past the exchange is decided
/// by [`AssertionReconciler`].
pub async fn provider_return(
    path: web::Path<String>,
    query: web::Query<OAuthCallback>,
    req: HttpRequest,
    registry: web::Data<ProviderRegistry>,
    session_manager: web::Data<SessionManager>,
    settings: web::Data<ClaimcheckSettings>,
    metrics: web::Data<Arc<dyn MetricsSink>>,
) -> Result<HttpResponse> {
    let provider_name = path.into_inner();
    let callback = query.into_inner();
    LoggingHelper::log_return_debug(&req, &callback);

    let error_path = settings.routes.error_path.as_str();

    let Some(provider) = registry.get(&provider_name) else {
        error!("Return received for unsupported provider {provider_name}");
        return Ok(ResponseBuilder::error_redirect(error_path, "unsupported_provider"));
    };

    let code = match validate_callback(&callback, &provider_name, &session_manager) {
        Ok((code, _state)) => code,
        Err(reason) => return Ok(ResponseBuilder::error_redirect(error_path, reason)),
    };

    let assertion = match provider.fetch_assertion(&code).await {
        Ok(assertion) => assertion,
        Err(e) => {
            error!("Failed to obtain {provider_name} assertion: {e}");
            return Ok(ResponseBuilder::error_redirect(error_path, "auth_failed"));
        }
    };

    let mut session = session_manager.load_request_session(&req);
    let reconciler = AssertionReconciler::new(&provider_name, metrics.get_ref().clone())
        .with_default_redirect(&settings.routes.default_redirect);

    match reconciler.reconcile(assertion.as_ref(), &mut session) {
        SessionOutcome::Authenticated {
            redirect_target, ..
        } => match session_manager.session_cookies(&session, &provider_name) {
            Ok(cookies) => Ok(ResponseBuilder::success_redirect_with_cookies(
                &redirect_target,
                cookies,
            )),
            Err(e) => {
                error!("Failed to write {provider_name} session cookies: {e}");
                Ok(ResponseBuilder::redirect(error_path, None))
            }
        },
        SessionOutcome::Failed(reason) => {
            debug!("{provider_name} reconciliation failed: {reason}");
            Ok(ResponseBuilder::redirect(error_path, None))
        }
    }
}

/// Check the callback and return the code with its verified state, or the
/// `error` query value for the error page
fn validate_callback(
    callback: &OAuthCallback,
    provider: &str,
    session_manager: &SessionManager,
) -> std::result::Result<(String, OAuthState), &'static str> {
    if let Some(provider_error) = &callback.error {
        error!("{provider} returned an error: {provider_error}");
        return Err("auth_failed");
    }

    let Some(code) = callback.code.clone() else {
        error!("No authorization code received from {provider}");
        return Err("auth_failed");
    };

    let Some(received_state) = callback.state.as_deref() else {
        error!("No state parameter received from {provider}");
        return Err("oauth_state_error");
    };

    match get_state_from_callback(received_state, provider, session_manager.encryption_key()) {
        Ok(state) => {
            debug!("OAuth state verified for provider: {}", state.provider);
            Ok((code, state))
        }
        Err(e) => {
            error!("Failed to verify OAuth state: {e}");
            Err("oauth_state_error")
        }
    }
}
