use crate::metrics::MetricsSink;
use crate::models::HealthResponse;
use crate::session::SessionManager;
use crate::utils::response_builder::ResponseBuilder;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use std::sync::Arc;

/// `GET /ping`
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Claimcheck is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// `GET /auth/whoami`: the signed-in user, or 401
pub async fn whoami(
    req: HttpRequest,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    match session_manager.current_user(&req) {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Ok(ResponseBuilder::unauthorized_json("not signed in")),
    }
}

/// `GET /metrics`: Prometheus text exposition, 404 when metrics are disabled
pub async fn metrics_export(metrics: web::Data<Arc<dyn MetricsSink>>) -> Result<HttpResponse> {
    match metrics.render() {
        Some(body) => Ok(HttpResponse::Ok()
            .content_type("application/openmetrics-text; version=1.0.0; charset=utf-8")
            .body(body)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}
