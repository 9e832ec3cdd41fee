// HTTP request handlers
pub mod auth;
pub mod callback;
pub mod health;

pub use auth::provider_sign_in;
pub use callback::provider_return;
pub use health::{health, metrics_export, whoami};

use actix_web::web;

/// Register every route on an app or test service
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route("/ping", web::get().to(health))
        .route("/metrics", web::get().to(metrics_export))
        .route("/auth/whoami", web::get().to(whoami))
        .route("/auth/{provider}/return", web::get().to(provider_return))
        .route("/auth/{provider}", web::get().to(provider_sign_in));
}
