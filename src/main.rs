#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_web::{middleware::Logger, web, App, HttpServer};
use claimcheck::{
    configure_services, metrics::sink_from_settings, oauth::ProviderEndpoints, ClaimcheckSettings,
    ProviderRegistry, SessionManager, VERSION,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also initializes the logger
    let settings = ClaimcheckSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let registry = ProviderRegistry::from_settings(&settings)
        .map_err(|e| std::io::Error::other(format!("Failed to initialize providers: {e}")))?;

    start_server(registry, settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if binding or starting the server fails
async fn start_server(registry: ProviderRegistry, settings: ClaimcheckSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings, &registry);

    let session_manager = SessionManager::from_settings(&settings);
    let metrics = web::Data::new(sink_from_settings(&settings.metrics));
    let registry = web::Data::new(registry);
    let session_manager = web::Data::new(session_manager);
    let settings = web::Data::new(settings);

    HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .app_data(session_manager.clone())
            .app_data(settings.clone())
            .app_data(metrics.clone())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &ClaimcheckSettings, registry: &ProviderRegistry) {
    println!("Starting claimcheck {VERSION} on http://{bind_address}");
    println!();
    println!("Sign-in endpoints:");
    println!("  GET      /auth/{{provider}}?email=&rd= - Record the claimed email, go to the provider");
    println!("  GET      /auth/{{provider}}/return     - Provider return, reconcile the claim");
    println!("  GET      /auth/whoami                 - Current user");
    println!("  GET      /metrics                     - Prometheus metrics, when enabled");
    println!();
    println!("Provider return URLs:");
    for name in registry.names() {
        let endpoints = ProviderEndpoints::new(&settings.application, name);
        println!("  {name}: {}", endpoints.return_url);
    }
    println!();
    println!("System endpoints:");
    println!("  GET  /ping            - Health check");
}
