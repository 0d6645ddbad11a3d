#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{anyhow, Context};
use portalkit::{handlers::configure_routes, settings::PortalSettings, Orchestrator, VERSION};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = PortalSettings::load().map_err(|e| anyhow!("Failed to load settings: {e}"))?;

    let orchestrator =
        Orchestrator::from_settings(&settings).context("Failed to initialize portals")?;

    start_server(orchestrator, settings).await
}

/// Start the HTTP surface
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(orchestrator: Orchestrator, settings: PortalSettings) -> anyhow::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let orchestrator = web::Data::new(orchestrator);
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                "Authorization",
                "Content-Type",
                "Accept",
                "x-organization-structure",
                "x-portal",
            ])
            .max_age(3600);

        App::new()
            .app_data(orchestrator.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("Server stopped with an error")
}

fn configure_services(cfg: &mut web::ServiceConfig) {
    configure_routes(cfg);
}

fn print_startup_info(bind_address: &str, settings: &PortalSettings) {
    println!("Starting portalkit {VERSION} on http://{bind_address}");
    println!();
    println!("Portals:");
    for portal in &settings.portals {
        println!(
            "  {:<10} {:?} login at {}",
            portal.name,
            portal.login_strategy,
            portal.url(&portal.login_path)
        );
    }
    println!();
    println!("Endpoints:");
    println!("  POST /api/auth/login      - Log into a portal, returns a session token");
    println!("  GET  /api/comandas        - Comandas of a day (?date=YYYY-MM-DD&status=&kind=)");
    println!("  POST /api/procedures/daily - Appointments of a day ({{\"date\": \"YYYY-MM-DD\"}})");
    println!("  GET  /api/clients         - Client list");
    println!("  GET  /api/statuses        - Canonical statuses");
    println!("  GET  /health              - Health check");
    println!();
    println!("Data calls take the token as 'Authorization: Bearer <token>',");
    println!("the structure as 'x-organization-structure' and the portal as 'x-portal'.");
}
