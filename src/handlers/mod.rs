// HTTP surface over the portal workflows
pub mod auth;
pub mod data;
pub mod system;
pub mod types;


use actix_web::web;

pub use auth::login;
pub use data::{daily_procedures, list_clients, list_comandas};
pub use system::{health, statuses};

/// Register every route
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/auth/login", web::post().to(login))
        .route("/api/comandas", web::get().to(list_comandas))
        .route("/api/procedures/daily", web::post().to(daily_procedures))
        .route("/api/clients", web::get().to(list_clients))
        .route("/api/statuses", web::get().to(statuses))
        .route("/health", web::get().to(health));
}
