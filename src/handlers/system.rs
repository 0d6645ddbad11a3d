// Health and reference data
use actix_web::HttpResponse;
use chrono::{SecondsFormat, Utc};

use super::types::HealthResponse;
use crate::orchestrator::Orchestrator;

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "UP".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `GET /api/statuses`: canonical statuses in presentation order
pub async fn statuses() -> HttpResponse {
    HttpResponse::Ok().json(Orchestrator::statuses())
}
