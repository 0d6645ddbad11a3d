// Login handler: runs the portal's acquirer and hands the token to the caller
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;

use super::types::{LoginRequest, LoginResponse};
use crate::error::PortalError;
use crate::orchestrator::Orchestrator;
use crate::utils::headers::{header_value, PORTAL_HEADER};

/// `POST /api/auth/login`
///
/// # Errors
///
/// Returns [`PortalError::InvalidRequest`] for blank credentials or an unknown
/// portal, and [`PortalError::AuthenticationFailure`] when the login is rejected.
pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    orchestrator: web::Data<Orchestrator>,
) -> Result<HttpResponse, PortalError> {
    let portal = body
        .portal
        .clone()
        .or_else(|| header_value(&req, PORTAL_HEADER));
    let workflow = orchestrator.portal(portal.as_deref(), None)?;

    let credential = workflow
        .login(&body.credentials(), body.tenant.as_deref())
        .await?;
    info!("Issued session token for portal {}", workflow.name());

    Ok(HttpResponse::Ok().json(LoginResponse {
        success: true,
        token: credential.token().to_string(),
        message: "Login successful".to_string(),
    }))
}
