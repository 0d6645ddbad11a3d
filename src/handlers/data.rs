// Data handlers: every call carries the caller's token as a bearer header
use actix_web::{web, HttpRequest, HttpResponse};

use super::types::{DailyScheduleRequest, DailyScheduleResponse};
use crate::error::PortalError;
use crate::orchestrator::{ComandaQuery, DataOperation, Orchestrator, PortalWorkflow};
use crate::session::{RequestContext, TenantParams};
use crate::status::StatusRegistry;
use crate::utils::headers::{bearer_token, header_value, PORTAL_HEADER, STRUCTURE_HEADER};

/// Resolve the portal and build a fresh context for this request
fn resolve<'a>(
    req: &HttpRequest,
    orchestrator: &'a Orchestrator,
    operation: DataOperation,
) -> Result<(&'a PortalWorkflow, RequestContext), PortalError> {
    let portal = header_value(req, PORTAL_HEADER);
    let workflow = orchestrator.portal(portal.as_deref(), Some(operation))?;
    let params = TenantParams {
        structure_id: header_value(req, STRUCTURE_HEADER),
    };
    let context = workflow.context(bearer_token(req).as_deref(), &params)?;
    Ok((workflow, context))
}

/// `GET /api/comandas?date=YYYY-MM-DD&status=&kind=`
///
/// # Errors
///
/// Returns the orchestrator's error for the list call; detail failures are
/// reported per record.
pub async fn list_comandas(
    req: HttpRequest,
    query: web::Query<ComandaQuery>,
    orchestrator: web::Data<Orchestrator>,
) -> Result<HttpResponse, PortalError> {
    let (workflow, context) = resolve(&req, &orchestrator, DataOperation::Comandas)?;
    let comandas = workflow.list_comandas(&context, &query).await?;
    Ok(HttpResponse::Ok().json(comandas))
}

/// `POST /api/procedures/daily`
///
/// # Errors
///
/// Returns [`PortalError::InvalidRequest`] for a malformed date and the
/// scheduler call's failure otherwise.
pub async fn daily_procedures(
    req: HttpRequest,
    body: web::Json<DailyScheduleRequest>,
    orchestrator: web::Data<Orchestrator>,
) -> Result<HttpResponse, PortalError> {
    let (workflow, context) = resolve(&req, &orchestrator, DataOperation::DailySchedule)?;
    let procedures = workflow.daily_appointments(&context, &body.date).await?;

    let by_status = StatusRegistry::group_by_status(procedures.clone(), |p| &p.status)
        .into_iter()
        .map(|(id, group)| (id, group.len()))
        .collect();

    Ok(HttpResponse::Ok().json(DailyScheduleResponse {
        success: true,
        date: body.date.clone(),
        total: procedures.len(),
        procedures,
        by_status,
    }))
}

/// `GET /api/clients`
///
/// # Errors
///
/// Returns the list call's failure.
pub async fn list_clients(
    req: HttpRequest,
    orchestrator: web::Data<Orchestrator>,
) -> Result<HttpResponse, PortalError> {
    let (workflow, context) = resolve(&req, &orchestrator, DataOperation::Clients)?;
    let clients = workflow.list_clients(&context).await?;
    Ok(HttpResponse::Ok().json(clients))
}
