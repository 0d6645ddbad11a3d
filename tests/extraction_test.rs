// Data-surface workflows against an in-process fixture portal
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use portalkit::error::PortalError;
use portalkit::orchestrator::{ComandaQuery, PortalWorkflow};
use portalkit::session::TenantParams;
use portalkit::status::UNKNOWN_STATUS_ID;
use portalkit::testing::constants::{FIXTURE_AUTH_TOKEN, SLOW_RESPONSE_MS};
use portalkit::testing::{html, FixturePortal, TestFixtures};

fn authenticated(req: &HttpRequest) -> bool {
    req.headers()
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookies| cookies.contains(&format!("Authentication={FIXTURE_AUTH_TOKEN}")))
}

async fn comanda_list(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    if !authenticated(&req) {
        return HttpResponse::Ok().body(html::LOGIN_PAGE);
    }
    if query.get("parDataIni").map(String::as_str) != Some("01/05/2024") {
        return HttpResponse::BadRequest().body("unexpected date");
    }
    HttpResponse::Ok().json(html::comanda_list(&["C-1", "C-2", "C-3"]))
}

/// C-1 answers last, C-3 reports failure
async fn comanda_detail(form: web::Form<HashMap<String, String>>) -> HttpResponse {
    match form.get("id").map(String::as_str) {
        Some("C-1") => {
            actix_web::rt::time::sleep(Duration::from_millis(150)).await;
            HttpResponse::Ok().json(serde_json::json!({
                "sucesso": true,
                "dados": html::comanda_detail("777", "02/05/2024", "1042"),
            }))
        }
        Some("C-2") => HttpResponse::Ok().json(serde_json::json!({
            "sucesso": true,
            "dados": html::comanda_detail("778", "01/05/2024", "1041"),
        })),
        _ => HttpResponse::Ok().json(serde_json::json!({ "sucesso": false })),
    }
}

/// Client 778's form is broken on the portal side
async fn client_form(form: web::Form<HashMap<String, String>>) -> HttpResponse {
    match form.get("id").map(String::as_str) {
        Some("777") => HttpResponse::Ok().body(html::client_form("777")),
        _ => HttpResponse::InternalServerError().body("Erro interno"),
    }
}

async fn client_list(req: HttpRequest) -> HttpResponse {
    if authenticated(&req) {
        HttpResponse::Ok().json(html::client_list())
    } else {
        HttpResponse::Unauthorized().finish()
    }
}

async fn scheduler_read(req: HttpRequest, form: web::Form<HashMap<String, String>>) -> HttpResponse {
    let structure = req
        .headers()
        .get("x-organization-structure")
        .and_then(|v| v.to_str().ok());
    if structure != Some("60") || form.get("start").map(String::as_str) != Some("01/05/2024 00:00:00")
    {
        return HttpResponse::BadRequest().finish();
    }
    HttpResponse::Ok().json(html::schedule())
}

/// Detail look-ups after the list call find the session gone
async fn expired_comanda_detail() -> HttpResponse {
    HttpResponse::Ok().body(html::LOGIN_PAGE)
}

async fn good_comanda_detail() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "sucesso": 1,
        "dados": html::comanda_detail("777", "02/05/2024", "1042"),
    }))
}

async fn expired_client_form() -> HttpResponse {
    HttpResponse::Ok().body(html::LOGIN_PAGE)
}

async fn slow_scheduler_read() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_millis(SLOW_RESPONSE_MS)).await;
    HttpResponse::Ok().json(html::schedule())
}

/// Client address of every request the fixture saw
type Peers = web::Data<Mutex<Vec<SocketAddr>>>;

async fn recorded_client_list(req: HttpRequest, peers: Peers) -> HttpResponse {
    peers.lock().unwrap().extend(req.peer_addr());
    client_list(req).await
}

fn fixture_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/admin/financeiro/comanda/lista", web::get().to(comanda_list))
        .route("/admin/financeiro/comanda/abrir", web::post().to(comanda_detail))
        .route("/admin/clientes/form", web::post().to(client_form))
        .route("/admin/clientes/lista", web::get().to(client_list))
        .route("/Scheduler/Read", web::post().to(scheduler_read));
}

fn workflow(portal: &FixturePortal) -> PortalWorkflow {
    PortalWorkflow::new(&TestFixtures::portal(portal.base_url()), &TestFixtures::http()).unwrap()
}

#[actix_web::test]
async fn test_comandas_sorted_with_partial_failures() {
    let portal = FixturePortal::start(fixture_routes).unwrap();
    let workflow = workflow(&portal);
    let context = workflow
        .context(Some(FIXTURE_AUTH_TOKEN), &TenantParams::default())
        .unwrap();

    let comandas = workflow
        .list_comandas(&context, &ComandaQuery::for_date("2024-05-01"))
        .await
        .unwrap();

    let ids: Vec<&str> = comandas.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["C-2", "C-1", "C-3"]);

    let c1 = &comandas[1];
    assert_eq!(c1.number.as_deref(), Some("1042"));
    assert_eq!(c1.total_services, 2);
    assert!((c1.services_total_value - 165.5).abs() < 1e-9);
    assert_eq!(c1.client.email.as_deref(), Some("cliente777@example.com"));
    assert_eq!(c1.client.formatted_phone.as_deref(), Some("(82) 99999-1234"));

    // Contact look-up failed; the comanda itself is intact
    let c2 = &comandas[0];
    assert!(c2.detail_error.is_none());
    assert_eq!(c2.client.client_id.as_deref(), Some("778"));
    assert_eq!(c2.client.phone, None);

    let c3 = &comandas[2];
    assert!(c3.detail_error.is_some());
    assert!(c3.services.is_empty());

    portal.stop().await;
}

#[actix_web::test]
async fn test_login_page_served_as_data_is_authentication_failure() {
    let portal = FixturePortal::start(fixture_routes).unwrap();
    let workflow = workflow(&portal);
    let context = workflow
        .context(Some("expired"), &TenantParams::default())
        .unwrap();

    let err = workflow
        .list_comandas(&context, &ComandaQuery::for_date("2024-05-01"))
        .await
        .unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");

    let err = workflow.list_clients(&context).await.unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");

    portal.stop().await;
}

#[actix_web::test]
async fn test_daily_appointments_sorted_by_start() {
    let portal = FixturePortal::start(fixture_routes).unwrap();
    let workflow = workflow(&portal);
    let context = workflow
        .context(Some(FIXTURE_AUTH_TOKEN), &TenantParams::structure("60"))
        .unwrap();

    let appointments = workflow
        .daily_appointments(&context, "2024-05-01")
        .await
        .unwrap();

    let ids: Vec<&str> = appointments.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["501", "502", "503"]);
    assert_eq!(
        appointments[0].start.as_ref().unwrap().instant.to_rfc3339(),
        "2024-05-01T09:00:00-03:00"
    );
    assert_eq!(appointments[0].status.id, "aguardando");
    assert_eq!(appointments[1].status.id, "agendado");
    assert_eq!(appointments[2].status.id, UNKNOWN_STATUS_ID);
    assert_eq!(appointments[2].status.raw_value, "99");

    portal.stop().await;
}

#[actix_web::test]
async fn test_client_list() {
    let portal = FixturePortal::start(fixture_routes).unwrap();
    let workflow = workflow(&portal);
    let context = TestFixtures::context(&TestFixtures::portal(portal.base_url()));

    let clients = workflow.list_clients(&context).await.unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].name.as_deref(), Some("Joana Lima"));
    assert_eq!(clients[0].email.as_deref(), Some("joana@example.com"));
    assert_eq!(clients[1].formatted_phone.as_deref(), Some("(82) 3221-1234"));
    assert_eq!(clients[1].birthday, None);

    portal.stop().await;
}

#[actix_web::test]
async fn test_outage_keeps_status() {
    let portal = FixturePortal::start(|cfg| {
        cfg.route(
            "/Scheduler/Read",
            web::post().to(|| async { HttpResponse::ServiceUnavailable().body("manutencao") }),
        );
    })
    .unwrap();
    let workflow = workflow(&portal);
    let context = TestFixtures::context(&TestFixtures::portal(portal.base_url()));

    match workflow.daily_appointments(&context, "2024-05-01").await {
        Err(PortalError::UpstreamUnavailable { status, snippet }) => {
            assert_eq!(status, Some(503));
            assert_eq!(snippet, "manutencao");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    portal.stop().await;
}

#[actix_web::test]
async fn test_session_expiring_during_detail_fan_out_is_authentication_failure() {
    let portal = FixturePortal::start(|cfg| {
        cfg.route("/admin/financeiro/comanda/lista", web::get().to(comanda_list))
            .route(
                "/admin/financeiro/comanda/abrir",
                web::post().to(expired_comanda_detail),
            );
    })
    .unwrap();
    let workflow = workflow(&portal);
    let context = workflow
        .context(Some(FIXTURE_AUTH_TOKEN), &TenantParams::default())
        .unwrap();

    let err = workflow
        .list_comandas(&context, &ComandaQuery::for_date("2024-05-01"))
        .await
        .unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");

    portal.stop().await;
}

#[actix_web::test]
async fn test_session_expiring_during_contact_look_up_is_authentication_failure() {
    let portal = FixturePortal::start(|cfg| {
        cfg.route("/admin/financeiro/comanda/lista", web::get().to(comanda_list))
            .route(
                "/admin/financeiro/comanda/abrir",
                web::post().to(good_comanda_detail),
            )
            .route("/admin/clientes/form", web::post().to(expired_client_form));
    })
    .unwrap();
    let workflow = workflow(&portal);
    let context = workflow
        .context(Some(FIXTURE_AUTH_TOKEN), &TenantParams::default())
        .unwrap();

    let err = workflow
        .list_comandas(&context, &ComandaQuery::for_date("2024-05-01"))
        .await
        .unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");

    portal.stop().await;
}

#[actix_web::test]
async fn test_data_call_timeout_is_upstream_unavailable() {
    let portal = FixturePortal::start(|cfg| {
        cfg.route("/Scheduler/Read", web::post().to(slow_scheduler_read));
    })
    .unwrap();
    let config = TestFixtures::portal(portal.base_url());
    let workflow = PortalWorkflow::new(&config, &TestFixtures::impatient_http()).unwrap();
    let context = TestFixtures::context(&config);

    match workflow.daily_appointments(&context, "2024-05-01").await {
        Err(PortalError::UpstreamUnavailable { status, snippet }) => {
            assert_eq!(status, None);
            assert_eq!(snippet, "request timed out");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    portal.stop().await;
}

#[actix_web::test]
async fn test_data_calls_do_not_share_a_connection() {
    let peers: Peers = web::Data::new(Mutex::new(Vec::new()));
    let recorded = peers.clone();
    let portal = FixturePortal::start(move |cfg| {
        cfg.app_data(recorded.clone())
            .route("/admin/clientes/lista", web::get().to(recorded_client_list));
    })
    .unwrap();
    let workflow = workflow(&portal);
    let context = TestFixtures::context(&TestFixtures::portal(portal.base_url()));

    workflow.list_clients(&context).await.unwrap();
    workflow.list_clients(&context).await.unwrap();

    let peers = peers.lock().unwrap().clone();
    assert_eq!(peers.len(), 2);
    assert_ne!(peers[0], peers[1], "second call reused a pooled connection");

    portal.stop().await;
}
