// Token-replay login against an in-process fixture portal
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use portalkit::error::PortalError;
use portalkit::session::{SessionAcquirer, TokenReplayAcquirer};
use portalkit::testing::constants::{
    FIXTURE_AUTH_TOKEN, FIXTURE_VERIFICATION_TOKEN, SLOW_RESPONSE_MS, TEST_LOGIN, TEST_PASSWORD,
};
use portalkit::testing::{html, FixturePortal, TestFixtures};

async fn login_page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html::LOGIN_PAGE)
}

async fn login_page_without_token() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html::LOGIN_PAGE_WITHOUT_TOKEN)
}

/// Accepts the fixture credentials and replies like the real portal: 302 plus cookie
async fn submit_login(form: web::Form<HashMap<String, String>>) -> HttpResponse {
    let field = |name: &str| form.get(name).map(String::as_str);
    let accepted = field("__RequestVerificationToken") == Some(FIXTURE_VERIFICATION_TOKEN)
        && field("Login") == Some(TEST_LOGIN)
        && field("Password") == Some(TEST_PASSWORD)
        && field("FingerPrint").is_some();

    if accepted {
        HttpResponse::Found()
            .insert_header(("Location", "/"))
            .append_header(("Set-Cookie", "ASP.NET_SessionId=s1; path=/; HttpOnly"))
            .append_header((
                "Set-Cookie",
                format!("Authentication={FIXTURE_AUTH_TOKEN}; path=/; HttpOnly"),
            ))
            .finish()
    } else {
        // Rejected logins re-render the form without an auth cookie
        HttpResponse::Ok()
            .append_header(("Set-Cookie", "ASP.NET_SessionId=s2; path=/"))
            .content_type("text/html; charset=utf-8")
            .body(html::LOGIN_PAGE)
    }
}

async fn slow_login_page() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_millis(SLOW_RESPONSE_MS)).await;
    login_page().await
}

/// Client address of every request the fixture saw
type Peers = web::Data<Mutex<Vec<SocketAddr>>>;

async fn recorded_login_page(req: HttpRequest, peers: Peers) -> HttpResponse {
    peers.lock().unwrap().extend(req.peer_addr());
    login_page().await
}

async fn recorded_submit_login(
    req: HttpRequest,
    form: web::Form<HashMap<String, String>>,
    peers: Peers,
) -> HttpResponse {
    peers.lock().unwrap().extend(req.peer_addr());
    submit_login(form).await
}

fn fixture_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/Login", web::get().to(login_page))
        .route("/Login", web::post().to(submit_login));
}

fn acquirer(portal: &FixturePortal) -> TokenReplayAcquirer {
    TokenReplayAcquirer::new(TestFixtures::portal(portal.base_url()), &TestFixtures::http()).unwrap()
}

#[actix_web::test]
async fn test_login_returns_auth_cookie_value() {
    let portal = FixturePortal::start(fixture_routes).unwrap();

    let credential = acquirer(&portal)
        .acquire(&TestFixtures::credentials(), "")
        .await
        .unwrap();
    assert_eq!(credential.token(), FIXTURE_AUTH_TOKEN);
    assert_eq!(credential.tenant(), "58");

    portal.stop().await;
}

#[actix_web::test]
async fn test_tenant_hint_is_kept_on_credential() {
    let portal = FixturePortal::start(fixture_routes).unwrap();

    let credential = acquirer(&portal)
        .acquire(&TestFixtures::credentials(), "61")
        .await
        .unwrap();
    assert_eq!(credential.tenant(), "61");

    portal.stop().await;
}

#[actix_web::test]
async fn test_response_without_cookie_is_authentication_failure() {
    let portal = FixturePortal::start(fixture_routes).unwrap();

    let err = acquirer(&portal)
        .acquire(&TestFixtures::wrong_credentials(), "")
        .await
        .unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");

    portal.stop().await;
}

#[actix_web::test]
async fn test_login_page_without_token_is_extraction_failure() {
    let portal = FixturePortal::start(|cfg| {
        cfg.route("/Login", web::get().to(login_page_without_token))
            .route("/Login", web::post().to(submit_login));
    })
    .unwrap();

    let err = acquirer(&portal)
        .acquire(&TestFixtures::credentials(), "")
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::ExtractionFailure(_)), "unexpected error: {err:?}");

    portal.stop().await;
}

#[actix_web::test]
async fn test_unreachable_portal_is_authentication_failure() {
    let portal = FixturePortal::start(fixture_routes).unwrap();
    let base_url = portal.base_url().to_string();
    portal.stop().await;

    let acquirer =
        TokenReplayAcquirer::new(TestFixtures::portal(&base_url), &TestFixtures::http()).unwrap();
    let err = acquirer
        .acquire(&TestFixtures::credentials(), "")
        .await
        .unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");
}

#[actix_web::test]
async fn test_login_timeout_is_authentication_failure() {
    let portal = FixturePortal::start(|cfg| {
        cfg.route("/Login", web::get().to(slow_login_page));
    })
    .unwrap();

    let acquirer = TokenReplayAcquirer::new(
        TestFixtures::portal(portal.base_url()),
        &TestFixtures::impatient_http(),
    )
    .unwrap();
    let err = acquirer
        .acquire(&TestFixtures::credentials(), "")
        .await
        .unwrap_err();
    assert!(err.is_authentication(), "unexpected error: {err:?}");
    assert!(err.to_string().contains("timed out"), "unexpected error: {err}");

    portal.stop().await;
}

#[actix_web::test]
async fn test_login_calls_do_not_share_a_connection() {
    let peers: Peers = web::Data::new(Mutex::new(Vec::new()));
    let recorded = peers.clone();
    let portal = FixturePortal::start(move |cfg| {
        cfg.app_data(recorded.clone())
            .route("/Login", web::get().to(recorded_login_page))
            .route("/Login", web::post().to(recorded_submit_login));
    })
    .unwrap();

    acquirer(&portal)
        .acquire(&TestFixtures::credentials(), "")
        .await
        .unwrap();

    let peers = peers.lock().unwrap().clone();
    assert_eq!(peers.len(), 2);
    assert_ne!(peers[0], peers[1], "login form was posted on a pooled connection");

    portal.stop().await;
}
