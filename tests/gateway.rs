use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use argon2::Params;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use axum::routing::get;
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tower::ServiceExt;

use fameliza_auth::api_key::InMemoryApiKeyRepository;
use fameliza_auth::middleware::{Credential, Gateway, GatewayConfig};
use fameliza_auth::session::{InMemorySessionStore, SessionRecord, SessionStore};
use fameliza_auth::{
    AccessPolicy, AllowList, Error, PolicyBucket, ProviderClient, ProviderConfig, SessionId,
};

const SESSION_COOKIE: &str = "fameliza_session";

// ── Fixtures ───────────────────────────────────────────────────────

async fn provider(server: &mut mockito::ServerGuard, user_id: &str) -> Vec<mockito::Mock> {
    let token = server
        .mock("POST", "/oauth2/token")
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at-1","token_type":"Bearer","expires_in":604800}"#)
        .create_async()
        .await;
    let profile = server
        .mock("GET", "/users/@me")
        .match_header("authorization", "Bearer at-1")
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"id":"{user_id}","username":"user-{user_id}","discriminator":"0001","avatar":null,"email":"{user_id}@example.com"}}"#
        ))
        .create_async()
        .await;
    let groups = server
        .mock("GET", "/users/@me/guilds")
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id":"g1","roles":["member"]}]"#)
        .create_async()
        .await;
    vec![token, profile, groups]
}

fn config(server: &mockito::ServerGuard) -> GatewayConfig {
    config_at(&server.url(), Duration::from_secs(2))
}

fn config_at(base: &str, timeout: Duration) -> GatewayConfig {
    let provider = ProviderConfig::new(
        "client",
        "secret",
        "http://localhost/auth/callback".parse().unwrap(),
    )
    .with_token_url(format!("{base}/oauth2/token").parse().unwrap())
    .with_profile_url(format!("{base}/users/@me").parse().unwrap())
    .with_groups_url(Some(format!("{base}/users/@me/guilds").parse().unwrap()))
    .with_timeout(timeout);

    GatewayConfig::new(ProviderClient::new(provider))
        .with_secure_cookies(false)
        .with_api_key_hash_params(Params::new(8, 1, 1, None).unwrap())
}

async fn widgets(credential: Credential) -> String {
    match credential.principal() {
        Some(principal) => format!("session:{}", principal.id()),
        None => "api_key".to_owned(),
    }
}

fn app(gateway: &Gateway) -> Router {
    let api = Router::new()
        .route("/api/widgets", get(widgets))
        .route("/api/machine/jobs", get(widgets))
        .route("/", get(|| async { "home" }));
    gateway.protect(api.merge(gateway.routes()))
}

// ── HTTP helpers ───────────────────────────────────────────────────

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(header::HeaderName, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, *value);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_with_cookie(app: &Router, uri: &str, cookie: &str) -> Response<Body> {
    send(app, "GET", uri, &[(header::COOKIE, cookie)]).await
}

async fn json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

/// `name=value` pairs from `Set-Cookie`, skipping removals.
fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, value)| !value.is_empty()))
        .map(str::to_owned)
        .collect()
}

/// Names of cookies the response deletes.
fn cleared_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name.to_owned())
        .collect()
}

fn assert_login_cookies_cleared(response: &Response<Body>) {
    let cleared = cleared_cookies(response);
    for name in ["__fameliza_pkce", "__fameliza_state"] {
        assert!(cleared.iter().any(|c| c == name), "{name} not cleared: {cleared:?}");
    }
}

/// Run `/auth/login` then `/auth/callback` and return the callback response.
async fn login_flow(app: &Router) -> Response<Body> {
    let login = send(app, "GET", "/auth/login", &[]).await;
    assert_eq!(login.status(), StatusCode::FOUND);

    let authorize: url::Url = location(&login).parse().unwrap();
    let state = authorize
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let cookies = set_cookies(&login).join("; ");

    get_with_cookie(app, &format!("/auth/callback?code=abc&state={state}"), &cookies).await
}

async fn login_session(app: &Router) -> String {
    let callback = login_flow(app).await;
    assert_eq!(callback.status(), StatusCode::FOUND);
    assert_eq!(location(&callback), "/");

    set_cookies(&callback)
        .into_iter()
        .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE}=")))
        .expect("session cookie set on successful callback")
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_always_public() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let response = send(&app, "GET", "/health", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn login_redirects_to_provider_with_pkce() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let response = send(&app, "GET", "/auth/login", &[]).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let url = location(&response);
    assert!(url.contains("response_type=code"));
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.contains("scope=identify"));
    assert_eq!(set_cookies(&response).len(), 2);
}

#[tokio::test]
async fn session_login_me_logout_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = provider(&mut server, "U1").await;
    let app = app(&Gateway::in_memory(config(&server)));

    let session = login_session(&app).await;

    let me = get_with_cookie(&app, "/auth/me", &session).await;
    assert_eq!(me.status(), StatusCode::OK);
    let body = json(me).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["id"], "U1");
    assert_eq!(body["user"]["email"], "U1@example.com");

    let widgets = get_with_cookie(&app, "/api/widgets", &session).await;
    assert_eq!(widgets.status(), StatusCode::OK);

    let logout = get_with_cookie(&app, "/auth/logout", &session).await;
    assert_eq!(logout.status(), StatusCode::FOUND);
    assert_eq!(location(&logout), "/");

    let me = get_with_cookie(&app, "/auth/me", &session).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    let widgets = get_with_cookie(&app, "/api/widgets", &session).await;
    assert_eq!(widgets.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_without_session_is_401() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let response = send(&app, "GET", "/auth/me", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_session_cookie_is_rejected() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let cookie = format!("{SESSION_COOKIE}=forged");
    assert_eq!(
        get_with_cookie(&app, "/auth/me", &cookie).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_with_cookie(&app, "/api/widgets", &cookie).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn denied_principal_lands_on_failure_page() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = provider(&mut server, "U2").await;
    let gateway = Gateway::in_memory(
        config(&server).with_allow_list(AllowList::new().with_principal_ids(["U1"])),
    );
    let app = app(&gateway);

    let callback = login_flow(&app).await;
    assert_eq!(callback.status(), StatusCode::FOUND);
    let failure = location(&callback);
    assert_eq!(failure, "/auth/failure?error=principal_not_allowed");
    assert!(
        !set_cookies(&callback)
            .iter()
            .any(|c| c.starts_with(SESSION_COOKIE))
    );
    assert_login_cookies_cleared(&callback);

    let page = send(&app, "GET", &failure, &[]).await;
    assert_eq!(page.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(page).await["reason"], "principal_not_allowed");
}

#[tokio::test]
async fn provider_failure_lands_on_failure_page() {
    let mut server = mockito::Server::new_async().await;
    let _token = server
        .mock("POST", "/oauth2/token")
        .with_status(500)
        .create_async()
        .await;
    let app = app(&Gateway::in_memory(config(&server)));

    let callback = login_flow(&app).await;
    assert_eq!(callback.status(), StatusCode::FOUND);
    assert_eq!(location(&callback), "/auth/failure?error=identity_provider_error");
}

#[tokio::test]
async fn callback_with_wrong_state_is_refused() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let login = send(&app, "GET", "/auth/login", &[]).await;
    let cookies = set_cookies(&login).join("; ");

    let callback = get_with_cookie(&app, "/auth/callback?code=abc&state=forged", &cookies).await;
    assert_eq!(callback.status(), StatusCode::FOUND);
    assert_eq!(location(&callback), "/auth/failure?error=state_mismatch");
    assert_login_cookies_cleared(&callback);
}

#[tokio::test]
async fn unresponsive_provider_lands_on_failure_page() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let app = app(&Gateway::in_memory(config_at(
        &format!("http://{addr}"),
        Duration::from_millis(300),
    )));

    let callback = login_flow(&app).await;
    assert_eq!(callback.status(), StatusCode::FOUND);
    assert_eq!(location(&callback), "/auth/failure?error=identity_provider_error");
    assert_login_cookies_cleared(&callback);
    accept.abort();
}

#[tokio::test]
async fn api_key_issuance_requires_a_session() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let response = send(&app, "POST", "/auth/api-key", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn issued_key_authenticates_bearer_requests() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = provider(&mut server, "U1").await;
    let gateway = Gateway::in_memory(config(&server));
    let app = app(&gateway);

    let session = login_session(&app).await;
    let issued = send(&app, "POST", "/auth/api-key", &[(header::COOKIE, session.as_str())]).await;
    assert_eq!(issued.status(), StatusCode::OK);
    let key = json(issued).await["apiKey"].as_str().unwrap().to_owned();
    assert!(key.starts_with("fameliza_"));

    let bearer = format!("Bearer {key}");
    let response = send(&app, "GET", "/api/widgets", &[(header::AUTHORIZATION, bearer.as_str())]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"api_key");

    let owned = gateway
        .api_keys()
        .list_for_owner(&"U1".into())
        .await
        .unwrap();
    assert_eq!(owned.len(), 1);
    assert!(owned[0].last_used_at.is_some());
}

#[tokio::test]
async fn protected_paths_reject_missing_and_wrong_keys() {
    let server = mockito::Server::new_async().await;
    let app = app(&Gateway::in_memory(config(&server)));

    let missing = send(&app, "GET", "/api/widgets", &[]).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = send(&app, "GET", "/api/widgets", &[(header::AUTHORIZATION, "Bearer wrong")]).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let home = send(&app, "GET", "/", &[]).await;
    assert_eq!(home.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_key_only_paths_ignore_sessions() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = provider(&mut server, "U1").await;
    let gateway = Gateway::in_memory(config(&server).with_policy(
        AccessPolicy::default().override_rule("/api/machine/*", PolicyBucket::ApiKeyOnly),
    ));
    let app = app(&gateway);

    let session = login_session(&app).await;
    let response = get_with_cookie(&app, "/api/machine/jobs", &session).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let key = gateway.api_keys().issue(None).await.unwrap();
    let bearer = format!("bearer {}", key.expose());
    let response = send(
        &app,
        "GET",
        "/api/machine/jobs",
        &[(header::AUTHORIZATION, bearer.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ── Store failures ─────────────────────────────────────────────────

/// Session store whose deletes can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: InMemorySessionStore,
    fail_deletes: Arc<AtomicBool>,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, Error> {
        self.inner.get(id).await
    }

    async fn put(&self, id: SessionId, record: SessionRecord) -> Result<(), Error> {
        self.inner.put(id, record).await
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, Error> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Session("store unavailable".into()));
        }
        self.inner.delete(id).await
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, Error> {
        self.inner.purge_expired(now).await
    }
}

#[tokio::test]
async fn logout_store_failure_is_500_and_session_survives() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = provider(&mut server, "U1").await;
    let store = FlakyStore::default();
    let fail_deletes = store.fail_deletes.clone();
    let gateway = Gateway::new(config(&server), store, InMemoryApiKeyRepository::new());
    let app = app(&gateway);

    let session = login_session(&app).await;
    fail_deletes.store(true, Ordering::SeqCst);

    let logout = get_with_cookie(&app, "/auth/logout", &session).await;
    assert_eq!(logout.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(logout).await["error"], "Logout failed");

    let me = get_with_cookie(&app, "/auth/me", &session).await;
    assert_eq!(me.status(), StatusCode::OK);
}
