use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use mockall::mock;
use serde_json::json;

use catalog_client::{
    config::AuthPayload,
    models::{LoginCredentials, RegisterProfile, TokenOrigin, UpdateProfile, User},
    navigation::{Navigator, RouteTracker},
    signals::Signal,
    storage::{MemoryStore, SessionStore},
    CatalogClient, ClientConfig, ClientError,
};

use crate::common::{client_with_navigator, dead_base_url, spawn_api, test_app, test_app_with, MockApi};

mock! {
    pub Nav {}
    impl Navigator for Nav {
        fn current_path(&self) -> String;
        fn redirect(&self, path: &str);
    }
}

fn credentials() -> LoginCredentials {
    LoginCredentials::new("ada@example.com", "correct horse", "482913")
}

fn jwt(exp: i64) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": "ada@example.com", "exp": exp }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

fn seeded_store(token: &str) -> MemoryStore {
    let store = MemoryStore::new();
    store.set("token", token).unwrap();
    store
        .set("user", &serde_json::to_string(&User::with_email("ada@example.com")).unwrap())
        .unwrap();
    store
}

#[tokio::test]
async fn login_with_top_level_token_persists_session() {
    let app = test_app("/login").await;
    app.api.reply_to_login(
        200,
        None,
        json!({ "token": "T1", "user": { "id": 1, "email": "ada@example.com", "firstName": "Ada" } }),
    );

    let session = app.client.services.auth.login(credentials()).await.unwrap();

    assert_eq!(session.token(), Some("T1"));
    assert_eq!(session.token_origin(), Some(TokenOrigin::Server));
    assert!(app.client.is_authenticated());
    assert_eq!(app.store.get("token").unwrap().as_deref(), Some("T1"));
    let stored: User = serde_json::from_str(&app.store.get("user").unwrap().unwrap()).unwrap();
    assert_eq!(stored.first_name.as_deref(), Some("Ada"));

    // Fields travel as query parameters by default
    let login = &app.api.requests_to("/auth/login")[0];
    assert_eq!(login.query.get("email").map(String::as_str), Some("ada@example.com"));
    assert_eq!(login.query.get("password").map(String::as_str), Some("correct horse"));
    assert_eq!(login.query.get("entryCode").map(String::as_str), Some("482913"));
    assert!(login.body.is_none());
    assert!(login.bearer.is_none());
}

#[tokio::test]
async fn login_fields_can_travel_as_json() {
    let app = test_app_with("/login", |c| c.api.auth_payload = AuthPayload::Json).await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));

    app.client.services.auth.login(credentials()).await.unwrap();

    let login = &app.api.requests_to("/auth/login")[0];
    assert!(login.query.is_empty());
    let body = login.body.as_ref().unwrap();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["entryCode"], "482913");
}

#[tokio::test]
async fn login_without_token_synthesizes_distinct_placeholders() {
    let app = test_app("/login").await;
    app.api.reply_to_login(200, None, json!({}));

    let first = app.client.services.auth.login(credentials()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = app.client.services.auth.login(credentials()).await.unwrap();

    assert!(first.token().unwrap().starts_with("local."));
    assert_eq!(first.token_origin(), Some(TokenOrigin::Synthesized));
    assert_eq!(
        first.user().and_then(|u| u.email.as_deref()),
        Some("ada@example.com")
    );
    assert_ne!(first.token(), second.token());
    assert_eq!(app.store.get("token").unwrap().as_deref(), second.token());
}

#[tokio::test]
async fn login_token_from_authorization_header() {
    let app = test_app("/login").await;
    app.api.reply_to_login(
        200,
        Some("Bearer H1"),
        json!({ "user": { "email": "ada@example.com", "lastName": "Lovelace" } }),
    );

    let session = app.client.services.auth.login(credentials()).await.unwrap();

    assert_eq!(session.token(), Some("H1"));
    assert_eq!(session.user().unwrap().last_name.as_deref(), Some("Lovelace"));
}

#[tokio::test]
async fn login_token_inside_data_envelope() {
    let app = test_app("/login").await;
    app.api.reply_to_login(
        200,
        None,
        json!({ "data": { "accessToken": "E1", "user": { "firstName": "Ada" } } }),
    );

    let session = app.client.services.auth.login(credentials()).await.unwrap();

    assert_eq!(session.token(), Some("E1"));
    let user = session.user().unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
    // Missing email is filled from the credentials
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn rejected_login_is_a_credential_error() {
    let mut app = test_app("/login").await;
    app.api.reply_to_login(401, None, json!({ "message": "Invalid code" }));

    let result = app.client.services.auth.login(credentials()).await;

    assert!(matches!(result, Err(ClientError::Authentication(ref m)) if m == "Invalid code"));
    assert!(!app.client.is_authenticated());
    assert!(app.store.is_empty());
    assert!(app.drain_signals().is_empty());
    assert!(app.routes.redirects().is_empty());
}

#[tokio::test]
async fn invalid_credentials_never_reach_the_api() {
    let app = test_app("/login").await;

    let result = app
        .client
        .services
        .auth
        .login(LoginCredentials::new("not-an-email", "pw", "12"))
        .await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(app.api.requests().is_empty());
}

#[tokio::test]
async fn logout_clears_storage_without_a_request() {
    let app = test_app("/dashboard").await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.client.services.auth.login(credentials()).await.unwrap();
    let sent = app.api.requests().len();

    app.client.services.auth.logout();

    assert!(!app.client.is_authenticated());
    assert!(app.store.is_empty());
    assert_eq!(app.api.requests().len(), sent);
}

#[tokio::test]
async fn rejected_session_is_cleared_signalled_and_redirected_once() {
    let mut app = test_app("/dashboard").await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.client.services.auth.login(credentials()).await.unwrap();

    let result = app.client.services.auth.current_user().await;

    assert!(matches!(result, Err(ClientError::Authentication(_))));
    assert!(!app.client.is_authenticated());
    assert!(app.store.is_empty());
    assert_eq!(
        app.drain_signals(),
        vec![Signal::SessionExpired {
            url: Some("/auth/me".to_string())
        }]
    );
    assert_eq!(app.routes.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn no_login_redirect_from_a_public_route() {
    let api = MockApi::new();
    let config = ClientConfig::for_base_url(spawn_api(api.clone()).await);

    let mut nav = MockNav::new();
    nav.expect_current_path().return_const("/register".to_string());
    nav.expect_redirect().never();

    let store = MemoryStore::new();
    let client = client_with_navigator(config, store.clone(), Arc::new(nav));
    let mut signals = client.signals().subscribe();

    api.reply_to_login(200, None, json!({ "token": "T1" }));
    client.services.auth.login(credentials()).await.unwrap();
    let result = client.services.auth.current_user().await;

    assert!(matches!(result, Err(ClientError::Authentication(_))));
    assert!(store.is_empty());
    assert!(matches!(signals.try_recv(), Ok(Signal::SessionExpired { .. })));
}

#[tokio::test]
async fn refreshed_token_replays_the_request_once() {
    let mut app = test_app_with("/books", |c| {
        c.endpoints.refresh = Some("/auth/refresh".to_string())
    })
    .await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.api.issue_on_refresh("T2");
    app.client.services.auth.login(credentials()).await.unwrap();

    let user = app.client.services.auth.current_user().await.unwrap();

    assert_eq!(user.display_name(), "Ada Lovelace");
    assert_eq!(app.client.session().token(), Some("T2"));
    assert_eq!(app.store.get("token").unwrap().as_deref(), Some("T2"));

    let bearers: Vec<Option<String>> = app
        .api
        .requests_to("/auth/me")
        .into_iter()
        .map(|r| r.bearer)
        .collect();
    assert_eq!(bearers, vec![Some("T1".to_string()), Some("T2".to_string())]);
    assert_eq!(app.api.requests_to("/auth/refresh").len(), 1);
    assert!(app.drain_signals().is_empty());
    assert!(app.routes.redirects().is_empty());
}

#[tokio::test]
async fn failed_refresh_expires_the_session() {
    let mut app = test_app_with("/books", |c| {
        c.endpoints.refresh = Some("/auth/refresh".to_string())
    })
    .await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.client.services.auth.login(credentials()).await.unwrap();

    let result = app.client.services.auth.current_user().await;

    assert!(matches!(result, Err(ClientError::Authentication(_))));
    assert_eq!(app.api.requests_to("/auth/me").len(), 1);
    assert_eq!(app.api.requests_to("/auth/refresh").len(), 1);
    assert_eq!(app.drain_signals().len(), 1);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn unanswered_refresh_keeps_the_session() {
    let mut app = test_app_with("/books", |c| {
        c.endpoints.refresh = Some("/auth/refresh".to_string());
        c.api.timeout_secs = 1;
    })
    .await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.api.issue_on_refresh("T2");
    app.api.delay("/auth/refresh", Duration::from_secs(3));
    app.client.services.auth.login(credentials()).await.unwrap();

    let result = app.client.services.auth.current_user().await;

    assert!(matches!(result, Err(ClientError::Network(_))));
    assert_eq!(app.client.session().token(), Some("T1"));
    assert_eq!(app.store.get("token").unwrap().as_deref(), Some("T1"));
    assert_eq!(
        app.drain_signals(),
        vec![Signal::NetworkUnreachable {
            url: Some("/auth/refresh".to_string())
        }]
    );
    assert!(app.routes.redirects().is_empty());
}

#[tokio::test]
async fn stale_rejection_leaves_a_newer_login_alone() {
    let mut app = test_app("/dashboard").await;
    app.api.reply_to_login(200, None, json!({ "token": "OLD" }));
    app.client.services.auth.login(credentials()).await.unwrap();
    app.api.delay("/auth/me", Duration::from_millis(500));

    let client = app.client.clone();
    let in_flight = tokio::spawn(async move { client.services.auth.current_user().await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    app.api.reply_to_login(200, None, json!({ "token": "NEW" }));
    app.api.accept_token("NEW");
    app.client.services.auth.login(credentials()).await.unwrap();

    let user = in_flight.await.unwrap().unwrap();

    assert_eq!(user.display_name(), "Ada Lovelace");
    assert_eq!(app.client.session().token(), Some("NEW"));
    assert_eq!(app.store.get("token").unwrap().as_deref(), Some("NEW"));
    let bearers: Vec<Option<String>> = app
        .api
        .requests_to("/auth/me")
        .into_iter()
        .map(|r| r.bearer)
        .collect();
    assert_eq!(bearers, vec![Some("OLD".to_string()), Some("NEW".to_string())]);
    assert!(app.drain_signals().is_empty());
    assert!(app.routes.redirects().is_empty());
}

#[tokio::test]
async fn placeholder_tokens_are_not_refreshed() {
    let app = test_app_with("/books", |c| {
        c.endpoints.refresh = Some("/auth/refresh".to_string())
    })
    .await;
    app.api.reply_to_login(200, None, json!({}));
    app.client.services.auth.login(credentials()).await.unwrap();

    let result = app.client.services.auth.current_user().await;

    assert!(matches!(result, Err(ClientError::Authentication(_))));
    assert!(app.api.requests_to("/auth/refresh").is_empty());
}

#[tokio::test]
async fn forbidden_keeps_the_session() {
    let mut app = test_app("/dashboard").await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.api.accept_token("T1");
    app.api.forbid_borrows();
    app.client.services.auth.login(credentials()).await.unwrap();

    let result = app.client.services.dashboard.borrows().await;

    assert!(matches!(result, Err(ClientError::AccessDenied(ref m)) if m == "Account suspended"));
    assert!(app.client.is_authenticated());
    assert_eq!(app.store.get("token").unwrap().as_deref(), Some("T1"));
    assert_eq!(
        app.drain_signals(),
        vec![Signal::AccessDenied {
            url: Some("/users/me/borrows".to_string())
        }]
    );
    assert!(app.routes.redirects().is_empty());
}

#[tokio::test]
async fn unreachable_api_signals_once_and_keeps_the_session() {
    let store = seeded_store("T1");
    let routes = Arc::new(RouteTracker::new("/books"));
    let client = CatalogClient::with_parts(
        ClientConfig::for_base_url(dead_base_url().await),
        Arc::new(store.clone()),
        routes.clone(),
    )
    .unwrap();
    let mut signals = client.signals().subscribe();
    client.services.auth.check_auth().unwrap();

    let result = client.services.catalog.list_books().await;

    assert!(matches!(result, Err(ref e) if e.is_network()));
    assert!(matches!(
        signals.try_recv(),
        Ok(Signal::NetworkUnreachable { url: Some(ref u) }) if u == "/books"
    ));
    assert!(signals.try_recv().is_err());
    assert!(client.is_authenticated());
    assert_eq!(store.get("token").unwrap().as_deref(), Some("T1"));
    assert!(routes.redirects().is_empty());
}

#[tokio::test]
async fn timed_out_request_signals_once_and_keeps_the_session() {
    let mut app = test_app_with("/books", |c| c.api.timeout_secs = 1).await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.client.services.auth.login(credentials()).await.unwrap();
    app.api.delay("/books", Duration::from_secs(3));

    let result = app.client.services.catalog.list_books().await;

    assert!(matches!(result, Err(ClientError::Network(_))));
    assert_eq!(
        app.drain_signals(),
        vec![Signal::NetworkUnreachable {
            url: Some("/books".to_string())
        }]
    );
    assert_eq!(app.client.session().token(), Some("T1"));
    assert_eq!(app.store.get("token").unwrap().as_deref(), Some("T1"));
    assert!(app.routes.redirects().is_empty());
}

#[tokio::test]
async fn sign_in_requests_carry_no_credential() {
    let app = test_app("/login").await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.client.services.auth.login(credentials()).await.unwrap();

    app.client.services.auth.login(credentials()).await.unwrap();
    app.client
        .services
        .auth
        .request_verification_code("ada@example.com")
        .await
        .unwrap();

    assert!(app.client.is_authenticated());
    let sign_in: Vec<_> = app
        .api
        .requests()
        .into_iter()
        .filter(|r| r.path.starts_with("/auth/"))
        .collect();
    assert_eq!(sign_in.len(), 3);
    assert!(sign_in.iter().all(|r| r.bearer.is_none()));
}

#[tokio::test]
async fn check_auth_restores_or_discards_stored_sessions() {
    let config = ClientConfig::for_base_url("http://127.0.0.1:9/api");
    let nav = || -> Arc<dyn Navigator> { Arc::new(RouteTracker::default()) };

    // Live JWT
    let token = jwt(Utc::now().timestamp() + 3600);
    let store = seeded_store(&token);
    let client = CatalogClient::with_parts(config.clone(), Arc::new(store.clone()), nav()).unwrap();
    let session = client.services.auth.check_auth().unwrap();
    assert_eq!(session.token(), Some(token.as_str()));
    assert!(client.is_authenticated());

    // Expired JWT
    let store = seeded_store(&jwt(Utc::now().timestamp() - 60));
    let client = CatalogClient::with_parts(config.clone(), Arc::new(store.clone()), nav()).unwrap();
    assert!(matches!(
        client.services.auth.check_auth(),
        Err(ClientError::Authentication(_))
    ));
    assert!(store.is_empty());
    assert!(!client.is_authenticated());

    // User left behind without a token
    let store = MemoryStore::new();
    store.set("user", "{\"email\":\"ada@example.com\"}").unwrap();
    let client = CatalogClient::with_parts(config, Arc::new(store.clone()), nav()).unwrap();
    assert!(client.services.auth.check_auth().is_err());
    assert!(store.is_empty());
}

#[tokio::test]
async fn register_checks_availability_first() {
    let app = test_app("/register").await;
    app.api.register_email("taken@example.com");

    let profile = |email: &str| RegisterProfile {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: email.to_string(),
        password: "cobol1959".to_string(),
        phone: None,
    };

    let registered = app
        .client
        .services
        .auth
        .register(profile("Grace@Example.com"))
        .await
        .unwrap();
    assert_eq!(registered.email, "grace@example.com");
    assert!(!app.client.is_authenticated());

    let register = &app.api.requests_to("/auth/register")[0];
    assert_eq!(register.query.get("firstName").map(String::as_str), Some("Grace"));
    assert_eq!(register.query.get("password").map(String::as_str), Some("cobol1959"));

    let duplicate = app.client.services.auth.register(profile("taken@example.com")).await;
    assert!(matches!(duplicate, Err(ClientError::Validation(_))));
    assert_eq!(app.api.requests_to("/auth/register").len(), 1);
}

#[tokio::test]
async fn blank_names_are_rejected_before_any_request() {
    let app = test_app("/register").await;

    let blank = RegisterProfile {
        first_name: "   ".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        password: "cobol1959".to_string(),
        phone: None,
    };
    let result = app.client.services.auth.register(blank).await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(app.api.requests().is_empty());
}

#[tokio::test]
async fn verification_code_request() {
    let app = test_app("/login").await;

    app.client
        .services
        .auth
        .request_verification_code(" Ada@Example.com ")
        .await
        .unwrap();

    let sent = &app.api.requests_to("/auth/send-code")[0];
    assert_eq!(sent.query.get("email").map(String::as_str), Some("ada@example.com"));
    assert!(!app.client.is_authenticated());

    let invalid = app.client.services.auth.request_verification_code("nope").await;
    assert!(matches!(invalid, Err(ClientError::Validation(_))));
    assert_eq!(app.api.requests_to("/auth/send-code").len(), 1);
}

#[tokio::test]
async fn profile_update_refreshes_the_cached_user() {
    let app = test_app("/dashboard").await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.api.accept_token("T1");
    app.client.services.auth.login(credentials()).await.unwrap();

    let update = UpdateProfile {
        first_name: Some("Augusta".to_string()),
        ..Default::default()
    };
    let user = app.client.services.dashboard.update_profile(update).await.unwrap();

    assert_eq!(user.first_name.as_deref(), Some("Augusta"));
    assert_eq!(user.id.as_deref(), Some("7"));
    let cached = app.client.session();
    assert_eq!(cached.user().unwrap().first_name.as_deref(), Some("Augusta"));

    let put = &app.api.requests_to("/users/me")[0];
    assert_eq!(put.method, "PUT");
    assert_eq!(put.bearer.as_deref(), Some("T1"));
    assert_eq!(put.body.as_ref().unwrap()["firstName"], "Augusta");

    let password_only = UpdateProfile {
        new_password: Some("longer-password".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        app.client.services.dashboard.update_profile(password_only).await,
        Err(ClientError::Validation(_))
    ));
}

#[tokio::test]
async fn dashboard_summary_counts_borrows() {
    let app = test_app("/dashboard").await;
    app.api.reply_to_login(200, None, json!({ "token": "T1" }));
    app.api.accept_token("T1");
    app.client.services.auth.login(credentials()).await.unwrap();

    let summary = app.client.services.dashboard.summary(Utc::now()).await.unwrap();

    assert_eq!(summary.user.display_name(), "Ada Lovelace");
    assert_eq!(summary.active_borrows, 2);
    assert_eq!(summary.overdue_borrows, 1);
    assert_eq!(summary.returned_borrows, 1);
}
