//! Integration tests for the Edificio HTTP client

use chrono::{TimeZone, Utc};
use edificio_core::{MemoryTokenStore, StoredSession, TokenStore, UserProfile};
use edificio_http::types::{LoginRequest, RegisterRequest, Sex};
use edificio_http::{ApiClient, ClientError};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user() -> UserProfile {
    serde_json::from_value(json!({ "ci": "1234567", "nombres": "Ana", "rol": "user" })).unwrap()
}

fn signed_in_store(refresh_token: Option<&str>) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_session(StoredSession::new(
        "old-access",
        refresh_token.map(str::to_string),
        Some(user()),
    )))
}

fn client(server: &MockServer, store: Arc<MemoryTokenStore>) -> ApiClient {
    ApiClient::builder()
        .base_url(server.uri())
        .token_store(store)
        .build()
        .unwrap()
}

fn profile_body() -> serde_json::Value {
    json!({ "success": true, "data": { "persona": { "ci": "1234567", "nombres": "Ana" } } })
}

fn refresh_body(token: &str) -> serde_json::Value {
    json!({ "success": true, "data": { "access_token": token } })
}

#[tokio::test]
async fn test_client_builder() {
    let client = ApiClient::builder()
        .base_url("http://localhost:5000/")
        .build()
        .unwrap();
    assert_eq!(client.base_url(), "http://localhost:5000");
    assert_eq!(
        client.google_login_url(),
        "http://localhost:5000/api/auth/google/login"
    );
}

#[tokio::test]
async fn test_client_builder_requires_valid_base_url() {
    let result = ApiClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = ApiClient::builder().base_url("localhost:5000").build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, signed_in_store(None));
    let profile = client.profile().await.unwrap();
    assert_eq!(profile.user.id(), "1234567");
}

#[tokio::test]
async fn test_refresh_and_retry_once_on_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("authorization", "Bearer refresh-1"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("new-access")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    let expires_at = Utc.with_ymd_and_hms(2030, 1, 15, 12, 0, 0).unwrap();
    let store = Arc::new(MemoryTokenStore::with_session(
        StoredSession::new("old-access", Some("refresh-1".into()), Some(user()))
            .expires_at(expires_at),
    ));
    let client = client(&server, store.clone());

    let profile = client.profile().await.unwrap();
    assert_eq!(profile.user.first_names, "Ana");

    // Full overwrite keeps the refresh token, the cached profile and the expiry
    let session = store.get();
    assert_eq!(session.access_token.as_deref(), Some("new-access"));
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(session.user, Some(user()));
    assert_eq!(session.access_expires_at, Some(expires_at));
}

#[tokio::test]
async fn test_rejected_refresh_clears_store_and_expires_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Token de refresco inválido"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let expired = Arc::new(AtomicUsize::new(0));
    let counter = expired.clone();
    let store = signed_in_store(Some("refresh-1"));
    let client = ApiClient::builder()
        .base_url(server.uri())
        .token_store(store.clone())
        .on_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let result = client.profile().await;
    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert!(store.get().is_empty());
    assert_eq!(expired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_refresh_response_expires_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    // Refresh answers with something that is not a refresh payload
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(Some("refresh-1"));
    let client = client(&server, store.clone());

    let result = client.profile().await;
    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert!(store.get().is_empty());
}

#[tokio::test]
async fn test_401_without_refresh_token_is_returned_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Token inválido"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let store = signed_in_store(None);
    let client = client(&server, store.clone());

    let error = client.profile().await.unwrap_err();
    assert!(matches!(error, ClientError::AuthenticationFailed { .. }));
    assert_eq!(error.server_message(), Some("Token inválido"));
    assert_eq!(store.get().access_token.as_deref(), Some("old-access"));
}

#[tokio::test]
async fn test_wrong_password_over_stale_session_does_not_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Credenciales inválidas"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(0)
        .mount(&server)
        .await;

    let expired = Arc::new(AtomicUsize::new(0));
    let store = signed_in_store(Some("refresh-1"));
    let client = ApiClient::builder()
        .base_url(server.uri())
        .token_store(store.clone())
        .on_session_expired({
            let expired = expired.clone();
            move || {
                expired.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();

    let error = client
        .login(&LoginRequest::new("ana@example.com", "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::AuthenticationFailed { .. }));
    assert_eq!(error.server_message(), Some("Credenciales inválidas"));
    assert_eq!(store.get().refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_login_keeps_envelope_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Login exitoso",
            "data": { "access_token": "a", "user": { "ci": "1234567" } }
        })))
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryTokenStore::new()));
    let payload = client
        .login(&LoginRequest::new("ana@example.com", "secret"))
        .await
        .unwrap();
    assert_eq!(payload.message.as_deref(), Some("Login exitoso"));
}

#[tokio::test]
async fn test_caller_authorization_header_is_replaced_by_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, signed_in_store(None));
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller-token"));
    client
        .request(Method::GET, "/api/auth/profile", None, Some(headers))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let values: Vec<_> = requests[0]
        .headers
        .get_all("authorization")
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["Bearer old-access".to_string()]);
}

#[tokio::test]
async fn test_second_401_does_not_refresh_again() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("new-access")))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(Some("refresh-1"));
    let client = client(&server, store.clone());

    let result = client.profile().await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed { .. })));
    // The refresh itself succeeded, so the session stays in place
    assert_eq!(store.get().access_token.as_deref(), Some("new-access"));
}

#[tokio::test]
async fn test_non_401_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, signed_in_store(Some("refresh-1")));

    let error = client.profile().await.unwrap_err();
    assert_eq!(error.status(), Some(500));
    assert_eq!(error.server_message(), Some("Internal Server Error"));
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/usuarios"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "message": "Acceso denegado"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, signed_in_store(Some("refresh-1")));

    let result = client
        .request(Method::GET, "/api/admin/usuarios", None, None)
        .await;
    assert!(matches!(result, Err(ClientError::Forbidden { .. })));
}

#[tokio::test]
async fn test_verify_never_refreshes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/verify"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let store = signed_in_store(Some("refresh-1"));
    let client = client(&server, store.clone());

    let result = client.verify().await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed { .. })));
    assert_eq!(store.get().access_token.as_deref(), Some("old-access"));
}

#[tokio::test]
async fn test_network_error() {
    let client = ApiClient::builder()
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap();

    let error = client.verify().await.unwrap_err();
    assert!(error.is_network());
}

#[tokio::test]
async fn test_concurrent_401s_each_refresh_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("new-access")))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, signed_in_store(Some("refresh-1")));

    let (first, second) = futures::join!(client.profile(), client.profile());
    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_single_flight_refresh_coalesces_concurrent_401s() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("new-access")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::builder()
        .base_url(server.uri())
        .token_store(signed_in_store(Some("refresh-1")))
        .single_flight_refresh(true)
        .build()
        .unwrap();

    let (first, second) = futures::join!(client.profile(), client.profile());
    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_single_flight_waiter_after_failed_refresh_sees_session_expired() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let expired = Arc::new(AtomicUsize::new(0));
    let store = signed_in_store(Some("refresh-1"));
    let client = ApiClient::builder()
        .base_url(server.uri())
        .token_store(store.clone())
        .single_flight_refresh(true)
        .on_session_expired({
            let expired = expired.clone();
            move || {
                expired.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();

    let (first, second) = futures::join!(client.profile(), client.profile());
    assert!(matches!(first, Err(ClientError::SessionExpired)));
    assert!(matches!(second, Err(ClientError::SessionExpired)));
    assert_eq!(expired.load(Ordering::SeqCst), 1);
    assert!(store.get().is_empty());
}

#[tokio::test]
async fn test_login_accepts_persona_alias() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Login exitoso",
            "data": {
                "access_token": "a",
                "refresh_token": "r",
                "persona": { "ci": "1234567", "nombres": "Ana", "rol": "admin" }
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryTokenStore::new()));
    let payload = client
        .login(&LoginRequest::new("ana@example.com", "secret"))
        .await
        .unwrap();
    assert_eq!(payload.access_token, "a");
    assert!(payload.user.is_admin());
}

#[tokio::test]
async fn test_payload_with_user_and_persona_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/google/user"))
        .and(body_json(json!({ "id_token": "google-id-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "access_token": "a",
                "user": { "ci": "1" },
                "persona": { "ci": "2" }
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryTokenStore::new()));
    let result = client.login_with_google("google-id-token").await;
    assert!(matches!(result, Err(ClientError::Serialization(_))));
}

#[tokio::test]
async fn test_register_validation_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Errores de validación",
            "errors": { "ci": ["Ya existe un usuario registrado con este CI"] }
        })))
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(MemoryTokenStore::new()));
    let request = RegisterRequest {
        identity_document: "1234567".into(),
        first_names: "Ana".into(),
        paternal_surname: "Rojas".into(),
        maternal_surname: None,
        birth_date: chrono::NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
        sex: Sex::Female,
        phone: None,
        email: "ana@example.com".into(),
        address: None,
        password: "secret1".into(),
        password_confirm: "secret1".into(),
    };

    let error = client.register(&request).await.unwrap_err();
    assert_eq!(error.status(), Some(400));
    assert_eq!(
        error.field_errors()["ci"],
        vec!["Ya existe un usuario registrado con este CI".to_string()]
    );
}

#[tokio::test]
async fn test_logout_sends_bearer_without_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, signed_in_store(Some("refresh-1")));
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_manual_refresh_persists_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("authorization", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("new-access")))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(Some("refresh-1"));
    let client = client(&server, store.clone());

    assert_eq!(client.refresh().await.unwrap(), "new-access");
    assert_eq!(store.get().access_token.as_deref(), Some("new-access"));
    assert_eq!(store.get().user, Some(user()));
}

#[tokio::test]
async fn test_manual_refresh_without_refresh_token() {
    let server = MockServer::start().await;
    let client = client(&server, signed_in_store(None));

    let result = client.refresh().await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed { .. })));
}
