use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokenrelay_domain::{
    AuthContext, AuthDescriptors, CredentialKey, Credentials, EndpointDescriptor,
};
use url::Url;

use super::*;
use crate::session::AuthPhase;
use crate::testing::{InMemoryCredentialStore, ScriptedTransport};

const TOKEN_BODY: &str = r#"{"access_token":"abc"}"#;

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
}

fn identity() -> Url {
    Url::parse("https://id.example.com").unwrap()
}

fn context(with_refresh: bool, reduced: bool) -> AuthContext {
    let mut descriptors = AuthDescriptors::conventional(&identity()).unwrap();
    if !with_refresh {
        descriptors = descriptors.without_refresh();
    }
    AuthContext::new(identity(), Url::parse("https://api.example.com").unwrap(), descriptors)
        .with_reduced_security_mode(reduced)
}

fn engine(transport: &Arc<ScriptedTransport>, context: AuthContext) -> CallEngine {
    CallEngine::new(transport.clone(), AuthSession::new(context))
}

fn items_request(engine: &CallEngine) -> HttpRequest {
    engine
        .authorized_request("items", None, ArgumentEncoding::QueryString, HttpMethod::Get)
        .unwrap()
}

async fn logged_in(transport: &Arc<ScriptedTransport>, context: AuthContext) -> CallEngine {
    transport.respond("/login", 200, TOKEN_BODY);
    let engine = engine(transport, context);
    engine.authenticate("alice", "pw1").await.unwrap();
    engine
}

#[tokio::test]
async fn login_stores_the_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/login", 200, TOKEN_BODY);
    let engine = engine(&transport, context(true, false));

    let message = engine.authenticate("alice", "pw1").await.unwrap();

    assert_eq!(message, "Successful authentication");
    assert_eq!(engine.session().access_token().await, "abc");
    assert_eq!(engine.session().phase().await, AuthPhase::Authenticated);
    assert!(engine.session().snapshot().await.last_auth_attempt().is_some());

    let login = &transport.requests_to("/login")[0];
    assert_eq!(login.method(), HttpMethod::Post);
    let body = String::from_utf8(login.body().unwrap().to_vec()).unwrap();
    let mut pairs: Vec<&str> = body.split('&').collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec!["email=alice", "password=pw1"]);
    assert!(login.bearer_token().is_none());
}

#[tokio::test]
async fn login_without_token_field_fails() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/login", 200, r#"{"token":"abc"}"#);
    let engine = engine(&transport, context(true, false));

    let err = engine.authenticate("alice", "pw1").await.unwrap_err();

    assert!(matches!(err, CallError::MissingTokenKey(ref key) if key == "access_token"));
    assert!(!engine.session().is_authenticated().await);
    assert_eq!(engine.session().phase().await, AuthPhase::Unauthenticated);
}

#[tokio::test]
async fn login_rejection_is_a_security_failure() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/login", 401, "");
    let engine = engine(&transport, context(true, false));

    let err = engine.authenticate("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, CallError::SecurityFailure));
    assert_eq!(transport.count("/login"), 1);
    assert_eq!(transport.count("/refresh"), 0);
}

#[tokio::test]
async fn authorized_calls_carry_the_bearer_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items/7", 200, r#"{"id":7}"#);
    let engine = logged_in(&transport, context(true, false)).await;
    let request = engine
        .authorized_request("/items/7", None, ArgumentEncoding::QueryString, HttpMethod::Get)
        .unwrap();

    let item: Item = engine.call(&request).await.unwrap();

    assert_eq!(item, Item { id: 7 });
    assert_eq!(transport.requests_to("/items/7")[0].bearer_token(), Some("abc"));
}

#[tokio::test]
async fn zero_budget_never_dispatches() {
    let transport = Arc::new(ScriptedTransport::new());
    let engine = engine(&transport, context(true, false));

    let err = engine.call_with_budget::<Value>(&items_request(&engine), 0).await.unwrap_err();

    assert!(matches!(err, CallError::ExcessiveNumberOfAttempts));
    assert!(transport.requests().is_empty());
    assert_eq!(engine.session().phase().await, AuthPhase::Unauthenticated);
}

#[tokio::test]
async fn refresh_with_a_token_held_fails_without_dispatch() {
    let transport = Arc::new(ScriptedTransport::new());
    let engine = logged_in(&transport, context(true, false)).await;
    let dispatched = transport.requests().len();

    let err = engine.refresh().await.unwrap_err();

    assert!(matches!(err, CallError::TokenRefreshDidFail { cause: None }));
    assert_eq!(transport.requests().len(), dispatched);
    assert_eq!(engine.session().access_token().await, "abc");
}

#[tokio::test]
async fn refresh_without_descriptor_is_not_supported() {
    let transport = Arc::new(ScriptedTransport::new());
    let engine = engine(&transport, context(false, false));

    let err = engine.refresh().await.unwrap_err();

    assert!(matches!(err, CallError::TokenRefreshIsNotSupported));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn manual_refresh_from_unauthenticated_state() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/refresh", 200, r#"{"access_token":"fresh"}"#);
    let engine = engine(&transport, context(true, false));

    let message = engine.refresh().await.unwrap();

    assert_eq!(message, "Successful token refresh");
    assert_eq!(engine.session().access_token().await, "fresh");
    assert!(engine.session().snapshot().await.last_refresh_attempt().is_some());
}

#[tokio::test]
async fn rejection_refreshes_once_then_retries_with_new_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "").respond("/items", 200, r#"[{"id":1},{"id":2}]"#);
    transport.respond("/refresh", 200, r#"{"access_token":"fresh"}"#);
    let engine = logged_in(&transport, context(true, false)).await;

    let items: Vec<Item> = engine.call_many(&items_request(&engine)).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(transport.count("/refresh"), 1);
    let paths: Vec<String> =
        transport.requests().iter().map(|r| r.url().path().to_string()).collect();
    assert_eq!(paths, vec!["/login", "/items", "/refresh", "/items"]);

    let attempts = transport.requests_to("/items");
    assert_eq!(attempts[0].bearer_token(), Some("abc"));
    assert_eq!(attempts[1].bearer_token(), Some("fresh"));
}

#[tokio::test]
async fn rejection_on_login_url_is_a_security_failure() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/login", 403, "");
    let engine = engine(&transport, context(true, true));
    let request = RequestBuilder::from_descriptor(engine.session().context().login(), None)
        .unwrap();

    let err = engine.call::<Value>(&request).await.unwrap_err();

    assert!(matches!(err, CallError::SecurityFailure));
    assert_eq!(transport.count("/login"), 1);
    assert_eq!(transport.count("/refresh"), 0);
}

#[tokio::test]
async fn rejection_on_refresh_url_is_a_security_failure() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/refresh", 401, "");
    let engine = engine(&transport, context(true, false));
    let refresh = engine.session().context().refresh().unwrap().clone();
    let request = RequestBuilder::build(
        &format!("{}?probe=1", refresh.base_url()),
        HttpMethod::Get,
        None,
        ArgumentEncoding::QueryString,
    )
    .unwrap();

    let err = engine.call::<Value>(&request).await.unwrap_err();

    assert!(matches!(err, CallError::SecurityFailure));
    assert_eq!(transport.count("/refresh"), 1);
}

#[tokio::test]
async fn missing_refresh_endpoint_ends_in_refresh_failure() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "");
    let engine = logged_in(&transport, context(false, false)).await;
    let mut events = engine.subscribe();

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(
        err,
        CallError::TokenRefreshDidFail { cause: Some(ref cause) }
            if matches!(**cause, CallError::TokenRefreshIsNotSupported)
    ));
    assert!(err.requires_authentication());
    assert_eq!(events.try_recv().unwrap(), AuthEvent::AuthenticationRequired);
    assert!(!engine.session().is_authenticated().await);
    assert_eq!(transport.count("/items"), 1);
}

#[tokio::test]
async fn reduced_mode_reauthenticates_with_stored_credentials() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "").respond("/items", 200, r#"{"id":1}"#);
    transport.respond("/refresh", 500, "refresh backend down");
    transport.respond("/login", 200, r#"{"access_token":"relogged"}"#);

    let store = Arc::new(InMemoryCredentialStore::new());
    store.seed(&CredentialKey::derive("alice", &identity()), "alice", "pw1");
    let session = AuthSession::new(
        context(true, true).with_credentials(Credentials::account_only("alice")),
    )
    .with_credential_store(store.clone());
    let engine = CallEngine::new(transport.clone(), session);
    assert!(engine.restore_credentials().await.unwrap());

    let request = items_request(&engine);
    let item: Item = engine.call_with_budget(&request, 2).await.unwrap();

    assert_eq!(item, Item { id: 1 });
    assert_eq!(transport.count("/refresh"), 1);
    assert_eq!(transport.count("/items"), 2);

    let login = &transport.requests_to("/login")[0];
    let body = String::from_utf8(login.body().unwrap().to_vec()).unwrap();
    assert!(body.contains("email=alice"));
    assert!(body.contains("password=pw1"));
    assert_eq!(transport.requests_to("/items")[1].bearer_token(), Some("relogged"));
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn recovery_consumes_one_unit_of_budget() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "").respond("/items", 200, "{}");
    transport.respond("/refresh", 200, r#"{"access_token":"fresh"}"#);
    let engine = engine(&transport, context(true, false));

    let err = engine.call_with_budget::<Value>(&items_request(&engine), 1).await.unwrap_err();

    assert!(matches!(err, CallError::ExcessiveNumberOfAttempts));
    assert_eq!(transport.count("/items"), 1);
    assert_eq!(transport.count("/refresh"), 1);
    assert_eq!(engine.session().phase().await, AuthPhase::LockedOut);
}

#[tokio::test]
async fn successful_call_after_exhaustion_clears_the_lock_out() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "").respond("/items", 200, "{}");
    transport.respond("/refresh", 200, r#"{"access_token":"fresh"}"#);
    let engine = engine(&transport, context(true, false));
    let request = items_request(&engine);

    let err = engine.call_with_budget::<Value>(&request, 1).await.unwrap_err();
    assert!(matches!(err, CallError::ExcessiveNumberOfAttempts));
    assert_eq!(engine.session().phase().await, AuthPhase::LockedOut);

    engine.call::<Value>(&request).await.unwrap();

    assert!(engine.session().is_authenticated().await);
    assert_eq!(engine.session().phase().await, AuthPhase::Authenticated);
}

#[tokio::test]
async fn void_credentials_are_never_used_for_reauthentication() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "");
    transport.respond("/refresh", 500, "");
    let engine = CallEngine::new(
        transport.clone(),
        AuthSession::new(context(true, true).with_credentials(Credentials::account_only("alice"))),
    );
    let mut events = engine.subscribe();

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(err, CallError::AuthenticationDidFail { .. }));
    assert_eq!(err.root_cause().status_code(), Some(500));
    assert_eq!(transport.count("/login"), 0);
    assert_eq!(events.try_recv().unwrap(), AuthEvent::AuthenticationRequired);
}

#[tokio::test]
async fn failed_reauthentication_reports_authentication_failure() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "");
    transport.respond("/refresh", 500, "");
    transport.respond("/login", 200, TOKEN_BODY).respond("/login", 200, r#"{"nope":"x"}"#);
    let engine = logged_in(&transport, context(true, true)).await;
    let mut events = engine.subscribe();

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(
        err,
        CallError::AuthenticationDidFail { cause: Some(ref cause) }
            if matches!(**cause, CallError::MissingTokenKey(_))
    ));
    assert_eq!(events.try_recv().unwrap(), AuthEvent::AuthenticationRequired);
}

#[tokio::test]
async fn persistent_rejection_exhausts_the_budget() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 401, "");
    transport.respond("/refresh", 200, r#"{"access_token":"fresh"}"#);
    let engine = logged_in(&transport, context(true, false)).await;

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(err, CallError::ExcessiveNumberOfAttempts));
    assert_eq!(transport.count("/items"), 3);
    assert_eq!(transport.count("/refresh"), 3);
    assert_eq!(engine.session().phase().await, AuthPhase::LockedOut);
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .respond("/items", 401, "")
        .respond("/items", 401, "")
        .respond("/items", 200, r#"{"id":3}"#);
    transport.respond("/refresh", 200, r#"{"access_token":"fresh"}"#);
    let engine = logged_in(&transport, context(true, false)).await;
    let request = items_request(&engine);

    let (first, second) =
        tokio::join!(engine.call::<Item>(&request), engine.call::<Item>(&request));

    assert_eq!(first.unwrap(), Item { id: 3 });
    assert_eq!(second.unwrap(), Item { id: 3 });
    assert_eq!(transport.count("/refresh"), 1);
    assert_eq!(transport.count("/items"), 4);
}

#[tokio::test]
async fn non_http_response_is_invalid_context() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_not_http("/items");
    let engine = engine(&transport, context(true, false));

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(err, CallError::HttpContextIsInvalid));
}

#[tokio::test]
async fn unexpected_status_is_reported_not_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 503, "  maintenance  ");
    let engine = engine(&transport, context(true, false));

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(
        err,
        CallError::InvalidHttpStatus { code: 503, ref message } if message == "maintenance"
    ));
    assert_eq!(transport.count("/items"), 1);
}

#[tokio::test]
async fn transport_failure_is_surfaced() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.fail("/items", "connection reset");
    let engine = engine(&transport, context(true, false));

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(err, CallError::Transport(ref m) if m.contains("connection reset")));
    assert_eq!(transport.count("/items"), 1);
}

#[tokio::test]
async fn missing_body_is_void_data() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_empty("/items", 204);
    let engine = engine(&transport, context(true, false));

    let err = engine.call::<Value>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(err, CallError::VoidData));
}

#[tokio::test]
async fn undecodable_body_keeps_the_cause() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/items", 200, r#"{"id":"seven"}"#);
    let engine = engine(&transport, context(true, false));

    let err = engine.call::<Item>(&items_request(&engine)).await.unwrap_err();

    assert!(matches!(err, CallError::DeserializationFailed(_)));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn text_calls_skip_json_decoding() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/motd", 200, "hello, world");
    let engine = engine(&transport, context(true, false));
    let request = engine
        .authorized_request("motd", None, ArgumentEncoding::QueryString, HttpMethod::Get)
        .unwrap();

    assert_eq!(engine.call_text(&request).await.unwrap(), "hello, world");
}

#[tokio::test]
async fn empty_text_body_is_an_empty_string() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/motd", 200, "");
    let engine = engine(&transport, context(true, false));
    let request = engine
        .authorized_request("motd", None, ArgumentEncoding::QueryString, HttpMethod::Get)
        .unwrap();

    assert_eq!(engine.call_text(&request).await.unwrap(), "");
}

#[tokio::test]
async fn download_returns_the_artifact_location() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/report", 200, "/tmp/report.pdf");
    transport.respond_empty("/empty", 200);
    let engine = engine(&transport, context(true, false));
    let route = |r: &str| {
        engine.authorized_request(r, None, ArgumentEncoding::QueryString, HttpMethod::Get).unwrap()
    };

    let path = engine.download(&route("report")).await.unwrap();
    let err = engine.download(&route("empty")).await.unwrap_err();

    assert_eq!(path, PathBuf::from("/tmp/report.pdf"));
    assert!(matches!(err, CallError::UndefinedArtifactLocation));
}

#[tokio::test]
async fn render_pretty_prints_json_and_describes_errors() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/json", 200, r#"{"a":1}"#);
    transport.respond("/text", 200, "plain");
    transport.respond("/missing", 404, "");
    let engine = engine(&transport, context(true, false));
    let route = |r: &str| {
        engine.authorized_request(r, None, ArgumentEncoding::QueryString, HttpMethod::Get).unwrap()
    };

    assert_eq!(engine.render(&route("json")).await, "{\n  \"a\": 1\n}");
    assert_eq!(engine.render(&route("text")).await, "plain");
    assert_eq!(engine.render(&route("missing")).await, "Response error: Invalid HTTP status 404");
}

#[tokio::test]
async fn json_requests_carry_the_value() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/notes", 201, r#"{"id":9}"#);
    let engine = logged_in(&transport, context(true, false)).await;
    let request = engine
        .authorized_json_request("notes", &serde_json::json!({"title": "t"}), HttpMethod::Post)
        .unwrap();

    let item: Item = engine.call(&request).await.unwrap();

    assert_eq!(item.id, 9);
    let sent = &transport.requests_to("/notes")[0];
    assert_eq!(sent.bearer_token(), Some("abc"));
    assert_eq!(sent.body(), Some(r#"{"title":"t"}"#.as_bytes()));
}

#[tokio::test]
async fn logout_clears_token_and_timestamps() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/token", 200, "bye");
    let engine = logged_in(&transport, context(true, false)).await;

    let message = engine.logout().await.unwrap();

    assert_eq!(message, "Successful deconnection");
    let state = engine.session().snapshot().await;
    assert!(!state.is_authenticated());
    assert!(state.last_auth_attempt().is_none());
    assert!(state.last_refresh_attempt().is_none());

    let logout = &transport.requests_to("/token")[0];
    assert_eq!(logout.method(), HttpMethod::Delete);
    assert_eq!(logout.bearer_token(), Some("abc"));
}

#[tokio::test]
async fn failed_logout_keeps_the_session() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/token", 500, "");
    let engine = logged_in(&transport, context(true, false)).await;

    assert!(engine.logout().await.is_err());
    assert_eq!(engine.session().access_token().await, "abc");
}

#[tokio::test]
async fn custom_token_key_is_honoured() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("/session", 200, r#"{"jwt":"xyz","expires_in":3600}"#);
    let login = EndpointDescriptor::parse(
        "https://id.example.com/session",
        HttpMethod::Post,
        ArgumentEncoding::JSON,
    )
    .unwrap();
    let conventional = AuthDescriptors::conventional(&identity()).unwrap();
    let context = AuthContext::new(
        identity(),
        identity(),
        AuthDescriptors::new(login, conventional.logout, None),
    )
    .with_field_keys("user", "pass", "jwt");
    let engine = engine(&transport, context);

    engine.authenticate("alice", "pw1").await.unwrap();

    assert_eq!(engine.session().access_token().await, "xyz");
    let sent: Value =
        serde_json::from_slice(transport.requests_to("/session")[0].body().unwrap()).unwrap();
    assert_eq!(sent, serde_json::json!({"user": "alice", "pass": "pw1"}));
}
