//! Session and CRUD flows against the live mock server.
//!
//! # Design
//! Each test starts its own mock server on a random port so state (issued
//! tokens, created products) never leaks between tests, then drives the
//! harness over real HTTP.

use harness_core::{
    generate_test_email, ApiClient, ApiError, AuthManager, HarnessConfig, Product, ProductInput,
    ProductPage, TestDataManager, UserId,
};
use mock_server::MockOptions;
use serde_json::json;

async fn spawn_server(options: MockOptions) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with(listener, options));
    format!("http://{addr}")
}

async fn auth_manager() -> AuthManager {
    let base_url = spawn_server(MockOptions::default()).await;
    AuthManager::from_config(HarnessConfig::new(&base_url))
}

#[tokio::test]
async fn emilys_login_and_profile() {
    let mut auth = auth_manager().await;

    let session = auth.login("emilys", "emilyspass").await.unwrap();
    assert_eq!(session.user.username.as_deref(), Some("emilys"));
    assert!(session.token.as_deref().is_some_and(|t| !t.is_empty()));

    assert!(auth.is_authenticated());
    assert!(auth.get_current_user_token().is_some_and(|t| !t.is_empty()));
    assert!(auth.client().is_authenticated());

    let profile = auth.get_current_user().await.unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Emily"));
    assert_eq!(profile.extra["age"], 28);
}

#[tokio::test]
async fn invalid_credentials_leave_session_logged_out() {
    let mut auth = auth_manager().await;

    let err = auth.login("emilys", "wrong").await.unwrap_err();
    match err {
        ApiError::AuthenticationFailed { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message.as_deref(), Some("Invalid credentials"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!auth.is_authenticated());
    assert!(auth.get_current_user_token().is_none());

    // The anonymous context from the attempt stays until logout.
    assert!(auth.client().has_context());
    assert!(!auth.client().is_authenticated());
    auth.logout();
    assert!(!auth.client().has_context());
}

#[tokio::test]
async fn failed_relogin_drops_previous_session() {
    let mut auth = auth_manager().await;
    auth.login("emilys", "emilyspass").await.unwrap();

    assert!(auth.login("emilys", "wrong").await.is_err());
    assert!(!auth.is_authenticated());
    assert!(!auth.client().is_authenticated());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let mut auth = auth_manager().await;
    auth.login("emilys", "emilyspass").await.unwrap();

    auth.logout();
    assert!(!auth.is_authenticated());
    assert!(auth.get_current_user_token().is_none());

    auth.logout();
    assert!(!auth.is_authenticated());
    assert!(auth.get_current_user_token().is_none());
    assert!(!auth.client().has_context());
}

#[tokio::test]
async fn raw_profile_is_returned_as_sent() {
    let mut auth = auth_manager().await;
    auth.login("emilys", "emilyspass").await.unwrap();

    let raw = auth.get_current_user_raw().await.unwrap();
    assert_eq!(raw["username"], "emilys");
    assert_eq!(raw["age"], 28);
    assert!(raw.get("password").is_none());
}

#[tokio::test]
async fn current_user_after_logout_fails() {
    let mut auth = auth_manager().await;
    auth.login("emilys", "emilyspass").await.unwrap();
    auth.logout();

    assert!(matches!(
        auth.get_current_user().await,
        Err(ApiError::NoAuthenticatedUser)
    ));
}

#[tokio::test]
async fn sessions_do_not_leak_across_logins() {
    let mut auth = auth_manager().await;

    let first_token = auth
        .login("emilys", "emilyspass")
        .await
        .unwrap()
        .token
        .clone();
    auth.logout();

    let session = auth.login("michaelw", "michaelwpass").await.unwrap();
    assert_eq!(session.user.username.as_deref(), Some("michaelw"));
    assert_eq!(session.user.first_name.as_deref(), Some("Michael"));
    assert_ne!(session.token, first_token);

    let profile = auth.get_current_user().await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("michaelw"));
    assert_eq!(profile.id, Some(UserId::Number(2)));
}

#[tokio::test]
async fn relogin_without_logout_replaces_session() {
    let mut auth = auth_manager().await;
    auth.login("emilys", "emilyspass").await.unwrap();
    auth.login("michaelw", "michaelwpass").await.unwrap();

    assert_eq!(auth.session().unwrap().user.display_name(), "michaelw");
    let profile = auth.get_current_user().await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("michaelw"));
}

#[tokio::test]
async fn legacy_token_field_is_accepted() {
    let base_url = spawn_server(MockOptions {
        legacy_token_field: true,
    })
    .await;
    let mut auth = AuthManager::from_config(HarnessConfig::new(&base_url));

    auth.login("emilys", "emilyspass").await.unwrap();
    assert!(auth.get_current_user_token().is_some());
    let profile = auth.get_current_user().await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("emilys"));
}

#[tokio::test]
async fn revoked_token_fails_profile_fetch() {
    let mut auth = auth_manager().await;
    auth.login("emilys", "emilyspass").await.unwrap();

    let revoked = auth.client().create("/auth/logout", &json!({})).await.unwrap();
    assert!(revoked.success);

    match auth.get_current_user().await {
        Err(ApiError::ProfileFetchFailed { status }) => assert_eq!(status, 401),
        other => panic!("unexpected result: {other:?}"),
    }
    // The cached session is not touched by a failed profile fetch.
    assert!(auth.is_authenticated());
}

#[tokio::test]
async fn refresh_rotates_tokens() {
    let mut auth = auth_manager().await;
    let original = auth
        .login("emilys", "emilyspass")
        .await
        .unwrap()
        .clone();

    let refreshed = auth.refresh_session().await.unwrap();
    assert_ne!(refreshed.token, original.token);
    assert_ne!(refreshed.refresh_token, original.refresh_token);
    assert_eq!(refreshed.user, original.user);

    let profile = auth.get_current_user().await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("emilys"));
}

#[tokio::test]
async fn authenticated_route_through_session_client() {
    let mut auth = auth_manager().await;

    let anonymous = ApiClient::new(auth.client().config().clone());
    assert!(matches!(
        anonymous.fetch("/auth/products", &[]).await,
        Err(ApiError::ContextNotInitialized)
    ));

    auth.login("emilys", "emilyspass").await.unwrap();
    let envelope = auth
        .client()
        .fetch("/auth/products", &[("limit", "2")])
        .await
        .unwrap();
    assert!(envelope.success);
    let page: ProductPage = envelope.json().unwrap();
    assert_eq!(page.products.len(), 2);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn product_crud_through_api_client() {
    let base_url = spawn_server(MockOptions::default()).await;
    let mut client = ApiClient::with_base_url(&base_url);
    client.create_context(None).unwrap();

    let listing = client.fetch("/products", &[("skip", "1")]).await.unwrap();
    assert_eq!(listing.status, 200);
    let page: ProductPage = listing.json().unwrap();
    assert_eq!(page.skip, 1);
    assert_eq!(page.products[0].id, 2);

    let input = ProductInput {
        title: Some("Harness Widget".to_string()),
        price: Some(4.5),
    };
    let created = client.create("/products/add", &input).await.unwrap();
    assert_eq!(created.status, 201);
    assert!(created.success);
    let product: Product = created.json().unwrap();
    assert_eq!(product.title, "Harness Widget");

    let update = ProductInput {
        title: None,
        price: Some(6.0),
    };
    let replaced = client
        .replace(&format!("/products/{}", product.id), &update)
        .await
        .unwrap();
    let updated: Product = replaced.json().unwrap();
    assert_eq!(updated.title, "Harness Widget");
    assert_eq!(updated.price, Some(6.0));

    let removed = client
        .remove(&format!("/products/{}", product.id))
        .await
        .unwrap();
    assert!(removed.success);
    assert_eq!(removed.body["isDeleted"], true);

    let missing = client
        .fetch(&format!("/products/{}", product.id), &[])
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
    assert!(!missing.success);
    assert!(missing.message().unwrap().contains("not found"));
}

#[tokio::test]
async fn context_headers_reach_the_server() {
    let base_url = spawn_server(MockOptions::default()).await;
    let config = HarnessConfig::new(&base_url).with_header("X-Test-Run", "smoke");
    let mut client = ApiClient::new(config);

    client.create_context(None).unwrap();
    let echoed = client.fetch("/headers", &[]).await.unwrap();
    assert_eq!(echoed.body["accept"], "application/json");
    assert_eq!(echoed.body["content-type"], "application/json");
    assert_eq!(echoed.body["x-test-run"], "smoke");
    assert!(echoed.body.get("authorization").is_none());
    assert_eq!(
        echoed.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );

    client.authenticate("t0k").unwrap();
    let echoed = client.fetch("/headers", &[]).await.unwrap();
    assert_eq!(echoed.body["authorization"], "Bearer t0k");
    assert_eq!(echoed.body["x-test-run"], "smoke");
}

#[tokio::test]
async fn non_json_body_is_a_parse_error() {
    let base_url = spawn_server(MockOptions::default()).await;
    let mut client = ApiClient::with_base_url(&base_url);
    client.create_context(None).unwrap();

    assert!(matches!(
        client.fetch("/plain", &[]).await,
        Err(ApiError::Parse { excerpt: Some(_), .. })
    ));
}

#[tokio::test]
async fn transport_failure_is_surfaced() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = ApiClient::with_base_url(&format!("http://{addr}"));
    client.create_context(None).unwrap();
    assert!(matches!(
        client.fetch("/products", &[]).await,
        Err(ApiError::Transport(_))
    ));
}

#[tokio::test]
async fn store_carries_values_between_steps() {
    let mut auth = auth_manager().await;
    let store = TestDataManager::new();
    let step_two = store.clone();

    let session = auth.login("emilys", "emilyspass").await.unwrap();
    store.set_token(session.token.as_deref().unwrap());
    store.set_user(
        session.user.id.clone().unwrap(),
        serde_json::to_value(&session.user).unwrap(),
    );
    store.set("signup_email", generate_test_email("emilys"));

    let envelope = auth.client().fetch("/auth/me", &[]).await.unwrap();
    store.set_last_response(&envelope).unwrap();

    assert_eq!(
        step_two.get_token().as_deref(),
        auth.get_current_user_token()
    );
    assert_eq!(step_two.get_user(1).unwrap()["username"], "emilys");
    let last = step_two.get_last_response().unwrap().unwrap();
    assert_eq!(last.status, 200);
    assert_eq!(last.body["firstName"], "Emily");
    assert!(step_two.get("signup_email").unwrap().as_str().unwrap().ends_with("@test.example.com"));
    assert!(step_two.get("never_written").is_none());
}
