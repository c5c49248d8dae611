use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use backoffice_client::{
    ApiClient, ClientConfig, ClientError, ModalCloser, NotificationBus, PostOutcome, QueryParams,
    ViewContent, ViewSession,
};
use futures_util::future::join_all;
use httpmock::prelude::*;
use serde_json::{Value, json};
use url::Url;

fn client(server: &MockServer) -> ApiClient {
    let base = Url::parse(&server.url("/api/")).expect("base url");
    ApiClient::new(
        ClientConfig::new(base).with_csrf_token("csrf"),
        NotificationBus::new(),
    )
    .expect("client")
}

fn params() -> QueryParams {
    QueryParams::new().with("view_slug", "profile")
}

fn counter() -> (Arc<AtomicUsize>, impl FnMut(&Value) + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move |_: &Value| {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn open_renders_and_failed_fetch_is_recoverable() {
    let server = MockServer::start_async().await;
    let mut failing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/view/")
                .query_param("view_slug", "profile");
            then.status(503).body("maintenance");
        })
        .await;

    let mut session = ViewSession::open(client(&server), params())
        .await
        .expect("session");
    let ViewContent::Failed(failure) = session.content() else {
        panic!("expected failure, got {:?}", session.content());
    };
    assert_eq!(failure.status, Some(503));
    assert_eq!(failure.message, "maintenance");

    failing.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/view/")
                .query_param("view_slug", "profile");
            then.status(200).json_body(json!({
                "messages": [],
                "response_data": {"slug": "profile", "content": "<h1>Profile</h1>"}
            }));
        })
        .await;

    session.fetch().await;
    assert_eq!(session.content().html(), Some("<h1>Profile</h1>"));
}

#[tokio::test]
async fn action_without_reload_never_fetches() {
    let server = MockServer::start_async().await;
    let action = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(json!({
                "method": "lookup",
                "params": {"partial": "ac"},
                "view_params": {"view_slug": "profile"}
            }));
            then.status(200)
                .json_body(json!({"messages": [], "response_data": ["acme"]}));
        })
        .await;

    let mut session = ViewSession::new(client(&server), params()).expect("session");
    let result = session
        .action("lookup", &json!({"partial": "ac"}), false, None)
        .await
        .expect("lookup");

    action.assert_async().await;
    assert_eq!(result, json!(["acme"]));
    assert_eq!(session.content(), &ViewContent::Pending);
}

#[tokio::test]
async fn action_with_reload_refetches_and_fires_handlers() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .header("x-csrftoken", "csrf");
            then.status(200)
                .json_body(json!({"messages": [], "response_data": {"ok": true}}));
        })
        .await;
    let view = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/view/");
            then.status(200)
                .json_body(json!({"response_data": {"content": "<p>fresh</p>"}}));
        })
        .await;

    let mut session = ViewSession::new(client(&server), params()).expect("session");
    let (method_calls, on_method) = counter();
    let (all_calls, on_all) = counter();
    session.on_success("archive", on_method);
    session.on_success("__all__", on_all);

    session
        .action("archive", &json!({}), true, None)
        .await
        .expect("archive");

    view.assert_async().await;
    assert_eq!(session.content().html(), Some("<p>fresh</p>"));
    assert_eq!(method_calls.load(Ordering::SeqCst), 1);
    assert_eq!(all_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_reloading_action_stores_error_and_skips_handlers() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/");
            then.status(403).body("denied");
        })
        .await;

    let mut session = ViewSession::new(client(&server), params()).expect("session");
    let (calls, on_all) = counter();
    session.on_success("__all__", on_all);

    let err = session
        .action("archive", &json!({}), true, None)
        .await
        .expect_err("forbidden");

    assert!(matches!(err, ClientError::Transport { status: 403, .. }));
    assert!(matches!(session.content(), ViewContent::Failed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.client().outstanding(), 0);
}

struct RecordingCloser {
    client: ApiClient,
    outstanding_at_close: Option<usize>,
}

#[async_trait]
impl ModalCloser for RecordingCloser {
    async fn close(&mut self) {
        tokio::task::yield_now().await;
        self.outstanding_at_close = Some(self.client.outstanding());
    }
}

#[tokio::test]
async fn post_closes_modal_before_sending() {
    let server = MockServer::start_async().await;
    let post = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view/")
                .query_param("view_slug", "profile")
                .body("name=Ann");
            then.status(200).json_body(json!({
                "messages": [{"message": "Profile saved", "level": 25}],
                "response_data": {"content": "<p>saved</p>", "success": true}
            }));
        })
        .await;

    let api = client(&server);
    let mut session = ViewSession::new(api.clone(), params()).expect("session");
    let (calls, on_post) = counter();
    session.on_success("post", on_post);
    let mut closer = RecordingCloser {
        client: api.clone(),
        outstanding_at_close: None,
    };

    let outcome = session
        .post(&QueryParams::new().with("name", "Ann"), Some(&mut closer))
        .await
        .expect("post");

    post.assert_async().await;
    assert_eq!(closer.outstanding_at_close, Some(0));
    assert!(matches!(outcome, PostOutcome::Saved(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.notifications().drain()[0].message, "Profile saved");
}

#[tokio::test]
async fn post_without_success_marker_is_a_validation_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view/");
            then.status(200).json_body(json!({
                "response_data": {"content": "<form>name is required</form>"}
            }));
        })
        .await;

    let mut session = ViewSession::new(client(&server), params()).expect("session");
    let (calls, on_post) = counter();
    session.on_success("post", on_post);

    let outcome = session.post(&QueryParams::new(), None).await.expect("post");

    let PostOutcome::ValidationFailed(payload) = outcome else {
        panic!("expected validation failure");
    };
    assert!(payload.content.contains("required"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn outstanding_counter_balances_under_mixed_concurrency() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/ok/");
            then.status(200).json_body(json!({
                "messages": [{"message": "read", "level": 20}],
                "response_data": 1
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/fail/");
            then.status(500).body("boom");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/ok/");
            then.status(200).json_body(json!({"response_data": 2}));
        })
        .await;

    let api = client(&server);
    let gets = (0..5).map(|_| {
        let api = api.clone();
        async move { api.get("ok", &QueryParams::new()).await.is_ok() }
    });
    let posts = (0..5).map(|_| {
        let api = api.clone();
        async move { api.post("fail", &json!({}), None).await.is_ok() }
    });
    let puts = (0..5).map(|_| {
        let api = api.clone();
        async move { api.put("ok", &json!({})).await.is_ok() }
    });

    let (gets, posts, puts) = tokio::join!(join_all(gets), join_all(posts), join_all(puts));

    assert!(gets.iter().all(|ok| *ok));
    assert!(posts.iter().all(|ok| !*ok));
    assert!(puts.iter().all(|ok| *ok));
    assert_eq!(api.outstanding(), 0);
    assert!(!api.is_loading());
    assert_eq!(api.notifications().len(), 5);
}
