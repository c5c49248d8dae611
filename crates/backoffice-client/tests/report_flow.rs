use backoffice_api_models::ItemId;
use backoffice_client::report::{
    ActionOutcome, BulkOutcome, ConfirmedOutcome, FragmentContent, ReportEvent,
    ReportListController,
};
use backoffice_client::{ApiClient, ClientConfig, ClientError, NotificationBus, QueryParams, ViewSession};
use httpmock::prelude::*;
use serde_json::{Value, json};
use url::Url;

const VIEW_PARAMS: &str = "orders";

fn fetch_body() -> Value {
    json!({
        "method": "fetch",
        "params": {},
        "view_params": {"view_slug": VIEW_PARAMS}
    })
}

fn action_body(params: Value) -> Value {
    json!({
        "method": "action",
        "params": params,
        "view_params": {"view_slug": VIEW_PARAMS}
    })
}

fn row(id: u64) -> Value {
    json!({
        "item_id": id,
        "name": format!("order {id}"),
        "extra_information": format!(r#"<div ng-bind-html-unsafe="lazydiv__{id}__history"></div>"#),
        "actions": [
            {"method": "approve", "verbose_name": "Approve"},
            {"method": "delete", "confirm": "Delete this order?", "next_on_success": true},
            {"method": "invoice_view"},
            {"method": "note", "form": "<form><input name=\"text\"></form>"}
        ]
    })
}

fn report(ids: &[u64], item_count: u64) -> Value {
    json!({
        "messages": [],
        "response_data": {
            "items": ids.iter().map(|id| row(*id)).collect::<Vec<_>>(),
            "item_count": item_count,
            "items_per_page": 20,
            "report_header_visible": true,
            "search_fields": [{"name": "q"}],
            "multiple_actions": true,
            "multiple_action_list": [
                {"method": "archive"},
                {"method": "export_view"}
            ],
            "extra": {"order_by": null, "ascending": true}
        }
    })
}

fn controller(server: &MockServer, extra: &[(&str, &str)]) -> ReportListController {
    let base = Url::parse(&server.url("/api/")).expect("base url");
    let api = ApiClient::new(ClientConfig::new(base), NotificationBus::new()).expect("client");
    let mut params = QueryParams::new().with("view_slug", VIEW_PARAMS);
    params.extend(extra.iter().copied());
    let session = ViewSession::new(api, params).expect("session");
    let fragments = Url::parse(&server.url("/reports/orders/")).expect("fragment base");
    ReportListController::new(session, fragments)
}

#[tokio::test]
async fn single_result_is_expanded_with_lazy_fragments() {
    let server = MockServer::start_async().await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .query_param("page", "1")
                .json_body(fetch_body());
            then.status(200).json_body(report(&[5], 1));
        })
        .await;
    let fragment = server
        .mock_async(|when, then| {
            when.method(GET).path("/reports/orders/action/history/5/");
            then.status(200).body("<ul><li>created</li></ul>");
        })
        .await;

    let mut controller = controller(&server, &[]);
    let mut events = controller.subscribe();
    controller
        .navigate(&QueryParams::new())
        .await
        .expect("fetch");

    fetch.assert_async().await;
    fragment.assert_async().await;
    assert!(controller.state().items()[0].expanded);
    assert_eq!(
        controller.state().fragment("lazydiv__5__history"),
        Some(&FragmentContent::Loaded("<ul><li>created</li></ul>".into()))
    );
    assert_eq!(
        events.try_recv().expect("loaded"),
        ReportEvent::Loaded {
            page: 1,
            item_count: 1
        }
    );
    assert_eq!(
        events.try_recv().expect("expanded"),
        ReportEvent::ItemExpanded(ItemId::from("5"))
    );
}

#[tokio::test]
async fn failed_fragments_are_marked_as_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/reports/orders/action/history/2/");
            then.status(500);
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    assert!(!controller.state().items()[0].expanded);

    controller.toggle_expand(&ItemId::from("2")).await;
    assert_eq!(
        controller.state().fragment("lazydiv__2__history"),
        Some(&FragmentContent::Failed)
    );
}

#[tokio::test]
async fn change_page_fetches_exactly_once_per_real_change() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .query_param("page", "1");
            then.status(200).json_body(report(&[1, 2], 45));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .query_param("page", "2")
                .json_body(fetch_body());
            then.status(200).json_body(report(&[21, 22], 45));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("first page");
    assert_eq!(controller.state().page_count(), Some(3));

    assert!(controller.change_page(2).await.expect("second page"));
    assert!(!controller.change_page(2).await.expect("current page"));
    assert!(!controller.change_page(0).await.expect("below range"));
    assert!(!controller.change_page(4).await.expect("above range"));

    second.assert_async().await;
    assert_eq!(controller.state().page(), 2);
    assert_eq!(controller.state().items()[0].item_id.as_str(), "21");
}

#[tokio::test]
async fn change_order_follows_the_server_echo() {
    let server = MockServer::start_async().await;
    let echo = |order: &str| {
        let mut body = report(&[1, 2], 2);
        let (field, ascending) = order
            .strip_prefix('-')
            .map_or((order, true), |field| (field, false));
        body["response_data"]["extra"] = json!({"order_by": field, "ascending": ascending});
        body
    };
    for order in ["created", "name", "-name"] {
        let body = echo(order);
        server
            .mock_async(move |when, then| {
                when.method(POST)
                    .path("/api/view_action/")
                    .query_param("order", order);
                then.status(200).json_body(body);
            })
            .await;
    }

    let mut controller = controller(&server, &[]);
    controller
        .navigate(&QueryParams::parse("order=created&page=1"))
        .await
        .expect("initial");

    controller.change_order("name").await.expect("ascending");
    assert_eq!(controller.state().query().order.as_deref(), Some("name"));
    controller.change_order("name").await.expect("descending");
    assert_eq!(controller.state().query().order.as_deref(), Some("-name"));
    controller.change_order("name").await.expect("ascending again");
    assert_eq!(controller.state().query().order.as_deref(), Some("name"));
    assert_eq!(controller.state().page(), 1);
}

#[tokio::test]
async fn apply_filters_resets_to_first_page_and_keeps_order() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .query_param("page", "2")
                .query_param("order", "-name");
            then.status(200).json_body(report(&[21], 45));
        })
        .await;
    let filtered = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .query_param("page", "1")
                .query_param("order", "-name")
                .query_param("status", "open");
            then.status(200).json_body(report(&[3, 4], 2));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller
        .navigate(&QueryParams::parse("page=2&order=-name"))
        .await
        .expect("initial");
    assert!(!controller.state().has_applied_filters());

    controller.state_mut().set_filter("status", "open");
    controller.apply_filters().await.expect("filtered");

    filtered.assert_async().await;
    assert_eq!(controller.state().page(), 1);
    assert!(controller.state().has_applied_filters());
}

#[tokio::test]
async fn confirmation_gates_removal_and_next_row_expands() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2, 3], 3));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    let first = ItemId::from("1");

    let outcome = controller
        .execute_action(&first, "delete", false)
        .await
        .expect("staged");
    assert_eq!(
        outcome,
        ActionOutcome::AwaitingConfirmation("Delete this order?".into())
    );
    assert_eq!(controller.state().items().len(), 3);
    assert_eq!(controller.session().client().outstanding(), 0);

    let delete = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .json_body(action_body(json!({"method": "delete", "pk": "1"})));
            then.status(200).json_body(json!({
                "messages": [],
                "response_data": {"removed_item_id": 1, "success": "Order deleted"}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/reports/orders/action/history/2/");
            then.status(200).body("<p>history</p>");
        })
        .await;

    let confirmed = controller.confirm_pending().await.expect("confirmed");

    delete.assert_async().await;
    assert_eq!(
        confirmed,
        ConfirmedOutcome::Action(ActionOutcome::Removed(first))
    );
    let ids: Vec<&str> = controller
        .state()
        .items()
        .iter()
        .map(|item| item.item_id.as_str())
        .collect();
    assert_eq!(ids, vec!["2", "3"]);
    assert!(controller.state().items()[0].expanded);
    let messages = controller.session().client().notifications().drain();
    assert_eq!(messages[0].message, "Order deleted");
    assert_eq!(messages[0].level, 25);
    assert_eq!(controller.confirm_pending().await.expect("empty"), ConfirmedOutcome::Nothing);
}

#[tokio::test]
async fn mutated_rows_merge_and_fire_the_method_handler() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;
    let mut refreshed = row(1);
    refreshed["name"] = json!("order 1 (approved)");
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .json_body(action_body(json!({"method": "approve", "pk": "1"})));
            then.status(200).json_body(json!({
                "response_data": {"item": refreshed, "success": "Approved"}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/reports/orders/action/history/1/");
            then.status(200).body("<p>approved</p>");
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let handle = std::sync::Arc::clone(&calls);
    controller.session_mut().on_success("approve", move |_| {
        handle.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    let outcome = controller
        .execute_action(&ItemId::from("1"), "approve", false)
        .await
        .expect("approved");

    assert_eq!(outcome, ActionOutcome::Updated(ItemId::from("1")));
    assert_eq!(
        controller.state().items()[0].fields.get("name"),
        Some(&json!("order 1 (approved)"))
    );
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(
        controller.state().fragment("lazydiv__1__history"),
        Some(&FragmentContent::Loaded("<p>approved</p>".into()))
    );
}

#[tokio::test]
async fn informational_results_become_details() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .json_body(action_body(json!({"method": "approve", "pk": "2"})));
            then.status(200)
                .json_body(json!({"response_data": {"content": "<p>already approved</p>"}}));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    let outcome = controller
        .execute_action(&ItemId::from("2"), "approve", true)
        .await
        .expect("detail");

    let ActionOutcome::Detail { action, content } = outcome else {
        panic!("expected detail");
    };
    assert_eq!(action.method, "approve");
    assert_eq!(content["content"], json!("<p>already approved</p>"));
    assert_eq!(controller.state().items().len(), 2);
}

#[tokio::test]
async fn form_actions_open_and_rejections_return_the_form() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(action_body(json!({
                "method": "note",
                "pk": "1",
                "data": "text="
            })));
            then.status(200).json_body(json!({
                "response_data": {"success": false, "response_form": "<form>text is required</form>"}
            }));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    let id = ItemId::from("1");

    let outcome = controller
        .execute_action(&id, "note", false)
        .await
        .expect("form");
    assert!(matches!(outcome, ActionOutcome::OpenForm(_)));

    let outcome = controller
        .submit_form(&id, "note", "text=")
        .await
        .expect("rejected");
    let ActionOutcome::FormErrors { form, .. } = outcome else {
        panic!("expected form errors");
    };
    assert_eq!(form.as_deref(), Some("<form>text is required</form>"));
    assert_eq!(controller.state().items().len(), 2);
}

#[tokio::test]
async fn link_actions_build_navigation_urls() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    let id = ItemId::from("2");

    let ActionOutcome::Navigate(url) = controller
        .execute_action(&id, "invoice_view", false)
        .await
        .expect("link")
    else {
        panic!("expected navigation");
    };
    let query = QueryParams::parse(url.query().unwrap_or_default());
    assert_eq!(url.path(), "/api/view_view/");
    assert_eq!(query.get("method"), Some("action_view"));
    assert_eq!(query.get("report_method"), Some("invoice_view"));
    assert_eq!(query.get("pk"), Some("2"));
    assert_eq!(controller.action_link_for(&id, "invoice_view").expect("link"), Some(url));
    assert_eq!(controller.action_link_for(&id, "approve").expect("rpc"), None);

    controller.state_mut().set_selected(ItemId::from("1"), true);
    controller.state_mut().set_selected(id, true);
    let BulkOutcome::Navigate(url) = controller
        .execute_multiple_action("export_view", false)
        .await
        .expect("bulk link")
    else {
        panic!("expected navigation");
    };
    let query = QueryParams::parse(url.query().unwrap_or_default());
    assert_eq!(query.get("method"), Some("multiple_action_view"));
    assert_eq!(query.get("items"), Some("1,2"));
    assert_eq!(query.get("global"), Some("false"));
}

#[tokio::test]
async fn bulk_actions_report_partial_success_and_refetch() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2, 3], 3));
        })
        .await;
    let bulk = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(json!({
                "method": "multiple_action",
                "params": {"report_method": "archive", "items": "1,3", "global": false},
                "view_params": {"view_slug": VIEW_PARAMS}
            }));
            then.status(200).json_body(json!({
                "response_data": {
                    "succeeded": {"1": "archived"},
                    "failed": {"3": "locked"}
                }
            }));
        })
        .await;

    let mut controller = controller(&server, &[]);
    controller.fetch_report().await.expect("fetch");
    assert!(matches!(
        controller.execute_multiple_action("archive", false).await,
        Err(ClientError::NothingSelected)
    ));

    controller.state_mut().set_selected(ItemId::from("1"), true);
    controller.state_mut().set_selected(ItemId::from("3"), true);
    let mut events = controller.subscribe();
    let outcome = controller
        .execute_multiple_action("archive", false)
        .await
        .expect("bulk");

    bulk.assert_async().await;
    let BulkOutcome::Completed(result) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(result.succeeded_count(), 1);
    assert_eq!(result.failed_count(), 1);
    assert_eq!(
        events.try_recv().expect("bulk event"),
        ReportEvent::BulkCompleted {
            succeeded: 1,
            failed: 1
        }
    );
    assert!(matches!(events.try_recv(), Ok(ReportEvent::Loaded { .. })));
    assert_eq!(controller.state().selected_count(), 0);
    assert!(controller.state().bulk_result().is_some());
}

#[tokio::test]
async fn fetch_failures_are_recorded_and_propagated() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/");
            then.status(500).body("database unavailable");
        })
        .await;

    let mut controller = controller(&server, &[]);
    let err = controller.fetch_report().await.expect_err("failure");
    assert_eq!(err.status(), Some(500));
    assert!(controller.state().last_error().is_some());
    assert!(controller.state().report().is_none());
    assert!(!controller.session().client().is_loading());
}

#[tokio::test]
async fn location_updates_are_published_when_requested() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/");
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;

    let mut controller = controller(&server, &[("updateLocation", "true")]);
    let mut events = controller.subscribe();
    controller
        .navigate(&QueryParams::parse("status=open"))
        .await
        .expect("fetch");

    let ReportEvent::LocationChanged(params) = events.try_recv().expect("location") else {
        panic!("expected location change");
    };
    assert_eq!(params.get("page"), Some("1"));
    assert_eq!(params.get("status"), Some("open"));
}

#[tokio::test]
async fn auto_complete_is_a_read_only_lookup() {
    let server = MockServer::start_async().await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(json!({
                "method": "auto_complete",
                "params": {"partial": "ac", "field": "customer"},
                "view_params": {"view_slug": VIEW_PARAMS}
            }));
            then.status(200)
                .json_body(json!({"response_data": ["acme", "acorn"]}));
        })
        .await;

    let mut controller = controller(&server, &[]);
    let mut params = serde_json::Map::new();
    params.insert("field".into(), json!("customer"));
    let suggestions = controller.auto_complete("ac", params).await.expect("lookup");

    lookup.assert_async().await;
    assert_eq!(suggestions, json!(["acme", "acorn"]));
    assert!(controller.state().report().is_none());
}

#[tokio::test]
async fn wildcard_handler_skips_fetches_and_lookups() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(fetch_body());
            then.status(200).json_body(report(&[1, 2], 2));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/view_action/").json_body(json!({
                "method": "auto_complete",
                "params": {"partial": "ac"},
                "view_params": {"view_slug": VIEW_PARAMS}
            }));
            then.status(200).json_body(json!({"response_data": ["acme"]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/view_action/")
                .json_body(action_body(json!({"method": "approve", "pk": "1"})));
            then.status(200).json_body(json!({
                "response_data": {"item": {"item_id": 1, "status": "approved"}}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/reports/orders/action/history/1/");
            then.status(200).body("<p>approved</p>");
        })
        .await;

    let mut controller = controller(&server, &[]);
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let handle = std::sync::Arc::clone(&calls);
    controller
        .session_mut()
        .on_success(backoffice_client::view::WILDCARD_HANDLER, move |_| {
            handle.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

    controller.fetch_report().await.expect("fetch");
    controller
        .auto_complete("ac", serde_json::Map::new())
        .await
        .expect("lookup");
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    controller
        .execute_action(&ItemId::from("1"), "approve", false)
        .await
        .expect("approved");
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}
