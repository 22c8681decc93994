//! Listing: pagination, filtering, rejected items, failures

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use flowsync_core::ports::{GatewayError, IWorkflowGateway, ListFilter};

use crate::common::{self, workflow_json, TEST_API_KEY, TEST_HEADER};

#[tokio::test]
async fn test_list_follows_cursor_across_pages() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("cursor"))
        .and(header(TEST_HEADER, TEST_API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [workflow_json("wf-1", "One"), workflow_json("wf-2", "Two")],
            "nextCursor": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [workflow_json("wf-3", "Three")],
            "nextCursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listing = gateway.list(&ListFilter::new()).await.unwrap();
    let names: Vec<_> = listing.workflows.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two", "Three"]);
    assert!(listing.rejected.is_empty());
}

#[tokio::test]
async fn test_list_empty_cursor_ends_pagination() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [workflow_json("wf-1", "One")],
            "nextCursor": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listing = gateway.list(&ListFilter::new()).await.unwrap();
    assert_eq!(listing.workflows.len(), 1);
}

#[tokio::test]
async fn test_list_passes_active_filter() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .and(query_param("active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let listing = gateway
        .list(&ListFilter::new().with_active(true))
        .await
        .unwrap();
    assert!(listing.workflows.is_empty());
}

#[tokio::test]
async fn test_list_reports_invalid_items_as_rejected() {
    let (server, gateway) = common::setup_gateway().await;

    let mut broken = workflow_json("wf-bad", "Broken");
    broken["connections"] = json!({ "Ghost": { "main": [[]] } });

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [workflow_json("wf-1", "Good"), broken, { "id": "wf-x" }],
        })))
        .mount(&server)
        .await;

    let listing = gateway.list(&ListFilter::new()).await.unwrap();
    assert_eq!(listing.workflows.len(), 1);
    assert_eq!(listing.rejected.len(), 2);
    assert_eq!(listing.rejected[0].remote_id.as_deref(), Some("wf-bad"));
    assert!(listing.rejected[0].reason.contains("Ghost"));
    assert_eq!(listing.rejected[1].remote_id.as_deref(), Some("wf-x"));
}

#[tokio::test]
async fn test_list_unauthorized() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = gateway.list(&ListFilter::new()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized(ref m) if m.contains("bad key")));
}

#[tokio::test]
async fn test_list_malformed_page() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = gateway.list(&ListFilter::new()).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_list_stuck_cursor_is_an_error() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "nextCursor": "same"
        })))
        .mount(&server)
        .await;

    let err = gateway.list(&ListFilter::new()).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(ref m) if m.contains("same")));
}
