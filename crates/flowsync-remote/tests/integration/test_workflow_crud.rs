//! Single-workflow operations: get, create, update, error mapping

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use flowsync_core::domain::{RemoteId, Workflow};
use flowsync_core::ports::{GatewayError, IWorkflowGateway};
use flowsync_remote::GatewayOptions;

use crate::common::{self, workflow_json, TEST_API_KEY, TEST_HEADER};

fn rid(s: &str) -> RemoteId {
    RemoteId::new(s).unwrap()
}

#[tokio::test]
async fn test_get_workflow() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows/wf-1"))
        .and(header(TEST_HEADER, TEST_API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json("wf-1", "One")))
        .mount(&server)
        .await;

    let wf = gateway.get(&rid("wf-1")).await.unwrap();
    assert_eq!(wf.id, Some(rid("wf-1")));
    assert_eq!(wf.name, "One");
    assert_eq!(wf.nodes.len(), 1);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let err = gateway.get(&rid("gone")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_get_server_error_keeps_status() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/workflows/wf-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = gateway.get(&rid("wf-1")).await.unwrap_err();
    match err {
        GatewayError::Status { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_get_invalid_document_is_validation_error() {
    let (server, gateway) = common::setup_gateway().await;

    let mut doc = workflow_json("wf-1", "One");
    doc["name"] = json!("");

    Mock::given(method("GET"))
        .and(path("/workflows/wf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc))
        .mount(&server)
        .await;

    let err = gateway.get(&rid("wf-1")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let (server, gateway) = common::setup_gateway_with(GatewayOptions {
        timeout: Duration::from_millis(100),
        page_size: 10,
        api_key_header: "X-API-KEY".to_string(),
    })
    .await;

    Mock::given(method("GET"))
        .and(path("/workflows/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(workflow_json("slow", "Slow"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = gateway.get(&rid("slow")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
}

#[tokio::test]
async fn test_create_sends_input_without_server_fields() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("POST"))
        .and(path("/workflows"))
        .and(body_partial_json(json!({ "name": "Fresh", "settings": { "executionOrder": "v1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json("wf-new", "Fresh")))
        .expect(1)
        .mount(&server)
        .await;

    let local = Workflow::from_value(workflow_json("ignored", "Fresh")).unwrap();
    let input = local.to_input();
    let created = gateway.create(&input).await.unwrap();
    assert_eq!(created.id, Some(rid("wf-new")));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("id").is_none());
    assert!(body.get("active").is_none());
    assert!(body.get("updatedAt").is_none());
}

#[tokio::test]
async fn test_create_without_id_in_response_is_invalid() {
    let (server, gateway) = common::setup_gateway().await;

    let mut echo = workflow_json("x", "Fresh");
    echo.as_object_mut().unwrap().remove("id");

    Mock::given(method("POST"))
        .and(path("/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(echo))
        .mount(&server)
        .await;

    let local = Workflow::from_value(workflow_json("x", "Fresh")).unwrap();
    let err = gateway.create(&local.to_input()).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_update_returns_server_representation() {
    let (server, gateway) = common::setup_gateway().await;

    let mut echo = workflow_json("wf-1", "Renamed");
    echo["settings"]["timezone"] = json!("UTC");

    Mock::given(method("PUT"))
        .and(path("/workflows/wf-1"))
        .and(body_partial_json(json!({ "name": "Renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(echo))
        .expect(1)
        .mount(&server)
        .await;

    let local = Workflow::from_value(workflow_json("wf-1", "Renamed")).unwrap();
    let updated = gateway.update(&rid("wf-1"), &local.to_input()).await.unwrap();
    assert_eq!(updated.settings.timezone.as_deref(), Some("UTC"));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("PUT"))
        .and(path("/workflows/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let local = Workflow::from_value(workflow_json("gone", "Gone")).unwrap();
    let err = gateway.update(&rid("gone"), &local.to_input()).await.unwrap_err();
    assert!(err.is_not_found());
}
