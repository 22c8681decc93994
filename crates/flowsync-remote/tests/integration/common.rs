//! Shared helpers for gateway integration tests

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use flowsync_remote::{GatewayOptions, HttpGateway};

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_HEADER: &str = "X-API-KEY";

/// Starts a mock server and returns a gateway pointing at it
pub async fn setup_gateway() -> (MockServer, HttpGateway) {
    setup_gateway_with(GatewayOptions {
        timeout: Duration::from_secs(5),
        page_size: 2,
        api_key_header: TEST_HEADER.to_string(),
    })
    .await
}

pub async fn setup_gateway_with(options: GatewayOptions) -> (MockServer, HttpGateway) {
    let server = MockServer::start().await;
    let gateway = HttpGateway::new(server.uri(), options)
        .expect("build gateway")
        .with_api_key(TEST_API_KEY);
    (server, gateway)
}

/// A valid workflow document as the service returns it
pub fn workflow_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "active": false,
        "createdAt": "2026-01-10T08:00:00.000Z",
        "updatedAt": "2026-01-12T09:30:00.000Z",
        "nodes": [
            {
                "id": format!("{id}-n1"),
                "name": "Start",
                "type": "base.manualTrigger",
                "typeVersion": 1,
                "position": [0, 0],
                "parameters": {}
            }
        ],
        "connections": {},
        "settings": { "executionOrder": "v1" }
    })
}
