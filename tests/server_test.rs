mod common;

use std::sync::Arc;

use common::*;
use serde_json::{json, Value};
use sonar_mcp::client::HttpResponse;
use sonar_mcp::errors::SonarError;
use sonar_mcp::mcp::McpServer;

/// Feeds `input` through the protocol loop and returns each output line
/// parsed as JSON.
async fn run_lines(server: &McpServer, input: &str) -> Vec<Value> {
    let mut out: Vec<u8> = Vec::new();
    server.serve(input.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn server_with(transport: &Arc<FakeTransport>) -> McpServer {
    McpServer::new(client_with(transport))
}

/// Parses the JSON text carried in a tool result envelope.
fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(
        &server,
        "{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n{\"id\":\"abc\",\"method\":\"ping\"}\n",
    )
    .await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["id"], 7);
    assert_eq!(out[0]["jsonrpc"], "2.0");
    assert_eq!(out[0]["result"], "pong");
    assert_eq!(out[1]["id"], "abc");
}

#[tokio::test]
async fn test_notifications_produce_no_output() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(
        &server,
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n{\"method\":\"tools/list\"}\n",
    )
    .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_null_and_zero_ids_are_requests() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(
        &server,
        "{\"id\":null,\"method\":\"ping\"}\n{\"id\":0,\"method\":\"ping\"}\n",
    )
    .await;

    assert_eq!(out.len(), 2);
    assert!(out[0]["id"].is_null());
    assert_eq!(out[0]["result"], "pong");
    assert_eq!(out[1]["id"], 0);
}

#[tokio::test]
async fn test_parse_error_does_not_stop_the_loop() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(&server, "{not json\n\n{\"id\":2,\"method\":\"ping\"}\n").await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert_eq!(out[0]["error"]["message"], "Parse error");
    assert!(out[0]["id"].is_null());
    assert_eq!(out[1]["id"], 2);
    assert_eq!(out[1]["result"], "pong");
}

#[tokio::test]
async fn test_non_object_json_is_invalid_request() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(&server, "[1,2,3]\n").await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["error"]["code"], -32600);
    assert!(out[0]["id"].is_null());
}

#[tokio::test]
async fn test_initialize_reports_server_info() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(&server, "{\"id\":1,\"method\":\"initialize\",\"params\":{}}\n").await;

    let result = &out[0]["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert!(result["capabilities"]["tools"].is_object());
    assert_eq!(result["serverInfo"]["name"], "sonarqube-mcp");
    assert_eq!(result["serverInfo"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_tools_list_returns_catalogue() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(&server, "{\"id\":1,\"method\":\"tools/list\"}\n").await;

    let tools = out[0]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 8);
    assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
}

#[tokio::test]
async fn test_unknown_method_is_method_not_found() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(&server, "{\"id\":1,\"method\":\"resources/list\"}\n").await;

    assert_eq!(out[0]["error"]["code"], -32601);
    assert_eq!(out[0]["error"]["data"], "Unknown method: resources/list");
}

#[tokio::test]
async fn test_missing_component_key_skips_client() {
    let transport = FakeTransport::json(json!({}));
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"get_coverage_metrics\",\"arguments\":{}}}\n",
    )
    .await;

    assert_eq!(out[0]["error"]["code"], -32602);
    assert_eq!(out[0]["error"]["data"], "component_key is required");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_unknown_tool_is_method_not_found() {
    let transport = FakeTransport::json(json!({}));
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"nonexistent_tool\"}}\n",
    )
    .await;

    assert_eq!(out[0]["error"]["code"], -32601);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_tools_call_without_name_is_invalid_params() {
    let server = server_with(&FakeTransport::json(json!({})));
    let out = run_lines(&server, "{\"id\":1,\"method\":\"tools/call\",\"params\":{}}\n").await;
    assert_eq!(out[0]["error"]["code"], -32602);
}

#[tokio::test]
async fn test_coverage_tool_wraps_result_as_text() {
    let transport = FakeTransport::json(measures_body("k1", &[("coverage", "87.5")]));
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":3,\"method\":\"tools/call\",\"params\":{\"name\":\"get_coverage_metrics\",\"arguments\":{\"component_key\":\"k1\"}}}\n",
    )
    .await;

    assert_eq!(out[0]["id"], 3);
    assert_eq!(out[0]["result"]["content"][0]["type"], "text");
    let payload = tool_payload(&out[0]);
    assert_eq!(payload["overall_coverage"], "87.5");
    assert!(payload["new_code_coverage"].is_null());
    assert!(payload["duplication_rate"].is_null());
    assert!(payload["uncovered_lines"].is_null());
    assert_eq!(payload["component_key"], "k1");
}

#[tokio::test]
async fn test_upstream_404_becomes_internal_error_with_detail() {
    let transport = FakeTransport::status(404, "");
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":4,\"method\":\"tools/call\",\"params\":{\"name\":\"get_coverage_metrics\",\"arguments\":{\"component_key\":\"gone\"}}}\n",
    )
    .await;

    assert_eq!(out[0]["id"], 4);
    assert_eq!(out[0]["error"]["code"], -32603);
    assert_eq!(out[0]["error"]["message"], "Internal error");
    let data = out[0]["error"]["data"].as_str().unwrap();
    assert!(data.contains("404"));
    assert!(data.contains("gone"));
}

#[tokio::test]
async fn test_issue_tool_passes_filters() {
    let transport = FakeTransport::json(json!({"issues": [], "total": 0}));
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":5,\"method\":\"tools/call\",\"params\":{\"name\":\"get_project_issues\",\"arguments\":{\"component_key\":\"k1\",\"types\":[\"BUG\"],\"severities\":[],\"statuses\":[\"OPEN\"]}}}\n",
    )
    .await;

    assert_eq!(tool_payload(&out[0]), json!({"issues": [], "total": 0}));
    let request = &transport.requests()[0];
    assert_eq!(request.param("types"), Some("BUG"));
    assert_eq!(request.param("severities"), None);
    assert_eq!(request.param("statuses"), Some("OPEN"));
}

#[tokio::test]
async fn test_invalid_issue_type_is_invalid_params() {
    let transport = FakeTransport::json(json!({}));
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":6,\"method\":\"tools/call\",\"params\":{\"name\":\"get_project_issues\",\"arguments\":{\"component_key\":\"k1\",\"types\":[\"TYPO\"]}}}\n",
    )
    .await;

    assert_eq!(out[0]["error"]["code"], -32602);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_health_check_healthy() {
    let transport = FakeTransport::json(json!({
        "paging": {"pageIndex": 1, "pageSize": 1, "total": 3},
        "components": []
    }));
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":8,\"method\":\"tools/call\",\"params\":{\"name\":\"health_check\"}}\n",
    )
    .await;

    assert!(out[0].get("error").is_none());
    let payload = tool_payload(&out[0]);
    assert_eq!(payload["status"], "healthy");
    assert_eq!(payload["url"], "http://sonar.test");

    let request = &transport.requests()[0];
    assert_eq!(request.param("p"), Some("1"));
    assert_eq!(request.param("ps"), Some("1"));
}

#[tokio::test]
async fn test_health_check_unhealthy_is_still_a_result() {
    let transport = FakeTransport::new(|_| {
        Err(SonarError::Connection {
            message: "connection refused".to_string(),
        })
    });
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":9,\"method\":\"tools/call\",\"params\":{\"name\":\"health_check\",\"arguments\":{}}}\n",
    )
    .await;

    assert!(out[0].get("error").is_none());
    let payload = tool_payload(&out[0]);
    assert_eq!(payload["status"], "unhealthy");
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_panicking_transport_becomes_internal_error() {
    let transport = FakeTransport::new(|_| -> sonar_mcp::errors::Result<HttpResponse> {
        panic!("transport exploded")
    });
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":10,\"method\":\"tools/call\",\"params\":{\"name\":\"get_uncovered_lines\",\"arguments\":{\"component_key\":\"k1\"}}}\n{\"id\":11,\"method\":\"ping\"}\n",
    )
    .await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["id"], 10);
    assert_eq!(out[0]["error"]["code"], -32603);
    assert_eq!(out[1]["result"], "pong");
}

#[tokio::test]
async fn test_one_response_line_per_request() {
    let server = server_with(&FakeTransport::json(json!({})));
    let input = (0..5)
        .map(|i| format!("{{\"id\":{},\"method\":\"ping\"}}\n{{\"method\":\"ping\"}}\n", i))
        .collect::<String>();
    let out = run_lines(&server, &input).await;

    let ids: Vec<i64> = out.iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_handle_line_ignores_blank_input() {
    let server = server_with(&FakeTransport::json(json!({})));
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn test_invalid_utf8_line_is_parse_error() {
    let server = server_with(&FakeTransport::json(json!({})));
    let mut out: Vec<u8> = Vec::new();
    server
        .serve(&b"\xff\xfe\n{\"id\":1,\"method\":\"ping\"}\n"[..], &mut out)
        .await
        .unwrap();

    let out: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert!(out[0]["id"].is_null());
    assert_eq!(out[1]["id"], 1);
    assert_eq!(out[1]["result"], "pong");
}

#[tokio::test]
async fn test_run_with_closes_client_when_input_ends() {
    let transport = FakeTransport::json(json!({}));
    let server = server_with(&transport);
    let mut out: Vec<u8> = Vec::new();
    server.run_with(&b""[..], &mut out).await.unwrap();

    assert_eq!(transport.close_count(), 1);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_run_with_answers_then_closes_once() {
    let transport = FakeTransport::json(json!({}));
    let server = server_with(&transport);
    let mut out: Vec<u8> = Vec::new();
    server
        .run_with(&b"{\"id\":1,\"method\":\"ping\"}\n"[..], &mut out)
        .await
        .unwrap();

    let line: Value = serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
    assert_eq!(line["result"], "pong");
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn test_issue_tool_passes_records_through_unchanged() {
    let body = json!({
        "total": 2,
        "issues": [
            {
                "key": "AX1",
                "type": "BUG",
                "severity": "MAJOR",
                "message": "Null dereference",
                "component": "k1:src/a.rs",
                "status": "OPEN",
                "line": 12
            },
            {"key": "AX2", "type": "NOT_A_TYPE"}
        ]
    });
    let transport = FakeTransport::json(body.clone());
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":12,\"method\":\"tools/call\",\"params\":{\"name\":\"get_project_issues\",\"arguments\":{\"component_key\":\"k1\"}}}\n",
    )
    .await;

    assert!(out[0].get("error").is_none());
    assert_eq!(tool_payload(&out[0]), body);
}

#[tokio::test]
async fn test_project_listing_passes_through_unchanged() {
    let body = json!({
        "paging": {"pageIndex": 1, "pageSize": 100, "total": 1},
        "components": [
            {"key": "k1", "name": "One", "qualifier": "TRK", "visibility": "public"}
        ]
    });
    let transport = FakeTransport::json(body.clone());
    let server = server_with(&transport);
    let out = run_lines(
        &server,
        "{\"id\":13,\"method\":\"tools/call\",\"params\":{\"name\":\"get_all_projects\"}}\n",
    )
    .await;

    assert_eq!(tool_payload(&out[0]), body);
}
