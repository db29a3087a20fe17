//! End-to-end tests for the daemon
//!
//! These tests verify the server works correctly as a whole system,
//! testing the full request/response cycle over real TCP connections.

mod common;

use common::TestDaemon;
use conclave_daemon::{CallError, Function, FunctionRegistry};
use serde_json::{json, Value};

/// Test basic lifecycle: start, connect, call, stop
#[tokio::test]
async fn test_e2e_server_lifecycle() {
    let mut daemon = TestDaemon::start().await.expect("Failed to start daemon");
    assert!(daemon.is_running(), "Daemon should be running");

    let mut client = daemon.connect().await.expect("Failed to connect");
    let reply = client.rpc("add", json!([3, 9]), 1).await.unwrap();
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": 12, "id": 1}));

    daemon.stop().await.expect("Failed to stop daemon");
    assert!(!daemon.is_running(), "Daemon should have stopped");
    client.expect_closed().await;
}

/// Test that multiple sequential requests work correctly
#[tokio::test]
async fn test_e2e_multiple_requests() {
    let daemon = TestDaemon::start().await.expect("Failed to start daemon");
    let mut client = daemon.connect().await.unwrap();

    for i in 1..=5 {
        let reply = client.rpc("mul", json!([i, 2]), i).await.unwrap();
        assert_eq!(reply["result"], i * 2, "Request {} should be doubled", i);
        assert_eq!(reply["id"], i, "Request {} should have matching ID", i);
    }
}

/// Test concurrent clients connecting to the same daemon
#[tokio::test]
async fn test_e2e_concurrent_clients() {
    let daemon = TestDaemon::start().await.expect("Failed to start daemon");

    let mut handles = Vec::new();
    for n in 0..10i64 {
        let addr = daemon.addr;
        handles.push(tokio::spawn(async move {
            let mut client = common::TestClient::connect(addr).await.unwrap();
            let reply = client.rpc("add", json!([n, 100]), n).await.unwrap();
            assert_eq!(reply["result"], n + 100);
            assert_eq!(reply["id"], n);
        }));
    }

    for handle in handles {
        handle.await.expect("Client task panicked");
    }
}

#[tokio::test]
async fn test_e2e_method_not_found() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    let reply = client.rpc("frobnicate", json!([]), 7).await.unwrap();
    assert_eq!(
        reply,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found"},
            "id": 7
        })
    );
}

#[tokio::test]
async fn test_e2e_invalid_params() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    let too_few = client.rpc("add", json!([1]), 1).await.unwrap();
    assert_eq!(too_few["error"]["code"], -32602);

    let wrong_type = client.rpc("sub", json!(["one", 2]), 2).await.unwrap();
    assert_eq!(wrong_type["error"]["code"], -32602);
    assert_eq!(wrong_type["error"]["message"], "Invalid params");
}

#[tokio::test]
async fn test_e2e_divided_by_zero() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    let reply = client.rpc("div", json!([4, 0]), 3).await.unwrap();
    assert_eq!(reply["error"]["code"], -32001);
    assert_eq!(reply["id"], 3);

    let reply = client.rpc("div", json!([9, 2]), 4).await.unwrap();
    assert_eq!(reply["result"], 4.5);
}

#[tokio::test]
async fn test_e2e_malformed_json_keeps_session_alive() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    client.send_raw("{\"jsonrpc\": \"2.0\", \"method\": ").await.unwrap();
    let reply = client.recv().await.unwrap().unwrap();
    assert_eq!(reply["error"]["code"], -32700);
    assert_eq!(reply["error"]["message"], "Parse error");
    assert_eq!(reply["id"], Value::Null);

    client.send_raw("[1, 2, 3]").await.unwrap();
    let reply = client.recv().await.unwrap().unwrap();
    assert_eq!(reply["error"]["code"], -32700);

    let reply = client.rpc("hello", json!([]), 9).await.unwrap();
    assert_eq!(reply["result"], "Hello World!");
}

#[tokio::test]
async fn test_e2e_invalid_request() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    client
        .send(&json!({"jsonrpc": "1.0", "method": "add", "params": [1, 2], "id": 4}))
        .await
        .unwrap();
    let reply = client.recv().await.unwrap().unwrap();
    assert_eq!(reply["error"]["code"], -32600);
    assert_eq!(reply["id"], 4);

    // answered even though there is no id
    client
        .send(&json!({"jsonrpc": "2.0", "params": [1, 2]}))
        .await
        .unwrap();
    let reply = client.recv().await.unwrap().unwrap();
    assert_eq!(reply["error"]["code"], -32600);
    assert_eq!(reply["id"], Value::Null);
}

#[tokio::test]
async fn test_e2e_string_ids_and_case_insensitive_methods() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    client
        .send(&json!({"jsonrpc": "2.0", "method": "GREET", "params": ["Ada"], "id": "req-1"}))
        .await
        .unwrap();
    let reply = client.recv().await.unwrap().unwrap();
    assert_eq!(reply["result"], "Hello, Ada!");
    assert_eq!(reply["id"], "req-1");
}

#[tokio::test]
async fn test_e2e_notifications_never_call_functions() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    client.command("add", json!([1, 2])).await.unwrap();
    let reply = client.rpc("hello", json!([]), 1).await.unwrap();
    // the first frame back is the reply to the request
    assert_eq!(reply["id"], 1);
}

#[tokio::test]
async fn test_e2e_custom_registry_and_unknown_error() {
    let mut functions = FunctionRegistry::new();
    functions.register(
        "fails",
        Function::new(&[], |_| Err(CallError::Failed("backend offline".into()))),
    );
    functions.register(
        "count",
        Function::variadic(&[], "items", |args| Ok(json!(args.len()))),
    );
    let daemon = TestDaemon::start_with(functions, true).await.unwrap();
    let mut client = daemon.connect().await.unwrap();

    let reply = client.rpc("fails", json!([]), 1).await.unwrap();
    assert_eq!(reply["error"]["code"], -32000);
    assert_eq!(reply["error"]["message"], "Unknown error");

    let reply = client.rpc("count", json!([1, "a", null]), 2).await.unwrap();
    assert_eq!(reply["result"], 3);
}

#[tokio::test]
async fn test_e2e_exit_disconnects_only_sender() {
    let daemon = TestDaemon::start().await.unwrap();
    let mut leaving = daemon.connect().await.unwrap();
    let mut staying = daemon.connect().await.unwrap();
    daemon.wait_for_sessions(2).await;

    leaving.command("exit", json!([])).await.unwrap();
    assert_eq!(
        leaving.recv().await.unwrap().unwrap(),
        json!({"message": "Disconnecting client..."})
    );
    leaving.expect_closed().await;
    daemon.wait_for_sessions(1).await;

    let reply = staying.rpc("hello", json!([]), 1).await.unwrap();
    assert_eq!(reply["result"], "Hello World!");
}
