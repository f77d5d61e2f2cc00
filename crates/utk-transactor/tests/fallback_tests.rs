// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client/server transactions over the shared-memory fallback path.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utk_error::ErrCode;
use utk_proto::ApiCallInfo;
use utk_transactor::{TransactionClient, TransactionServer};
use utk_transport::{ShmTransceiver, WATCH_DOG_TIMEOUT_MS};

fn token_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{}_{name}", utk_transactor::generate_token()))
}

async fn start_pair(name: &str) -> (tokio::task::JoinHandle<u32>, TransactionClient) {
    let token = token_path(name);
    let mut client = TransactionClient::new(Box::new(ShmTransceiver::new(&token, false)));
    let mut server = TransactionServer::new(
        Box::new(ShmTransceiver::new(&token, true)),
        Arc::new(|call, reply| {
            if call.api_id == "slow" {
                std::thread::sleep(Duration::from_millis(100));
            }
            let input = call.param_list.first().and_then(Value::as_str).unwrap_or("");
            reply.result_value = json!(format!("{input}_ok"));
        }),
    );
    let server_task = tokio::spawn(async move {
        server.initialize().await.unwrap();
        let code = server.run_loop().await;
        server.finalize().await;
        code
    });
    client.initialize(Duration::from_millis(5000)).await.unwrap();
    (server_task, client)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invoke_api_round_trips() {
    let (server_task, mut client) = start_pair("rt").await;

    let start = Instant::now();
    let reply = client
        .invoke_api(ApiCallInfo::new("echo").with_params(vec![json!("yz")]))
        .await;
    assert_eq!(reply.exception.code, ErrCode::NoError);
    assert_eq!(reply.result_value, json!("yz_ok"));
    assert!(start.elapsed() < Duration::from_millis(50), "local call too slow");

    client.finalize().await;
    // The exit emitted by the client ends the server loop successfully.
    assert_eq!(server_task.await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invocations_are_rejected() {
    let (server_task, client) = start_pair("cc").await;
    let client = Arc::new(client);

    let first = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.invoke_api(ApiCallInfo::new("slow")).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = client.invoke_api(ApiCallInfo::new("echo")).await;
    assert_eq!(second.exception.code, ErrCode::ApiUsage);
    assert!(second
        .exception
        .message
        .contains("does not allow calling concurrently"));
    assert!(second.exception.message.contains("slow"));
    assert!(second.exception.message.contains("echo"));

    assert_eq!(first.await.unwrap().exception.code, ErrCode::NoError);

    let mut client = Arc::into_inner(client).unwrap();
    client.finalize().await;
    assert_eq!(server_task.await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn silent_server_is_declared_dead() {
    let (server_task, client) = start_pair("death").await;
    // Kill the server without an exit message, as a crash would.
    server_task.abort();
    let _ = server_task.await;

    let start = Instant::now();
    let reply = client.invoke_api(ApiCallInfo::new("echo")).await;
    let elapsed = start.elapsed().as_millis() as u64;
    assert_eq!(reply.exception.code, ErrCode::Internal);
    assert!(reply
        .exception
        .message
        .contains("connection with uitest_daemon is dead"));
    assert!(elapsed <= WATCH_DOG_TIMEOUT_MS + 1000, "death detection too slow");
    assert!(client.connection_died());

    // Subsequent calls short-circuit immediately.
    let start = Instant::now();
    let reply = client.invoke_api(ApiCallInfo::new("echo")).await;
    assert_eq!(reply.exception.code, ErrCode::Internal);
    assert!(start.elapsed() < Duration::from_millis(50));
}
