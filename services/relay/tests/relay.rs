use chatrelay_server::{
    router::{create_router, serve},
    state::AppState,
};
use futures_util::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpStream, task::JoinHandle, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestRelay {
    addr: SocketAddr,
    state: Arc<AppState>,
    server: JoinHandle<anyhow::Result<()>>,
}

async fn start_relay() -> TestRelay {
    let state = Arc::new(AppState::new(CancellationToken::new()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    let server = tokio::spawn(serve(listener, app, state.clone()));
    TestRelay {
        addr,
        state,
        server,
    }
}

async fn connect(relay: &TestRelay) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", relay.addr))
        .await
        .expect("client should connect");
    client
}

async fn wait_for_connections(relay: &TestRelay, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while relay.state.registry.len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached the expected size");
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return text.to_string();
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let result = timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "expected no message, got {:?}", result);
}

#[tokio::test]
async fn test_message_reaches_everyone_but_sender() {
    let relay = start_relay().await;
    let mut a = connect(&relay).await;
    let mut b = connect(&relay).await;
    let mut c = connect(&relay).await;
    wait_for_connections(&relay, 3).await;

    a.send(Message::Text("hi".into())).await.unwrap();

    assert_eq!(next_text(&mut b).await, "hi");
    assert_eq!(next_text(&mut c).await, "hi");
    assert_silent(&mut a).await;
    assert_silent(&mut b).await;
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn test_order_is_preserved_per_sender() {
    let relay = start_relay().await;
    let mut a = connect(&relay).await;
    let mut b = connect(&relay).await;
    wait_for_connections(&relay, 2).await;

    for msg in ["one", "two", "three"] {
        a.send(Message::Text(msg.into())).await.unwrap();
    }

    assert_eq!(next_text(&mut b).await, "one");
    assert_eq!(next_text(&mut b).await, "two");
    assert_eq!(next_text(&mut b).await, "three");
}

#[tokio::test]
async fn test_disconnect_unregisters_connection() {
    let relay = start_relay().await;
    let mut a = connect(&relay).await;
    let mut b = connect(&relay).await;
    let c = connect(&relay).await;
    wait_for_connections(&relay, 3).await;

    drop(c);
    wait_for_connections(&relay, 2).await;

    a.send(Message::Text("still here".into())).await.unwrap();
    assert_eq!(next_text(&mut b).await, "still here");

    b.close(None).await.unwrap();
    wait_for_connections(&relay, 1).await;
}

#[tokio::test]
async fn test_status_endpoint_reports_connections() {
    let relay = start_relay().await;
    let _a = connect(&relay).await;
    let _b = connect(&relay).await;
    wait_for_connections(&relay, 2).await;

    let mut stream = TcpStream::connect(relay.addr).await.unwrap();
    let request = format!(
        "GET /status HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        relay.addr
    );
    tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes())
        .await
        .unwrap();
    let mut response = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response)
        .await
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"connections\":2"));
}

#[tokio::test]
async fn test_shutdown_closes_all_connections() {
    let relay = start_relay().await;
    let mut a = connect(&relay).await;
    let mut b = connect(&relay).await;
    wait_for_connections(&relay, 2).await;

    relay.state.shutdown.cancel();
    wait_for_connections(&relay, 0).await;

    for client in [&mut a, &mut b] {
        let ended = timeout(Duration::from_secs(5), async {
            loop {
                match client.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(ended.is_ok(), "client was not disconnected");
    }

    timeout(Duration::from_secs(5), relay.server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
