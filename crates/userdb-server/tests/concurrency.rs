//! End-to-end tests through the stream front end: several clients at once,
//! each relayed to one engine that serializes their requests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::oneshot;

use userdb_server::config::FrontendConfig;
use userdb_server::frontend::Frontend;
use userdb_server::protocol::SERVICE_UNAVAILABLE;
use userdb_server::server::EngineServer;
use userdb_server::state::AppState;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Client {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) -> String {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("front end did not reply")
            .unwrap()
            .expect("connection closed")
    }
}

/// Starts an in-memory engine and a front end relaying to it. The returned
/// senders stop both when dropped.
async fn start_stack(
    capacity: usize,
    relay_timeout_ms: u64,
) -> (SocketAddr, AppState, oneshot::Sender<()>, oneshot::Sender<()>) {
    let state = AppState::in_memory(capacity).unwrap();
    let engine = EngineServer::bind("127.0.0.1:0", state.clone())
        .await
        .unwrap();
    let engine_addr = engine.local_addr().unwrap();
    let (stop_engine, engine_stopped) = oneshot::channel::<()>();
    tokio::spawn(engine.serve(async move {
        let _ = engine_stopped.await;
    }));

    let frontend = Frontend::bind(&FrontendConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        engine_addr: engine_addr.to_string(),
        relay_timeout_ms,
    })
    .await
    .unwrap();
    let frontend_addr = frontend.local_addr().unwrap();
    let (stop_frontend, frontend_stopped) = oneshot::channel::<()>();
    tokio::spawn(frontend.serve(async move {
        let _ = frontend_stopped.await;
    }));

    (frontend_addr, state, stop_engine, stop_frontend)
}

#[tokio::test]
async fn single_client_session() {
    let (addr, _state, _engine, _frontend) = start_stack(100, 5_000).await;
    let mut client = Client::connect(addr).await;

    // Empty list still arrives as an (empty) line.
    assert_eq!(client.send("list").await, "");
    assert_eq!(client.send("create alice 42").await, "User alice#1 created.");
    assert_eq!(client.send("LOGIN 1 42").await, "User #1 logged in.");
    assert_eq!(client.send("list").await, "alice");
    assert_eq!(
        client.send("password 1 42 7").await,
        "Password changed for user #1."
    );
    assert_eq!(client.send("logout 1 42").await, "Invalid credentials for user #1.");
    assert_eq!(client.send("logout 1 7").await, "User #1 logged out.");
    assert_eq!(client.send("delete 1 7").await, "User #1 deleted.");
    assert_eq!(client.send("login 1 7").await, "User #1 not found.");
}

#[tokio::test]
async fn over_long_lines_are_rejected_and_the_session_continues() {
    let (addr, _state, _engine, _frontend) = start_stack(16, 5_000).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.send("create alice 5").await, "User alice#1 created.");
    let padded = format!("password 1 5 {}123456789", " ".repeat(1005));
    assert_eq!(
        client.send(&padded).await,
        "Malformed command: request too long"
    );
    // Far past the limit, with no newline until the very end.
    assert_eq!(
        client.send(&"x".repeat(50_000)).await,
        "Malformed command: request too long"
    );
    assert_eq!(client.send("login 1 5").await, "User #1 logged in.");
    assert_eq!(client.send("list").await, "alice");
}

#[tokio::test]
async fn concurrent_clients_get_distinct_identifiers() {
    let (addr, state, _engine, _frontend) = start_stack(64, 5_000).await;

    let mut tasks = Vec::new();
    for n in 0..16u64 {
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            let reply = client.send(&format!("create user{n} {n}")).await;
            let id: u64 = reply
                .trim_start_matches(&format!("User user{n}#"))
                .trim_end_matches(" created.")
                .parse()
                .unwrap();
            assert_eq!(
                client.send(&format!("login {id} {n}")).await,
                format!("User #{id} logged in.")
            );
            id
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=16).collect::<Vec<u64>>());

    let online = state
        .inspect(|engine| engine.store().online().count())
        .await
        .unwrap();
    assert_eq!(online, 16);
}

#[tokio::test]
async fn unresponsive_engine_yields_service_unavailable() {
    // Bound but never read, so every relayed request times out.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let frontend = Frontend::bind(&FrontendConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        engine_addr: silent.local_addr().unwrap().to_string(),
        relay_timeout_ms: 100,
    })
    .await
    .unwrap();
    let addr = frontend.local_addr().unwrap();
    let (_stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(frontend.serve(async move {
        let _ = stopped.await;
    }));

    let mut client = Client::connect(addr).await;
    assert_eq!(client.send("list").await, SERVICE_UNAVAILABLE);
    // The connection survives the failure.
    assert_eq!(client.send("create bob 1").await, SERVICE_UNAVAILABLE);
}
