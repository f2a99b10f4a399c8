//! Integration tests for the datagram engine server: request/reply over a
//! real socket, restart recovery, and the single shutdown write.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use userdb_server::config::EngineConfig;
use userdb_server::engine::RequestEngine;
use userdb_server::error::ServerError;
use userdb_server::server::EngineServer;
use userdb_server::state::AppState;

struct RunningEngine {
    addr: SocketAddr,
    state: AppState,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RunningEngine {
    async fn stop(self) -> AppState {
        self.stop.send(()).unwrap();
        self.task.await.unwrap().unwrap();
        self.state
    }
}

fn engine_config(dir: &Path, capacity: usize) -> EngineConfig {
    EngineConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        capacity,
        primary_path: dir.join("users.dat"),
        backup_path: dir.join("users.dat.bak"),
    }
}

async fn start(config: &EngineConfig) -> RunningEngine {
    let engine = RequestEngine::open(config).expect("failed to open engine");
    let state = AppState::new(engine);
    let server = EngineServer::bind(&config.bind_addr, state.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = stopped.await;
    }));
    RunningEngine {
        addr,
        state,
        stop,
        task,
    }
}

async fn client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn request(socket: &UdpSocket, addr: SocketAddr, line: &str) -> String {
    socket.send_to(line.as_bytes(), addr).await.unwrap();
    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("engine did not reply")
        .unwrap();
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

#[tokio::test]
async fn concrete_scenario_over_datagrams() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start(&engine_config(dir.path(), 100)).await;
    let socket = client().await;
    let addr = engine.addr;

    assert_eq!(
        request(&socket, addr, "create alice 123456789").await,
        "User alice#1 created."
    );
    assert_eq!(
        request(&socket, addr, "login 1 123456789").await,
        "User #1 logged in."
    );
    assert_eq!(
        request(&socket, addr, "login 1 123456789").await,
        "User #1 is already connected."
    );
    assert_eq!(
        request(&socket, addr, "logout 1 999999").await,
        "Invalid credentials for user #1."
    );
    assert_eq!(request(&socket, addr, "list").await, "alice");
    assert_eq!(
        request(&socket, addr, "teleport 1").await,
        "Unknown command: teleport"
    );
    assert_eq!(
        request(&socket, addr, "login one 1").await,
        "Malformed command: <id> must be an unsigned integer, got 'one'"
    );
    // The loop keeps serving after malformed input.
    assert_eq!(request(&socket, addr, "list").await, "alice");

    engine.stop().await;
}

#[tokio::test]
async fn restart_restores_accounts_offline() {
    let dir = tempfile::tempdir().unwrap();
    let config = engine_config(dir.path(), 100);

    let engine = start(&config).await;
    let socket = client().await;
    for (name, pw) in [("alice", 11), ("bob", 22), ("carol", 33)] {
        request(&socket, engine.addr, &format!("create {name} {pw}")).await;
    }
    request(&socket, engine.addr, "login 1 11").await;
    request(&socket, engine.addr, "login 3 33").await;
    assert_eq!(request(&socket, engine.addr, "list").await, "alice,carol");
    engine.stop().await;

    let engine = start(&config).await;
    assert_eq!(request(&socket, engine.addr, "list").await, "");
    assert_eq!(
        request(&socket, engine.addr, "login 2 22").await,
        "User #2 logged in."
    );
    assert_eq!(
        request(&socket, engine.addr, "create dave 44").await,
        "User dave#4 created."
    );
    engine.stop().await;
}

#[tokio::test]
async fn backup_stays_one_generation_behind() {
    let dir = tempfile::tempdir().unwrap();
    let config = engine_config(dir.path(), 100);

    let engine = start(&config).await;
    let socket = client().await;
    request(&socket, engine.addr, "create alice 1").await;
    engine.stop().await;
    let first_generation = std::fs::read(&config.primary_path).unwrap();

    // Second run mirrors the first generation into the backup at startup.
    let engine = start(&config).await;
    assert_eq!(std::fs::read(&config.backup_path).unwrap(), first_generation);
    request(&socket, engine.addr, "create bob 2").await;
    engine.stop().await;

    // Shutdown rewrote the primary but not the backup.
    assert_eq!(std::fs::read(&config.backup_path).unwrap(), first_generation);
    assert!(std::fs::read(&config.primary_path).unwrap().len() > first_generation.len());

    // Losing the primary falls back to the backup.
    std::fs::remove_file(&config.primary_path).unwrap();
    let engine = start(&config).await;
    assert_eq!(
        request(&socket, engine.addr, "login 1 1").await,
        "User #1 logged in."
    );
    assert_eq!(
        request(&socket, engine.addr, "login 2 2").await,
        "User #2 not found."
    );
    engine.stop().await;
}

#[tokio::test]
async fn capacity_boundary_over_datagrams() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start(&engine_config(dir.path(), 4)).await;
    let socket = client().await;

    for n in 1..=3 {
        assert_eq!(
            request(&socket, engine.addr, &format!("create u{n} {n}")).await,
            format!("User u{n}#{n} created.")
        );
    }
    assert_eq!(
        request(&socket, engine.addr, "create u4 4").await,
        "User database is full."
    );
    let count = engine
        .state
        .inspect(|engine| engine.store().len())
        .await
        .unwrap();
    assert_eq!(count, 3);
    engine.stop().await;
}

#[tokio::test]
async fn shutdown_write_happens_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = engine_config(dir.path(), 16);

    let engine = start(&config).await;
    let socket = client().await;
    request(&socket, engine.addr, "create alice 1").await;
    let state = engine.stop().await;
    let saved = std::fs::read(&config.primary_path).unwrap();

    // The serve loop already persisted; another stop is a no-op.
    assert!(!state.shutdown().await.unwrap());
    std::fs::write(&config.primary_path, b"").unwrap();
    assert!(!state.shutdown().await.unwrap());
    assert_eq!(std::fs::read(&config.primary_path).unwrap(), b"");
    assert!(!saved.is_empty());
}

#[tokio::test]
async fn over_long_datagram_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start(&engine_config(dir.path(), 16)).await;
    let socket = client().await;

    request(&socket, engine.addr, "create alice 5").await;
    // Cut at 1023 bytes this would change the hash to 12345.
    let padded = format!("password 1 5 {}123456789", " ".repeat(1005));
    assert_eq!(
        request(&socket, engine.addr, &padded).await,
        "Malformed command: request too long"
    );
    assert_eq!(
        request(&socket, engine.addr, "login 1 5").await,
        "User #1 logged in."
    );
    engine.stop().await;
}
