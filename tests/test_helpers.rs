use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use card_duel_server::config::Config;
use card_duel_server::server::GameServer;
use card_duel_server::store::{default_seed, MemoryStore, StoreSeed};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn a server on an ephemeral port with the default seed.
#[allow(dead_code)]
pub async fn spawn_server() -> (Arc<GameServer>, SocketAddr) {
    spawn_server_with(Config::default(), default_seed()).await
}

/// Spawn a server with custom config and store seed.
#[allow(dead_code)]
pub async fn spawn_server_with(config: Config, seed: StoreSeed) -> (Arc<GameServer>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let server = GameServer::new(config, Arc::new(MemoryStore::new(seed)))
        .await
        .expect("server construction");
    tokio::spawn(Arc::clone(&server).serve(listener));
    (server, addr)
}

/// Line-delimited protocol client for the tests.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[allow(dead_code)]
impl TestClient {
    /// Connect and consume the welcome (1001) and bond dump (5002) frames.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self::connect_raw(addr).await;
        let welcome = client.recv_code(1001).await;
        assert!(welcome["data"]["session_id"].is_string());
        assert!(welcome["data"]["server_time"].is_string());
        client.recv_code(5002).await;
        client
    }

    /// Connect without consuming any frames.
    pub async fn connect_raw(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        stream.set_nodelay(true).expect("nodelay");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    pub async fn send(&mut self, message: &str, data: Value) {
        let frame = json!({"message": message, "data": data});
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await.expect("write frame");
    }

    /// Read the next frame.
    pub async fn recv(&mut self) -> Value {
        let line = timeout(RECV_TIMEOUT, read_line(&mut self.reader))
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed while waiting for a frame");
        serde_json::from_str(&line).expect("frame is valid JSON")
    }

    /// Read frames until one with the given code arrives.
    pub async fn recv_code(&mut self, code: i64) -> Value {
        timeout(RECV_TIMEOUT, async {
            loop {
                let frame = self.recv().await;
                if frame["code"] == code {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for code {code}"))
    }

    /// True once the server closes this connection.
    pub async fn wait_closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, read_line(&mut self.reader)).await,
            Ok(None)
        )
    }

    pub async fn register(&mut self, username: &str, password: &str) {
        self.send(
            "UserRegister",
            json!({"username": username, "password": password}),
        )
        .await;
        self.recv_code(3001).await;
    }

    pub async fn login(&mut self, username: &str, password: &str) {
        self.send(
            "UserLogin",
            json!({"username": username, "password": password}),
        )
        .await;
        self.recv_code(2001).await;
    }

    pub async fn ready(&mut self) {
        self.send("UserReady", Value::Null).await;
        self.recv_code(4001).await;
    }
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut line = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match reader.read(&mut byte).await {
            Ok(0) => return None,
            Ok(_) if byte[0] == b'\n' => {
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            Ok(_) => line.push(byte[0]),
            Err(_) => return None,
        }
    }
}

/// Register, log in, and ready two players; returns their clients together
/// with the 5001 snapshots, current player first.
#[allow(dead_code)]
pub async fn start_duel(
    addr: SocketAddr,
    first: &str,
    second: &str,
) -> ((TestClient, Value), (TestClient, Value)) {
    let mut c1 = TestClient::connect(addr).await;
    let mut c2 = TestClient::connect(addr).await;

    c1.register(first, "pw").await;
    c2.register(second, "pw").await;
    c1.login(first, "pw").await;
    c2.login(second, "pw").await;
    c1.ready().await;
    c2.ready().await;

    let snap1 = c1.recv_code(5001).await["data"].clone();
    let snap2 = c2.recv_code(5001).await["data"].clone();

    if snap1["Round"] == "current" {
        ((c1, snap1), (c2, snap2))
    } else {
        ((c2, snap2), (c1, snap1))
    }
}
