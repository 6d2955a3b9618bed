use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::events::Event;
use crate::protocol::{codes, read_frame, Response, SessionId};
use crate::registry::{Session, SessionGate};
use crate::server::GameServer;

impl GameServer {
    /// Accept loop: one task per connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "TCP listener ready");
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_connection(stream, peer).await;
                    });
                }
                Err(err) => {
                    warn!(error = %err, "Accept failed");
                }
            }
        }
    }

    pub(crate) async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();

        let (tx, rx) = mpsc::channel(self.config.server.send_queue_depth);
        let gate = SessionGate::new();
        let session = Session::new(peer, tx, Arc::clone(&gate));
        let session_id = session.id;
        self.registry.add(session);
        self.registry
            .set_metadata(session_id, "connection_type", json!("tcp"));
        spawn_writer(write_half, rx, Arc::clone(&gate), session_id);
        info!(%session_id, %peer, "Client connected");

        self.send_welcome(session_id).await;

        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::with_capacity(1024);
        let max_len = self.config.server.max_line_length;
        let reason = loop {
            tokio::select! {
                () = gate.closed() => break "server_closed",
                frame = read_frame(&mut reader, max_len, &mut buf) => match frame {
                    Ok(true) => {
                        self.registry.touch(session_id);
                        match std::str::from_utf8(&buf) {
                            Ok(text) => self.dispatch_frame(session_id, text).await,
                            Err(_) => {
                                debug!(%session_id, "Frame is not valid UTF-8");
                                self.respond_error(session_id, codes::UNKNOWN_COMMAND).await;
                            }
                        }
                    }
                    Ok(false) => break "connection_closed",
                    Err(err) => {
                        debug!(%session_id, error = %err, "Read failed");
                        break "read_error";
                    }
                },
            }
        };
        debug!(%session_id, reason, "Connection loop ended");

        let username = self
            .registry
            .get(session_id)
            .and_then(|s| s.username.clone());
        self.bus.publish(Event::ClientDisconnect {
            session_id,
            username,
            reason: reason.to_owned(),
        });
    }

    /// Push the welcome frame (server time + session id) and the bond
    /// catalog dump so clients can render bond tooltips immediately.
    async fn send_welcome(&self, session_id: SessionId) {
        self.respond(
            session_id,
            codes::WELCOME,
            json!({
                "server_time": Utc::now().to_rfc3339(),
                "session_id": session_id,
            }),
        )
        .await;

        let bonds = serde_json::to_value(self.catalogs.bonds.all()).unwrap_or(Value::Null);
        self.respond(session_id, codes::BOND_CATALOG, bonds).await;
    }
}

/// Single writer per session: serializes frames and appends the newline
/// terminator. A failed write closes the gate, which ends the read loop and
/// routes the session through the disconnect path.
fn spawn_writer(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Arc<Response>>,
    gate: Arc<SessionGate>,
    session_id: SessionId,
) {
    tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let mut frame = match serde_json::to_vec(response.as_ref()) {
                Ok(frame) => frame,
                Err(err) => {
                    error!(%session_id, error = %err, "Response serialization failed");
                    continue;
                }
            };
            frame.push(b'\n');
            if let Err(err) = write_half.write_all(&frame).await {
                debug!(%session_id, error = %err, "Write failed; closing connection");
                gate.close();
                break;
            }
        }
    });
}
