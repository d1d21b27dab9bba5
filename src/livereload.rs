// ABOUTME: Livereload support for the showtell presentation server
// ABOUTME: Tracks viewer connections, fans out reload notices and keeps sockets alive with pings

use actix_ws::{Message, MessageStream, Session};
use log::{debug, warn};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Text frame sent to viewers after every rerender
pub const RELOAD_MESSAGE: &str = "Reload";

/// Shortest ping interval a connection accepts
pub const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivereloadEvent {
    Reload,
}

struct LivereloadConnection {
    id: Uuid,
    sender: mpsc::UnboundedSender<LivereloadEvent>,
}

/// The set of currently open livereload connections.
///
/// Each connection gets its own unbounded queue so notifying never waits on
/// a socket write. Entries whose receiving task has gone away are dropped
/// the next time a notification fails to reach them.
#[derive(Default)]
pub struct LivereloadHub {
    connections: Mutex<Vec<LivereloadConnection>>,
}

impl LivereloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and return its id and the queue it reads events from.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<LivereloadEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.lock().push(LivereloadConnection { id, sender });
        debug!("Registered livereload connection {}", id);
        (id, receiver)
    }

    pub fn unregister(&self, id: Uuid) {
        self.connections.lock().retain(|conn| conn.id != id);
        debug!("Unregistered livereload connection {}", id);
    }

    /// Queue one reload notice for every open connection.
    /// Returns the number of connections that were reached.
    pub fn notify_reload(&self) -> usize {
        let mut connections = self.connections.lock();
        connections.retain(|conn| {
            let delivered = conn.sender.send(LivereloadEvent::Reload).is_ok();
            if !delivered {
                warn!("Livereload connection {} is gone, dropping it", conn.id);
            }
            delivered
        });
        connections.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

/// Drive one livereload socket until the client leaves, a write fails or
/// the server shuts down. Pings every `heartbeat` to keep the socket open.
pub async fn run_connection(
    mut session: Session,
    mut msg_stream: MessageStream,
    mut events: mpsc::UnboundedReceiver<LivereloadEvent>,
    heartbeat: Duration,
    cancel: CancellationToken,
) {
    let heartbeat = heartbeat.max(MIN_HEARTBEAT);
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Server shutting down, closing livereload connection");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = session.ping(b"").await {
                    warn!("Livereload ping failed, closing connection: {:?}", e);
                    break;
                }
            }
            event = events.recv() => match event {
                Some(LivereloadEvent::Reload) => {
                    if let Err(e) = session.text(RELOAD_MESSAGE).await {
                        warn!(
                            "Failed to write reload message to client, closing connection: {:?}",
                            e
                        );
                        break;
                    }
                }
                None => break,
            },
            msg = msg_stream.recv() => match msg {
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("Livereload protocol error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = session.close(None).await;
}
