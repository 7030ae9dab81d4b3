//! Connection runtime
//!
//! Every accepted socket gets three cooperating tasks: an inbound parser,
//! an outbound serializer, and a supervisor that owns the keep-alive
//! ticker and the teardown sequence. A [`DropLatch`] ties them together —
//! whichever side ends the connection fires it once with a cause, and
//! both I/O tasks are guaranteed to exit and be joined before the
//! supervisor reports the connection closed.

use crate::error::Result;
use crate::game::player::Player;
use crate::game::world::level_chunks;
use crate::protocol::packet;
use crate::protocol::packets::{ClientPacket, Disconnect, ServerPacket};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

/// Outbound queue bound; a client that falls this far behind is dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Keep-alive ping period
const PING_PERIOD: Duration = Duration::from_secs(1);

/// How long the outbound task gets to flush a final Disconnect
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Identifier of a single TCP connection.
///
/// Assigned at accept time, before a player slot exists; stable for the
/// connection's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Why a connection ended.
///
/// Exactly one cause terminates every connection; server-initiated drops
/// and codec errors notify the client with a Disconnect packet first,
/// peer closes do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropCause {
    /// The peer closed the socket, or socket I/O failed
    PeerClosed,
    /// The server dropped the connection (kick, auth failure, shutdown)
    ServerDrop(String),
    /// Inbound bytes could not be parsed
    CodecError(String),
}

impl DropCause {
    /// Reason string used for removal announcements
    pub fn reason(&self) -> &str {
        match self {
            DropCause::PeerClosed => "Disconnected",
            DropCause::ServerDrop(reason) | DropCause::CodecError(reason) => reason,
        }
    }

    /// Reason to flush to the client in a Disconnect packet, if any
    pub fn disconnect_notice(&self) -> Option<&str> {
        match self {
            DropCause::PeerClosed => None,
            DropCause::ServerDrop(reason) | DropCause::CodecError(reason) => Some(reason),
        }
    }
}

/// One-shot drop signal shared by a connection's tasks.
///
/// The first [`fire`](DropLatch::fire) wins; later causes are ignored so
/// a connection tears down for exactly one reason.
#[derive(Clone)]
pub struct DropLatch {
    inner: Arc<watch::Sender<Option<DropCause>>>,
}

impl DropLatch {
    /// Create an unfired latch
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Fire the latch; returns whether this call set the cause
    pub fn fire(&self, cause: DropCause) -> bool {
        self.inner.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(cause);
                true
            } else {
                false
            }
        })
    }

    /// The cause, if the latch has fired
    pub fn cause(&self) -> Option<DropCause> {
        self.inner.borrow().clone()
    }

    /// Wait until the latch fires
    pub async fn fired(&self) -> DropCause {
        let mut rx = self.inner.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(cause) => cause.clone().unwrap_or(DropCause::PeerClosed),
            // We hold a sender, so the channel cannot close under us.
            Err(_) => DropCause::PeerClosed,
        }
    }
}

impl Default for DropLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// An entry on a player's outbound queue
#[derive(Debug)]
pub enum OutboundItem {
    /// A packet, serialized and flushed in queue order
    Packet(ServerPacket),
    /// A level compression job; its chunk sequence is emitted in place,
    /// so surrounding packets keep their queue order
    Level(JoinHandle<Result<Vec<u8>>>),
}

/// Message from a connection task to the server's dispatch loop
pub enum SessionEvent {
    /// A connection was accepted and its player created
    Connected(Player),
    /// A packet arrived and parsed
    Packet(ConnId, ClientPacket),
    /// The connection is gone; both I/O tasks have been joined
    Closed(ConnId, DropCause),
}

/// Supervise one client connection until it drops.
///
/// Registers the player with the dispatcher, runs the inbound and
/// outbound tasks, enqueues a keep-alive ping every second, and after the
/// latch fires joins both tasks before reporting `Closed`.
pub async fn run_connection(conn: ConnId, stream: TcpStream, session_tx: mpsc::Sender<SessionEvent>) {
    let ip = stream
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED.into());

    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let latch = DropLatch::new();

    let player = Player::new(conn, ip, out_tx.clone(), latch.clone());
    tracing::debug!("incoming connection {player} as {conn}");
    if session_tx.send(SessionEvent::Connected(player)).await.is_err() {
        return;
    }

    let reader = tokio::spawn(inbound_loop(conn, read_half, session_tx.clone(), latch.clone()));
    let mut writer = tokio::spawn(outbound_loop(conn, write_half, out_rx, latch.clone()));

    let mut ping = interval(PING_PERIOD);
    let cause = loop {
        tokio::select! {
            cause = latch.fired() => break cause,
            _ = ping.tick() => match out_tx.try_send(OutboundItem::Packet(ServerPacket::Ping)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    latch.fire(DropCause::ServerDrop("slow consumer".to_string()));
                }
                Err(TrySendError::Closed(_)) => {
                    // Outbound task died on a socket error.
                    latch.fire(DropCause::PeerClosed);
                }
            },
        }
    };

    // The outbound task flushes the Disconnect notice on its way out;
    // give it a bounded grace period, then cancel whatever is left.
    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
        let _ = writer.await;
    }
    reader.abort();
    let _ = reader.await;

    let _ = session_tx.send(SessionEvent::Closed(conn, cause)).await;
    tracing::debug!("connection task terminated for {conn}");
}

/// Parse packets off the socket and hand them to the dispatcher.
async fn inbound_loop(
    conn: ConnId,
    mut reader: OwnedReadHalf,
    session_tx: mpsc::Sender<SessionEvent>,
    latch: DropLatch,
) {
    loop {
        let id = tokio::select! {
            _ = latch.fired() => return,
            result = reader.read_u8() => match result {
                Ok(id) => id,
                Err(_) => {
                    latch.fire(DropCause::PeerClosed);
                    return;
                }
            },
        };

        let Some(descriptor) = packet::parseable(id) else {
            tracing::warn!("{conn} sent unparseable packet ID 0x{id:02x}");
            latch.fire(DropCause::CodecError("protocol error".to_string()));
            return;
        };

        let mut payload = vec![0u8; descriptor.size()];
        if reader.read_exact(&mut payload).await.is_err() {
            latch.fire(DropCause::PeerClosed);
            return;
        }

        match ClientPacket::decode(id, &payload) {
            Ok(parsed) => {
                if session_tx.send(SessionEvent::Packet(conn, parsed)).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::error!("{conn} sent undecodable {}: {err}", descriptor.name);
                latch.fire(DropCause::CodecError("protocol error".to_string()));
                return;
            }
        }
    }
}

/// Serialize queued packets onto the socket.
async fn outbound_loop(
    conn: ConnId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<OutboundItem>,
    latch: DropLatch,
) {
    loop {
        tokio::select! {
            biased;
            cause = latch.fired() => {
                if let Some(reason) = cause.disconnect_notice() {
                    flush_disconnect(&mut writer, reason).await;
                }
                return;
            }
            item = queue.recv() => match item {
                Some(OutboundItem::Packet(outgoing)) => {
                    if write_packet(&mut writer, &outgoing).await.is_err() {
                        // Socket-level failure: the inbound path owns removal.
                        return;
                    }
                }
                Some(OutboundItem::Level(job)) => {
                    let compressed = match job.await {
                        Ok(Ok(bytes)) => bytes,
                        Ok(Err(err)) => {
                            tracing::error!("level compression for {conn} failed: {err}");
                            continue;
                        }
                        Err(_) => continue,
                    };
                    for chunk in level_chunks(&compressed) {
                        if write_packet(&mut writer, &ServerPacket::LevelDataChunk(chunk))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    tracing::debug!("streamed {} compressed level bytes to {conn}", compressed.len());
                }
                None => return,
            },
        }
    }
}

/// Encode, write, and flush one packet.
async fn write_packet(writer: &mut OwnedWriteHalf, outgoing: &ServerPacket) -> Result<()> {
    let bytes = outgoing.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Best-effort final Disconnect notice; the socket may already be gone.
async fn flush_disconnect(writer: &mut OwnedWriteHalf, reason: &str) {
    let notice = ServerPacket::Disconnect(Disconnect {
        reason: reason.to_string(),
    });
    if let Ok(bytes) = notice.encode() {
        let _ = writer.write_all(&bytes).await;
        let _ = writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latch_first_cause_wins() {
        let latch = DropLatch::new();

        assert!(latch.fire(DropCause::ServerDrop("Banned".to_string())));
        assert!(!latch.fire(DropCause::PeerClosed));

        assert_eq!(
            latch.fired().await,
            DropCause::ServerDrop("Banned".to_string())
        );
        assert_eq!(
            latch.cause(),
            Some(DropCause::ServerDrop("Banned".to_string()))
        );
    }

    #[tokio::test]
    async fn test_latch_wakes_existing_waiter() {
        let latch = DropLatch::new();
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.fired().await })
        };

        tokio::task::yield_now().await;
        latch.fire(DropCause::PeerClosed);

        assert_eq!(waiter.await.unwrap(), DropCause::PeerClosed);
    }

    #[test]
    fn test_drop_cause_notices() {
        assert_eq!(DropCause::PeerClosed.disconnect_notice(), None);
        assert_eq!(
            DropCause::ServerDrop("server full".to_string()).disconnect_notice(),
            Some("server full")
        );
        assert_eq!(
            DropCause::CodecError("protocol error".to_string()).reason(),
            "protocol error"
        );
        assert_eq!(DropCause::PeerClosed.reason(), "Disconnected");
    }
}
