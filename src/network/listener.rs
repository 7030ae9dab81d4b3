//! Server listener
//!
//! Accepts new connections and spawns a supervisor task per client. On
//! shutdown it stops accepting and drains every supervisor before
//! releasing the socket.

use crate::network::connection::{self, ConnId, SessionEvent};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Accept connections until shutdown, then drain the per-connection
/// supervisors.
pub async fn accept_loop(
    listener: TcpListener,
    session_tx: mpsc::Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut supervisors = JoinSet::new();
    let mut next_conn = 0u64;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let conn = ConnId(next_conn);
                    next_conn += 1;
                    tracing::debug!("new connection from {addr}");
                    supervisors.spawn(connection::run_connection(conn, stream, session_tx.clone()));
                }
                Err(err) => {
                    tracing::error!("failed to accept connection: {err}");
                    // Continue listening despite errors
                }
            },
            // Reap finished supervisors as we go.
            Some(_) = supervisors.join_next(), if !supervisors.is_empty() => {}
        }
    }

    tracing::debug!("draining {} connection task(s)", supervisors.len());
    while supervisors.join_next().await.is_some() {}
    // The listening socket closes when it drops here.
}
