//! Core server implementation
//!
//! [`ClassicServer`] owns all mutable state — config, salt, world, player
//! table, events, commands — and a single dispatch loop drives it: session
//! events from the per-connection tasks are turned into event-bus fires,
//! so the table and the world are only ever touched from one task.

use crate::command::CommandRegistry;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::events::{Event, ServerEvents};
use crate::game::player::{Player, PlayerTable};
use crate::game::world::{VoxelWorld, compress_level};
use crate::network::connection::SessionEvent;
use crate::network::{ConnId, DropCause, OutboundItem, listener};
use crate::protocol::packets::{ChatMessage, DespawnPlayer, LevelFinalize};
use crate::protocol::{SELF_ID, ServerPacket};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

/// Depth of the dispatcher's session event channel
const SESSION_CHANNEL_CAPACITY: usize = 256;

/// The Classic protocol server.
///
/// Created once by the bootstrap and consumed by [`run`](Self::run);
/// plugins receive it mutably on every handler invocation.
pub struct ClassicServer {
    /// Server configuration
    pub config: ServerConfig,
    /// The voxel world streamed to joining players
    pub world: VoxelWorld,
    /// Connected players and the slot table
    pub players: PlayerTable,
    /// Events plugins subscribe to
    pub events: ServerEvents,
    /// Chat command table
    pub commands: CommandRegistry,
    salt: String,
}

impl ClassicServer {
    /// Create a server over a loaded world
    pub fn new(config: ServerConfig, world: VoxelWorld) -> Self {
        let players = PlayerTable::new(config.max_players);
        Self {
            config,
            world,
            players,
            events: ServerEvents::default(),
            commands: CommandRegistry::new(),
            salt: generate_salt(),
        }
    }

    /// The per-start shared secret used for name verification
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Bind the listener and serve until a shutdown signal arrives
    pub async fn run(mut self) -> Result<()> {
        Event::fire(&mut self, |server| &mut server.events.starting, &());

        let listener = TcpListener::bind(self.config.bind_address()).await?;
        tracing::info!("listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// The dispatch loop: accept-side session events in, state mutation
    /// and fan-out here, until shutdown completes.
    async fn serve(mut self, listener: TcpListener) -> Result<()> {
        let (session_tx, mut session_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept = tokio::spawn(listener::accept_loop(
            listener,
            session_tx,
            shutdown_rx.clone(),
        ));

        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            let _ = signal_tx.send(true);
        });

        let mut shutdown_rx = shutdown_rx;
        let mut stopping = false;
        loop {
            tokio::select! {
                changed = shutdown_rx.changed(), if !stopping => {
                    if changed.is_ok() && *shutdown_rx.borrow() {
                        stopping = true;
                        self.stop();
                    }
                }
                event = session_rx.recv() => match event {
                    Some(SessionEvent::Connected(player)) => {
                        self.players.insert(player);
                    }
                    Some(SessionEvent::Packet(conn, incoming)) => {
                        Event::fire(
                            &mut self,
                            |server| &mut server.events.incoming_packet,
                            &(conn, incoming),
                        );
                    }
                    Some(SessionEvent::Closed(conn, cause)) => {
                        self.remove_player(conn, cause);
                    }
                    // All connection tasks have drained.
                    None => break,
                }
            }
        }

        let _ = accept.await;
        tracing::info!("server stopped");
        Ok(())
    }

    /// Begin shutdown: notify plugins, then drop every connection. The
    /// listener observes the same signal and stops accepting.
    fn stop(&mut self) {
        tracing::info!("stopping server");
        Event::fire(self, |server| &mut server.events.shutdown, &());
        for conn in self.players.conns() {
            self.remove_player(conn, DropCause::ServerDrop("Server shutting down".to_string()));
        }
    }

    /// Give a handshaken connection a player slot and announce it to
    /// plugins.
    ///
    /// Fails with "server full" when every slot is taken.
    pub fn add_player(&mut self, conn: ConnId) -> Result<i8> {
        let player_id = self.players.assign_slot(conn)?;
        if let Some(player) = self.players.get(conn) {
            tracing::info!("added player {player} as id {player_id}");
        }
        Event::fire(self, |server| &mut server.events.player_added, &conn);
        Ok(player_id)
    }

    /// Remove a player and tear its connection down.
    ///
    /// Fires `player_removing`, releases the slot, despawns the player
    /// for everyone else, and announces the departure. Safe to call more
    /// than once; only the first call has any effect.
    pub fn remove_player(&mut self, conn: ConnId, cause: DropCause) {
        let Some(player) = self.players.get(conn) else {
            return;
        };
        player.disconnect(cause.clone());

        let reason = cause.reason().to_string();
        if player.player_id.is_some() {
            Event::fire(
                self,
                |server| &mut server.events.player_removing,
                &(conn, reason.clone()),
            );
        }

        let Some(player) = self.players.remove(conn) else {
            return;
        };
        tracing::info!("removed player {player} ({reason})");

        if let Some(player_id) = player.player_id {
            self.broadcast(ServerPacket::Despawn(DespawnPlayer { player_id }));
            self.announce(&format!("{} left ({reason})", player.display_name()));
        }
    }

    /// Enqueue a packet to every active player
    pub fn broadcast(&mut self, outgoing: ServerPacket) {
        let stalled: Vec<ConnId> = self
            .players
            .active()
            .filter(|player| !player.send_packet(outgoing.clone()))
            .map(Player::conn)
            .collect();
        self.evict_stalled(stalled);
    }

    /// Enqueue a packet to every active player, tagged with the sender's
    /// player ID
    pub fn relay_to_all(&mut self, sender: ConnId, mut outgoing: ServerPacket) {
        self.tag_sender(sender, &mut outgoing);
        self.broadcast(outgoing);
    }

    /// Enqueue a packet to every active player except the sender, tagged
    /// with the sender's player ID
    pub fn relay_to_others(&mut self, sender: ConnId, mut outgoing: ServerPacket) {
        self.tag_sender(sender, &mut outgoing);
        let stalled: Vec<ConnId> = self
            .players
            .active()
            .filter(|player| player.conn() != sender)
            .filter(|player| !player.send_packet(outgoing.clone()))
            .map(Player::conn)
            .collect();
        self.evict_stalled(stalled);
    }

    /// Broadcast a server chat line to everyone
    pub fn announce(&mut self, message: &str) {
        self.broadcast(ServerPacket::Chat(ChatMessage {
            player_id: SELF_ID,
            message: message.to_string(),
        }));
    }

    /// Queue the level transfer for one player: initialize, the gzip
    /// job (compressed on the blocking pool, chunked by the outbound
    /// task), then finalize.
    pub fn send_level(&mut self, conn: ConnId) {
        let payload = self.world.level_payload();
        let job = tokio::task::spawn_blocking(move || compress_level(&payload));

        let Some(player) = self.players.get(conn) else {
            return;
        };
        player.send_packet(ServerPacket::LevelInitialize);
        player.send_item(OutboundItem::Level(job));
        player.send_packet(ServerPacket::LevelFinalize(LevelFinalize {
            map_size: self.world.size(),
        }));
        tracing::debug!("queued level transfer for {player}");
    }

    /// Dispatch a chat command.
    ///
    /// Unknown names and missing permissions answer the invoker without
    /// running anything.
    pub fn run_command(&mut self, conn: ConnId, name: &str, args: &[String]) {
        let Some(command) = self.commands.get(name) else {
            if let Some(player) = self.players.get(conn) {
                player.send_message(&format!("&cUnknown command '{name}'"));
            }
            return;
        };

        if command.op_only && !self.players.get(conn).is_some_and(|player| player.is_op) {
            if let Some(player) = self.players.get(conn) {
                player.send_message("&cThat command requires operator status.");
            }
            return;
        }

        (command.handler)(self, conn, args);
    }

    fn tag_sender(&self, sender: ConnId, outgoing: &mut ServerPacket) {
        if let Some(player_id) = self.players.get(sender).and_then(|player| player.player_id) {
            outgoing.set_player_id(player_id);
        }
    }

    fn evict_stalled(&mut self, stalled: Vec<ConnId>) {
        for conn in stalled {
            self.remove_player(conn, DropCause::ServerDrop("slow consumer".to_string()));
        }
    }
}

/// 32 random alphanumeric characters, generated once per server start
fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Resolve when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // Signal registration failed; never resolve on this path.
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    () = ctrl_c => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => ctrl_c.await,
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
