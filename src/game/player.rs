//! Player management
//!
//! This module holds per-connection player state and the slot table that
//! maps the protocol's signed-byte ID space onto live connections.

use crate::error::{Result, ServerError};
use crate::network::{ConnId, DropCause, DropLatch, OutboundItem};
use crate::protocol::packets::{ChatMessage, UpdateUserType};
use crate::protocol::{MAX_PLAYER_SLOTS, Position, SELF_ID, ServerPacket, USER_TYPE_NORMAL, USER_TYPE_OP};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A connected player.
///
/// Created at accept time with no identity; the first identification
/// packet fills in `name` and `mp_pass`, and a slot ID arrives once the
/// handshake succeeds.
pub struct Player {
    conn: ConnId,
    /// Username, once identified
    pub name: Option<String>,
    /// Verification digest reported by the client
    pub mp_pass: Option<String>,
    /// Assigned slot in 0..127, once added to the server
    pub player_id: Option<i8>,
    /// Last reported position
    pub position: Position,
    /// Whether the player holds operator status
    pub is_op: bool,
    ip: IpAddr,
    outbound: mpsc::Sender<OutboundItem>,
    latch: DropLatch,
}

impl Player {
    /// Create a player for a fresh connection
    pub fn new(conn: ConnId, ip: IpAddr, outbound: mpsc::Sender<OutboundItem>, latch: DropLatch) -> Self {
        Self {
            conn,
            name: None,
            mp_pass: None,
            player_id: None,
            position: Position::default(),
            is_op: false,
            ip,
            outbound,
            latch,
        }
    }

    /// The owning connection's ID
    pub fn conn(&self) -> ConnId {
        self.conn
    }

    /// The peer's IP address
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The connection's drop latch
    pub fn latch(&self) -> &DropLatch {
        &self.latch
    }

    /// Username, or a placeholder before identification
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<connecting>")
    }

    /// Enqueue an item for the outbound task.
    ///
    /// Returns false when the bounded queue is full, in which case the
    /// connection has already been marked for drop as a slow consumer.
    pub fn send_item(&self, item: OutboundItem) -> bool {
        match self.outbound.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.latch
                    .fire(DropCause::ServerDrop("slow consumer".to_string()));
                false
            }
            // Outbound task already gone; the connection is tearing down.
            Err(TrySendError::Closed(_)) => true,
        }
    }

    /// Enqueue a packet for transmission
    pub fn send_packet(&self, packet: ServerPacket) -> bool {
        self.send_item(OutboundItem::Packet(packet))
    }

    /// Send a chat line to this player as the server
    pub fn send_message(&self, message: &str) {
        self.send_packet(ServerPacket::Chat(ChatMessage {
            player_id: SELF_ID,
            message: message.to_string(),
        }));
    }

    /// Change operator status and notify the client
    pub fn set_op(&mut self, is_op: bool) {
        self.is_op = is_op;
        self.send_packet(ServerPacket::UserType(UpdateUserType {
            mode: if is_op { USER_TYPE_OP } else { USER_TYPE_NORMAL },
        }));
    }

    /// Mark the connection for drop with the given cause
    pub fn disconnect(&self, cause: DropCause) {
        self.latch.fire(cause);
    }

    /// Check the name-verification digest: `md5(salt ++ name)` in hex
    /// must equal the reported `mp_pass`.
    pub fn authenticated(&self, salt: &str) -> bool {
        let (Some(name), Some(mp_pass)) = (&self.name, &self.mp_pass) else {
            return false;
        };
        let digest = md5::compute(format!("{salt}{name}").as_bytes());
        format!("{digest:x}") == *mp_pass
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}@{}",
            if self.is_op { "#" } else { "" },
            self.display_name(),
            self.ip
        )
    }
}

/// Fixed-capacity table of connected players.
///
/// Connections are tracked from accept; a slot in 0..127 is assigned on
/// handshake, always the lowest free one, and freed on removal for reuse.
pub struct PlayerTable {
    players: HashMap<ConnId, Player>,
    slots: Vec<Option<ConnId>>,
}

impl PlayerTable {
    /// Create a table bounded to `capacity` slots (at most the
    /// protocol's 128)
    pub fn new(capacity: usize) -> Self {
        Self {
            players: HashMap::new(),
            slots: vec![None; capacity.clamp(1, MAX_PLAYER_SLOTS)],
        }
    }

    /// Track a freshly accepted connection
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.conn(), player);
    }

    /// Look up a player by connection
    pub fn get(&self, conn: ConnId) -> Option<&Player> {
        self.players.get(&conn)
    }

    /// Look up a player mutably by connection
    pub fn get_mut(&mut self, conn: ConnId) -> Option<&mut Player> {
        self.players.get_mut(&conn)
    }

    /// Assign the lowest free slot to a connection.
    ///
    /// Fails with [`ServerError::ServerFull`] when every slot is taken.
    pub fn assign_slot(&mut self, conn: ConnId) -> Result<i8> {
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ServerError::ServerFull)?;

        self.slots[free] = Some(conn);
        if let Some(player) = self.players.get_mut(&conn) {
            player.player_id = Some(free as i8);
        }
        Ok(free as i8)
    }

    /// Remove a connection, freeing its slot if one was assigned
    pub fn remove(&mut self, conn: ConnId) -> Option<Player> {
        let player = self.players.remove(&conn)?;
        if let Some(id) = player.player_id {
            if let Some(slot) = self.slots.get_mut(id as usize) {
                *slot = None;
            }
        }
        Some(player)
    }

    /// Players that completed the handshake, in slot order
    pub fn active(&self) -> impl Iterator<Item = &Player> {
        self.slots
            .iter()
            .flatten()
            .filter_map(|conn| self.players.get(conn))
    }

    /// Find an active player by exact name
    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        self.active().find(|player| player.name.as_deref() == Some(name))
    }

    /// Every tracked connection, handshaken or not
    pub fn conns(&self) -> Vec<ConnId> {
        self.players.keys().copied().collect()
    }

    /// Number of players holding a slot
    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_player(conn: ConnId) -> (Player, mpsc::Receiver<OutboundItem>) {
        let (tx, rx) = mpsc::channel(8);
        let player = Player::new(conn, Ipv4Addr::LOCALHOST.into(), tx, DropLatch::new());
        (player, rx)
    }

    fn table_with(count: u64, capacity: usize) -> PlayerTable {
        let mut table = PlayerTable::new(capacity);
        for raw in 0..count {
            let (player, _rx) = test_player(ConnId(raw));
            table.insert(player);
            table.assign_slot(ConnId(raw)).unwrap();
        }
        table
    }

    #[test]
    fn test_slots_allocate_lowest_first() {
        let mut table = PlayerTable::new(128);
        for raw in 0..4 {
            let (player, _rx) = test_player(ConnId(raw));
            table.insert(player);
            assert_eq!(table.assign_slot(ConnId(raw)).unwrap(), raw as i8);
        }
    }

    #[test]
    fn test_slot_reuse_after_removal() {
        let mut table = table_with(4, 128);

        table.remove(ConnId(1)).unwrap();
        table.remove(ConnId(2)).unwrap();

        let (player, _rx) = test_player(ConnId(10));
        table.insert(player);
        assert_eq!(table.assign_slot(ConnId(10)).unwrap(), 1);

        let (player, _rx) = test_player(ConnId(11));
        table.insert(player);
        assert_eq!(table.assign_slot(ConnId(11)).unwrap(), 2);

        let (player, _rx) = test_player(ConnId(12));
        table.insert(player);
        assert_eq!(table.assign_slot(ConnId(12)).unwrap(), 4);
    }

    #[test]
    fn test_no_two_active_players_share_a_slot() {
        let table = table_with(50, 128);

        let mut seen = std::collections::HashSet::new();
        for player in table.active() {
            assert!(seen.insert(player.player_id.unwrap()));
        }
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn test_full_table_rejects_allocation() {
        let mut table = table_with(8, 8);

        let (player, _rx) = test_player(ConnId(99));
        table.insert(player);
        assert!(matches!(
            table.assign_slot(ConnId(99)),
            Err(ServerError::ServerFull)
        ));
    }

    #[test]
    fn test_capacity_clamped_to_protocol_limit() {
        let table = PlayerTable::new(100_000);
        assert_eq!(table.slots.len(), MAX_PLAYER_SLOTS);
    }

    #[test]
    fn test_find_by_name_sees_only_active_players() {
        let mut table = PlayerTable::new(8);
        let (mut player, _rx) = test_player(ConnId(0));
        player.name = Some("alice".to_string());
        table.insert(player);

        // Pending players have no slot and are invisible to lookups.
        assert!(table.find_by_name("alice").is_none());

        table.assign_slot(ConnId(0)).unwrap();
        assert!(table.find_by_name("alice").is_some());
    }

    #[test]
    fn test_authentication_digest() {
        let (mut player, _rx) = test_player(ConnId(0));
        player.name = Some("alice".to_string());
        // md5("abcalice")
        player.mp_pass = Some(format!("{:x}", md5::compute(b"abcalice")));

        assert!(player.authenticated("abc"));
        assert!(!player.authenticated("xyz"));
    }

    #[test]
    fn test_queue_overflow_marks_slow_consumer() {
        let (tx, _rx) = mpsc::channel(1);
        let latch = DropLatch::new();
        let player = Player::new(ConnId(0), Ipv4Addr::LOCALHOST.into(), tx, latch.clone());

        assert!(player.send_packet(ServerPacket::Ping));
        assert!(!player.send_packet(ServerPacket::Ping));
        assert_eq!(
            latch.cause(),
            Some(DropCause::ServerDrop("slow consumer".to_string()))
        );
    }
}
