//! Base protocol plugin
//!
//! Implements Classic Protocol v7 play behavior on top of the server
//! core: the join handshake, block edits, movement relay, chat, and
//! command dispatch.

use crate::command::parse_command;
use crate::network::{ConnId, DropCause};
use crate::protocol::packets::{
    ChatMessage, ClientSetBlock, PlayerIdentification, PositionUpdate, ServerIdentification,
    ServerSetBlock, SpawnPlayer,
};
use crate::protocol::{
    CPE_MAGIC, ClientPacket, PROTOCOL_VERSION, SELF_ID, ServerPacket, USER_TYPE_NORMAL,
    USER_TYPE_OP,
};
use crate::server::ClassicServer;

/// Subscribe the protocol handlers
pub fn register(server: &mut ClassicServer) {
    server
        .events
        .incoming_packet
        .connect(|server, (conn, incoming)| match incoming {
            ClientPacket::Identify(ident) => handle_identify(server, *conn, ident),
            ClientPacket::SetBlock(edit) => handle_set_block(server, *conn, edit),
            ClientPacket::Move(movement) => handle_move(server, *conn, movement),
            ClientPacket::Chat(chat) => handle_chat(server, *conn, chat),
        });

    server
        .events
        .player_added
        .connect(|server, conn| spawn_joined_player(server, *conn));

    tracing::debug!("initialized plugin ClassicProtocol");
}

/// The join handshake: verify the name, identify the server, stream the
/// level, replay existing players, then take a slot.
fn handle_identify(server: &mut ClassicServer, conn: ConnId, ident: &PlayerIdentification) {
    if ident.version != PROTOCOL_VERSION {
        tracing::warn!(
            "{conn} speaks protocol version {}, expected {PROTOCOL_VERSION}",
            ident.version
        );
    }
    if ident.cpe_byte == CPE_MAGIC {
        tracing::debug!("{conn} supports CPE; no extensions are negotiated");
    }

    let spawn = server.world.spawn();
    {
        let Some(player) = server.players.get_mut(conn) else {
            return;
        };
        if player.player_id.is_some() {
            // Repeated identification on a live connection; ignore it.
            return;
        }
        player.name = Some(ident.username.clone());
        player.mp_pass = Some(ident.mp_pass.clone());
        player.position = spawn;
    }

    if server.config.verify_names {
        let authenticated = server
            .players
            .get(conn)
            .is_some_and(|player| player.authenticated(server.salt()));
        if !authenticated {
            server.remove_player(
                conn,
                DropCause::ServerDrop("Could not authenticate user.".to_string()),
            );
            return;
        }
    }

    let user_type = if server.players.get(conn).is_some_and(|player| player.is_op) {
        USER_TYPE_OP
    } else {
        USER_TYPE_NORMAL
    };
    let identification = ServerPacket::Identification(ServerIdentification {
        version: PROTOCOL_VERSION,
        name: server.config.name.clone(),
        motd: server.config.motd.clone(),
        user_type,
    });
    if let Some(player) = server.players.get(conn) {
        player.send_packet(identification);
    }

    server.send_level(conn);
    relay_existing_players(server, conn);

    if server.add_player(conn).is_err() {
        server.remove_player(conn, DropCause::ServerDrop("server full".to_string()));
    }
}

/// Send the joiner a spawn packet for every player already present
fn relay_existing_players(server: &ClassicServer, conn: ConnId) {
    let Some(to) = server.players.get(conn) else {
        return;
    };
    for player in server.players.active() {
        if player.conn() == conn {
            continue;
        }
        let Some(player_id) = player.player_id else {
            continue;
        };
        to.send_packet(ServerPacket::Spawn(SpawnPlayer {
            player_id,
            name: player.display_name().to_string(),
            position: player.position,
        }));
    }
}

/// Announce a freshly added player: spawn them for everyone else, send
/// the self-spawn at the world spawn point, and say hello.
fn spawn_joined_player(server: &mut ClassicServer, conn: ConnId) {
    let Some(player) = server.players.get(conn) else {
        return;
    };
    let Some(player_id) = player.player_id else {
        return;
    };
    let name = player.display_name().to_string();
    let position = player.position;
    let spawn = server.world.spawn();

    server.relay_to_others(
        conn,
        ServerPacket::Spawn(SpawnPlayer {
            player_id,
            name: name.clone(),
            position,
        }),
    );

    if let Some(player) = server.players.get(conn) {
        player.send_packet(ServerPacket::Spawn(SpawnPlayer {
            player_id: SELF_ID,
            name: name.clone(),
            position: spawn,
        }));
    }

    server.announce(&format!("{name} joined"));
}

/// Apply a block edit and broadcast the result to everyone
fn handle_set_block(server: &mut ClassicServer, conn: ConnId, edit: &ClientSetBlock) {
    let block = if edit.mode == 1 { edit.block } else { 0x00 };
    server.world.set_block(&edit.position, block);
    server.relay_to_all(
        conn,
        ServerPacket::SetBlock(ServerSetBlock {
            position: edit.position,
            block,
        }),
    );
}

/// Track a player's motion and relay it to everyone else
fn handle_move(server: &mut ClassicServer, conn: ConnId, movement: &PositionUpdate) {
    if let Some(player) = server.players.get_mut(conn) {
        player.position = movement.position;
    }
    server.relay_to_others(conn, ServerPacket::Move(movement.clone()));
}

/// Relay chat, or dispatch a command for lines starting with `/`
fn handle_chat(server: &mut ClassicServer, conn: ConnId, chat: &ChatMessage) {
    if let Some((name, args)) = parse_command(&chat.message) {
        server.run_command(conn, &name, &args);
        return;
    }

    let Some(player) = server.players.get(conn) else {
        return;
    };
    if player.player_id.is_none() {
        // Chat before the handshake completes is dropped.
        return;
    }

    let formatted = format!("{}: {}", player.display_name(), chat.message);
    tracing::info!("{formatted}");
    server.relay_to_all(
        conn,
        ServerPacket::Chat(ChatMessage {
            player_id: SELF_ID,
            message: formatted,
        }),
    );
}
