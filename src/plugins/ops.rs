//! Operator and ban management plugin
//!
//! Keeps the operator and ban lists, seeds them from configuration, and
//! exposes the `op`, `deop`, `ban`, and `unban` commands. When no
//! operators are configured at all, loopback connections are granted
//! operator status so a fresh server remains administrable.

use crate::command::Command;
use crate::game::player::Player;
use crate::network::DropCause;
use crate::plugins::reply;
use crate::server::ClassicServer;
use std::sync::{Arc, Mutex};

struct OpsState {
    operators: Vec<String>,
    bans: Vec<String>,
    loopback_op: bool,
}

/// Subscribe the join checks and register the moderation commands
pub fn register(server: &mut ClassicServer) {
    let state = Arc::new(Mutex::new(OpsState {
        operators: server.config.operators.clone(),
        bans: server.config.bans.clone(),
        loopback_op: server.config.operators.is_empty(),
    }));

    if server.config.operators.is_empty() {
        tracing::warn!(
            "no operators configured; players connecting from loopback are granted operator status"
        );
    }

    let grant_state = state.clone();
    server.events.player_added.connect(move |server, conn| {
        let Ok(state) = grant_state.lock() else {
            return;
        };
        let Some(player) = server.players.get_mut(*conn) else {
            return;
        };
        let eligible = if state.loopback_op {
            player.ip().is_loopback()
        } else {
            player
                .name
                .as_deref()
                .is_some_and(|name| state.operators.iter().any(|op| op == name))
        };
        drop(state);

        if eligible {
            player.set_op(true);
            player.send_message("Granted operator status");
            tracing::info!("granted {player} operator status");
        }
    });

    let ban_state = state.clone();
    server.events.player_added.connect(move |server, conn| {
        let banned = {
            let Ok(state) = ban_state.lock() else {
                return;
            };
            server
                .players
                .get(*conn)
                .and_then(|player| player.name.as_deref())
                .is_some_and(|name| state.bans.iter().any(|ban| ban == name))
        };
        if banned {
            if let Some(player) = server.players.get(*conn) {
                tracing::info!("player {player} is on the ban list");
            }
            server.remove_player(*conn, DropCause::ServerDrop("Banned".to_string()));
        }
    });

    register_op_command(server, state.clone());
    register_deop_command(server, state.clone());
    register_ban_command(server, state.clone());
    register_unban_command(server, state);

    tracing::debug!("initialized plugin Ops");
}

fn register_op_command(server: &mut ClassicServer, state: Arc<Mutex<OpsState>>) {
    server.commands.register(Command {
        name: "op",
        aliases: &[],
        op_only: true,
        help: "op [player]\nGrants a player operator powers. Requires operator.",
        handler: Arc::new(move |server, conn, args| {
            let [target_name] = args else {
                reply(server, conn, "&cExpected 1 argument");
                return;
            };
            let Some(target_conn) = server.players.find_by_name(target_name).map(Player::conn)
            else {
                reply(server, conn, "&cCan't find that player.");
                return;
            };
            let invoker = invoker_name(server, conn);

            if let Some(target) = server.players.get_mut(target_conn) {
                target.set_op(true);
                target.send_message(&format!("Granted operator status by {invoker}"));
            }
            if let Ok(mut state) = state.lock() {
                if !state.operators.contains(target_name) {
                    state.operators.push(target_name.clone());
                }
            }
            reply(server, conn, &format!("Made {target_name} an operator!"));
            tracing::info!("{invoker} gave op to {target_name}");
        }),
    });
}

fn register_deop_command(server: &mut ClassicServer, state: Arc<Mutex<OpsState>>) {
    server.commands.register(Command {
        name: "deop",
        aliases: &[],
        op_only: true,
        help: "deop [player]\nRemoves operator powers from a player. Requires operator.",
        handler: Arc::new(move |server, conn, args| {
            let [target_name] = args else {
                reply(server, conn, "&cExpected 1 argument");
                return;
            };
            let Some(target_conn) = server.players.find_by_name(target_name).map(Player::conn)
            else {
                reply(server, conn, "&cCan't find that player.");
                return;
            };
            let invoker = invoker_name(server, conn);

            if let Some(target) = server.players.get_mut(target_conn) {
                target.set_op(false);
                target.send_message(&format!("You were deoped by {invoker}"));
            }
            if let Ok(mut state) = state.lock() {
                state.operators.retain(|name| name != target_name);
            }
            reply(server, conn, &format!("Deoped {target_name}"));
            tracing::info!("{invoker} deoped {target_name}");
        }),
    });
}

fn register_ban_command(server: &mut ClassicServer, state: Arc<Mutex<OpsState>>) {
    server.commands.register(Command {
        name: "ban",
        aliases: &[],
        op_only: true,
        help: "ban [player]\nBanishes someone. Requires operator.",
        handler: Arc::new(move |server, conn, args| {
            let [target_name] = args else {
                reply(server, conn, "&cExpected 1 argument");
                return;
            };
            let Some(target_conn) = server.players.find_by_name(target_name).map(Player::conn)
            else {
                reply(server, conn, "&cCan't find that player.");
                return;
            };
            let invoker = invoker_name(server, conn);

            if let Ok(mut state) = state.lock() {
                if !state.bans.contains(target_name) {
                    state.bans.push(target_name.clone());
                }
            }
            reply(server, conn, &format!("Banished {target_name}"));
            tracing::info!("{invoker} banished {target_name}");
            server.remove_player(target_conn, DropCause::ServerDrop("Banned".to_string()));
        }),
    });
}

fn register_unban_command(server: &mut ClassicServer, state: Arc<Mutex<OpsState>>) {
    server.commands.register(Command {
        name: "unban",
        aliases: &[],
        op_only: true,
        help: "unban [player]\nRemoves any banishment from a player. Requires operator.",
        handler: Arc::new(move |server, conn, args| {
            let [target_name] = args else {
                reply(server, conn, "&cExpected 1 argument");
                return;
            };
            let was_banned = match state.lock() {
                Ok(mut state) => {
                    let before = state.bans.len();
                    state.bans.retain(|name| name != target_name);
                    state.bans.len() != before
                }
                Err(_) => false,
            };

            if was_banned {
                let invoker = invoker_name(server, conn);
                reply(server, conn, &format!("Unbanned {target_name}"));
                tracing::info!("{invoker} unbanned {target_name}");
            } else {
                reply(server, conn, "&cNo bans on that player.");
            }
        }),
    });
}

fn invoker_name(server: &ClassicServer, conn: crate::network::ConnId) -> String {
    server
        .players
        .get(conn)
        .map(|player| player.display_name().to_string())
        .unwrap_or_else(|| "server".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::game::world::loader;
    use crate::network::{ConnId, DropLatch, OutboundItem};
    use crate::protocol::{SELF_ID, ServerPacket, USER_TYPE_OP};
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::sync::mpsc;

    fn test_server(operators: Vec<String>, bans: Vec<String>) -> ClassicServer {
        let mut config = ServerConfig::default();
        config.verify_names = false;
        config.level_size = [16, 8, 16];
        config.operators = operators;
        config.bans = bans;
        let world = loader::flat_level((16, 8, 16)).unwrap();
        let mut server = ClassicServer::new(config, world);
        register(&mut server);
        server
    }

    fn join_from(
        server: &mut ClassicServer,
        raw: u64,
        name: &str,
        ip: IpAddr,
    ) -> mpsc::Receiver<OutboundItem> {
        let (tx, rx) = mpsc::channel(64);
        let mut player = crate::game::player::Player::new(ConnId(raw), ip, tx, DropLatch::new());
        player.name = Some(name.to_string());
        server.players.insert(player);
        let _ = server.add_player(ConnId(raw));
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundItem>) -> Vec<ServerPacket> {
        let mut packets = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let OutboundItem::Packet(packet) = item {
                packets.push(packet);
            }
        }
        packets
    }

    #[test]
    fn test_loopback_grant_when_no_operators_configured() {
        let mut server = test_server(Vec::new(), Vec::new());
        let mut rx = join_from(&mut server, 0, "alice", Ipv4Addr::LOCALHOST.into());

        assert!(server.players.get(ConnId(0)).unwrap().is_op);
        let packets = drain(&mut rx);
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::UserType(update) if update.mode == USER_TYPE_OP
        )));
    }

    #[test]
    fn test_remote_player_not_granted_loopback_op() {
        let mut server = test_server(Vec::new(), Vec::new());
        let _rx = join_from(
            &mut server,
            0,
            "alice",
            IpAddr::from(Ipv4Addr::new(203, 0, 113, 9)),
        );

        assert!(!server.players.get(ConnId(0)).unwrap().is_op);
    }

    #[test]
    fn test_configured_operator_granted_on_join() {
        let mut server = test_server(vec!["alice".to_string()], Vec::new());
        let _alice = join_from(
            &mut server,
            0,
            "alice",
            IpAddr::from(Ipv4Addr::new(203, 0, 113, 9)),
        );
        let _bob = join_from(
            &mut server,
            1,
            "bob",
            IpAddr::from(Ipv4Addr::new(203, 0, 113, 10)),
        );

        assert!(server.players.get(ConnId(0)).unwrap().is_op);
        assert!(!server.players.get(ConnId(1)).unwrap().is_op);
    }

    #[test]
    fn test_banned_player_removed_on_join() {
        let mut server = test_server(vec!["root".to_string()], vec!["mallory".to_string()]);
        let _rx = join_from(
            &mut server,
            0,
            "mallory",
            IpAddr::from(Ipv4Addr::new(203, 0, 113, 9)),
        );

        assert!(server.players.get(ConnId(0)).is_none());
    }

    #[test]
    fn test_ban_command_kicks_and_announces() {
        let mut server = test_server(Vec::new(), Vec::new());
        let mut alice_rx = join_from(&mut server, 0, "alice", Ipv4Addr::LOCALHOST.into());
        let mut bob_rx = join_from(&mut server, 1, "bob", Ipv4Addr::LOCALHOST.into());
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let bob_latch = server.players.get(ConnId(1)).unwrap().latch().clone();
        server.run_command(ConnId(0), "ban", &["bob".to_string()]);

        assert!(server.players.get(ConnId(1)).is_none());
        assert_eq!(
            bob_latch.cause(),
            Some(DropCause::ServerDrop("Banned".to_string()))
        );

        let packets = drain(&mut alice_rx);
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::Despawn(despawn) if despawn.player_id == 1
        )));
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::Chat(chat)
                if chat.message == "bob left (Banned)" && chat.player_id == SELF_ID
        )));
    }

    #[test]
    fn test_op_command_requires_operator() {
        let mut server = test_server(vec!["root".to_string()], Vec::new());
        let mut alice_rx = join_from(
            &mut server,
            0,
            "alice",
            IpAddr::from(Ipv4Addr::new(203, 0, 113, 9)),
        );
        let _bob = join_from(
            &mut server,
            1,
            "bob",
            IpAddr::from(Ipv4Addr::new(203, 0, 113, 10)),
        );
        drain(&mut alice_rx);

        server.run_command(ConnId(0), "op", &["bob".to_string()]);

        assert!(!server.players.get(ConnId(1)).unwrap().is_op);
        let packets = drain(&mut alice_rx);
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::Chat(chat) if chat.message.contains("requires operator")
        )));
    }

    #[test]
    fn test_op_then_unban_flow() {
        let mut server = test_server(Vec::new(), vec!["mallory".to_string()]);
        let mut alice_rx = join_from(&mut server, 0, "alice", Ipv4Addr::LOCALHOST.into());
        drain(&mut alice_rx);

        server.run_command(ConnId(0), "unban", &["mallory".to_string()]);
        let packets = drain(&mut alice_rx);
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::Chat(chat) if chat.message == "Unbanned mallory"
        )));

        server.run_command(ConnId(0), "unban", &["mallory".to_string()]);
        let packets = drain(&mut alice_rx);
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::Chat(chat) if chat.message.contains("No bans")
        )));
    }
}
