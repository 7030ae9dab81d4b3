//! Help plugin
//!
//! Lists registered commands a page at a time, or shows one command's
//! usage text.

use crate::command::Command;
use crate::network::ConnId;
use crate::plugins::reply;
use crate::server::ClassicServer;
use std::sync::Arc;

/// Commands listed per help page
const COMMANDS_PER_PAGE: usize = 4;

/// Register the `help` command and its aliases
pub fn register(server: &mut ClassicServer) {
    server.commands.register(Command {
        name: "help",
        aliases: &["?", "cmds"],
        op_only: false,
        help: "help [page|command]\nLists commands, or shows how to use one.",
        handler: Arc::new(|server, conn, args| match args.first() {
            Some(word) => {
                if let Ok(page) = word.parse::<usize>() {
                    send_page(server, conn, page);
                } else if let Some(command) = server.commands.get(word) {
                    for line in command.help.lines() {
                        reply(server, conn, line);
                    }
                } else {
                    reply(server, conn, "&cCould not find that command.");
                }
            }
            None => send_page(server, conn, 0),
        }),
    });

    tracing::debug!("initialized plugin LiveWire");
}

/// Send one page of the sorted command list
fn send_page(server: &ClassicServer, conn: ConnId, page: usize) {
    let names = server.commands.names();
    let Some(player) = server.players.get(conn) else {
        return;
    };

    player.send_message(&format!("Help page {page} ==="));
    for name in names.iter().skip(page * COMMANDS_PER_PAGE).take(COMMANDS_PER_PAGE) {
        player.send_message(&format!("/{name}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::game::player::Player;
    use crate::game::world::loader;
    use crate::network::{DropLatch, OutboundItem};
    use crate::protocol::ServerPacket;
    use std::net::Ipv4Addr;
    use tokio::sync::mpsc;

    fn test_server() -> (ClassicServer, mpsc::Receiver<OutboundItem>) {
        let mut config = ServerConfig::default();
        config.level_size = [16, 8, 16];
        let world = loader::flat_level((16, 8, 16)).unwrap();
        let mut server = ClassicServer::new(config, world);
        register(&mut server);
        crate::plugins::dice::register(&mut server);

        let (tx, rx) = mpsc::channel(64);
        let mut player = Player::new(ConnId(0), Ipv4Addr::LOCALHOST.into(), tx, DropLatch::new());
        player.name = Some("alice".to_string());
        server.players.insert(player);
        server.add_player(ConnId(0)).unwrap();
        (server, rx)
    }

    fn chat_messages(rx: &mut mpsc::Receiver<OutboundItem>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let OutboundItem::Packet(ServerPacket::Chat(chat)) = item {
                messages.push(chat.message);
            }
        }
        messages
    }

    #[test]
    fn test_help_lists_commands() {
        let (mut server, mut rx) = test_server();

        server.run_command(ConnId(0), "help", &[]);

        let messages = chat_messages(&mut rx);
        assert_eq!(messages[0], "Help page 0 ===");
        assert!(messages.contains(&"/help".to_string()));
        assert!(messages.contains(&"/roll".to_string()));
    }

    #[test]
    fn test_help_alias_and_command_usage() {
        let (mut server, mut rx) = test_server();

        server.run_command(ConnId(0), "?", &["roll".to_string()]);

        let messages = chat_messages(&mut rx);
        assert!(messages.iter().any(|message| message.starts_with("roll [sides]")));
    }

    #[test]
    fn test_help_unknown_command() {
        let (mut server, mut rx) = test_server();

        server.run_command(ConnId(0), "help", &["nope".to_string()]);

        let messages = chat_messages(&mut rx);
        assert!(messages.iter().any(|message| message.contains("Could not find")));
    }

    #[test]
    fn test_out_of_range_page_is_empty() {
        let (mut server, mut rx) = test_server();

        server.run_command(ConnId(0), "help", &["9".to_string()]);

        let messages = chat_messages(&mut rx);
        assert_eq!(messages, vec!["Help page 9 ===".to_string()]);
    }
}
