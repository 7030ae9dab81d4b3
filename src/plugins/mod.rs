//! Game-logic plugins
//!
//! A plugin is a module with a `register` entry point that subscribes to
//! server events and registers commands. Everything outside the
//! connection plumbing is implemented this way, including the base
//! protocol behavior itself.

pub mod base;
pub mod dice;
pub mod help;
pub mod ops;

use crate::network::ConnId;
use crate::server::ClassicServer;

/// Register every built-in plugin, in order
pub fn register_all(server: &mut ClassicServer) {
    base::register(server);
    ops::register(server);
    dice::register(server);
    help::register(server);
}

/// Send a server chat line to one connection, if it is still around
pub(crate) fn reply(server: &ClassicServer, conn: ConnId, message: &str) {
    if let Some(player) = server.players.get(conn) {
        player.send_message(message);
    }
}
