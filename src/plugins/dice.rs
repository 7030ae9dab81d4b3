//! Dice plugin
//!
//! A single `roll` command that announces a die roll to everyone.

use crate::command::Command;
use crate::plugins::reply;
use crate::server::ClassicServer;
use rand::Rng;
use std::sync::Arc;

/// Sides rolled when the command gives no argument
const DEFAULT_SIDES: u32 = 20;

/// Register the `roll` command
pub fn register(server: &mut ClassicServer) {
    server.commands.register(Command {
        name: "roll",
        aliases: &[],
        op_only: false,
        help: "roll [sides]\nRolls a die, 20 sides by default.",
        handler: Arc::new(|server, conn, args| {
            let sides = match args.first() {
                None => DEFAULT_SIDES,
                Some(raw) => match raw.parse::<u32>() {
                    Ok(sides) if sides >= 1 => sides,
                    _ => {
                        reply(server, conn, "&cExpected a number as first argument");
                        return;
                    }
                },
            };

            let roll = rand::thread_rng().gen_range(1..=sides);
            let name = server
                .players
                .get(conn)
                .map(|player| player.display_name().to_string())
                .unwrap_or_else(|| "someone".to_string());
            server.announce(&format!("{name} rolled a {roll}"));
        }),
    });

    tracing::debug!("initialized plugin DiceGames");
}
