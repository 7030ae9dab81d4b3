//! Command registry
//!
//! Chat-triggered commands, keyed by name with optional aliases.
//! Plugins register commands at startup; the table is read-only
//! afterwards. Duplicate names are rejected with a warning and the first
//! registrant wins.

use crate::network::ConnId;
use crate::server::ClassicServer;
use std::collections::HashMap;
use std::sync::Arc;

/// Command callback: full mutable access to the server, the invoking
/// connection, and the whitespace-split arguments
pub type CommandHandler = Arc<dyn Fn(&mut ClassicServer, ConnId, &[String]) + Send + Sync>;

/// A registered chat command
pub struct Command {
    /// Primary name, as typed after the slash
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Whether only operators may invoke it
    pub op_only: bool,
    /// Usage line shown by the help command
    pub help: &'static str,
    /// The callback
    pub handler: CommandHandler,
}

/// Table of commands, including alias entries
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<Command>>,
}

impl CommandRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a command under its name and aliases.
    ///
    /// Returns false without touching the table when the name is already
    /// taken; colliding aliases are skipped individually.
    pub fn register(&mut self, command: Command) -> bool {
        if self.commands.contains_key(command.name) {
            tracing::warn!(
                "command '{}' already registered, keeping the first registrant",
                command.name
            );
            return false;
        }

        let command = Arc::new(command);
        self.commands.insert(command.name, command.clone());

        for &alias in command.aliases {
            if self.commands.contains_key(alias) {
                tracing::warn!(
                    "command alias '{}' already registered, keeping the first registrant",
                    alias
                );
                continue;
            }
            self.commands.insert(alias, command.clone());
        }

        true
    }

    /// Look up a command by name or alias
    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.commands.get(name).cloned()
    }

    /// Sorted primary names of every registered command
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .commands
            .values()
            .map(|command| command.name)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a chat line into a command invocation.
///
/// Returns the command name and its arguments for lines starting with
/// `/`; the slash is stripped and the rest split on whitespace.
pub fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let rest = text.strip_prefix('/')?;
    let mut words = rest.split_whitespace().map(str::to_string);
    let name = words.next()?;
    Some((name, words.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &'static str, aliases: &'static [&'static str]) -> Command {
        Command {
            name,
            aliases,
            op_only: false,
            help: "",
            handler: Arc::new(|_, _, _| {}),
        }
    }

    #[test]
    fn test_register_and_lookup_with_aliases() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register(noop("help", &["?", "cmds"])));

        assert!(registry.get("help").is_some());
        assert!(registry.get("?").is_some());
        assert!(registry.get("cmds").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["help"]);
    }

    #[test]
    fn test_duplicate_name_keeps_first_registrant() {
        let mut registry = CommandRegistry::new();
        let first = Command {
            op_only: true,
            ..noop("ban", &[])
        };
        assert!(registry.register(first));
        assert!(!registry.register(noop("ban", &[])));

        assert!(registry.get("ban").unwrap().op_only);
    }

    #[test]
    fn test_parse_command_splits_on_whitespace() {
        let (name, args) = parse_command("/op alice  bob").unwrap();
        assert_eq!(name, "op");
        assert_eq!(args, vec!["alice".to_string(), "bob".to_string()]);

        let (name, args) = parse_command("/roll").unwrap();
        assert_eq!(name, "roll");
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_command_ignores_plain_chat() {
        assert!(parse_command("hello there").is_none());
        assert!(parse_command("/").is_none());
        assert!(parse_command("/   ").is_none());
    }
}
