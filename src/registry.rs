use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{AgentCommandSpec, AgentContext};
use crate::builtins::{self, BuiltinCommand};

/// A declared positional parameter of an extension or agent command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    /// The bound value is a local path whose content is sent base64 encoded.
    #[serde(default)]
    pub file_path: bool,
}

impl Parameter {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            file_path: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(name)
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            file_path: true,
            ..Self::required(name)
        }
    }
}

/// Opaque reference to a callable owned by the extension runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallableHandle(pub u64);

/// A named group of extension commands (`<module> <command> ...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionModule {
    /// Agent type affinity, empty for every agent type.
    pub agent: String,
    pub name: String,
    pub description: String,
    pub behavior: Option<String>,
    pub usage: Option<String>,
    pub example: Option<String>,
}

/// A command contributed by an extension script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionCommand {
    /// Agent type affinity, empty for every agent type.
    pub agent: String,
    pub module: Option<String>,
    pub command: String,
    pub help: String,
    pub usage: Option<String>,
    pub example: Option<String>,
    pub params: Vec<Parameter>,
    pub handle: CallableHandle,
    /// Hidden from `help` listings.
    pub anonymous: bool,
    /// Directory the callable runs in.
    pub working_dir: Option<PathBuf>,
}

impl ExtensionCommand {
    pub fn new(command: impl Into<String>, help: impl Into<String>, handle: CallableHandle) -> Self {
        Self {
            agent: String::new(),
            module: None,
            command: command.into(),
            help: help.into(),
            usage: None,
            example: None,
            params: Vec::new(),
            handle,
            anonymous: false,
            working_dir: None,
        }
    }

    /// `module command`, or just `command` when unqualified.
    pub fn qualified_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{} {}", module, self.command),
            None => self.command.clone(),
        }
    }

    pub fn visible_to(&self, agent_type: &str) -> bool {
        self.agent.is_empty() || self.agent == agent_type
    }
}

impl ExtensionModule {
    pub fn visible_to(&self, agent_type: &str) -> bool {
        self.agent.is_empty() || self.agent == agent_type
    }
}

#[derive(Debug, Default, Clone)]
struct Tables {
    modules: Vec<ExtensionModule>,
    commands: Vec<ExtensionCommand>,
}

/// Extension modules and commands registered at load time.
///
/// Cloning is cheap and yields an immutable snapshot: registration after the
/// clone copies the tables instead of mutating what the snapshot sees.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    tables: Arc<Tables>,
}

/// Outcome of resolving a token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// Empty line.
    Empty,
    Builtin(BuiltinCommand),
    /// A static command of the active third-party agent.
    AgentCommand(&'a AgentCommandSpec),
    /// An extension command; its own arguments start at `arg_start`.
    Extension {
        command: &'a ExtensionCommand,
        arg_start: usize,
    },
    /// A module name given without a command.
    MissingSubCommand,
    NotFound,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, module: ExtensionModule) {
        info!(module = %module.name, agent = %module.agent, "registering extension module");
        Arc::make_mut(&mut self.tables).modules.push(module);
    }

    pub fn register_command(&mut self, command: ExtensionCommand) {
        info!(command = %command.qualified_name(), agent = %command.agent, "registering extension command");
        Arc::make_mut(&mut self.tables).commands.push(command);
    }

    /// Drop every registered module and command.
    pub fn reset(&mut self) {
        self.tables = Arc::new(Tables::default());
    }

    pub fn modules(&self) -> &[ExtensionModule] {
        &self.tables.modules
    }

    pub fn commands(&self) -> &[ExtensionCommand] {
        &self.tables.commands
    }

    pub fn module(&self, name: &str, agent_type: &str) -> Option<&ExtensionModule> {
        self.modules()
            .iter()
            .find(|m| m.name == name && m.visible_to(agent_type))
    }

    /// Commands registered under `module`, in registration order.
    pub fn module_commands<'a>(
        &'a self,
        module: &'a str,
        agent_type: &'a str,
    ) -> impl Iterator<Item = &'a ExtensionCommand> + 'a {
        self.commands()
            .iter()
            .filter(move |c| c.module.as_deref() == Some(module) && c.visible_to(agent_type))
    }

    /// Unqualified command by name.
    pub fn command(&self, name: &str, agent_type: &str) -> Option<&ExtensionCommand> {
        self.commands()
            .iter()
            .find(|c| c.module.is_none() && c.command == name && c.visible_to(agent_type))
    }

    fn is_module_name(&self, name: &str, agent_type: &str) -> bool {
        self.module(name, agent_type).is_some() || self.module_commands(name, agent_type).next().is_some()
    }

    /// Resolve `tokens` for the given agent context.
    ///
    /// Built-ins win over extension commands. Third-party agents only see
    /// `help`, `clear`, their own static commands and extensions registered
    /// for their type.
    pub fn resolve<'a>(&'a self, tokens: &[String], context: &'a AgentContext) -> Resolved<'a> {
        let Some(first) = tokens.first().filter(|t| !t.is_empty()) else {
            return Resolved::Empty;
        };

        match context {
            AgentContext::Default => {
                if let Some(builtin) = BuiltinCommand::from_name(first) {
                    if !falls_through(builtin, tokens) {
                        return Resolved::Builtin(builtin);
                    }
                    debug!(command = %first, "built-in sub command unknown, checking extensions");
                }
            }
            AgentContext::ThirdParty(agent) => {
                match BuiltinCommand::from_name(first) {
                    Some(builtin) if builtin.is_console_local() => return Resolved::Builtin(builtin),
                    _ => {}
                }
                if let Some(spec) = agent.command(first) {
                    return Resolved::AgentCommand(spec);
                }
            }
        }

        self.resolve_extension(tokens, context.type_name())
    }

    fn resolve_extension<'a>(&'a self, tokens: &[String], agent_type: &str) -> Resolved<'a> {
        let first = tokens[0].as_str();

        if self.is_module_name(first, agent_type) {
            let Some(second) = tokens.get(1) else {
                return Resolved::MissingSubCommand;
            };

            return match self
                .commands()
                .iter()
                .find(|c| c.module.as_deref() == Some(first) && c.command == *second && c.visible_to(agent_type))
            {
                Some(command) => {
                    debug!(module = %first, command = %second, "found extension command");
                    Resolved::Extension { command, arg_start: 2 }
                }
                None => Resolved::NotFound,
            };
        }

        match self.command(first, agent_type) {
            Some(command) => {
                debug!(command = %first, "found extension command");
                Resolved::Extension { command, arg_start: 1 }
            }
            None => Resolved::NotFound,
        }
    }
}

/// `dotnet <unknown>` is left to extension commands.
fn falls_through(builtin: BuiltinCommand, tokens: &[String]) -> bool {
    if builtin != BuiltinCommand::Dotnet {
        return false;
    }
    match (tokens.get(1), builtins::descriptor("dotnet")) {
        (Some(sub), Some(dotnet)) => dotnet.sub_command(sub).is_none(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ServiceAgent;
    use crate::tokenizer::tokenize;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register_module(ExtensionModule {
            agent: "Demon".to_string(),
            name: "situational".to_string(),
            description: "situational awareness".to_string(),
            behavior: None,
            usage: None,
            example: None,
        });
        let mut whoami = ExtensionCommand::new("whoami", "current user", CallableHandle(1));
        whoami.agent = "Demon".to_string();
        whoami.module = Some("situational".to_string());
        registry.register_command(whoami);

        let mut sleep = ExtensionCommand::new("sleep", "shadowed by the built-in", CallableHandle(2));
        sleep.agent = "Demon".to_string();
        registry.register_command(sleep);

        let mut talon_only = ExtensionCommand::new("hashdump", "dump hashes", CallableHandle(3));
        talon_only.agent = "Talon".to_string();
        registry.register_command(talon_only);

        registry.register_command(ExtensionCommand::new("assembly", "dotnet helper", CallableHandle(4)));
        registry
    }

    fn talon() -> AgentContext {
        AgentContext::ThirdParty(ServiceAgent {
            name: "Talon".to_string(),
            magic_value: 0x4141_4141,
            commands: vec![AgentCommandSpec {
                name: "shell".to_string(),
                description: String::new(),
                anonymous: false,
                params: Vec::new(),
            }],
        })
    }

    #[test]
    fn test_builtin_wins_over_extension() {
        let registry = registry();
        let ctx = AgentContext::Default;
        assert_eq!(
            registry.resolve(&tokenize("sleep 10"), &ctx),
            Resolved::Builtin(BuiltinCommand::Sleep)
        );
    }

    #[test]
    fn test_module_command_resolution() {
        let registry = registry();
        let ctx = AgentContext::Default;
        match registry.resolve(&tokenize("situational whoami /all"), &ctx) {
            Resolved::Extension { command, arg_start } => {
                assert_eq!(command.handle, CallableHandle(1));
                assert_eq!(arg_start, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            registry.resolve(&tokenize("situational"), &ctx),
            Resolved::MissingSubCommand
        );
        assert_eq!(
            registry.resolve(&tokenize("situational nope"), &ctx),
            Resolved::NotFound
        );
    }

    #[test]
    fn test_affinity_hides_other_agent_commands() {
        let registry = registry();
        assert_eq!(
            registry.resolve(&tokenize("hashdump"), &AgentContext::Default),
            Resolved::NotFound
        );
        assert!(matches!(
            registry.resolve(&tokenize("hashdump"), &talon()),
            Resolved::Extension { .. }
        ));
        assert_eq!(
            registry.resolve(&tokenize("situational whoami"), &talon()),
            Resolved::NotFound
        );
    }

    #[test]
    fn test_third_party_sees_static_commands_and_console_builtins() {
        let registry = registry();
        let ctx = talon();
        assert!(matches!(
            registry.resolve(&tokenize("shell whoami"), &ctx),
            Resolved::AgentCommand(spec) if spec.name == "shell"
        ));
        assert_eq!(
            registry.resolve(&tokenize("help"), &ctx),
            Resolved::Builtin(BuiltinCommand::Help)
        );
        assert_eq!(registry.resolve(&tokenize("sleep 10"), &ctx), Resolved::NotFound);
    }

    #[test]
    fn test_dotnet_unknown_sub_falls_through() {
        let registry = registry();
        let ctx = AgentContext::Default;
        assert_eq!(
            registry.resolve(&tokenize("dotnet list-versions"), &ctx),
            Resolved::Builtin(BuiltinCommand::Dotnet)
        );
        assert_eq!(
            registry.resolve(&tokenize("dotnet"), &ctx),
            Resolved::Builtin(BuiltinCommand::Dotnet)
        );
        assert_eq!(
            registry.resolve(&tokenize("dotnet inject 1234"), &ctx),
            Resolved::NotFound
        );
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(registry().resolve(&[], &AgentContext::Default), Resolved::Empty);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_registration() {
        let mut registry = registry();
        let snapshot = registry.clone();
        registry.register_command(ExtensionCommand::new("late", "", CallableHandle(9)));

        assert!(registry.command("late", "Demon").is_some());
        assert!(snapshot.command("late", "Demon").is_none());

        registry.reset();
        assert!(registry.commands().is_empty());
        assert!(!snapshot.commands().is_empty());
    }
}
