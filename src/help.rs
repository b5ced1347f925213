//! `help` rendering.
//!
//! Everything here is a read-only traversal of the built-in table, the
//! registry snapshot and the active agent's static commands. Output is
//! returned as lines so the dispatcher decides where it goes.

use crate::agent::{AgentCommandSpec, AgentContext, ServiceAgent};
use crate::builtins::{self, CommandDescriptor, BUILTIN_COMMANDS};
use crate::error::DispatchError;
use crate::registry::{CommandRegistry, ExtensionCommand, ExtensionModule};

const OVERVIEW_NAME_WIDTH: usize = 25;
const AGENT_OVERVIEW_NAME_WIDTH: usize = 18;
const SUB_NAME_WIDTH: usize = 31;
const EXTENSION_NAME_WIDTH: usize = 19;

/// Render `help` for `tokens` (`help [topic] [sub]`).
pub fn render(
    tokens: &[String],
    registry: &CommandRegistry,
    context: &AgentContext,
) -> Result<Vec<String>, DispatchError> {
    let topic = tokens.get(1).filter(|t| !t.is_empty());
    let sub = tokens.get(2).filter(|t| !t.is_empty());

    match (context, topic) {
        (AgentContext::Default, None) => Ok(overview(registry, context.type_name())),
        (AgentContext::Default, Some(topic)) => topic_help(registry, context.type_name(), topic, sub),
        (AgentContext::ThirdParty(agent), None) => Ok(agent_overview(registry, agent)),
        (AgentContext::ThirdParty(agent), Some(topic)) => agent_topic_help(registry, agent, topic),
    }
}

fn field(label: &str, value: &str) -> String {
    format!(" - {:<14}:  {}", label, value)
}

fn overview_row(name: &str, kind: &str, description: &str, width: usize) -> String {
    format!("  {:<width$}{}      {}", name, kind, description, width = width)
}

fn kind_of(descriptor: &CommandDescriptor) -> &'static str {
    if descriptor.module {
        "Module "
    } else {
        "Command"
    }
}

fn sort_rows(rows: &mut [(String, String)]) {
    rows.sort_by_key(|(name, _)| name.to_lowercase());
}

/// Alphabetical listing of every top-level command visible to `agent_type`.
pub fn overview(registry: &CommandRegistry, agent_type: &str) -> Vec<String> {
    let mut rows: Vec<(String, String)> = Vec::new();

    for descriptor in BUILTIN_COMMANDS {
        rows.push((
            descriptor.name.to_string(),
            overview_row(descriptor.name, kind_of(descriptor), descriptor.description, OVERVIEW_NAME_WIDTH),
        ));
    }

    for module in registry.modules().iter().filter(|m| m.visible_to(agent_type)) {
        if module.name.is_empty() {
            continue;
        }
        rows.push((
            module.name.clone(),
            overview_row(&module.name, "Module ", &module.description, OVERVIEW_NAME_WIDTH),
        ));
    }

    for command in registry
        .commands()
        .iter()
        .filter(|c| c.module.is_none() && !c.anonymous && c.visible_to(agent_type))
    {
        rows.push((
            command.command.clone(),
            overview_row(&command.command, "Command", &command.help, OVERVIEW_NAME_WIDTH),
        ));
    }

    sort_rows(&mut rows);

    let title = format!("{} Commands", agent_type);
    let mut lines = vec![
        String::new(),
        "=".repeat(title.len()),
        String::new(),
        "  Command                  Type         Description".to_string(),
        "  -------                  -------      -----------".to_string(),
    ];
    lines.insert(1, title);
    lines.extend(rows.into_iter().map(|(_, row)| row));
    lines
}

fn topic_help(
    registry: &CommandRegistry,
    agent_type: &str,
    topic: &str,
    sub: Option<&String>,
) -> Result<Vec<String>, DispatchError> {
    if let Some(descriptor) = builtins::descriptor(topic) {
        let has_subs = descriptor.module || !descriptor.sub_commands.is_empty();
        return match sub {
            Some(sub) if has_subs => builtin_sub_help(registry, agent_type, descriptor, sub),
            _ => Ok(builtin_help(registry, agent_type, descriptor)),
        };
    }

    if let Some(module) = registry.module(topic, agent_type) {
        return match sub {
            Some(sub) => registry
                .module_commands(topic, agent_type)
                .find(|c| c.command == *sub)
                .map(|c| module_command_help(module, c))
                .ok_or_else(|| DispatchError::SubCommandNotFound {
                    command: topic.to_string(),
                    sub: sub.clone(),
                }),
            None => Ok(module_help(registry, agent_type, module)),
        };
    }

    registry
        .command(topic, agent_type)
        .map(extension_command_help)
        .ok_or_else(|| DispatchError::NotFound(topic.to_string()))
}

fn required_args(usage: &str) -> String {
    usage.split(' ').count().to_string()
}

fn builtin_help(registry: &CommandRegistry, agent_type: &str, descriptor: &CommandDescriptor) -> Vec<String> {
    let name = descriptor.name;
    let mut lines = vec![
        String::new(),
        field("Command", name),
        field("Description", descriptor.description),
    ];

    if let Some(behavior) = descriptor.behavior {
        lines.push(field("Behavior", behavior));
    }
    if let Some(usage) = descriptor.usage {
        lines.push(field("Usage", &format!("{} {}", name, usage)));
    }
    if let Some(example) = descriptor.example {
        lines.push(field("Example", &format!("{} {}", name, example)));
    }
    if let Some(usage) = descriptor.usage.filter(|_| descriptor.sub_commands.is_empty()) {
        lines.push(field("Required Args", &required_args(usage)));
    }

    if descriptor.module || !descriptor.sub_commands.is_empty() {
        lines.push(String::new());
        lines.push("  Command                        Description      ".to_string());
        lines.push("  ---------                      -------------     ".to_string());

        for sub in descriptor.sub_commands {
            lines.push(format!("  {:<width$}{}", sub.name, sub.description, width = SUB_NAME_WIDTH));
        }
        // extension commands registered under a built-in module name
        for command in registry.module_commands(name, agent_type) {
            lines.push(extension_row(command));
        }
    }

    lines
}

fn builtin_sub_help(
    registry: &CommandRegistry,
    agent_type: &str,
    descriptor: &CommandDescriptor,
    sub: &str,
) -> Result<Vec<String>, DispatchError> {
    let name = descriptor.name;

    if let Some(sub) = descriptor.sub_command(sub) {
        let mut lines = vec![
            String::new(),
            field("Module", name),
            field("Sub Command", sub.name),
            field("Description", sub.description),
        ];
        if let Some(behavior) = sub.behavior {
            lines.push(field("Behavior", behavior));
        }
        if let Some(usage) = sub.usage {
            lines.push(field("Usage", &format!("{} {} {}", name, sub.name, usage)));
        }
        if let Some(example) = sub.example {
            lines.push(field("Example", &format!("{} {} {}", name, sub.name, example)));
        }
        if !sub.options.is_empty() {
            lines.push(field("Options", ""));
            lines.extend(sub.options.iter().map(|option| format!("      {}", option)));
        }
        return Ok(lines);
    }

    let command = registry
        .module_commands(name, agent_type)
        .find(|c| c.command == sub)
        .ok_or_else(|| DispatchError::SubCommandNotFound {
            command: name.to_string(),
            sub: sub.to_string(),
        })?;

    let mut lines = vec![
        String::new(),
        field("Module", name),
        field("Sub Command", &command.command),
        field("Description", &command.help),
    ];
    if let Some(usage) = &command.usage {
        lines.push(field("Usage", &format!("{} {} {}", name, command.command, usage)));
    }
    if let Some(example) = &command.example {
        lines.push(field("Example", &format!("{} {} {}", name, command.command, example)));
    }
    Ok(lines)
}

fn extension_row(command: &ExtensionCommand) -> String {
    format!(
        "  {:<width$}       {}",
        command.command,
        command.help,
        width = EXTENSION_NAME_WIDTH
    )
}

fn module_help(registry: &CommandRegistry, agent_type: &str, module: &ExtensionModule) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        field("Command", &module.name),
        field("Description", &module.description),
    ];
    if let Some(behavior) = &module.behavior {
        lines.push(field("Behavior", behavior));
    }
    if let Some(usage) = &module.usage {
        lines.push(field("Usage", &format!("{} {}", module.name, usage)));
    }
    if let Some(example) = &module.example {
        lines.push(field("Example", &format!("{} {}", module.name, example)));
    }
    if let Some(usage) = &module.usage {
        lines.push(field("Required Args", &required_args(usage)));
    }

    lines.push(String::new());
    lines.push("  Command                   Description      ".to_string());
    lines.push("  ---------                 -------------     ".to_string());
    lines.extend(registry.module_commands(&module.name, agent_type).map(extension_row));
    lines
}

fn module_command_help(module: &ExtensionModule, command: &ExtensionCommand) -> Vec<String> {
    let qualified = format!("{} {}", module.name, command.command);
    let mut lines = vec![
        String::new(),
        field("Command", &qualified),
        field("Description", &command.help),
    ];
    if let Some(usage) = &command.usage {
        lines.push(field("Usage", &format!("{} {}", qualified, usage)));
    }
    if let Some(example) = &command.example {
        lines.push(field("Example", &format!("{} {}", qualified, example)));
    }
    if let Some(usage) = &command.usage {
        lines.push(field("Required Args", &required_args(usage)));
    }
    lines
}

fn extension_command_help(command: &ExtensionCommand) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        field("Command", &command.command),
        field("Description", &command.help),
    ];
    if let Some(usage) = &command.usage {
        lines.push(field("Usage", &format!("{} {}", command.command, usage)));
    }
    if let Some(example) = &command.example {
        lines.push(field("Example", &format!("{} {}", command.command, example)));
    }
    lines
}

fn agent_overview(registry: &CommandRegistry, agent: &ServiceAgent) -> Vec<String> {
    let mut rows: Vec<(String, String)> = agent
        .commands
        .iter()
        .filter(|c| !c.anonymous)
        .map(|c| {
            (
                c.name.clone(),
                overview_row(&c.name, "Command", &c.description, AGENT_OVERVIEW_NAME_WIDTH),
            )
        })
        .collect();

    rows.extend(
        registry
            .commands()
            .iter()
            .filter(|c| c.module.is_none() && !c.anonymous && c.visible_to(&agent.name))
            .map(|c| {
                (
                    c.command.clone(),
                    overview_row(&c.command, "Command", &c.help, AGENT_OVERVIEW_NAME_WIDTH),
                )
            }),
    );

    sort_rows(&mut rows);

    let mut lines = vec![
        String::new(),
        "  Command           Type         Description".to_string(),
        "  ---------         -------      -----------".to_string(),
    ];
    lines.extend(rows.into_iter().map(|(_, row)| row));
    lines
}

fn agent_command_help(command: &AgentCommandSpec) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        field("Command", &command.name),
        field("Description", &command.description),
    ];

    if !command.params.is_empty() {
        let usage = command
            .params
            .iter()
            .map(|p| {
                if p.optional {
                    format!("({})", p.name)
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(field("Usage", &format!("{} {}", command.name, usage)));
        let required = command.params.iter().filter(|p| !p.optional).count();
        lines.push(field("Required Args", &required.to_string()));
    }

    lines
}

fn agent_topic_help(
    registry: &CommandRegistry,
    agent: &ServiceAgent,
    topic: &str,
) -> Result<Vec<String>, DispatchError> {
    if let Some(command) = agent.command(topic) {
        return Ok(agent_command_help(command));
    }

    registry
        .command(topic, &agent.name)
        .map(extension_command_help)
        .ok_or_else(|| DispatchError::NotFound(topic.to_string()))
}
