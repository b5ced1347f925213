use serde::{Deserialize, Serialize};

use crate::registry::Parameter;

/// Magic value announced by the default agent type.
pub const DEFAULT_AGENT_MAGIC: u32 = 0xDEAD_BEEF;

/// Name extension commands use to target the default agent type.
pub const DEFAULT_AGENT_NAME: &str = "Demon";

/// A command declared statically by a third-party agent type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommandSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Hidden from `help` listings.
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub params: Vec<Parameter>,
}

/// A third-party agent type registered with the teamserver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAgent {
    pub name: String,
    pub magic_value: u32,
    #[serde(default)]
    pub commands: Vec<AgentCommandSpec>,
}

impl ServiceAgent {
    pub fn command(&self, name: &str) -> Option<&AgentCommandSpec> {
        self.commands.iter().find(|cmd| cmd.name == name)
    }
}

/// The agent targeted by one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentContext {
    Default,
    ThirdParty(ServiceAgent),
}

impl AgentContext {
    /// Pick the context for `magic_value`.
    ///
    /// Unknown magic values fall back to an anonymous third-party agent with
    /// no static commands, so only `help`, `clear` and extension commands
    /// registered for any agent are reachable.
    pub fn resolve(magic_value: u32, agents: &[ServiceAgent]) -> Self {
        if magic_value == DEFAULT_AGENT_MAGIC {
            return Self::Default;
        }

        agents
            .iter()
            .find(|agent| agent.magic_value == magic_value)
            .cloned()
            .map(Self::ThirdParty)
            .unwrap_or_else(|| {
                Self::ThirdParty(ServiceAgent {
                    name: String::new(),
                    magic_value,
                    commands: Vec::new(),
                })
            })
    }

    /// Agent type name extension affinities are compared against.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Default => DEFAULT_AGENT_NAME,
            Self::ThirdParty(agent) => &agent.name,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

/// Session details shown in the banner `clear` re-inserts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    #[serde(default)]
    pub computer: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub internal: String,
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub pivot_parent: Option<String>,
    #[serde(default)]
    pub first_seen: String,
}

impl SessionInfo {
    /// One line summary of the session.
    pub fn banner(&self) -> String {
        let pivot = match self.pivot_parent.as_deref() {
            Some(parent) if !parent.is_empty() => format!("[Pivot: {}-<>-<>-{}]", parent, self.name),
            _ => "[Pivot: Direct]".to_string(),
        };

        format!(
            "{} Agent {} authenticated as {}\\{} :: [Internal: {}] [Process: {}\\{}] [Arch: {}] {}",
            self.first_seen,
            self.name.to_uppercase(),
            self.computer,
            self.user,
            self.internal,
            self.process,
            self.pid,
            self.arch,
            pivot
        )
    }
}
