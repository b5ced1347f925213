use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::agent::{AgentContext, ServiceAgent, SessionInfo, DEFAULT_AGENT_MAGIC};
use crate::error::ConfigError;

/// Console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the agent this console drives
    pub agent_id: String,

    /// Magic value of the agent; the default agent type unless overridden
    #[serde(default = "default_magic_value")]
    pub magic_value: u32,

    /// Banner details shown after `clear`
    #[serde(default)]
    pub session: SessionInfo,

    /// MQTT broker configuration
    pub mqtt: MqttConfig,

    /// Third-party agent types known to the teamserver
    #[serde(default)]
    pub agents: Vec<ServiceAgent>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_keep_alive() -> u64 {
    30
}

fn default_magic_value() -> u32 {
    DEFAULT_AGENT_MAGIC
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(agent_id = %config.agent_id, magic = %format!("{:#x}", config.magic_value), "configuration loaded");
        Ok(config)
    }

    /// Create default configuration
    pub fn default_for_agent(agent_id: String) -> Self {
        Self {
            session: SessionInfo {
                name: agent_id.clone(),
                ..SessionInfo::default()
            },
            agent_id,
            magic_value: DEFAULT_AGENT_MAGIC,
            mqtt: MqttConfig {
                broker: "localhost".to_string(),
                port: 1883,
                keep_alive_secs: 30,
            },
            agents: Vec::new(),
            log_level: default_log_level(),
        }
    }

    /// Agent context selected by the configured magic value
    pub fn context(&self) -> AgentContext {
        AgentContext::resolve(self.magic_value, &self.agents)
    }
}
