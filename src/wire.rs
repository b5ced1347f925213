//! Task payload encoding.
//!
//! A payload is a flat list of fields joined with `;`. Paths and free-form
//! content are base64 encoded so they can never contain the separator;
//! flags and enumerated codes travel as plain literals.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Field separator inside a payload.
pub const FIELD_SEPARATOR: char = ';';

/// Family of agent functionality a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Sleep,
    Checkin,
    TaskQueue,
    Job,
    Fs,
    Proc,
    ProcList,
    InjectDll,
    SpawnDll,
    Shellcode,
    Token,
    InlineExecute,
    AssemblyInlineExecute,
    AssemblyListVersions,
    Socket,
    Transfer,
    Config,
    Screenshot,
    Net,
    Pivot,
    Kerberos,
    Exit,
    /// Static command of a third-party agent.
    AgentCommand,
    /// Task queued by an extension command.
    ScriptCommand,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Checkin => "checkin",
            Self::TaskQueue => "task-queue",
            Self::Job => "job",
            Self::Fs => "fs",
            Self::Proc => "proc",
            Self::ProcList => "proc-list",
            Self::InjectDll => "inject-dll",
            Self::SpawnDll => "spawn-dll",
            Self::Shellcode => "shellcode",
            Self::Token => "token",
            Self::InlineExecute => "inline-execute",
            Self::AssemblyInlineExecute => "assembly-inline-execute",
            Self::AssemblyListVersions => "assembly-list-versions",
            Self::Socket => "socket",
            Self::Transfer => "transfer",
            Self::Config => "config",
            Self::Screenshot => "screenshot",
            Self::Net => "net",
            Self::Pivot => "pivot",
            Self::Kerberos => "kerberos",
            Self::Exit => "exit",
            Self::AgentCommand => "agent-command",
            Self::ScriptCommand => "script-command",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded task, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub kind: TaskKind,
    pub payload: String,
}

impl TaskRequest {
    /// Build a request whose payload is `fields` joined in order.
    pub fn new<S: AsRef<str>>(kind: TaskKind, fields: &[S]) -> Self {
        Self {
            kind,
            payload: join_fields(fields),
        }
    }

    /// Request with an empty payload.
    pub fn bare(kind: TaskKind) -> Self {
        Self {
            kind,
            payload: String::new(),
        }
    }

    /// Request with a payload that is not field separated.
    pub fn raw(kind: TaskKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Split the payload back into its fields.
    pub fn fields(&self) -> Vec<&str> {
        if self.payload.is_empty() {
            return Vec::new();
        }
        self.payload.split(FIELD_SEPARATOR).collect()
    }
}

pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut payload = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            payload.push(FIELD_SEPARATOR);
        }
        payload.push_str(field.as_ref());
    }
    payload
}

/// Standard base64 of `data`.
pub fn b64(data: impl AsRef<[u8]>) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Wire spelling of a boolean option.
pub fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_joined_in_order() {
        let req = TaskRequest::new(TaskKind::Sleep, &["10", "25"]);
        assert_eq!(req.payload, "10;25");
        assert_eq!(req.fields(), vec!["10", "25"]);
    }

    #[test]
    fn test_empty_fields_are_kept() {
        let req = TaskRequest::new(TaskKind::Fs, &["dir", "", "FALSE"]);
        assert_eq!(req.payload, "dir;;FALSE");
        assert!(TaskRequest::bare(TaskKind::Screenshot).fields().is_empty());
    }

    #[test]
    fn test_b64_hides_separator() {
        let encoded = b64("C:\\a;b");
        assert!(!encoded.contains(FIELD_SEPARATOR));
        assert_eq!(encoded, "QzpcYTti");
    }

    #[test]
    fn test_flags() {
        assert_eq!(flag(true), "TRUE");
        assert_eq!(flag(false), "FALSE");
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&TaskKind::AssemblyInlineExecute).unwrap();
        assert_eq!(json, "\"assembly-inline-execute\"");
        assert_eq!(TaskKind::AssemblyInlineExecute.as_str(), "assembly-inline-execute");
    }
}
