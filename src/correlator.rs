use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::command::IdSource;
use crate::error::TransportError;
use crate::transport::Transport;

const LOCAL_ID_LEN: usize = 8;

/// A task the console issued for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task_id: String,
    pub description: String,
    pub command_line: String,
    pub issued_at: DateTime<Utc>,
}

/// Maps task ids to the command that produced them so results arriving
/// later can be attributed.
#[derive(Debug, Default)]
pub struct TaskCorrelator {
    tasks: HashMap<String, TaskRecord>,
}

impl TaskCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Random alphanumeric id not yet used in this session.
    pub fn new_local_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(LOCAL_ID_LEN)
                .map(char::from)
                .collect();
            if !self.tasks.contains_key(&id) {
                return id;
            }
        }
    }

    /// Obtain an id for a new task from the source the command calls for.
    pub fn new_task_id(
        &self,
        source: IdSource,
        transport: &mut dyn Transport,
        description: &str,
    ) -> Result<String, TransportError> {
        match source {
            IdSource::Server => transport.request_description(description),
            IdSource::Local => Ok(self.new_local_id()),
        }
    }

    pub fn record(&mut self, task_id: &str, description: &str, command_line: &str) {
        debug!(task_id = %task_id, "recording task");
        self.tasks.insert(
            task_id.to_string(),
            TaskRecord {
                task_id: task_id.to_string(),
                description: description.to_string(),
                command_line: command_line.to_string(),
                issued_at: Utc::now(),
            },
        );
    }

    pub fn describe(&self, task_id: &str) -> Option<&str> {
        self.tasks.get(task_id).map(|t| t.description.as_str())
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskRecord> {
        self.tasks.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;

    #[test]
    fn test_local_ids_are_alphanumeric() {
        let correlator = TaskCorrelator::new();
        let id = correlator.new_local_id();
        assert_eq!(id.len(), LOCAL_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_record_and_describe() {
        let mut correlator = TaskCorrelator::new();
        assert!(correlator.is_empty());

        correlator.record("1a2b3c4d", "Tasked agent to sleep for 10 seconds", "sleep 10");
        assert_eq!(
            correlator.describe("1a2b3c4d"),
            Some("Tasked agent to sleep for 10 seconds")
        );
        assert_eq!(correlator.get("1a2b3c4d").unwrap().command_line, "sleep 10");
        assert_eq!(correlator.describe("ffffffff"), None);
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn test_id_sources() {
        let correlator = TaskCorrelator::new();
        let mut transport = LoopbackTransport::new();

        let server = correlator
            .new_task_id(IdSource::Server, &mut transport, "Tasked agent to list jobs")
            .unwrap();
        assert_eq!(transport.descriptions(), &[(server.clone(), "Tasked agent to list jobs".to_string())]);

        let local = correlator
            .new_task_id(IdSource::Local, &mut transport, "Tasked teamserver to list socks5 proxies")
            .unwrap();
        assert_ne!(local, server);
        assert_eq!(transport.descriptions().len(), 1);
    }
}
