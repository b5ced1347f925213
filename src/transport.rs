use tracing::debug;
use uuid::Uuid;

use crate::error::TransportError;
use crate::wire::TaskRequest;

/// Channel between the console and the teamserver.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Announce a new task; the teamserver answers with the task id it
    /// assigned and echoes the description into every operator's transcript.
    fn request_description(&mut self, description: &str) -> Result<String, TransportError>;

    /// Queue an encoded task for the agent.
    fn submit(&mut self, task_id: &str, request: &TaskRequest) -> Result<(), TransportError>;
}

/// Eight lowercase hex characters, the shape of a teamserver task id.
pub fn server_task_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Transport that keeps everything in memory.
///
/// Used when the console runs without a broker and in tests.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    descriptions: Vec<(String, String)>,
    submitted: Vec<(String, TaskRequest)>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(task id, description)` pairs in announcement order.
    pub fn descriptions(&self) -> &[(String, String)] {
        &self.descriptions
    }

    /// `(task id, request)` pairs in submission order.
    pub fn submitted(&self) -> &[(String, TaskRequest)] {
        &self.submitted
    }
}

impl Transport for LoopbackTransport {
    fn request_description(&mut self, description: &str) -> Result<String, TransportError> {
        let task_id = server_task_id();
        self.descriptions.push((task_id.clone(), description.to_string()));
        Ok(task_id)
    }

    fn submit(&mut self, task_id: &str, request: &TaskRequest) -> Result<(), TransportError> {
        debug!(task_id = %task_id, kind = %request.kind, "loopback submit");
        self.submitted.push((task_id.to_string(), request.clone()));
        Ok(())
    }
}
