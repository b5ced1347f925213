use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::transport::{server_task_id, Transport};
use crate::wire::{TaskKind, TaskRequest};

/// Task announcement or submission published to the teamserver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub agent_id: String,
    pub task_id: String,
    /// `None` for a description announcement
    pub kind: Option<TaskKind>,
    pub payload: String,
    pub timestamp: i64,
}

/// Task output relayed back by the teamserver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    pub task_id: String,
    pub output: String,
}

pub fn tasks_topic(agent_id: &str) -> String {
    format!("console/agents/{}/tasks", agent_id)
}

pub fn results_topic(agent_id: &str) -> String {
    format!("console/agents/{}/results", agent_id)
}

/// [`Transport`] over an MQTT broker
pub struct MqttTransport {
    client: AsyncClient,
    agent_id: String,
}

impl MqttTransport {
    pub fn new(config: &MqttConfig, agent_id: &str) -> (Self, EventLoop) {
        let mut mqttoptions =
            MqttOptions::new(format!("console-{}", agent_id), &config.broker, config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);

        (
            Self {
                client,
                agent_id: agent_id.to_string(),
            },
            eventloop,
        )
    }

    /// Subscribe to task results for this session
    pub async fn subscribe(&self) -> Result<(), rumqttc::ClientError> {
        self.client
            .subscribe(results_topic(&self.agent_id), QoS::AtLeastOnce)
            .await?;

        info!(agent_id = %self.agent_id, "subscribed to MQTT topics");
        Ok(())
    }

    fn publish(&self, envelope: &TaskEnvelope) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(envelope)?;
        // the event loop is polled by the caller; queue without awaiting
        self.client
            .try_publish(tasks_topic(&self.agent_id), QoS::AtLeastOnce, false, payload)
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        debug!(task_id = %envelope.task_id, "queued envelope");
        Ok(())
    }

    fn envelope(&self, task_id: &str, kind: Option<TaskKind>, payload: &str) -> TaskEnvelope {
        TaskEnvelope {
            agent_id: self.agent_id.clone(),
            task_id: task_id.to_string(),
            kind,
            payload: payload.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl Transport for MqttTransport {
    fn request_description(&mut self, description: &str) -> Result<String, TransportError> {
        let task_id = server_task_id();
        self.publish(&self.envelope(&task_id, None, description))?;
        Ok(task_id)
    }

    fn submit(&mut self, task_id: &str, request: &TaskRequest) -> Result<(), TransportError> {
        self.publish(&self.envelope(task_id, Some(request.kind), &request.payload))
    }
}

/// Parse an incoming MQTT message as a ResultMessage
pub fn parse_result(payload: &[u8]) -> Result<ResultMessage, serde_json::Error> {
    serde_json::from_slice(payload)
}
