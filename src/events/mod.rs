mod emitter;

pub use emitter::{EmitterConfig, SwarmEventEmitter};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::model::{
    CoordinationMode, JsonMap, Message, MessageRole, Swarm, SwarmStatus, ToolCall, Worker,
    WorkerStatus, WorkerSummary,
};
use crate::tracker::ThinkingUpdate;

/// Outbound event record. Payloads are denormalized so a consumer needs no
/// further lookup; `SwarmStatusUpdate` carries the full worker summary list
/// so any single event is enough to resynchronize.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SwarmEvent {
    SwarmCreated {
        swarm_id: String,
        session_id: String,
        mode: CoordinationMode,
        metadata: JsonMap,
        timestamp: DateTime<Utc>,
    },
    SwarmStatusUpdate {
        swarm_id: String,
        status: SwarmStatus,
        overall_progress: u8,
        workers: Vec<WorkerSummary>,
        timestamp: DateTime<Utc>,
    },
    SwarmCompleted {
        swarm_id: String,
        status: SwarmStatus,
        overall_progress: u8,
        timestamp: DateTime<Utc>,
    },
    WorkerStarted {
        swarm_id: String,
        worker_id: String,
        worker_name: String,
        worker_type: String,
        role: String,
        task_description: String,
        timestamp: DateTime<Utc>,
    },
    WorkerProgress {
        swarm_id: String,
        worker_id: String,
        progress: u8,
        current_action: Option<String>,
        timestamp: DateTime<Utc>,
    },
    WorkerThinking {
        swarm_id: String,
        worker_id: String,
        block_index: usize,
        content: String,
        token_count: Option<u32>,
        timestamp: DateTime<Utc>,
    },
    WorkerToolCall {
        swarm_id: String,
        worker_id: String,
        tool_call: ToolCall,
        timestamp: DateTime<Utc>,
    },
    WorkerMessage {
        swarm_id: String,
        worker_id: String,
        role: MessageRole,
        content: String,
        tool_call_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    WorkerCompleted {
        swarm_id: String,
        worker_id: String,
        status: WorkerStatus,
        progress: u8,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// Key under which throttled events coalesce, last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ThrottleKey {
    SwarmStatus(String),
    WorkerProgress(String, String),
    /// The block index keeps coalescing within one logical fragment; a new
    /// reasoning block is a new key and is never superseded by it.
    WorkerThinking(String, String, usize),
}

impl SwarmEvent {
    pub fn swarm_created(swarm: &Swarm) -> Self {
        SwarmEvent::SwarmCreated {
            swarm_id: swarm.swarm_id.clone(),
            session_id: swarm.session_id.clone(),
            mode: swarm.mode,
            metadata: swarm.metadata.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn swarm_status(swarm: &Swarm) -> Self {
        SwarmEvent::SwarmStatusUpdate {
            swarm_id: swarm.swarm_id.clone(),
            status: swarm.status,
            overall_progress: swarm.overall_progress,
            workers: swarm.worker_summaries(),
            timestamp: Utc::now(),
        }
    }

    pub fn swarm_completed(swarm: &Swarm) -> Self {
        SwarmEvent::SwarmCompleted {
            swarm_id: swarm.swarm_id.clone(),
            status: swarm.status,
            overall_progress: swarm.overall_progress,
            timestamp: Utc::now(),
        }
    }

    pub fn worker_started(swarm_id: &str, worker: &Worker) -> Self {
        SwarmEvent::WorkerStarted {
            swarm_id: swarm_id.to_string(),
            worker_id: worker.worker_id.clone(),
            worker_name: worker.worker_name.clone(),
            worker_type: worker.worker_type.clone(),
            role: worker.role.clone(),
            task_description: worker.task_description.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn worker_progress(swarm_id: &str, worker: &Worker) -> Self {
        SwarmEvent::WorkerProgress {
            swarm_id: swarm_id.to_string(),
            worker_id: worker.worker_id.clone(),
            progress: worker.progress,
            current_action: worker.current_action.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn worker_thinking(swarm_id: &str, worker_id: &str, update: &ThinkingUpdate) -> Self {
        SwarmEvent::WorkerThinking {
            swarm_id: swarm_id.to_string(),
            worker_id: worker_id.to_string(),
            block_index: update.block_index,
            content: update.fragment.content.clone(),
            token_count: update.fragment.token_count,
            timestamp: Utc::now(),
        }
    }

    pub fn worker_tool_call(swarm_id: &str, worker_id: &str, tool_call: &ToolCall) -> Self {
        SwarmEvent::WorkerToolCall {
            swarm_id: swarm_id.to_string(),
            worker_id: worker_id.to_string(),
            tool_call: tool_call.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn worker_message(swarm_id: &str, worker_id: &str, message: &Message) -> Self {
        SwarmEvent::WorkerMessage {
            swarm_id: swarm_id.to_string(),
            worker_id: worker_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            tool_call_id: message.tool_call_id.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn worker_completed(swarm_id: &str, worker: &Worker) -> Self {
        SwarmEvent::WorkerCompleted {
            swarm_id: swarm_id.to_string(),
            worker_id: worker.worker_id.clone(),
            status: worker.status,
            progress: worker.progress,
            error: worker.error.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Stable wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SwarmEvent::SwarmCreated { .. } => "swarm-created",
            SwarmEvent::SwarmStatusUpdate { .. } => "swarm-status-update",
            SwarmEvent::SwarmCompleted { .. } => "swarm-completed",
            SwarmEvent::WorkerStarted { .. } => "worker-started",
            SwarmEvent::WorkerProgress { .. } => "worker-progress",
            SwarmEvent::WorkerThinking { .. } => "worker-thinking",
            SwarmEvent::WorkerToolCall { .. } => "worker-tool-call",
            SwarmEvent::WorkerMessage { .. } => "worker-message",
            SwarmEvent::WorkerCompleted { .. } => "worker-completed",
        }
    }

    /// JSON payload of the event (the fields, without the kind).
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Low-frequency, high-significance transitions bypass throttling.
    pub fn is_priority(&self) -> bool {
        matches!(
            self,
            SwarmEvent::SwarmCreated { .. }
                | SwarmEvent::SwarmCompleted { .. }
                | SwarmEvent::WorkerStarted { .. }
                | SwarmEvent::WorkerCompleted { .. }
                | SwarmEvent::WorkerToolCall { .. }
        )
    }

    pub(crate) fn throttle_key(&self) -> Option<ThrottleKey> {
        match self {
            SwarmEvent::SwarmStatusUpdate { swarm_id, .. } => {
                Some(ThrottleKey::SwarmStatus(swarm_id.clone()))
            }
            SwarmEvent::WorkerProgress { swarm_id, worker_id, .. } => Some(
                ThrottleKey::WorkerProgress(swarm_id.clone(), worker_id.clone()),
            ),
            SwarmEvent::WorkerThinking { swarm_id, worker_id, block_index, .. } => {
                Some(ThrottleKey::WorkerThinking(
                    swarm_id.clone(),
                    worker_id.clone(),
                    *block_index,
                ))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Delivery boundary. The transport (SSE, WebSocket, message bus) lives
/// behind this; the emitter never retries a failed delivery.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: SwarmEvent) -> BoxFuture<'static, Result<(), SinkError>>;
}

/// Fan-out sink over a tokio broadcast channel. Send errors mean no
/// subscriber is listening, which is not a delivery failure.
pub struct BroadcastSink {
    tx: broadcast::Sender<SwarmEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn sender(&self) -> broadcast::Sender<SwarmEvent> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn deliver(&self, event: SwarmEvent) -> BoxFuture<'static, Result<(), SinkError>> {
        let _ = self.tx.send(event);
        Box::pin(futures::future::ready(Ok(())))
    }
}
