use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    CoordinationMode, JsonMap, Message, Swarm, SwarmStatus, SwarmSummary, ThinkingFragment,
    ToolCall, Worker, WorkerStatus, WorkerSummary,
};
use crate::tracker::SwarmTracker;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Swarm not found: {0}")]
    SwarmNotFound(String),
    #[error("Worker not found: {0}")]
    WorkerNotFound(String),
}

/// Point-in-time view of a swarm with its workers' summary fields.
/// Thinking and message histories are excluded for size; fetch a
/// `WorkerSnapshot` for those.
#[derive(Debug, Clone, Serialize)]
pub struct SwarmSnapshot {
    pub swarm_id: String,
    pub session_id: String,
    pub mode: CoordinationMode,
    pub status: SwarmStatus,
    pub overall_progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: JsonMap,
    pub workers: Vec<WorkerSummary>,
}

impl SwarmSnapshot {
    fn from_swarm(swarm: Swarm) -> Self {
        Self {
            workers: swarm.worker_summaries(),
            swarm_id: swarm.swarm_id,
            session_id: swarm.session_id,
            mode: swarm.mode,
            status: swarm.status,
            overall_progress: swarm.overall_progress,
            created_at: swarm.created_at,
            started_at: swarm.started_at,
            completed_at: swarm.completed_at,
            metadata: swarm.metadata,
        }
    }
}

/// Full view of one worker. Thinking and message histories are included
/// on request only; `None` means "not requested", not "empty".
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub worker_id: String,
    pub worker_name: String,
    pub worker_type: String,
    pub role: String,
    pub status: WorkerStatus,
    pub progress: u8,
    pub current_action: Option<String>,
    pub task_description: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_fragments: Option<Vec<ThinkingFragment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

impl WorkerSnapshot {
    fn from_worker(worker: Worker, include_thinking: bool, include_messages: bool) -> Self {
        Self {
            worker_id: worker.worker_id,
            worker_name: worker.worker_name,
            worker_type: worker.worker_type,
            role: worker.role,
            status: worker.status,
            progress: worker.progress,
            current_action: worker.current_action,
            task_description: worker.task_description,
            error: worker.error,
            started_at: worker.started_at,
            completed_at: worker.completed_at,
            tool_calls: worker.tool_calls,
            thinking_fragments: include_thinking.then_some(worker.thinking_fragments),
            messages: include_messages.then_some(worker.messages),
        }
    }
}

/// Read-only facade over the tracker for request/response callers. Holds no
/// state of its own; every snapshot is one full, non-torn tracker read.
#[derive(Clone)]
pub struct QueryService {
    tracker: Arc<SwarmTracker>,
}

impl QueryService {
    pub fn new(tracker: Arc<SwarmTracker>) -> Self {
        Self { tracker }
    }

    pub fn get_swarm_status(&self, swarm_id: &str) -> Result<SwarmSnapshot, QueryError> {
        self.tracker
            .get_swarm(swarm_id)
            .map(SwarmSnapshot::from_swarm)
            .ok_or_else(|| QueryError::SwarmNotFound(swarm_id.to_string()))
    }

    pub fn get_worker_detail(
        &self,
        swarm_id: &str,
        worker_id: &str,
        include_thinking: bool,
        include_messages: bool,
    ) -> Result<WorkerSnapshot, QueryError> {
        let swarm = self
            .tracker
            .get_swarm(swarm_id)
            .ok_or_else(|| QueryError::SwarmNotFound(swarm_id.to_string()))?;
        let worker = swarm
            .worker(worker_id)
            .cloned()
            .ok_or_else(|| QueryError::WorkerNotFound(worker_id.to_string()))?;
        Ok(WorkerSnapshot::from_worker(
            worker,
            include_thinking,
            include_messages,
        ))
    }

    pub fn list_workers(&self, swarm_id: &str) -> Result<Vec<WorkerSummary>, QueryError> {
        self.tracker
            .get_swarm(swarm_id)
            .map(|swarm| swarm.worker_summaries())
            .ok_or_else(|| QueryError::SwarmNotFound(swarm_id.to_string()))
    }

    pub fn list_swarms(&self) -> Vec<SwarmSummary> {
        self.tracker.list_swarms()
    }
}
