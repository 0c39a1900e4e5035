use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque caller-supplied annotations (swarm metadata, tool-call params/results).
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// How the workers of a swarm are coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinationMode {
    Sequential,
    Parallel,
    Pipeline,
    Hierarchical,
}

/// Swarm lifecycle. Moves forward only; `Completed`/`Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmStatus {
    Initializing,
    Executing,
    Aggregating,
    Completed,
    Failed,
}

impl SwarmStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwarmStatus::Completed | SwarmStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SwarmStatus::Initializing => 0,
            SwarmStatus::Executing => 1,
            SwarmStatus::Aggregating => 2,
            SwarmStatus::Completed | SwarmStatus::Failed => 3,
        }
    }

    /// Forward-only status ordering: a swarm never regresses.
    pub fn can_advance_to(&self, next: SwarmStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Terminal outcome accepted by `complete_swarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwarmOutcome {
    Completed,
    Failed,
}

impl From<SwarmOutcome> for SwarmStatus {
    fn from(outcome: SwarmOutcome) -> Self {
        match outcome {
            SwarmOutcome::Completed => SwarmStatus::Completed,
            SwarmOutcome::Failed => SwarmStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerStatus::Completed | WorkerStatus::Failed | WorkerStatus::Cancelled
        )
    }
}

/// Terminal outcome accepted by `complete_worker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl From<WorkerOutcome> for WorkerStatus {
    fn from(outcome: WorkerOutcome) -> Self {
        match outcome {
            WorkerOutcome::Completed => WorkerStatus::Completed,
            WorkerOutcome::Failed => WorkerStatus::Failed,
            WorkerOutcome::Cancelled => WorkerStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One invocation of an external capability by a worker.
///
/// Keyed by `tool_call_id` within its worker; updates to the same id are
/// in-place status transitions, never duplicate entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub status: ToolCallStatus,
    pub input_params: JsonMap,
    pub output_result: Option<JsonMap>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// One block of incremental reasoning text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingFragment {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub token_count: Option<u32>,
}

/// One conversational turn attributed to a worker. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub tool_call_id: Option<String>,
}

/// One subtask executor within a swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub worker_name: String,
    /// Categorizes the execution backend (open set, caller-defined).
    pub worker_type: String,
    pub role: String,
    pub status: WorkerStatus,
    /// 0-100, monotonically non-decreasing until terminal.
    pub progress: u8,
    pub current_action: Option<String>,
    pub task_description: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tool_calls: Vec<ToolCall>,
    pub thinking_fragments: Vec<ThinkingFragment>,
    pub messages: Vec<Message>,
}

impl Worker {
    pub fn tool_call(&self, tool_call_id: &str) -> Option<&ToolCall> {
        self.tool_calls.iter().find(|tc| tc.tool_call_id == tool_call_id)
    }

    pub(crate) fn tool_call_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolCall> {
        self.tool_calls.iter_mut().find(|tc| tc.tool_call_id == tool_call_id)
    }

    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            worker_id: self.worker_id.clone(),
            worker_name: self.worker_name.clone(),
            worker_type: self.worker_type.clone(),
            role: self.role.clone(),
            status: self.status,
            progress: self.progress,
            current_action: self.current_action.clone(),
            error: self.error.clone(),
        }
    }
}

/// Denormalized worker fields for listings and status-update events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub worker_name: String,
    pub worker_type: String,
    pub role: String,
    pub status: WorkerStatus,
    pub progress: u8,
    pub current_action: Option<String>,
    pub error: Option<String>,
}

/// One coordinated multi-worker execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swarm {
    pub swarm_id: String,
    pub session_id: String,
    pub mode: CoordinationMode,
    pub status: SwarmStatus,
    /// Rounded mean of all workers' progress. Derived, never set directly.
    pub overall_progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: JsonMap,
    /// Insertion order = creation order. Append-only.
    pub workers: Vec<Worker>,
}

impl Swarm {
    pub fn worker(&self, worker_id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.worker_id == worker_id)
    }

    /// Recompute `overall_progress` from the workers. Zero workers means 0.
    pub(crate) fn recompute_progress(&mut self) {
        if self.workers.is_empty() {
            self.overall_progress = 0;
            return;
        }
        let total: u32 = self.workers.iter().map(|w| w.progress as u32).sum();
        let count = self.workers.len() as u32;
        // round(mean) with integer arithmetic
        self.overall_progress = ((total + count / 2) / count) as u8;
    }

    pub fn worker_summaries(&self) -> Vec<WorkerSummary> {
        self.workers.iter().map(Worker::summary).collect()
    }

    pub fn summary(&self) -> SwarmSummary {
        SwarmSummary {
            swarm_id: self.swarm_id.clone(),
            session_id: self.session_id.clone(),
            mode: self.mode,
            status: self.status,
            overall_progress: self.overall_progress,
            worker_count: self.workers.len(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Summary of a swarm for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSummary {
    pub swarm_id: String,
    pub session_id: String,
    pub mode: CoordinationMode,
    pub status: SwarmStatus,
    pub overall_progress: u8,
    pub worker_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
