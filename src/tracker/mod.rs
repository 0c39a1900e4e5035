mod thinking;

pub use thinking::{fold_fragment, ThinkingUpdate};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    CoordinationMode, JsonMap, Message, MessageRole, Swarm, SwarmOutcome, SwarmStatus,
    SwarmSummary, ToolCall, ToolCallStatus, Worker, WorkerOutcome, WorkerStatus,
};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("Swarm not found: {0}")]
    SwarmNotFound(String),
    #[error("Worker not found: {0}")]
    WorkerNotFound(String),
    #[error("Tool call not found: {0}")]
    ToolCallNotFound(String),
    #[error("Progress {requested} regresses below current {current}")]
    InvalidProgress { current: u8, requested: u8 },
    #[error("{kind} {id} is already terminal")]
    TerminalState { kind: &'static str, id: String },
}

/// Number of terminal swarms retained before the oldest are evicted.
pub const DEFAULT_MAX_COMPLETED: usize = 100;

/// Single source of truth for swarm and worker state.
///
/// The outer map is locked only long enough to resolve the per-swarm cell;
/// the cell's mutex serializes every read and write of that swarm, so
/// mutations for distinct swarms never contend and a snapshot is always a
/// full pre- or post-mutation view.
pub struct SwarmTracker {
    swarms: RwLock<HashMap<String, Arc<Mutex<Swarm>>>>,
    max_completed: usize,
}

impl SwarmTracker {
    pub fn new(max_completed: usize) -> Self {
        Self {
            swarms: RwLock::new(HashMap::new()),
            max_completed,
        }
    }

    fn cell(&self, swarm_id: &str) -> Result<Arc<Mutex<Swarm>>, TrackerError> {
        self.swarms
            .read()
            .get(swarm_id)
            .cloned()
            .ok_or_else(|| TrackerError::SwarmNotFound(swarm_id.to_string()))
    }

    /// Register a new swarm. `swarm_id` is generated when not supplied.
    pub fn create_swarm(
        &self,
        swarm_id: Option<String>,
        session_id: &str,
        mode: CoordinationMode,
        metadata: JsonMap,
    ) -> Result<Swarm, TrackerError> {
        let swarm_id = swarm_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut swarms = self.swarms.write();
        if swarms.contains_key(&swarm_id) {
            return Err(TrackerError::DuplicateId {
                kind: "swarm",
                id: swarm_id,
            });
        }

        let swarm = Swarm {
            swarm_id: swarm_id.clone(),
            session_id: session_id.to_string(),
            mode,
            status: SwarmStatus::Initializing,
            overall_progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata,
            workers: Vec::new(),
        };

        tracing::info!("Created swarm {} (session {}, mode {:?})", swarm_id, session_id, mode);
        swarms.insert(swarm_id, Arc::new(Mutex::new(swarm.clone())));
        Ok(swarm)
    }

    /// Start a worker. The first start moves an `Initializing` swarm to
    /// `Executing`.
    pub fn start_worker(
        &self,
        swarm_id: &str,
        worker_id: &str,
        worker_name: &str,
        worker_type: &str,
        role: &str,
        task_description: &str,
    ) -> Result<Worker, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();

        if swarm.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                kind: "swarm",
                id: swarm_id.to_string(),
            });
        }
        if swarm.worker(worker_id).is_some() {
            return Err(TrackerError::DuplicateId {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }

        let now = Utc::now();
        if swarm.status == SwarmStatus::Initializing {
            swarm.status = SwarmStatus::Executing;
            swarm.started_at = Some(now);
        }

        let worker = Worker {
            worker_id: worker_id.to_string(),
            worker_name: worker_name.to_string(),
            worker_type: worker_type.to_string(),
            role: role.to_string(),
            status: WorkerStatus::Running,
            progress: 0,
            current_action: None,
            task_description: task_description.to_string(),
            error: None,
            started_at: now,
            completed_at: None,
            tool_calls: Vec::new(),
            thinking_fragments: Vec::new(),
            messages: Vec::new(),
        };

        tracing::info!("Started worker {} ({}) in swarm {}", worker_id, role, swarm_id);
        swarm.workers.push(worker.clone());
        swarm.recompute_progress();
        Ok(worker)
    }

    /// Advance a worker's progress. Regressions are rejected; values above
    /// 100 clamp to 100.
    pub fn update_worker_progress(
        &self,
        swarm_id: &str,
        worker_id: &str,
        progress: u8,
        current_action: Option<&str>,
    ) -> Result<Worker, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();
        let idx = self.worker_index(&swarm, worker_id)?;

        let worker = &mut swarm.workers[idx];
        if worker.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }

        let progress = progress.min(100);
        if progress < worker.progress {
            return Err(TrackerError::InvalidProgress {
                current: worker.progress,
                requested: progress,
            });
        }

        worker.progress = progress;
        if let Some(action) = current_action {
            worker.current_action = Some(action.to_string());
        }

        swarm.recompute_progress();
        Ok(swarm.workers[idx].clone())
    }

    /// Fold a raw thinking delta into the worker's fragment list, merging
    /// prefix-extensions of the previous fragment in place.
    pub fn add_thinking(
        &self,
        swarm_id: &str,
        worker_id: &str,
        content: &str,
        token_count: Option<u32>,
    ) -> Result<ThinkingUpdate, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();
        let idx = self.worker_index(&swarm, worker_id)?;

        let worker = &mut swarm.workers[idx];
        if worker.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }

        Ok(fold_fragment(&mut worker.thinking_fragments, content, token_count))
    }

    /// Record a tool invocation with status `Pending`.
    pub fn add_tool_call(
        &self,
        swarm_id: &str,
        worker_id: &str,
        tool_call_id: &str,
        tool_name: &str,
        input_params: JsonMap,
    ) -> Result<ToolCall, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();
        let idx = self.worker_index(&swarm, worker_id)?;

        let worker = &mut swarm.workers[idx];
        if worker.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }
        if worker.tool_call(tool_call_id).is_some() {
            return Err(TrackerError::DuplicateId {
                kind: "tool call",
                id: tool_call_id.to_string(),
            });
        }

        let tool_call = ToolCall {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            status: ToolCallStatus::Pending,
            input_params,
            output_result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        };

        worker.tool_calls.push(tool_call.clone());
        Ok(tool_call)
    }

    /// Resolve a tool call in place: `Failed` when an error is given,
    /// `Completed` otherwise. Derives `duration_ms`.
    pub fn update_tool_call_result(
        &self,
        swarm_id: &str,
        worker_id: &str,
        tool_call_id: &str,
        result: Option<JsonMap>,
        error: Option<&str>,
    ) -> Result<ToolCall, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();
        let idx = self.worker_index(&swarm, worker_id)?;

        let worker = &mut swarm.workers[idx];
        if worker.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }

        let tool_call = worker
            .tool_call_mut(tool_call_id)
            .ok_or_else(|| TrackerError::ToolCallNotFound(tool_call_id.to_string()))?;

        let now = Utc::now();
        if error.is_some() {
            tool_call.status = ToolCallStatus::Failed;
            tool_call.output_result = None;
        } else {
            tool_call.status = ToolCallStatus::Completed;
            tool_call.output_result = result;
        }
        tool_call.error = error.map(str::to_string);
        tool_call.completed_at = Some(now);
        tool_call.duration_ms = Some((now - tool_call.started_at).num_milliseconds());

        Ok(tool_call.clone())
    }

    /// Append a conversational turn to the worker.
    pub fn add_message(
        &self,
        swarm_id: &str,
        worker_id: &str,
        role: MessageRole,
        content: &str,
        tool_call_id: Option<&str>,
    ) -> Result<Message, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();
        let idx = self.worker_index(&swarm, worker_id)?;

        let worker = &mut swarm.workers[idx];
        if worker.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }

        let message = Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            tool_call_id: tool_call_id.map(str::to_string),
        };

        worker.messages.push(message.clone());
        Ok(message)
    }

    /// Move a worker to a terminal status. Re-completing with the same
    /// outcome is an idempotent no-op returning the existing state; a
    /// conflicting terminal outcome is an error. When the last running
    /// worker finishes, an `Executing` swarm moves to `Aggregating`.
    pub fn complete_worker(
        &self,
        swarm_id: &str,
        worker_id: &str,
        outcome: WorkerOutcome,
        error: Option<&str>,
    ) -> Result<Worker, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let mut swarm = cell.lock();
        let idx = self.worker_index(&swarm, worker_id)?;

        let status = WorkerStatus::from(outcome);
        let worker = &mut swarm.workers[idx];
        if worker.status.is_terminal() {
            if worker.status == status {
                return Ok(worker.clone());
            }
            return Err(TrackerError::TerminalState {
                kind: "worker",
                id: worker_id.to_string(),
            });
        }

        worker.status = status;
        worker.completed_at = Some(Utc::now());
        if status == WorkerStatus::Completed {
            worker.progress = 100;
        }
        if let Some(error) = error {
            worker.error = Some(error.to_string());
        }

        tracing::info!("Worker {} in swarm {} finished as {:?}", worker_id, swarm_id, status);
        swarm.recompute_progress();

        if swarm.status == SwarmStatus::Executing
            && swarm.workers.iter().all(|w| w.status.is_terminal())
        {
            tracing::info!("All workers terminal, swarm {} aggregating", swarm_id);
            swarm.status = SwarmStatus::Aggregating;
        }

        Ok(swarm.workers[idx].clone())
    }

    /// Move a swarm to a terminal status. Tolerates force-completion with
    /// live workers (logged), and is idempotent for the same outcome.
    pub fn complete_swarm(
        &self,
        swarm_id: &str,
        outcome: SwarmOutcome,
    ) -> Result<Swarm, TrackerError> {
        let cell = self.cell(swarm_id)?;
        let snapshot = {
            let mut swarm = cell.lock();
            let status = SwarmStatus::from(outcome);
            if swarm.status.is_terminal() {
                if swarm.status == status {
                    return Ok(swarm.clone());
                }
                return Err(TrackerError::TerminalState {
                    kind: "swarm",
                    id: swarm_id.to_string(),
                });
            }

            let live = swarm
                .workers
                .iter()
                .filter(|w| !w.status.is_terminal())
                .count();
            if live > 0 {
                tracing::warn!(
                    "Completing swarm {} as {:?} with {} non-terminal workers",
                    swarm_id,
                    status,
                    live
                );
            }

            swarm.status = status;
            swarm.completed_at = Some(Utc::now());
            tracing::info!("Swarm {} finished as {:?}", swarm_id, status);
            swarm.clone()
        };

        self.evict_completed();
        Ok(snapshot)
    }

    /// Full snapshot of a swarm, or `None` if unknown.
    pub fn get_swarm(&self, swarm_id: &str) -> Option<Swarm> {
        let cell = self.swarms.read().get(swarm_id).cloned()?;
        let swarm = cell.lock();
        Some(swarm.clone())
    }

    /// Full snapshot of one worker, or `None` if either id is unknown.
    pub fn get_worker(&self, swarm_id: &str, worker_id: &str) -> Option<Worker> {
        let cell = self.swarms.read().get(swarm_id).cloned()?;
        let swarm = cell.lock();
        swarm.worker(worker_id).cloned()
    }

    /// Summaries of all tracked swarms, oldest first.
    pub fn list_swarms(&self) -> Vec<SwarmSummary> {
        let cells: Vec<Arc<Mutex<Swarm>>> = self.swarms.read().values().cloned().collect();
        let mut summaries: Vec<SwarmSummary> =
            cells.iter().map(|cell| cell.lock().summary()).collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    fn worker_index(&self, swarm: &Swarm, worker_id: &str) -> Result<usize, TrackerError> {
        swarm
            .workers
            .iter()
            .position(|w| w.worker_id == worker_id)
            .ok_or_else(|| TrackerError::WorkerNotFound(worker_id.to_string()))
    }

    /// Drop the oldest terminal swarms beyond the retention cap. Live swarms
    /// are never evicted.
    fn evict_completed(&self) {
        let mut swarms = self.swarms.write();
        let mut terminal: Vec<(String, chrono::DateTime<Utc>)> = swarms
            .iter()
            .filter_map(|(id, cell)| {
                let swarm = cell.lock();
                if swarm.status.is_terminal() {
                    Some((id.clone(), swarm.completed_at.unwrap_or(swarm.created_at)))
                } else {
                    None
                }
            })
            .collect();

        if terminal.len() <= self.max_completed {
            return;
        }

        terminal.sort_by_key(|(_, completed_at)| *completed_at);
        let excess = terminal.len() - self.max_completed;
        for (id, _) in terminal.into_iter().take(excess) {
            swarms.remove(&id);
            tracing::info!("Evicted completed swarm {}", id);
        }
    }
}

impl Default for SwarmTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPLETED)
    }
}
