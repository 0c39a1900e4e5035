use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{EventSink, SinkError, SwarmEvent, ThrottleKey};

#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Minimum interval between deliveries for one throttle key.
    pub throttle: Duration,
    /// How often the background task checks for due pending events.
    pub flush_tick: Duration,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(200),
            flush_tick: Duration::from_millis(100),
        }
    }
}

#[derive(Default)]
struct ThrottleState {
    last_emit: HashMap<ThrottleKey, Instant>,
    /// At most one superseding event per key, last-write-wins.
    pending: HashMap<ThrottleKey, SwarmEvent>,
}

struct FlushTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Shapes the outbound event rate: priority events pass straight through,
/// throttled kinds are limited to one delivery per key per interval with
/// superseded events coalesced away. A periodic flush task bounds the
/// latency of any pending event to one throttle interval.
///
/// Operates purely on entity snapshots handed in after a tracker mutation;
/// it never touches the tracker's locks.
pub struct SwarmEventEmitter {
    sink: Arc<dyn EventSink>,
    config: EmitterConfig,
    state: Arc<Mutex<ThrottleState>>,
    flush_task: Mutex<Option<FlushTask>>,
}

impl SwarmEventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, config: EmitterConfig) -> Self {
        Self {
            sink,
            config,
            state: Arc::new(Mutex::new(ThrottleState::default())),
            flush_task: Mutex::new(None),
        }
    }

    /// Emit one event. Priority events are delivered before this returns;
    /// throttled events are delivered now if their key's interval has
    /// elapsed, otherwise parked (superseding any earlier pending event for
    /// the key) for the flush task. Only delivery errors propagate.
    pub async fn emit(&self, event: SwarmEvent) -> Result<(), SinkError> {
        let Some(key) = event.throttle_key() else {
            return self.sink.deliver(event).await;
        };

        {
            let mut state = self.state.lock();
            let now = Instant::now();
            let due = state
                .last_emit
                .get(&key)
                .map_or(true, |last| now.duration_since(*last) >= self.config.throttle);
            if !due {
                state.pending.insert(key, event);
                return Ok(());
            }
            state.last_emit.insert(key.clone(), now);
            state.pending.remove(&key);
        }

        self.sink.deliver(event).await
    }

    /// Launch the periodic flush task. Calling again while running is a
    /// no-op.
    pub fn start(&self) {
        let mut task = self.flush_task.lock();
        if task.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let throttle = self.config.throttle;
        let flush_tick = self.config.flush_tick;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let batch = collect_due(&state, throttle);
                        deliver_batch(&sink, batch).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *task = Some(FlushTask {
            shutdown: shutdown_tx,
            handle,
        });
    }

    /// Stop the flush task and drain every still-pending event. Idempotent,
    /// and safe to call without a prior `start()`.
    pub async fn stop(&self) {
        let task = self.flush_task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            let _ = task.handle.await;
        }

        let batch: Vec<SwarmEvent> = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let pending = std::mem::take(&mut state.pending);
            let mut batch = Vec::with_capacity(pending.len());
            for (key, event) in pending {
                state.last_emit.insert(key, now);
                batch.push(event);
            }
            batch
        };
        deliver_batch(&self.sink, batch).await;
    }
}

/// Pull out every pending event whose interval has elapsed. The lock is
/// released before anything is delivered.
fn collect_due(state: &Mutex<ThrottleState>, throttle: Duration) -> Vec<SwarmEvent> {
    let mut state = state.lock();
    let now = Instant::now();
    let due_keys: Vec<ThrottleKey> = state
        .pending
        .keys()
        .filter(|key| {
            state
                .last_emit
                .get(*key)
                .map_or(true, |last| now.duration_since(*last) >= throttle)
        })
        .cloned()
        .collect();

    let mut batch = Vec::with_capacity(due_keys.len());
    for key in due_keys {
        if let Some(event) = state.pending.remove(&key) {
            state.last_emit.insert(key, now);
            batch.push(event);
        }
    }
    batch
}

async fn deliver_batch(sink: &Arc<dyn EventSink>, batch: Vec<SwarmEvent>) {
    for event in batch {
        if let Err(e) = sink.deliver(event).await {
            tracing::error!("Event delivery failed during flush: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::future::BoxFuture;

    struct RecordingSink {
        events: Arc<Mutex<Vec<SwarmEvent>>>,
    }

    impl RecordingSink {
        fn new() -> (Arc<Self>, Arc<Mutex<Vec<SwarmEvent>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    events: Arc::clone(&events),
                }),
                events,
            )
        }
    }

    impl EventSink for RecordingSink {
        fn deliver(&self, event: SwarmEvent) -> BoxFuture<'static, Result<(), SinkError>> {
            self.events.lock().push(event);
            Box::pin(futures::future::ready(Ok(())))
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn deliver(&self, _event: SwarmEvent) -> BoxFuture<'static, Result<(), SinkError>> {
            Box::pin(futures::future::ready(Err(SinkError::Delivery(
                "stream closed".to_string(),
            ))))
        }
    }

    fn progress_event(progress: u8) -> SwarmEvent {
        SwarmEvent::WorkerProgress {
            swarm_id: "s1".into(),
            worker_id: "w1".into(),
            progress,
            current_action: None,
            timestamp: Utc::now(),
        }
    }

    fn tool_call_event() -> SwarmEvent {
        SwarmEvent::WorkerToolCall {
            swarm_id: "s1".into(),
            worker_id: "w1".into(),
            tool_call: crate::model::ToolCall {
                tool_call_id: "tc1".into(),
                tool_name: "grep".into(),
                status: crate::model::ToolCallStatus::Pending,
                input_params: crate::model::JsonMap::new(),
                output_result: None,
                error: None,
                started_at: Utc::now(),
                completed_at: None,
                duration_ms: None,
            },
            timestamp: Utc::now(),
        }
    }

    fn thinking_event(block_index: usize, content: &str) -> SwarmEvent {
        SwarmEvent::WorkerThinking {
            swarm_id: "s1".into(),
            worker_id: "w1".into(),
            block_index,
            content: content.into(),
            token_count: None,
            timestamp: Utc::now(),
        }
    }

    fn recorded_progress(events: &Mutex<Vec<SwarmEvent>>) -> Vec<u8> {
        events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SwarmEvent::WorkerProgress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_first_and_last() {
        let (sink, events) = RecordingSink::new();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());
        emitter.start();

        for progress in [10, 20, 30] {
            emitter.emit(progress_event(progress)).await.unwrap();
        }
        // first delivery is immediate, the rest supersede each other
        assert_eq!(recorded_progress(&events), vec![10]);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(recorded_progress(&events), vec![10, 30]);

        emitter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_bounds_delivery_rate() {
        let (sink, events) = RecordingSink::new();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());
        emitter.start();

        // 40 updates over ~400ms: at most ceil(400/200) + 1 deliveries
        for progress in 1..=40u8 {
            emitter.emit(progress_event(progress)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        emitter.stop().await;

        let delivered = recorded_progress(&events);
        assert!(delivered.len() <= 4, "delivered {} events", delivered.len());
        assert_eq!(*delivered.last().unwrap(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_event_bypasses_throttle() {
        let (sink, events) = RecordingSink::new();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());
        emitter.start();

        emitter.emit(progress_event(10)).await.unwrap();
        emitter.emit(progress_event(20)).await.unwrap(); // parked
        emitter.emit(tool_call_event()).await.unwrap();

        // tool call delivered immediately, before any flush tick
        let kinds: Vec<&'static str> = events.lock().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["worker-progress", "worker-tool-call"]);

        emitter.stop().await;
        // parked progress still arrives at shutdown
        assert_eq!(recorded_progress(&events), vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_thinking_block_is_not_coalesced_with_previous() {
        let (sink, events) = RecordingSink::new();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());

        emitter.emit(thinking_event(0, "A")).await.unwrap();
        emitter.emit(thinking_event(0, "AB")).await.unwrap(); // same block, parked
        emitter.emit(thinking_event(1, "X")).await.unwrap(); // new block, new key

        let contents: Vec<String> = events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SwarmEvent::WorkerThinking { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["A".to_string(), "X".to_string()]);

        emitter.stop().await;
        // the grown block drains at shutdown, no boundary lost
        let contents: Vec<String> = events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SwarmEvent::WorkerThinking { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["A".to_string(), "X".to_string(), "AB".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_start_drains_pending() {
        let (sink, events) = RecordingSink::new();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());

        emitter.emit(progress_event(10)).await.unwrap();
        emitter.emit(progress_event(20)).await.unwrap();
        assert_eq!(recorded_progress(&events), vec![10]);

        emitter.stop().await;
        assert_eq!(recorded_progress(&events), vec![10, 20]);

        // idempotent
        emitter.stop().await;
        assert_eq!(recorded_progress(&events), vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_a_noop() {
        let (sink, events) = RecordingSink::new();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());
        emitter.start();
        emitter.start();

        emitter.emit(progress_event(10)).await.unwrap();
        emitter.emit(progress_event(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        // a duplicate flush task would deliver the pending event twice
        assert_eq!(recorded_progress(&events), vec![10, 20]);
        emitter.stop().await;
    }

    #[tokio::test]
    async fn test_delivery_error_propagates_from_emit() {
        let emitter = SwarmEventEmitter::new(Arc::new(FailingSink), EmitterConfig::default());
        let err = emitter.emit(tool_call_event()).await.unwrap_err();
        assert!(matches!(err, SinkError::Delivery(_)));
    }

    #[tokio::test]
    async fn test_tracker_to_sink_pipeline() {
        use crate::events::{BroadcastSink, SwarmEvent};
        use crate::model::{CoordinationMode, JsonMap, SwarmOutcome, WorkerOutcome};
        use crate::tracker::SwarmTracker;

        let tracker = SwarmTracker::default();
        let sink = Arc::new(BroadcastSink::new(64));
        let mut rx = sink.subscribe();
        let emitter = SwarmEventEmitter::new(sink, EmitterConfig::default());

        let swarm = tracker
            .create_swarm(Some("s1".into()), "sess-1", CoordinationMode::Sequential, JsonMap::new())
            .unwrap();
        emitter.emit(SwarmEvent::swarm_created(&swarm)).await.unwrap();

        let worker = tracker
            .start_worker("s1", "w1", "Diagnoser", "llm", "diagnostic", "find the fault")
            .unwrap();
        emitter.emit(SwarmEvent::worker_started("s1", &worker)).await.unwrap();

        let worker = tracker
            .complete_worker("s1", "w1", WorkerOutcome::Completed, None)
            .unwrap();
        emitter.emit(SwarmEvent::worker_completed("s1", &worker)).await.unwrap();

        let swarm = tracker.complete_swarm("s1", SwarmOutcome::Completed).unwrap();
        emitter.emit(SwarmEvent::swarm_completed(&swarm)).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..4 {
            kinds.push(rx.recv().await.unwrap().kind());
        }
        assert_eq!(
            kinds,
            vec!["swarm-created", "worker-started", "worker-completed", "swarm-completed"]
        );
    }
}
