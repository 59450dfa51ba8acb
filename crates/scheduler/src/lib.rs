//! Admission-controlled request scheduler.
//!
//! Every model call in the system passes through one of these. The
//! scheduler bounds how many calls are in flight, per request kind and in
//! aggregate, and queues the rest in FIFO order per kind. It knows nothing
//! about what a job *is*: callers hand it a future and get the future's own
//! outcome back, unaltered in everything but timing.
//!
//! Admission rules:
//! - within a kind, requests are admitted in submission (FIFO) order;
//! - across kinds, a dispatch pass scans kinds in registration order and
//!   admits the first request whose kind has a free slot while global
//!   capacity remains. The tie-break is deterministic and never depends on
//!   job content;
//! - a pass admits one request; completions, submissions, and limit raises
//!   each trigger a new pass, so capacity never sits idle while work waits.
//!
//! There is no retry and no timeout here. A hung job holds its slot until
//! it resolves; timeouts belong to the model-call wrapper that produces
//! the job future.

use corvid_core::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What every scheduled job resolves to: completion text or a model error.
pub type JobOutput = std::result::Result<String, ModelError>;

type Job = Pin<Box<dyn Future<Output = JobOutput> + Send>>;

/// A named category of scheduled work with its own concurrency limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKind(pub &'static str);

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The request kinds the agent uses.
pub mod kinds {
    use super::RequestKind;

    pub const DECISION: RequestKind = RequestKind("decision");
    pub const GENERATION: RequestKind = RequestKind("character_generation");
    pub const CUSTOM: RequestKind = RequestKind("custom_prompt");
}

/// A queued unit of work. Owned by the scheduler from submission until the
/// job resolves; the caller holds only the result receiver.
struct QueueRequest {
    id: u64,
    job: Job,
    enqueued_at: Instant,
    result_tx: oneshot::Sender<JobOutput>,
}

/// Queue and counters for one registered kind.
struct KindState {
    kind: RequestKind,
    queue: VecDeque<QueueRequest>,
    active: usize,
    limit: usize,
}

struct State {
    /// Kinds in registration order, which is also the dispatch scan order.
    kinds: Vec<KindState>,
    global_active: usize,
    global_limit: usize,
    next_id: u64,
    health_threshold: usize,
}

impl State {
    fn kind_mut(&mut self, kind: RequestKind) -> &mut KindState {
        // Registration happens on first reference, preserving order.
        if let Some(i) = self.kinds.iter().position(|k| k.kind == kind) {
            return &mut self.kinds[i];
        }
        self.kinds.push(KindState {
            kind,
            queue: VecDeque::new(),
            active: 0,
            limit: 1,
        });
        self.kinds.last_mut().unwrap()
    }

    fn total_queued(&self) -> usize {
        self.kinds.iter().map(|k| k.queue.len()).sum()
    }
}

/// Observability snapshot for one kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindStats {
    pub kind: String,
    pub queued: usize,
    pub active: usize,
    pub limit: usize,
}

/// Observability snapshot for the whole scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub kinds: Vec<KindStats>,
    pub global_active: usize,
    pub global_limit: usize,
    pub total_queued: usize,
}

/// The scheduler itself. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RequestScheduler {
    state: Arc<Mutex<State>>,
}

impl RequestScheduler {
    /// Create a scheduler with the default limits (1 per kind, 1 global,
    /// health threshold 10).
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                kinds: Vec::new(),
                global_active: 0,
                global_limit: 1,
                next_id: 1,
                health_threshold: 10,
            })),
        }
    }

    /// Pre-register a kind so it takes a fixed place in the dispatch scan
    /// order before any work arrives.
    pub fn register(&self, kind: RequestKind) {
        let mut state = self.state.lock().unwrap();
        state.kind_mut(kind);
    }

    /// Submit a job under a kind. Resolves with the job's own outcome once
    /// the job has been admitted and has run.
    pub fn submit<F>(&self, kind: RequestKind, job: F) -> impl Future<Output = JobOutput> + Send + use<F>
    where
        F: Future<Output = JobOutput> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();

        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;

            let entry = state.kind_mut(kind);
            entry.queue.push_back(QueueRequest {
                id,
                job: Box::pin(job),
                enqueued_at: Instant::now(),
                result_tx,
            });
            debug!(kind = %kind, request_id = id, queued = entry.queue.len(), "Request enqueued");
        }

        self.dispatch();

        async move {
            match result_rx.await {
                Ok(outcome) => outcome,
                // Only reachable if the runtime tears the worker down mid-job.
                Err(_) => Err(ModelError::Network(
                    "scheduler dropped the result channel".into(),
                )),
            }
        }
    }

    /// Set the concurrency limit for one kind. Registers the kind if it is
    /// new, then immediately attempts dispatch so raising a limit can
    /// unblock queued work.
    pub fn set_kind_limit(&self, kind: RequestKind, limit: usize) {
        {
            let mut state = self.state.lock().unwrap();
            state.kind_mut(kind).limit = limit;
        }
        self.dispatch();
    }

    /// Set the global in-flight ceiling, then immediately attempt dispatch.
    pub fn set_global_limit(&self, limit: usize) {
        {
            let mut state = self.state.lock().unwrap();
            state.global_limit = limit;
        }
        self.dispatch();
    }

    /// Set the queued-request count above which `is_healthy` reports false.
    pub fn set_health_threshold(&self, threshold: usize) {
        self.state.lock().unwrap().health_threshold = threshold;
    }

    /// Snapshot of queues, active counts, and limits.
    pub fn stats(&self) -> SchedulerStats {
        let state = self.state.lock().unwrap();
        SchedulerStats {
            kinds: state
                .kinds
                .iter()
                .map(|k| KindStats {
                    kind: k.kind.to_string(),
                    queued: k.queue.len(),
                    active: k.active,
                    limit: k.limit,
                })
                .collect(),
            global_active: state.global_active,
            global_limit: state.global_limit,
            total_queued: state.total_queued(),
        }
    }

    /// False when the total backlog exceeds the health threshold.
    pub fn is_healthy(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.total_queued() <= state.health_threshold
    }

    /// Run dispatch passes until no further request is admissible. Each
    /// pass scans kinds in registration order and admits at most one
    /// request.
    fn dispatch(&self) {
        while self.try_admit_one() {}
    }

    /// One scheduling pass. Returns true if a request was admitted.
    fn try_admit_one(&self) -> bool {
        let (request, kind) = {
            let mut state = self.state.lock().unwrap();
            if state.global_active >= state.global_limit {
                return false;
            }

            let Some(i) = state
                .kinds
                .iter()
                .position(|k| k.active < k.limit && !k.queue.is_empty())
            else {
                return false;
            };

            state.global_active += 1;
            let entry = &mut state.kinds[i];
            entry.active += 1;
            let kind = entry.kind;
            // Front of the queue = oldest submission for this kind.
            (entry.queue.pop_front().unwrap(), kind)
        };

        let waited_ms = request.enqueued_at.elapsed().as_millis() as u64;
        debug!(kind = %kind, request_id = request.id, waited_ms, "Request admitted");

        let scheduler = self.clone();
        tokio::spawn(async move {
            let outcome = request.job.await;
            if let Err(e) = &outcome {
                warn!(kind = %kind, request_id = request.id, error = %e, "Scheduled job failed");
            }
            // The caller may have stopped waiting; that is not our problem.
            let _ = request.result_tx.send(outcome);
            scheduler.on_complete(kind);
        });

        true
    }

    /// Release a slot after a job resolves (success or failure), then
    /// trigger the next pass.
    fn on_complete(&self, kind: RequestKind) {
        {
            let mut state = self.state.lock().unwrap();
            state.global_active = state.global_active.saturating_sub(1);
            let entry = state.kind_mut(kind);
            entry.active = entry.active.saturating_sub(1);
        }
        self.dispatch();
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new()
    }
}
