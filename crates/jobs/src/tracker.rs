use std::collections::{HashMap, VecDeque};

use courier_core::models::{RunKey, RunOutcome};
use tokio::sync::Mutex;

/// How many finished run keys to remember. A completion for a remembered key
/// is a redelivery; a completion for a key never seen (or aged out) may be a
/// run started before this process, so it is still acted on.
const RETIRED_WINDOW: usize = 256;

/// What `note_requested` decided.
#[derive(Debug, PartialEq, Eq)]
pub enum Requested {
    /// New run, now tracked.
    Tracked,
    /// Already tracked; a run emits one requested event per attempt.
    Duplicate,
    /// Some other workflow; not ours to follow.
    OtherWorkflow,
}

/// What `note_completed` decided.
#[derive(Debug, PartialEq, Eq)]
pub enum Completed {
    /// First completion of a tracked run. The run is retired.
    Transitioned { outcome: RunOutcome, run_attempt: u64 },
    /// Completion of a run already retired. Redelivery; nothing to do.
    Replay,
    /// Completion of a run we never saw requested. Processed anyway with the
    /// attempt number from the event itself.
    Uncorrelated { outcome: RunOutcome },
    OtherWorkflow,
}

#[derive(Debug)]
struct TrackedRun {
    run_attempt: u64,
}

#[derive(Default)]
struct TrackerState {
    live: HashMap<RunKey, TrackedRun>,
    retired: VecDeque<RunKey>,
}

/// In-memory ledger of workflow runs between their requested and completed
/// events. State is lost on restart; completions arriving afterwards surface
/// as `Uncorrelated` and still get handled.
pub struct RunTracker {
    workflow_name: String,
    inner: Mutex<TrackerState>,
}

impl RunTracker {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self { workflow_name: workflow_name.into(), inner: Mutex::new(TrackerState::default()) }
    }

    pub async fn note_requested(
        &self,
        key: RunKey,
        run_attempt: u64,
        workflow_name: &str,
    ) -> Requested {
        if workflow_name != self.workflow_name {
            return Requested::OtherWorkflow;
        }
        let mut state = self.inner.lock().await;
        if state.live.contains_key(&key) {
            return Requested::Duplicate;
        }
        state.live.insert(key, TrackedRun { run_attempt });
        Requested::Tracked
    }

    pub async fn note_completed(
        &self,
        key: &RunKey,
        workflow_name: &str,
        conclusion: &str,
    ) -> Completed {
        if workflow_name != self.workflow_name {
            return Completed::OtherWorkflow;
        }
        let outcome = RunOutcome::from_conclusion(conclusion);
        let mut state = self.inner.lock().await;
        match state.live.remove(key) {
            Some(run) => {
                retire(&mut state, key.clone());
                Completed::Transitioned { outcome, run_attempt: run.run_attempt }
            }
            None if state.retired.contains(key) => Completed::Replay,
            None => Completed::Uncorrelated { outcome },
        }
    }
}

fn retire(state: &mut TrackerState, key: RunKey) {
    if state.retired.len() == RETIRED_WINDOW {
        state.retired.pop_front();
    }
    state.retired.push_back(key);
}
