//! Wires a job subscription to a progress state machine and an observer.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use kbase_core::{Error, JobKind, JobUpdate};

use crate::progress::{JobProgress, Transition};
use crate::subscription::{JobStreamClient, JobSubscription};

/// Receives job lifecycle callbacks. Called from the subscription task.
pub trait JobObserver: Send + 'static {
    fn on_progress(&mut self, _progress: &JobProgress, _update: &JobUpdate) {}

    /// Runs exactly once when the job succeeds.
    fn on_complete(&mut self, update: &JobUpdate);

    fn on_failed(&mut self, _error: &str, _update: &JobUpdate) {}

    fn on_connection_lost(&mut self) {}
}

/// A tracked job. Dropping the tracker closes its subscription.
pub struct JobTracker {
    progress: Arc<Mutex<JobProgress>>,
    subscription: JobSubscription,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobTracker {
    /// Track a job that the backend has already accepted.
    pub fn start<O: JobObserver>(
        client: &JobStreamClient,
        kind: JobKind,
        job_id: impl Into<String>,
        observer: O,
    ) -> Self {
        let job_id = job_id.into();
        let mut initial = JobProgress::new(kind);
        initial.begin();
        initial.started(job_id.clone());

        let progress = Arc::new(Mutex::new(initial));
        let observer = Arc::new(Mutex::new(observer));

        let on_update = {
            let progress = progress.clone();
            let observer = observer.clone();
            move |update: JobUpdate| {
                let mut state = lock(&progress);
                let transition = state.apply(&update);
                let mut observer = lock(&observer);
                match transition {
                    Transition::Ignored => {
                        debug!(subsystem = "jobs", component = "tracker", job_id = %update.id, "Ignored job event");
                    }
                    Transition::Progress => observer.on_progress(&state, &update),
                    Transition::Completed(update) => observer.on_complete(&update),
                    Transition::Failed { error, update } => observer.on_failed(&error, &update),
                }
            }
        };

        let on_error = {
            let progress = progress.clone();
            let observer = observer.clone();
            move |err: Error| {
                if let Error::Serialization(_) = err {
                    warn!(subsystem = "jobs", component = "tracker", error = %err, "Skipping undecodable job event");
                    return;
                }
                if lock(&progress).connection_lost() {
                    lock(&observer).on_connection_lost();
                }
            }
        };

        let subscription = client.subscribe_with_errors(job_id, on_update, on_error);
        Self {
            progress,
            subscription,
        }
    }

    /// Copy of the current progress state.
    pub fn snapshot(&self) -> JobProgress {
        lock(&self.progress).clone()
    }

    pub fn job_id(&self) -> &str {
        self.subscription.job_id()
    }

    pub fn close(&self) {
        self.subscription.close();
    }

    /// Wait until the job reaches a terminal status or the tracker is closed.
    pub async fn finished(&mut self) {
        self.subscription.finished().await;
    }
}
