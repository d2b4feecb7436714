//! Job progress state machine.
//!
//! Interprets the stream of [`JobUpdate`]s for one workflow slot (one
//! channel add, one documentation scrape, one training run). Transitions are
//! table-driven by [`JobKind`] through [`KindProfile`].

use serde::Serialize;

use kbase_core::{Error, JobKind, JobUpdate, Result};

/// Notice shown while the event stream is reconnecting.
pub const CONNECTION_LOST_NOTICE: &str = "Connection lost";

/// Workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Submitting,
    Processing,
    Generating,
    Training,
    Ready,
    Generated,
    Completed,
    Failed,
}

impl Phase {
    /// A job id is attached and events are expected.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Processing | Phase::Generating | Phase::Training)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Generated | Phase::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || *self == Phase::Failed
    }
}

/// Action offered after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Resume the workflow under a new job id.
    Proceed,
    /// Discard the failed job and return to idle.
    Delete,
}

/// Per-kind transition table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindProfile {
    pub active: Phase,
    pub success: Phase,
    pub can_proceed: bool,
}

impl KindProfile {
    pub fn of(kind: JobKind) -> Self {
        let (active, success, can_proceed) = match kind {
            JobKind::MediaAdd => (Phase::Processing, Phase::Completed, false),
            JobKind::ArticleScrape => (Phase::Processing, Phase::Ready, false),
            JobKind::DocumentationScrape | JobKind::DocumentationRetry => {
                (Phase::Processing, Phase::Ready, true)
            }
            JobKind::DeepMemoryGenerate => (Phase::Generating, Phase::Generated, true),
            JobKind::DeepMemoryTrain => (Phase::Training, Phase::Completed, true),
        };
        Self {
            active,
            success,
            can_proceed,
        }
    }
}

/// Result of applying one update.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Stale, foreign or post-terminal event; nothing changed.
    Ignored,
    /// Non-terminal progress.
    Progress,
    /// Terminal success, produced at most once per job.
    Completed(JobUpdate),
    /// Terminal failure, produced at most once per job.
    Failed { error: String, update: JobUpdate },
}

/// Progress state for one workflow slot.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    kind: JobKind,
    phase: Phase,
    job_id: Option<String>,
    percent: u8,
    message: String,
    counters: Option<(i64, i64)>,
    error: Option<String>,
    notice: Option<String>,
}

impl JobProgress {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            phase: Phase::Idle,
            job_id: None,
            percent: 0,
            message: String::new(),
            counters: None,
            error: None,
            notice: None,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `(processed, total)` in the kind's unit, once reported.
    pub fn counters(&self) -> Option<(i64, i64)> {
        self.counters
    }

    /// Error recorded by the last failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Non-fatal notice (connection loss, rejected submission).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Recovery actions available in the current phase.
    pub fn recovery_actions(&self) -> Vec<RecoveryAction> {
        if self.phase != Phase::Failed {
            return Vec::new();
        }
        if KindProfile::of(self.kind).can_proceed {
            vec![RecoveryAction::Proceed, RecoveryAction::Delete]
        } else {
            vec![RecoveryAction::Delete]
        }
    }

    /// Start a new submission, discarding any previous job state.
    pub fn begin(&mut self) {
        *self = Self::new(self.kind);
        self.phase = Phase::Submitting;
    }

    /// The initiating call returned a job id.
    pub fn started(&mut self, job_id: impl Into<String>) {
        self.attach(job_id.into());
    }

    /// The initiating call was rejected. Returns false outside `Submitting`.
    pub fn submit_failed(&mut self, message: impl Into<String>) -> bool {
        if self.phase != Phase::Submitting {
            return false;
        }
        self.phase = Phase::Idle;
        self.notice = Some(message.into());
        true
    }

    /// Apply one event from the job stream.
    pub fn apply(&mut self, update: &JobUpdate) -> Transition {
        if !self.phase.is_active() || self.job_id.as_deref() != Some(update.id.as_str()) {
            return Transition::Ignored;
        }

        self.notice = None;
        self.percent = update.percent();
        if !update.message.is_empty() {
            self.message = update.message.clone();
        }
        if let Some(counters) = update.counters() {
            self.counters = Some(counters);
        }

        if update.status.is_success() {
            self.phase = KindProfile::of(self.kind).success;
            self.percent = 100;
            Transition::Completed(update.clone())
        } else if update.status.is_failure() {
            let error = update.error_text();
            self.phase = Phase::Failed;
            self.error = Some(error.clone());
            Transition::Failed {
                error,
                update: update.clone(),
            }
        } else {
            Transition::Progress
        }
    }

    /// The stream dropped while a job is active. Returns false otherwise.
    pub fn connection_lost(&mut self) -> bool {
        if !self.phase.is_active() {
            return false;
        }
        self.notice = Some(CONNECTION_LOST_NOTICE.to_string());
        true
    }

    /// Resume a failed workflow under a new job id.
    pub fn proceed(&mut self, job_id: impl Into<String>) -> Result<()> {
        if !self.recovery_actions().contains(&RecoveryAction::Proceed) {
            return Err(Error::InvalidInput(format!(
                "Cannot proceed a {} job in phase {:?}",
                self.kind, self.phase
            )));
        }
        self.attach(job_id.into());
        Ok(())
    }

    /// Discard a failed job and return to idle.
    pub fn delete(&mut self) -> Result<()> {
        if self.phase != Phase::Failed {
            return Err(Error::InvalidInput(format!(
                "Nothing to delete in phase {:?}",
                self.phase
            )));
        }
        *self = Self::new(self.kind);
        Ok(())
    }

    fn attach(&mut self, job_id: String) {
        self.phase = KindProfile::of(self.kind).active;
        self.job_id = Some(job_id);
        self.percent = 0;
        self.message.clear();
        self.counters = None;
        self.error = None;
        self.notice = None;
    }
}
