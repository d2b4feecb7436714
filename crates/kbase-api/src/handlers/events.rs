//! Job event relay.
//!
//! Subscribes to the backend stream for one job and forwards each
//! `job_update` to the browser. The upstream subscription lives inside the
//! response stream, so a browser disconnect closes it. When a media-add job
//! completes, its succeeded videos are flagged as transcribed before the
//! final event goes out.
//!
//! The session token may be sent as a bearer header or, for `EventSource`
//! clients, as `?access_token=`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use kbase_core::defaults::STREAM_KEEPALIVE_SECS;
use kbase_core::{ChannelCacheRepository, JobKind, JobUpdate};
use kbase_jobs::progress::CONNECTION_LOST_NOTICE;
use kbase_jobs::{JobObserver, JobProgress, JobTracker, JOB_UPDATE_EVENT};

use crate::auth::StreamUser;
use crate::AppState;

/// Event name for relay notices such as a lost upstream connection.
pub const NOTICE_EVENT: &str = "notice";

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Job kind; defaults to `media_add`.
    pub kind: Option<JobKind>,
}

enum RelayMessage {
    Update(JobUpdate),
    Completed(JobUpdate),
    Failed(JobUpdate),
    Notice(&'static str),
}

struct RelayObserver {
    tx: mpsc::UnboundedSender<RelayMessage>,
}

impl RelayObserver {
    fn send(&self, msg: RelayMessage) {
        // Receiver gone means the browser disconnected.
        let _ = self.tx.send(msg);
    }
}

impl JobObserver for RelayObserver {
    fn on_progress(&mut self, _progress: &JobProgress, update: &JobUpdate) {
        self.send(RelayMessage::Update(update.clone()));
    }

    fn on_complete(&mut self, update: &JobUpdate) {
        self.send(RelayMessage::Completed(update.clone()));
    }

    fn on_failed(&mut self, _error: &str, update: &JobUpdate) {
        self.send(RelayMessage::Failed(update.clone()));
    }

    fn on_connection_lost(&mut self) {
        self.send(RelayMessage::Notice(CONNECTION_LOST_NOTICE));
    }
}

struct Relay {
    rx: mpsc::UnboundedReceiver<RelayMessage>,
    _tracker: JobTracker,
    channels: Arc<dyn ChannelCacheRepository>,
    user_id: Uuid,
    kind: JobKind,
    done: bool,
}

impl Relay {
    async fn next_event(&mut self) -> Option<Event> {
        if self.done {
            return None;
        }
        let event = match self.rx.recv().await? {
            RelayMessage::Update(update) => job_event(&update),
            RelayMessage::Completed(update) => {
                self.done = true;
                self.record_completion(&update).await;
                job_event(&update)
            }
            RelayMessage::Failed(update) => {
                self.done = true;
                job_event(&update)
            }
            RelayMessage::Notice(text) => Event::default().event(NOTICE_EVENT).data(text),
        };
        Some(event)
    }

    async fn record_completion(&self, update: &JobUpdate) {
        if self.kind != JobKind::MediaAdd || update.succeeded_videos.is_empty() {
            return;
        }
        match self
            .channels
            .mark_transcribed(self.user_id, &update.succeeded_videos)
            .await
        {
            Ok(rows) => info!(
                subsystem = "api",
                component = "events",
                op = "mark_transcribed",
                job_id = %update.id,
                user_id = %self.user_id,
                rows,
                "Videos marked transcribed"
            ),
            Err(e) => warn!(
                subsystem = "api",
                component = "events",
                op = "mark_transcribed",
                job_id = %update.id,
                error = %e,
                "Failed to mark videos transcribed"
            ),
        }
    }
}

fn job_event(update: &JobUpdate) -> Event {
    match serde_json::to_string(update) {
        Ok(json) => Event::default().event(JOB_UPDATE_EVENT).data(json),
        Err(e) => {
            warn!(subsystem = "api", component = "events", job_id = %update.id, error = %e, "Unserializable job update");
            Event::default().comment("unserializable job update")
        }
    }
}

pub async fn stream_job(
    State(state): State<AppState>,
    StreamUser(user): StreamUser,
    Path(job_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let kind = query.kind.unwrap_or(JobKind::MediaAdd);
    let (tx, rx) = mpsc::unbounded_channel();
    let tracker = JobTracker::start(&state.streams, kind, job_id.clone(), RelayObserver { tx });

    info!(
        subsystem = "api",
        component = "events",
        job_id = %job_id,
        kind = %kind,
        user_id = %user.user_id,
        "Job stream opened"
    );

    let relay = Relay {
        rx,
        _tracker: tracker,
        channels: state.channels.clone(),
        user_id: user.user_id,
        kind,
        done: false,
    };

    let stream = stream::unfold(relay, |mut relay| async move {
        let event = relay.next_event().await?;
        Some((Ok(event), relay))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(STREAM_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}
