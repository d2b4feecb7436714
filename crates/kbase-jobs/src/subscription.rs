//! Job event stream subscriptions.
//!
//! One subscription holds one connection to the backend's event stream for a
//! single job. Every `job_update` event is decoded and handed to the update
//! callback in arrival order. The connection closes right after a terminal
//! status is delivered; transport failures are reported and followed by a
//! reconnect, like a browser `EventSource`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kbase_backend::{BackendClient, SseDecoder};
use kbase_core::defaults::STREAM_RETRY_MS;
use kbase_core::{Error, JobUpdate};

/// SSE event name carrying job status payloads.
pub const JOB_UPDATE_EVENT: &str = "job_update";

/// Callback receiving each decoded update.
pub type UpdateCallback = Box<dyn FnMut(JobUpdate) + Send + 'static>;

/// Callback receiving non-fatal stream errors.
pub type ErrorCallback = Box<dyn FnMut(Error) + Send + 'static>;

/// Opens job subscriptions against the scrape backend.
#[derive(Clone)]
pub struct JobStreamClient {
    backend: BackendClient,
    retry: Duration,
}

impl JobStreamClient {
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            retry: Duration::from_millis(STREAM_RETRY_MS),
        }
    }

    /// Reconnect delay used until the server sends a `retry:` field.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Subscribe to a job, ignoring stream errors.
    pub fn subscribe<F>(&self, job_id: impl Into<String>, on_update: F) -> JobSubscription
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        self.subscribe_with_errors(job_id, on_update, |_| {})
    }

    /// Subscribe to a job with an error callback.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe_with_errors<F, E>(
        &self,
        job_id: impl Into<String>,
        on_update: F,
        on_error: E,
    ) -> JobSubscription
    where
        F: FnMut(JobUpdate) + Send + 'static,
        E: FnMut(Error) + Send + 'static,
    {
        let job_id = job_id.into();
        let closed = Arc::new(AtomicBool::new(false));
        let stream = StreamTask {
            backend: self.backend.clone(),
            job_id: job_id.clone(),
            default_retry: self.retry,
            closed: closed.clone(),
            on_update: Box::new(on_update),
            on_error: Box::new(on_error),
        };

        info!(subsystem = "jobs", component = "stream", op = "subscribe", job_id = %job_id, "Subscribing to job events");
        let task = tokio::spawn(stream.run());

        JobSubscription {
            job_id,
            closed,
            task: Some(task),
        }
    }
}

/// Handle to a live job subscription. Dropping it closes the connection.
pub struct JobSubscription {
    job_id: String,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl JobSubscription {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Close the connection. No callback runs after this returns.
    /// Calling it again is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = &self.task {
            task.abort();
        }
        debug!(subsystem = "jobs", component = "stream", op = "close", job_id = %self.job_id, "Job subscription closed");
    }

    /// True once closed by the caller or after a terminal event.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the stream task exits (terminal event or close).
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for JobSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

struct StreamTask {
    backend: BackendClient,
    job_id: String,
    default_retry: Duration,
    closed: Arc<AtomicBool>,
    on_update: UpdateCallback,
    on_error: ErrorCallback,
}

impl StreamTask {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn report(&mut self, err: Error) {
        if !self.is_closed() {
            (self.on_error)(err);
        }
    }

    async fn run(mut self) {
        let mut decoder = SseDecoder::new();

        loop {
            if self.is_closed() {
                return;
            }

            match self
                .backend
                .open_job_stream(&self.job_id, decoder.last_event_id())
                .await
            {
                Ok(response) => {
                    let mut body = response.bytes_stream();
                    loop {
                        match body.next().await {
                            Some(Ok(chunk)) => {
                                for frame in decoder.push(&chunk) {
                                    if self.is_closed() {
                                        return;
                                    }
                                    if frame.event != JOB_UPDATE_EVENT {
                                        continue;
                                    }
                                    if self.dispatch(&frame.data) {
                                        return;
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                self.report(Error::Request(format!("Event stream error: {}", e)));
                                break;
                            }
                            None => {
                                self.report(Error::Request(
                                    "Event stream ended before the job finished".to_string(),
                                ));
                                break;
                            }
                        }
                    }
                }
                Err(e) => self.report(e),
            }

            decoder.reset_frame();
            let delay = decoder
                .retry_ms()
                .map(Duration::from_millis)
                .unwrap_or(self.default_retry);
            warn!(
                subsystem = "jobs",
                component = "stream",
                op = "reconnect",
                job_id = %self.job_id,
                delay_ms = delay.as_millis() as u64,
                "Job event stream interrupted, reconnecting"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Decode and deliver one payload. Returns true when the stream is done.
    fn dispatch(&mut self, data: &str) -> bool {
        let update: JobUpdate = match serde_json::from_str(data) {
            Ok(u) => u,
            Err(e) => {
                self.report(Error::Serialization(format!("Invalid job_update payload: {}", e)));
                return false;
            }
        };

        let terminal = update.status.is_terminal();
        let status = update.status;
        (self.on_update)(update);

        if terminal {
            self.closed.store(true, Ordering::SeqCst);
            info!(
                subsystem = "jobs",
                component = "stream",
                op = "terminal",
                job_id = %self.job_id,
                status = ?status,
                "Job reached terminal status, closing stream"
            );
        }
        terminal
    }
}
