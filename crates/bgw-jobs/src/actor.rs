// SPDX-License-Identifier: MIT OR Apache-2.0
//! The job actor and its handle.

use crate::sink::ProgressSink;
use crate::store::JobStore;
use crate::throttle::PersistThrottle;
use crate::token::AuthToken;
use bgw_core::{JobId, JobState, JobStatus, Pipeline};
use bgw_error::{ErrorCode, ErrorDto};
use bgw_protocol::{
    check_outbound_size, ClientMessage, CloseCode, ErrorPayload, JobCompletePayload,
    JobProgressPayload, JobStartedPayload, ProgressEnvelope, ReconnectedPayload, SizeCheck,
};
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Config & errors
// ---------------------------------------------------------------------------

/// Actor timing knobs. Production uses the defaults; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct JobActorConfig {
    /// How long `wait_for_ready` blocks for the client's `ready` frame.
    pub ready_timeout: Duration,
    /// Pause between a terminal broadcast and the socket close.
    pub close_delay: Duration,
    /// How long terminal job state survives before erasure.
    pub cleanup_delay: Duration,
}

impl Default for JobActorConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(5),
            close_delay: Duration::from_secs(1),
            cleanup_delay: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Why an attach was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("missing, expired, or mismatched token")]
    Unauthorized,
}

/// Why a token refresh was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("missing, expired, or mismatched token")]
    Unauthorized,
    #[error("refresh window has not opened yet")]
    TooEarly,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum Command {
    SetToken {
        token: AuthToken,
    },
    Attach {
        sink: Box<dyn ProgressSink>,
        presented: Uuid,
        reply: oneshot::Sender<Result<(), AttachError>>,
    },
    ClientFrame {
        raw: String,
    },
    WaitReady {
        reply: oneshot::Sender<()>,
    },
    Initialize {
        total_count: u32,
        reply: oneshot::Sender<()>,
    },
    Progress {
        payload: JobProgressPayload,
    },
    Complete {
        payload: JobCompletePayload,
    },
    Fail {
        error: ErrorDto,
    },
    Cancel {
        reason: String,
    },
    RefreshToken {
        presented: Uuid,
        reply: oneshot::Sender<Result<AuthToken, RefreshError>>,
    },
    Authorize {
        presented: Uuid,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<JobState>,
    },
    DelayedClose {
        code: CloseCode,
        reason: String,
    },
    CleanupFired,
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Cloneable address of one job actor. Everything funnels through the
/// actor's mailbox; only the cancellation flag is read directly (pipelines
/// poll it between work items without a mailbox round-trip).
#[derive(Clone)]
pub struct JobHandle {
    job_id: JobId,
    pipeline: Pipeline,
    tx: mpsc::UnboundedSender<Command>,
    canceled: Arc<AtomicBool>,
    ready_timeout: Duration,
}

impl JobHandle {
    /// Spawn an actor for `job_id` and return its handle.
    pub fn spawn(
        job_id: JobId,
        pipeline: Pipeline,
        store: Arc<dyn JobStore>,
        config: JobActorConfig,
        retired: Option<mpsc::UnboundedSender<JobId>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let canceled = Arc::new(AtomicBool::new(false));
        let actor = Actor {
            state: JobState::new(job_id, pipeline, 0),
            token: None,
            sink: None,
            had_socket: false,
            ready: false,
            ready_waiters: Vec::new(),
            throttle: PersistThrottle::for_pipeline(pipeline),
            store,
            config,
            canceled: Arc::clone(&canceled),
            self_tx: tx.clone(),
            retired,
        };
        tokio::spawn(actor.run(rx));
        Self {
            job_id,
            pipeline,
            tx,
            canceled,
            ready_timeout: config.ready_timeout,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    /// Cooperative cancellation flag, polled by pipelines at safe points.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Whether the actor is still alive (pre-cleanup).
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn set_token(&self, token: AuthToken) {
        let _ = self.tx.send(Command::SetToken { token });
    }

    /// Validate the token and take ownership of a client socket.
    pub async fn attach(
        &self,
        sink: Box<dyn ProgressSink>,
        presented: Uuid,
    ) -> Result<(), AttachError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Attach {
                sink,
                presented,
                reply,
            })
            .map_err(|_| AttachError::Unauthorized)?;
        response.await.unwrap_or(Err(AttachError::Unauthorized))
    }

    /// Forward a raw inbound text frame from the socket read loop.
    pub fn client_frame(&self, raw: String) {
        let _ = self.tx.send(Command::ClientFrame { raw });
    }

    /// Block until the client has sent `ready`, or the configured ready
    /// timeout elapses. Returns whether the client is attached and
    /// listening; work proceeds either way, this only orders the first
    /// progress frame after the subscription.
    pub async fn wait_for_ready(&self) -> bool {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::WaitReady { reply }).is_err() {
            return false;
        }
        matches!(
            tokio::time::timeout(self.ready_timeout, response).await,
            Ok(Ok(()))
        )
    }

    /// Persist the initial job state and broadcast `job_started`.
    pub async fn initialize(&self, total_count: u32) {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(Command::Initialize { total_count, reply })
            .is_ok()
        {
            let _ = response.await;
        }
    }

    /// Broadcast progress; persistence rides the per-pipeline throttle.
    pub fn update_progress(&self, payload: JobProgressPayload) {
        let _ = self.tx.send(Command::Progress { payload });
    }

    /// Terminal success: summary-only broadcast, then a delayed close.
    pub fn complete(&self, payload: JobCompletePayload) {
        let _ = self.tx.send(Command::Complete { payload });
    }

    /// Terminal failure: `error` broadcast, then close 1011.
    pub fn fail(&self, error: ErrorDto) {
        let _ = self.tx.send(Command::Fail { error });
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Command::Cancel {
            reason: reason.into(),
        });
    }

    /// Whether `presented` is the job's current, unexpired token.
    pub async fn authorize(&self, presented: Uuid) -> bool {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::Authorize { presented, reply }).is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Rotate the auth token inside the refresh window.
    pub async fn refresh_token(&self, presented: Uuid) -> Result<AuthToken, RefreshError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::RefreshToken { presented, reply })
            .map_err(|_| RefreshError::Unauthorized)?;
        response.await.unwrap_or(Err(RefreshError::Unauthorized))
    }

    /// Current in-memory state.
    pub async fn snapshot(&self) -> Option<JobState> {
        let (reply, response) = oneshot::channel();
        self.tx.send(Command::Snapshot { reply }).ok()?;
        response.await.ok()
    }

    /// Schedule the heavy pipeline through the actor's timer mechanism: the
    /// work runs detached from the scheduling request, reports through this
    /// handle, and every failure mode (including a panic) lands in `fail`.
    pub fn schedule_work<F, Fut>(&self, work: F)
    where
        F: FnOnce(JobHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<JobCompletePayload, ErrorDto>> + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            // Immediate timer: decouples the pipeline from the caller's
            // request lifetime.
            tokio::time::sleep(Duration::ZERO).await;
            let inner = tokio::spawn(work(handle.clone()));
            match inner.await {
                Ok(Ok(summary)) => handle.complete(summary),
                Ok(Err(error)) => handle.fail(error),
                Err(join_error) => {
                    error!(job_id = %handle.job_id(), %join_error, "pipeline panicked");
                    handle.fail(ErrorDto::new(
                        ErrorCode::InternalError,
                        "pipeline terminated unexpectedly",
                    ));
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Actor {
    state: JobState,
    token: Option<AuthToken>,
    sink: Option<Box<dyn ProgressSink>>,
    had_socket: bool,
    ready: bool,
    ready_waiters: Vec<oneshot::Sender<()>>,
    throttle: PersistThrottle,
    store: Arc<dyn JobStore>,
    config: JobActorConfig,
    canceled: Arc<AtomicBool>,
    self_tx: mpsc::UnboundedSender<Command>,
    retired: Option<mpsc::UnboundedSender<JobId>>,
}

impl Actor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            if self.handle(command).await {
                break;
            }
        }
        if let Some(retired) = &self.retired {
            let _ = retired.send(self.state.job_id);
        }
    }

    /// Returns `true` when the actor should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::SetToken { token } => {
                self.token = Some(token);
            }

            Command::Attach {
                sink,
                presented,
                reply,
            } => {
                let authorized = self
                    .token
                    .as_ref()
                    .is_some_and(|t| t.is_valid(presented, Utc::now()));
                if !authorized {
                    let _ = reply.send(Err(AttachError::Unauthorized));
                    return false;
                }
                if let Some(mut old) = self.sink.take() {
                    old.close(CloseCode::Normal, "client reconnecting").await;
                }
                self.sink = Some(sink);
                let _ = reply.send(Ok(()));

                if self.had_socket {
                    // Replay the latest state as one snapshot; the new
                    // client is attached and listening by definition.
                    let snapshot = ReconnectedPayload {
                        status: self.state.status,
                        processed_count: self.state.processed_count,
                        total_count: self.state.total_count,
                        progress: self.state.progress,
                    };
                    let envelope = ProgressEnvelope::reconnected(
                        self.state.job_id,
                        self.state.pipeline,
                        &snapshot,
                    );
                    self.broadcast(&envelope).await;
                    self.mark_ready();
                }
                self.had_socket = true;
            }

            Command::ClientFrame { raw } => match ClientMessage::parse(&raw) {
                Ok(ClientMessage::Ready) => self.mark_ready(),
                Ok(ClientMessage::Ping) => {
                    let pong = ProgressEnvelope::pong(self.state.job_id, self.state.pipeline);
                    self.broadcast(&pong).await;
                }
                Ok(ClientMessage::Pong) => {}
                Ok(ClientMessage::Cancel) => self.begin_cancel("client request").await,
                Err(violation) => {
                    warn!(job_id = %self.state.job_id, %violation, "client protocol violation");
                    if let Some(mut sink) = self.sink.take() {
                        sink.close(CloseCode::ProtocolViolation, "protocol violation")
                            .await;
                    }
                }
            },

            Command::WaitReady { reply } => {
                if self.ready {
                    let _ = reply.send(());
                } else {
                    self.ready_waiters.push(reply);
                }
            }

            Command::Initialize { total_count, reply } => {
                self.state.total_count = total_count;
                self.state.status = JobStatus::Initialized;
                self.persist().await;
                self.throttle.mark_persisted();
                let envelope = ProgressEnvelope::job_started(
                    self.state.job_id,
                    self.state.pipeline,
                    &JobStartedPayload { total_count },
                );
                self.broadcast(&envelope).await;
                let _ = reply.send(());
            }

            Command::Progress { payload } => {
                if self.state.status.is_terminal() {
                    debug!(job_id = %self.state.job_id, "progress after terminal state ignored");
                    return false;
                }
                if self.state.status == JobStatus::Initialized {
                    self.state.status = JobStatus::Running;
                }
                self.state.record_progress(payload.processed_count);
                let envelope = ProgressEnvelope::job_progress(
                    self.state.job_id,
                    self.state.pipeline,
                    &payload,
                );
                self.broadcast(&envelope).await;
                if self.throttle.should_persist() {
                    self.persist().await;
                }
            }

            Command::Complete { payload } => {
                let canceled = self.state.status == JobStatus::Canceled;
                if self.state.status.is_terminal() && !canceled {
                    debug!(job_id = %self.state.job_id, "duplicate terminal ignored");
                    return false;
                }
                if !canceled {
                    self.state.status = JobStatus::Completed;
                }
                self.state.result = serde_json::to_value(&payload).ok();
                self.state.last_update_time = Utc::now();
                self.persist().await;
                let envelope = ProgressEnvelope::job_complete(
                    self.state.job_id,
                    self.state.pipeline,
                    &payload,
                );
                self.broadcast(&envelope).await;
                let (code, reason) = if canceled {
                    (CloseCode::Canceled, "job canceled")
                } else {
                    (CloseCode::Normal, "job complete")
                };
                self.schedule_delayed_close(code, reason);
                self.schedule_cleanup();
            }

            Command::Fail { error } => {
                if self.state.status.is_terminal() {
                    debug!(job_id = %self.state.job_id, "failure after terminal state ignored");
                    return false;
                }
                self.state.status = JobStatus::Failed;
                self.state.error = Some(error.clone());
                self.state.last_update_time = Utc::now();
                self.persist().await;
                let envelope = ProgressEnvelope::error(
                    self.state.job_id,
                    self.state.pipeline,
                    &ErrorPayload::from(&error),
                );
                self.broadcast(&envelope).await;
                self.schedule_delayed_close(CloseCode::Internal, "internal error");
                self.schedule_cleanup();
            }

            Command::Cancel { reason } => self.begin_cancel(&reason).await,

            Command::RefreshToken { presented, reply } => {
                let now = Utc::now();
                let result = match &self.token {
                    Some(current) if current.can_refresh(presented, now) => {
                        let next = current.refreshed(now);
                        self.token = Some(next);
                        Ok(next)
                    }
                    Some(current) if current.is_valid(presented, now) => Err(RefreshError::TooEarly),
                    _ => Err(RefreshError::Unauthorized),
                };
                let _ = reply.send(result);
            }

            Command::Authorize { presented, reply } => {
                let authorized = self
                    .token
                    .as_ref()
                    .is_some_and(|t| t.is_valid(presented, Utc::now()));
                let _ = reply.send(authorized);
            }

            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.clone());
            }

            Command::DelayedClose { code, reason } => {
                if let Some(mut sink) = self.sink.take() {
                    sink.close(code, &reason).await;
                }
            }

            Command::CleanupFired => {
                if self.state.status.is_terminal() {
                    if let Err(err) = self.store.delete(self.state.job_id).await {
                        warn!(job_id = %self.state.job_id, %err, "cleanup delete failed");
                    }
                    if let Some(mut sink) = self.sink.take() {
                        sink.close(CloseCode::Normal, "job expired").await;
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Mark canceled and persist. The running pipeline observes the flag at
    /// its next safe point and reports a partial completion; if no work was
    /// ever scheduled the socket closes right away.
    async fn begin_cancel(&mut self, reason: &str) {
        if self.state.status.is_terminal() {
            return;
        }
        let was_running = self.state.status == JobStatus::Running;
        self.canceled.store(true, Ordering::Relaxed);
        self.state.canceled = true;
        self.state.status = JobStatus::Canceled;
        self.state.last_update_time = Utc::now();
        self.persist().await;
        debug!(job_id = %self.state.job_id, reason, "job canceled");
        if !was_running {
            self.schedule_delayed_close(CloseCode::Canceled, "job canceled");
            self.schedule_cleanup();
        }
    }

    fn mark_ready(&mut self) {
        self.ready = true;
        for waiter in self.ready_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    async fn persist(&mut self) {
        if let Err(err) = self.store.put(&self.state).await {
            warn!(job_id = %self.state.job_id, %err, "job state persist failed");
        }
        self.throttle.mark_persisted();
    }

    /// Send one envelope, enforcing the outbound size policy. A dead socket
    /// detaches silently; the work continues and the client can re-fetch
    /// results by job id.
    async fn broadcast(&mut self, envelope: &ProgressEnvelope) {
        let Some(mut sink) = self.sink.take() else {
            return;
        };
        let text = envelope.to_json();
        match check_outbound_size(&text) {
            SizeCheck::TooLarge(bytes) => {
                error!(
                    job_id = %self.state.job_id,
                    bytes,
                    "outbound frame exceeds hard limit"
                );
                sink.close(CloseCode::TooLarge, "message too large").await;
                return;
            }
            SizeCheck::Warn(bytes) => {
                warn!(job_id = %self.state.job_id, bytes, "outbound frame over 1 MB");
            }
            SizeCheck::Ok => {}
        }
        if sink.send_text(text).await.is_err() {
            debug!(job_id = %self.state.job_id, "client detached mid-job");
            return;
        }
        self.sink = Some(sink);
    }

    fn schedule_delayed_close(&self, code: CloseCode, reason: &str) {
        let tx = self.self_tx.clone();
        let delay = self.config.close_delay;
        let reason = reason.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::DelayedClose { code, reason });
        });
    }

    fn schedule_cleanup(&self) {
        let tx = self.self_tx.clone();
        let delay = self.config.cleanup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::CleanupFired);
        });
    }
}
