//! Sandbox host: session registry and per-session actors.
//!
//! Each session is owned by one tokio task, the only code that touches its
//! [`SandboxSession`].  Callers talk to it through a cloneable
//! [`SessionHandle`]; the isolated context talks to it through the
//! [`ContextEndpoint`] returned alongside.  Nothing blocks while waiting for
//! `preview_ready`: queued updates are flushed by the actor when the message
//! arrives.  A context that stops reading only delays its own deliveries;
//! the actor keeps serving commands and can always be closed.
//!
//! Sessions stay in the registry after they close so callers can tell a
//! closed session from an unknown one; [`SandboxHost::prune_closed`] drops
//! them.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use blockpreview_sanitize::SafeMarkup;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::protocol::{ContextMessage, HostMessage};
use crate::session::{CloseReason, SandboxSession, SessionState, UpdateReceipt};

// ---------------------------------------------------------------------------
// Identifiers and snapshots
// ---------------------------------------------------------------------------

/// Identifier of one preview session (UUID v7, so ids sort by creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SandboxError::SessionNotFound {
                session_id: s.to_owned(),
            })
    }
}

/// Observable part of a session's state, published by its actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub close_reason: Option<CloseReason>,
    pub last_acknowledged: Option<u64>,
}

impl SessionStatus {
    fn of(session: &SandboxSession) -> Self {
        Self {
            state: session.state(),
            close_reason: session.close_reason(),
            last_acknowledged: session.last_acknowledged(),
        }
    }
}

/// Snapshot of a session for listings and diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub opened_at: DateTime<Utc>,
    pub state: SessionState,
    pub close_reason: Option<CloseReason>,
    pub last_acknowledged: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    Update {
        markup: SafeMarkup,
        reply: oneshot::Sender<Result<UpdateReceipt>>,
    },
    Close,
}

/// Host-side handle to a session.  Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    opened_at: DateTime<Utc>,
    handshake_timeout_ms: u64,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn info(&self) -> SessionInfo {
        let status = *self.status.borrow();
        SessionInfo {
            id: self.id,
            opened_at: self.opened_at,
            state: status.state,
            close_reason: status.close_reason,
            last_acknowledged: status.last_acknowledged,
        }
    }

    /// Push new content.  Before the context is ready the update is queued;
    /// it is never dropped unless the session closes.
    pub async fn update(&self, markup: SafeMarkup) -> Result<UpdateReceipt> {
        if self.state() == SessionState::Closed {
            return Err(SandboxError::SessionClosed);
        }
        let (reply, receipt) = oneshot::channel();
        self.commands
            .send(Command::Update { markup, reply })
            .await
            .map_err(|_| SandboxError::SessionClosed)?;
        receipt.await.map_err(|_| SandboxError::SessionClosed)?
    }

    /// Wait until the context has answered the handshake.
    pub async fn ready(&self) -> Result<()> {
        let mut status = self.status.clone();
        let outcome = status
            .wait_for(|s| matches!(s.state, SessionState::Ready | SessionState::Closed))
            .await
            .map(|s| *s);
        match outcome {
            Ok(SessionStatus {
                state: SessionState::Ready,
                ..
            }) => Ok(()),
            Ok(SessionStatus {
                close_reason: Some(CloseReason::HandshakeTimeout),
                ..
            }) => Err(SandboxError::HandshakeTimeout {
                timeout_ms: self.handshake_timeout_ms,
            }),
            _ => Err(SandboxError::SessionClosed),
        }
    }

    /// Close the session.  Closing an already closed session does nothing.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
    }

    /// Wait for the session to close and report why.
    pub async fn wait_closed(&self) -> CloseReason {
        let mut status = self.status.clone();
        match status.wait_for(|s| s.state == SessionState::Closed).await {
            Ok(s) => s.close_reason.unwrap_or(CloseReason::HostClosed),
            // The actor is gone without publishing a reason.
            Err(_) => CloseReason::HostClosed,
        }
    }
}

// ---------------------------------------------------------------------------
// Context endpoint
// ---------------------------------------------------------------------------

/// The isolated context's side of a session.  Dropping it tears the
/// context down.
#[derive(Debug)]
pub struct ContextEndpoint {
    session_id: SessionId,
    incoming: mpsc::Receiver<HostMessage>,
    outgoing: ContextSender,
}

/// Sending half of a [`ContextEndpoint`].
#[derive(Debug, Clone)]
pub struct ContextSender {
    inner: mpsc::Sender<ContextMessage>,
}

impl ContextSender {
    pub async fn send(&self, message: ContextMessage) -> Result<()> {
        self.inner
            .send(message)
            .await
            .map_err(|_| SandboxError::SessionClosed)
    }
}

impl ContextEndpoint {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Next message from the host; `None` once the session is closed.
    pub async fn recv(&mut self) -> Option<HostMessage> {
        self.incoming.recv().await
    }

    pub async fn send(&self, message: ContextMessage) -> Result<()> {
        self.outgoing.send(message).await
    }

    /// Split into receiving and sending halves for use from separate tasks.
    pub fn split(self) -> (mpsc::Receiver<HostMessage>, ContextSender) {
        (self.incoming, self.outgoing)
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Registry of live preview sessions.  Cheap to clone.
#[derive(Clone)]
pub struct SandboxHost {
    config: Arc<SandboxConfig>,
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
}

impl SandboxHost {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Open a session for a freshly created context and send it the
    /// handshake.  Must be called inside a tokio runtime.
    pub fn open(&self) -> (SessionHandle, ContextEndpoint) {
        let id = SessionId::new();
        let capacity = self.config.mailbox_capacity.max(1);

        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (to_context, from_host) = mpsc::channel(capacity);
        let (to_host, from_context) = mpsc::channel(capacity);
        let (status_tx, status_rx) = watch::channel(SessionStatus::of(&SandboxSession::new()));

        let handle = SessionHandle {
            id,
            opened_at: Utc::now(),
            handshake_timeout_ms: self.config.handshake_timeout_ms,
            commands: command_tx,
            status: status_rx,
        };
        let endpoint = ContextEndpoint {
            session_id: id,
            incoming: from_host,
            outgoing: ContextSender { inner: to_host },
        };

        let actor = SessionActor {
            id,
            session: SandboxSession::new(),
            commands: command_rx,
            inbound: from_context,
            outbound: to_context,
            unsent: VecDeque::new(),
            status: status_tx,
            handshake_deadline: Instant::now() + self.config.handshake_timeout(),
        };
        tokio::spawn(actor.run());

        self.sessions.insert(id, handle.clone());
        info!(session_id = %id, "preview session opened");
        (handle, endpoint)
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Close a session and forget it.
    pub async fn close(&self, id: &SessionId) -> Result<()> {
        let (_, handle) = self
            .sessions
            .remove(id)
            .ok_or_else(|| SandboxError::SessionNotFound {
                session_id: id.to_string(),
            })?;
        handle.close().await;
        Ok(())
    }

    /// Snapshots of every registered session, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self.sessions.iter().map(|e| e.value().info()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Number of sessions that are not closed.
    pub fn live_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|e| e.value().state() != SessionState::Closed)
            .count()
    }

    /// Drop closed sessions from the registry; returns how many were removed.
    pub fn prune_closed(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, handle| handle.state() != SessionState::Closed);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            debug!(pruned, "closed sessions pruned");
        }
        pruned
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct SessionActor {
    id: SessionId,
    session: SandboxSession,
    commands: mpsc::Receiver<Command>,
    inbound: mpsc::Receiver<ContextMessage>,
    outbound: mpsc::Sender<HostMessage>,
    /// Messages taken from the session but not yet accepted by the channel.
    unsent: VecDeque<HostMessage>,
    status: watch::Sender<SessionStatus>,
    handshake_deadline: Instant,
}

impl SessionActor {
    async fn run(mut self) {
        if self.session.context_created().is_ok() {
            self.stage();
        }
        self.publish();

        while !self.session.is_closed() {
            let handshaking = self.session.state() == SessionState::Handshaking;
            let sending = !self.unsent.is_empty();
            let mut drain = false;
            // Context messages first, then commands, then the deadline.
            // Delivery waits for channel space inside the select, so a
            // context that stops reading never blocks a close.
            tokio::select! {
                biased;
                message = self.inbound.recv() => match message {
                    Some(message) => {
                        if let Err(e) = self.session.receive(message) {
                            debug!(session_id = %self.id, error = %e, "context message rejected");
                        }
                    }
                    None => {
                        self.session.close(CloseReason::ContextGone);
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Update { markup, reply }) => {
                        let _ = reply.send(self.session.request_update(markup));
                    }
                    Some(Command::Close) | None => {
                        self.session.close(CloseReason::HostClosed);
                    }
                },
                () = sleep_until(self.handshake_deadline), if handshaking => {
                    if self.session.handshake_timed_out() {
                        warn!(session_id = %self.id, "handshake timed out, closing session");
                    }
                }
                permit = self.outbound.reserve(), if sending => match permit {
                    Ok(permit) => {
                        match self.unsent.pop_front() {
                            Some(message) => {
                                self.delivered(&message);
                                permit.send(message);
                            }
                            None => drop(permit),
                        }
                        drain = true;
                    }
                    Err(_) => {
                        self.session.close(CloseReason::ContextGone);
                    }
                },
            }
            if drain {
                self.drain_ready();
            }
            self.stage();
            self.publish();
        }

        if !self.unsent.is_empty() {
            debug!(session_id = %self.id, dropped = self.unsent.len(), "undelivered messages dropped");
        }
        info!(
            session_id = %self.id,
            reason = ?self.session.close_reason(),
            "preview session closed"
        );
    }

    /// Move the session's outbox behind anything still waiting, keeping order.
    fn stage(&mut self) {
        if self.session.is_closed() {
            return;
        }
        self.unsent.extend(self.session.take_outbox());
        self.drain_ready();
    }

    /// Hand over as many waiting messages as the channel has room for.
    fn drain_ready(&mut self) {
        while let Some(message) = self.unsent.pop_front() {
            match self.outbound.try_reserve() {
                Ok(permit) => {
                    self.delivered(&message);
                    permit.send(message);
                }
                Err(TrySendError::Full(())) => {
                    self.unsent.push_front(message);
                    return;
                }
                Err(TrySendError::Closed(())) => {
                    self.session.close(CloseReason::ContextGone);
                    self.unsent.clear();
                    return;
                }
            }
        }
    }

    fn delivered(&self, message: &HostMessage) {
        if let Some(revision) = message.revision() {
            debug!(session_id = %self.id, revision, "content delivered");
        }
    }

    fn publish(&self) {
        self.status.send_replace(SessionStatus::of(&self.session));
    }
}
