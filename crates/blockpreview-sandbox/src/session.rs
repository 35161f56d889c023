//! Per-preview protocol state machine.
//!
//! [`SandboxSession`] performs no I/O.  Every event the host observes is fed
//! in as a method call, and messages to send to the context accumulate in an
//! outbox that the driver drains with [`SandboxSession::take_outbox`].
//!
//! ```text
//! Uninitialized --context_created--> Handshaking --preview_ready--> Ready
//!       |                                 |                           |
//!       +---------------------------------+--------- close ----------+--> Closed
//! ```
//!
//! Updates requested before `Ready` are queued and flushed, in request
//! order, the moment `preview_ready` arrives.

use std::collections::VecDeque;
use std::fmt;

use blockpreview_sanitize::SafeMarkup;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SandboxError};
use crate::protocol::{ContextMessage, HostMessage};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Handshaking,
    Ready,
    /// Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Closed => "closed",
        })
    }
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The host (or the editor through it) closed the preview.
    HostClosed,
    /// The isolated context went away.
    ContextGone,
    /// No `preview_ready` within the handshake deadline.
    HandshakeTimeout,
    /// The context sent something the current state does not accept.
    ProtocolViolation,
}

/// Result of a successful update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateReceipt {
    /// Placed in the outbox for immediate delivery.
    Delivered { revision: u64 },
    /// Buffered until the context reports ready.
    Queued { revision: u64 },
}

impl UpdateReceipt {
    pub fn revision(&self) -> u64 {
        match self {
            Self::Delivered { revision } | Self::Queued { revision } => *revision,
        }
    }
}

/// State of one preview session.
#[derive(Debug)]
pub struct SandboxSession {
    state: SessionState,
    pending: VecDeque<HostMessage>,
    outbox: Vec<HostMessage>,
    next_revision: u64,
    last_acknowledged: Option<u64>,
    close_reason: Option<CloseReason>,
}

impl Default for SandboxSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            pending: VecDeque::new(),
            outbox: Vec::new(),
            next_revision: 1,
            last_acknowledged: None,
            close_reason: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Highest revision the context has acknowledged.
    pub fn last_acknowledged(&self) -> Option<u64> {
        self.last_acknowledged
    }

    /// Updates waiting for `preview_ready`.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drain messages that should now be sent to the context, in order.
    pub fn take_outbox(&mut self) -> Vec<HostMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// The isolated context exists: send the handshake and start waiting.
    pub fn context_created(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => {
                self.state = SessionState::Handshaking;
                self.outbox.push(HostMessage::Handshake);
                Ok(())
            }
            SessionState::Closed => Err(SandboxError::SessionClosed),
            state => Err(SandboxError::UnexpectedMessage {
                message: "context_created",
                state,
            }),
        }
    }

    /// Request delivery of new content.  Revisions are assigned here, so
    /// request order is delivery order.
    pub fn request_update(&mut self, markup: SafeMarkup) -> Result<UpdateReceipt> {
        if self.is_closed() {
            return Err(SandboxError::SessionClosed);
        }

        let revision = self.next_revision;
        self.next_revision += 1;
        let message = HostMessage::UpdateContent { revision, markup };

        if self.state == SessionState::Ready {
            self.outbox.push(message);
            Ok(UpdateReceipt::Delivered { revision })
        } else {
            self.pending.push_back(message);
            debug!(revision, state = %self.state, "update queued until ready");
            Ok(UpdateReceipt::Queued { revision })
        }
    }

    /// Apply a message from the context.
    ///
    /// `preview_ready` before the handshake is a protocol violation and
    /// closes the session; a repeated `preview_ready` is ignored.
    pub fn receive(&mut self, message: ContextMessage) -> Result<()> {
        match (self.state, message) {
            (SessionState::Closed, _) => Err(SandboxError::SessionClosed),

            (SessionState::Handshaking, ContextMessage::PreviewReady) => {
                self.state = SessionState::Ready;
                let flushed = self.pending.len();
                self.outbox.extend(self.pending.drain(..));
                debug!(flushed, "context ready");
                Ok(())
            }
            (SessionState::Ready, ContextMessage::PreviewReady) => {
                debug!("duplicate preview_ready ignored");
                Ok(())
            }
            (SessionState::Ready, ContextMessage::ContentAck { revision }) => {
                if revision >= self.next_revision {
                    warn!(revision, "acknowledgement for a revision never sent");
                } else if self.last_acknowledged.is_none_or(|last| revision > last) {
                    self.last_acknowledged = Some(revision);
                }
                Ok(())
            }

            (state, message) => {
                warn!(message = message.kind(), %state, "protocol violation, closing session");
                self.close(CloseReason::ProtocolViolation);
                Err(SandboxError::UnexpectedMessage {
                    message: message.kind(),
                    state,
                })
            }
        }
    }

    /// The handshake deadline passed.  Closes the session if it is still
    /// waiting for `preview_ready`; returns whether it did.
    pub fn handshake_timed_out(&mut self) -> bool {
        if self.state != SessionState::Handshaking {
            return false;
        }
        self.close(CloseReason::HandshakeTimeout)
    }

    /// Move to `Closed`, discarding queued updates and unsent messages.
    /// Returns `false` if the session was already closed.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = SessionState::Closed;
        self.close_reason = Some(reason);
        self.pending.clear();
        self.outbox.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use blockpreview_sanitize::{SanitizePolicy, sanitize};

    use super::*;

    fn markup(text: &str) -> SafeMarkup {
        sanitize(&format!("<p>{text}</p>"), &SanitizePolicy::default())
    }

    fn revisions(messages: &[HostMessage]) -> Vec<u64> {
        messages.iter().filter_map(HostMessage::revision).collect()
    }

    fn handshaking() -> SandboxSession {
        let mut s = SandboxSession::new();
        s.context_created().unwrap();
        assert_eq!(s.take_outbox(), [HostMessage::Handshake]);
        s
    }

    #[test]
    fn starts_uninitialized() {
        let s = SandboxSession::new();
        assert_eq!(s.state(), SessionState::Uninitialized);
        assert_eq!(s.last_acknowledged(), None);
        assert_eq!(s.close_reason(), None);
    }

    #[test]
    fn handshake_then_ready() {
        let mut s = handshaking();
        assert_eq!(s.state(), SessionState::Handshaking);
        s.receive(ContextMessage::PreviewReady).unwrap();
        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.take_outbox().is_empty());
    }

    #[test]
    fn updates_before_ready_flush_in_order() {
        let mut s = handshaking();
        for text in ["a", "b", "c"] {
            let receipt = s.request_update(markup(text)).unwrap();
            assert!(matches!(receipt, UpdateReceipt::Queued { .. }));
        }
        assert!(s.take_outbox().is_empty());
        assert_eq!(s.pending_len(), 3);

        s.receive(ContextMessage::PreviewReady).unwrap();
        assert_eq!(revisions(&s.take_outbox()), [1, 2, 3]);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn updates_while_ready_are_delivered() {
        let mut s = handshaking();
        s.receive(ContextMessage::PreviewReady).unwrap();
        assert_eq!(
            s.request_update(markup("x")).unwrap(),
            UpdateReceipt::Delivered { revision: 1 }
        );
        assert_eq!(s.request_update(markup("y")).unwrap().revision(), 2);
        assert_eq!(revisions(&s.take_outbox()), [1, 2]);
    }

    #[test]
    fn updates_before_context_are_queued_too() {
        let mut s = SandboxSession::new();
        s.request_update(markup("early")).unwrap();
        s.context_created().unwrap();
        s.receive(ContextMessage::PreviewReady).unwrap();
        let out = s.take_outbox();
        assert_eq!(out[0], HostMessage::Handshake);
        assert_eq!(revisions(&out), [1]);
    }

    #[test]
    fn acknowledgements_track_highest_revision() {
        let mut s = handshaking();
        s.receive(ContextMessage::PreviewReady).unwrap();
        s.request_update(markup("1")).unwrap();
        s.request_update(markup("2")).unwrap();
        s.receive(ContextMessage::ContentAck { revision: 2 }).unwrap();
        s.receive(ContextMessage::ContentAck { revision: 1 }).unwrap();
        s.receive(ContextMessage::ContentAck { revision: 99 }).unwrap();
        assert_eq!(s.last_acknowledged(), Some(2));
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn duplicate_ready_is_ignored() {
        let mut s = handshaking();
        s.receive(ContextMessage::PreviewReady).unwrap();
        s.receive(ContextMessage::PreviewReady).unwrap();
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn ready_before_handshake_is_a_violation() {
        let mut s = SandboxSession::new();
        s.request_update(markup("queued")).unwrap();
        let err = s.receive(ContextMessage::PreviewReady).unwrap_err();
        assert!(matches!(err, SandboxError::UnexpectedMessage { .. }));
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.close_reason(), Some(CloseReason::ProtocolViolation));
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn ack_while_handshaking_is_a_violation() {
        let mut s = handshaking();
        assert!(s.receive(ContextMessage::ContentAck { revision: 1 }).is_err());
        assert_eq!(s.close_reason(), Some(CloseReason::ProtocolViolation));
    }

    #[test]
    fn timeout_closes_only_while_handshaking() {
        let mut ready = handshaking();
        ready.receive(ContextMessage::PreviewReady).unwrap();
        assert!(!ready.handshake_timed_out());
        assert_eq!(ready.state(), SessionState::Ready);

        let mut waiting = handshaking();
        waiting.request_update(markup("lost")).unwrap();
        assert!(waiting.handshake_timed_out());
        assert_eq!(waiting.close_reason(), Some(CloseReason::HandshakeTimeout));
        assert!(matches!(
            waiting.request_update(markup("late")),
            Err(SandboxError::SessionClosed)
        ));
    }

    #[test]
    fn close_is_idempotent_and_discards_queue() {
        let mut s = handshaking();
        s.request_update(markup("a")).unwrap();
        assert!(s.close(CloseReason::HostClosed));
        assert!(!s.close(CloseReason::ContextGone));
        assert_eq!(s.close_reason(), Some(CloseReason::HostClosed));
        assert_eq!(s.pending_len(), 0);
        assert!(s.take_outbox().is_empty());
        assert!(matches!(
            s.receive(ContextMessage::PreviewReady),
            Err(SandboxError::SessionClosed)
        ));
        assert!(matches!(s.context_created(), Err(SandboxError::SessionClosed)));
    }

    #[test]
    fn context_created_twice_is_rejected() {
        let mut s = handshaking();
        assert!(matches!(
            s.context_created(),
            Err(SandboxError::UnexpectedMessage { .. })
        ));
        assert_eq!(s.state(), SessionState::Handshaking);
    }
}
