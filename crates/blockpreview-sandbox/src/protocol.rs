//! Host/context protocol messages.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```text
//! host -> context   {"type":"handshake"}
//! host -> context   {"type":"update_content","revision":3,"markup":"<p>Hi</p>"}
//! context -> host   {"type":"preview_ready"}
//! context -> host   {"type":"content_ack","revision":3}
//! ```
//!
//! [`HostMessage`] is serialize-only: its markup is [`SafeMarkup`], which can
//! only come from the sanitizer.

use blockpreview_sanitize::SafeMarkup;
use serde::{Deserialize, Serialize};

/// A message the host sends into the isolated context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Solicits `preview_ready`.  Sent as soon as the context exists.
    Handshake,
    /// Replaces the rendered content.  Revisions strictly increase per
    /// session, starting at 1.
    UpdateContent { revision: u64, markup: SafeMarkup },
}

impl HostMessage {
    /// Wire name of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::UpdateContent { .. } => "update_content",
        }
    }

    pub fn revision(&self) -> Option<u64> {
        match self {
            Self::Handshake => None,
            Self::UpdateContent { revision, .. } => Some(*revision),
        }
    }
}

/// A message the isolated context sends back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextMessage {
    /// The context is listening; moves the session to `Ready`.
    PreviewReady,
    /// The context rendered `revision`.  Diagnostics only; the host never
    /// waits for it.
    ContentAck { revision: u64 },
}

impl ContextMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PreviewReady => "preview_ready",
            Self::ContentAck { .. } => "content_ack",
        }
    }
}

#[cfg(test)]
mod tests {
    use blockpreview_sanitize::{SanitizePolicy, sanitize};
    use serde_json::json;

    use super::*;

    #[test]
    fn host_messages_serialize_with_type_tag() {
        assert_eq!(
            serde_json::to_value(HostMessage::Handshake).unwrap(),
            json!({ "type": "handshake" })
        );
        let markup = sanitize("<p>Hi</p>", &SanitizePolicy::default());
        assert_eq!(
            serde_json::to_value(HostMessage::UpdateContent { revision: 2, markup }).unwrap(),
            json!({ "type": "update_content", "revision": 2, "markup": "<p>Hi</p>" })
        );
    }

    #[test]
    fn context_messages_parse() {
        let ready: ContextMessage = serde_json::from_str(r#"{"type":"preview_ready"}"#).unwrap();
        assert_eq!(ready, ContextMessage::PreviewReady);
        let ack: ContextMessage =
            serde_json::from_str(r#"{"type":"content_ack","revision":7}"#).unwrap();
        assert_eq!(ack, ContextMessage::ContentAck { revision: 7 });
    }

    #[test]
    fn unknown_context_message_is_rejected() {
        assert!(serde_json::from_str::<ContextMessage>(r#"{"type":"navigate","to":"/"}"#).is_err());
        assert!(serde_json::from_str::<ContextMessage>(r#"{"type":"handshake"}"#).is_err());
    }
}
