//! Sandbox configuration.
//!
//! [`SandboxConfig`] controls the handshake deadline, per-session mailbox
//! size and whether the isolated frame may run scripts at all.  Defaults
//! come from the [`Default`] implementation; a builder-style API customises
//! individual fields.

use std::time::Duration;

/// Limits and permissions applied to every preview session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// How long a freshly created context has to answer the handshake, in
    /// milliseconds.
    ///
    /// Default: **5 000 ms**.
    pub handshake_timeout_ms: u64,

    /// Capacity of each session's command and message channels.
    ///
    /// Default: **64**.
    pub mailbox_capacity: usize,

    /// Whether the isolated frame may execute script.  Only the frame's own
    /// bootstrap listener ever runs; sanitized markup carries none.
    ///
    /// Default: **false**.
    pub allow_scripts: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5000,
            mailbox_capacity: 64,
            allow_scripts: false,
        }
    }
}

impl SandboxConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handshake deadline (in milliseconds).
    pub fn with_handshake_timeout_ms(mut self, ms: u64) -> Self {
        self.handshake_timeout_ms = ms;
        self
    }

    /// Set the per-session channel capacity.  Zero is raised to one.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Allow or forbid script execution inside the frame.
    pub fn with_allow_scripts(mut self, allow: bool) -> Self {
        self.allow_scripts = allow;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
