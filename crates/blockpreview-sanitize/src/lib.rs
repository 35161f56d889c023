//! BlockPreview content sanitizer.
//!
//! Every piece of markup destined for the sandboxed preview passes through
//! here exactly once:
//!
//! - **[`policy`]** -- [`SanitizePolicy`], the allow/deny lists threaded
//!   into every call, plus the policy-independent always-stripped sets.
//! - **[`sanitizer`]** -- [`sanitize`], [`sanitize_with_report`] and the
//!   [`SafeMarkup`] proof type.
//!
//! Sanitizing is total and idempotent: any input yields well-formed output,
//! and sanitizing that output again returns it unchanged.

pub mod policy;
pub mod sanitizer;
mod tokenizer;

pub use policy::SanitizePolicy;
pub use sanitizer::{MAX_DEPTH, SafeMarkup, SanitizeReport, sanitize, sanitize_with_report};
