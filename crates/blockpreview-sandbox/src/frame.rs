//! Isolated frame policy.
//!
//! The preview renders inside an `<iframe sandbox srcdoc=...>`.  The frame is
//! never given `allow-same-origin`: with scripts enabled that token lets the
//! frame remove its own sandbox.  Navigation, popups and forms are never
//! allowed either, so the only token that can ever appear is
//! `allow-scripts`.
//!
//! The `srcdoc` document carries its own CSP: images, media and fonts may
//! only come from the asset proxy, and nothing else may be fetched.

use blockpreview_sanitize::SafeMarkup;

use crate::config::SandboxConfig;

/// Path the asset proxy is mounted at.
pub const ASSET_PROXY_PATH: &str = "/api/preview/asset";

/// Tokens that must never appear in the frame's `sandbox` attribute.
pub const FORBIDDEN_SANDBOX_TOKENS: &[&str] = &[
    "allow-same-origin",
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
    "allow-popups",
    "allow-popups-to-escape-sandbox",
    "allow-forms",
    "allow-modals",
];

/// Listener that answers the host protocol from inside the frame.  Included
/// only when scripts are allowed.
const BOOTSTRAP_SCRIPT: &str = r#"(function () {
  var root = document.getElementById("preview-root");
  window.addEventListener("message", function (event) {
    if (event.source !== window.parent) return;
    var msg = event.data || {};
    if (msg.type === "handshake") {
      window.parent.postMessage({ type: "preview_ready" }, "*");
    } else if (msg.type === "update_content" && typeof msg.markup === "string") {
      root.innerHTML = msg.markup;
      window.parent.postMessage({ type: "content_ack", revision: msg.revision }, "*");
    }
  });
})();"#;

/// Builds the frame's `sandbox` attribute and `srcdoc` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePolicy {
    allow_scripts: bool,
    asset_source: Option<String>,
}

impl FramePolicy {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            allow_scripts: config.allow_scripts,
            asset_source: None,
        }
    }

    /// Absolute origin the asset proxy is served from, e.g.
    /// `http://127.0.0.1:3000`.  A `srcdoc` frame has an opaque origin, so
    /// CSP needs the host spelled out; without it no assets load.
    pub fn with_asset_origin(mut self, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        let valid = !origin.is_empty()
            && origin
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '/' | '.' | '-' | '[' | ']'));
        self.asset_source = valid.then(|| format!("{origin}{ASSET_PROXY_PATH}"));
        self
    }

    /// Value for the iframe's `sandbox` attribute.  Empty means every
    /// restriction applies.
    pub fn sandbox_attribute(&self) -> &'static str {
        if self.allow_scripts { "allow-scripts" } else { "" }
    }

    /// Policy for the frame document.
    pub fn content_security_policy(&self) -> String {
        let assets = self.asset_source.as_deref().unwrap_or("'none'");
        let scripts = if self.allow_scripts { "'unsafe-inline'" } else { "'none'" };
        format!(
            "default-src 'none'; img-src {assets}; media-src {assets}; font-src {assets}; \
             style-src 'unsafe-inline'; script-src {scripts}; base-uri 'none'; form-action 'none'"
        )
    }

    /// The complete `srcdoc` document wrapping `markup`.
    pub fn document(&self, markup: &SafeMarkup) -> String {
        let mut doc = String::with_capacity(markup.len() + 1024);
        doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        doc.push_str("<meta http-equiv=\"Content-Security-Policy\" content=\"");
        doc.push_str(&self.content_security_policy().replace('"', "&quot;"));
        doc.push_str("\">\n<meta name=\"referrer\" content=\"no-referrer\">\n</head>\n<body>\n");
        doc.push_str("<div id=\"preview-root\">\n");
        doc.push_str(markup.as_str());
        doc.push_str("\n</div>\n");
        if self.allow_scripts {
            doc.push_str("<script>\n");
            doc.push_str(BOOTSTRAP_SCRIPT);
            doc.push_str("\n</script>\n");
        }
        doc.push_str("</body>\n</html>\n");
        doc
    }
}

#[cfg(test)]
mod tests {
    use blockpreview_sanitize::{SanitizePolicy, sanitize};

    use super::*;

    fn markup() -> SafeMarkup {
        sanitize("<p>Hi</p>", &SanitizePolicy::default())
    }

    #[test]
    fn sandbox_never_grants_forbidden_tokens() {
        for allow in [false, true] {
            let policy = FramePolicy::new(&SandboxConfig::new().with_allow_scripts(allow));
            let attr = policy.sandbox_attribute();
            for token in FORBIDDEN_SANDBOX_TOKENS {
                assert!(!attr.split_whitespace().any(|t| t == *token), "{attr}");
            }
        }
    }

    #[test]
    fn scripts_only_when_configured() {
        let locked = FramePolicy::new(&SandboxConfig::default());
        assert_eq!(locked.sandbox_attribute(), "");
        assert!(!locked.document(&markup()).contains("<script>"));
        assert!(locked.content_security_policy().contains("script-src 'none'"));

        let open = FramePolicy::new(&SandboxConfig::new().with_allow_scripts(true));
        assert_eq!(open.sandbox_attribute(), "allow-scripts");
        assert!(open.document(&markup()).contains("preview_ready"));
    }

    #[test]
    fn csp_limits_assets_to_proxy() {
        let policy = FramePolicy::new(&SandboxConfig::default());
        assert!(policy.content_security_policy().contains("img-src 'none'"));

        let policy = policy.with_asset_origin("http://127.0.0.1:3000/");
        let csp = policy.content_security_policy();
        assert!(csp.starts_with("default-src 'none';"));
        assert!(csp.contains("img-src http://127.0.0.1:3000/api/preview/asset;"));
        assert!(csp.contains("media-src http://127.0.0.1:3000/api/preview/asset;"));
    }

    #[test]
    fn hostile_origin_is_ignored() {
        let policy = FramePolicy::new(&SandboxConfig::default())
            .with_asset_origin("http://x; script-src *");
        assert!(policy.content_security_policy().contains("img-src 'none'"));
    }

    #[test]
    fn document_wraps_markup() {
        let doc = FramePolicy::new(&SandboxConfig::default()).document(&markup());
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<div id=\"preview-root\">\n<p>Hi</p>\n</div>"));
        assert!(doc.contains("http-equiv=\"Content-Security-Policy\""));
    }
}
