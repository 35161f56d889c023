//! Settings for the `blockpreview` binary.
//!
//! Read from `config/default.toml` (every section and key optional), then
//! overridden by `BLOCKPREVIEW_*` environment variables, which may come
//! from a `.env` file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use blockpreview_assets::AssetConfig;
use blockpreview_sandbox::SandboxConfig;
use blockpreview_sanitize::SanitizePolicy;
use blockpreview_web::WebConfig;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub port: u16,
    pub public_origin: Option<String>,
    pub prune_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let web = WebConfig::default();
        Self {
            bind_addr: web.bind_addr,
            port: web.port,
            public_origin: web.public_origin,
            prune_interval_secs: web.prune_interval_secs,
        }
    }
}

/// `[assets]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    pub root: PathBuf,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            root: AssetConfig::default().root,
        }
    }
}

/// `[sandbox]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub handshake_timeout_ms: u64,
    pub mailbox_capacity: usize,
    pub allow_scripts: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let sandbox = SandboxConfig::default();
        Self {
            handshake_timeout_ms: sandbox.handshake_timeout_ms,
            mailbox_capacity: sandbox.mailbox_capacity,
            allow_scripts: sandbox.allow_scripts,
        }
    }
}

/// Starting point for the sanitize policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    #[default]
    Preview,
    Strict,
    Custom,
}

/// `[sanitize]`: a preset extended by explicit lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SanitizeSettings {
    pub preset: PolicyPreset,
    pub allowed_tags: Vec<String>,
    pub allowed_attributes: Vec<String>,
    pub denied_tags: Vec<String>,
    pub denied_attributes: Vec<String>,
}

// ---------------------------------------------------------------------------
// PreviewSettings
// ---------------------------------------------------------------------------

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    pub server: ServerSettings,
    pub assets: AssetSettings,
    pub sandbox: SandboxSettings,
    pub sanitize: SanitizeSettings,
}

impl PreviewSettings {
    /// Load `path` (defaults if it does not exist), then apply environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let settings = Self::from_toml(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            info!(path = %path.display(), "settings loaded");
            settings
        } else {
            debug!(path = %path.display(), "settings file not found, using defaults");
            Self::default()
        };
        settings.apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `BLOCKPREVIEW_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("BLOCKPREVIEW_BIND") {
            self.server.bind_addr = bind;
        }
        if let Some(port) = lookup("BLOCKPREVIEW_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("BLOCKPREVIEW_PORT is not a port: {port}"))?;
        }
        if let Some(root) = lookup("BLOCKPREVIEW_ASSET_ROOT") {
            self.assets.root = PathBuf::from(root);
        }
        if let Some(ms) = lookup("BLOCKPREVIEW_HANDSHAKE_TIMEOUT_MS") {
            self.sandbox.handshake_timeout_ms = ms
                .parse()
                .with_context(|| format!("BLOCKPREVIEW_HANDSHAKE_TIMEOUT_MS is not a number: {ms}"))?;
        }
        if let Some(flag) = lookup("BLOCKPREVIEW_ALLOW_SCRIPTS") {
            self.sandbox.allow_scripts = parse_flag(&flag)
                .with_context(|| format!("BLOCKPREVIEW_ALLOW_SCRIPTS is not a boolean: {flag}"))?;
        }
        Ok(())
    }

    pub fn web_config(&self) -> WebConfig {
        let config = WebConfig::new()
            .with_bind_addr(self.server.bind_addr.clone())
            .with_port(self.server.port)
            .with_prune_interval_secs(self.server.prune_interval_secs);
        match &self.server.public_origin {
            Some(origin) => config.with_public_origin(origin.clone()),
            None => config,
        }
    }

    pub fn asset_config(&self) -> AssetConfig {
        AssetConfig::new().with_root(self.assets.root.clone())
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::new()
            .with_handshake_timeout_ms(self.sandbox.handshake_timeout_ms)
            .with_mailbox_capacity(self.sandbox.mailbox_capacity)
            .with_allow_scripts(self.sandbox.allow_scripts)
    }

    pub fn sanitize_policy(&self) -> SanitizePolicy {
        let s = &self.sanitize;
        let base = match s.preset {
            PolicyPreset::Preview => SanitizePolicy::default(),
            PolicyPreset::Strict => SanitizePolicy::strict(),
            PolicyPreset::Custom => SanitizePolicy::empty(),
        };
        base.allow_tags(&s.allowed_tags)
            .allow_attributes(&s.allowed_attributes)
            .deny_tags(&s.denied_tags)
            .deny_attributes(&s.denied_attributes)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
