//! Sanitize policy.
//!
//! A [`SanitizePolicy`] is an allow-list of tag and attribute names plus
//! deny-lists that take precedence over it.  On top of any policy, a fixed
//! set of script-capable constructs is always stripped (see
//! [`ALWAYS_STRIPPED_TAGS`] and [`ALWAYS_STRIPPED_ATTRIBUTES`]); no caller
//! configuration can re-enable them.
//!
//! Policies are plain values passed into every sanitize call.  All names are
//! stored lowercase.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Tags removed regardless of policy.
pub const ALWAYS_STRIPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet", "base",
    "link", "meta", "template", "noscript", "noembed", "noframes", "svg", "math", "form",
    "input", "button", "select", "option", "textarea", "title", "xmp", "plaintext", "portal",
    "slot",
];

/// Elements whose content is raw text: everything up to the matching end
/// tag is discarded together with the element.
pub const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes",
    "noscript", "plaintext",
];

/// Attributes removed regardless of policy, in addition to every `on*`
/// event handler.
pub const ALWAYS_STRIPPED_ATTRIBUTES: &[&str] = &[
    "srcdoc", "srcset", "formaction", "action", "ping", "xmlns", "is", "autofocus",
];

/// Attributes holding URLs; only `http`, `https` and relative references
/// survive.
pub const URL_ATTRIBUTES: &[&str] = &[
    "href", "src", "cite", "poster", "background", "longdesc", "xlink:href", "data",
];

/// Elements that never have content or an end tag.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

const DEFAULT_TAGS: &[&str] = &[
    "p", "div", "span", "strong", "em", "b", "i", "u", "a", "h1", "h2", "h3", "h4", "h5",
    "h6", "img", "br", "hr", "ul", "ol", "li", "blockquote", "code", "pre",
];

const DEFAULT_ATTRIBUTES: &[&str] = &["href", "src", "alt", "title", "style", "class"];

const STRICT_TAGS: &[&str] = &[
    "p", "span", "strong", "em", "b", "i", "u", "h1", "h2", "h3", "h4", "h5", "h6", "br",
    "ul", "ol", "li", "blockquote",
];

const STRICT_ATTRIBUTES: &[&str] = &["title"];

const DEFAULT_DENIED_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed"];

const DEFAULT_DENIED_ATTRIBUTES: &[&str] = &["onerror", "onload", "srcdoc"];

/// Allow and deny lists for markup that may reach the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PolicyLists", into = "PolicyLists")]
pub struct SanitizePolicy {
    allowed_tags: BTreeSet<String>,
    allowed_attributes: BTreeSet<String>,
    denied_tags: BTreeSet<String>,
    denied_attributes: BTreeSet<String>,
}

/// Serialized form of a policy, as found in configuration files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PolicyLists {
    allowed_tags: Vec<String>,
    allowed_attributes: Vec<String>,
    denied_tags: Vec<String>,
    denied_attributes: Vec<String>,
}

impl From<PolicyLists> for SanitizePolicy {
    fn from(lists: PolicyLists) -> Self {
        Self::empty()
            .allow_tags(lists.allowed_tags)
            .allow_attributes(lists.allowed_attributes)
            .deny_tags(lists.denied_tags)
            .deny_attributes(lists.denied_attributes)
    }
}

impl From<SanitizePolicy> for PolicyLists {
    fn from(policy: SanitizePolicy) -> Self {
        Self {
            allowed_tags: policy.allowed_tags.into_iter().collect(),
            allowed_attributes: policy.allowed_attributes.into_iter().collect(),
            denied_tags: policy.denied_tags.into_iter().collect(),
            denied_attributes: policy.denied_attributes.into_iter().collect(),
        }
    }
}

impl Default for SanitizePolicy {
    /// The preview policy: everything the code generator emits plus common
    /// inline formatting.
    fn default() -> Self {
        Self::empty()
            .allow_tags(DEFAULT_TAGS.iter().copied())
            .allow_attributes(DEFAULT_ATTRIBUTES.iter().copied())
            .deny_tags(DEFAULT_DENIED_TAGS.iter().copied())
            .deny_attributes(DEFAULT_DENIED_ATTRIBUTES.iter().copied())
    }
}

fn lowercase_all<I, S>(names: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
}

impl SanitizePolicy {
    /// A policy that allows nothing; only text survives.
    pub fn empty() -> Self {
        Self {
            allowed_tags: BTreeSet::new(),
            allowed_attributes: BTreeSet::new(),
            denied_tags: BTreeSet::new(),
            denied_attributes: BTreeSet::new(),
        }
    }

    /// Text-level formatting only: no links, images or styles.
    pub fn strict() -> Self {
        Self::empty()
            .allow_tags(STRICT_TAGS.iter().copied())
            .allow_attributes(STRICT_ATTRIBUTES.iter().copied())
            .deny_tags(DEFAULT_DENIED_TAGS.iter().copied())
            .deny_attributes(DEFAULT_DENIED_ATTRIBUTES.iter().copied())
    }

    pub fn allow_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_tags.extend(lowercase_all(tags));
        self
    }

    pub fn allow_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_attributes.extend(lowercase_all(attributes));
        self
    }

    pub fn deny_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denied_tags.extend(lowercase_all(tags));
        self
    }

    pub fn deny_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denied_attributes.extend(lowercase_all(attributes));
        self
    }

    /// Whether an element named `tag` (lowercase) may appear in output.
    ///
    /// Deny wins over allow, and the always-stripped set wins over both.
    pub fn permits_tag(&self, tag: &str) -> bool {
        !ALWAYS_STRIPPED_TAGS.contains(&tag)
            && !self.denied_tags.contains(tag)
            && self.allowed_tags.contains(tag)
    }

    /// Whether an attribute named `attribute` (lowercase) may appear in
    /// output, before any value checks.
    pub fn permits_attribute(&self, attribute: &str) -> bool {
        !attribute.starts_with("on")
            && !ALWAYS_STRIPPED_ATTRIBUTES.contains(&attribute)
            && !self.denied_attributes.contains(attribute)
            && self.allowed_attributes.contains(attribute)
    }

    pub fn allowed_tags(&self) -> impl Iterator<Item = &str> {
        self.allowed_tags.iter().map(String::as_str)
    }

    pub fn allowed_attributes(&self) -> impl Iterator<Item = &str> {
        self.allowed_attributes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_permits_generated_tags() {
        let policy = SanitizePolicy::default();
        for tag in ["p", "h1", "h6", "img", "a", "span"] {
            assert!(policy.permits_tag(tag), "{tag} should be allowed");
        }
        for attr in ["src", "alt", "href", "style"] {
            assert!(policy.permits_attribute(attr), "{attr} should be allowed");
        }
    }

    #[test]
    fn deny_wins_over_allow() {
        let policy = SanitizePolicy::empty()
            .allow_tags(["p", "marquee"])
            .deny_tags(["marquee"])
            .allow_attributes(["title", "lang"])
            .deny_attributes(["lang"]);
        assert!(policy.permits_tag("p"));
        assert!(!policy.permits_tag("marquee"));
        assert!(policy.permits_attribute("title"));
        assert!(!policy.permits_attribute("lang"));
    }

    #[test]
    fn always_stripped_ignores_policy() {
        let policy = SanitizePolicy::empty()
            .allow_tags(["script", "style", "iframe"])
            .allow_attributes(["onclick", "onerror", "srcdoc", "formaction"]);
        assert!(!policy.permits_tag("script"));
        assert!(!policy.permits_tag("style"));
        assert!(!policy.permits_tag("iframe"));
        assert!(!policy.permits_attribute("onclick"));
        assert!(!policy.permits_attribute("onerror"));
        assert!(!policy.permits_attribute("srcdoc"));
        assert!(!policy.permits_attribute("formaction"));
    }

    #[test]
    fn names_are_lowercased() {
        let policy = SanitizePolicy::empty().allow_tags([" P ", "EM"]);
        assert!(policy.permits_tag("p"));
        assert!(policy.permits_tag("em"));
    }

    #[test]
    fn strict_policy_has_no_urls_or_styles() {
        let policy = SanitizePolicy::strict();
        assert!(!policy.permits_tag("a"));
        assert!(!policy.permits_tag("img"));
        assert!(!policy.permits_attribute("style"));
        assert!(!policy.permits_attribute("href"));
    }

    #[test]
    fn deserializes_from_lists() {
        let policy: SanitizePolicy = serde_json::from_value(serde_json::json!({
            "allowed_tags": ["P", "b"],
            "denied_tags": ["b"]
        }))
        .unwrap();
        assert!(policy.permits_tag("p"));
        assert!(!policy.permits_tag("b"));
        assert_eq!(policy.allowed_attributes().count(), 0);
    }
}
