//! Allow-list sanitizer.
//!
//! Input is tokenized, filtered against a [`SanitizePolicy`] and re-serialized
//! in a canonical form.  Only tags this module writes itself can appear in the
//! output, so the result is well-formed regardless of how broken the input
//! was, and sanitizing it again is a no-op.
//!
//! Newlines inside removed text and removed attribute values are written back
//! as text where the removed part stood, so a line of the input keeps its
//! line number in the output.

use std::fmt;
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use serde::Serialize;

use crate::policy::{ALWAYS_STRIPPED_TAGS, RAW_TEXT_TAGS, SanitizePolicy, URL_ATTRIBUTES, VOID_TAGS};
use crate::tokenizer::{Attribute, Token, Tokenizer};

/// Maximum element nesting written to the output; deeper start tags are
/// dropped (their text is kept).
pub const MAX_DEPTH: usize = 512;

/// Style fragments that can load resources or run code.  Matched after all
/// whitespace is removed.
const UNSAFE_STYLE_PATTERNS: &[&str] = &[
    "url(",
    "expression(",
    "javascript:",
    "vbscript:",
    "@import",
    "behavior",
    "-moz-binding",
    "image(",
    "image-set(",
    "\\",
    "<",
    "/*",
];

static UNSAFE_STYLE: LazyLock<Option<AhoCorasick>> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(UNSAFE_STYLE_PATTERNS)
        .ok()
});

// ---------------------------------------------------------------------------
// SafeMarkup
// ---------------------------------------------------------------------------

/// Markup that has passed through [`sanitize`].
///
/// There is no public constructor and no `Deserialize` impl; holding a
/// `SafeMarkup` proves the content went through the sanitizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SafeMarkup(String);

impl SafeMarkup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for SafeMarkup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a sanitize pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    /// Start tags dropped, including every element inside a removed subtree.
    pub removed_elements: usize,
    pub removed_attributes: usize,
    /// Whether any of the removals was a script-capable construct.
    pub script_like: bool,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.removed_elements == 0 && self.removed_attributes == 0
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Sanitize `input` under `policy`.
pub fn sanitize(input: &str, policy: &SanitizePolicy) -> SafeMarkup {
    sanitize_with_report(input, policy).0
}

/// Sanitize `input` under `policy`, also returning what was removed.
pub fn sanitize_with_report(input: &str, policy: &SanitizePolicy) -> (SafeMarkup, SanitizeReport) {
    let mut writer = Writer::new(policy, input.len());
    for token in Tokenizer::new(input) {
        writer.token(token);
    }
    let (markup, report) = writer.finish();

    if report.script_like {
        tracing::warn!(
            removed_elements = report.removed_elements,
            removed_attributes = report.removed_attributes,
            "script-capable markup removed"
        );
    } else if !report.is_clean() {
        tracing::debug!(
            removed_elements = report.removed_elements,
            removed_attributes = report.removed_attributes,
            "markup outside policy removed"
        );
    }

    (SafeMarkup(markup), report)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// A disallowed element whose subtree is being discarded.
struct Skip {
    name: String,
    depth: usize,
}

struct Writer<'p> {
    policy: &'p SanitizePolicy,
    out: String,
    open: Vec<String>,
    skip: Option<Skip>,
    report: SanitizeReport,
}

impl<'p> Writer<'p> {
    fn new(policy: &'p SanitizePolicy, capacity: usize) -> Self {
        Self {
            policy,
            out: String::with_capacity(capacity),
            open: Vec::new(),
            skip: None,
            report: SanitizeReport::default(),
        }
    }

    fn token(&mut self, token: Token) {
        if let Some(skip) = &mut self.skip {
            match token {
                Token::Text(text) => push_newlines(&text, &mut self.out),
                Token::StartTag {
                    name, attributes, ..
                } => {
                    self.report.removed_elements += 1;
                    if ALWAYS_STRIPPED_TAGS.contains(&name.as_str()) {
                        self.report.script_like = true;
                    }
                    // `<name/>` still opens a non-void element.
                    if name == skip.name && !is_void(&name) {
                        skip.depth += 1;
                    }
                    for attribute in &attributes {
                        push_newlines(&attribute.value, &mut self.out);
                    }
                }
                Token::EndTag { name } if name == skip.name => {
                    skip.depth -= 1;
                    if skip.depth == 0 {
                        self.skip = None;
                    }
                }
                Token::EndTag { .. } => {}
            }
            return;
        }

        match token {
            Token::Text(text) => escape_text(&text, &mut self.out),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => self.start_tag(name, attributes, self_closing),
            Token::EndTag { name } => self.end_tag(&name),
        }
    }

    fn start_tag(&mut self, name: String, attributes: Vec<Attribute>, self_closing: bool) {
        let void = is_void(&name);

        if !is_valid_name(&name) || !self.policy.permits_tag(&name) {
            self.report.removed_elements += 1;
            if ALWAYS_STRIPPED_TAGS.contains(&name.as_str()) {
                self.report.script_like = true;
            }
            for attribute in &attributes {
                push_newlines(&attribute.value, &mut self.out);
            }
            // Raw-text content was already discarded by the tokenizer.
            if !void && !self_closing && !RAW_TEXT_TAGS.contains(&name.as_str()) {
                self.skip = Some(Skip { name, depth: 1 });
            }
            return;
        }

        if !void && self.open.len() >= MAX_DEPTH {
            self.report.removed_elements += 1;
            for attribute in &attributes {
                push_newlines(&attribute.value, &mut self.out);
            }
            return;
        }

        self.out.push('<');
        self.out.push_str(&name);
        let dropped_newlines = self.write_attributes(attributes);
        self.out.push('>');
        self.out.extend(std::iter::repeat_n('\n', dropped_newlines));

        if void {
            return;
        }
        if self_closing {
            self.write_end(&name);
        } else {
            self.open.push(name);
        }
    }

    /// Write the safe attributes; returns how many newlines the dropped ones
    /// carried.
    fn write_attributes(&mut self, attributes: Vec<Attribute>) -> usize {
        let mut seen: Vec<String> = Vec::with_capacity(attributes.len());
        let mut dropped_newlines = 0;
        for Attribute { name, value } in attributes {
            if seen.contains(&name) {
                dropped_newlines += count_newlines(&value);
                continue;
            }
            if !self.attribute_is_safe(&name, &value) {
                self.report.removed_attributes += 1;
                dropped_newlines += count_newlines(&value);
                seen.push(name);
                continue;
            }
            self.out.push(' ');
            self.out.push_str(&name);
            self.out.push_str("=\"");
            escape_attr(&value, &mut self.out);
            self.out.push('"');
            seen.push(name);
        }
        dropped_newlines
    }

    fn attribute_is_safe(&mut self, name: &str, value: &str) -> bool {
        if name.starts_with("on") {
            self.report.script_like = true;
            return false;
        }
        if !is_valid_attribute_name(name) || !self.policy.permits_attribute(name) {
            return false;
        }
        if URL_ATTRIBUTES.contains(&name) && !is_safe_url(value) {
            self.report.script_like = true;
            return false;
        }
        if name == "style" && !is_safe_style(value) {
            self.report.script_like = true;
            return false;
        }
        true
    }

    fn end_tag(&mut self, name: &str) {
        if is_void(name) {
            return;
        }
        let Some(idx) = self.open.iter().rposition(|open| open == name) else {
            return;
        };
        while self.open.len() > idx {
            if let Some(open) = self.open.pop() {
                self.write_end(&open);
            }
        }
    }

    fn write_end(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn finish(mut self) -> (String, SanitizeReport) {
        while let Some(open) = self.open.pop() {
            self.write_end(&open);
        }
        (self.out, self.report)
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | ':' | '.')
        })
}

/// Relative references and `http`/`https` URLs only.
///
/// Browsers ignore whitespace and control characters inside a scheme, so
/// they are removed before the scheme is inspected.
pub(crate) fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let path_start = compact.find(['/', '?', '#']).unwrap_or(compact.len());
    match compact[..path_start].find(':') {
        None => true,
        Some(colon) => {
            let scheme = &compact[..colon];
            scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
        }
    }
}

pub(crate) fn is_safe_style(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    match UNSAFE_STYLE.as_ref() {
        Some(matcher) => !matcher.is_match(&compact),
        // Without the matcher no style can be vetted.
        None => false,
    }
}

fn count_newlines(input: &str) -> usize {
    input.bytes().filter(|&b| b == b'\n').count()
}

/// Keep only the line breaks of removed content.
fn push_newlines(input: &str, out: &mut String) {
    out.extend(std::iter::repeat_n('\n', count_newlines(input)));
}

fn escape_text(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
