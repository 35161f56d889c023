//! Validated payload values.
//!
//! These newtypes are the only way to put a heading level, colour or font
//! size into a [`BlockKind`](crate::BlockKind).  Validation happens once at
//! the wire boundary so the code generator can format them without further
//! checks.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// `None` only if the pattern fails to compile, in which case every colour
/// is rejected.
static CSS_COLOR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:#(?:[0-9a-fA-F]{3,4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})|[a-zA-Z]{1,32})$").ok()
});

/// Heading level, `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    /// Returns `None` when `level` is outside `1..=6`.
    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A CSS colour: hex notation or a bare alphabetic keyword such as `teal`.
///
/// Anything that could carry a function call (`url(...)`, `var(...)`) or a
/// declaration break (`;`) is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CssColor(String);

impl CssColor {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        CSS_COLOR
            .as_ref()
            .is_some_and(|re| re.is_match(trimmed))
            .then(|| Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CssColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Font size in CSS pixels, `1..=512`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FontSize(u16);

impl FontSize {
    pub const MAX_PX: u16 = 512;

    pub fn new(px: u16) -> Option<Self> {
        (1..=Self::MAX_PX).contains(&px).then_some(Self(px))
    }

    pub fn px(self) -> u16 {
        self.0
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}
