//! Markup tokenizer.
//!
//! A forgiving, single-pass tokenizer that turns arbitrary input into a flat
//! stream of text runs and tags.  It never fails: constructs it cannot
//! represent (comments, doctypes, processing instructions, bogus end tags)
//! are dropped, and an unterminated tag or quoted value swallows the rest of
//! the input.
//!
//! Entities are decoded here, once.  The sanitizer re-escapes everything on
//! output, so any reference this decoder does not understand stays literal
//! text in the browser as well.

use crate::policy::RAW_TEXT_TAGS;

/// A single attribute with its decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Text(String),
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
}

pub(crate) struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Set after a raw-text start tag; its content is skipped on the next
    /// call.
    raw_text: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text: None,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    fn finish(&mut self) {
        self.pos = self.input.len();
    }

    /// Skip raw-text content up to (not including) the matching end tag.
    fn skip_raw_text(&mut self, name: &str) {
        if name == "plaintext" {
            self.finish();
            return;
        }
        let bytes = self.bytes();
        let needle = name.as_bytes();
        let mut i = self.pos;
        while i + 2 + needle.len() <= bytes.len() {
            if bytes[i] == b'<'
                && bytes[i + 1] == b'/'
                && bytes[i + 2..i + 2 + needle.len()].eq_ignore_ascii_case(needle)
            {
                let after = bytes.get(i + 2 + needle.len()).copied();
                if matches!(after, None | Some(b'>' | b'/') | Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')) {
                    self.pos = i;
                    return;
                }
            }
            i += 1;
        }
        self.finish();
    }

    /// Skip from the current position to just past `terminator`, or to the
    /// end of input.
    fn skip_past(&mut self, terminator: &str) {
        match self.input[self.pos..].find(terminator) {
            Some(i) => self.pos += i + terminator.len(),
            None => self.finish(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_at(0) {
            if !is_space(b) {
                break;
            }
            self.pos += 1;
        }
    }

    /// Read bytes until one of `stop` (or whitespace) and return them
    /// lowercased.
    fn read_name(&mut self, stop: &[u8]) -> String {
        let start = self.pos;
        while let Some(b) = self.peek_at(0) {
            if is_space(b) || stop.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    /// Read a tag starting at `<`.  Returns `None` if input ends first.
    fn read_tag(&mut self) -> Option<Token> {
        let is_end = self.peek_at(1) == Some(b'/');
        self.pos += if is_end { 2 } else { 1 };

        let name = self.read_name(b"/>");
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek_at(0) {
                None => {
                    self.finish();
                    return None;
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    self_closing = self.peek_at(0) == Some(b'>');
                    continue;
                }
                Some(_) => {}
            }

            self_closing = false;
            // A leading '=' belongs to the name.
            let name_start = self.pos;
            self.pos += 1;
            while let Some(b) = self.peek_at(0) {
                if is_space(b) || matches!(b, b'/' | b'>' | b'=') {
                    break;
                }
                self.pos += 1;
            }
            let attr_name = self.input[name_start..self.pos].to_ascii_lowercase();

            self.skip_whitespace();
            let mut value = String::new();
            if self.peek_at(0) == Some(b'=') {
                self.pos += 1;
                self.skip_whitespace();
                match self.peek_at(0) {
                    Some(quote @ (b'"' | b'\'')) => {
                        self.pos += 1;
                        let start = self.pos;
                        match self.bytes()[start..].iter().position(|&b| b == quote) {
                            Some(len) => {
                                decode_entities(&self.input[start..start + len], &mut value);
                                self.pos = start + len + 1;
                            }
                            None => {
                                self.finish();
                                return None;
                            }
                        }
                    }
                    Some(_) => {
                        let start = self.pos;
                        while let Some(b) = self.peek_at(0) {
                            if is_space(b) || b == b'>' {
                                break;
                            }
                            self.pos += 1;
                        }
                        decode_entities(&self.input[start..self.pos], &mut value);
                    }
                    None => {
                        self.finish();
                        return None;
                    }
                }
            }
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }

        if is_end {
            return Some(Token::EndTag { name });
        }
        if RAW_TEXT_TAGS.contains(&name.as_str()) {
            self.raw_text = Some(name.clone());
        }
        Some(Token::StartTag {
            name,
            attributes,
            self_closing,
        })
    }
}

enum Markup {
    /// `<` that does not open anything.
    Literal,
    Tag,
    /// Comment, doctype, processing instruction or bogus end tag.
    Ignored(&'static str),
    Comment,
}

impl Tokenizer<'_> {
    fn classify(&self) -> Markup {
        let rest = &self.bytes()[self.pos..];
        match rest.get(1).copied() {
            Some(b) if b.is_ascii_alphabetic() => Markup::Tag,
            Some(b'/') => match rest.get(2).copied() {
                Some(b) if b.is_ascii_alphabetic() => Markup::Tag,
                None => Markup::Literal,
                Some(_) => Markup::Ignored(">"),
            },
            Some(b'!') if rest.starts_with(b"<!--") => Markup::Comment,
            Some(b'!' | b'?') => Markup::Ignored(">"),
            _ => Markup::Literal,
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(name) = self.raw_text.take() {
            self.skip_raw_text(&name);
        }

        let mut text = String::new();
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];
            match rest.find('<') {
                None => {
                    decode_entities(rest, &mut text);
                    self.finish();
                }
                Some(0) => match self.classify() {
                    Markup::Literal => {
                        text.push('<');
                        self.pos += 1;
                    }
                    Markup::Comment => {
                        self.pos += 4;
                        self.skip_past("-->");
                    }
                    Markup::Ignored(terminator) => self.skip_past(terminator),
                    Markup::Tag => {
                        if !text.is_empty() {
                            return Some(Token::Text(text));
                        }
                        return self.read_tag();
                    }
                },
                Some(i) => {
                    decode_entities(&rest[..i], &mut text);
                    self.pos += i;
                }
            }
        }

        (!text.is_empty()).then_some(Token::Text(text))
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
];

/// Decode character references into `out`.  Only terminated references are
/// recognised; NUL is dropped and `&#0;` decodes to U+FFFD.
pub(crate) fn decode_entities(input: &str, out: &mut String) {
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        push_text(&rest[..amp], out);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    push_text(rest, out);
}

fn push_text(s: &str, out: &mut String) {
    out.extend(s.chars().filter(|&c| c != '\0'));
}

/// Decode one reference at the start of `s` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_reference(s: &str) -> Option<(char, usize)> {
    let semi = s.get(1..)?.find(';')? + 1;
    // Longest supported reference is a 6-digit hex code point.
    if semi > 10 {
        return None;
    }
    let body = &s[1..semi];
    let consumed = semi + 1;

    if let Some(num) = body.strip_prefix('#') {
        let (digits, radix) = match num.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16),
            None => (num, 10),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        let c = u32::from_str_radix(digits, radix)
            .ok()
            .filter(|&cp| cp != 0)
            .and_then(char::from_u32)
            .unwrap_or('\u{fffd}');
        return Some((c, consumed));
    }

    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == body)
        .map(|&(_, c)| (c, consumed))
}
