//! Block-to-markup compilation.
//!
//! Each block compiles to a fixed-form fragment determined only by its
//! [`BlockKind`].  Fragments occupy whole lines; the generator records the
//! exact range it just wrote before moving on, so the mapping partitions the
//! output.  Nothing here reads the clock, the environment, disk or network.

use blockpreview_blocks::{Block, BlockKind, BlockTree, RawBlock, parse_blocks};
use serde::Serialize;

use crate::mapping::LineMapping;

/// Generated markup plus its line mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedMarkup {
    pub markup: String,
    pub mapping: LineMapping,
}

/// Compile blocks that are already in traversal order.
pub fn generate<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> GeneratedMarkup {
    let mut markup = String::new();
    let mut mapping = LineMapping::new();
    let mut fragment = String::new();

    for block in blocks {
        fragment.clear();
        render_fragment(&block.kind, &mut fragment);

        if !markup.is_empty() {
            markup.push('\n');
        }
        markup.push_str(&fragment);

        let lines = fragment.matches('\n').count() + 1;
        mapping.push(block.id.clone(), lines);
    }

    tracing::debug!(
        blocks = mapping.len(),
        lines = mapping.line_count(),
        bytes = markup.len(),
        "markup generated"
    );

    GeneratedMarkup { markup, mapping }
}

/// Compile a whole project in tree order.
pub fn generate_tree(tree: &BlockTree) -> GeneratedMarkup {
    generate(tree.traverse().map(|t| t.block))
}

/// Convert and compile blocks straight from the wire, in the given order.
///
/// Every block is converted before any markup is produced, so a single
/// unsupported type yields an error and no output at all.
pub fn generate_raw(raw: Vec<RawBlock>) -> blockpreview_blocks::Result<GeneratedMarkup> {
    let blocks = parse_blocks(raw)?;
    Ok(generate(&blocks))
}

fn render_fragment(kind: &BlockKind, out: &mut String) {
    match kind {
        BlockKind::Text { content } => {
            out.push_str("<p>");
            escape_text(content, out);
            out.push_str("</p>");
        }
        BlockKind::Heading { level, content } => {
            out.push_str(&format!("<h{level}>"));
            escape_text(content, out);
            out.push_str(&format!("</h{level}>"));
        }
        BlockKind::Image { url, alt_text } => {
            out.push_str("<img src=\"");
            escape_attr(url, out);
            out.push_str("\" alt=\"");
            escape_attr(alt_text, out);
            out.push_str("\">");
        }
        BlockKind::Link { url, text } => {
            out.push_str("<a href=\"");
            escape_attr(url, out);
            out.push_str("\">");
            escape_text(text, out);
            out.push_str("</a>");
        }
        BlockKind::Color { value, content } => {
            out.push_str(&format!("<span style=\"color: {value}\">"));
            escape_text(content, out);
            out.push_str("</span>");
        }
        BlockKind::FontSize { size, content } => {
            out.push_str(&format!("<span style=\"font-size: {size}\">"));
            escape_text(content, out);
            out.push_str("</span>");
        }
    }
}

/// Escape text content.  Line endings are normalised to `\n` and NUL is
/// dropped.
fn escape_text(input: &str, out: &mut String) {
    escape(input, out, false);
}

/// Escape a double-quoted attribute value.
fn escape_attr(input: &str, out: &mut String) {
    escape(input, out, true);
}

fn escape(input: &str, out: &mut String, quote: bool) {
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quote => out.push_str("&quot;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\0' => {}
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use blockpreview_blocks::{CssColor, FontSize, HeadingLevel};

    use super::*;

    fn block(id: &str, kind: BlockKind) -> Block {
        Block::new(id, kind)
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = generate(std::iter::empty());
        assert_eq!(out.markup, "");
        assert!(out.mapping.is_empty());
    }

    #[test]
    fn every_variant_has_a_fixed_form() {
        let blocks = vec![
            block("t", BlockKind::Text { content: "Hi".into() }),
            block(
                "h",
                BlockKind::Heading { level: HeadingLevel::new(3).unwrap(), content: "Sub".into() },
            ),
            block(
                "i",
                BlockKind::Image { url: "/cat.png".into(), alt_text: "A cat".into() },
            ),
            block(
                "l",
                BlockKind::Link { url: "https://example.org/?a=1&b=2".into(), text: "go".into() },
            ),
            block(
                "c",
                BlockKind::Color { value: CssColor::parse("#1E90FF").unwrap(), content: "blue".into() },
            ),
            block(
                "f",
                BlockKind::FontSize { size: FontSize::new(24).unwrap(), content: "big".into() },
            ),
        ];
        let out = generate(&blocks);
        let lines: Vec<_> = out.markup.lines().collect();
        assert_eq!(
            lines,
            [
                "<p>Hi</p>",
                "<h3>Sub</h3>",
                "<img src=\"/cat.png\" alt=\"A cat\">",
                "<a href=\"https://example.org/?a=1&amp;b=2\">go</a>",
                "<span style=\"color: #1e90ff\">blue</span>",
                "<span style=\"font-size: 24px\">big</span>",
            ]
        );
    }

    #[test]
    fn student_text_cannot_become_markup() {
        let out = generate(&[block(
            "t",
            BlockKind::Text { content: "<script>alert(1)</script> & more".into() },
        )]);
        assert_eq!(
            out.markup,
            "<p>&lt;script&gt;alert(1)&lt;/script&gt; &amp; more</p>"
        );
    }

    #[test]
    fn attribute_quotes_are_escaped() {
        let out = generate(&[block(
            "i",
            BlockKind::Image { url: "/x.png\" onerror=\"alert(1)".into(), alt_text: String::new() },
        )]);
        assert_eq!(
            out.markup,
            "<img src=\"/x.png&quot; onerror=&quot;alert(1)\" alt=\"\">"
        );
    }

    #[test]
    fn multi_line_text_spans_whole_lines() {
        let blocks = vec![
            block("a", BlockKind::Text { content: "one\r\ntwo\rthree".into() }),
            block("b", BlockKind::Text { content: "four".into() }),
        ];
        let out = generate(&blocks);
        assert_eq!(out.markup, "<p>one\ntwo\nthree</p>\n<p>four</p>");
        let spans: Vec<_> = out.mapping.iter().map(|r| (r.start_line, r.end_line)).collect();
        assert_eq!(spans, [(1, 3), (4, 4)]);
    }
}
