//! Integration tests for the blockpreview-sanitize crate.

use blockpreview_blocks::RawBlock;
use blockpreview_codegen::generate_raw;
use blockpreview_sanitize::{SanitizePolicy, sanitize, sanitize_with_report};
use proptest::prelude::*;
use serde_json::json;

// ═══════════════════════════════════════════════════════════════════════
//  Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn generated_markup_is_already_within_policy() {
    let raw: Vec<RawBlock> = serde_json::from_value(json!([
        { "id": "b1", "type": "text", "content": "Hi" },
        { "id": "b2", "type": "heading", "level": 1, "content": "Title" },
        { "id": "b3", "type": "image", "url": "/a.png" }
    ]))
    .unwrap();
    let generated = generate_raw(raw).unwrap();

    let (safe, report) = sanitize_with_report(&generated.markup, &SanitizePolicy::default());
    assert_eq!(safe.as_str(), generated.markup);
    assert!(report.is_clean());
}

#[test]
fn every_generated_variant_survives_default_policy() {
    let raw: Vec<RawBlock> = serde_json::from_value(json!([
        { "id": "l", "type": "link", "url": "https://example.org/?a=1&b=2", "text": "go <now>" },
        { "id": "c", "type": "color", "value": "#1E90FF", "content": "blue" },
        { "id": "f", "type": "font-size", "size": 18, "content": "big" },
        { "id": "i", "type": "image", "url": "cat.png", "altText": "\"cat\"" }
    ]))
    .unwrap();
    let generated = generate_raw(raw).unwrap();
    let safe = sanitize(&generated.markup, &SanitizePolicy::default());
    assert_eq!(safe.as_str(), generated.markup);
}

#[test]
fn student_link_with_script_scheme_is_neutralised() {
    let raw: Vec<RawBlock> = serde_json::from_value(json!([
        { "id": "l", "type": "link", "url": "javascript:alert(document.cookie)", "text": "click" }
    ]))
    .unwrap();
    let generated = generate_raw(raw).unwrap();
    let safe = sanitize(&generated.markup, &SanitizePolicy::default());
    assert_eq!(safe.as_str(), "<a>click</a>");
}

#[test]
fn strict_policy_drops_links_and_images() {
    let input = "<p>Intro <a href=\"/x\">link</a></p><img src=\"/a.png\"><em>end</em>";
    let safe = sanitize(input, &SanitizePolicy::strict());
    assert_eq!(safe.as_str(), "<p>Intro </p><em>end</em>");
}

#[test]
fn policy_loads_from_toml() {
    let policy: SanitizePolicy = toml::from_str(
        r#"
        allowed_tags = ["p", "em", "marquee"]
        allowed_attributes = ["title", "onclick"]
        denied_tags = ["marquee"]
        "#,
    )
    .unwrap();
    let safe = sanitize(
        "<p title=\"t\" onclick=\"go()\">a<em>b</em><marquee>c</marquee></p>",
        &policy,
    );
    assert_eq!(safe.as_str(), "<p title=\"t\">a<em>b</em></p>");
}

#[test]
fn self_closing_tag_inside_removed_subtree_still_nests() {
    let policy = SanitizePolicy::default().deny_tags(["div"]);
    let safe = sanitize("<div><div/></div>hidden</div><p>shown</p>", &policy);
    assert_eq!(safe.as_str(), "<p>shown</p>");
}

#[test]
fn removed_content_keeps_its_line_breaks() {
    let input = "<p>one</p>\n<a href=\"/x\">two\nlines</a>\n<p title=\"a\nb\" onclick=\"x\ny\">three</p>\n<p>four</p>";
    let safe = sanitize(input, &SanitizePolicy::strict());
    assert_eq!(
        safe.as_str(),
        "<p>one</p>\n\n\n<p title=\"a\nb\">\nthree</p>\n<p>four</p>"
    );
    assert_eq!(safe.as_str().lines().count(), input.lines().count());
    assert_eq!(safe.as_str().lines().last(), Some("<p>four</p>"));
}

#[test]
fn classic_payloads_are_removed() {
    let policy = SanitizePolicy::default();
    let payloads = [
        "<script>alert(1)</script>",
        "<SCRIPT SRC=//evil.example/x.js></SCRIPT>",
        "<img src=x onerror=alert(1)>",
        "<svg><script>alert(1)</script></svg>",
        "<svg onload=alert(1)>",
        "<iframe srcdoc=\"<script>alert(1)</script>\"></iframe>",
        "<a href=\"jav&#x09;ascript:alert(1)\">x</a>",
        "<div style=\"background:url(javascript:alert(1))\">x</div>",
        "<object data=\"javascript:alert(1)\"></object>",
        "<math><mtext><table><mglyph><style><img src=x onerror=alert(1)>",
        "<!--<img src=x onerror=alert(1)>-->",
        "<p title=\"</p><script>alert(1)</script>\">x</p>",
    ];
    for payload in payloads {
        let out = sanitize(payload, &policy);
        let lower = out.as_str().to_ascii_lowercase();
        assert!(!lower.contains("<script"), "{payload} -> {out}");
        assert!(!lower.contains("onerror"), "{payload} -> {out}");
        assert!(!lower.contains("javascript:"), "{payload} -> {out}");
        assert!(!lower.contains("<svg"), "{payload} -> {out}");
        assert!(!lower.contains("<iframe"), "{payload} -> {out}");
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Properties
// ═══════════════════════════════════════════════════════════════════════

/// Markup-ish soup: fragments of tags, attributes, entities and text.
fn soup_strategy() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        prop::sample::select(vec![
            "<", ">", "</", "/>", "\"", "'", "=", " ", "&amp;", "&lt;", "&#60;", "&", "<!--",
            "-->",
        ])
        .prop_map(str::to_string),
        prop::sample::select(vec![
            "p", "div", "span", "a", "img", "br", "em", "script", "style", "svg", "b", "i",
            "textarea", "plaintext", "form",
        ])
        .prop_map(str::to_string),
        prop::sample::select(vec![
            "href", "src", "style", "title", "onclick", "class", "alt",
        ])
        .prop_map(str::to_string),
        prop::sample::select(vec![
            "javascript:x", "/a.png", "http://e.org", "url(x)", "color:red", "data:x",
        ])
        .prop_map(str::to_string),
        "[a-zA-Z0-9 \n]{0,8}",
    ];
    prop::collection::vec(piece, 0..60).prop_map(|pieces| pieces.concat())
}

fn filler() -> impl Strategy<Value = String> {
    "[0-9 .,]{0,20}"
}

fn hostile_strategy() -> impl Strategy<Value = String> {
    let attack = prop_oneof![
        Just("<script>alert(1)</script>"),
        Just("<script src=x>alert(1)</script>"),
        Just("<img src=x onerror=\"alert(1)\">"),
        Just("<p onclick=alert(1)>"),
        Just("<svg onload=alert(1)></svg>"),
        Just("<style>@import 'alert(1)';</style>"),
        Just("<iframe src=\"javascript:alert(1)\"></iframe>"),
        Just("<a href=\"javascript:alert(1)\">"),
        Just("<div style=\"x:expression(alert(1))\">"),
    ];
    (filler(), attack, filler(), prop_oneof![Just(""), Just("</p>"), Just("<p>"), Just("<div>")])
        .prop_map(|(before, attack, after, tail)| format!("{before}{attack}{after}{tail}"))
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(input in soup_strategy()) {
        for policy in [SanitizePolicy::default(), SanitizePolicy::strict()] {
            let once = sanitize(&input, &policy);
            let twice = sanitize(once.as_str(), &policy);
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn arbitrary_input_is_idempotent(input in any::<String>()) {
        let policy = SanitizePolicy::default();
        let once = sanitize(&input, &policy);
        let twice = sanitize(once.as_str(), &policy);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn disallowed_constructs_and_payloads_are_gone(input in hostile_strategy()) {
        let out = sanitize(&input, &SanitizePolicy::default());
        let lower = out.as_str().to_ascii_lowercase();
        prop_assert!(!lower.contains("script"), "{} -> {}", input, out);
        prop_assert!(!lower.contains("onerror"), "{} -> {}", input, out);
        prop_assert!(!lower.contains("onclick"), "{} -> {}", input, out);
        prop_assert!(!lower.contains("onload"), "{} -> {}", input, out);
        prop_assert!(!lower.contains("alert(1)"), "{} -> {}", input, out);
    }
}
