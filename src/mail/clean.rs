use anyhow::{Result, anyhow};
use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid horizontal whitespace regex"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid blank line regex"));

/// Wide enough that html2text never wraps a paragraph.
const HTML_RENDER_WIDTH: usize = 1_000;

/// Elements whose boundaries start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "center", "dd", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "table",
    "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

/// Longest named entity plus its `&` and `;`.
const MAX_ENTITY_LEN: usize = 40;

/// Elements dropped together with their content.
const SKIPPED_TAGS: &[&str] = &["script", "style"];

/// Render an HTML document (an HTML message part) to plain text.
pub fn html_to_text(html: &str) -> Result<String> {
    html2text::config::plain_no_decorate()
        .string_from_read(html.as_bytes(), HTML_RENDER_WIDTH)
        .map_err(|e| anyhow!("failed to render html part: {e}"))
}

/// Strip markup and normalize whitespace.
///
/// Block boundaries become newlines, non-breaking spaces become spaces,
/// horizontal whitespace runs collapse to one space and any stack of blank
/// lines collapses to a single blank line. Applying it to its own output is
/// a no-op.
pub fn clean_html_content(raw: &str) -> String {
    let text = strip_to_fixpoint(raw).replace('\u{a0}', " ");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

// Removing a tag can splice a new one together ("<<b>p>"), so strip until
// nothing changes. Every pass that changes the text consumes an `&` or a tag.
fn strip_to_fixpoint(raw: &str) -> String {
    let mut current = strip_tags(raw);
    loop {
        let next = strip_tags(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Remove tags, comments and script/style content, decoding entities.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(['<', '&']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with('&') {
            let consumed = decode_entity(tail, &mut out).unwrap_or_else(|| {
                out.push('&');
                1
            });
            rest = &tail[consumed..];
            continue;
        }

        if let Some(after) = tail.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }

        let opens_tag = tail[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        let close = tail.find('>');
        let (true, Some(end)) = (opens_tag, close) else {
            out.push('<');
            rest = &tail[1..];
            continue;
        };

        let name = tag_name(&tail[1..end]);
        let closing = tail[1..].starts_with('/');
        rest = &tail[end + 1..];

        if !closing && SKIPPED_TAGS.contains(&name.as_str()) {
            rest = skip_element(rest, &name);
        } else if BLOCK_TAGS.contains(&name.as_str()) && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out.push_str(rest);
    out
}

fn tag_name(inner: &str) -> String {
    inner
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

// Everything up to and including the matching close tag.
fn skip_element<'a>(rest: &'a str, name: &str) -> &'a str {
    let lower = rest.to_ascii_lowercase();
    let Some(start) = lower.find(&format!("</{name}")) else {
        return "";
    };
    match rest[start..].find('>') {
        Some(end) => &rest[start + end + 1..],
        None => "",
    }
}

/// Decode the entity at the start of `s` into `out`, returning the number
/// of bytes consumed. Entities for `<`, `>` and `&` stay verbatim so stripped
/// output never spells out new markup.
fn decode_entity(s: &str, out: &mut String) -> Option<usize> {
    let semi = s.char_indices().take(MAX_ENTITY_LEN).find(|&(_, c)| c == ';')?.0;
    let body = &s[1..semi];
    let name = body.strip_prefix('#').unwrap_or(body);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let entity = &s[..=semi];
    let decoded = html_escape::decode_html_entities(entity);
    if decoded == entity {
        return None;
    }

    match &*decoded {
        "\u{200c}" | "\u{200d}" | "\u{ad}" => {}
        text if text.contains(['<', '>', '&']) => out.push_str(entity),
        text => out.push_str(text),
    }
    Some(semi + 1)
}
