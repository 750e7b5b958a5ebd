//! Markdown Rendering
//!
//! Turns answer text into HTML for exported transcripts and HTML surfaces.
//! [`HtmlRenderer`] uses `pulldown-cmark`; if it panics on some input the
//! plain-text-safe [`fallback_html`] is used instead, so rendering never fails.

use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::history::History;
use crate::messages::Role;
use crate::models::ModelCatalog;

const LINK_ATTRS: &str = r#"target="_blank" rel="noopener noreferrer""#;

/// Converts markdown text to HTML
pub trait MarkdownRenderer: Send + Sync {
    /// Render `markdown`; must not fail
    fn render(&self, markdown: &str) -> String;
}

/// `pulldown-cmark` renderer
///
/// Raw HTML in the input is escaped, not passed through. Links open in a new
/// tab.
#[derive(Clone, Debug)]
pub struct HtmlRenderer {
    options: Options,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
        }
    }
}

impl HtmlRenderer {
    /// Renderer with tables, strikethrough and task lists enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn render_markdown(&self, markdown: &str) -> String {
        let events = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => Event::InlineHtml(CowStr::from(open_link(&dest_url, &title))),
            Event::End(TagEnd::Link) => Event::InlineHtml(CowStr::Borrowed("</a>")),
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events);
        out
    }
}

impl MarkdownRenderer for HtmlRenderer {
    fn render(&self, markdown: &str) -> String {
        match panic::catch_unwind(AssertUnwindSafe(|| self.render_markdown(markdown))) {
            Ok(out) => out,
            Err(_) => {
                tracing::warn!(len = markdown.len(), "Markdown renderer panicked, using fallback");
                fallback_html(markdown)
            }
        }
    }
}

fn open_link(href: &str, title: &str) -> String {
    let mut tag = format!(
        r#"<a href="{}" {LINK_ATTRS}"#,
        html_escape::encode_double_quoted_attribute(href)
    );
    if !title.is_empty() {
        let _ = write!(
            tag,
            r#" title="{}""#,
            html_escape::encode_double_quoted_attribute(title)
        );
    }
    tag.push('>');
    tag
}

/// Plain-text-safe HTML for when the markdown renderer is unavailable
///
/// Escapes everything, then formats fenced code blocks, inline code, line
/// breaks and bare URLs.
#[must_use]
pub fn fallback_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let Some(end) = after.find("```") else {
            break;
        };

        out.push_str(&inline_html(&rest[..start]));

        let block = &after[..end];
        let (lang, code) = match block.split_once('\n') {
            Some((lang, code)) if !lang.trim().contains(char::is_whitespace) => (lang.trim(), code),
            _ => ("", block),
        };
        if lang.is_empty() {
            out.push_str("<pre><code>");
        } else {
            let _ = write!(
                out,
                r#"<pre><code class="language-{}">"#,
                html_escape::encode_double_quoted_attribute(lang)
            );
        }
        out.push_str(&html_escape::encode_text(code));
        out.push_str("</code></pre>");

        rest = &after[end + 3..];
    }

    out.push_str(&inline_html(rest));
    out
}

/// Inline code spans, then plain text
fn inline_html(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(open) = rest.find('`') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('`') else {
            break;
        };
        out.push_str(&text_html(&rest[..open]));
        out.push_str("<code>");
        out.push_str(&html_escape::encode_text(&after[..close]));
        out.push_str("</code>");
        rest = &after[close + 1..];
    }

    out.push_str(&text_html(rest));
    out
}

fn text_html(text: &str) -> String {
    let escaped = html_escape::encode_double_quoted_attribute(text);
    linkify(&escaped).replace('\n', "<br>")
}

/// Wrap bare `http(s)://` URLs in anchors; input is already escaped
fn linkify(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;

    loop {
        let start = match (rest.find("http://"), rest.find("https://")) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => break,
        };

        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let end = candidate
            .find(char::is_whitespace)
            .unwrap_or(candidate.len());
        let url = candidate[..end].trim_end_matches(['.', ',', '!', '?', ')']);

        let _ = write!(out, r#"<a href="{url}" {LINK_ATTRS}>{url}</a>"#);
        rest = &candidate[url.len()..];
    }

    out.push_str(rest);
    out
}

/// Standalone HTML page for a conversation
#[must_use]
pub fn transcript_html(
    history: &History,
    renderer: &dyn MarkdownRenderer,
    catalog: &ModelCatalog,
) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Chat transcript</title>\n</head>\n<body>\n",
    );

    for turn in history.turns() {
        let author = match (&turn.role, &turn.model) {
            (Role::Assistant, Some(model)) => catalog.display_name(model).to_string(),
            (role, _) => role.as_str().to_string(),
        };
        let body = match turn.role {
            Role::User => fallback_html(&turn.content),
            Role::Assistant | Role::System => renderer.render(&turn.content),
        };

        let _ = write!(
            page,
            "<section class=\"turn {role}\" data-timestamp=\"{ts}\">\n<h3>{author}</h3>\n{body}\n</section>\n",
            role = turn.role.as_str(),
            ts = turn.timestamp,
            author = html_escape::encode_text(&author),
        );
    }

    page.push_str("</body>\n</html>\n");
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ModelId, Turn};
    use pretty_assertions::assert_eq;

    struct Panicking;

    impl MarkdownRenderer for Panicking {
        fn render(&self, markdown: &str) -> String {
            panic::catch_unwind(|| -> String { panic!("boom") })
                .unwrap_or_else(|_| fallback_html(markdown))
        }
    }

    #[test]
    fn test_renders_basic_markdown() {
        let html = HtmlRenderer::new().render("# Title\n\n**bold** and `code`");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn test_links_open_in_new_tab() {
        let html = HtmlRenderer::new().render("[docs](https://example.com/a?b=1&c=2)");
        assert_eq!(
            html,
            "<p><a href=\"https://example.com/a?b=1&amp;c=2\" target=\"_blank\" \
             rel=\"noopener noreferrer\">docs</a></p>\n"
        );
    }

    #[test]
    fn test_code_blocks_are_escaped() {
        let html = HtmlRenderer::new().render("```html\n<script>alert(1)</script>\n```\n");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = HtmlRenderer::new().render("hi <img src=x onerror=alert(1)>");
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_fallback_formats_code_and_breaks() {
        let html = fallback_html("Use `x < y`\nthen:\n```rust\nlet a = 1;\n```\ndone");
        assert_eq!(
            html,
            "Use <code>x &lt; y</code><br>then:<br>\
             <pre><code class=\"language-rust\">let a = 1;\n</code></pre><br>done"
        );
    }

    #[test]
    fn test_fallback_links_urls() {
        let html = fallback_html("see https://example.com/x.");
        assert_eq!(
            html,
            "see <a href=\"https://example.com/x\" target=\"_blank\" \
             rel=\"noopener noreferrer\">https://example.com/x</a>."
        );
    }

    #[test]
    fn test_fallback_unclosed_markers_stay_text() {
        assert_eq!(fallback_html("a ` b"), "a ` b");
    }

    #[test]
    fn test_transcript_uses_display_names() {
        let mut history = History::new();
        history.append(Turn::user("<hi>"));
        history.append(Turn::assistant(ModelId::from("deepseek-r1"), "**yes**"));

        let page = transcript_html(&history, &Panicking, &ModelCatalog::new());

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<h3>DeepSeek R1</h3>"));
        assert!(page.contains("&lt;hi&gt;"));
        assert!(page.contains("**yes**"));
    }
}
