//! Markdown rendering for assistant replies and generated drafts.
//!
//! Output is GitHub-flavored HTML. Raw HTML in the input is escaped rather than
//! passed through, and link or image targets with script-capable schemes are
//! replaced by `#`. Rendering never fails; unbalanced markup degrades to text.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedMarkdown {
    pub html: String,
}

impl RenderedMarkdown {
    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

pub fn render_markdown(text: &str) -> RenderedMarkdown {
    let parser = Parser::new_ext(text, options()).map(sanitize_event);
    let mut html_output = String::with_capacity(text.len() * 2);
    html::push_html(&mut html_output, parser);
    RenderedMarkdown { html: html_output }
}

/// Text content only, with blocks separated by single spaces. Used for toast
/// previews and logs.
pub fn plain_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for event in Parser::new_ext(text, options()) {
        match event {
            Event::Text(value) | Event::Code(value) => out.push_str(&value),
            Event::Html(value) | Event::InlineHtml(value) => out.push_str(&value),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::TaskListMarker(done) => out.push_str(if done { "[x] " } else { "[ ] " }),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::TableCell
                | TagEnd::CodeBlock,
            ) => out.push(' '),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_destination(dest_url: CowStr<'_>) -> CowStr<'_> {
    if is_blocked_destination(&dest_url) {
        CowStr::Borrowed("#")
    } else {
        dest_url
    }
}

// Browsers drop whitespace and control characters inside a scheme, so
// "java\tscript:" still executes.
fn is_blocked_destination(dest_url: &str) -> bool {
    let normalized: String = dest_url
        .chars()
        .filter(|ch| !ch.is_whitespace() && !ch.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCKED_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}
