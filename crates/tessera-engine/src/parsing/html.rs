//! Minimal HTML lexer for inline/block HTML in markdown and persisted
//! content. It only splits tags, comments and text; structure is decided by
//! the tree builder using the schema's DOM rules.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTag {
    /// Lowercased tag name.
    pub name: String,
    pub kind: TagKind,
    /// Lowercased attribute names with decoded values, in source order.
    pub attrs: Vec<(String, String)>,
    /// The tag exactly as written.
    pub raw: String,
}

impl HtmlTag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Elements that never have content or a close tag.
    pub fn is_void(&self) -> bool {
        matches!(
            self.name.as_str(),
            "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
                | "source" | "track" | "wbr"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlPiece {
    Tag(HtmlTag),
    /// Text with entities decoded.
    Text(String),
    Comment(String),
}

fn piece_regex() -> &'static Regex {
    static PIECE: OnceLock<Regex> = OnceLock::new();
    PIECE.get_or_init(|| {
        Regex::new(
            r#"(?s)<!--(.*?)-->|<(/?)([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
        )
        .expect("Invalid HTML piece regex")
    })
}

fn attr_regex() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| {
        Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("Invalid HTML attribute regex")
    })
}

/// Splits `html` into tags, comments and text. Anything that does not lex
/// as a tag (a stray `<`, for instance) stays text.
pub fn lex(html: &str) -> Vec<HtmlPiece> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in piece_regex().captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            pieces.push(HtmlPiece::Text(decode(&html[last..whole.start()])));
        }
        last = whole.end();

        if let Some(comment) = caps.get(1) {
            pieces.push(HtmlPiece::Comment(comment.as_str().trim().to_string()));
            continue;
        }
        let closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(5).is_some_and(|m| !m.as_str().is_empty());
        let name = caps
            .get(3)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let attrs = caps.get(4).map(|m| parse_attrs(m.as_str())).unwrap_or_default();
        let kind = if closing {
            TagKind::Close
        } else if self_closing {
            TagKind::SelfClosing
        } else {
            TagKind::Open
        };
        pieces.push(HtmlPiece::Tag(HtmlTag {
            name,
            kind,
            attrs,
            raw: whole.as_str().to_string(),
        }));
    }
    if last < html.len() {
        pieces.push(HtmlPiece::Text(decode(&html[last..])));
    }
    pieces
}

fn parse_attrs(source: &str) -> Vec<(String, String)> {
    attr_regex()
        .captures_iter(source)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode(m.as_str()))
                .unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
