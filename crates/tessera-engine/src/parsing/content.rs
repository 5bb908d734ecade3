//! Persisted HTML content import.

use std::sync::OnceLock;

use regex::Regex;

use super::ParseFailure;
use super::builder::TreeBuilder;
use super::html::{HtmlPiece, lex};
use crate::model::Node;
use crate::schema::{DOC, SCHEMA_VERSION, Schema};

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| {
        Regex::new(r"^schema-version:\s*(\d+)$").expect("Invalid schema version regex")
    })
}

/// Parses HTML produced by [`crate::serialize::to_html`] (or any HTML the
/// schema's DOM rules understand) back into a document.
pub struct HtmlParser<'s> {
    schema: &'s Schema,
}

impl<'s> HtmlParser<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    pub fn parse(&self, html: &str) -> Result<Node, ParseFailure> {
        let root = self.schema.entry(DOC).ok_or(ParseFailure::NoRoot)?;
        let mut builder = TreeBuilder::new(self.schema, root);
        for piece in lex(html) {
            if let HtmlPiece::Comment(comment) = &piece
                && let Some(version) = stored_version(comment)
                && version > SCHEMA_VERSION
            {
                log::warn!(
                    "content was written with schema version {version}, newer than {SCHEMA_VERSION}"
                );
            }
            builder.html_piece(piece, true);
        }
        Ok(builder.finish())
    }
}

fn stored_version(comment: &str) -> Option<u32> {
    version_regex()
        .captures(comment)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Surface;

    #[test]
    fn reads_version_comment() {
        assert_eq!(stored_version("schema-version: 3"), Some(3));
        assert_eq!(stored_version("something else"), None);
    }

    #[test]
    fn parses_blocks_and_marks() {
        let schema = Surface::Note.schema().unwrap();
        let doc = HtmlParser::new(&schema)
            .parse("<!-- schema-version: 1 -->\n<h2>Title</h2>\n<p>Hello <strong>world</strong></p>")
            .unwrap();
        assert_eq!(doc.child_count(), 2);
        assert_eq!(doc.children()[0].attrs().int("level"), Some(2));
        let para = &doc.children()[1];
        assert_eq!(para.child_count(), 2);
        assert_eq!(para.children()[1].marks()[0].kind(), "bold");
    }

    #[test]
    fn code_block_keeps_whitespace_and_language() {
        let schema = Surface::Note.schema().unwrap();
        let doc = HtmlParser::new(&schema)
            .parse("<pre><code class=\"language-rust\">fn  main() {\n}</code></pre>")
            .unwrap();
        let block = &doc.children()[0];
        assert_eq!(block.kind(), "code_block");
        assert_eq!(block.attrs().str("language"), Some("rust"));
        assert_eq!(block.text_content(), "fn  main() {\n}");
    }

    #[test]
    fn paragraph_close_ends_an_unclosed_mention() {
        let schema = Surface::Note.schema().unwrap();
        let doc = HtmlParser::new(&schema)
            .parse(r#"<p>hi <span data-type="mention" data-id="1" data-label="Ann">@Ann more</p><p>next</p>"#)
            .unwrap();
        assert_eq!(doc.child_count(), 2);
        let para = &doc.children()[0];
        assert_eq!(para.children()[1].kind(), "mention");
        assert_eq!(para.children()[2].as_text(), Some("@Ann more"));
        assert_eq!(doc.children()[1].text_content(), "next");
    }
}
