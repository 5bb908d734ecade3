//! Built-in node and mark types.

use super::entry::{
    ContentKind, DomRule, HtmlParts, MarkdownBinding, MarkdownWrite, SchemaEntry,
};
use crate::model::{AttrValue, Attrs};
use crate::parsing::{HtmlTag, Nesting, Token};
use crate::serialize::markdown as md;

pub const DOC: &str = "doc";
pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const BLOCKQUOTE: &str = "blockquote";
pub const BULLET_LIST: &str = "bullet_list";
pub const ORDERED_LIST: &str = "ordered_list";
pub const LIST_ITEM: &str = "list_item";
pub const TASK_LIST: &str = "task_list";
pub const TASK_ITEM: &str = "task_item";
pub const CODE_BLOCK: &str = "code_block";
pub const HORIZONTAL_RULE: &str = "horizontal_rule";
pub const HARD_BREAK: &str = "hard_break";
pub const IMAGE: &str = "image";
pub const MENTION: &str = "mention";
pub const TABLE: &str = "table";
pub const TABLE_SECTION: &str = "table_section";
pub const TABLE_ROW: &str = "table_row";
pub const TABLE_HEADER: &str = "table_header";
pub const TABLE_CELL: &str = "table_cell";

pub const LINK: &str = "link";
pub const BOLD: &str = "bold";
pub const ITALIC: &str = "italic";
pub const STRIKE: &str = "strike";
pub const COMMENT: &str = "comment";
pub const CODE: &str = "code";

/// Link `rel` values kept when parsing HTML.
const ALLOWED_REL: &[&str] = &["noopener", "noreferrer", "nofollow", "ugc"];

/// Every built-in entry. Mark order sets serialization nesting: earlier marks
/// wrap later ones, and inline code is innermost.
pub fn builtin_entries() -> Vec<SchemaEntry> {
    vec![
        doc(),
        paragraph(),
        heading(),
        blockquote(),
        bullet_list(),
        ordered_list(),
        list_item(),
        task_list(),
        task_item(),
        code_block(),
        horizontal_rule(),
        hard_break(),
        image(),
        mention(),
        table(),
        table_section(),
        table_row(),
        table_header(),
        table_cell(),
        link(),
        bold(),
        italic(),
        strike(),
        comment(),
        code(),
    ]
}

pub fn doc() -> SchemaEntry {
    SchemaEntry::block(DOC, ContentKind::Blocks)
}

pub fn paragraph() -> SchemaEntry {
    SchemaEntry::block(PARAGRAPH, ContentKind::Inline)
        .markdown(MarkdownBinding::tokens(&["paragraph"]).write(MarkdownWrite::Block(md::write_paragraph)))
        .dom(DomRule::tag("p"))
        .view(|_| HtmlParts::new("<p>", "</p>"))
        .draggable()
}

pub fn heading() -> SchemaEntry {
    let mut entry = SchemaEntry::block(HEADING, ContentKind::Inline)
        .default_attr("level", 1)
        .markdown(
            MarkdownBinding::tokens(&["heading"])
                .attrs(|tok, _, _| Attrs::new().with("level", tok.attrs.int("level").unwrap_or(1)))
                .write(MarkdownWrite::Block(md::write_heading)),
        )
        .view(|attrs| {
            let level = heading_level(attrs);
            HtmlParts::new(format!("<h{level}>"), format!("</h{level}>"))
        })
        .draggable();
    for tag in ["h1", "h2", "h3", "h4", "h5", "h6"] {
        entry = entry.dom(DomRule::tag(tag).attrs(|tag| {
            let level = tag.name[1..].parse::<i64>().unwrap_or(1);
            Attrs::new().with("level", level)
        }));
    }
    entry
}

pub fn heading_level(attrs: &Attrs) -> i64 {
    attrs.int("level").unwrap_or(1).clamp(1, 6)
}

pub fn blockquote() -> SchemaEntry {
    SchemaEntry::block(BLOCKQUOTE, ContentKind::Blocks)
        .markdown(MarkdownBinding::tokens(&["blockquote"]).write(MarkdownWrite::Block(md::write_blockquote)))
        .dom(DomRule::tag("blockquote"))
        .view(|_| HtmlParts::new("<blockquote>", "</blockquote>"))
        .draggable()
}

/// A list is tight when its first item's first child token is hidden.
pub(crate) fn list_is_tight(tokens: &[Token], index: usize) -> bool {
    tokens[index + 1..]
        .iter()
        .find(|t| !(t.nesting == Nesting::Open && matches!(t.name, "list_item" | "task_item")))
        .is_some_and(|t| t.hidden)
}

pub fn bullet_list() -> SchemaEntry {
    SchemaEntry::block(BULLET_LIST, ContentKind::Blocks)
        .default_attr("tight", false)
        .markdown(
            MarkdownBinding::tokens(&["bullet_list"])
                .attrs(|_, tokens, i| Attrs::new().with("tight", list_is_tight(tokens, i)))
                .write(MarkdownWrite::Block(md::write_bullet_list)),
        )
        .dom(DomRule::tag("ul"))
        .view(|_| HtmlParts::new("<ul>", "</ul>"))
        .draggable()
        .joinable(&["tight"])
}

pub fn ordered_list() -> SchemaEntry {
    SchemaEntry::block(ORDERED_LIST, ContentKind::Blocks)
        .default_attr("order", 1)
        .default_attr("tight", false)
        .markdown(
            MarkdownBinding::tokens(&["ordered_list"])
                .attrs(|tok, tokens, i| {
                    Attrs::new()
                        .with("order", tok.attrs.int("start").unwrap_or(1))
                        .with("tight", list_is_tight(tokens, i))
                })
                .write(MarkdownWrite::Block(md::write_ordered_list)),
        )
        .dom(DomRule::tag("ol").attrs(|tag| {
            let order = tag.attr("start").and_then(|s| s.trim().parse::<i64>().ok());
            Attrs::new().with("order", order.unwrap_or(1))
        }))
        .view(|attrs| match attrs.int("order") {
            Some(order) if order != 1 => HtmlParts::new(format!("<ol start=\"{order}\">"), "</ol>"),
            _ => HtmlParts::new("<ol>", "</ol>"),
        })
        .draggable()
        .joinable(&["order", "tight"])
}

pub fn list_item() -> SchemaEntry {
    SchemaEntry::block(LIST_ITEM, ContentKind::Blocks)
        .markdown(MarkdownBinding::tokens(&["list_item"]))
        .dom(DomRule::tag("li"))
        .view(|_| HtmlParts::new("<li>", "</li>"))
        .draggable()
}

pub fn task_list() -> SchemaEntry {
    SchemaEntry::block(TASK_LIST, ContentKind::Blocks)
        .default_attr("tight", false)
        .markdown(
            MarkdownBinding::tokens(&["task_list"])
                .attrs(|_, tokens, i| Attrs::new().with("tight", list_is_tight(tokens, i)))
                .write(MarkdownWrite::Block(md::write_task_list)),
        )
        .dom(DomRule::tag("ul").requires("data-type", Some("taskList")).priority(60))
        .view(|_| HtmlParts::new("<ul data-type=\"taskList\">", "</ul>"))
        .draggable()
        .joinable(&["tight"])
}

pub fn task_item() -> SchemaEntry {
    SchemaEntry::block(TASK_ITEM, ContentKind::Blocks)
        .default_attr("checked", false)
        .markdown(
            MarkdownBinding::tokens(&["task_item"])
                .attrs(|tok, _, _| Attrs::new().with("checked", tok.attrs.bool("checked").unwrap_or(false))),
        )
        .dom(
            DomRule::tag("li")
                .requires("data-type", Some("taskItem"))
                .priority(60)
                .attrs(|tag| Attrs::new().with("checked", tag.attr("data-checked") == Some("true"))),
        )
        .view(|attrs| {
            let checked = attrs.bool("checked").unwrap_or(false);
            HtmlParts::new(
                format!("<li data-type=\"taskItem\" data-checked=\"{checked}\">"),
                "</li>",
            )
        })
        .draggable()
}

pub fn code_block() -> SchemaEntry {
    SchemaEntry::block(CODE_BLOCK, ContentKind::Code)
        .default_attr("language", AttrValue::Null)
        .markdown(
            MarkdownBinding::tokens(&["fence", "code_block"])
                .no_close_token()
                .attrs(|tok, _, _| {
                    let language = tok
                        .attrs
                        .str("info")
                        .and_then(|info| info.split_whitespace().next())
                        .map(str::to_string);
                    Attrs::new().with("language", language)
                })
                .write(MarkdownWrite::Block(md::write_code_block)),
        )
        .dom(DomRule::tag("pre").attrs(|tag| {
            Attrs::new().with("language", tag.attr("data-language").map(str::to_string))
        }))
        .view(|attrs| match attrs.str("language") {
            Some(lang) => HtmlParts::new(
                format!("<pre><code class=\"language-{}\">", escape_attr(lang)),
                "</code></pre>",
            ),
            None => HtmlParts::new("<pre><code>", "</code></pre>"),
        })
        .draggable()
}

pub fn horizontal_rule() -> SchemaEntry {
    SchemaEntry::leaf(HORIZONTAL_RULE, false)
        .markdown(
            MarkdownBinding::tokens(&["hr"])
                .no_close_token()
                .write(MarkdownWrite::Block(|_, _| "---".to_string())),
        )
        .dom(DomRule::tag("hr"))
        .view(|_| HtmlParts::new("<hr>", ""))
        .draggable()
}

pub fn hard_break() -> SchemaEntry {
    SchemaEntry::leaf(HARD_BREAK, true)
        .markdown(
            MarkdownBinding::tokens(&["hardbreak"])
                .no_close_token()
                .write(MarkdownWrite::Inline(|_| "\\\n".to_string())),
        )
        .dom(DomRule::tag("br"))
        .view(|_| HtmlParts::new("<br>", ""))
}

pub fn image() -> SchemaEntry {
    SchemaEntry::leaf(IMAGE, true)
        .requires(&["src"])
        .default_attr("alt", AttrValue::Null)
        .default_attr("title", AttrValue::Null)
        .markdown(
            MarkdownBinding::tokens(&["image"])
                .no_close_token()
                .attrs(|tok, _, _| {
                    Attrs::new()
                        .with("src", tok.attrs.str("src").map(str::to_string))
                        .with("alt", non_empty(tok.attrs.str("alt")))
                        .with("title", non_empty(tok.attrs.str("title")))
                })
                .write(MarkdownWrite::Inline(md::write_image)),
        )
        .dom(DomRule::tag("img").requires("src", None).attrs(|tag| {
            Attrs::new()
                .with("src", tag.attr("src").map(str::to_string))
                .with("alt", non_empty(tag.attr("alt")))
                .with("title", non_empty(tag.attr("title")))
        }))
        .view(|attrs| {
            let mut html = format!("<img src=\"{}\"", escape_attr(attrs.str("src").unwrap_or("")));
            if let Some(alt) = attrs.str("alt") {
                html.push_str(&format!(" alt=\"{}\"", escape_attr(alt)));
            }
            if let Some(title) = attrs.str("title") {
                html.push_str(&format!(" title=\"{}\"", escape_attr(title)));
            }
            html.push('>');
            HtmlParts::new(html, "")
        })
}

pub fn mention() -> SchemaEntry {
    SchemaEntry::leaf(MENTION, true)
        .requires(&["id", "label"])
        .default_attr("username", AttrValue::Null)
        .default_attr("role", AttrValue::Null)
        .dom(
            DomRule::tag("span")
                .requires("data-type", Some("mention"))
                .priority(70)
                .attrs(|tag| {
                    Attrs::new()
                        .with("id", tag.attr("data-id").map(str::to_string))
                        .with("label", tag.attr("data-label").map(str::to_string))
                        .with("username", non_empty(tag.attr("data-username")))
                        .with("role", non_empty(tag.attr("data-role")))
                }),
        )
        .markdown(MarkdownBinding::tokens(&[]).write(MarkdownWrite::Inline(|node| mention_html(node.attrs()))))
        .view(|attrs| HtmlParts::new(mention_html(attrs), ""))
}

pub(crate) fn mention_html(attrs: &Attrs) -> String {
    let label = attrs.str("label").unwrap_or("");
    let mut html = format!(
        "<span data-type=\"mention\" data-id=\"{}\" data-label=\"{}\"",
        escape_attr(attrs.str("id").unwrap_or("")),
        escape_attr(label)
    );
    for (key, attr) in [("username", "data-username"), ("role", "data-role")] {
        if let Some(value) = attrs.str(key) {
            html.push_str(&format!(" {attr}=\"{}\"", escape_attr(value)));
        }
    }
    html.push_str(&format!(">@{}</span>", html_escape::encode_text(label)));
    html
}

pub fn table() -> SchemaEntry {
    SchemaEntry::block(TABLE, ContentKind::Blocks)
        .markdown(MarkdownBinding::tokens(&["table"]).write(MarkdownWrite::Block(md::write_table)))
        .dom(DomRule::tag("table"))
        .view(|_| HtmlParts::new("<table><tbody>", "</tbody></table>"))
        .draggable()
        .drag_isolating()
}

/// `thead`/`tbody` carry no meaning of their own; their rows are kept.
pub fn table_section() -> SchemaEntry {
    SchemaEntry::block(TABLE_SECTION, ContentKind::Blocks)
        .markdown(MarkdownBinding::tokens(&["thead", "tbody"]).ignore())
        .dom(DomRule::tag("thead"))
        .dom(DomRule::tag("tbody"))
}

pub fn table_row() -> SchemaEntry {
    SchemaEntry::block(TABLE_ROW, ContentKind::Blocks)
        .markdown(MarkdownBinding::tokens(&["tr"]))
        .dom(DomRule::tag("tr"))
        .view(|_| HtmlParts::new("<tr>", "</tr>"))
}

pub fn table_header() -> SchemaEntry {
    SchemaEntry::block(TABLE_HEADER, ContentKind::Inline)
        .markdown(MarkdownBinding::tokens(&["th"]))
        .dom(DomRule::tag("th"))
        .view(|_| HtmlParts::new("<th>", "</th>"))
}

pub fn table_cell() -> SchemaEntry {
    SchemaEntry::block(TABLE_CELL, ContentKind::Inline)
        .markdown(MarkdownBinding::tokens(&["td"]))
        .dom(DomRule::tag("td"))
        .view(|_| HtmlParts::new("<td>", "</td>"))
}

pub fn link() -> SchemaEntry {
    SchemaEntry::mark(LINK, true)
        .requires(&["href"])
        .default_attr("title", AttrValue::Null)
        .default_attr("target", AttrValue::Null)
        .default_attr("rel", AttrValue::Null)
        .markdown(
            MarkdownBinding::tokens(&["link"])
                .attrs(|tok, _, _| {
                    Attrs::new()
                        .with("href", tok.attrs.str("href").map(str::to_string))
                        .with("title", non_empty(tok.attrs.str("title")))
                })
                .write(MarkdownWrite::Mark {
                    open: |_| "[".to_string(),
                    close: md::close_link,
                }),
        )
        .dom(DomRule::tag("a").requires("href", None).attrs(link_attrs_from_tag))
        .view(|attrs| {
            let mut html = format!("<a href=\"{}\"", escape_attr(attrs.str("href").unwrap_or("")));
            if let Some(title) = attrs.str("title") {
                html.push_str(&format!(" title=\"{}\"", escape_attr(title)));
            }
            html.push_str(&format!(
                " target=\"{}\" rel=\"{}\">",
                attrs.str("target").unwrap_or("_blank"),
                attrs.str("rel").unwrap_or("noopener noreferrer nofollow")
            ));
            HtmlParts::new(html, "</a>")
        })
}

/// Keeps `href` and `title`, `target` only when it is `_blank`, and only the
/// known-safe `rel` tokens. Anything else (class, style, handlers) is dropped.
fn link_attrs_from_tag(tag: &HtmlTag) -> Attrs {
    let target = tag.attr("target").filter(|t| *t == "_blank").map(str::to_string);
    let rel: Vec<&str> = tag
        .attr("rel")
        .map(|r| {
            r.split_whitespace()
                .filter(|token| ALLOWED_REL.contains(token))
                .collect()
        })
        .unwrap_or_default();
    let rel = (!rel.is_empty()).then(|| rel.join(" "));
    Attrs::new()
        .with("href", tag.attr("href").map(str::to_string))
        .with("title", non_empty(tag.attr("title")))
        .with("target", target)
        .with("rel", rel)
}

pub fn bold() -> SchemaEntry {
    SchemaEntry::mark(BOLD, true)
        .markdown(MarkdownBinding::tokens(&["strong"]).write(MarkdownWrite::Mark {
            open: |_| "**".to_string(),
            close: |_| "**".to_string(),
        }))
        .dom(DomRule::tag("strong"))
        .dom(DomRule::tag("b"))
        .view(|_| HtmlParts::new("<strong>", "</strong>"))
}

pub fn italic() -> SchemaEntry {
    SchemaEntry::mark(ITALIC, true)
        .markdown(MarkdownBinding::tokens(&["em"]).write(MarkdownWrite::Mark {
            open: |_| "*".to_string(),
            close: |_| "*".to_string(),
        }))
        .dom(DomRule::tag("em"))
        .dom(DomRule::tag("i"))
        .view(|_| HtmlParts::new("<em>", "</em>"))
}

pub fn strike() -> SchemaEntry {
    SchemaEntry::mark(STRIKE, true)
        .markdown(MarkdownBinding::tokens(&["s"]).write(MarkdownWrite::Mark {
            open: |_| "~~".to_string(),
            close: |_| "~~".to_string(),
        }))
        .dom(DomRule::tag("s"))
        .dom(DomRule::tag("del"))
        .dom(DomRule::tag("strike"))
        .view(|_| HtmlParts::new("<s>", "</s>"))
}

/// Comment highlight. Not exclusive so overlapping comments can coexist.
pub fn comment() -> SchemaEntry {
    SchemaEntry::mark(COMMENT, false)
        .requires(&["comment_id"])
        .markdown(MarkdownBinding::tokens(&[]).write(MarkdownWrite::Mark {
            open: |mark| {
                format!(
                    "<span commentId=\"{}\">",
                    escape_attr(mark.attrs().str("comment_id").unwrap_or(""))
                )
            },
            close: |_| "</span>".to_string(),
        }))
        .dom(
            DomRule::tag("span")
                .requires("commentid", None)
                .priority(60)
                .attrs(|tag| Attrs::new().with("comment_id", tag.attr("commentid").map(str::to_string))),
        )
        .view(|attrs| {
            HtmlParts::new(
                format!(
                    "<span commentId=\"{}\" class=\"note-comment\">",
                    escape_attr(attrs.str("comment_id").unwrap_or(""))
                ),
                "</span>",
            )
        })
}

pub fn code() -> SchemaEntry {
    SchemaEntry::mark(CODE, true)
        .markdown(MarkdownBinding::tokens(&["code_inline"]).no_close_token())
        .dom(DomRule::tag("code"))
        .view(|_| HtmlParts::new("<code>", "</code>"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

pub(crate) fn escape_attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}
