use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ammonia::Builder;
use markdown::mdast::{Node, Table};
use markdown::{to_mdast, ParseOptions};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::views::escape;

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "br", "code", "del", "div", "em", "h1", "h2", "h3",
    "h4", "h5", "h6", "hr", "i", "img", "li", "ol", "p", "pre", "span", "strong", "table",
    "tbody", "td", "th", "thead", "tr", "ul",
];

const ALLOWED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title"]),
    ("img", &["src", "alt", "title"]),
    ("abbr", &["title"]),
    ("acronym", &["title"]),
    ("code", &["class"]),
    ("span", &["class"]),
    ("div", &["class"]),
];

const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Render paste content to HTML that is safe to embed in a page.
///
/// Markdown is rendered first and the resulting HTML is sanitized second;
/// raw HTML in the source is passed through the renderer untouched, so the
/// order matters.
pub fn render(source: &str) -> String {
    sanitize(&markdown_to_html(source))
}

/// Strip every tag and attribute that is not on the allow-list.
pub fn sanitize(html: &str) -> String {
    let tag_attributes: HashMap<&str, HashSet<&str>> = ALLOWED_ATTRIBUTES
        .iter()
        .map(|(tag, attributes)| (*tag, attributes.iter().copied().collect()))
        .collect();

    Builder::default()
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .url_schemes(ALLOWED_URL_SCHEMES.iter().copied().collect())
        .clean(html)
        .to_string()
}

/// Render markdown (with GFM tables, strikethrough and autolinks) to
/// unsanitized HTML. Fenced code blocks are syntax highlighted.
fn markdown_to_html(source: &str) -> String {
    struct Renderer {
        definitions: HashMap<String, (String, Option<String>)>,
    }

    impl Renderer {
        fn render_nodes(&self, nodes: &[Node], tight: bool) -> String {
            nodes
                .iter()
                .map(|n| self.render_node(n, tight))
                .fold(String::new(), |acc, s| acc + &s)
        }

        fn render_node(&self, node: &Node, tight: bool) -> String {
            match node {
                Node::Root(node) => self.render_nodes(&node.children, false),

                Node::Heading(node) => {
                    let level = node.depth.clamp(1, 6);
                    format!(
                        "<h{level}>{}</h{level}>\n",
                        self.render_nodes(&node.children, tight)
                    )
                }

                Node::Paragraph(node) => {
                    let inner = self.render_nodes(&node.children, tight);
                    if tight {
                        inner
                    } else {
                        format!("<p>{inner}</p>\n")
                    }
                }

                Node::Text(node) => escape(&node.value),
                Node::Strong(node) => {
                    format!("<strong>{}</strong>", self.render_nodes(&node.children, tight))
                }
                Node::Emphasis(node) => {
                    format!("<em>{}</em>", self.render_nodes(&node.children, tight))
                }
                Node::Delete(node) => {
                    format!("<del>{}</del>", self.render_nodes(&node.children, tight))
                }
                Node::InlineCode(node) => format!("<code>{}</code>", escape(&node.value)),
                Node::Break(_) => "<br>\n".to_owned(),

                Node::Link(node) => link(
                    &node.url,
                    node.title.as_deref(),
                    &self.render_nodes(&node.children, tight),
                ),
                Node::Image(node) => image(&node.url, node.title.as_deref(), &node.alt),
                Node::LinkReference(node) => {
                    let inner = self.render_nodes(&node.children, tight);
                    match self.definitions.get(&node.identifier) {
                        Some((url, title)) => link(url, title.as_deref(), &inner),
                        None => inner,
                    }
                }
                Node::ImageReference(node) => match self.definitions.get(&node.identifier) {
                    Some((url, title)) => image(url, title.as_deref(), &node.alt),
                    None => escape(&node.alt),
                },
                Node::Definition(_) => String::new(),

                Node::BlockQuote(node) => format!(
                    "<blockquote>\n{}</blockquote>\n",
                    self.render_nodes(&node.children, false)
                ),
                Node::ThematicBreak(_) => "<hr>\n".to_owned(),
                Node::Code(node) => highlight(&node.value, node.lang.as_deref()),
                Node::Html(node) => node.value.clone(),

                Node::List(node) => {
                    let items = self.render_nodes(&node.children, !node.spread);
                    if node.ordered {
                        format!("<ol>\n{items}</ol>\n")
                    } else {
                        format!("<ul>\n{items}</ul>\n")
                    }
                }
                Node::ListItem(node) => {
                    let checkbox = match node.checked {
                        Some(true) => "[x] ",
                        Some(false) => "[ ] ",
                        None => "",
                    };
                    let tight = tight && !node.spread;
                    format!(
                        "<li>{checkbox}{}</li>\n",
                        self.render_nodes(&node.children, tight)
                    )
                }

                Node::Table(node) => self.render_table(node),

                // footnotes are kept as the literal text that was typed
                Node::FootnoteReference(node) => {
                    escape(&footnote_marker(node.label.as_deref(), &node.identifier))
                }
                Node::FootnoteDefinition(node) => format!(
                    "<p>{}: {}</p>\n",
                    escape(&footnote_marker(node.label.as_deref(), &node.identifier)),
                    self.render_nodes(&node.children, true)
                ),

                // front matter, math and anything else degrade to their children
                other => match children(other) {
                    Some(children) => self.render_nodes(children, tight),
                    None => String::new(),
                },
            }
        }

        fn render_table(&self, table: &Table) -> String {
            let mut rows = table.children.iter().filter_map(|row| match row {
                Node::TableRow(row) => Some(row),
                _ => None,
            });

            let render_row = |cells: &[Node], tag: &str| {
                let cells = cells
                    .iter()
                    .map(|cell| {
                        let inner = match cell {
                            Node::TableCell(cell) => self.render_nodes(&cell.children, true),
                            other => self.render_node(other, true),
                        };
                        format!("<{tag}>{inner}</{tag}>")
                    })
                    .collect::<String>();
                format!("<tr>{cells}</tr>\n")
            };

            let mut html = String::from("<table>\n");
            if let Some(head) = rows.next() {
                html.push_str("<thead>\n");
                html.push_str(&render_row(&head.children, "th"));
                html.push_str("</thead>\n");
            }
            let body: String = rows.map(|row| render_row(&row.children, "td")).collect();
            if !body.is_empty() {
                html.push_str("<tbody>\n");
                html.push_str(&body);
                html.push_str("</tbody>\n");
            }
            html.push_str("</table>\n");
            html
        }
    }

    fn collect_definitions(node: &Node, out: &mut HashMap<String, (String, Option<String>)>) {
        if let Node::Definition(definition) = node {
            // the first definition of an identifier wins
            out.entry(definition.identifier.clone())
                .or_insert_with(|| (definition.url.clone(), definition.title.clone()));
        }
        if let Some(children) = children(node) {
            for child in children {
                collect_definitions(child, out);
            }
        }
    }

    fn children(node: &Node) -> Option<&Vec<Node>> {
        match node {
            Node::Root(node) => Some(&node.children),
            Node::BlockQuote(node) => Some(&node.children),
            Node::FootnoteDefinition(node) => Some(&node.children),
            Node::List(node) => Some(&node.children),
            Node::ListItem(node) => Some(&node.children),
            Node::Paragraph(node) => Some(&node.children),
            Node::Heading(node) => Some(&node.children),
            Node::Emphasis(node) => Some(&node.children),
            Node::Strong(node) => Some(&node.children),
            Node::Delete(node) => Some(&node.children),
            Node::Link(node) => Some(&node.children),
            Node::LinkReference(node) => Some(&node.children),
            Node::Table(node) => Some(&node.children),
            Node::TableRow(node) => Some(&node.children),
            Node::TableCell(node) => Some(&node.children),
            _ => None,
        }
    }

    fn footnote_marker(label: Option<&str>, identifier: &str) -> String {
        format!("[^{}]", label.unwrap_or(identifier))
    }

    fn link(url: &str, title: Option<&str>, inner: &str) -> String {
        let title = title
            .map(|t| format!(" title=\"{}\"", escape(t)))
            .unwrap_or_default();
        format!("<a href=\"{}\"{title}>{inner}</a>", escape(url))
    }

    fn image(url: &str, title: Option<&str>, alt: &str) -> String {
        let title = title
            .map(|t| format!(" title=\"{}\"", escape(t)))
            .unwrap_or_default();
        format!(
            "<img src=\"{}\" alt=\"{}\"{title}>",
            escape(url),
            escape(alt)
        )
    }

    let options = ParseOptions::gfm();
    let Ok(root) = to_mdast(source, &options) else {
        // only MDX constructs can fail to parse, and they are disabled
        return format!("<pre>{}</pre>", escape(source));
    };

    let mut definitions = HashMap::new();
    collect_definitions(&root, &mut definitions);

    Renderer { definitions }.render_node(&root, false)
}

/// Highlight a fenced code block into class-bearing spans.
fn highlight(code: &str, lang: Option<&str>) -> String {
    let syntax = lang
        .and_then(|lang| SYNTAXES.find_syntax_by_token(lang))
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, ClassStyle::Spaced);
    let highlighted = LinesWithEndings::from(code)
        .try_for_each(|line| generator.parse_html_for_line_which_includes_newline(line))
        .map(|()| generator.finalize())
        .unwrap_or_else(|_| escape(code));

    let class = match lang {
        Some(lang) => format!(" class=\"language-{}\"", escape(lang)),
        None => String::new(),
    };
    format!("<div class=\"highlight\"><pre><code{class}>{highlighted}</code></pre></div>\n")
}
