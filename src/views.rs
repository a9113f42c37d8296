//! HTML pages. Every piece of user text is escaped here; rendered paste
//! bodies only ever come from [`crate::markdown::render`].

use axum::http::StatusCode;
use urlencoding::encode;

use crate::models::Paste;

const STYLE: &str = "\
body { max-width: 50rem; margin: 2rem auto; padding: 0 1rem; font-family: sans-serif; }
textarea { width: 100%; min-height: 20rem; font-family: monospace; }
input[type=text], input[type=password] { width: 20rem; }
.message { padding: 0.5rem 1rem; border-radius: 4px; background: #fdecea; }
.meta { color: #666; font-size: 0.9rem; }
.highlight pre { background: #f6f8fa; padding: 1rem; overflow-x: auto; }
.highlight .comment { color: #6a737d; }
.highlight .keyword, .highlight .storage { color: #d73a49; }
.highlight .string { color: #032f62; }
.highlight .constant { color: #005cc5; }
.highlight .entity.name { color: #6f42c1; }
";

/// Escape text for use in HTML element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>\n{STYLE}</style>\n</head>\n<body>\n\
         <header><a href=\"/\">new paste</a></header>\n<main>\n{body}</main>\n</body>\n</html>\n",
        title = escape(title)
    )
}

fn message_block(message: Option<&str>) -> String {
    message
        .map(|m| format!("<p class=\"message\" role=\"alert\">{}</p>\n", escape(m)))
        .unwrap_or_default()
}

/// The new-paste form, optionally prefilled after a failed submission.
pub fn index(content: &str, custom_slug: &str, message: Option<&str>) -> String {
    let body = format!(
        "<h1>New paste</h1>\n{message}\
         <form method=\"post\" action=\"/\">\n\
         <p><textarea name=\"content\" required placeholder=\"Markdown content\">{content}</textarea></p>\n\
         <p><label>Password <input type=\"password\" name=\"password\" required></label></p>\n\
         <p><label>Custom slug (optional) <input type=\"text\" name=\"custom_slug\" \
         value=\"{custom_slug}\" pattern=\"[a-zA-Z0-9_\\-]+\"></label></p>\n\
         <p><button type=\"submit\">Create</button></p>\n</form>\n",
        message = message_block(message),
        content = escape(content),
        custom_slug = escape(custom_slug),
    );
    layout("New paste", &body)
}

/// A paste with its already-sanitized body.
pub fn paste(paste: &Paste, rendered: &str, base_url: &str) -> String {
    let slug = encode(&paste.slug);
    let updated = paste
        .updated_at
        .map(|t| format!(", edited {}", t.format("%Y-%m-%d %H:%M UTC")))
        .unwrap_or_default();
    let body = format!(
        "<article>\n{rendered}</article>\n\
         <p class=\"meta\">created {created}{updated} &middot; \
         <a href=\"{base_url}/{slug}\">{base_url}/{slug}</a> &middot; \
         <a href=\"/{slug}/edit\">edit</a></p>\n",
        created = paste.created_at.format("%Y-%m-%d %H:%M UTC"),
        base_url = escape(base_url),
    );
    layout(&paste.slug, &body)
}

/// The edit form for an existing paste.
pub fn edit(slug: &str, content: &str, message: Option<&str>) -> String {
    let encoded = encode(slug);
    let body = format!(
        "<h1>Edit {title}</h1>\n{message}\
         <form method=\"post\" action=\"/{encoded}/edit\">\n\
         <p><textarea name=\"content\" required>{content}</textarea></p>\n\
         <p><label>Password <input type=\"password\" name=\"password\" required></label></p>\n\
         <p><button type=\"submit\">Save</button> <a href=\"/{encoded}\">cancel</a></p>\n</form>\n",
        title = escape(slug),
        message = message_block(message),
        content = escape(content),
    );
    layout(&format!("Edit {slug}"), &body)
}

/// The generic page for any missing paste or route.
pub fn not_found() -> String {
    layout(
        "Not found",
        "<h1>Not found</h1>\n<p>There is nothing here.</p>\n",
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!("<h1>{}</h1>\n{}", escape(title), message_block(Some(message)));
    layout(title, &body)
}
