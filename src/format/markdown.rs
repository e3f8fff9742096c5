//! Markdown <-> HTML.
//!
//! Forward conversion renders CommonMark with pulldown-cmark. The reverse
//! walks the translated HTML and writes Markdown for the constructs the
//! forward pass produces.

use super::html::{attr, children, element_name, text, text_content, with_body};
use super::FormatConverter;
use crate::entry::FieldFormat;
use crate::error::{LocalizeError, Result};
use markup5ever_rcdom::Handle;
use pulldown_cmark::{html, Options, Parser};
use serde_json::Value;

pub struct MarkdownConverter;

impl FormatConverter for MarkdownConverter {
    fn to_transport(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(markdown) => Ok(markdown_to_html(markdown)),
            other => Err(LocalizeError::conversion(
                FieldFormat::Markdown,
                format!("expected a string, got {}", other),
            )),
        }
    }

    fn from_transport(&self, text: String) -> Result<Value> {
        Ok(Value::String(html_to_markdown(&text)))
    }
}

pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub fn html_to_markdown(html: &str) -> String {
    with_body(html, |body| {
        let mut out = String::new();
        write_blocks(&children(body), &mut out);
        out.trim_end().to_string()
    })
    .unwrap_or_default()
}

fn write_blocks(nodes: &[Handle], out: &mut String) {
    for node in nodes {
        if let Some(text) = text(node) {
            if !text.trim().is_empty() {
                out.push_str(&escape_line_starts(&escape_inline(text.trim())));
                out.push_str("\n\n");
            }
            continue;
        }
        let Some(name) = element_name(node) else {
            continue;
        };
        match name.as_str() {
            "p" => {
                out.push_str(&escape_line_starts(&inline(node)));
                out.push_str("\n\n");
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let mut content = escape_line_starts(&inline(node));
                // a trailing `#` would be read as a closing sequence
                if content.ends_with('#') {
                    content.insert(content.len() - 1, '\\');
                }
                out.push_str(&"#".repeat(level));
                out.push(' ');
                out.push_str(&content);
                out.push_str("\n\n");
            }
            "ul" | "ol" => {
                write_list(node, name == "ol", out);
                out.push('\n');
            }
            "blockquote" => {
                let mut inner = String::new();
                write_blocks(&children(node), &mut inner);
                for line in inner.trim_end().lines() {
                    if line.is_empty() {
                        out.push_str(">\n");
                    } else {
                        out.push_str("> ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                out.push('\n');
            }
            "pre" => {
                let code = children(node)
                    .into_iter()
                    .find(|child| element_name(child).as_deref() == Some("code"));
                let language = code
                    .as_ref()
                    .and_then(|c| attr(c, "class"))
                    .and_then(|class| class.strip_prefix("language-").map(str::to_string))
                    .unwrap_or_default();
                let body = text_content(node);
                out.push_str("```");
                out.push_str(&language);
                out.push('\n');
                out.push_str(&body);
                if !body.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("```\n\n");
            }
            "hr" => out.push_str("---\n\n"),
            _ => {
                let content = escape_line_starts(&inline(node));
                if !content.trim().is_empty() {
                    out.push_str(&content);
                    out.push_str("\n\n");
                }
            }
        }
    }
}

fn write_list(list: &Handle, ordered: bool, out: &mut String) {
    let start = attr(list, "start")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);
    let items = children(list)
        .into_iter()
        .filter(|child| element_name(child).as_deref() == Some("li"));

    for (i, item) in items.enumerate() {
        let marker = if ordered {
            format!("{}. ", start + i)
        } else {
            "- ".to_string()
        };
        let indent = " ".repeat(marker.len());

        let mut content = String::new();
        let mut nested = String::new();
        for child in children(&item) {
            match element_name(&child).as_deref() {
                Some(tag @ ("ul" | "ol")) => write_list(&child, tag == "ol", &mut nested),
                _ => content.push_str(&inline_node(&child)),
            }
        }

        out.push_str(&marker);
        out.push_str(&escape_line_starts(content.trim()));
        out.push('\n');
        for line in nested.lines() {
            out.push_str(&indent);
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn inline(node: &Handle) -> String {
    children(node).iter().map(inline_node).collect()
}

fn inline_node(node: &Handle) -> String {
    if let Some(text) = text(node) {
        return escape_inline(&text);
    }
    let Some(name) = element_name(node) else {
        return String::new();
    };
    match name.as_str() {
        "strong" | "b" => format!("**{}**", inline(node)),
        "em" | "i" => format!("*{}*", inline(node)),
        "del" | "s" | "strike" => format!("~~{}~~", inline(node)),
        "code" => format!("`{}`", text_content(node)),
        "a" => format!(
            "[{}]({})",
            inline(node),
            attr(node, "href").unwrap_or_default()
        ),
        "img" => format!(
            "![{}]({})",
            attr(node, "alt").unwrap_or_default(),
            attr(node, "src").unwrap_or_default()
        ),
        "br" => "  \n".to_string(),
        // paragraphs inside list items of loose lists
        "p" => format!("{} ", inline(node)),
        _ => inline(node),
    }
}

/// Backslash-escape characters of running text that Markdown would read as
/// inline syntax.
fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '\\' | '*' | '_' | '`' | '[' | ']' | '~' | '<' => {
                out.push('\\');
                out.push(c);
            }
            '&' if looks_like_entity(&text[i + 1..]) => out.push_str("\\&"),
            _ => out.push(c),
        }
    }
    out
}

fn looks_like_entity(rest: &str) -> bool {
    let rest = rest.strip_prefix('#').unwrap_or(rest);
    let name_len = rest.chars().take_while(char::is_ascii_alphanumeric).count();
    name_len > 0 && rest[name_len..].starts_with(';')
}

/// Escape the first character of every line that would otherwise open a
/// block: headings, quotes, bullets, setext underlines, list numbers.
fn escape_line_starts(text: &str) -> String {
    text.split('\n')
        .map(escape_line_start)
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_line_start(line: &str) -> String {
    let line = line.trim_start_matches(' ');
    if line.starts_with(&['#', '>', '-', '+', '='][..]) {
        return format!("\\{}", line);
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && line[digits..].starts_with(&['.', ')'][..]) {
        return format!("{}\\{}", &line[..digits], &line[digits..]);
    }
    line.to_string()
}
