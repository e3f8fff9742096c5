//! Structured rich-text blocks <-> HTML.
//!
//! Blocks are a JSON array of nodes such as
//! `{"type": "paragraph", "children": [{"type": "text", "text": "Hi", "bold": true}]}`.
//! Block types without translatable text (images and anything unknown) are
//! carried through the engine verbatim in a `data-block` attribute.

use super::html::{
    attr, children, element_name, escape_attr, escape_text, text, text_content,
    with_body,
};
use super::FormatConverter;
use crate::entry::FieldFormat;
use crate::error::{LocalizeError, Result};
use markup5ever_rcdom::Handle;
use serde_json::{json, Map, Value};

pub struct BlocksConverter;

impl FormatConverter for BlocksConverter {
    fn to_transport(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Array(blocks) => {
                let mut out = String::new();
                for block in blocks {
                    write_block(block, &mut out)?;
                }
                Ok(out)
            }
            other => Err(LocalizeError::conversion(
                FieldFormat::Blocks,
                format!("expected an array of blocks, got {}", other),
            )),
        }
    }

    fn from_transport(&self, text: String) -> Result<Value> {
        with_body(&text, |body| read_blocks(&children(body)))
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(Value::Array)
    }
}

const MARKS: [(&str, &str); 5] = [
    ("code", "code"),
    ("strikethrough", "s"),
    ("underline", "u"),
    ("italic", "em"),
    ("bold", "strong"),
];

fn write_block(block: &Value, out: &mut String) -> Result<()> {
    let Some(kind) = block.get("type").and_then(Value::as_str) else {
        return Err(LocalizeError::conversion(
            FieldFormat::Blocks,
            format!("block without a type: {}", block),
        ));
    };
    match kind {
        "paragraph" => wrap(out, "p", block),
        "heading" => {
            let level = block
                .get("level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            wrap(out, &format!("h{}", level), block)
        }
        "quote" => wrap(out, "blockquote", block),
        "code" => {
            let language = block
                .get("language")
                .and_then(Value::as_str)
                .map(|l| format!(r#" data-language="{}""#, escape_attr(l)))
                .unwrap_or_default();
            out.push_str(&format!("<pre{}><code>", language));
            out.push_str(&escape_text(&plain_text(block)));
            out.push_str("</code></pre>");
            Ok(())
        }
        "list" => {
            let tag = match block.get("format").and_then(Value::as_str) {
                Some("ordered") => "ol",
                _ => "ul",
            };
            out.push_str(&format!("<{}>", tag));
            for item in child_nodes(block) {
                match item.get("type").and_then(Value::as_str) {
                    Some("list-item") => wrap(out, "li", item)?,
                    _ => write_block(item, out)?,
                }
            }
            out.push_str(&format!("</{}>", tag));
            Ok(())
        }
        _ => {
            out.push_str(&format!(
                r#"<div data-block="{}"></div>"#,
                escape_attr(&block.to_string())
            ));
            Ok(())
        }
    }
}

fn wrap(out: &mut String, tag: &str, block: &Value) -> Result<()> {
    out.push_str(&format!("<{}>", tag));
    for node in child_nodes(block) {
        write_inline(node, out)?;
    }
    out.push_str(&format!("</{}>", tag));
    Ok(())
}

fn child_nodes(block: &Value) -> &[Value] {
    block
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn write_inline(node: &Value, out: &mut String) -> Result<()> {
    match node.get("type").and_then(Value::as_str) {
        Some("text") => {
            let mut html = escape_text(node.get("text").and_then(Value::as_str).unwrap_or(""));
            for (mark, tag) in MARKS {
                if node.get(mark).and_then(Value::as_bool).unwrap_or(false) {
                    html = format!("<{tag}>{html}</{tag}>");
                }
            }
            out.push_str(&html);
            Ok(())
        }
        Some("link") => {
            let url = node.get("url").and_then(Value::as_str).unwrap_or("");
            out.push_str(&format!(r#"<a href="{}">"#, escape_attr(url)));
            for child in child_nodes(node) {
                write_inline(child, out)?;
            }
            out.push_str("</a>");
            Ok(())
        }
        // list items may nest a list inline
        Some("list") => write_block(node, out),
        _ => Err(LocalizeError::conversion(
            FieldFormat::Blocks,
            format!("unsupported inline node: {}", node),
        )),
    }
}

fn plain_text(block: &Value) -> String {
    child_nodes(block)
        .iter()
        .map(|node| match node.get("text").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => plain_text(node),
        })
        .collect()
}

fn read_blocks(nodes: &[Handle]) -> Result<Vec<Value>> {
    let mut blocks = Vec::new();
    for node in nodes {
        if let Some(text) = text(node) {
            if !text.trim().is_empty() {
                blocks.push(json!({
                    "type": "paragraph",
                    "children": [{"type": "text", "text": text}],
                }));
            }
            continue;
        }
        let Some(name) = element_name(node) else {
            continue;
        };
        if let Some(raw) = attr(node, "data-block") {
            let block = serde_json::from_str(&raw).map_err(|e| {
                LocalizeError::conversion(FieldFormat::Blocks, format!("corrupt data-block: {}", e))
            })?;
            blocks.push(block);
            continue;
        }
        let block = match name.as_str() {
            "p" => element_block("paragraph", node),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let mut block = element_block("heading", node);
                block.insert("level".to_string(), json!(name[1..].parse::<u64>().unwrap_or(1)));
                block
            }
            "blockquote" => element_block("quote", node),
            "pre" => {
                let mut block = Map::new();
                block.insert("type".to_string(), json!("code"));
                if let Some(language) = attr(node, "data-language") {
                    block.insert("language".to_string(), json!(language));
                }
                block.insert(
                    "children".to_string(),
                    json!([{"type": "text", "text": text_content(node)}]),
                );
                block
            }
            "ul" | "ol" => read_list(node, name == "ol"),
            _ => element_block("paragraph", node),
        };
        blocks.push(Value::Object(block));
    }
    Ok(blocks)
}

fn read_list(list: &Handle, ordered: bool) -> Map<String, Value> {
    let mut items = Vec::new();
    for child in children(list) {
        match element_name(&child).as_deref() {
            Some("li") => items.push(Value::Object(element_block("list-item", &child))),
            Some(tag @ ("ul" | "ol")) => items.push(Value::Object(read_list(&child, tag == "ol"))),
            _ => {}
        }
    }
    let mut block = Map::new();
    block.insert("type".to_string(), json!("list"));
    block.insert(
        "format".to_string(),
        json!(if ordered { "ordered" } else { "unordered" }),
    );
    block.insert("children".to_string(), Value::Array(items));
    block
}

fn element_block(kind: &str, node: &Handle) -> Map<String, Value> {
    let mut inline = Vec::new();
    read_inline(node, &Marks::default(), &mut inline);
    if inline.is_empty() {
        inline.push(json!({"type": "text", "text": ""}));
    }
    let mut block = Map::new();
    block.insert("type".to_string(), json!(kind));
    block.insert("children".to_string(), Value::Array(inline));
    block
}

#[derive(Debug, Clone, Copy, Default)]
struct Marks {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    code: bool,
}

fn read_inline(node: &Handle, marks: &Marks, out: &mut Vec<Value>) {
    for child in children(node) {
        if let Some(text) = text(&child) {
            out.push(text_node(text, marks));
            continue;
        }
        let Some(name) = element_name(&child) else {
            continue;
        };
        let mut inner = *marks;
        match name.as_str() {
            "strong" | "b" => inner.bold = true,
            "em" | "i" => inner.italic = true,
            "u" => inner.underline = true,
            "s" | "del" | "strike" => inner.strikethrough = true,
            "code" => inner.code = true,
            "br" => {
                out.push(text_node("\n".to_string(), marks));
                continue;
            }
            "a" => {
                let mut link_children = Vec::new();
                read_inline(&child, marks, &mut link_children);
                out.push(json!({
                    "type": "link",
                    "url": attr(&child, "href").unwrap_or_default(),
                    "children": link_children,
                }));
                continue;
            }
            "ul" | "ol" => {
                out.push(Value::Object(read_list(&child, name == "ol")));
                continue;
            }
            _ => {}
        }
        read_inline(&child, &inner, out);
    }
}

fn text_node(text: String, marks: &Marks) -> Value {
    let mut node = Map::new();
    node.insert("type".to_string(), json!("text"));
    node.insert("text".to_string(), json!(text));
    for (flag, name) in [
        (marks.bold, "bold"),
        (marks.italic, "italic"),
        (marks.underline, "underline"),
        (marks.strikethrough, "strikethrough"),
        (marks.code, "code"),
    ] {
        if flag {
            node.insert(name.to_string(), json!(true));
        }
    }
    Value::Object(node)
}
