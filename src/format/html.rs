//! Small helpers over the html5ever DOM shared by the converters.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse an HTML fragment and run `f` over the `<body>` element holding it.
///
/// Handles are only valid while the `RcDom` lives: dropping it detaches
/// every node, so the body is never handed out past this call.
pub fn with_body<R>(html: &str, f: impl FnOnce(&Handle) -> R) -> Option<R> {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let body = find_element(&dom.document, "body")?;
    Some(f(&body))
}

fn find_element(node: &Handle, wanted: &str) -> Option<Handle> {
    if element_name(node).as_deref() == Some(wanted) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, wanted))
}

pub fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

/// Concatenated text of all descendants.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    if let Some(text) = text(node) {
        out.push_str(&text);
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
