//! In-memory DOM for annotator tests.
//!
//! An arena of element nodes with a pre-order walk and a selector matcher
//! covering the subset Vigia issues: `tag`, `*`, `.class`, `#id`,
//! `[attr]`, `[attr="value"]`, compounds of those, and comma lists.

use crate::result::{VigiaError, VigiaResult};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a node in a [`MockDom`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct MockNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl MockNode {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(String::as_str)
            .unwrap_or("")
            .split_whitespace()
    }
}

/// Element tree with `<html>`, `<head>` and `<body>` pre-created
pub struct MockDom {
    nodes: RefCell<Vec<MockNode>>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl fmt::Debug for MockDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDom")
            .field("node_count", &self.nodes.borrow().len())
            .finish()
    }
}

impl Default for MockDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDom {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        let mut html = MockNode::new("html");
        let mut head = MockNode::new("head");
        let mut body = MockNode::new("body");
        head.parent = Some(NodeId(0));
        body.parent = Some(NodeId(0));
        html.children = vec![NodeId(1), NodeId(2)];
        Self {
            nodes: RefCell::new(vec![html, head, body]),
            root: NodeId(0),
            head: NodeId(1),
            body: NodeId(2),
        }
    }

    /// `<html>`
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// `<head>`
    #[must_use]
    pub const fn head(&self) -> NodeId {
        self.head
    }

    /// `<body>`
    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element
    pub fn create(&self, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(MockNode::new(tag));
        NodeId(nodes.len() - 1)
    }

    /// Create an element with attributes and text and append it to `parent`
    pub fn append_element(
        &self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> NodeId {
        let id = self.create(tag);
        {
            let mut nodes = self.nodes.borrow_mut();
            let node = &mut nodes[id.0];
            for (name, value) in attributes {
                node.attributes
                    .insert((*name).to_string(), (*value).to_string());
            }
            node.text = text.to_string();
        }
        self.append(parent, id);
        id
    }

    /// Move `child` under `parent`
    pub fn append(&self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let mut nodes = self.nodes.borrow_mut();
        nodes[child.0].parent = Some(parent);
        nodes[parent.0].children.push(child);
    }

    /// Detach a node from its parent
    pub fn detach(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    /// Whether the node is reachable from `<html>`
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = nodes[id.0].parent;
        }
        false
    }

    /// Lower-case tag name
    #[must_use]
    pub fn tag(&self, node: NodeId) -> String {
        self.nodes.borrow()[node.0].tag.clone()
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0].attributes.get(name).cloned()
    }

    /// Set an attribute
    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    /// Remove an attribute
    pub fn remove_attr(&self, node: NodeId, name: &str) {
        self.nodes.borrow_mut()[node.0].attributes.remove(name);
    }

    /// Own text followed by descendant text, in document order
    #[must_use]
    pub fn text(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    /// Replace children with plain text
    pub fn set_text(&self, node: NodeId, text: &str) {
        let children = std::mem::take(&mut self.nodes.borrow_mut()[node.0].children);
        let mut nodes = self.nodes.borrow_mut();
        for child in children {
            nodes[child.0].parent = None;
        }
        nodes[node.0].text = text.to_string();
    }

    /// Whether the node carries `class`
    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes.borrow()[node.0].classes().any(|c| c == class)
    }

    /// Add a class (no duplicates)
    pub fn add_class(&self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let mut nodes = self.nodes.borrow_mut();
        let attrs = &mut nodes[node.0].attributes;
        let value = attrs.entry("class".to_string()).or_default();
        if !value.is_empty() {
            value.push(' ');
        }
        value.push_str(class);
    }

    /// Remove a class
    pub fn remove_class(&self, node: NodeId, class: &str) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(value) = nodes[node.0].attributes.get_mut("class") {
            *value = value
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    /// First attached element with the given id
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        let nodes = self.nodes.borrow();
        let mut found = None;
        walk(&nodes, self.root, &mut |node_id, node| {
            if found.is_none() && node.attributes.get("id").map(String::as_str) == Some(id) {
                found = Some(node_id);
            }
        });
        found
    }

    /// Attached elements matching a selector list, in document order
    pub fn query_all(&self, selector: &str) -> VigiaResult<Vec<NodeId>> {
        let selectors = parse_selector_list(selector)?;
        let nodes = self.nodes.borrow();
        let mut matches = Vec::new();
        walk(&nodes, self.root, &mut |node_id, node| {
            if selectors.iter().any(|s| s.matches(node)) {
                matches.push(node_id);
            }
        });
        Ok(matches)
    }
}

fn collect_text(nodes: &[MockNode], node: NodeId, out: &mut String) {
    out.push_str(&nodes[node.0].text);
    for child in &nodes[node.0].children {
        collect_text(nodes, *child, out);
    }
}

fn walk(nodes: &[MockNode], node: NodeId, visit: &mut dyn FnMut(NodeId, &MockNode)) {
    visit(node, &nodes[node.0]);
    for child in &nodes[node.0].children {
        walk(nodes, *child, visit);
    }
}

#[derive(Debug, Default, PartialEq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl CompoundSelector {
    fn matches(&self, node: &MockNode) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != node.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attributes.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| node.classes().any(|n| n == c)) {
            return false;
        }
        self.attributes.iter().all(|(name, value)| {
            match (node.attributes.get(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            }
        })
    }
}

fn parse_selector_list(list: &str) -> VigiaResult<Vec<CompoundSelector>> {
    list.split(',').map(|s| parse_compound(s.trim())).collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(input: &str) -> VigiaResult<CompoundSelector> {
    let unsupported = || VigiaError::dom(format!("unsupported selector: {input:?}"));
    if input.is_empty() {
        return Err(unsupported());
    }

    let mut selector = CompoundSelector::default();
    let mut rest = input;

    let take_ident = |s: &str| -> (String, usize) {
        let len = s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len());
        (s[..len].to_string(), len)
    };

    if let Some(stripped) = rest.strip_prefix('*') {
        rest = stripped;
    } else {
        let (tag, len) = take_ident(rest);
        if len > 0 {
            selector.tag = Some(tag.to_ascii_lowercase());
            rest = &rest[len..];
        }
    }

    while let Some(c) = rest.chars().next() {
        match c {
            '.' | '#' => {
                let (name, len) = take_ident(&rest[1..]);
                if len == 0 {
                    return Err(unsupported());
                }
                if c == '.' {
                    selector.classes.push(name);
                } else {
                    selector.id = Some(name);
                }
                rest = &rest[1 + len..];
            }
            '[' => {
                let close = rest.find(']').ok_or_else(unsupported)?;
                let body = &rest[1..close];
                let attribute = match body.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim().trim_matches(|q: char| q == '"' || q == '\'');
                        (name.trim().to_string(), Some(value.to_string()))
                    }
                    None => (body.trim().to_string(), None),
                };
                if attribute.0.is_empty() || !attribute.0.chars().all(is_ident_char) {
                    return Err(unsupported());
                }
                selector.attributes.push(attribute);
                rest = &rest[close + 1..];
            }
            _ => return Err(unsupported()),
        }
    }

    Ok(selector)
}
