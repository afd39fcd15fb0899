//! Minimal element tree the card renders into.
//!
//! Only what the card needs: attributes, class lists, listener bindings, and
//! serialization to escaped HTML.

use std::fmt;

use crate::registry::SectionKey;

/// Attribute carried by every element that belongs to a section.
pub const SECTION_KEY_ATTR: &str = "data-section-key";

const VOID_TAGS: &[&str] = &["img", "br", "hr", "meta", "link", "input"];

/// Behavior bound to an element at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    ToggleCollapse(SectionKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Emitted verbatim. Only used for style sheets.
    Raw(String),
}

impl From<Element> for Node {
    fn from(e: Element) -> Self { Node::Element(e) }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    listeners: Vec<Listener>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), ..Default::default() }
    }

    pub fn tag(&self) -> &str { &self.tag }

    // --- builders ---

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn class(self, class: &str) -> Self { self.attr("class", class) }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    // --- attributes ---

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class").is_some_and(|c| c.split_whitespace().any(|x| x == class))
    }

    /// Add or remove one class, leaving the others in place.
    pub fn toggle_class(&mut self, class: &str, on: bool) {
        let mut classes: Vec<String> = self
            .get_attr("class")
            .map(|c| c.split_whitespace().filter(|x| *x != class).map(str::to_string).collect())
            .unwrap_or_default();
        if on { classes.push(class.to_string()); }
        if classes.is_empty() { self.remove_attr("class"); } else { self.set_attr("class", classes.join(" ")); }
    }

    // --- children ---

    pub fn children(&self) -> &[Node] { &self.children }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n { Node::Element(e) => Some(e), _ => None })
    }

    pub fn replace_children(&mut self, children: Vec<Node>) {
        self.children = children;
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for n in &self.children {
            match n {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => out.push_str(&e.text_content()),
                Node::Raw(_) => {}
            }
        }
        out
    }

    // --- listeners ---

    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn listeners(&self) -> &[Listener] { &self.listeners }

    // --- queries (depth-first, self included) ---

    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) { return Some(self); }
        self.child_elements().find_map(|e| e.find(pred))
    }

    pub fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        if pred(self) { return Some(self); }
        for n in &mut self.children {
            if let Node::Element(e) = n {
                if let Some(found) = e.find_mut(pred) { return Some(found); }
            }
        }
        None
    }

    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
        if pred(self) { out.push(self); }
        for e in self.child_elements() { e.find_all(pred, out); }
    }

    /// Count matching elements, self included.
    pub fn count(&self, pred: &dyn Fn(&Element) -> bool) -> usize {
        let mut out = Vec::new();
        self.find_all(pred, &mut out);
        out.len()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape(v));
            out.push('"');
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag.as_str()) { return; }
        for n in &self.children {
            match n {
                Node::Element(e) => e.write_html(out),
                Node::Text(t) => out.push_str(&escape(t)),
                Node::Raw(r) => out.push_str(r),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

/// Matches an element carrying the given section key marker and class.
pub fn section_part<'a>(key: &'a str, class: &'static str) -> impl Fn(&Element) -> bool + 'a {
    move |e| e.get_attr(SECTION_KEY_ATTR) == Some(key) && e.has_class(class)
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
