//! Markup parser – turns the resolved prescription source into a small
//! element tree.
//!
//! Only the subset the prescription template is authored in is modelled:
//! block containers (div, p, h1-h3, ul/ol/li), inline runs (span, strong,
//! em, b, i), images, line breaks, and the html/head/body skeleton. Styling
//! arrives through `class` and `style` attributes.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Span,
    Strong,
    Em,
    Img,
    Br,
    Html,
    Head,
    Body,
    /// Anything else; laid out as nothing.
    Other(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "div" | "section" | "header" | "footer" | "main" | "article" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "span" => Tag::Span,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "img" => Tag::Img,
            "br" => Tag::Br,
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            other => Tag::Other(other.to_string()),
        }
    }

    /// Elements that never have children or a closing tag.
    fn is_void(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "img" | "br" | "hr" | "meta" | "link" | "input"
        )
    }

    /// Elements whose text content is never displayed.
    fn is_raw_text(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "style" | "script" | "title"
        )
    }

    /// Paragraph-like blocks whose inline content flows as one text run.
    pub fn is_text_block(&self) -> bool {
        matches!(self, Tag::P | Tag::H1 | Tag::H2 | Tag::H3 | Tag::Li)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}

/// Parse markup into a forest of nodes.
pub fn parse(source: &str) -> Vec<Node> {
    Parser { input: source, pos: 0 }.nodes()
}

/// The children of `<body>`, or the whole forest when there is no body.
pub fn body_children(nodes: &[Node]) -> Vec<Node> {
    fn find_body(nodes: &[Node]) -> Option<&Element> {
        nodes.iter().find_map(|node| match node {
            Node::Element(e) if e.tag == Tag::Body => Some(e),
            Node::Element(e) if e.tag == Tag::Html => find_body(&e.children),
            _ => None,
        })
    }
    match find_body(nodes) {
        Some(body) => body.children.clone(),
        None => nodes
            .iter()
            .filter(|n| !matches!(n, Node::Element(e) if e.tag == Tag::Head))
            .cloned()
            .collect(),
    }
}

/// Every distinct `<img src>` in document order.
pub fn image_sources(nodes: &[Node]) -> Vec<String> {
    fn walk(nodes: &[Node], out: &mut Vec<String>) {
        for node in nodes {
            if let Node::Element(e) = node {
                if e.tag == Tag::Img {
                    if let Some(src) = e.attr("src") {
                        if !out.iter().any(|s| s == src) {
                            out.push(src.to_string());
                        }
                    }
                }
                walk(&e.children, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Move past the next occurrence of `marker` (or to the end).
    fn skip_past(&mut self, marker: &str) {
        match self.rest().find(marker) {
            Some(i) => self.pos += i + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        loop {
            // Whitespace between tags carries no content.
            let saved = self.pos;
            self.skip_whitespace();
            if !self.eof() && !self.starts_with("<") {
                self.pos = saved;
            }
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn node(&mut self) -> Option<Node> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        if self.starts_with("<") {
            return self.element();
        }
        let end = self.rest().find('<').unwrap_or(self.rest().len());
        let text = &self.rest()[..end];
        self.pos += end;
        Some(Node::Text(decode_entities(text)))
    }

    fn element(&mut self) -> Option<Node> {
        self.pos += 1; // '<'
        let name = self.name();
        if name.is_empty() {
            // A stray '<' – keep it as text.
            return Some(Node::Text("<".to_string()));
        }
        let mut element = Element::new(Tag::from_name(&name));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let key = self.name();
            if key.is_empty() {
                // Unparseable attribute character; drop it.
                self.advance_char();
                continue;
            }
            self.skip_whitespace();
            let value = if self.starts_with("=") {
                self.pos += 1;
                self.skip_whitespace();
                self.attr_value()
            } else {
                String::new()
            };
            element.attributes.insert(key.to_ascii_lowercase(), value);
        }

        let self_closed = self.starts_with("/>");
        if self_closed {
            self.pos += 2;
        } else if !self.eof() {
            self.pos += 1; // '>'
        }
        if self_closed || Tag::is_void(&name) {
            return Some(Node::Element(element));
        }

        if Tag::is_raw_text(&name) {
            self.skip_past(&format!("</{name}"));
            self.skip_past(">");
            return Some(Node::Element(element));
        }

        element.children = self.nodes();
        if self.starts_with("</") {
            self.skip_past(">");
        }
        Some(Node::Element(element))
    }

    fn name(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == ':'))
            .unwrap_or(self.rest().len());
        let name = self.rest()[..len].to_string();
        self.pos += len;
        name
    }

    fn attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.rest().starts_with(quote) {
                self.pos += 1;
                let end = self.rest().find(quote).unwrap_or(self.rest().len());
                let raw = &self.rest()[..end];
                self.pos += end;
                if !self.eof() {
                    self.pos += 1;
                }
                return decode_entities(raw);
            }
        }
        let end = self
            .rest()
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(self.rest().len());
        let raw = &self.rest()[..end];
        self.pos += end;
        decode_entities(raw)
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            self.pos += c.len_utf8();
        }
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&copy;", "\u{00A9}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[Node]) -> &Element {
        match &nodes[0] {
            Node::Element(e) => e,
            Node::Text(t) => panic!("expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parses_nested_blocks_with_classes() {
        let nodes = parse(r#"<div class="flex p-4"><p>Olá</p></div>"#);
        let div = first_element(&nodes);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.classes().collect::<Vec<_>>(), vec!["flex", "p-4"]);
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn void_elements_take_no_children() {
        let nodes = parse(r#"<meta charset="utf-8"><img src="a.png"><p>x</p>"#);
        assert_eq!(nodes.len(), 3);
        let img = match &nodes[1] {
            Node::Element(e) => e,
            _ => panic!("expected img"),
        };
        assert_eq!(img.tag, Tag::Img);
        assert!(img.children.is_empty());
    }

    #[test]
    fn title_text_is_not_content() {
        let nodes = parse("<html><head><title>Receita</title></head><body><p>Corpo</p></body></html>");
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
        match &body[0] {
            Node::Element(e) => assert_eq!(e.tag, Tag::P),
            _ => panic!("expected <p>"),
        }
    }

    #[test]
    fn entities_decode_in_text_and_attributes() {
        let nodes = parse(r#"<img src="file:///a&amp;b.png"><p>Ana &amp; Cia &lt;3</p>"#);
        assert_eq!(image_sources(&nodes), vec!["file:///a&b.png".to_string()]);
        let p = match &nodes[1] {
            Node::Element(e) => e,
            _ => panic!("expected <p>"),
        };
        match &p.children[0] {
            Node::Text(t) => assert_eq!(t, "Ana & Cia <3"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn double_escaped_entities_decode_once() {
        let nodes = parse("<p>&amp;lt;</p>");
        match &first_element(&nodes).children[0] {
            Node::Text(t) => assert_eq!(t, "&lt;"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn image_sources_are_deduplicated() {
        let nodes = parse(r#"<div><img src="x"/><span><img src="y"/></span><img src="x"/></div>"#);
        assert_eq!(image_sources(&nodes), vec!["x".to_string(), "y".to_string()]);
    }
}
