//! Style resolution – folds tag defaults, utility classes and inline
//! `style` declarations into one [`ComputedStyle`] per element.
//!
//! Lengths are kept in PDF points. `px` is read as one point (72 dpi), and
//! `pt`, `mm` and `cm` are converted exactly. Utility spacing steps are 4 pt.

use crate::markup::{Element, Node, Tag};

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub direction: Direction,
    pub flex_grow: f32,
    pub justify: Justify,
    pub align_items: Align,
    pub gap: f32,

    pub width: Length,
    pub height: Length,

    pub margin: Edges,
    pub padding: Edges,
    pub border_width: f32,
    pub border_color: Color,
    pub background: Color,

    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Color,
    pub text_align: TextAlign,
    /// Multiple of the font size.
    pub line_height: f32,

    pub break_before: bool,
    pub break_after: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            direction: Direction::Row,
            flex_grow: 0.0,
            justify: Justify::Start,
            align_items: Align::Stretch,
            gap: 0.0,
            width: Length::Auto,
            height: Length::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            border_color: Color::BLACK,
            background: Color::TRANSPARENT,
            font_size: 11.0,
            bold: false,
            italic: false,
            underline: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.35,
            break_before: false,
            break_after: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    /// Children stack vertically.
    Block,
    /// Children follow `direction`.
    Flex,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Start,
    End,
    Center,
    SpaceBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Auto,
    Pt(f32),
    Percent(f32),
}

impl Length {
    /// Resolve against the containing width; `None` for `Auto`.
    pub fn resolve(self, container: f32) -> Option<f32> {
        match self {
            Length::Auto => None,
            Length::Pt(v) => Some(v),
            Length::Percent(p) => Some(container * p / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

/// RGBA, each channel 0.0 – 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').filter(|h| h.is_ascii())?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Hex notation, a utility palette name, or a basic CSS keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "transparent" => Some(Self::TRANSPARENT),
            _ if value.starts_with('#') => Self::from_hex(value),
            _ => palette(value),
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// The utility palette the template draws from.
fn palette(name: &str) -> Option<Color> {
    let hex = match name {
        "gray-100" => "#f3f4f6",
        "gray-200" => "#e5e7eb",
        "gray-300" => "#d1d5db",
        "gray-500" => "#6b7280",
        "gray-700" => "#374151",
        "gray-900" => "#111827",
        "blue-100" => "#dbeafe",
        "blue-500" => "#3b82f6",
        "blue-700" => "#1d4ed8",
        "blue-900" => "#1e3a8a",
        "green-100" => "#dcfce7",
        "green-700" => "#15803d",
        "red-100" => "#fee2e2",
        "red-700" => "#b91c1c",
        "yellow-100" => "#fef9c3",
        "yellow-500" => "#eab308",
        "white" => "#ffffff",
        "black" => "#000000",
        _ => return None,
    };
    Color::from_hex(hex)
}

/// Tag defaults, before classes and inline declarations.
fn tag_defaults(tag: &Tag) -> ComputedStyle {
    let mut s = ComputedStyle::default();
    match tag {
        Tag::H1 => {
            s.font_size = 20.0;
            s.bold = true;
            s.margin.bottom = 8.0;
        }
        Tag::H2 => {
            s.font_size = 15.0;
            s.bold = true;
            s.margin.top = 4.0;
            s.margin.bottom = 6.0;
        }
        Tag::H3 => {
            s.font_size = 12.0;
            s.bold = true;
            s.margin.top = 4.0;
            s.margin.bottom = 4.0;
        }
        Tag::P => s.margin.bottom = 8.0,
        Tag::Ul | Tag::Ol => {
            s.padding.left = 18.0;
            s.margin.bottom = 8.0;
        }
        Tag::Li => s.margin.bottom = 2.0,
        Tag::Span | Tag::Br => s.display = Display::Inline,
        Tag::Strong => {
            s.display = Display::Inline;
            s.bold = true;
        }
        Tag::Em => {
            s.display = Display::Inline;
            s.italic = true;
        }
        Tag::Img | Tag::Div | Tag::Html | Tag::Body => {}
        Tag::Head | Tag::Other(_) => s.display = Display::None,
    }
    s
}

/// Resolve an element's style; text properties inherit from `parent`.
pub fn resolve(element: &Element, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut s = tag_defaults(&element.tag);

    if let Some(p) = parent {
        s.font_size = p.font_size;
        s.color = p.color;
        s.text_align = p.text_align;
        s.line_height = p.line_height;
        s.bold |= p.bold;
        s.italic |= p.italic;
        s.underline = p.underline;
        // Headings keep their own size.
        let defaults = tag_defaults(&element.tag);
        if matches!(element.tag, Tag::H1 | Tag::H2 | Tag::H3) {
            s.font_size = defaults.font_size;
        }
    }

    for class in element.classes() {
        apply_class(&mut s, class);
    }
    if let Some(inline) = element.attr("style") {
        for declaration in inline.split(';') {
            if let Some((prop, value)) = declaration.split_once(':') {
                apply_declaration(&mut s, prop.trim(), value.trim());
            }
        }
    }
    s
}

fn apply_class(s: &mut ComputedStyle, class: &str) {
    match class {
        "block" => s.display = Display::Block,
        "flex" => s.display = Display::Flex,
        "hidden" => s.display = Display::None,
        "flex-row" => s.direction = Direction::Row,
        "flex-col" => {
            s.display = Display::Flex;
            s.direction = Direction::Column;
        }
        "flex-1" | "grow" => s.flex_grow = 1.0,

        "justify-start" => s.justify = Justify::Start,
        "justify-end" => s.justify = Justify::End,
        "justify-center" => s.justify = Justify::Center,
        "justify-between" => s.justify = Justify::SpaceBetween,
        "items-start" => s.align_items = Align::Start,
        "items-end" => s.align_items = Align::End,
        "items-center" => s.align_items = Align::Center,
        "items-stretch" => s.align_items = Align::Stretch,

        "font-bold" => s.bold = true,
        "font-normal" => s.bold = false,
        "italic" => s.italic = true,
        "not-italic" => s.italic = false,
        "underline" => s.underline = true,
        "no-underline" => s.underline = false,

        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,

        "text-xs" => s.font_size = 8.0,
        "text-sm" => s.font_size = 10.0,
        "text-base" => s.font_size = 11.0,
        "text-lg" => s.font_size = 13.0,
        "text-xl" => s.font_size = 15.0,
        "text-2xl" => s.font_size = 18.0,
        "text-3xl" => s.font_size = 22.0,

        "w-full" => s.width = Length::Percent(100.0),
        "w-auto" => s.width = Length::Auto,
        "w-1/2" => s.width = Length::Percent(50.0),
        "w-1/3" => s.width = Length::Percent(100.0 / 3.0),

        "border" => s.border_width = 1.0,
        "break-before" => s.break_before = true,
        "break-after" | "page-break" => s.break_after = true,

        _ => apply_scaled_class(s, class),
    }
}

/// `p-3`, `mt-2`, `gap-4`, `w-24`, `bg-gray-100`, `text-blue-900`, ...
fn apply_scaled_class(s: &mut ComputedStyle, class: &str) {
    if let Some(name) = class.strip_prefix("bg-") {
        if let Some(c) = palette(name) {
            s.background = c;
        }
        return;
    }
    if let Some(name) = class.strip_prefix("text-") {
        if let Some(c) = palette(name) {
            s.color = c;
        }
        return;
    }
    if let Some(name) = class.strip_prefix("border-") {
        if let Some(c) = palette(name) {
            s.border_color = c;
        } else if let Ok(w) = name.parse::<f32>() {
            s.border_width = w;
        }
        return;
    }

    let Some((prefix, step)) = class.rsplit_once('-') else {
        return;
    };
    let Ok(step) = step.parse::<f32>() else {
        return;
    };
    let v = step * 4.0;
    match prefix {
        "p" => s.padding = Edges::uniform(v),
        "px" => {
            s.padding.left = v;
            s.padding.right = v;
        }
        "py" => {
            s.padding.top = v;
            s.padding.bottom = v;
        }
        "pt" => s.padding.top = v,
        "pr" => s.padding.right = v,
        "pb" => s.padding.bottom = v,
        "pl" => s.padding.left = v,
        "m" => s.margin = Edges::uniform(v),
        "mx" => {
            s.margin.left = v;
            s.margin.right = v;
        }
        "my" => {
            s.margin.top = v;
            s.margin.bottom = v;
        }
        "mt" => s.margin.top = v,
        "mr" => s.margin.right = v,
        "mb" => s.margin.bottom = v,
        "ml" => s.margin.left = v,
        "gap" => s.gap = v,
        "w" => s.width = Length::Pt(v),
        "h" => s.height = Length::Pt(v),
        _ => {}
    }
}

fn apply_declaration(s: &mut ComputedStyle, prop: &str, value: &str) {
    match prop {
        "display" => match value {
            "block" => s.display = Display::Block,
            "flex" => s.display = Display::Flex,
            "inline" | "inline-block" => s.display = Display::Inline,
            "none" => s.display = Display::None,
            _ => {}
        },
        "flex-direction" => match value {
            "row" => s.direction = Direction::Row,
            "column" => s.direction = Direction::Column,
            _ => {}
        },
        "font-size" => set_length(&mut s.font_size, value),
        "font-weight" => s.bold = matches!(value, "bold" | "bolder" | "600" | "700" | "800" | "900"),
        "font-style" => s.italic = value == "italic",
        "text-decoration" => s.underline = value.contains("underline"),
        "color" => set_color(&mut s.color, value),
        "background" | "background-color" => set_color(&mut s.background, value),
        "text-align" => {
            s.text_align = match value {
                "center" => TextAlign::Center,
                "right" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(factor) = value.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(abs) = parse_length(value) {
                s.line_height = abs / s.font_size;
            }
        }
        "width" => s.width = parse_dimension(value),
        "height" => s.height = parse_dimension(value),
        "margin" => set_edges(&mut s.margin, value),
        "margin-top" => set_length(&mut s.margin.top, value),
        "margin-right" => set_length(&mut s.margin.right, value),
        "margin-bottom" => set_length(&mut s.margin.bottom, value),
        "margin-left" => set_length(&mut s.margin.left, value),
        "padding" => set_edges(&mut s.padding, value),
        "padding-top" => set_length(&mut s.padding.top, value),
        "padding-right" => set_length(&mut s.padding.right, value),
        "padding-bottom" => set_length(&mut s.padding.bottom, value),
        "padding-left" => set_length(&mut s.padding.left, value),
        "border" => {
            for part in value.split_whitespace() {
                if let Some(w) = parse_length(part) {
                    s.border_width = w;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                }
            }
        }
        "border-width" => set_length(&mut s.border_width, value),
        "border-color" => set_color(&mut s.border_color, value),
        "gap" => set_length(&mut s.gap, value),
        "break-before" | "page-break-before" => s.break_before = matches!(value, "page" | "always"),
        "break-after" | "page-break-after" => s.break_after = matches!(value, "page" | "always"),
        _ => {}
    }
}

fn set_length(target: &mut f32, value: &str) {
    if let Some(v) = parse_length(value) {
        *target = v;
    }
}

fn set_color(target: &mut Color, value: &str) {
    if let Some(c) = Color::parse(value) {
        *target = c;
    }
}

fn set_edges(edges: &mut Edges, value: &str) {
    let parts: Vec<f32> = value.split_whitespace().filter_map(parse_length).collect();
    *edges = match parts.as_slice() {
        [all] => Edges::uniform(*all),
        [vertical, horizontal] => Edges {
            top: *vertical,
            right: *horizontal,
            bottom: *vertical,
            left: *horizontal,
        },
        [top, horizontal, bottom] => Edges {
            top: *top,
            right: *horizontal,
            bottom: *bottom,
            left: *horizontal,
        },
        [top, right, bottom, left] => Edges {
            top: *top,
            right: *right,
            bottom: *bottom,
            left: *left,
        },
        _ => return,
    };
}

/// A CSS length in points.
pub fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let (number, scale) = if let Some(n) = value.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("mm") {
        (n, 72.0 / 25.4)
    } else if let Some(n) = value.strip_suffix("cm") {
        (n, 72.0 / 2.54)
    } else {
        (value, 1.0)
    };
    number.trim().parse::<f32>().ok().map(|v| v * scale)
}

fn parse_dimension(value: &str) -> Length {
    if value == "auto" {
        return Length::Auto;
    }
    if let Some(p) = value.strip_suffix('%') {
        return p.trim().parse().map(Length::Percent).unwrap_or(Length::Auto);
    }
    parse_length(value).map(Length::Pt).unwrap_or(Length::Auto)
}

/// A markup node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// `src` for images.
        src: Option<String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Resolve styles top-down. Hidden elements and blank text are dropped.
pub fn build_styled_tree(nodes: &[Node], parent: Option<&ComputedStyle>) -> Vec<StyledNode> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Element(e) => {
                let style = resolve(e, parent);
                if style.display == Display::None {
                    continue;
                }
                let children = build_styled_tree(&e.children, Some(&style));
                out.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    src: e.attr("src").map(str::to_string),
                    style,
                    children,
                });
            }
            Node::Text(text) if !text.trim().is_empty() => {
                // Text inherits typography only; box properties stay on the parent.
                let inherited = parent.cloned().unwrap_or_default();
                let style = ComputedStyle {
                    font_size: inherited.font_size,
                    bold: inherited.bold,
                    italic: inherited.italic,
                    underline: inherited.underline,
                    color: inherited.color,
                    text_align: inherited.text_align,
                    line_height: inherited.line_height,
                    display: Display::Inline,
                    ..ComputedStyle::default()
                };
                out.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
            Node::Text(_) => {}
        }
    }
    out
}
