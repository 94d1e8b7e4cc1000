//! Layout – builds a Taffy flex tree from the styled nodes and reads the
//! result back as positioned boxes in document coordinates.
//!
//! Block containers become flex columns. Paragraph-like elements whose content
//! is purely inline are merged into a single wrapped text leaf.

use std::collections::HashMap;

use taffy::prelude::*;
use taffy::TaffyError;

use crate::config::PageSetup;
use crate::fonts::FontBook;
use crate::markup::Tag;
use crate::style::{self, ComputedStyle, StyledNode};

/// Pixel dimensions of loaded images, keyed by `src`.
pub type ImageSizes = HashMap<String, (f32, f32)>;

/// A box in document coordinates, before it is assigned to a page.
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxContent {
    None,
    Text {
        lines: Vec<String>,
        marker: Option<String>,
    },
    Image {
        src: String,
    },
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontBook,
    images: &'a ImageSizes,
    styles: HashMap<NodeId, ComputedStyle>,
    content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontBook, images: &'a ImageSizes) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            images,
            styles: HashMap::new(),
            content: HashMap::new(),
        }
    }

    /// `avail` is the width the parent offers; `fill` is set when the parent
    /// stretches block children across it.
    fn build(&mut self, node: &StyledNode, avail: f32, fill: bool) -> Result<NodeId, TaffyError> {
        match node {
            StyledNode::Text { text, style } => self.text_leaf(&normalise(text), style, avail, false),
            StyledNode::Element {
                tag,
                style,
                children,
                src,
            } => {
                if tag.is_text_block() && !children.is_empty() && all_inline(children) {
                    let text = normalise(&children.iter().map(inline_text).collect::<String>());
                    if !text.is_empty() {
                        return self.text_leaf(&text, style, avail, fill);
                    }
                }
                match tag {
                    Tag::Img => self.image_leaf(style, src.as_deref().unwrap_or(""), avail),
                    Tag::Br => {
                        let height = style.font_size * style.line_height;
                        self.leaf(
                            Style {
                                size: Size {
                                    width: Dimension::Length(0.0),
                                    height: Dimension::Length(height),
                                },
                                ..Default::default()
                            },
                            style,
                            BoxContent::None,
                        )
                    }
                    _ => self.container(tag, style, children, avail),
                }
            }
        }
    }

    fn leaf(&mut self, ts: Style, style: &ComputedStyle, content: BoxContent) -> Result<NodeId, TaffyError> {
        let node = self.taffy.new_leaf(ts)?;
        self.styles.insert(node, style.clone());
        if content != BoxContent::None {
            self.content.insert(node, content);
        }
        Ok(node)
    }

    fn text_leaf(&mut self, text: &str, style: &ComputedStyle, avail: f32, fill: bool) -> Result<NodeId, TaffyError> {
        let chrome = style.padding.horizontal() + 2.0 * style.border_width;
        let outer = style
            .width
            .resolve(avail)
            .unwrap_or(avail - style.margin.horizontal());
        let wrap_width = (outer - chrome).max(1.0);

        let lines = self.fonts.wrap_text(text, style.font_size, style.bold, wrap_width);
        let full = fill || style.text_align != style::TextAlign::Left || style.width != style::Length::Auto;
        let content_width = if full {
            wrap_width
        } else {
            lines
                .iter()
                .map(|l| self.fonts.measure(l, style.font_size, style.bold))
                .fold(0.0f32, f32::max)
        };
        let content_height = lines.len() as f32 * style.font_size * style.line_height;
        let chrome_v = style.padding.top + style.padding.bottom + 2.0 * style.border_width;

        let ts = Style {
            size: Size {
                width: Dimension::Length(content_width + chrome),
                height: Dimension::Length(content_height + chrome_v),
            },
            flex_shrink: 0.0,
            margin: margin(style),
            padding: padding(style),
            border: border(style),
            ..Default::default()
        };
        self.leaf(ts, style, BoxContent::Text { lines, marker: None })
    }

    fn image_leaf(&mut self, style: &ComputedStyle, src: &str, avail: f32) -> Result<NodeId, TaffyError> {
        let known_w = style.width.resolve(avail);
        let known_h = style.height.resolve(avail);
        let (width, height) = match (known_w, known_h, self.images.get(src)) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some(&(iw, ih))) if iw > 0.0 => (w, w * ih / iw),
            (None, Some(h), Some(&(iw, ih))) if ih > 0.0 => (h * iw / ih, h),
            // Intrinsic pixels at 1 px = 1 pt, never wider than the container.
            (None, None, Some(&(iw, ih))) if iw > avail && iw > 0.0 => (avail, avail * ih / iw),
            (None, None, Some(&(iw, ih))) => (iw, ih),
            (w, h, _) => (w.unwrap_or(0.0), h.unwrap_or(0.0)),
        };
        if width == 0.0 || height == 0.0 {
            log::debug!("Image {} has no resolvable size", abbreviate(src));
        }
        let ts = Style {
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Length(height),
            },
            flex_shrink: 0.0,
            margin: margin(style),
            ..Default::default()
        };
        self.leaf(ts, style, BoxContent::Image { src: src.to_string() })
    }

    fn container(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        avail: f32,
    ) -> Result<NodeId, TaffyError> {
        let own = style
            .width
            .resolve(avail)
            .unwrap_or(avail - style.margin.horizontal());
        let inner = (own - style.padding.horizontal() - 2.0 * style.border_width).max(1.0);

        let row = matches!(style.display, style::Display::Flex | style::Display::Inline)
            && style.direction == style::Direction::Row;
        let stretches = match style.display {
            style::Display::Block => true,
            style::Display::Flex => {
                style.direction == style::Direction::Column && style.align_items == style::Align::Stretch
            }
            _ => false,
        };

        // In a row, children with a fixed width keep it and the rest share
        // what remains.
        let flexible_share = if row {
            let fixed: f32 = children
                .iter()
                .filter_map(|c| c.style().width.resolve(inner).map(|w| w + c.style().margin.horizontal()))
                .sum();
            let flexible = children
                .iter()
                .filter(|c| c.style().width == style::Length::Auto)
                .count()
                .max(1);
            let gaps = style.gap * children.len().saturating_sub(1) as f32;
            ((inner - fixed - gaps) / flexible as f32).max(1.0)
        } else {
            inner
        };

        let mut ids = Vec::with_capacity(children.len());
        let mut counter = 0u32;
        for child in children {
            let child_avail = if row {
                child.style().width.resolve(inner).unwrap_or(flexible_share)
            } else {
                inner
            };
            let id = self.build(child, child_avail, stretches)?;
            if matches!(child, StyledNode::Element { tag: Tag::Li, .. }) {
                counter += 1;
                let marker = if *tag == Tag::Ol {
                    format!("{counter}.")
                } else {
                    "\u{2022}".to_string()
                };
                if let Some(BoxContent::Text { marker: slot, .. }) = self.content.get_mut(&id) {
                    *slot = Some(marker);
                }
            }
            ids.push(id);
        }

        let node = self.taffy.new_with_children(to_taffy(style), &ids)?;
        self.styles.insert(node, style.clone());
        Ok(node)
    }

    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, TaffyError> {
        let layout = self.taffy.layout(node)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let children = self
            .taffy
            .children(node)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style: self.styles.get(&node).cloned().unwrap_or_default(),
            content: self.content.get(&node).cloned().unwrap_or(BoxContent::None),
            children,
        })
    }
}

fn to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style::default();
    match s.display {
        style::Display::Flex => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = match s.direction {
                style::Direction::Row => taffy::FlexDirection::Row,
                style::Direction::Column => taffy::FlexDirection::Column,
            };
            ts.justify_content = Some(match s.justify {
                style::Justify::Start => taffy::JustifyContent::Start,
                style::Justify::End => taffy::JustifyContent::End,
                style::Justify::Center => taffy::JustifyContent::Center,
                style::Justify::SpaceBetween => taffy::JustifyContent::SpaceBetween,
            });
            ts.align_items = Some(match s.align_items {
                style::Align::Start => taffy::AlignItems::Start,
                style::Align::End => taffy::AlignItems::End,
                style::Align::Center => taffy::AlignItems::Center,
                style::Align::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::Block => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
        }
        style::Display::Inline => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.flex_wrap = taffy::FlexWrap::Wrap;
            ts.align_items = Some(taffy::AlignItems::Start);
        }
        style::Display::None => ts.display = taffy::Display::None,
    }

    ts.size = Size {
        width: dimension(s.width),
        height: dimension(s.height),
    };
    ts.flex_grow = s.flex_grow;
    if s.flex_grow > 0.0 {
        ts.min_size.width = Dimension::Length(0.0);
    }
    if s.width != style::Length::Auto || s.height != style::Length::Auto {
        ts.flex_shrink = 0.0;
    }
    ts.margin = margin(s);
    ts.padding = padding(s);
    ts.border = border(s);
    ts.gap = Size {
        width: LengthPercentage::Length(s.gap),
        height: LengthPercentage::Length(s.gap),
    };
    ts
}

fn dimension(l: style::Length) -> Dimension {
    match l {
        style::Length::Auto => Dimension::Auto,
        style::Length::Pt(v) => Dimension::Length(v),
        style::Length::Percent(p) => Dimension::Percent(p / 100.0),
    }
}

fn margin(s: &ComputedStyle) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(s.margin.top),
        right: LengthPercentageAuto::Length(s.margin.right),
        bottom: LengthPercentageAuto::Length(s.margin.bottom),
        left: LengthPercentageAuto::Length(s.margin.left),
    }
}

fn padding(s: &ComputedStyle) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(s.padding.top),
        right: LengthPercentage::Length(s.padding.right),
        bottom: LengthPercentage::Length(s.padding.bottom),
        left: LengthPercentage::Length(s.padding.left),
    }
}

fn border(s: &ComputedStyle) -> Rect<LengthPercentage> {
    let w = LengthPercentage::Length(s.border_width);
    Rect {
        top: w,
        right: w,
        bottom: w,
        left: w,
    }
}

/// Text plus inline elements only, all the way down.
fn all_inline(children: &[StyledNode]) -> bool {
    children.iter().all(|c| match c {
        StyledNode::Text { .. } => true,
        StyledNode::Element { style, children, .. } => {
            style.display == style::Display::Inline && all_inline(children)
        }
    })
}

fn inline_text(node: &StyledNode) -> String {
    match node {
        StyledNode::Text { text, .. } => text.clone(),
        StyledNode::Element { tag: Tag::Br, .. } => "\n".to_string(),
        StyledNode::Element { children, .. } => children.iter().map(inline_text).collect(),
    }
}

/// Collapse whitespace runs inside each line; explicit newlines survive.
fn normalise(text: &str) -> String {
    text.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

fn abbreviate(src: &str) -> &str {
    match src.char_indices().nth(48) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}

/// Lay out a styled tree across the page's content width.
pub fn compute_layout(
    nodes: &[StyledNode],
    page: &PageSetup,
    fonts: &FontBook,
    images: &ImageSizes,
) -> Result<Vec<PositionedBox>, TaffyError> {
    let content_width = page.content_width();
    let mut builder = LayoutBuilder::new(fonts, images);

    let ids = nodes
        .iter()
        .map(|n| builder.build(n, content_width, true))
        .collect::<Result<Vec<_>, _>>()?;

    let root = builder.taffy.new_with_children(
        Style {
            display: taffy::Display::Flex,
            flex_direction: taffy::FlexDirection::Column,
            size: Size {
                width: Dimension::Length(content_width),
                height: Dimension::Auto,
            },
            ..Default::default()
        },
        &ids,
    )?;
    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    Ok(builder.extract(root, page.margin_pt, 0.0)?.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse;
    use crate::style::build_styled_tree;

    fn lay_out(markup: &str, images: &ImageSizes) -> Vec<PositionedBox> {
        let styled = build_styled_tree(&parse(markup), None);
        compute_layout(&styled, &PageSetup::a4(), &FontBook::builtin(), images).unwrap()
    }

    #[test]
    fn paragraph_fills_content_width() {
        let boxes = lay_out("<p>Tomar um comprimido ao dia</p>", &ImageSizes::new());
        let p = &boxes[0];
        let page = PageSetup::a4();
        assert!((p.width - page.content_width()).abs() < 0.5);
        assert!((p.x - page.margin_pt).abs() < 0.01);
        assert!(matches!(&p.content, BoxContent::Text { lines, .. } if lines.len() == 1));
    }

    #[test]
    fn spans_merge_into_one_text_run() {
        let boxes = lay_out("<p>Nome: <strong>Ana</strong><br>CPF</p>", &ImageSizes::new());
        match &boxes[0].content {
            BoxContent::Text { lines, .. } => {
                assert_eq!(lines, &vec!["Nome: Ana".to_string(), "CPF".to_string()])
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn flex_row_places_children_side_by_side() {
        let boxes = lay_out(
            r#"<div class="flex"><span class="w-24">Nome:</span><span>Ana</span></div>"#,
            &ImageSizes::new(),
        );
        let row = &boxes[0];
        assert_eq!(row.children.len(), 2);
        let (label, value) = (&row.children[0], &row.children[1]);
        assert!((label.width - 96.0).abs() < 0.01);
        assert!(value.x >= label.x + 96.0 - 0.01);
        assert!((value.y - label.y).abs() < 0.01);
    }

    #[test]
    fn image_without_size_uses_intrinsic_aspect() {
        let mut images = ImageSizes::new();
        images.insert("logo".into(), (200.0, 100.0));
        let boxes = lay_out(r#"<img src="logo" style="width: 50px">"#, &images);
        assert!((boxes[0].width - 50.0).abs() < 0.01);
        assert!((boxes[0].height - 25.0).abs() < 0.01);
    }

    #[test]
    fn list_items_carry_markers() {
        let boxes = lay_out("<ol><li>Um</li><li>Dois</li></ol>", &ImageSizes::new());
        let markers: Vec<_> = boxes[0]
            .children
            .iter()
            .filter_map(|c| match &c.content {
                BoxContent::Text { marker, .. } => marker.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(markers, vec!["1.".to_string(), "2.".to_string()]);
    }

    #[test]
    fn centered_column_shrinks_paragraphs() {
        let boxes = lay_out(
            r#"<div class="flex flex-col items-center"><p>Assinatura</p></div>"#,
            &ImageSizes::new(),
        );
        let p = &boxes[0].children[0];
        assert!(p.width < 100.0, "paragraph width {}", p.width);
        assert!(p.x > PageSetup::a4().margin_pt + 100.0);
    }
}
