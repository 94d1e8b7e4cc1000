//! Pagination – assigns top-level boxes to pages.
//!
//! Honours `break-before` / `break-after`, moves a box that would cross the
//! bottom margin to the next page, and opens up wrapper containers taller than
//! a whole page so their children can be placed individually.

use crate::config::PageSetup;
use crate::fonts::FontBook;
use crate::layout::{BoxContent, PositionedBox};
use crate::page_plan::{Border, ImageSlot, PagePlan, PlacedBox, PlacedLine, PlannedPage, TextRun};
use crate::style::TextAlign;

/// Wrappers taller than a page are replaced by their children and text
/// taller than a page is cut into runs of lines. Break hints on the original
/// box move to the first and last piece.
fn flatten(boxes: &[PositionedBox], content_height: f32) -> Vec<PositionedBox> {
    let mut out = Vec::new();
    for b in boxes {
        if b.height <= content_height {
            out.push(b.clone());
            continue;
        }
        let mut inner = match &b.content {
            BoxContent::None if !b.children.is_empty() => flatten(&b.children, content_height),
            BoxContent::Text { lines, marker } if lines.len() > 1 => {
                split_text(b, lines, marker.as_ref(), content_height)
            }
            _ => {
                out.push(b.clone());
                continue;
            }
        };
        if let Some(first) = inner.first_mut() {
            first.style.break_before |= b.style.break_before;
        }
        if let Some(last) = inner.last_mut() {
            last.style.break_after |= b.style.break_after;
        }
        out.extend(inner);
    }
    out
}

/// Stacked pieces of a text box, each holding as many whole lines as fit in
/// `content_height`. Top padding stays on the first piece, bottom padding on
/// the last; the list marker goes with the first line.
fn split_text(
    b: &PositionedBox,
    lines: &[String],
    marker: Option<&String>,
    content_height: f32,
) -> Vec<PositionedBox> {
    let s = &b.style;
    let line_height = s.font_size * s.line_height;
    let chrome = s.padding.top + s.padding.bottom + 2.0 * s.border_width;
    let per_piece = (((content_height - chrome) / line_height).floor() as usize).max(1);

    let count = lines.len().div_ceil(per_piece);
    let mut pieces = Vec::with_capacity(count);
    let mut y = b.y;
    for (i, chunk) in lines.chunks(per_piece).enumerate() {
        let mut style = s.clone();
        style.break_before = false;
        style.break_after = false;
        if i > 0 {
            style.padding.top = 0.0;
        }
        if i + 1 < count {
            style.padding.bottom = 0.0;
        }
        let height = style.padding.top
            + style.padding.bottom
            + 2.0 * s.border_width
            + chunk.len() as f32 * line_height;
        pieces.push(PositionedBox {
            x: b.x,
            y,
            width: b.width,
            height,
            style,
            content: BoxContent::Text {
                lines: chunk.to_vec(),
                marker: if i == 0 { marker.cloned() } else { None },
            },
            children: Vec::new(),
        });
        y += height;
    }
    log::debug!("Split a {:.1} pt text box into {} piece(s)", b.height, pieces.len());
    pieces
}

struct Pager {
    pages: Vec<PlannedPage>,
    current: Vec<PlacedBox>,
    /// Document y at which the current page starts.
    origin: f32,
}

impl Pager {
    fn break_page(&mut self, next_origin: f32) {
        let boxes = std::mem::take(&mut self.current);
        self.pages.push(PlannedPage {
            index: self.pages.len(),
            boxes,
        });
        self.origin = next_origin;
    }
}

/// Split laid-out boxes into pages of `page`'s content height.
pub fn paginate(boxes: &[PositionedBox], page: &PageSetup, title: &str, fonts: &FontBook) -> PagePlan {
    let content_height = page.content_height();
    let flat = flatten(boxes, content_height);

    let mut pager = Pager {
        pages: Vec::new(),
        current: Vec::new(),
        origin: flat.first().map_or(0.0, |b| b.y),
    };

    for b in &flat {
        if b.style.break_before && !pager.current.is_empty() {
            pager.break_page(b.y);
        }
        if b.y - pager.origin + b.height > content_height && !pager.current.is_empty() {
            log::debug!("Box at y={:.1} overflows the page, moving it down", b.y);
            pager.break_page(b.y);
        }
        // Margins collapse at the top of a fresh page.
        if pager.current.is_empty() {
            pager.origin = pager.origin.max(b.y);
        }

        let top = page.margin_pt + (b.y - pager.origin);
        pager.current.push(place(b, b.x, top, fonts));

        if b.style.break_after {
            pager.break_page(b.y + b.height);
        }
    }

    if !pager.current.is_empty() || pager.pages.is_empty() {
        let origin = pager.origin;
        pager.break_page(origin);
    }

    PagePlan {
        title: title.to_string(),
        page_width_pt: page.width_pt,
        page_height_pt: page.height_pt,
        margin_pt: page.margin_pt,
        print_background: page.print_background,
        pages: pager.pages,
    }
}

/// Convert a box and its subtree to page coordinates; `top` is where `b`
/// lands on the page.
fn place(b: &PositionedBox, x: f32, top: f32, fonts: &FontBook) -> PlacedBox {
    let s = &b.style;
    let mut placed = PlacedBox::new(x, top, b.width, b.height);

    if !s.background.is_transparent() {
        placed.background = Some(s.background.to_array());
    }
    if s.border_width > 0.0 {
        placed.border = Some(Border {
            width: s.border_width,
            color: s.border_color.to_array(),
        });
    }

    match &b.content {
        BoxContent::Text { lines, marker } => {
            let inset_x = s.padding.left + s.border_width;
            let inset_y = s.padding.top + s.border_width;
            let content_width = b.width - s.padding.horizontal() - 2.0 * s.border_width;
            let line_height = s.font_size * s.line_height;

            let lines = lines
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let width = fonts.measure(text, s.font_size, s.bold);
                    let align = match s.text_align {
                        TextAlign::Left => 0.0,
                        TextAlign::Center => ((content_width - width) / 2.0).max(0.0),
                        TextAlign::Right => (content_width - width).max(0.0),
                    };
                    PlacedLine {
                        text: text.clone(),
                        x_offset: inset_x + align,
                        y_offset: inset_y + i as f32 * line_height,
                        width,
                    }
                })
                .collect();

            placed.text = Some(TextRun {
                lines,
                font_size: s.font_size,
                bold: s.bold,
                italic: s.italic,
                underline: s.underline,
                color: s.color.to_array(),
                line_height,
                // Half-leading above the glyphs.
                ascent: fonts.ascender(s.font_size, s.bold) + (line_height - s.font_size) / 2.0,
                marker: marker.clone(),
            });
        }
        BoxContent::Image { src } => {
            placed.image = Some(ImageSlot {
                src: src.clone(),
                width: b.width,
                height: b.height,
            });
        }
        BoxContent::None => {}
    }

    placed.children = b
        .children
        .iter()
        .map(|c| place(c, c.x, top + (c.y - b.y), fonts))
        .collect();
    placed
}
