//! Page plan – the frozen, serialisable result of layout and pagination.
//! Every coordinate is in points relative to the top-left of its page, so
//! the PDF writer only has to flip the y axis.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePlan {
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub margin_pt: f32,
    /// When false, backgrounds are left out of the output.
    pub print_background: bool,
    pub pages: Vec<PlannedPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPage {
    pub index: usize,
    pub boxes: Vec<PlacedBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub background: Option<[f32; 4]>,
    pub border: Option<Border>,
    pub text: Option<TextRun>,
    pub image: Option<ImageSlot>,
    pub children: Vec<PlacedBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub width: f32,
    pub color: [f32; 4],
}

/// Pre-wrapped text. Line offsets already include padding and border.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub lines: Vec<PlacedLine>,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    /// Top of line box to baseline.
    pub ascent: f32,
    /// Bullet or number drawn in the left gutter.
    pub marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedLine {
    pub text: String,
    /// Offset from the box's left edge.
    pub x_offset: f32,
    /// Offset from the box's top edge to the top of the line.
    pub y_offset: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSlot {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl PagePlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every image source placed anywhere in the plan, in page order.
    pub fn image_sources(&self) -> Vec<&str> {
        fn walk<'a>(b: &'a PlacedBox, out: &mut Vec<&'a str>) {
            if let Some(img) = &b.image {
                out.push(&img.src);
            }
            b.children.iter().for_each(|c| walk(c, out));
        }
        let mut out = Vec::new();
        for page in &self.pages {
            page.boxes.iter().for_each(|b| walk(b, &mut out));
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl PlacedBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }
}
