//! PDF writer – turns a [`PagePlan`] into PDF bytes with `printpdf`'s op API.
//! Text uses the builtin Helvetica faces in WinAnsi encoding.

use std::collections::HashMap;

use printpdf::*;

use crate::page_plan::{PagePlan, PlacedBox, TextRun};
use crate::resources::ResourceSet;

const PT_TO_MM: f32 = 0.352778;

/// Gutter between a list marker and its text.
const MARKER_GUTTER: f32 = 12.0;

struct EmbeddedImage {
    id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render `plan` into a complete PDF file.
pub fn write_pdf(plan: &PagePlan, resources: &ResourceSet) -> Result<Vec<u8>, String> {
    let page_w = Mm(plan.page_width_pt * PT_TO_MM);
    let page_h = Mm(plan.page_height_pt * PT_TO_MM);
    let mut doc = PdfDocument::new(&plan.title);

    let mut embedded: HashMap<&str, EmbeddedImage> = HashMap::new();
    let mut warnings = Vec::new();
    for src in plan.image_sources() {
        if embedded.contains_key(src) {
            continue;
        }
        let Some(loaded) = resources.get(src) else {
            log::warn!("Image was not loaded, leaving its box empty");
            continue;
        };
        match RawImage::decode_from_bytes(&loaded.bytes, &mut warnings) {
            Ok(raw) => {
                embedded.insert(
                    src,
                    EmbeddedImage {
                        id: doc.add_image(&raw),
                        px_width: loaded.px_width,
                        px_height: loaded.px_height,
                    },
                );
            }
            Err(e) => log::warn!("Cannot embed image: {e}"),
        }
    }

    let writer = OpWriter {
        page_height: plan.page_height_pt,
        print_background: plan.print_background,
        images: &embedded,
    };
    let mut pages: Vec<PdfPage> = plan
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for b in &page.boxes {
                writer.draw(&mut ops, b);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    log::debug!("Writing {} page(s), {} image(s)", pages.len(), embedded.len());

    doc.with_pages(pages);
    Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
}

struct OpWriter<'a> {
    page_height: f32,
    print_background: bool,
    images: &'a HashMap<&'a str, EmbeddedImage>,
}

impl OpWriter<'_> {
    fn draw(&self, ops: &mut Vec<Op>, b: &PlacedBox) {
        // PDF space has its origin at the bottom-left.
        let top = self.page_height - b.y;
        let bottom = top - b.height;

        if let (true, Some(bg)) = (self.print_background, b.background) {
            ops.push(Op::SetFillColor { col: rgb(bg) });
            ops.push(Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing {
                        points: rect(b.x, bottom, b.x + b.width, top),
                    }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            });
        }

        if let Some(border) = &b.border {
            // Stroke centred on the inside of the border box.
            let inset = border.width / 2.0;
            ops.push(Op::SetOutlineColor { col: rgb(border.color) });
            ops.push(Op::SetOutlineThickness { pt: Pt(border.width) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: rect(b.x + inset, bottom + inset, b.x + b.width - inset, top - inset),
                    is_closed: true,
                },
            });
        }

        if let Some(text) = &b.text {
            self.draw_text(ops, b, text, top);
        }

        if let Some(slot) = &b.image {
            if let Some(img) = self.images.get(slot.src.as_str()) {
                // At 72 dpi one pixel is one point.
                let scale = |target: f32, px: u32| if px > 0 { target / px as f32 } else { 1.0 };
                ops.push(Op::UseXobject {
                    id: img.id.clone(),
                    transform: XObjectTransform {
                        translate_x: Some(Pt(b.x)),
                        translate_y: Some(Pt(top - slot.height)),
                        dpi: Some(72.0),
                        scale_x: Some(scale(slot.width, img.px_width)),
                        scale_y: Some(scale(slot.height, img.px_height)),
                        rotate: None,
                    },
                });
            }
        }

        for child in &b.children {
            self.draw(ops, child);
        }
    }

    fn draw_text(&self, ops: &mut Vec<Op>, b: &PlacedBox, text: &TextRun, top: f32) {
        let font = match (text.bold, text.italic) {
            (true, true) => BuiltinFont::HelveticaBoldOblique,
            (true, false) => BuiltinFont::HelveticaBold,
            (false, true) => BuiltinFont::HelveticaOblique,
            (false, false) => BuiltinFont::Helvetica,
        };

        let write = |ops: &mut Vec<Op>, x: f32, baseline: f32, s: &str, font: BuiltinFont| {
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(x),
                    y: Pt(baseline),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(text.font_size),
                font,
            });
            ops.push(Op::SetLineHeight {
                lh: Pt(text.line_height),
            });
            ops.push(Op::SetFillColor { col: rgb(text.color) });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_winansi(s))],
                font,
            });
            ops.push(Op::EndTextSection);
        };

        for line in text.lines.iter().filter(|l| !l.text.is_empty()) {
            let x = b.x + line.x_offset;
            let baseline = top - line.y_offset - text.ascent;
            write(ops, x, baseline, &line.text, font);

            if text.underline {
                let y = baseline - text.font_size * 0.1;
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::SetOutlineColor { col: rgb(text.color) });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: vec![point(x, y), point(x + line.width, y)],
                        is_closed: false,
                    },
                });
            }
        }

        if let (Some(marker), Some(first)) = (&text.marker, text.lines.first()) {
            let baseline = top - first.y_offset - text.ascent;
            write(ops, b.x - MARKER_GUTTER, baseline, marker, BuiltinFont::Helvetica);
        }
    }
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of an axis-aligned rectangle, counter-clockwise from bottom-left.
fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<LinePoint> {
    vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)]
}

/// WinAnsi code for a character; `?` when it has none.
fn winansi_byte(c: char) -> u8 {
    match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{2122}' => 0x99,
        '\u{00A0}' => b' ',
        c if (c as u32) < 0x100 => c as u32 as u8,
        _ => b'?',
    }
}

/// Re-encode text for the builtin fonts. printpdf copies the string's bytes
/// into the content stream as-is, and the builtin faces read them as WinAnsi.
fn to_winansi(s: &str) -> String {
    let bytes: Vec<u8> = s.chars().map(winansi_byte).collect();
    // SAFETY: the string is never inspected as UTF-8; printpdf only copies
    // its bytes into the PDF stream.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}
