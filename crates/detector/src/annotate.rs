use crate::detection::Detection;
use crate::labels::LabelTable;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

const PALETTE_SIZE: usize = 80;
const LABEL_HEIGHT: u32 = 18;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Draws detection boxes, and labels when a font is available.
pub struct Annotator {
    font: Option<FontArc>,
    font_scale: PxScale,
    colors: Vec<Rgb<u8>>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        let colors = (0..PALETTE_SIZE)
            .map(|i| {
                let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
                hsv_to_rgb(hue, 0.8, 0.9)
            })
            .collect();

        Self {
            font,
            font_scale: PxScale::from(16.0),
            colors,
        }
    }

    pub fn from_font_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| anyhow::anyhow!("invalid font {}: {e}", path.display()))?;
        Ok(Self::new(Some(font)))
    }

    pub fn color_for(&self, class_id: usize) -> Rgb<u8> {
        self.colors[class_id % self.colors.len()]
    }

    pub fn draw(&self, image: &mut RgbImage, detections: &[Detection], labels: &LabelTable) {
        let (img_w, img_h) = image.dimensions();

        for detection in detections {
            let color = self.color_for(detection.class_id);

            let x = detection.bbox.x1.max(0.0) as i32;
            let y = detection.bbox.y1.max(0.0) as i32;
            let width = (detection.bbox.width() as u32).min(img_w.saturating_sub(x as u32));
            let height = (detection.bbox.height() as u32).min(img_h.saturating_sub(y as u32));

            if width == 0 || height == 0 {
                continue;
            }

            draw_hollow_rect_mut(image, Rect::at(x, y).of_size(width, height), color);

            // second stroke for visibility
            if width > 2 && height > 2 {
                let inner = Rect::at(x + 1, y + 1).of_size(width - 2, height - 2);
                draw_hollow_rect_mut(image, inner, color);
            }

            if let Some(font) = &self.font {
                let label = format!(
                    "{} {:.2}",
                    labels.name(detection.class_id),
                    detection.confidence
                );
                let text_y = (y - LABEL_HEIGHT as i32).max(0);
                let strip_w = (label.chars().count() as u32 * 9).min(img_w.saturating_sub(x as u32));
                if strip_w > 0 {
                    draw_filled_rect_mut(
                        image,
                        Rect::at(x, text_y).of_size(strip_w, LABEL_HEIGHT),
                        color,
                    );
                }
                draw_text_mut(
                    image,
                    TEXT_COLOR,
                    x + 1,
                    text_y + 1,
                    self.font_scale,
                    font,
                    &label,
                );
            }
        }
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}
