use crate::processing::post::Detection;
use ab_glyph::{FontVec, PxScale};
use anyhow::Context;
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::path::Path;

const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_OFFSET: i32 = 10; // gap between label baseline and box top
const CORNER_THICKNESS: i32 = 5;
const CORNER_FRACTION: f32 = 0.3;
const FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Tried in order when the configured font file is absent
const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Draws detections onto images with a stable colour per class.
pub struct Renderer {
    palette: Vec<Rgb<u8>>,
    font: Option<FontVec>,
    font_size: f32,
}

impl Renderer {
    /// Build a renderer with one pseudo-random colour per class, drawn from
    /// an RNG seeded with `seed`.
    pub fn new(num_classes: usize, seed: u64, font: Option<FontVec>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let palette = (0..num_classes)
            .map(|_| {
                Rgb([
                    rng.gen_range(0.0f32..255.0) as u8,
                    rng.gen_range(0.0f32..255.0) as u8,
                    rng.gen_range(0.0f32..255.0) as u8,
                ])
            })
            .collect();

        if font.is_none() {
            tracing::warn!("No label font loaded, annotations will omit text");
        }

        Self {
            palette,
            font,
            font_size: LABEL_FONT_SIZE,
        }
    }

    /// Load a TrueType/OpenType font. A missing file is not an error: the
    /// renderer then draws boxes without text.
    pub fn load_font(path: impl AsRef<Path>) -> anyhow::Result<Option<FontVec>> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Label font not found");
            return Ok(None);
        }

        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| anyhow::anyhow!("invalid font {}: {}", path.display(), e))?;

        tracing::info!(path = %path.display(), "Loaded label font");
        Ok(Some(font))
    }

    /// Load the configured font, or the first installed system font when
    /// the configured file does not exist.
    pub fn load_font_with_fallback(path: impl AsRef<Path>) -> anyhow::Result<Option<FontVec>> {
        if let Some(font) = Self::load_font(path)? {
            return Ok(Some(font));
        }

        for candidate in SYSTEM_FONTS.iter().map(Path::new) {
            if candidate.exists() {
                return Self::load_font(candidate);
            }
        }

        Ok(None)
    }

    pub fn color_for(&self, class_id: u32) -> Rgb<u8> {
        if self.palette.is_empty() {
            return FALLBACK_COLOR;
        }
        self.palette[class_id as usize % self.palette.len()]
    }

    #[tracing::instrument(skip_all, fields(detections = detections.len()))]
    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            let color = self.color_for(detection.class_id);

            let x = detection.bbox.x.round() as i32;
            let y = detection.bbox.y.round() as i32;
            let w = (detection.bbox.width.round() as i32).max(1);
            let h = (detection.bbox.height.round() as i32).max(1);

            draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w as u32, h as u32), color);
            draw_corners(image, x, y, w, h, color);
            self.draw_label(image, x, y, detection, color);
        }
    }

    fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, detection: &Detection, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };

        let text = label_text(detection);
        let scale = PxScale::from(self.font_size);
        let (_, text_height) = text_size(scale, font, &text);

        draw_text_mut(
            image,
            color,
            x,
            y - LABEL_OFFSET - text_height as i32,
            scale,
            font,
            &text,
        );
    }
}

/// Caption drawn above each box: label, confidence and area ratio
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} : {:.2} : {:.2}%",
        detection.label, detection.confidence, detection.area_ratio
    )
}

/// Four L-shaped brackets, one per corner, each arm 30% of the shorter side
fn draw_corners(image: &mut RgbImage, x: i32, y: i32, w: i32, h: i32, color: Rgb<u8>) {
    let arm = (CORNER_FRACTION * w.min(h) as f32) as i32;
    let (right, bottom) = (x + w, y + h);

    for (cx, cy, dx, dy) in [
        (x, y, 1, 1),
        (right, y, -1, 1),
        (x, bottom, 1, -1),
        (right, bottom, -1, -1),
    ] {
        thick_segment(image, cx, cy, cx + dx * arm, cy, color);
        thick_segment(image, cx, cy, cx, cy + dy * arm, color);
    }
}

/// Axis-aligned segment of `CORNER_THICKNESS` pixels, clipped to the image
fn thick_segment(image: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>) {
    let half = CORNER_THICKNESS / 2;
    let rect = Rect::at(x0.min(x1) - half, y0.min(y1) - half).of_size(
        ((x1 - x0).unsigned_abs() as i32 + CORNER_THICKNESS) as u32,
        ((y1 - y0).unsigned_abs() as i32 + CORNER_THICKNESS) as u32,
    );
    draw_filled_rect_mut(image, rect, color);
}
