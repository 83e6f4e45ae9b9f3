//! Shrink-to-fit text sizing and the rasterizer capability seam.
//!
//! Sizing is driven through [`TextRasterizer::measure`] so both the glyph
//! path and the shaped path estimate with the same font resource, and so the
//! sizing logic stays testable without font files on disk.

use std::path::Path;

use image::{Rgba, RgbaImage};
use rusttype::{point, Scale};

use super::{blend_over, font_cache, GenError};

/// Script classification driving per-field font selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    /// Latin letters/digits plus space, period, comma, apostrophe, hyphen.
    Simple,
    /// Anything else; needs a shaping-aware font (e.g. Devanagari).
    Complex,
}

pub fn classify(text: &str) -> Script {
    let simple = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | ',' | '\'' | '-'));
    if simple {
        Script::Simple
    } else {
        Script::Complex
    }
}

/// A rendered glyph layer plus whether a fallback path produced it.
pub struct Raster {
    pub image: RgbaImage,
    /// True when the shaped backend failed mid-call and the glyph path was
    /// used instead; surfaced to the caller as a warning, never an error.
    pub degraded: bool,
}

/// Text rasterization capability. One implementation is selected at startup
/// and injected; call sites never branch on backend availability themselves.
pub trait TextRasterizer: Send + Sync {
    fn id(&self) -> &'static str;

    /// Whether this backend shapes complex scripts properly.
    fn shaped(&self) -> bool;

    /// Ink extents (width, height) of `text` at `size`, in pixels.
    fn measure(&self, font: &Path, text: &str, size: u32) -> Result<(u32, u32), GenError>;

    /// Render `text` centered inside a transparent `width`×`height` layer.
    fn raster(
        &self,
        font: &Path,
        text: &str,
        size: u32,
        color: [u8; 3],
        width: u32,
        height: u32,
    ) -> Result<Raster, GenError>;
}

/// Width-only, single-shot shrink: measure at `max`, and if too wide take one
/// proportional guess (floored to `min`). No verification pass; the result
/// can still overflow slightly. This is the legacy banner behavior and is
/// kept as-is.
pub fn scale_once_to_width(
    r: &dyn TextRasterizer,
    font: &Path,
    text: &str,
    max: u32,
    min: u32,
    allowed_w: u32,
) -> Result<u32, GenError> {
    let (w, _) = r.measure(font, text, max)?;
    if w == 0 || w <= allowed_w {
        return Ok(max);
    }
    let scale = allowed_w as f64 / w as f64;
    Ok(((max as f64 * scale) as u32).max(min))
}

/// Two-axis guaranteed fit: proportional candidate from the binding axis,
/// then decrement-by-one until both measured extents fit, bottoming out at
/// `min` (the documented floor exception).
pub fn search_to_box(
    r: &dyn TextRasterizer,
    font: &Path,
    text: &str,
    max: u32,
    min: u32,
    allowed_w: u32,
    allowed_h: u32,
) -> Result<u32, GenError> {
    let (w, h) = r.measure(font, text, max)?;
    if w <= allowed_w && h <= allowed_h {
        return Ok(max);
    }
    let sw = allowed_w as f64 / w.max(1) as f64;
    let sh = allowed_h as f64 / h.max(1) as f64;
    let mut size = ((max as f64 * sw.min(sh)) as u32).clamp(min, max);
    while size > min {
        let (w, h) = r.measure(font, text, size)?;
        if w <= allowed_w && h <= allowed_h {
            return Ok(size);
        }
        size -= 1;
    }
    Ok(min)
}

/// Direct rusttype glyph blitting. Production path for simple scripts and
/// the measuring half of the shaped backend; also the process-wide fallback
/// when the shaped backend cannot be brought up.
pub struct GlyphRasterizer;

impl GlyphRasterizer {
    /// Ink bounding box of laid-out text, relative to a pen at
    /// (0, ascent). None when the text has no ink (whitespace).
    fn ink_bounds(
        font: &rusttype::Font<'static>,
        text: &str,
        size: u32,
    ) -> Option<(i32, i32, i32, i32)> {
        let scale = Scale::uniform(size.max(1) as f32);
        let v = font.v_metrics(scale);
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        for g in font.layout(text, scale, point(0.0, v.ascent)) {
            if let Some(bb) = g.pixel_bounding_box() {
                bounds = Some(match bounds {
                    None => (bb.min.x, bb.min.y, bb.max.x, bb.max.y),
                    Some((x0, y0, x1, y1)) => (
                        x0.min(bb.min.x),
                        y0.min(bb.min.y),
                        x1.max(bb.max.x),
                        y1.max(bb.max.y),
                    ),
                });
            }
        }
        bounds
    }
}

impl TextRasterizer for GlyphRasterizer {
    fn id(&self) -> &'static str {
        "glyph"
    }

    fn shaped(&self) -> bool {
        false
    }

    fn measure(&self, font: &Path, text: &str, size: u32) -> Result<(u32, u32), GenError> {
        let f = font_cache::load(font)?;
        Ok(match Self::ink_bounds(&f, text, size) {
            Some((x0, y0, x1, y1)) => ((x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32),
            None => (0, 0),
        })
    }

    fn raster(
        &self,
        font: &Path,
        text: &str,
        size: u32,
        color: [u8; 3],
        width: u32,
        height: u32,
    ) -> Result<Raster, GenError> {
        let f = font_cache::load(font)?;
        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

        if let Some((x0, y0, x1, y1)) = Self::ink_bounds(&f, text, size) {
            let ink_w = (x1 - x0).max(0) as i64;
            let ink_h = (y1 - y0).max(0) as i64;
            // Offset so the ink box lands centered in the layer.
            let dx = (width as i64 - ink_w) / 2 - x0 as i64;
            let dy = (height as i64 - ink_h) / 2 - y0 as i64;

            let scale = Scale::uniform(size.max(1) as f32);
            let v = f.v_metrics(scale);
            for g in f.layout(text, scale, point(0.0, v.ascent)) {
                if let Some(bb) = g.pixel_bounding_box() {
                    g.draw(|gx, gy, cov| {
                        let px = bb.min.x as i64 + gx as i64 + dx;
                        let py = bb.min.y as i64 + gy as i64 + dy;
                        if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                            return;
                        }
                        let a = (cov * 255.0).round() as u8;
                        if a == 0 {
                            return;
                        }
                        blend_over(
                            img.get_pixel_mut(px as u32, py as u32),
                            Rgba([color[0], color[1], color[2], a]),
                        );
                    });
                }
            }
        }

        Ok(Raster {
            image: img,
            degraded: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    /// Deterministic fake backend: every char is `size/2` px wide, ink height
    /// equals `size`; rasters are solid color blocks. Records the font path
    /// of every render so routing can be asserted. Lets sizing and
    /// compositing tests run without font files.
    pub struct StubRasterizer {
        pub shaped: bool,
        pub rendered_fonts: parking_lot::Mutex<Vec<std::path::PathBuf>>,
    }

    impl StubRasterizer {
        pub fn new(shaped: bool) -> Self {
            Self {
                shaped,
                rendered_fonts: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    impl TextRasterizer for StubRasterizer {
        fn id(&self) -> &'static str {
            "stub"
        }

        fn shaped(&self) -> bool {
            self.shaped
        }

        fn measure(&self, _font: &Path, text: &str, size: u32) -> Result<(u32, u32), GenError> {
            let n = text.chars().count() as u32;
            Ok((n * size / 2, if n == 0 { 0 } else { size }))
        }

        fn raster(
            &self,
            font: &Path,
            _text: &str,
            _size: u32,
            color: [u8; 3],
            width: u32,
            height: u32,
        ) -> Result<Raster, GenError> {
            self.rendered_fonts.lock().push(font.to_path_buf());
            Ok(Raster {
                image: RgbaImage::from_pixel(
                    width,
                    height,
                    Rgba([color[0], color[1], color[2], 255]),
                ),
                degraded: false,
            })
        }
    }
}
