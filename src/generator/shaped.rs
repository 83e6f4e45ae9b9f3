//! Shaped text backend built on cosmic-text.
//!
//! Complex scripts (Devanagari ligatures, reordering) need real shaping that
//! plain glyph-by-glyph layout cannot do. The shaper is treated as an opaque
//! oracle: we hand it font, size and color and take back a centered raster.
//! Sizing estimates go through the same font via the glyph measurer so the
//! estimate and the final render stay close.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cosmic_text::{
    fontdb, Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, SwashContent,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::warn;

use super::text::{GlyphRasterizer, Raster, TextRasterizer};
use super::{blend_over, GenError};

struct Shaper {
    font_system: FontSystem,
    swash: SwashCache,
    // Resolved font family per configured file, so a path maps onto a
    // concrete face in the shaper's database.
    families: HashMap<PathBuf, String>,
}

impl Shaper {
    fn family_for(&mut self, path: &Path) -> Result<String, GenError> {
        if let Some(fam) = self.families.get(path) {
            return Ok(fam.clone());
        }

        self.font_system.db_mut().load_font_file(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GenError::MissingAsset(format!("font not found: {}", path.display()))
            } else {
                GenError::Internal(format!("failed to load font {}: {e}", path.display()))
            }
        })?;

        let fam = self
            .font_system
            .db()
            .faces()
            .find_map(|face| match &face.source {
                fontdb::Source::File(p) if p.as_path() == path => {
                    face.families.first().map(|(name, _)| name.clone())
                }
                _ => None,
            })
            .ok_or_else(|| {
                GenError::MissingAsset(format!("no usable face in {}", path.display()))
            })?;

        self.families.insert(path.to_path_buf(), fam.clone());
        Ok(fam)
    }
}

/// cosmic-text rasterizer with a glyph-path escape hatch: measurement always
/// uses the glyph metrics, and a shaping failure mid-render degrades to the
/// glyph draw (flagged on the returned [`Raster`]) instead of aborting.
pub struct ShapedRasterizer {
    inner: Mutex<Shaper>,
    estimator: GlyphRasterizer,
}

impl std::fmt::Debug for ShapedRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedRasterizer").finish_non_exhaustive()
    }
}

impl ShapedRasterizer {
    /// Startup probe: bring up the font database and preload every configured
    /// font. Any failure here means the deployment should run on the glyph
    /// fallback instead.
    pub fn probe(fonts: &[PathBuf]) -> Result<Self, GenError> {
        let mut shaper = Shaper {
            font_system: FontSystem::new(),
            swash: SwashCache::new(),
            families: HashMap::new(),
        };
        for path in fonts {
            shaper.family_for(path)?;
        }
        Ok(Self {
            inner: Mutex::new(shaper),
            estimator: GlyphRasterizer,
        })
    }

    fn shape_raster(
        &self,
        font: &Path,
        text: &str,
        size: u32,
        color: [u8; 3],
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, GenError> {
        let mut guard = self.inner.lock();
        let family = guard.family_for(font)?;
        let Shaper {
            font_system, swash, ..
        } = &mut *guard;

        let line_height = (size.max(1) as f32 * 1.2).ceil();
        let metrics = Metrics::new(size.max(1) as f32, line_height);
        let attrs = Attrs::new().family(Family::Name(&family));

        let mut buffer = Buffer::new(font_system, metrics);
        buffer.set_size(font_system, None, None);
        buffer.set_text(font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(font_system, false);

        struct Placed {
            key: cosmic_text::CacheKey,
            x: i32,
            y: i32,
            line_y: f32,
        }

        let mut placed = Vec::new();
        for run in buffer.layout_runs() {
            for glyph in run.glyphs {
                let physical = glyph.physical((0.0, 0.0), 1.0);
                placed.push(Placed {
                    key: physical.cache_key,
                    x: physical.x,
                    y: physical.y,
                    line_y: run.line_y,
                });
            }
        }

        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

        // Center the *placed ink*, not the advance/line box: the caller may
        // size the layer to ink extents (tighter than the line box), and a
        // line-box offset would push the glyph tops off the layer.
        let mut ink: Option<(i64, i64, i64, i64)> = None;
        for pl in &placed {
            let Some(glyph_img) = swash.get_image(font_system, pl.key) else {
                continue;
            };
            if glyph_img.placement.width == 0 || glyph_img.placement.height == 0 {
                continue;
            }
            let x0 = pl.x as i64 + glyph_img.placement.left as i64;
            let y0 = (pl.line_y + pl.y as f32).round() as i64 - glyph_img.placement.top as i64;
            let x1 = x0 + glyph_img.placement.width as i64;
            let y1 = y0 + glyph_img.placement.height as i64;
            ink = Some(match ink {
                None => (x0, y0, x1, y1),
                Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
            });
        }
        let Some(ink) = ink else {
            return Ok(img);
        };
        let (dx, dy) = center_ink(ink, width, height);

        for pl in placed {
            let Some(glyph_img) = swash.get_image(font_system, pl.key) else {
                continue;
            };
            if glyph_img.placement.width == 0 || glyph_img.placement.height == 0 {
                continue;
            }

            let gx = pl.x as i64 + glyph_img.placement.left as i64 + dx;
            let gy = (pl.line_y + pl.y as f32).round() as i64 - glyph_img.placement.top as i64
                + dy;
            let gw = glyph_img.placement.width as i64;
            let gh = glyph_img.placement.height as i64;

            for oy in 0..gh {
                for ox in 0..gw {
                    let px = gx + ox;
                    let py = gy + oy;
                    if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                        continue;
                    }
                    let idx = (oy * gw + ox) as usize;
                    let src = match glyph_img.content {
                        SwashContent::Mask => {
                            let a = glyph_img.data[idx];
                            Rgba([color[0], color[1], color[2], a])
                        }
                        SwashContent::Color => {
                            let i = idx * 4;
                            Rgba([
                                glyph_img.data[i],
                                glyph_img.data[i + 1],
                                glyph_img.data[i + 2],
                                glyph_img.data[i + 3],
                            ])
                        }
                        // Subpixel coverage collapsed to its strongest channel.
                        SwashContent::SubpixelMask => {
                            let i = idx * 3;
                            let a = glyph_img.data[i]
                                .max(glyph_img.data[i + 1])
                                .max(glyph_img.data[i + 2]);
                            Rgba([color[0], color[1], color[2], a])
                        }
                    };
                    if src.0[3] > 0 {
                        blend_over(img.get_pixel_mut(px as u32, py as u32), src);
                    }
                }
            }
        }

        Ok(img)
    }
}

/// Offset that centers an ink bounding box (`x0, y0, x1, y1`, exclusive max)
/// inside a `width`×`height` layer.
fn center_ink(ink: (i64, i64, i64, i64), width: u32, height: u32) -> (i64, i64) {
    let (x0, y0, x1, y1) = ink;
    let dx = (width as i64 - (x1 - x0)) / 2 - x0;
    let dy = (height as i64 - (y1 - y0)) / 2 - y0;
    (dx, dy)
}

impl TextRasterizer for ShapedRasterizer {
    fn id(&self) -> &'static str {
        "shaped"
    }

    fn shaped(&self) -> bool {
        true
    }

    fn measure(&self, font: &Path, text: &str, size: u32) -> Result<(u32, u32), GenError> {
        self.estimator.measure(font, text, size)
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
        match self.shape_raster(font, text, size, color, width, height) {
            Ok(image) => Ok(Raster {
                image,
                degraded: false,
            }),
            Err(e) => {
                warn!("shaped render failed, falling back to glyph draw: {e}");
                let mut raster = self.estimator.raster(font, text, size, color, width, height)?;
                raster.degraded = true;
                Ok(raster)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_fails_on_missing_font() {
        let err = ShapedRasterizer::probe(&[PathBuf::from("/no/such/font.ttf")]).unwrap_err();
        assert!(matches!(err, GenError::MissingAsset(_)), "got {err:?}");
    }

    #[test]
    fn probe_with_no_fonts_succeeds() {
        let r = ShapedRasterizer::probe(&[]).unwrap();
        assert!(r.shaped());
        assert_eq!(r.id(), "shaped");
    }

    #[test]
    fn ink_centering_fills_an_ink_sized_layer_exactly() {
        // Glyph tops sit above the baseline frame origin (negative y0, the
        // usual single-line case). Centered into a layer sized to the ink
        // itself, the ink must land at (0,0)..(w,h) with nothing clipped.
        let ink = (3i64, -40i64, 53i64, 8i64); // 50x48
        let (dx, dy) = center_ink(ink, 50, 48);
        assert_eq!((ink.0 + dx, ink.1 + dy), (0, 0));
        assert_eq!((ink.2 + dx, ink.3 + dy), (50, 48));
    }

    #[test]
    fn ink_centering_never_clips_when_layer_is_larger() {
        for (ink, w, h) in [
            ((0i64, -50i64, 120i64, 10i64), 200u32, 80u32),
            ((-4, -33, 96, 1), 180, 40),
            ((10, 5, 30, 25), 100, 100),
        ] {
            let (dx, dy) = center_ink(ink, w, h);
            let (x0, y0, x1, y1) = ink;
            assert!(x0 + dx >= 0 && y0 + dy >= 0, "top-left clipped for {ink:?}");
            assert!(
                x1 + dx <= w as i64 && y1 + dy <= h as i64,
                "bottom-right clipped for {ink:?}"
            );
        }
    }
}
