//! The composition pipeline: validate, decode, fit, layer, stamp, encode.
//!
//! Strictly ordered per request: input validation happens before any asset
//! is touched, the photo and template are layered before any text, and the
//! two text fields are stamped independently so a degraded designation
//! render cannot discard an already-stamped name. Any hard failure aborts
//! the whole request; nothing partial is ever returned.

use std::io::Cursor;

use image::{
    codecs::png::PngEncoder, DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder,
    ImageReader, Rgba, RgbaImage,
};
use tracing::info;

use crate::config::{self, FieldLayout, FitMode, HAnchor, VariantLayout};

use super::text::{classify, scale_once_to_width, search_to_box, TextRasterizer};
use super::{blend_over, fit, GenError};

pub struct GenerateInput {
    pub name: String,
    pub designation: String,
    pub photo: Vec<u8>,
}

#[derive(Debug)]
pub struct Generated {
    pub png: Vec<u8>,
    /// Non-fatal degradations (e.g. shaped backend unavailable); the image
    /// is still produced.
    pub warnings: Vec<String>,
}

pub fn generate(
    layout: &VariantLayout,
    rasterizer: &dyn TextRasterizer,
    input: &GenerateInput,
) -> Result<Generated, GenError> {
    // All input checks run before any asset read or decode.
    let name = input.name.trim();
    let designation = input.designation.trim();
    if name.is_empty() {
        return Err(GenError::MissingInput("name is required".into()));
    }
    if designation.is_empty() {
        return Err(GenError::MissingInput("designation is required".into()));
    }
    if input.photo.is_empty() {
        return Err(GenError::MissingInput("photo is required".into()));
    }

    let template = load_template(layout)?;
    let photo = decode_photo(&input.photo, layout.correct_orientation)?;

    let photo = if layout.normalize_upload {
        fit::normalize_upload(&photo, config::STANDARD_W, config::STANDARD_H)
    } else {
        photo
    };
    let fitted = fit::fit_to_slot(&photo, layout.slot.w, layout.slot.h);

    // Photo pasted onto a transparent canvas, template composited over it:
    // the template's opaque frame occludes the overhang, its transparent
    // window reveals the photo. Text goes on top of both.
    let mut canvas = RgbaImage::from_pixel(template.width(), template.height(), Rgba([0, 0, 0, 0]));
    paste(&mut canvas, &fitted, layout.slot.x, layout.slot.y);
    for (x, y, px) in template.enumerate_pixels() {
        blend_over(canvas.get_pixel_mut(x, y), *px);
    }

    let mut warnings = Vec::new();
    stamp_field(&mut canvas, layout, &layout.name, name, rasterizer, &mut warnings)?;
    stamp_field(
        &mut canvas,
        layout,
        &layout.designation,
        designation,
        rasterizer,
        &mut warnings,
    )?;

    let mut buf = Vec::new();
    let enc = PngEncoder::new(&mut buf);
    enc.write_image(
        &canvas,
        canvas.width(),
        canvas.height(),
        ExtendedColorType::Rgba8,
    )
    .map_err(|e| GenError::Image(e.to_string()))?;

    info!(
        variant = layout.id,
        backend = rasterizer.id(),
        warnings = warnings.len(),
        "composed {}x{} png",
        canvas.width(),
        canvas.height()
    );

    Ok(Generated { png: buf, warnings })
}

fn load_template(layout: &VariantLayout) -> Result<RgbaImage, GenError> {
    let bytes = std::fs::read(&layout.template).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GenError::MissingAsset(format!(
                "template not found at {}",
                layout.template.display()
            ))
        } else {
            GenError::Internal(format!(
                "failed to read template {}: {e}",
                layout.template.display()
            ))
        }
    })?;
    let img = image::load_from_memory(&bytes).map_err(|e| {
        GenError::Internal(format!(
            "template {} is not a valid image: {e}",
            layout.template.display()
        ))
    })?;
    Ok(img.to_rgba8())
}

fn decode_photo(bytes: &[u8], correct_orientation: bool) -> Result<RgbaImage, GenError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| GenError::Decode(format!("invalid photo: {e}")))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| GenError::Decode(format!("invalid photo: {e}")))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| GenError::Decode(format!("invalid photo: {e}")))?;
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| GenError::Decode(format!("invalid photo: {e}")))?;
    if correct_orientation {
        img.apply_orientation(orientation);
    }
    Ok(img.to_rgba8())
}

fn stamp_field(
    canvas: &mut RgbaImage,
    layout: &VariantLayout,
    field: &FieldLayout,
    text: &str,
    rasterizer: &dyn TextRasterizer,
    warnings: &mut Vec<String>,
) -> Result<(), GenError> {
    let font = config::fonts_dir().join(field.font_for(classify(text)));
    let bounds = field.bounds;
    let allowed_w = bounds.width();
    let allowed_h = bounds.height();

    let (raster, x, y) = match layout.fit {
        FitMode::WidthScaleOnce => {
            let size = scale_once_to_width(
                rasterizer,
                &font,
                text,
                field.max_size,
                field.min_size,
                allowed_w,
            )?;
            let (tw, th) = rasterizer.measure(&font, text, size)?;
            let raster =
                rasterizer.raster(&font, text, size, field.color, tw.max(1), th.max(1))?;
            // Horizontal anchor is configurable: the legacy banner centers on
            // the full canvas even though the box bounded the measurement.
            let x = match layout.h_anchor {
                HAnchor::Canvas => (canvas.width() as i64 - tw as i64) / 2,
                HAnchor::Box => bounds.x1 as i64 + (allowed_w as i64 - tw as i64) / 2,
            };
            let y = (bounds.y1 + bounds.y2) as i64 / 2 - th as i64 / 2;
            (raster, x, y)
        }
        FitMode::BoxSearch => {
            let size = search_to_box(
                rasterizer,
                &font,
                text,
                field.max_size,
                field.min_size,
                allowed_w,
                allowed_h,
            )?;
            let raster = rasterizer.raster(&font, text, size, field.color, allowed_w, allowed_h)?;
            (raster, bounds.x1 as i64, bounds.y1 as i64)
        }
    };

    if raster.degraded || (layout.fit == FitMode::BoxSearch && !rasterizer.shaped()) {
        warnings.push(format!(
            "text rendered without shaping (backend: {})",
            rasterizer.id()
        ));
    }

    paste_alpha(canvas, &raster.image, x, y);
    Ok(())
}

/// Direct pixel copy, alpha included (transparent source pixels overwrite).
fn paste(base: &mut RgbaImage, over: &RgbaImage, x: u32, y: u32) {
    for (ox, oy, px) in over.enumerate_pixels() {
        let bx = x + ox;
        let by = y + oy;
        if bx < base.width() && by < base.height() {
            base.put_pixel(bx, by, *px);
        }
    }
}

/// Alpha-masked stamp; signed origin, pixels outside the canvas are dropped.
fn paste_alpha(base: &mut RgbaImage, over: &RgbaImage, x: i64, y: i64) {
    for (ox, oy, px) in over.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        let bx = x + ox as i64;
        let by = y + oy as i64;
        if bx < 0 || by < 0 || bx >= base.width() as i64 || by >= base.height() as i64 {
            continue;
        }
        blend_over(base.get_pixel_mut(bx as u32, by as u32), *px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldLayout, FitMode, HAnchor, Rect, TextBox, VariantLayout};
    use crate::generator::text::stub::StubRasterizer;
    use std::path::Path;

    const BLUE: Rgba<u8> = Rgba([20, 40, 160, 255]);

    /// Writes a 200x160 template: opaque blue frame with a fully transparent
    /// window exactly over the photo slot.
    fn write_template(path: &Path) {
        let slot = Rect { x: 50, y: 40, w: 60, h: 80 };
        let mut tpl = RgbaImage::from_pixel(200, 160, BLUE);
        for y in slot.y..slot.y + slot.h {
            for x in slot.x..slot.x + slot.w {
                tpl.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        tpl.save(path).unwrap();
    }

    fn photo_png(color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(30, 40, Rgba(color));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn test_layout(template: &Path) -> VariantLayout {
        VariantLayout {
            id: "test",
            template: template.to_path_buf(),
            download_name: "test.png",
            canvas: (200, 160),
            slot: Rect { x: 50, y: 40, w: 60, h: 80 },
            name: FieldLayout {
                bounds: TextBox { x1: 10, y1: 4, x2: 190, y2: 32 },
                max_size: 20,
                min_size: 8,
                color: [255, 255, 255],
                simple_font: "a.ttf".into(),
                complex_font: "b.ttf".into(),
            },
            designation: FieldLayout {
                bounds: TextBox { x1: 10, y1: 130, x2: 190, y2: 152 },
                max_size: 16,
                min_size: 8,
                color: [10, 200, 10],
                simple_font: "a.ttf".into(),
                complex_font: "b.ttf".into(),
            },
            fit: FitMode::BoxSearch,
            h_anchor: HAnchor::Box,
            normalize_upload: false,
            correct_orientation: false,
        }
    }

    fn input() -> GenerateInput {
        GenerateInput {
            name: "Asha Rao".into(),
            designation: "Lead Engineer".into(),
            photo: photo_png([220, 30, 30, 255]),
        }
    }

    #[test]
    fn composes_photo_under_template_and_text_on_top() {
        let dir = tempfile::tempdir().unwrap();
        let tpl = dir.path().join("tpl.png");
        write_template(&tpl);
        let layout = test_layout(&tpl);
        let r = StubRasterizer::new(true);

        let out = generate(&layout, &r, &input()).unwrap();
        assert!(out.warnings.is_empty());

        let img = image::load_from_memory(&out.png).unwrap().to_rgba8();
        assert_eq!((img.width(), img.height()), (200, 160));
        // Inside the window: the cover-fitted photo.
        assert_eq!(img.get_pixel(80, 80).0[0], 220);
        // Outside the window: the opaque frame.
        assert_eq!(*img.get_pixel(10, 80), BLUE);
        // Name box center: the stamped (stub) text block.
        assert_eq!(*img.get_pixel(100, 18), Rgba([255, 255, 255, 255]));
        // Designation box center.
        assert_eq!(*img.get_pixel(100, 141), Rgba([10, 200, 10, 255]));
    }

    #[test]
    fn each_field_is_rendered_with_the_font_for_its_script() {
        let dir = tempfile::tempdir().unwrap();
        let tpl = dir.path().join("tpl.png");
        write_template(&tpl);
        let layout = test_layout(&tpl);
        let r = StubRasterizer::new(true);

        // Latin name, Devanagari designation: the name must go through the
        // simple font and the designation through the complex one.
        generate(
            &layout,
            &r,
            &GenerateInput {
                name: "Asha Rao".into(),
                designation: "मुख्य अभियंता".into(),
                photo: photo_png([220, 30, 30, 255]),
            },
        )
        .unwrap();

        let fonts = r.rendered_fonts.lock();
        let names: Vec<_> = fonts
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["a.ttf", "b.ttf"]);
    }

    #[test]
    fn output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let tpl = dir.path().join("tpl.png");
        write_template(&tpl);
        let layout = test_layout(&tpl);
        let r = StubRasterizer::new(true);

        let a = generate(&layout, &r, &input()).unwrap();
        let b = generate(&layout, &r, &input()).unwrap();
        assert_eq!(a.png, b.png);
    }

    #[test]
    fn empty_fields_rejected_before_any_asset_read() {
        // Template path is bogus on purpose: if validation ran after the
        // asset read this would be MissingAsset, not MissingInput.
        let layout = test_layout(Path::new("/nope/tpl.png"));
        let r = StubRasterizer::new(true);

        for (name, desg) in [("", "Lead Engineer"), ("   ", "Lead Engineer"), ("Asha", " ")] {
            let err = generate(
                &layout,
                &r,
                &GenerateInput {
                    name: name.into(),
                    designation: desg.into(),
                    photo: photo_png([1, 1, 1, 255]),
                },
            )
            .unwrap_err();
            assert!(matches!(err, GenError::MissingInput(_)), "got {err:?}");
        }

        let err = generate(
            &layout,
            &r,
            &GenerateInput {
                name: "Asha".into(),
                designation: "Engineer".into(),
                photo: Vec::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, GenError::MissingInput(_)), "got {err:?}");
    }

    #[test]
    fn missing_template_is_a_missing_asset() {
        let layout = test_layout(Path::new("/nope/tpl.png"));
        let r = StubRasterizer::new(true);
        let err = generate(&layout, &r, &input()).unwrap_err();
        assert!(matches!(err, GenError::MissingAsset(_)), "got {err:?}");
    }

    #[test]
    fn undecodable_photo_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let tpl = dir.path().join("tpl.png");
        write_template(&tpl);
        let layout = test_layout(&tpl);
        let r = StubRasterizer::new(true);

        let err = generate(
            &layout,
            &r,
            &GenerateInput {
                name: "Asha".into(),
                designation: "Engineer".into(),
                photo: b"not an image at all".to_vec(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, GenError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn unshaped_backend_warns_but_still_generates() {
        let dir = tempfile::tempdir().unwrap();
        let tpl = dir.path().join("tpl.png");
        write_template(&tpl);
        let layout = test_layout(&tpl);
        let r = StubRasterizer::new(false);

        let out = generate(&layout, &r, &input()).unwrap();
        // Both fields use the box-fit path, so both degrade.
        assert_eq!(out.warnings.len(), 2);
        let img = image::load_from_memory(&out.png).unwrap().to_rgba8();
        assert_eq!(*img.get_pixel(100, 18), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn canvas_anchor_centers_on_full_width() {
        let dir = tempfile::tempdir().unwrap();
        let tpl = dir.path().join("tpl.png");
        write_template(&tpl);
        let mut layout = test_layout(&tpl);
        layout.fit = FitMode::WidthScaleOnce;
        layout.h_anchor = HAnchor::Canvas;
        // Shift the name box off-center so box- and canvas-centering differ.
        layout.name.bounds = TextBox { x1: 120, y1: 4, x2: 190, y2: 32 };
        let r = StubRasterizer::new(true);

        let out = generate(&layout, &r, &input()).unwrap();
        let img = image::load_from_memory(&out.png).unwrap().to_rgba8();
        // "Asha Rao" measures 8 chars; fitting width 70 shrinks the size so
        // the block is ~70px wide, centered on the 200px canvas, i.e. around
        // x=100 — well left of the box's own center (155).
        assert_eq!(*img.get_pixel(100, 18), Rgba([255, 255, 255, 255]));
        assert_eq!(*img.get_pixel(170, 18), BLUE);
    }
}
