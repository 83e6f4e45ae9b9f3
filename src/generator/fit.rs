//! Photo geometry: cover-fit into the template slot, plus the banner's
//! thumbnail-and-pad pre-pass.

use image::{imageops, Rgba, RgbaImage};

/// Scale `img` so it fully covers `target_w`×`target_h` (matching one axis
/// exactly, overhanging on the other), then center-crop to the exact target.
/// Strict cover/crop: never letterboxes, upsizes small sources freely.
pub fn fit_to_slot(img: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    debug_assert!(target_w > 0 && target_h > 0);
    if img.width() == target_w && img.height() == target_h {
        return img.clone();
    }

    let img_ratio = img.width() as f64 / img.height() as f64;
    let target_ratio = target_w as f64 / target_h as f64;

    let (new_w, new_h) = if img_ratio > target_ratio {
        // Relatively wider than the slot: match height, overhang horizontally.
        (
            ((target_h as f64 * img_ratio).round() as u32).max(target_w),
            target_h,
        )
    } else {
        (
            target_w,
            ((target_w as f64 / img_ratio).round() as u32).max(target_h),
        )
    };

    let resized = if (new_w, new_h) == (img.width(), img.height()) {
        img.clone()
    } else {
        imageops::resize(img, new_w, new_h, imageops::FilterType::Lanczos3)
    };

    let left = (new_w - target_w) / 2;
    let top = (new_h - target_h) / 2;
    imageops::crop_imm(&resized, left, top, target_w, target_h).to_image()
}

/// Contain `img` inside `w`×`h` (never upscaling), then center it on a
/// transparent canvas of exactly `w`×`h`.
///
/// Running the slot fit against this padded canvas instead of the raw upload
/// changes which region of the photo survives the crop; the banner variant
/// depends on that.
pub fn normalize_upload(img: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    let (iw, ih) = (img.width(), img.height());

    let scaled;
    let thumb = if iw <= w && ih <= h {
        img
    } else {
        let scale = (w as f64 / iw as f64).min(h as f64 / ih as f64);
        let tw = ((iw as f64 * scale).round() as u32).clamp(1, w);
        let th = ((ih as f64 * scale).round() as u32).clamp(1, h);
        scaled = imageops::resize(img, tw, th, imageops::FilterType::Lanczos3);
        &scaled
    };

    let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
    let x = (w - thumb.width()) / 2;
    let y = (h - thumb.height()) / 2;
    for (ox, oy, px) in thumb.enumerate_pixels() {
        canvas.put_pixel(x + ox, y + oy, *px);
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    #[test]
    fn output_is_exactly_target_sized() {
        for (iw, ih) in [(30, 40), (40, 30), (60, 80), (13, 77), (1, 1)] {
            let out = fit_to_slot(&solid(iw, ih, [9, 9, 9, 255]), 60, 80);
            assert_eq!((out.width(), out.height()), (60, 80), "from {iw}x{ih}");
        }
    }

    #[test]
    fn upsizes_small_sources() {
        let out = fit_to_slot(&solid(30, 40, [1, 2, 3, 255]), 600, 800);
        assert_eq!((out.width(), out.height()), (600, 800));
        assert_eq!(out.get_pixel(300, 400).0[3], 255);
    }

    #[test]
    fn no_letterbox_on_solid_input() {
        let out = fit_to_slot(&solid(300, 400, [200, 10, 10, 255]), 600, 800);
        for px in out.pixels() {
            assert_eq!(*px, Rgba([200, 10, 10, 255]));
        }
    }

    #[test]
    fn idempotent_on_own_output() {
        let mut src = RgbaImage::new(37, 91);
        for (x, y, px) in src.enumerate_pixels_mut() {
            *px = Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 120, 255]);
        }
        let once = fit_to_slot(&src, 60, 80);
        let twice = fit_to_slot(&once, 60, 80);
        assert_eq!(once, twice);
    }

    #[test]
    fn wide_input_crops_horizontally_centered() {
        // Left half red, right half blue; fitting 4x2 into 2x2 keeps the
        // middle columns: one red, one blue.
        let mut src = RgbaImage::new(4, 2);
        for (x, _, px) in src.enumerate_pixels_mut() {
            *px = if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            };
        }
        let out = fit_to_slot(&src, 2, 2);
        assert_eq!(out.get_pixel(0, 0).0[0], 255, "left column should be red");
        assert_eq!(out.get_pixel(1, 0).0[2], 255, "right column should be blue");
    }

    #[test]
    fn normalize_never_upscales() {
        let out = normalize_upload(&solid(10, 10, [5, 5, 5, 255]), 500, 750);
        assert_eq!((out.width(), out.height()), (500, 750));
        // Original pixels sit centered, untouched.
        assert_eq!(*out.get_pixel(249, 374), Rgba([5, 5, 5, 255]));
        // Corners are padding.
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(499, 749).0[3], 0);
    }

    #[test]
    fn normalize_contains_large_input() {
        let out = normalize_upload(&solid(1000, 750, [5, 5, 5, 255]), 500, 750);
        assert_eq!((out.width(), out.height()), (500, 750));
        // 1000x750 contained in 500x750 scales by 0.5 -> 500x375, centered
        // vertically: rows 0..187 transparent, middle opaque.
        assert_eq!(out.get_pixel(250, 100).0[3], 0);
        assert_eq!(out.get_pixel(250, 375).0[3], 255);
        assert_eq!(out.get_pixel(250, 700).0[3], 0);
    }
}
