pub mod compose;
pub mod fit;
pub mod shaped;
pub mod text;

mod font_cache;

use image::Rgba;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    /// The caller did not supply a required input (photo or a text field).
    #[error("missing input: {0}")]
    MissingInput(String),
    /// A configured asset (template or font file) is absent or unreadable.
    #[error("missing asset: {0}")]
    MissingAsset(String),
    /// Uploaded bytes are not a decodable image.
    #[error("decode: {0}")]
    Decode(String),
    #[error("image: {0}")]
    Image(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Source-over blend of `src` onto `dst`, keeping a real alpha channel so a
/// partially transparent template window still reveals layers below it.
pub(crate) fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src.0[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        return;
    }
    for i in 0..3 {
        let c = (src.0[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / oa;
        dst.0[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (oa * 255.0).round() as u8;
}
