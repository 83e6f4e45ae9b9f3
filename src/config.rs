//! Fixed layout configuration for the deployed card variants.
//!
//! Every rectangle, font size and color below is deploy-time data, not user
//! input. The two built-in variants intentionally differ in more than
//! geometry: the banner keeps the legacy whole-canvas horizontal centering
//! and skips EXIF correction, the ID card centers inside its boxes and
//! applies EXIF orientation. Keep those differences here, spelled out, rather
//! than buried in the pipeline.

use std::path::PathBuf;

use crate::generator::text::Script;

/// Upload pre-pass canvas (banner variant only): the source photo is first
/// thumbnailed into this box and padded onto a transparent canvas of exactly
/// this size before the slot fit runs.
pub const STANDARD_W: u32 = 500;
pub const STANDARD_H: u32 = 750;

// Banner layout.
const BANNER_TEMPLATE: &str = "template.png";
const BANNER_CANVAS: (u32, u32) = (1000, 900);
const BANNER_SLOT: Rect = Rect { x: 245, y: 85, w: 600, h: 800 };
const BANNER_NAME_BOX: TextBox = TextBox { x1: 288, y1: 705, x2: 790, y2: 790 };
const BANNER_DESG_BOX: TextBox = TextBox { x1: 367, y1: 807, x2: 712, y2: 855 };
const BANNER_NAME_FONT: &str = "Khand-SemiBold.ttf";
const BANNER_DESG_FONT: &str = "Poppins-SemiBold.ttf";
const MAX_NAME_FONT: u32 = 66;
const MAX_DESG_FONT: u32 = 32;

// ID card layout (CR80 portrait at 300 dpi).
const ID_TEMPLATE: &str = "id_template.png";
const ID_CANVAS: (u32, u32) = (638, 1011);
const ID_SLOT: Rect = Rect { x: 169, y: 160, w: 300, h: 375 };
const ID_NAME_BOX: TextBox = TextBox { x1: 69, y1: 620, x2: 569, y2: 680 };
const ID_DESG_BOX: TextBox = TextBox { x1: 69, y1: 700, x2: 569, y2: 748 };
const NAME_FONT_EN: &str = "Poppins-SemiBold.ttf";
const NAME_FONT_HI: &str = "NotoSansDevanagari-SemiBold.ttf";
const DESG_FONT_EN: &str = "Poppins-Regular.ttf";
const DESG_FONT_HI: &str = "NotoSansDevanagari-Regular.ttf";
const MAX_ID_NAME_FONT: u32 = 40;
const MAX_ID_DESG_FONT: u32 = 28;

/// Floor for the shrink-to-fit search, shared by every field.
pub const MIN_FONT: u32 = 12;

#[derive(Clone, Copy, Debug)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Placement box in template coordinates, `x1..x2` by `y1..y2`.
#[derive(Clone, Copy, Debug)]
pub struct TextBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl TextBox {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// How a field's font size is chosen when the text overflows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitMode {
    /// One width-only shrink estimate, no further search. Legacy banner
    /// behavior.
    WidthScaleOnce,
    /// Scale estimate on both axes, then decrement until the text fits the
    /// box or the floor is reached.
    BoxSearch,
}

/// Horizontal anchor for placing the rendered text.
///
/// `Canvas` reproduces the legacy banner layout: the box x-bounds limit the
/// measured width, but the final x position centers on the full template
/// width. Looks like an accident in the original, kept configurable on
/// purpose instead of silently corrected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAnchor {
    Canvas,
    Box,
}

#[derive(Clone, Debug)]
pub struct FieldLayout {
    pub bounds: TextBox,
    pub max_size: u32,
    pub min_size: u32,
    /// Fill color, RGB.
    pub color: [u8; 3],
    /// Font file for text expressible in plain Latin letters and digits.
    pub simple_font: String,
    /// Font file for anything else (Devanagari etc).
    pub complex_font: String,
}

impl FieldLayout {
    pub fn font_for(&self, script: Script) -> &str {
        match script {
            Script::Simple => &self.simple_font,
            Script::Complex => &self.complex_font,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VariantLayout {
    pub id: &'static str,
    pub template: PathBuf,
    pub download_name: &'static str,
    /// Expected template dimensions; advisory for clients, the compositor
    /// always uses the decoded template's real size.
    pub canvas: (u32, u32),
    pub slot: Rect,
    pub name: FieldLayout,
    pub designation: FieldLayout,
    pub fit: FitMode,
    pub h_anchor: HAnchor,
    /// Thumbnail-and-pad pre-pass before the slot fit (banner only).
    pub normalize_upload: bool,
    /// Apply EXIF orientation to the upload before any processing.
    pub correct_orientation: bool,
}

pub fn banner() -> VariantLayout {
    VariantLayout {
        id: "banner",
        template: assets_dir().join(BANNER_TEMPLATE),
        download_name: "final_banner.png",
        canvas: BANNER_CANVAS,
        slot: BANNER_SLOT,
        name: FieldLayout {
            bounds: BANNER_NAME_BOX,
            max_size: MAX_NAME_FONT,
            min_size: MIN_FONT,
            color: [255, 255, 255],
            simple_font: BANNER_NAME_FONT.into(),
            complex_font: BANNER_NAME_FONT.into(),
        },
        designation: FieldLayout {
            bounds: BANNER_DESG_BOX,
            max_size: MAX_DESG_FONT,
            min_size: MIN_FONT,
            color: [0, 0, 0],
            simple_font: BANNER_DESG_FONT.into(),
            complex_font: BANNER_DESG_FONT.into(),
        },
        fit: FitMode::WidthScaleOnce,
        h_anchor: HAnchor::Canvas,
        normalize_upload: true,
        correct_orientation: false,
    }
}

pub fn id_card() -> VariantLayout {
    VariantLayout {
        id: "id_card",
        template: assets_dir().join(ID_TEMPLATE),
        download_name: "final_id_card.png",
        canvas: ID_CANVAS,
        slot: ID_SLOT,
        name: FieldLayout {
            bounds: ID_NAME_BOX,
            max_size: MAX_ID_NAME_FONT,
            min_size: MIN_FONT,
            color: [33, 37, 41],
            simple_font: NAME_FONT_EN.into(),
            complex_font: NAME_FONT_HI.into(),
        },
        designation: FieldLayout {
            bounds: ID_DESG_BOX,
            max_size: MAX_ID_DESG_FONT,
            min_size: MIN_FONT,
            color: [73, 80, 87],
            simple_font: DESG_FONT_EN.into(),
            complex_font: DESG_FONT_HI.into(),
        },
        fit: FitMode::BoxSearch,
        h_anchor: HAnchor::Box,
        normalize_upload: false,
        correct_orientation: true,
    }
}

pub fn variant(id: &str) -> Option<VariantLayout> {
    match id {
        "banner" => Some(banner()),
        "id_card" => Some(id_card()),
        _ => None,
    }
}

pub fn variant_ids() -> &'static [&'static str] {
    &["banner", "id_card"]
}

/// Every font any deployed variant can reach, for the startup probe of the
/// shaped text backend.
pub fn all_font_paths() -> Vec<PathBuf> {
    let mut names: Vec<String> = Vec::new();
    for v in [banner(), id_card()] {
        for f in [&v.name, &v.designation] {
            for n in [&f.simple_font, &f.complex_font] {
                if !names.contains(n) {
                    names.push(n.clone());
                }
            }
        }
    }
    let dir = fonts_dir();
    names.into_iter().map(|n| dir.join(n)).collect()
}

pub fn assets_dir() -> PathBuf {
    let project_root = std::env::var("PROJECT_ROOT").ok().unwrap_or_else(|| {
        let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.to_string_lossy().to_string()
    });
    PathBuf::from(project_root).join("assets")
}

pub fn fonts_dir() -> PathBuf {
    assets_dir().join("fonts")
}
