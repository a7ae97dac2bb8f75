//! Runtime font registration for figure text
//!
//! The bitmap backend renders text through `ab_glyph`, which needs font
//! bytes registered under a family name. The first readable candidate is
//! registered once per process; without one, figures are drawn without text.

use plotters::style::{register_font, FontStyle};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Family name used for every text element
pub const FONT_FAMILY: &str = "sans-serif";

/// Environment variable naming a TrueType font to use instead of the defaults
pub const FONT_ENV: &str = "STATLYSIS_FONT";

const FONT_CANDIDATES: [&str; 8] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static TEXT_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Whether figure text can be drawn (registers a font on first call)
pub fn text_available() -> bool {
    *TEXT_AVAILABLE.get_or_init(register_system_font)
}

fn register_system_font() -> bool {
    let override_path = std::env::var(FONT_ENV).ok();
    let candidates = override_path
        .iter()
        .map(String::as_str)
        .chain(FONT_CANDIDATES);

    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        // Registered fonts must outlive every figure
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
            debug!(path, "registered figure font");
            return true;
        }
    }

    warn!("no usable TrueType font found; figures will be drawn without text (set {FONT_ENV})");
    false
}
