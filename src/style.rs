use tracing::{debug, info};

use crate::config::RenderSettings;

/// Hard floor for the horizontal safe margins, as a fraction of output
/// width on each side. Guarantees caption text never reaches physical
/// screen edges (overscan safety); not user-adjustable.
const MIN_SIDE_MARGIN: f64 = 0.10;

/// Derived, stateless subtitle style. Fully determined by the settings
/// and output resolution; recomputed per job.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDescriptor {
    pub font_name: String,
    pub font_size: u32,
    pub bold: i32,
    pub primary_colour: String,
    pub back_colour: String,
    pub outline_colour: String,
    pub border_style: u32,
    pub outline: u32,
    pub shadow: u32,
    pub margin_v: i32,
    pub margin_l: u32,
    pub margin_r: u32,
    pub alignment: u32,
    pub wrap_style: u32,
}

impl StyleDescriptor {
    /// Render as an ASS force_style string for the subtitles filter.
    pub fn to_force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},Bold={},PrimaryColour={},BackColour={},\
             OutlineColour={},BorderStyle={},Outline={},Shadow={},\
             MarginV={},MarginL={},MarginR={},Alignment={},WrapStyle={}",
            self.font_name,
            self.font_size,
            self.bold,
            self.primary_colour,
            self.back_colour,
            self.outline_colour,
            self.border_style,
            self.outline,
            self.shadow,
            self.margin_v,
            self.margin_l,
            self.margin_r,
            self.alignment,
            self.wrap_style
        )
    }
}

/// Build the subtitle style for the given settings and output resolution.
/// Pure: invalid colors and positions are clamped, never rejected.
pub fn build(settings: &RenderSettings, resolution: (u32, u32)) -> StyleDescriptor {
    let settings = settings.clone().normalized();
    let (width, height) = resolution;

    // A trailing " Bold" suffix selects the ASS bold flag instead of a
    // separate font face name.
    let (font_base, bold) = match settings.font.strip_suffix(" Bold") {
        Some(base) => (base.to_string(), -1),
        None => (settings.font.clone(), 0),
    };
    let font_name: String = font_base
        .chars()
        .filter(|c| !matches!(c, ',' | '\'' | '"'))
        .collect();

    let primary_colour = encode_colour(&settings.text_color, 0);

    let (back_colour, outline_colour, border_style, outline, shadow);
    if settings.has_background {
        // Background box disables outline and shadow.
        let alpha = ((100u32.saturating_sub(settings.bg_opacity.min(100) as u32)) as f64 * 2.55)
            .round() as u8;
        back_colour = encode_colour(&settings.bg_color, alpha);
        outline_colour = "&H00000000".to_string();
        border_style = 4;
        outline = 0;
        shadow = 0;
    } else {
        back_colour = "&HFF000000".to_string();
        outline_colour = encode_colour(&settings.outline_color, 0);
        border_style = 1;
        outline = settings.outline_width;
        shadow = settings.shadow_depth;
    }

    let x_norm = settings.caption_position.x.clamp(0.0, 1.0);
    let y_norm = settings.caption_position.y.clamp(0.0, 1.0);

    let margin_px = (width as f64 * MIN_SIDE_MARGIN) as u32;

    // Vertical banding: top-, bottom- or middle-anchored. The middle
    // band's margin may be negative, signaling offset above true center.
    let (v_align_base, margin_v) = if y_norm < 0.33 {
        (6, (y_norm * height as f64) as i32)
    } else if y_norm > 0.66 {
        (0, ((1.0 - y_norm) * height as f64) as i32)
    } else {
        (3, ((0.5 - y_norm) * height as f64) as i32)
    };

    // Center alignment plus symmetric margins is the only configuration
    // that composes correctly with auto-wrap.
    let alignment = v_align_base + 2;

    debug!(
        "Caption style: pos=({:.2},{:.2}), align={}, margin_v={}px, margins={}px",
        x_norm, y_norm, alignment, margin_v, margin_px
    );
    info!(
        "Safe caption area: {}px of {}px width ({}px margins each side)",
        width - 2 * margin_px,
        width,
        margin_px
    );

    StyleDescriptor {
        font_name,
        font_size: settings.font_size,
        bold,
        primary_colour,
        back_colour,
        outline_colour,
        border_style,
        outline,
        shadow,
        margin_v,
        margin_l: margin_px,
        margin_r: margin_px,
        alignment,
        wrap_style: 2,
    }
}

/// Encode a #RRGGBB hex color to the ASS &HAABBGGRR form. The alpha
/// channel is the most-significant byte (0 opaque, 255 transparent).
/// Malformed colors clamp to opaque white rather than failing.
fn encode_colour(hex_color: &str, alpha: u8) -> String {
    let hex = hex_color.trim_start_matches('#');
    let parsed = if hex.len() == 6 {
        u32::from_str_radix(hex, 16).ok()
    } else {
        None
    };
    let rgb = parsed.unwrap_or(0xFFFFFF);

    let r = (rgb >> 16) & 0xFF;
    let g = (rgb >> 8) & 0xFF;
    let b = rgb & 0xFF;

    format!("&H{:02X}{:02X}{:02X}{:02X}", alpha, b, g, r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptionPosition, Config};

    fn settings() -> RenderSettings {
        Config::default().style
    }

    #[test]
    fn test_colour_encoding_is_reversed_with_alpha_msb() {
        assert_eq!(encode_colour("#FFFF00", 0), "&H0000FFFF");
        assert_eq!(encode_colour("#000000", 51), "&H33000000");
        // Malformed input clamps, never fails.
        assert_eq!(encode_colour("nope", 0), "&H00FFFFFF");
    }

    #[test]
    fn test_margin_floor_across_resolutions_and_anchors() {
        for resolution in [(1280u32, 720u32), (1920, 1080), (2560, 1440), (3840, 2160)] {
            for y in [0.0, 0.2, 0.5, 0.9, 1.0] {
                let mut s = settings();
                s.caption_position = CaptionPosition { x: 0.5, y };
                let style = build(&s, resolution);
                let floor = (resolution.0 as f64 * 0.10) as u32;
                assert!(style.margin_l >= floor);
                assert!(style.margin_r >= floor);
            }
        }
    }

    #[test]
    fn test_vertical_banding() {
        let mut s = settings();

        s.caption_position = CaptionPosition { x: 0.5, y: 0.1 };
        let top = build(&s, (1920, 1080));
        assert_eq!(top.alignment, 8);
        assert_eq!(top.margin_v, 108);

        s.caption_position = CaptionPosition { x: 0.5, y: 0.9 };
        let bottom = build(&s, (1920, 1080));
        assert_eq!(bottom.alignment, 2);
        assert_eq!(bottom.margin_v, ((1.0f64 - 0.9) * 1080.0) as i32);

        s.caption_position = CaptionPosition { x: 0.5, y: 0.6 };
        let middle = build(&s, (1920, 1080));
        assert_eq!(middle.alignment, 5);
        // Below true center: negative offset.
        assert!(middle.margin_v < 0);
    }

    #[test]
    fn test_background_mode_disables_outline() {
        let mut s = settings();
        s.has_background = true;
        s.bg_opacity = 80;
        let style = build(&s, (1920, 1080));
        assert_eq!(style.border_style, 4);
        assert_eq!(style.outline, 0);
        assert_eq!(style.shadow, 0);
        // alpha = (100-80)*2.55 = 51 = 0x33
        assert!(style.back_colour.starts_with("&H33"));
    }

    #[test]
    fn test_neither_treatment_normalizes_to_outline() {
        let mut s = settings();
        s.has_background = false;
        s.has_outline = false;
        let style = build(&s, (1920, 1080));
        assert_eq!(style.border_style, 1);
        assert_eq!(style.outline, s.outline_width);
        assert_eq!(style.shadow, s.shadow_depth);
    }

    #[test]
    fn test_bold_suffix_handling() {
        let mut s = settings();
        s.font = "EB Garamond Bold".to_string();
        let style = build(&s, (1920, 1080));
        assert_eq!(style.font_name, "EB Garamond");
        assert_eq!(style.bold, -1);

        s.font = "Verdana".to_string();
        let style = build(&s, (1920, 1080));
        assert_eq!(style.bold, 0);
    }

    #[test]
    fn test_force_style_string_contains_wrap_style() {
        let style = build(&settings(), (1920, 1080));
        let rendered = style.to_force_style();
        assert!(rendered.contains("WrapStyle=2"));
        assert!(rendered.contains("MarginL=192"));
        assert!(rendered.contains("MarginR=192"));
    }
}
