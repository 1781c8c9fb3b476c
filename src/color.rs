// ============================================================================
// COLOR UTILITIES — hex parsing, palette, straight-alpha src-over blending
// ============================================================================

use image::Rgba;

/// 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// The spray palette offered by the viewer.
pub const PALETTE: [(&str, Rgb); 7] = [
    ("#ff0000", [255, 0, 0]),
    ("#00ff00", [0, 255, 0]),
    ("#0000ff", [0, 0, 255]),
    ("#ffff00", [255, 255, 0]),
    ("#ff00ff", [255, 0, 255]),
    ("#ffffff", [255, 255, 255]),
    ("#000000", [0, 0, 0]),
];

/// Default spray colour (red).
pub const DEFAULT_COLOR: Rgb = [255, 0, 0];

/// Parse `#rrggbb`, `rrggbb` or the short `#rgb` form.
/// Returns `None` for anything else.
pub fn hex_to_rgb(hex: &str) -> Option<Rgb> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let expand = |i: usize| -> Option<u8> {
                let v = u8::from_str_radix(&digits[i..i + 1], 16).ok()?;
                Some(v * 17)
            };
            Some([expand(0)?, expand(1)?, expand(2)?])
        }
        _ => None,
    }
}

/// Format an RGB triple as lowercase `#rrggbb`.
pub fn rgb_to_hex(rgb: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Source-over blend of a solid colour with `alpha` (0..1) onto a
/// straight-alpha base pixel.
pub fn blend_over(base: Rgba<u8>, rgb: Rgb, alpha: f32) -> Rgba<u8> {
    blend_pixel(base, Rgba([rgb[0], rgb[1], rgb[2], 255]), alpha)
}

/// Source-over blend of `top` (scaled by `opacity`) onto `base`.
/// Both pixels use straight (non-premultiplied) alpha.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: nothing to draw
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: opaque top at full opacity overwrites
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * opacity.min(1.0);
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let tc = top[c] as f32;
        let bc = base[c] as f32;
        let v = (tc * top_a + bc * base_a * (1.0 - top_a)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb_long_form() {
        assert_eq!(hex_to_rgb("#ff0000"), Some([255, 0, 0]));
        assert_eq!(hex_to_rgb("00ff7f"), Some([0, 255, 127]));
        assert_eq!(hex_to_rgb("#FFFFFF"), Some([255, 255, 255]));
    }

    #[test]
    fn test_hex_to_rgb_short_form() {
        assert_eq!(hex_to_rgb("#f0a"), Some([255, 0, 170]));
    }

    #[test]
    fn test_hex_to_rgb_rejects_garbage() {
        assert_eq!(hex_to_rgb("#ff00"), None);
        assert_eq!(hex_to_rgb("#gg0000"), None);
        assert_eq!(hex_to_rgb(""), None);
    }

    #[test]
    fn test_palette_round_trips_through_hex() {
        for (hex, rgb) in PALETTE {
            assert_eq!(hex_to_rgb(hex), Some(rgb));
            assert_eq!(rgb_to_hex(rgb), hex);
        }
    }

    #[test]
    fn test_blend_onto_transparent_keeps_colour() {
        let out = blend_over(Rgba([0, 0, 0, 0]), [200, 100, 50], 0.5);
        assert_eq!(out[0], 200);
        assert_eq!(out[1], 100);
        assert_eq!(out[2], 50);
        assert!((out[3] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_blend_accumulates_alpha() {
        let once = blend_over(Rgba([0, 0, 0, 0]), [255, 0, 0], 0.3);
        let twice = blend_over(once, [255, 0, 0], 0.3);
        assert!(twice[3] > once[3]);
        assert_eq!(twice[0], 255);
    }

    #[test]
    fn test_zero_alpha_is_noop() {
        let base = Rgba([10, 20, 30, 40]);
        assert_eq!(blend_over(base, [255, 255, 255], 0.0), base);
        assert_eq!(blend_pixel(base, Rgba([1, 2, 3, 0]), 1.0), base);
    }
}
