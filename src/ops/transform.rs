// ============================================================================
// TRANSFORM OPERATIONS — rotate/scale an image onto a raster around a centre
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::color::blend_pixel;
use crate::geometry::PixelRect;

/// Placement of a source image on a destination raster: centre in
/// destination pixels, uniform scale, clockwise rotation in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub center: (f32, f32),
    pub scale: f32,
    pub rotation_deg: f32,
}

/// Destination-space bounding box of `src_w × src_h` drawn with `placement`,
/// clipped to `dst_w × dst_h`.
pub fn transformed_bounds(src_w: u32, src_h: u32, placement: Placement, dst_w: u32, dst_h: u32) -> Option<PixelRect> {
    let hw = src_w as f32 * placement.scale * 0.5;
    let hh = src_h as f32 * placement.scale * 0.5;
    let (s, c) = placement.rotation_deg.to_radians().sin_cos();
    // Half extents of the rotated box
    let ex = (hw * c).abs() + (hh * s).abs();
    let ey = (hw * s).abs() + (hh * c).abs();
    let (cx, cy) = placement.center;
    PixelRect::from_bounds(cx - ex - 1.0, cy - ey - 1.0, cx + ex + 1.0, cy + ey + 1.0, dst_w, dst_h)
}

/// Composite `src` onto `dst` (source-over) with the given placement,
/// touching only pixels inside `clip`.  Inverse-maps every destination pixel
/// into the source and samples bilinearly against a transparent border.
pub fn draw_transformed(dst: &mut RgbaImage, src: &RgbaImage, placement: Placement, clip: PixelRect) {
    if placement.scale.abs() < 1e-6 || src.width() == 0 || src.height() == 0 {
        return;
    }
    let Some(bounds) = transformed_bounds(src.width(), src.height(), placement, dst.width(), dst.height()) else {
        return;
    };
    let Some(region) = bounds.intersect(clip) else { return };

    let inv_scale = 1.0 / placement.scale;
    // Inverse rotation
    let (s, c) = (-placement.rotation_deg).to_radians().sin_cos();
    let (cx, cy) = placement.center;
    let half_w = src.width() as f32 * 0.5;
    let half_h = src.height() as f32 * 0.5;

    let row_bytes = dst.width() as usize * 4;
    let y0 = region.y0 as usize;
    let y1 = region.y1 as usize;
    let dst_raw: &mut [u8] = dst;

    dst_raw[y0 * row_bytes..y1 * row_bytes]
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(i, row)| {
            let ry = (y0 + i) as f32 + 0.5 - cy;
            for x in region.x0..region.x1 {
                let rx = x as f32 + 0.5 - cx;
                let sx = (rx * c - ry * s) * inv_scale + half_w - 0.5;
                let sy = (rx * s + ry * c) * inv_scale + half_h - 0.5;
                if sx < -1.0 || sy < -1.0 || sx > src.width() as f32 || sy > src.height() as f32 {
                    continue;
                }
                let top = bilinear_sample(src, sx, sy);
                if top[3] == 0 {
                    continue;
                }
                let px = x as usize * 4;
                let base = Rgba([row[px], row[px + 1], row[px + 2], row[px + 3]]);
                let out = blend_pixel(base, top, 1.0);
                row[px..px + 4].copy_from_slice(&out.0);
            }
        });
}

/// Bilinear interpolation sampling from an RgbaImage.
pub fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= img.width() as i32 || sy >= img.height() as i32 {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    // Weight colour by alpha so transparent neighbours don't darken edges
    let weights = [(1.0 - fx) * (1.0 - fy), fx * (1.0 - fy), (1.0 - fx) * fy, fx * fy];
    let taps = [tl, tr, bl, br];
    let mut alpha = 0.0;
    let mut rgb = [0.0f32; 3];
    for (tap, w) in taps.iter().zip(weights) {
        let a = tap[3] * w;
        alpha += a;
        for c in 0..3 {
            rgb[c] += tap[c] * a;
        }
    }
    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([
        (rgb[0] / alpha).round().clamp(0.0, 255.0) as u8,
        (rgb[1] / alpha).round().clamp(0.0, 255.0) as u8,
        (rgb[2] / alpha).round().clamp(0.0, 255.0) as u8,
        alpha.round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(c))
    }

    #[test]
    fn test_identity_placement_copies_pixels() {
        let src = solid(4, 4, [10, 200, 30, 255]);
        let mut dst = RgbaImage::new(16, 16);
        let placement = Placement { center: (8.0, 8.0), scale: 1.0, rotation_deg: 0.0 };
        draw_transformed(&mut dst, &src, placement, PixelRect::full(16, 16));
        assert_eq!(*dst.get_pixel(7, 7), Rgba([10, 200, 30, 255]));
        assert_eq!(*dst.get_pixel(6, 6), Rgba([10, 200, 30, 255]));
        assert_eq!(dst.get_pixel(2, 2)[3], 0);
        assert_eq!(dst.get_pixel(12, 12)[3], 0);
    }

    #[test]
    fn test_scale_grows_footprint() {
        let src = solid(4, 4, [255, 255, 255, 255]);
        let mut dst = RgbaImage::new(32, 32);
        let placement = Placement { center: (16.0, 16.0), scale: 2.0, rotation_deg: 0.0 };
        draw_transformed(&mut dst, &src, placement, PixelRect::full(32, 32));
        assert_eq!(dst.get_pixel(13, 16)[3], 255);
        assert_eq!(dst.get_pixel(18, 16)[3], 255);
        assert_eq!(dst.get_pixel(22, 16)[3], 0);
    }

    #[test]
    fn test_rotation_swaps_extents() {
        // A 10×2 bar rotated 90° becomes a 2×10 bar
        let src = solid(10, 2, [0, 0, 0, 255]);
        let mut dst = RgbaImage::new(20, 20);
        let placement = Placement { center: (10.0, 10.0), scale: 1.0, rotation_deg: 90.0 };
        draw_transformed(&mut dst, &src, placement, PixelRect::full(20, 20));
        assert_eq!(dst.get_pixel(10, 6)[3], 255);
        assert_eq!(dst.get_pixel(6, 10)[3], 0);
    }

    #[test]
    fn test_clip_limits_writes() {
        let src = solid(8, 8, [255, 0, 0, 255]);
        let mut dst = RgbaImage::new(16, 16);
        let placement = Placement { center: (8.0, 8.0), scale: 1.0, rotation_deg: 0.0 };
        let clip = PixelRect { x0: 0, y0: 0, x1: 8, y1: 16 };
        draw_transformed(&mut dst, &src, placement, clip);
        assert_eq!(dst.get_pixel(6, 8)[3], 255);
        assert_eq!(dst.get_pixel(9, 8)[3], 0);
    }

    #[test]
    fn test_bounds_of_rotated_square() {
        let placement = Placement { center: (50.0, 50.0), scale: 1.0, rotation_deg: 45.0 };
        let r = transformed_bounds(10, 10, placement, 100, 100).unwrap();
        // Diagonal half extent ≈ 7.07
        assert!(r.x0 <= 43 && r.x1 >= 57);
    }
}
