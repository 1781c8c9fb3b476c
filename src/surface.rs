// ============================================================================
// DECAL SURFACE — UV-addressed paint raster + the texture the scene samples
// ============================================================================
//
// Two rasters live here:
//   * `paint`   — brush strokes only.  Sticker redraws start from this.
//   * `texture` — paint + stickers (+ any live preview).  This is what the
//                 decal plane samples and what gets re-uploaded when dirty.
//
// Brush stamps write `paint` and queue the touched rect for recomposite; the
// render tick rebuilds that rect of `texture` and hands it out for upload.

use image::{Rgba, RgbaImage};

use crate::color::{Rgb, blend_over};
use crate::geometry::{PixelRect, Uv, union_opt};

/// Resolution used when the settings do not say otherwise.
pub const DEFAULT_SURFACE_SIZE: u32 = 1024;
/// Upper bound for a surface edge; larger requests are clamped.
pub const MAX_SURFACE_SIZE: u32 = 8192;

pub struct DecalSurface {
    width: u32,
    height: u32,
    paint: RgbaImage,
    texture: RgbaImage,
    /// Region of `paint` changed since the last recomposite.
    pending_rect: Option<PixelRect>,
    /// Region of `texture` that must be re-uploaded before the next frame.
    upload_rect: Option<PixelRect>,
    /// Bumped on every change; lets consumers detect stale copies.
    generation: u64,
}

impl DecalSurface {
    /// Allocate a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.clamp(1, MAX_SURFACE_SIZE);
        let height = height.clamp(1, MAX_SURFACE_SIZE);
        Self {
            width,
            height,
            paint: RgbaImage::new(width, height),
            texture: RgbaImage::new(width, height),
            pending_rect: None,
            upload_rect: Some(PixelRect::full(width, height)),
            generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn full_rect(&self) -> PixelRect {
        PixelRect::full(self.width, self.height)
    }

    /// `px = u·W, py = (1-v)·H`
    pub fn uv_to_pixel(&self, uv: Uv) -> (f32, f32) {
        (uv.u * self.width as f32, (1.0 - uv.v) * self.height as f32)
    }

    pub fn pixel_to_uv(&self, px: f32, py: f32) -> Uv {
        Uv::new(px / self.width as f32, 1.0 - py / self.height as f32)
    }

    /// Brush-only raster.
    pub fn paint(&self) -> &RgbaImage {
        &self.paint
    }

    /// Composited raster sampled by the decal plane.
    pub fn texture(&self) -> &RgbaImage {
        &self.texture
    }

    pub(crate) fn texture_mut(&mut self) -> &mut RgbaImage {
        &mut self.texture
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wipe brush strokes and the composited texture back to transparent.
    pub fn clear(&mut self) {
        for p in self.paint.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
        for p in self.texture.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
        self.pending_rect = None;
        self.mark_texture_dirty(self.full_rect());
    }

    // ---- dirty tracking -----------------------------------------------------

    /// Record that `rect` of the paint raster changed.  The texture for that
    /// region is rebuilt on the next render tick.
    pub fn mark_dirty(&mut self, rect: PixelRect) {
        if let Some(rect) = rect.intersect(self.full_rect()) {
            self.pending_rect = union_opt(self.pending_rect, rect);
            self.generation = self.generation.wrapping_add(1);
        }
    }

    /// Record that `rect` of the texture changed and must be re-uploaded.
    pub fn mark_texture_dirty(&mut self, rect: PixelRect) {
        if let Some(rect) = rect.intersect(self.full_rect()) {
            self.upload_rect = union_opt(self.upload_rect, rect);
            self.generation = self.generation.wrapping_add(1);
        }
    }

    /// Paint region awaiting recomposite, if any.  Clears the pending state.
    pub fn take_pending(&mut self) -> Option<PixelRect> {
        self.pending_rect.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_rect.is_some()
    }

    /// Texture region awaiting upload, if any.  Clears the upload state.
    pub fn take_upload(&mut self) -> Option<PixelRect> {
        self.upload_rect.take()
    }

    pub fn needs_upload(&self) -> bool {
        self.upload_rect.is_some()
    }

    /// Copy `rect` of the paint raster into the texture (the starting point
    /// of every recomposite).
    pub(crate) fn restore_paint_region(&mut self, rect: PixelRect) {
        let Some(rect) = rect.intersect(self.full_rect()) else { return };
        let stride = self.width as usize * 4;
        let x0 = rect.x0 as usize * 4;
        let x1 = rect.x1 as usize * 4;
        let paint = self.paint.as_raw();
        let texture: &mut [u8] = &mut self.texture;
        for y in rect.y0 as usize..rect.y1 as usize {
            let row = y * stride;
            texture[row + x0..row + x1].copy_from_slice(&paint[row + x0..row + x1]);
        }
    }

    // ---- raster primitives (paint raster) -----------------------------------

    /// Fill an anti-aliased circle centred at pixel `(cx, cy)` on the paint
    /// raster.  Everything outside the surface is clipped.
    /// Returns the touched rect, or `None` when nothing landed on the surface.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, rgb: Rgb, alpha: f32) -> Option<PixelRect> {
        if radius <= 0.0 || alpha <= 0.0 {
            return None;
        }
        let rect = PixelRect::from_bounds(
            cx - radius - 1.0,
            cy - radius - 1.0,
            cx + radius + 1.0,
            cy + radius + 1.0,
            self.width,
            self.height,
        )?;

        for y in rect.y0..rect.y1 {
            let dy = y as f32 + 0.5 - cy;
            for x in rect.x0..rect.x1 {
                let dx = x as f32 + 0.5 - cx;
                let dist = (dx * dx + dy * dy).sqrt();
                let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let p = self.paint.get_pixel_mut(x, y);
                *p = blend_over(*p, rgb, alpha * coverage);
            }
        }
        Some(rect)
    }

    /// Fill a vertical ellipse hanging below `(cx, top)`: `half_width` wide,
    /// `length` tall, alpha fading linearly from `alpha` at the top to 0 at
    /// the bottom.
    pub fn fill_drip(&mut self, cx: f32, top: f32, half_width: f32, length: f32, rgb: Rgb, alpha: f32) -> Option<PixelRect> {
        if half_width <= 0.0 || length <= 0.0 || alpha <= 0.0 {
            return None;
        }
        let half_len = length * 0.5;
        let cy = top + half_len;
        let rect = PixelRect::from_bounds(
            cx - half_width - 1.0,
            top - 1.0,
            cx + half_width + 1.0,
            top + length + 1.0,
            self.width,
            self.height,
        )?;

        for y in rect.y0..rect.y1 {
            let py = y as f32 + 0.5;
            let fade = 1.0 - ((py - top) / length).clamp(0.0, 1.0);
            if fade <= 0.0 {
                continue;
            }
            let ny = (py - cy) / half_len;
            for x in rect.x0..rect.x1 {
                let nx = (x as f32 + 0.5 - cx) / half_width;
                if nx * nx + ny * ny > 1.0 {
                    continue;
                }
                let p = self.paint.get_pixel_mut(x, y);
                *p = blend_over(*p, rgb, alpha * fade);
            }
        }
        Some(rect)
    }
}
