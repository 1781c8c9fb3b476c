// ============================================================================
// STICKER MANAGER — placed image overlays composited onto the decal texture
// ============================================================================
//
// Stickers live in insertion order; later ones draw on top and win hit tests.
// Every committed mutation flags a full redraw: the texture is rebuilt from
// the paint raster and every sticker is drawn again with its own transform.

use std::sync::Arc;

use image::RgbaImage;
use uuid::Uuid;

use crate::geometry::{PixelRect, Uv};
use crate::ops::transform::{Placement, draw_transformed};
use crate::surface::{DEFAULT_SURFACE_SIZE, DecalSurface};

pub type StickerId = Uuid;

pub const MIN_STICKER_SCALE: f32 = 0.2;
pub const MAX_STICKER_SCALE: f32 = 2.0;

/// Clamp a scale factor into the allowed range.  NaN falls back to 1.0.
pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_nan() { 1.0 } else { scale.clamp(MIN_STICKER_SCALE, MAX_STICKER_SCALE) }
}

/// Wrap degrees into `[0, 360)`.  NaN falls back to 0.
pub fn normalize_rotation(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    if r >= 360.0 { 0.0 } else { r }
}

#[derive(Clone)]
pub struct Sticker {
    pub id: StickerId,
    pub name: String,
    pub image: Arc<RgbaImage>,
    pub center: Uv,
    pub scale: f32,
    /// Clockwise, degrees, `[0, 360)`.
    pub rotation: f32,
}

impl Sticker {
    pub fn new(name: impl Into<String>, image: Arc<RgbaImage>, center: Uv) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            image,
            center,
            scale: 1.0,
            rotation: 0.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Half extents of the unrotated footprint in UV units.
    pub fn uv_half_extents(&self, surface_size: (u32, u32)) -> (f32, f32) {
        let (sw, sh) = surface_size;
        (
            self.width() as f32 * self.scale * 0.5 / sw.max(1) as f32,
            self.height() as f32 * self.scale * 0.5 / sh.max(1) as f32,
        )
    }

    /// Axis-aligned containment test; rotation is not considered.
    pub fn contains(&self, uv: Uv, surface_size: (u32, u32)) -> bool {
        let (hu, hv) = self.uv_half_extents(surface_size);
        (uv.u - self.center.u).abs() <= hu && (uv.v - self.center.v).abs() <= hv
    }

    fn placement(&self, surface: &DecalSurface) -> Placement {
        Placement {
            center: surface.uv_to_pixel(self.center),
            scale: self.scale,
            rotation_deg: self.rotation,
        }
    }

    fn draw(&self, surface: &mut DecalSurface, clip: PixelRect) {
        let placement = self.placement(surface);
        draw_transformed(surface.texture_mut(), &self.image, placement, clip);
    }
}

/// Uncommitted transform shown in place of a sticker's own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StickerPreview {
    pub id: StickerId,
    pub center: Uv,
    pub scale: f32,
    pub rotation: f32,
}

pub struct StickerManager {
    stickers: Vec<Sticker>,
    /// Sticker following the pointer before it is confirmed.
    pending: Option<Sticker>,
    selected: Option<StickerId>,
    preview: Option<StickerPreview>,
    last_uv: Uv,
    surface_size: (u32, u32),
    needs_redraw: bool,
}

impl Default for StickerManager {
    fn default() -> Self {
        Self::new((DEFAULT_SURFACE_SIZE, DEFAULT_SURFACE_SIZE))
    }
}

impl StickerManager {
    pub fn new(surface_size: (u32, u32)) -> Self {
        Self {
            stickers: Vec::new(),
            pending: None,
            selected: None,
            preview: None,
            last_uv: Uv::CENTER,
            surface_size,
            needs_redraw: false,
        }
    }

    pub fn set_surface_size(&mut self, size: (u32, u32)) {
        self.surface_size = size;
    }

    pub fn stickers(&self) -> &[Sticker] {
        &self.stickers
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }

    pub fn get(&self, id: StickerId) -> Option<&Sticker> {
        self.stickers.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: StickerId) -> Option<&mut Sticker> {
        self.stickers.iter_mut().find(|s| s.id == id)
    }

    // ---- placement ----------------------------------------------------------

    /// Start placing `image`; it hovers at the last known UV until confirmed.
    pub fn begin_placement(&mut self, name: impl Into<String>, image: Arc<RgbaImage>) {
        self.pending = Some(Sticker::new(name, image, self.last_uv));
        self.needs_redraw = true;
    }

    pub fn is_placing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&Sticker> {
        self.pending.as_ref()
    }

    /// Track the pointer while placing.
    pub fn update_pending(&mut self, uv: Uv) {
        self.last_uv = uv;
        if let Some(p) = &mut self.pending {
            p.center = uv;
            self.needs_redraw = true;
        }
    }

    /// Drop the pending sticker at `uv`.  The new sticker becomes the
    /// selection.  `None` when nothing was being placed.
    pub fn confirm_placement(&mut self, uv: Uv) -> Option<StickerId> {
        let mut sticker = self.pending.take()?;
        sticker.center = uv.clamped();
        let id = sticker.id;
        self.last_uv = sticker.center;
        self.stickers.push(sticker);
        self.selected = Some(id);
        self.needs_redraw = true;
        Some(id)
    }

    pub fn cancel_placement(&mut self) {
        if self.pending.take().is_some() {
            self.needs_redraw = true;
        }
    }

    // ---- selection ----------------------------------------------------------

    /// Topmost sticker whose footprint contains `uv`.
    pub fn hit_test(&self, uv: Uv) -> Option<StickerId> {
        self.stickers.iter().rev().find(|s| s.contains(uv, self.surface_size)).map(|s| s.id)
    }

    /// Select by id.  Returns false (and leaves the selection alone) for an
    /// unknown id.
    pub fn select(&mut self, id: StickerId) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<StickerId> {
        self.selected
    }

    pub fn selected_sticker(&self) -> Option<&Sticker> {
        self.selected.and_then(|id| self.get(id))
    }

    // ---- mutation -----------------------------------------------------------

    pub fn move_to(&mut self, id: StickerId, uv: Uv) {
        if let Some(s) = self.get_mut(id) {
            s.center = uv.clamped();
            self.last_uv = uv.clamped();
            self.needs_redraw = true;
        }
    }

    pub fn set_scale(&mut self, id: StickerId, scale: f32) {
        if let Some(s) = self.get_mut(id) {
            s.scale = clamp_scale(scale);
            self.needs_redraw = true;
        }
    }

    pub fn set_rotation(&mut self, id: StickerId, degrees: f32) {
        if let Some(s) = self.get_mut(id) {
            s.rotation = normalize_rotation(degrees);
            self.needs_redraw = true;
        }
    }

    /// Remove a sticker.  Clears the selection and preview that pointed at it.
    pub fn remove(&mut self, id: StickerId) -> bool {
        let before = self.stickers.len();
        self.stickers.retain(|s| s.id != id);
        if self.stickers.len() == before {
            return false;
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.preview.is_some_and(|p| p.id == id) {
            self.preview = None;
        }
        self.needs_redraw = true;
        true
    }

    /// Forget every sticker, the pending one and the selection.
    pub fn clear(&mut self) {
        let had_any = !self.stickers.is_empty() || self.pending.is_some() || self.preview.is_some();
        self.stickers.clear();
        self.pending = None;
        self.selected = None;
        self.preview = None;
        self.last_uv = Uv::CENTER;
        if had_any {
            self.needs_redraw = true;
        }
    }

    // ---- live preview -------------------------------------------------------

    /// Show `id` with a different transform without committing it.
    pub fn preview_transform(&mut self, id: StickerId, center: Uv, scale: f32, rotation: f32) {
        if self.get(id).is_none() {
            return;
        }
        self.preview = Some(StickerPreview {
            id,
            center: center.clamped(),
            scale: clamp_scale(scale),
            rotation: normalize_rotation(rotation),
        });
        self.needs_redraw = true;
    }

    pub fn preview(&self) -> Option<StickerPreview> {
        self.preview
    }

    /// Apply the previewed transform to its sticker.
    pub fn commit_preview(&mut self) -> bool {
        let Some(p) = self.preview.take() else { return false };
        let Some(s) = self.get_mut(p.id) else { return false };
        s.center = p.center;
        s.scale = p.scale;
        s.rotation = p.rotation;
        self.needs_redraw = true;
        true
    }

    pub fn cancel_preview(&mut self) {
        if self.preview.take().is_some() {
            self.needs_redraw = true;
        }
    }

    // ---- compositing --------------------------------------------------------

    /// True once after any change that needs `redraw_all`.
    pub fn take_needs_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Force a full redraw on the next tick (e.g. after the paint raster
    /// was wiped underneath the stickers).
    pub fn invalidate(&mut self) {
        self.needs_redraw = true;
    }

    /// Stickers as they should appear right now: preview overrides applied,
    /// the pending sticker last.
    fn visible(&self) -> impl Iterator<Item = Sticker> + '_ {
        self.stickers
            .iter()
            .map(|s| match self.preview {
                Some(p) if p.id == s.id => Sticker { center: p.center, scale: p.scale, rotation: p.rotation, ..s.clone() },
                _ => s.clone(),
            })
            .chain(self.pending.iter().cloned())
    }

    /// Rebuild the whole texture: paint snapshot, then every sticker.
    pub fn redraw_all(&mut self, surface: &mut DecalSurface) {
        self.surface_size = surface.size();
        let full = surface.full_rect();
        self.recomposite_region(surface, full);
        self.needs_redraw = false;
    }

    /// Rebuild `rect` of the texture from paint plus stickers clipped to it.
    pub fn recomposite_region(&self, surface: &mut DecalSurface, rect: PixelRect) {
        let Some(rect) = rect.intersect(surface.full_rect()) else { return };
        surface.restore_paint_region(rect);
        for sticker in self.visible() {
            sticker.draw(surface, rect);
        }
        surface.mark_texture_dirty(rect);
    }
}
