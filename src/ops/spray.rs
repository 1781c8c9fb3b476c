// ============================================================================
// SPRAY BRUSH — stochastic particle stamps and drips on the decal surface
// ============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::{DEFAULT_COLOR, Rgb};
use crate::geometry::{PixelRect, Uv, box_muller, union_opt};
use crate::surface::DecalSurface;

pub const MIN_BRUSH_SIZE: f32 = 2.0;
pub const MAX_BRUSH_SIZE: f32 = 30.0;
pub const DEFAULT_BRUSH_SIZE: f32 = 10.0;
pub const MIN_OPACITY: f32 = 0.1;
pub const MAX_OPACITY: f32 = 1.0;
pub const DEFAULT_OPACITY: f32 = 0.7;

/// Particles per stamp = floor(radius² · PARTICLE_DENSITY).
const PARTICLE_DENSITY: f32 = 1.6;
/// Particle alpha is drawn from [0, PARTICLE_ALPHA_SCALE · opacity).
const PARTICLE_ALPHA_SCALE: f32 = 0.3;
const PARTICLE_MIN_RADIUS: f32 = 1.0;
const PARTICLE_MAX_RADIUS: f32 = 4.0;
/// Stamps wider than this may leave a drip.
const DRIP_RADIUS_THRESHOLD: f32 = 7.5;
const DRIP_PROBABILITY: f64 = 0.3;
const DRIP_ALPHA_SCALE: f32 = 0.7;
/// Max pixel gap between interpolated stamps.
const STAMP_SPACING_PX: f32 = 5.0;

/// User-facing brush parameters.  Setters clamp to the slider ranges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    pub color: Rgb,
    /// Diameter in surface pixels.
    size: f32,
    /// 0.1..=1.0
    opacity: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR,
            size: DEFAULT_BRUSH_SIZE,
            opacity: DEFAULT_OPACITY,
        }
    }
}

impl BrushSettings {
    pub fn new(color: Rgb, size: f32, opacity: f32) -> Self {
        let mut s = Self { color, ..Self::default() };
        s.set_size(size);
        s.set_opacity(opacity);
        s
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn radius(&self) -> f32 {
        self.size * 0.5
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_size(&mut self, size: f32) {
        if size.is_finite() {
            self.size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
        }
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        if opacity.is_finite() {
            self.opacity = opacity.clamp(MIN_OPACITY, MAX_OPACITY);
        }
    }

    /// Opacity slider value in percent (10..=100).
    pub fn set_opacity_percent(&mut self, pct: f32) {
        self.set_opacity(pct / 100.0);
    }
}

/// One spray dot, in surface pixels.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub alpha: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum StrokeState {
    #[default]
    Idle,
    Drawing {
        last: Uv,
    },
}

pub struct SprayBrush {
    pub settings: BrushSettings,
    state: StrokeState,
    rng: StdRng,
    /// Total stamps applied; diagnostic only.
    stamp_count: u64,
}

impl SprayBrush {
    /// `seed = None` draws entropy from the OS.
    pub fn new(settings: BrushSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            state: StrokeState::Idle,
            rng,
            stamp_count: 0,
        }
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, StrokeState::Drawing { .. })
    }

    pub fn stamp_count(&self) -> u64 {
        self.stamp_count
    }

    // ---- stamping -----------------------------------------------------------

    /// Generate the particle cluster for one stamp centred at pixel `(cx, cy)`.
    pub fn generate_particles(&mut self, cx: f32, cy: f32, radius: f32, opacity: f32) -> Vec<Particle> {
        let count = (radius * radius * PARTICLE_DENSITY).floor().max(0.0) as usize;
        let max_alpha = PARTICLE_ALPHA_SCALE * opacity;
        (0..count)
            .map(|_| {
                let (dx, dy) = box_muller(&mut self.rng, radius);
                let size = self.rng.gen_range(PARTICLE_MIN_RADIUS..PARTICLE_MAX_RADIUS);
                let alpha = if max_alpha > 0.0 { self.rng.gen_range(0.0..max_alpha) } else { 0.0 };
                Particle { x: cx + dx, y: cy + dy, radius: size, alpha }
            })
            .collect()
    }

    /// Spray one stamp at `uv`.  Marks the touched region dirty on the surface.
    pub fn apply_stamp(&mut self, surface: &mut DecalSurface, uv: Uv, color: Rgb, radius: f32, opacity: f32) {
        if !(radius > 0.0 && opacity > 0.0) {
            return;
        }
        let (cx, cy) = surface.uv_to_pixel(uv);
        let mut touched: Option<PixelRect> = None;

        for p in self.generate_particles(cx, cy, radius, opacity) {
            if let Some(r) = surface.fill_circle(p.x, p.y, p.radius, color, p.alpha) {
                touched = union_opt(touched, r);
            }
        }

        if let Some((half_width, length)) = self.roll_drip(radius)
            && let Some(r) = surface.fill_drip(cx, cy, half_width, length, color, DRIP_ALPHA_SCALE * opacity)
        {
            touched = union_opt(touched, r);
        }

        self.stamp_count += 1;
        if let Some(rect) = touched {
            surface.mark_dirty(rect);
        }
    }

    /// `(half_width, length)` of the drip this stamp leaves, if any.
    /// Only stamps wider than the threshold can drip.
    fn roll_drip(&mut self, radius: f32) -> Option<(f32, f32)> {
        if radius <= DRIP_RADIUS_THRESHOLD || !self.rng.gen_bool(DRIP_PROBABILITY) {
            return None;
        }
        let length = self.rng.gen_range(20.0..70.0);
        let half_width = self.rng.gen_range(2.0..6.0);
        Some((half_width, length))
    }

    /// Stamp with the current settings.
    pub fn stamp(&mut self, surface: &mut DecalSurface, uv: Uv) {
        let s = self.settings;
        self.apply_stamp(surface, uv, s.color, s.radius(), s.opacity());
    }

    /// Fill the gap between two stamp points.  Endpoints are not stamped.
    /// Returns the number of intermediate stamps applied.
    pub fn interpolate(&mut self, surface: &mut DecalSurface, from: Uv, to: Uv) -> usize {
        let (fx, fy) = surface.uv_to_pixel(from);
        let (tx, ty) = surface.uv_to_pixel(to);
        let dist = ((tx - fx).powi(2) + (ty - fy).powi(2)).sqrt();
        if !(dist >= STAMP_SPACING_PX) {
            return 0;
        }
        let steps = (dist / STAMP_SPACING_PX).ceil() as usize;
        for i in 1..steps {
            let t = i as f32 / steps as f32;
            self.stamp(surface, from.lerp(to, t));
        }
        steps.saturating_sub(1)
    }

    // ---- stroke state machine -----------------------------------------------

    /// Pointer down.  Without a hit the brush stays idle.
    pub fn begin_stroke(&mut self, surface: &mut DecalSurface, hit: Option<Uv>) {
        let Some(uv) = hit else { return };
        self.stamp(surface, uv);
        self.state = StrokeState::Drawing { last: uv };
    }

    /// Pointer move while drawing.  Misses are skipped; the next hit joins
    /// up with the last one.
    pub fn continue_stroke(&mut self, surface: &mut DecalSurface, hit: Option<Uv>) {
        let StrokeState::Drawing { last } = self.state else { return };
        let Some(uv) = hit else { return };
        self.interpolate(surface, last, uv);
        self.stamp(surface, uv);
        self.state = StrokeState::Drawing { last: uv };
    }

    /// Pointer up / leave.
    pub fn end_stroke(&mut self) {
        self.state = StrokeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush() -> SprayBrush {
        SprayBrush::new(BrushSettings::default(), Some(42))
    }

    #[test]
    fn test_settings_clamp_to_slider_ranges() {
        let mut s = BrushSettings::default();
        s.set_size(100.0);
        assert_eq!(s.size(), MAX_BRUSH_SIZE);
        s.set_size(0.5);
        assert_eq!(s.size(), MIN_BRUSH_SIZE);
        s.set_opacity_percent(5.0);
        assert_eq!(s.opacity(), MIN_OPACITY);
        s.set_opacity_percent(70.0);
        assert!((s.opacity() - 0.7).abs() < 1e-6);
        s.set_size(f32::NAN);
        assert_eq!(s.size(), MIN_BRUSH_SIZE);
    }

    #[test]
    fn test_particle_count_and_ranges() {
        let mut b = brush();
        let particles = b.generate_particles(100.0, 100.0, 6.0, 1.0);
        assert_eq!(particles.len(), (36.0f32 * PARTICLE_DENSITY).floor() as usize);
        for p in &particles {
            assert!(p.radius >= 1.0 && p.radius < 4.0);
            assert!(p.alpha >= 0.0 && p.alpha < 0.3);
        }
    }

    #[test]
    fn test_stamp_near_corner_is_local() {
        let mut s = DecalSurface::new(1024, 1024);
        let mut b = brush();
        b.apply_stamp(&mut s, Uv::new(0.1, 0.1), [255, 0, 0], 6.0, 1.0);

        let (cx, cy) = s.uv_to_pixel(Uv::new(0.1, 0.1));
        let mut near = 0u32;
        for (x, y, p) in s.paint().enumerate_pixels() {
            if p[3] == 0 {
                continue;
            }
            let d = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
            assert!(d < 80.0, "paint at ({}, {}) is {} px from the stamp", x, y, d);
            if d < 20.0 {
                near += 1;
            }
        }
        assert!(near > 0);
        assert!(s.has_pending());
    }

    #[test]
    fn test_stamps_never_escape_surface() {
        let mut s = DecalSurface::new(64, 64);
        let mut b = brush();
        for &(u, v) in &[(0.0, 0.0), (1.0, 1.0), (0.0, 1.0), (1.0, 0.0), (0.5, 0.5)] {
            b.apply_stamp(&mut s, Uv::new(u, v), [0, 0, 255], 15.0, 1.0);
        }
        assert_eq!(s.paint().dimensions(), (64, 64));
        let pending = s.take_pending().unwrap();
        assert!(pending.x1 <= 64 && pending.y1 <= 64);
    }

    #[test]
    fn test_interpolate_same_point_is_noop() {
        let mut s = DecalSurface::new(256, 256);
        let mut b = brush();
        let p = Uv::new(0.4, 0.4);
        assert_eq!(b.interpolate(&mut s, p, p), 0);
        assert_eq!(b.stamp_count(), 0);
        assert!(s.paint().pixels().all(|px| px[3] == 0));
    }

    #[test]
    fn test_interpolate_fills_long_gaps() {
        let mut s = DecalSurface::new(1000, 1000);
        let mut b = brush();
        // 250 px apart → 50 steps → 49 intermediate stamps
        let n = b.interpolate(&mut s, Uv::new(0.25, 0.5), Uv::new(0.5, 0.5));
        assert_eq!(n, 49);
        assert_eq!(b.stamp_count(), 49);
    }

    #[test]
    fn test_stroke_state_machine() {
        let mut s = DecalSurface::new(128, 128);
        let mut b = brush();

        b.begin_stroke(&mut s, None);
        assert_eq!(b.state(), StrokeState::Idle);

        b.continue_stroke(&mut s, Some(Uv::new(0.5, 0.5)));
        assert_eq!(b.stamp_count(), 0, "moving while idle must not paint");

        b.begin_stroke(&mut s, Some(Uv::new(0.2, 0.2)));
        assert!(b.is_drawing());
        b.continue_stroke(&mut s, None);
        assert_eq!(b.state(), StrokeState::Drawing { last: Uv::new(0.2, 0.2) });
        b.continue_stroke(&mut s, Some(Uv::new(0.8, 0.8)));
        assert_eq!(b.state(), StrokeState::Drawing { last: Uv::new(0.8, 0.8) });
        assert!(b.stamp_count() > 2);

        b.end_stroke();
        assert_eq!(b.state(), StrokeState::Idle);
    }

    #[test]
    fn test_same_seed_same_pixels() {
        let mut a = DecalSurface::new(128, 128);
        let mut b = DecalSurface::new(128, 128);
        let mut ba = SprayBrush::new(BrushSettings::default(), Some(9));
        let mut bb = SprayBrush::new(BrushSettings::default(), Some(9));
        ba.stamp(&mut a, Uv::new(0.5, 0.5));
        bb.stamp(&mut b, Uv::new(0.5, 0.5));
        assert_eq!(a.paint().as_raw(), b.paint().as_raw());
    }

    #[test]
    fn test_small_brush_never_drips() {
        for seed in 0..20 {
            let mut b = SprayBrush::new(BrushSettings::default(), Some(seed));
            for _ in 0..50 {
                assert!(b.roll_drip(DRIP_RADIUS_THRESHOLD).is_none());
                assert!(b.roll_drip(3.0).is_none());
            }
        }
    }

    #[test]
    fn test_wide_brush_drips_sometimes() {
        let mut b = brush();
        let rolls: Vec<_> = (0..200).map(|_| b.roll_drip(15.0)).collect();
        let drips: Vec<_> = rolls.iter().flatten().collect();
        assert!(!drips.is_empty());
        assert!(drips.len() < rolls.len());
        for &&(half_width, length) in &drips {
            assert!((2.0..6.0).contains(&half_width));
            assert!((20.0..70.0).contains(&length));
        }
    }
}
