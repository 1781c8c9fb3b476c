// ============================================================================
// GEOMETRY UTILITIES — UV points, pixel rects, Gaussian sampling
// ============================================================================

use rand::Rng;

/// A point in normalised surface space, `[0,1]×[0,1]`.
/// `u` runs left→right, `v` runs bottom→top.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
}

impl Uv {
    pub const CENTER: Uv = Uv { u: 0.5, v: 0.5 };

    pub fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }

    /// Clamp both coordinates into `[0,1]`.
    pub fn clamped(self) -> Self {
        Self {
            u: self.u.clamp(0.0, 1.0),
            v: self.v.clamp(0.0, 1.0),
        }
    }

    pub fn is_inside(self) -> bool {
        (0.0..=1.0).contains(&self.u) && (0.0..=1.0).contains(&self.v)
    }

    pub fn distance(self, other: Uv) -> f32 {
        let du = other.u - self.u;
        let dv = other.v - self.v;
        (du * du + dv * dv).sqrt()
    }

    /// Linear interpolation, `t = 0` → `self`, `t = 1` → `other`.
    pub fn lerp(self, other: Uv, t: f32) -> Uv {
        Uv {
            u: self.u + (other.u - self.u) * t,
            v: self.v + (other.v - self.v) * t,
        }
    }
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x0: 0, y0: 0, x1: width, y1: height }
    }

    /// Bounding box of a float-space region, clipped to a `width × height`
    /// raster. Returns `None` when nothing of the region lies inside.
    pub fn from_bounds(
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let x0 = min_x.floor().max(0.0);
        let y0 = min_y.floor().max(0.0);
        let x1 = max_x.ceil().min(width as f32);
        let y1 = max_y.ceil().min(height as f32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Self {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn union(self, other: PixelRect) -> PixelRect {
        PixelRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn intersect(self, other: PixelRect) -> Option<PixelRect> {
        let r = PixelRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if r.x0 >= r.x1 || r.y0 >= r.y1 { None } else { Some(r) }
    }
}

/// Merge `rect` into an optional accumulator.
pub fn union_opt(acc: Option<PixelRect>, rect: PixelRect) -> Option<PixelRect> {
    Some(match acc {
        Some(existing) => existing.union(rect),
        None => rect,
    })
}

/// Uniform sample in the open interval (0, 1); exact zeros are resampled.
fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let x: f64 = rng.gen_range(0.0..1.0);
        if x > 0.0 {
            return x;
        }
    }
}

/// Box–Muller polar displacement with scale `radius`:
/// `r = radius·sqrt(-2·ln(u1))`, `θ = 2π·u2`.
pub fn box_muller<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> (f32, f32) {
    let u1 = open_unit(rng);
    let u2 = open_unit(rng);
    let r = radius as f64 * (-2.0 * u1.ln()).sqrt();
    let theta = std::f64::consts::TAU * u2;
    ((r * theta.cos()) as f32, (r * theta.sin()) as f32)
}
