// ============================================================================
// SESSION — view switching, mode, pointer dispatch, render tick, export
// ============================================================================
//
// The session owns everything mutable: the live decal surface, the sticker
// list, the brush, the camera and the asset cache.  Pointer handlers mutate
// synchronously; `tick` is the only place the texture is recomposited.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::assets::AssetLoader;
use crate::color::hex_to_rgb;
use crate::geometry::Uv;
use crate::io::{ExportError, encode_and_write, export_file_name};
use crate::ops::spray::{BrushSettings, SprayBrush};
use crate::ops::stickers::{StickerId, StickerManager, clamp_scale};
use crate::scene::camera::OrbitCamera;
use crate::scene::ray::{ViewportRect, screen_to_uv};
use crate::scene::{Scene, ScenePlane};
use crate::settings::ViewerSettings;
use crate::surface::DecalSurface;
use crate::{log_err, log_info};

const CURB_KEY: &str = "curb";

fn view_key(name: &str) -> String {
    format!("view:{}", name)
}

fn sticker_key(name: &str) -> String {
    format!("sticker:{}", name)
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Pointer drags orbit the camera.
    #[default]
    None,
    /// Pointer drags spray paint.
    Paint,
    /// Pointer places, selects and drags stickers.
    Sticker,
}

impl Mode {
    pub fn parse(name: &str) -> Option<Mode> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "view" | "orbit" => Some(Mode::None),
            "paint" | "draw" | "spray" => Some(Mode::Paint),
            "sticker" | "stickers" => Some(Mode::Sticker),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::None => "none",
            Mode::Paint => "paint",
            Mode::Sticker => "sticker",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Leave,
}

/// Pointer or touch event in client coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, x: f32, y: f32) -> Self {
        Self { kind, x, y }
    }
}

/// One car photo the viewer can switch to.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewSpec {
    pub name: String,
    /// `None` when the image was handed over already decoded.
    pub path: Option<PathBuf>,
}

/// Transient message shown to the user, e.g. after a failed export.
#[derive(Clone, Debug)]
pub struct Notice {
    pub message: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Drag {
    Idle,
    Orbit { last_x: f32, last_y: f32 },
    Sticker { id: StickerId, offset: (f32, f32) },
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    id: Uuid,
    settings: ViewerSettings,
    views: Vec<ViewSpec>,
    current: usize,
    /// Set once a view has been shown; the surface exists from then on.
    showing: bool,
    mode: Mode,
    brush: SprayBrush,
    stickers: StickerManager,
    surface: Option<DecalSurface>,
    orbit: OrbitCamera,
    viewport: ViewportRect,
    scene: Scene,
    assets: AssetLoader,
    notice: Option<Notice>,
    drag: Drag,
}

impl Session {
    pub fn new(settings: ViewerSettings) -> Self {
        let brush = SprayBrush::new(
            BrushSettings::new(settings.brush_color, settings.brush_size, settings.brush_opacity),
            settings.seed,
        );
        let size = settings.surface_size;
        let frame = settings.frame_size as f32;
        let bg = settings.background;
        let id = Uuid::new_v4();
        log_info!("Session {} created (surface {}x{})", id, size, size);
        let mut orbit = OrbitCamera::default();
        orbit.aspect = 1.0;
        Self {
            id,
            settings,
            views: Vec::new(),
            current: 0,
            showing: false,
            mode: Mode::None,
            brush,
            stickers: StickerManager::new((size, size)),
            surface: None,
            orbit,
            viewport: ViewportRect::new(frame, frame),
            scene: Scene { background: Rgba([bg[0], bg[1], bg[2], 255]), ..Scene::default() },
            assets: AssetLoader::new(),
            notice: None,
            drag: Drag::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    // ---- accessors ----------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn brush(&self) -> &SprayBrush {
        &self.brush
    }

    pub fn stickers(&self) -> &StickerManager {
        &self.stickers
    }

    pub fn surface(&self) -> Option<&DecalSurface> {
        self.surface.as_ref()
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.orbit
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn assets(&self) -> &AssetLoader {
        &self.assets
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportRect) {
        self.viewport = viewport;
        self.orbit.aspect = viewport.aspect();
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    // ---- assets & views -----------------------------------------------------

    /// Register a view backed by a file; decoding happens in the background.
    pub fn add_view(&mut self, name: &str, path: PathBuf) {
        self.assets.request(&view_key(name), path.clone());
        self.views.push(ViewSpec { name: name.to_string(), path: Some(path) });
    }

    /// Register a view from an already decoded image.
    pub fn add_view_image(&mut self, name: &str, image: RgbaImage) {
        self.assets.cache_mut().insert(&view_key(name), image);
        self.views.push(ViewSpec { name: name.to_string(), path: None });
    }

    pub fn set_curb(&mut self, path: PathBuf) {
        self.assets.request(CURB_KEY, path);
    }

    pub fn set_curb_image(&mut self, image: RgbaImage) {
        let image = self.assets.cache_mut().insert(CURB_KEY, image);
        self.scene.curb = Some(ScenePlane::curb(image));
    }

    pub fn add_sticker(&mut self, name: &str, path: PathBuf) {
        self.assets.request(&sticker_key(name), path);
    }

    pub fn add_sticker_image(&mut self, name: &str, image: RgbaImage) {
        self.assets.cache_mut().insert(&sticker_key(name), image);
    }

    pub fn has_sticker(&self, name: &str) -> bool {
        self.assets.cache().contains(&sticker_key(name))
    }

    pub fn views(&self) -> &[ViewSpec] {
        &self.views
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_view(&self) -> Option<&ViewSpec> {
        if self.showing { self.views.get(self.current) } else { None }
    }

    pub fn view_name(&self) -> Option<&str> {
        self.current_view().map(|v| v.name.as_str())
    }

    /// Whether the car photo of the displayed view has arrived.
    pub fn car_loaded(&self) -> bool {
        self.scene.car.is_some()
    }

    /// Display view `index`: fresh surface, no stickers, camera untouched.
    pub fn show_view(&mut self, index: usize) {
        let Some(view) = self.views.get(index) else { return };
        let name = view.name.clone();
        let path = view.path.clone();

        if self.showing
            && let Some(prev) = self.views.get(self.current)
        {
            let prev_key = view_key(&prev.name);
            if index != self.current && !self.assets.cache().contains(&prev_key) {
                self.assets.cancel(&prev_key);
            }
        }

        self.brush.end_stroke();
        self.drag = Drag::Idle;
        self.stickers.clear();
        self.stickers.take_needs_redraw();
        let size = self.settings.surface_size;
        let surface = DecalSurface::new(size, size);
        self.stickers.set_surface_size(surface.size());
        self.surface = Some(surface);
        self.scene.car = None;
        self.current = index;
        self.showing = true;
        log_info!("Showing view {} '{}'", index, name);

        // A load cancelled by an earlier switch (or one that failed) is retried
        let key = view_key(&name);
        if let Some(path) = path
            && !self.assets.cache().contains(&key)
            && !self.assets.is_loading(&key)
        {
            self.assets.request(&key, path);
        }
        self.attach_current_car();
    }

    pub fn next_view(&mut self) {
        if self.views.is_empty() {
            return;
        }
        let next = if self.showing { (self.current + 1) % self.views.len() } else { 0 };
        self.show_view(next);
    }

    pub fn prev_view(&mut self) {
        if self.views.is_empty() {
            return;
        }
        let n = self.views.len();
        let prev = if self.showing { (self.current + n - 1) % n } else { 0 };
        self.show_view(prev);
    }

    fn attach_current_car(&mut self) {
        let Some(view) = self.current_view() else { return };
        if let Some(img) = self.assets.get(&view_key(&view.name)) {
            self.scene.car = Some(ScenePlane::car(img));
        }
    }

    fn on_asset_ready(&mut self, key: &str) {
        if key == CURB_KEY {
            self.scene.curb = self.assets.get(CURB_KEY).map(ScenePlane::curb);
        } else if self.scene.car.is_none()
            && let Some(view) = self.current_view()
            && key == view_key(&view.name)
        {
            self.attach_current_car();
        }
    }

    /// Drain background loads and hook up anything the scene is waiting on.
    pub fn poll_assets(&mut self) {
        for key in self.assets.poll() {
            self.on_asset_ready(&key);
        }
    }

    /// Block until every requested asset has loaded or failed.
    pub fn wait_for_assets(&mut self) {
        for key in self.assets.wait_all() {
            self.on_asset_ready(&key);
        }
    }

    // ---- mode & pointer -----------------------------------------------------

    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        match self.mode {
            Mode::Paint => self.brush.end_stroke(),
            Mode::Sticker => {
                self.stickers.cancel_placement();
                self.stickers.commit_preview();
            }
            Mode::None => {}
        }
        self.drag = Drag::Idle;
        self.mode = mode;
        log_info!("Mode -> {}", mode.label());
    }

    /// Screen → UV on the paint plane.  `None` when nothing is displayed
    /// or the pointer misses the car.
    pub fn screen_to_uv(&self, x: f32, y: f32) -> Option<Uv> {
        let plane = self.scene.paint_plane()?;
        screen_to_uv(x, y, &self.viewport, &self.orbit.camera(), &plane)
    }

    pub fn handle_pointer(&mut self, ev: PointerEvent) {
        match self.mode {
            Mode::None => self.pointer_orbit(ev),
            Mode::Paint => self.pointer_paint(ev),
            Mode::Sticker => self.pointer_sticker(ev),
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.handle_pointer(PointerEvent::new(PointerKind::Down, x, y));
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.handle_pointer(PointerEvent::new(PointerKind::Move, x, y));
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) {
        self.handle_pointer(PointerEvent::new(PointerKind::Up, x, y));
    }

    pub fn pointer_leave(&mut self) {
        self.handle_pointer(PointerEvent::new(PointerKind::Leave, 0.0, 0.0));
    }

    fn pointer_orbit(&mut self, ev: PointerEvent) {
        match (ev.kind, self.drag) {
            (PointerKind::Down, _) => self.drag = Drag::Orbit { last_x: ev.x, last_y: ev.y },
            (PointerKind::Move, Drag::Orbit { last_x, last_y }) => {
                self.orbit.rotate(ev.x - last_x, ev.y - last_y, self.viewport.height);
                self.drag = Drag::Orbit { last_x: ev.x, last_y: ev.y };
            }
            (PointerKind::Up | PointerKind::Leave, _) => self.drag = Drag::Idle,
            _ => {}
        }
    }

    fn pointer_paint(&mut self, ev: PointerEvent) {
        if matches!(ev.kind, PointerKind::Up | PointerKind::Leave) {
            self.brush.end_stroke();
            return;
        }
        let hit = self.screen_to_uv(ev.x, ev.y);
        let Some(surface) = self.surface.as_mut() else { return };
        match ev.kind {
            PointerKind::Down => self.brush.begin_stroke(surface, hit),
            PointerKind::Move => self.brush.continue_stroke(surface, hit),
            _ => {}
        }
    }

    fn pointer_sticker(&mut self, ev: PointerEvent) {
        let hit = match ev.kind {
            PointerKind::Down | PointerKind::Move => self.screen_to_uv(ev.x, ev.y),
            _ => None,
        };
        match ev.kind {
            PointerKind::Down => {
                let Some(uv) = hit else { return };
                if self.stickers.is_placing() {
                    self.stickers.confirm_placement(uv);
                } else if let Some(id) = self.stickers.hit_test(uv) {
                    self.stickers.select(id);
                    if let Some(s) = self.stickers.get(id) {
                        self.drag = Drag::Sticker { id, offset: (s.center.u - uv.u, s.center.v - uv.v) };
                    }
                } else {
                    self.stickers.deselect();
                }
            }
            PointerKind::Move => {
                let Some(uv) = hit else { return };
                if self.stickers.is_placing() {
                    self.stickers.update_pending(uv);
                } else if let Drag::Sticker { id, offset } = self.drag
                    && let Some(s) = self.stickers.get(id)
                {
                    let (scale, rotation) = (s.scale, s.rotation);
                    let center = Uv::new(uv.u + offset.0, uv.v + offset.1);
                    self.stickers.preview_transform(id, center, scale, rotation);
                }
            }
            PointerKind::Up | PointerKind::Leave => {
                if matches!(self.drag, Drag::Sticker { .. }) {
                    self.stickers.commit_preview();
                }
                self.drag = Drag::Idle;
            }
        }
    }

    // ---- brush --------------------------------------------------------------

    pub fn set_brush_color(&mut self, hex: &str) -> bool {
        match hex_to_rgb(hex) {
            Some(rgb) => {
                self.brush.settings.color = rgb;
                true
            }
            None => false,
        }
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.brush.settings.set_size(size);
    }

    pub fn set_brush_opacity_percent(&mut self, pct: f32) {
        self.brush.settings.set_opacity_percent(pct);
    }

    /// One stamp at `uv` with the current brush.
    pub fn spray_at(&mut self, uv: Uv) {
        if let Some(surface) = self.surface.as_mut() {
            self.brush.stamp(surface, uv);
        }
    }

    /// A complete stroke from `a` to `b`.
    pub fn stroke(&mut self, a: Uv, b: Uv) {
        let Some(surface) = self.surface.as_mut() else { return };
        self.brush.begin_stroke(surface, Some(a));
        self.brush.continue_stroke(surface, Some(b));
        self.brush.end_stroke();
    }

    /// Wipe brush strokes; stickers stay.
    pub fn clear_paint(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
            self.stickers.invalidate();
        }
    }

    // ---- stickers -----------------------------------------------------------

    /// Arm placement of a loaded sticker; the next pointer down in sticker
    /// mode drops it.
    pub fn begin_sticker_placement(&mut self, name: &str) -> bool {
        let Some(image) = self.assets.get(&sticker_key(name)) else { return false };
        self.stickers.begin_placement(name, image);
        true
    }

    /// Place a loaded sticker directly at `uv`.
    pub fn place_sticker(&mut self, name: &str, uv: Uv) -> Option<StickerId> {
        if self.surface.is_none() {
            return None;
        }
        let image: Arc<RgbaImage> = self.assets.get(&sticker_key(name))?;
        self.stickers.begin_placement(name, image);
        self.stickers.confirm_placement(uv)
    }

    pub fn select_at(&mut self, uv: Uv) -> Option<StickerId> {
        match self.stickers.hit_test(uv) {
            Some(id) => {
                self.stickers.select(id);
                Some(id)
            }
            None => {
                self.stickers.deselect();
                None
            }
        }
    }

    pub fn move_selected(&mut self, uv: Uv) {
        if let Some(id) = self.stickers.selected() {
            self.stickers.move_to(id, uv);
        }
    }

    pub fn set_selected_scale_percent(&mut self, pct: f32) {
        if let Some(id) = self.stickers.selected() {
            self.stickers.set_scale(id, pct / 100.0);
        }
    }

    pub fn set_selected_rotation(&mut self, deg: f32) {
        if let Some(id) = self.stickers.selected() {
            self.stickers.set_rotation(id, deg);
        }
    }

    /// Slider drag: preview the selected sticker at a new scale.
    pub fn adjust_selected_scale_percent(&mut self, pct: f32) {
        let Some(s) = self.stickers.selected_sticker() else { return };
        let (id, center, rotation) = (s.id, s.center, s.rotation);
        let base = self.stickers.preview().filter(|p| p.id == id);
        let center = base.map_or(center, |p| p.center);
        let rotation = base.map_or(rotation, |p| p.rotation);
        self.stickers.preview_transform(id, center, clamp_scale(pct / 100.0), rotation);
    }

    /// Slider drag: preview the selected sticker at a new rotation.
    pub fn adjust_selected_rotation(&mut self, deg: f32) {
        let Some(s) = self.stickers.selected_sticker() else { return };
        let (id, center, scale) = (s.id, s.center, s.scale);
        let base = self.stickers.preview().filter(|p| p.id == id);
        let center = base.map_or(center, |p| p.center);
        let scale = base.map_or(scale, |p| p.scale);
        self.stickers.preview_transform(id, center, scale, deg);
    }

    /// Slider released: commit whatever is being previewed.
    pub fn end_adjust(&mut self) {
        self.stickers.commit_preview();
    }

    pub fn remove_selected(&mut self) -> bool {
        match self.stickers.selected() {
            Some(id) => self.stickers.remove(id),
            None => false,
        }
    }

    pub fn sticker_count(&self) -> usize {
        self.stickers.len()
    }

    // ---- camera -------------------------------------------------------------

    pub fn reset_camera(&mut self) {
        self.orbit.reset();
    }

    pub fn orbit_by(&mut self, dx: f32, dy: f32) {
        self.orbit.rotate(dx, dy, self.viewport.height);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.orbit.zoom(factor);
    }

    // ---- frame --------------------------------------------------------------

    /// Per-frame housekeeping: drain loads, expire notices, bring the
    /// texture up to date.  Returns the texture region needing upload.
    pub fn tick(&mut self, now: Instant) -> Option<crate::geometry::PixelRect> {
        self.poll_assets();
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notice = None;
        }
        let surface = self.surface.as_mut()?;
        let pending = surface.take_pending();
        if self.stickers.take_needs_redraw() {
            self.stickers.redraw_all(surface);
        } else if let Some(rect) = pending {
            self.stickers.recomposite_region(surface, rect);
        }
        surface.take_upload()
    }

    /// Bring everything up to date and ray-cast the current frame.
    pub fn render_frame(&mut self) -> RgbaImage {
        self.tick(Instant::now());
        let w = self.viewport.width.round().max(1.0) as u32;
        let h = self.viewport.height.round().max(1.0) as u32;
        self.scene.render(&self.orbit.camera(), self.surface.as_ref(), w, h)
    }

    // ---- export -------------------------------------------------------------

    /// Render and write `car-<view>.png` into `dir`.
    pub fn export(&mut self, dir: &Path) -> Result<PathBuf, ExportError> {
        let name = self.view_name().ok_or(ExportError::NothingToExport)?.to_string();
        let path = dir.join(export_file_name(&name));
        self.export_to(&path)?;
        Ok(path)
    }

    /// Render and write the current frame to an explicit path.
    pub fn export_to(&mut self, path: &Path) -> Result<(), ExportError> {
        if !self.car_loaded() {
            return Err(ExportError::NothingToExport);
        }
        let frame = self.render_frame();
        encode_and_write(&frame, path)?;
        log_info!("Exported {}", path.display());
        Ok(())
    }

    /// Export; on failure log it and raise a notice instead of erroring.
    pub fn export_or_notify(&mut self, dir: &Path) -> Option<PathBuf> {
        match self.export(dir) {
            Ok(p) => Some(p),
            Err(e) => {
                log_err!("Export failed: {}", e);
                self.notify(format!("Error exporting image: {}", e), Instant::now());
                None
            }
        }
    }

    pub fn notify(&mut self, message: String, now: Instant) {
        let ttl = Duration::from_secs_f32(self.settings.notice_seconds.max(0.0));
        self.notice = Some(Notice { message, expires_at: now + ttl });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ViewerSettings {
        ViewerSettings { surface_size: 128, frame_size: 200, seed: Some(3), ..ViewerSettings::default() }
    }

    fn car() -> RgbaImage {
        RgbaImage::from_pixel(30, 20, Rgba([40, 40, 40, 255]))
    }

    fn session_with_views() -> Session {
        let mut s = Session::new(settings());
        s.add_view_image("right", car());
        s.add_view_image("back", car());
        s.show_view(0);
        s
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse("Paint"), Some(Mode::Paint));
        assert_eq!(Mode::parse("sticker"), Some(Mode::Sticker));
        assert_eq!(Mode::parse("none"), Some(Mode::None));
        assert_eq!(Mode::parse("erase"), None);
    }

    #[test]
    fn test_view_navigation_wraps() {
        let mut s = session_with_views();
        assert_eq!(s.view_name(), Some("right"));
        s.next_view();
        assert_eq!(s.view_name(), Some("back"));
        s.next_view();
        assert_eq!(s.view_name(), Some("right"));
        s.prev_view();
        assert_eq!(s.view_name(), Some("back"));
    }

    #[test]
    fn test_paint_drag_marks_surface() {
        let mut s = session_with_views();
        s.set_mode(Mode::Paint);
        s.pointer_down(100.0, 100.0);
        s.pointer_move(110.0, 100.0);
        s.pointer_up(110.0, 100.0);
        assert!(!s.brush().is_drawing());
        assert!(s.brush().stamp_count() >= 2);
        s.tick(Instant::now());
        assert!(s.surface().unwrap().texture().pixels().any(|p| p[3] > 0));
    }

    #[test]
    fn test_pointer_miss_is_noop() {
        let mut s = session_with_views();
        s.set_mode(Mode::Paint);
        s.pointer_down(1.0, 1.0);
        assert!(!s.brush().is_drawing());
        assert_eq!(s.brush().stamp_count(), 0);
    }

    #[test]
    fn test_orbit_only_in_none_mode() {
        let mut s = session_with_views();
        s.pointer_down(100.0, 100.0);
        s.pointer_move(150.0, 100.0);
        assert!(s.camera().azimuth() != 0.0);
        s.reset_camera();
        s.set_mode(Mode::Paint);
        s.pointer_down(100.0, 100.0);
        s.pointer_move(150.0, 100.0);
        assert_eq!(s.camera().azimuth(), 0.0);
    }

    #[test]
    fn test_view_switch_drops_stickers() {
        let mut s = session_with_views();
        s.add_sticker_image("star", RgbaImage::from_pixel(10, 10, Rgba([255, 255, 0, 255])));
        let id = s.place_sticker("star", Uv::new(0.3, 0.3));
        assert!(id.is_some());
        assert_eq!(s.stickers().hit_test(Uv::new(0.3, 0.3)), id);
        s.next_view();
        assert_eq!(s.sticker_count(), 0);
        assert!(s.stickers().hit_test(Uv::new(0.3, 0.3)).is_none());
    }

    #[test]
    fn test_returning_to_a_view_reloads_a_cancelled_photo() {
        let dir = tempfile::tempdir().unwrap();
        let right = dir.path().join("right.png");
        let back = dir.path().join("back.png");
        car().save(&right).unwrap();
        car().save(&back).unwrap();

        let mut s = Session::new(settings());
        s.add_view("right", right);
        s.add_view("back", back);
        s.show_view(0);
        // Leave before the photo has been drained, then come straight back
        s.next_view();
        s.prev_view();
        s.wait_for_assets();
        assert_eq!(s.view_name(), Some("right"));
        assert!(s.car_loaded());
    }

    #[test]
    fn test_sticker_drag_commits_on_release() {
        let mut s = session_with_views();
        s.add_sticker_image("dot", RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255])));
        s.set_mode(Mode::Sticker);
        assert!(s.begin_sticker_placement("dot"));
        s.pointer_move(100.0, 100.0);
        s.pointer_down(100.0, 100.0);
        let id = s.stickers().selected().unwrap();
        let start = s.stickers().get(id).unwrap().center;

        s.pointer_down(100.0, 100.0);
        s.pointer_move(120.0, 100.0);
        // Still committed at the start while dragging
        assert_eq!(s.stickers().get(id).unwrap().center, start);
        s.pointer_up(120.0, 100.0);
        assert!(s.stickers().get(id).unwrap().center.u > start.u);
    }

    #[test]
    fn test_slider_preview_then_commit() {
        let mut s = session_with_views();
        s.add_sticker_image("dot", RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])));
        let id = s.place_sticker("dot", Uv::CENTER).unwrap();
        s.adjust_selected_scale_percent(150.0);
        s.adjust_selected_rotation(45.0);
        assert_eq!(s.stickers().get(id).unwrap().scale, 1.0);
        s.end_adjust();
        let st = s.stickers().get(id).unwrap();
        assert_eq!(st.scale, 1.5);
        assert_eq!(st.rotation, 45.0);
    }

    #[test]
    fn test_export_without_view_is_error_and_notice_expires() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Session::new(settings());
        assert!(matches!(s.export(dir.path()), Err(ExportError::NothingToExport)));
        assert!(s.export_or_notify(dir.path()).is_none());
        let expires = s.notice().unwrap().expires_at;
        s.tick(expires - Duration::from_millis(1));
        assert!(s.notice().is_some());
        s.tick(expires);
        assert!(s.notice().is_none());
    }

    #[test]
    fn test_clear_paint_keeps_stickers() {
        let mut s = session_with_views();
        s.add_sticker_image("dot", RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])));
        s.place_sticker("dot", Uv::CENTER);
        s.spray_at(Uv::new(0.2, 0.2));
        s.tick(Instant::now());
        s.clear_paint();
        s.tick(Instant::now());
        let surface = s.surface().unwrap();
        assert!(surface.paint().pixels().all(|p| p[3] == 0));
        assert_eq!(surface.texture().get_pixel(64, 64)[2], 255);
        assert_eq!(s.sticker_count(), 1);
    }
}
