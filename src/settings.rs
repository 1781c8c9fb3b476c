use std::path::{Path, PathBuf};

use crate::color::{DEFAULT_COLOR, Rgb, hex_to_rgb, rgb_to_hex};
use crate::log_warn;
use crate::ops::spray::{DEFAULT_BRUSH_SIZE, DEFAULT_OPACITY, MAX_BRUSH_SIZE, MAX_OPACITY, MIN_BRUSH_SIZE, MIN_OPACITY};
use crate::surface::{DEFAULT_SURFACE_SIZE, MAX_SURFACE_SIZE};

pub const DEFAULT_FRAME_SIZE: u32 = 800;
pub const DEFAULT_NOTICE_SECONDS: f32 = 5.0;

/// Viewer settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerSettings {
    /// Edge length of the decal surface in pixels
    pub surface_size: u32,
    /// Edge length of the exported (square) frame
    pub frame_size: u32,
    pub brush_color: Rgb,
    /// Brush diameter in surface pixels
    pub brush_size: f32,
    /// Brush opacity, 0.1–1.0
    pub brush_opacity: f32,
    pub background: Rgb,
    /// How long an error notice stays visible
    pub notice_seconds: f32,
    /// Fixed RNG seed for reproducible sessions (None = random)
    pub seed: Option<u64>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            surface_size: DEFAULT_SURFACE_SIZE,
            frame_size: DEFAULT_FRAME_SIZE,
            brush_color: DEFAULT_COLOR,
            brush_size: DEFAULT_BRUSH_SIZE,
            brush_opacity: DEFAULT_OPACITY,
            background: [0x55, 0x55, 0x55],
            notice_seconds: DEFAULT_NOTICE_SECONDS,
            seed: None,
        }
    }
}

impl ViewerSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/carspray/carspray_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\CarSpray\carspray_settings.cfg
    /// On macOS:   ~/Library/Application Support/CarSpray/carspray_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("CarSpray").join("carspray_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("CarSpray")
                    .join("carspray_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("carspray").join("carspray_settings.cfg"))
        }
    }

    /// Serialize as `key=value` lines.
    pub fn to_config_string(&self) -> String {
        format!(
            "surface_size={}\n\
             frame_size={}\n\
             brush_color={}\n\
             brush_size={}\n\
             brush_opacity={}\n\
             background={}\n\
             notice_seconds={}\n\
             seed={}\n",
            self.surface_size,
            self.frame_size,
            rgb_to_hex(self.brush_color),
            self.brush_size,
            self.brush_opacity,
            rgb_to_hex(self.background),
            self.notice_seconds,
            self.seed.map(|s| s.to_string()).unwrap_or_default(),
        )
    }

    /// Parse `key=value` lines.  Unknown keys and bad values keep defaults;
    /// numeric values are clamped to their valid ranges.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "surface_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.surface_size = v.clamp(1, MAX_SURFACE_SIZE);
                    }
                }
                "frame_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.frame_size = v.clamp(1, MAX_SURFACE_SIZE);
                    }
                }
                "brush_color" => {
                    if let Some(c) = hex_to_rgb(val) {
                        s.brush_color = c;
                    }
                }
                "brush_size" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                    {
                        s.brush_size = v.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
                    }
                }
                "brush_opacity" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                    {
                        s.brush_opacity = v.clamp(MIN_OPACITY, MAX_OPACITY);
                    }
                }
                "background" => {
                    if let Some(c) = hex_to_rgb(val) {
                        s.background = c;
                    }
                }
                "notice_seconds" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v >= 0.0
                    {
                        s.notice_seconds = v;
                    }
                }
                "seed" => {
                    s.seed = val.parse().ok();
                }
                other => {
                    log_warn!("Ignoring unknown setting '{}'", other);
                }
            }
        }
        s
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        Self::settings_path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }
}
