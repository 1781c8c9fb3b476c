// End-to-end sessions: files on disk, background loads, scripts, export.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use carspray::assets::AssetCache;
use carspray::cli::{self, CliArgs};
use carspray::geometry::Uv;
use carspray::ops::scripting::SessionScript;
use carspray::session::{Mode, Session};
use carspray::settings::ViewerSettings;
use clap::Parser;
use image::{Rgba, RgbaImage};

fn settings() -> ViewerSettings {
    ViewerSettings { surface_size: 128, frame_size: 96, seed: Some(11), ..ViewerSettings::default() }
}

fn write_png(dir: &Path, name: &str, w: u32, h: u32, px: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(w, h, Rgba(px)).save(&path).unwrap();
    path
}

fn loaded_session(dir: &Path) -> Session {
    let mut s = Session::new(settings());
    s.add_view("right", write_png(dir, "right.png", 60, 40, [200, 30, 30, 255]));
    s.add_view("back", write_png(dir, "back.png", 40, 60, [30, 30, 200, 255]));
    s.add_sticker("flame", write_png(dir, "flame.png", 16, 16, [255, 160, 0, 255]));
    s.wait_for_assets();
    s.show_view(0);
    s
}

#[test]
fn later_sticker_wins_hit_test_and_view_switch_drops_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = loaded_session(dir.path());
    assert!(s.car_loaded());

    let centre = Uv::new(0.5, 0.5);
    let _a = s.place_sticker("flame", centre).unwrap();
    let b = s.place_sticker("flame", centre).unwrap();
    assert_eq!(s.stickers().hit_test(centre), Some(b));

    s.next_view();
    assert_eq!(s.view_name(), Some("back"));
    assert_eq!(s.sticker_count(), 0);
    assert_eq!(s.stickers().hit_test(centre), None);
}

#[test]
fn painting_through_pointer_events_reaches_the_texture() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = loaded_session(dir.path());
    s.set_mode(Mode::Paint);
    s.set_brush_size(20.0);
    s.set_brush_opacity_percent(100.0);

    let vp = s.viewport();
    let (cx, cy) = (vp.width / 2.0, vp.height / 2.0);
    s.pointer_down(cx, cy);
    s.pointer_move(cx + 5.0, cy);
    s.pointer_up(cx + 5.0, cy);
    s.tick(std::time::Instant::now());

    let surface = s.surface().unwrap();
    assert!(surface.paint().pixels().any(|p| p[3] > 0));
    assert!(surface.texture().pixels().any(|p| p[3] > 0));
    assert_eq!(surface.texture().get_pixel(0, 0)[3], 0);
}

#[test]
fn pointer_outside_the_car_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = loaded_session(dir.path());
    s.set_mode(Mode::Paint);
    s.pointer_down(0.0, 0.0);
    s.pointer_up(0.0, 0.0);
    s.tick(std::time::Instant::now());
    assert!(s.surface().unwrap().paint().pixels().all(|p| p[3] == 0));
}

#[test]
fn failed_load_leaves_view_unloaded_and_export_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = Session::new(settings());
    s.add_view("ghost", dir.path().join("missing.png"));
    s.wait_for_assets();
    s.show_view(0);
    assert!(!s.car_loaded());

    assert!(s.export_or_notify(dir.path()).is_none());
    assert!(s.notice().is_some());
    let later = std::time::Instant::now() + std::time::Duration::from_secs(60);
    s.tick(later);
    assert!(s.notice().is_none());
}

#[test]
fn stale_completion_is_discarded() {
    let mut cache = AssetCache::new();
    let old = cache.begin("view:right");
    let new = cache.begin("view:right");
    assert!(!cache.complete(&old, Ok(RgbaImage::new(2, 2))));
    assert!(!cache.contains("view:right"));
    assert!(cache.complete(&new, Ok(RgbaImage::new(3, 3))));
    assert_eq!(cache.get("view:right").unwrap().width(), 3);
}

#[test]
fn script_session_exports_named_png() {
    let dir = tempfile::tempdir().unwrap();
    let session = loaded_session(dir.path());
    let out = dir.path().join("out");
    let runner = SessionScript::new(session, out.clone());
    runner
        .run(
            r##"
            mode("paint");
            color("#ff0000");
            brush_size(12);
            stroke(0.3, 0.5, 0.7, 0.5);
            place_sticker("flame", 0.5, 0.5);
            print(`stickers: ${sticker_count()}`);
            export_png();
            "##,
        )
        .unwrap();

    let exports = runner.exports();
    assert_eq!(exports, vec![out.join("car-right.png")]);
    let img = image::open(&exports[0]).unwrap();
    assert_eq!((img.width(), img.height()), (96, 96));
    assert!(runner.console_output().iter().any(|l| l == "stickers: 1"));
}

#[test]
fn cli_exports_every_view() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "left.png", 50, 30, [10, 120, 10, 255]);
    write_png(dir.path(), "front.png", 50, 30, [10, 10, 120, 255]);
    let out = dir.path().join("renders");

    let pattern = format!("{}/*.png", dir.path().display());
    let args = CliArgs::parse_from([
        "carspray",
        "--views",
        pattern.as_str(),
        "--output-dir",
        out.to_str().unwrap(),
        "--all-views",
        "--frame-size",
        "64",
    ]);
    let code = cli::run_with_settings(args, settings());
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(out.join("car-front.png").exists());
    assert!(out.join("car-left.png").exists());
}

#[test]
fn cli_rejects_missing_views() {
    let args = CliArgs::parse_from(["carspray", "--output", "x.png"]);
    assert_eq!(cli::run_with_settings(args, settings()), ExitCode::FAILURE);
}
