// ============================================================================
// CarSpray CLI — headless sessions driven by command-line arguments
// ============================================================================
//
// Usage examples:
//   carspray --view right=right.png --script tag.rhai --output out.png
//   carspray --views "shots/*.jpg" --curb curb.png --output-dir renders/
//   carspray --view side=side.png --sticker flame=flame.png --script deco.rhai --seed 7
//   carspray --views "shots/*.png" --script tag.rhai --all-views --output-dir out/
//
// Every requested view is decoded in the background, the script (if any)
// runs against a fresh session, and the resulting frame is exported as
// `car-<view>.png`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::view_name_from_path;
use crate::ops::scripting::SessionScript;
use crate::session::Session;
use crate::settings::ViewerSettings;
use crate::surface::MAX_SURFACE_SIZE;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// CarSpray headless car customiser.
///
/// Spray-paint and sticker car photos with Rhai scripts and export PNG frames.
#[derive(Parser, Debug)]
#[command(
    name = "carspray",
    about = "CarSpray headless car paint & sticker renderer",
    long_about = "Load car photos as views, run a Rhai session script that paints and\n\
                  decorates them, and export the rendered frame as car-<view>.png.\n\n\
                  Example:\n  \
                  carspray --view right=right.png --script tag.rhai --output out.png\n  \
                  carspray --views \"shots/*.jpg\" --output-dir renders/ --all-views"
)]
pub struct CliArgs {
    /// A car view as NAME=PATH (or just PATH; the file stem becomes the name).
    /// Repeat for several views; order is the navigation order.
    #[arg(long = "view", value_name = "NAME=PATH")]
    pub view: Vec<String>,

    /// Glob pattern(s) or directories of car photos (png/jpg/webp/bmp);
    /// each file's stem is its view name.
    #[arg(long = "views", value_name = "GLOB|DIR", num_args = 1..)]
    pub views: Vec<String>,

    /// Backdrop image drawn behind the car.
    #[arg(long, value_name = "FILE")]
    pub curb: Option<PathBuf>,

    /// A sticker image as NAME=PATH, usable from scripts by NAME.
    #[arg(long = "sticker", value_name = "NAME=PATH")]
    pub sticker: Vec<String>,

    /// Rhai session script to run before exporting.
    #[arg(short, long, value_name = "SCRIPT.rhai")]
    pub script: Option<PathBuf>,

    /// Output PNG path.  Only valid when a single frame is exported.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory; files are named car-<view>.png.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Exported frame edge length in pixels (default from settings, 800).
    #[arg(long, value_name = "PX")]
    pub frame_size: Option<u32>,

    /// Decal surface edge length in pixels (default from settings, 1024).
    #[arg(long, value_name = "PX")]
    pub surface_size: Option<u32>,

    /// Seed the spray RNG for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run the script once per view, each in a fresh session, exporting every view.
    #[arg(long)]
    pub all_views: bool,

    /// Echo the session log and script output to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Settings with command-line overrides applied.
    pub fn apply_to(&self, mut settings: ViewerSettings) -> ViewerSettings {
        if let Some(px) = self.frame_size {
            settings.frame_size = px.clamp(1, MAX_SURFACE_SIZE);
        }
        if let Some(px) = self.surface_size {
            settings.surface_size = px.clamp(1, MAX_SURFACE_SIZE);
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        settings
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
/// `0` = every export succeeded, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    run_with_settings(args, ViewerSettings::load())
}

/// As [`run`], starting from explicit settings instead of the settings file.
pub fn run_with_settings(args: CliArgs, settings: ViewerSettings) -> ExitCode {
    crate::logger::set_echo(args.verbose);
    if args.verbose
        && let Some(path) = crate::logger::log_path()
    {
        eprintln!("log: {}", path.display());
    }
    let settings = args.apply_to(settings);

    let views = match resolve_views(&args.view, &args.views) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if views.is_empty() {
        eprintln!("error: no car views given (use --view NAME=PATH or --views \"GLOB\").");
        return ExitCode::FAILURE;
    }

    let stickers = match args.sticker.iter().map(|s| parse_named(s)).collect::<Result<Vec<_>, _>>() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let targets: Vec<usize> = if args.all_views { (0..views.len()).collect() } else { vec![0] };
    if targets.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} views would be exported but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory.",
            targets.len()
        );
        return ExitCode::FAILURE;
    }

    let script_source: Option<String> = match &args.script {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(src) => Some(src),
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!("error: could not create output directory '{}': {}", output_dir.display(), e);
        return ExitCode::FAILURE;
    }

    let job = Job {
        settings: &settings,
        views: &views,
        curb: args.curb.as_deref(),
        stickers: &stickers,
        script: script_source.as_deref(),
        output: args.output.as_deref(),
        output_dir: &output_dir,
        verbose: args.verbose,
    };

    let total = targets.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (n, &index) in targets.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", n + 1, total, views[index].0);
        }
        let start = Instant::now();
        match run_one(&job, index) {
            Ok(written) => {
                for path in written {
                    println!("  → {} ({:.0}ms)", path.display(), start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-view pipeline
// ============================================================================

struct Job<'a> {
    settings: &'a ViewerSettings,
    views: &'a [(String, PathBuf)],
    curb: Option<&'a Path>,
    stickers: &'a [(String, PathBuf)],
    script: Option<&'a str>,
    output: Option<&'a Path>,
    output_dir: &'a Path,
    verbose: bool,
}

fn run_one(job: &Job<'_>, index: usize) -> Result<Vec<PathBuf>, String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut session = Session::new(job.settings.clone());
    for (name, path) in job.views {
        session.add_view(name, path.clone());
    }
    if let Some(curb) = job.curb {
        session.set_curb(curb.to_path_buf());
    }
    for (name, path) in job.stickers {
        session.add_sticker(name, path.clone());
    }
    session.wait_for_assets();
    session.show_view(index);
    if !session.car_loaded() {
        return Err(format!("could not load view '{}'", job.views[index].0));
    }
    if job.curb.is_some() && session.scene().curb.is_none() {
        eprintln!("  warning: curb image could not be loaded; rendering without it.");
    }
    for (name, _) in job.stickers {
        if !session.has_sticker(name) {
            eprintln!("  warning: sticker '{}' could not be loaded.", name);
        }
    }

    // -- Step 2: Script (optional) ---------------------------------------
    let runner = SessionScript::new(session, job.output_dir.to_path_buf());
    if let Some(src) = job.script {
        let result = runner.run(src);
        if job.verbose {
            for line in runner.console_output() {
                println!("  [script] {}", line);
            }
        }
        result.map_err(|e| format!("script error:\n{}", e.friendly_message()))?;
    }

    // -- Step 3: Export --------------------------------------------------
    let mut written = runner.exports();
    if job.output.is_some() || written.is_empty() {
        let path = runner.with_session(|s| match job.output {
            Some(out) => s.export_to(out).map(|_| out.to_path_buf()),
            None => s.export(job.output_dir),
        });
        written.push(path.map_err(|e| format!("export failed: {}", e))?);
    }
    Ok(written)
}

// ============================================================================
// Helpers
// ============================================================================

/// Split `NAME=PATH`; a bare path is named after its file stem.
fn parse_named(spec: &str) -> Result<(String, PathBuf), String> {
    match spec.split_once('=') {
        Some((name, path)) => {
            let name = name.trim();
            if name.is_empty() || path.trim().is_empty() {
                return Err(format!("'{}' is not of the form NAME=PATH", spec));
            }
            Ok((name.to_string(), PathBuf::from(path.trim())))
        }
        None => {
            let path = PathBuf::from(spec);
            Ok((view_name_from_path(&path), path))
        }
    }
}

/// Named views in the order given, then glob matches.  Duplicate names
/// keep the first occurrence.
fn resolve_views(named: &[String], globs: &[String]) -> Result<Vec<(String, PathBuf)>, String> {
    let mut result: Vec<(String, PathBuf)> = Vec::new();
    let mut push = |name: String, path: PathBuf| {
        if result.iter().any(|(n, _)| *n == name) {
            eprintln!("warning: duplicate view name '{}' ignored.", name);
        } else {
            result.push((name, path));
        }
    };

    for spec in named {
        let (name, path) = parse_named(spec)?;
        push(name, path);
    }
    for path in resolve_view_files(globs) {
        push(view_name_from_path(&path), path);
    }
    Ok(result)
}

/// File extensions accepted as car photos.
const VIEW_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

fn is_view_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIEW_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Car photos named by `patterns`: a literal file, every photo inside a
/// literal directory, or glob matches.  Other files are skipped and each
/// photo is listed once, in first-seen order.
fn resolve_view_files(patterns: &[String]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let literal = Path::new(pattern);
        let candidates: Vec<PathBuf> = if literal.is_dir() {
            match std::fs::read_dir(literal) {
                Ok(entries) => {
                    let mut inside: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
                    inside.sort();
                    inside
                }
                Err(e) => {
                    eprintln!("warning: could not read directory '{}': {}", pattern, e);
                    continue;
                }
            }
        } else if literal.is_file() {
            vec![literal.to_path_buf()]
        } else {
            match glob::glob(pattern) {
                Ok(entries) => entries.flatten().collect(),
                Err(e) => {
                    eprintln!("warning: invalid glob '{}': {}", pattern, e);
                    continue;
                }
            }
        };

        let photos: Vec<PathBuf> = candidates.into_iter().filter(|p| p.is_file() && is_view_image(p)).collect();
        if photos.is_empty() {
            eprintln!("warning: '{}' matched no car photos.", pattern);
        }
        for path in photos {
            if !found.contains(&path) {
                found.push(path);
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named() {
        assert_eq!(parse_named("right=cars/r.png").unwrap(), ("right".to_string(), PathBuf::from("cars/r.png")));
        assert_eq!(parse_named("cars/back.jpg").unwrap().0, "back");
        assert!(parse_named("=x.png").is_err());
    }

    #[test]
    fn test_resolve_views_dedupes_names() {
        let named = vec!["a=1.png".to_string(), "a=2.png".to_string(), "b=3.png".to_string()];
        let views = resolve_views(&named, &[]).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].1, PathBuf::from("1.png"));
    }

    #[test]
    fn test_view_files_keep_only_photos() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "c.txt", "notes.md"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let pattern = format!("{}/*", dir.path().display());
        let found = resolve_view_files(&[pattern]);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.JPG"));
        assert!(found[1].ends_with("b.png"));
    }

    #[test]
    fn test_view_files_from_directory_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["side.webp", "front.png", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let as_dir = dir.path().display().to_string();
        let as_file = dir.path().join("front.png").display().to_string();
        let found = resolve_view_files(&[as_file, as_dir]);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("front.png"));
        assert!(found[1].ends_with("side.webp"));
    }

    #[test]
    fn test_cli_overrides_settings() {
        let args = CliArgs::parse_from(["carspray", "--view", "x.png", "--surface-size", "99999", "--seed", "4"]);
        let s = args.apply_to(ViewerSettings::default());
        assert_eq!(s.surface_size, MAX_SURFACE_SIZE);
        assert_eq!(s.seed, Some(4));
        assert_eq!(s.frame_size, 800);
    }
}
