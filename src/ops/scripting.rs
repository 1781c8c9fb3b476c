// ============================================================================
// CarSpray Scripting — Rhai-driven headless sessions
// ============================================================================
//
// A script drives a `Session` the way a user would: switch modes, pick a
// colour, press/move/release the pointer, place stickers, orbit the camera
// and export.  UV-space helpers (`spray`, `stroke`, `place_sticker`) skip the
// screen mapping for precise, resolution-independent scripts.

use rhai::{Engine, EvalAltResult, ImmutableString, Position};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::geometry::Uv;
use crate::session::{Mode, Session};
use crate::{log_info, log_warn};

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        ScriptError {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }

    /// Multi-line explanation for terminal output: where it failed, what
    /// Rhai said, and a hint for the usual suspects.
    pub fn friendly_message(&self) -> String {
        let detail = self.message.split(" (line ").next().unwrap_or(&self.message).trim();
        let header = match (self.line, self.column) {
            (Some(l), Some(c)) => format!("Script failed at line {}, column {}:", l, c),
            (Some(l), None) => format!("Script failed at line {}:", l),
            _ => "Script failed:".to_string(),
        };
        let mut out = format!("{}\n  {}", header, detail);
        if let Some(hint) = hint_for(&self.message) {
            out.push_str("\n\n  Hint: ");
            out.push_str(hint);
        }
        out
    }
}

const HINTS: &[(&str, &str)] = &[
    ("Function not found", "check the spelling and argument count; coordinates may be ints or floats."),
    ("Variable not found", "declare variables with 'let' before use."),
    ("Too many operations", "the script hit the operation limit; look for a loop that never ends."),
    ("not loaded", "pass the image with --sticker NAME=PATH and use the same NAME."),
    ("no car view", "give at least one --view; nothing is shown until a car photo loads."),
    ("Syntax error", "look for a missing ';' or bracket just before this position."),
    ("Expecting", "look for a missing ';' or bracket just before this position."),
];

fn hint_for(message: &str) -> Option<&'static str> {
    HINTS.iter().find(|(needle, _)| message.contains(needle)).map(|(_, hint)| *hint)
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<Box<EvalAltResult>> for ScriptError {
    fn from(e: Box<EvalAltResult>) -> Self {
        let pos = e.position();
        ScriptError::at(e.to_string(), pos)
    }
}

// ============================================================================
// Script context — shared between the engine's host functions
// ============================================================================

struct ScriptContext {
    session: Session,
    export_dir: PathBuf,
    console_output: Vec<String>,
    exports: Vec<PathBuf>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;

type HostResult<T> = Result<T, Box<EvalAltResult>>;

/// A session plus the sandboxed engine that drives it.
pub struct SessionScript {
    ctx: SharedContext,
    engine: Engine,
}

impl SessionScript {
    pub fn new(session: Session, export_dir: PathBuf) -> Self {
        let ctx = Arc::new(Mutex::new(ScriptContext {
            session,
            export_dir,
            console_output: Vec::new(),
            exports: Vec::new(),
        }));
        let engine = create_engine(ctx.clone());
        Self { ctx, engine }
    }

    /// Compile and run `source` to completion.
    pub fn run(&self, source: &str) -> Result<(), ScriptError> {
        let ast = self.engine.compile(source).map_err(|e| {
            let pos = e.position();
            ScriptError::at(e.to_string(), pos)
        })?;
        self.engine.run_ast(&ast)?;
        Ok(())
    }

    /// Borrow the session (e.g. to export after the script finished).
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut lock = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut lock.session)
    }

    /// Lines produced by `print`.
    pub fn console_output(&self) -> Vec<String> {
        self.ctx.lock().unwrap_or_else(|e| e.into_inner()).console_output.clone()
    }

    /// Files written by `export_png()` calls.
    pub fn exports(&self) -> Vec<PathBuf> {
        self.ctx.lock().unwrap_or_else(|e| e.into_inner()).exports.clone()
    }
}

// ============================================================================
// Engine construction with sandbox + API registration
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    // ── Sandbox limits ──
    engine.set_max_operations(5_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_mode_api(&mut engine, ctx.clone());
    register_brush_api(&mut engine, ctx.clone());
    register_pointer_api(&mut engine, ctx.clone());
    register_sticker_api(&mut engine, ctx.clone());
    register_view_api(&mut engine, ctx.clone());
    register_utility_api(&mut engine, ctx);

    engine
}

fn with<R>(ctx: &SharedContext, f: impl FnOnce(&mut ScriptContext) -> R) -> R {
    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut lock)
}

fn uv(u: f64, v: f64) -> Uv {
    Uv::new(u as f32, v as f32)
}

// ============================================================================
// Mode API
// ============================================================================

fn register_mode_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("mode", move |name: ImmutableString| -> HostResult<()> {
        let mode = Mode::parse(&name).ok_or_else(|| format!("unknown mode '{}' (use none, paint or sticker)", name))?;
        with(&c, |x| x.session.set_mode(mode));
        Ok(())
    });

    let c = ctx;
    engine.register_fn("current_mode", move || -> ImmutableString {
        with(&c, |x| x.session.mode().label().into())
    });
}

// ============================================================================
// Brush API
// ============================================================================

fn register_brush_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("color", move |hex: ImmutableString| -> HostResult<()> {
        if with(&c, |x| x.session.set_brush_color(&hex)) {
            Ok(())
        } else {
            Err(format!("'{}' is not a #rrggbb colour", hex).into())
        }
    });

    let c = ctx.clone();
    engine.register_fn("brush_size", move |size: i64| with(&c, |x| x.session.set_brush_size(size as f32)));
    let c = ctx.clone();
    engine.register_fn("brush_size", move |size: f64| with(&c, |x| x.session.set_brush_size(size as f32)));

    let c = ctx.clone();
    engine.register_fn("brush_opacity", move |pct: i64| with(&c, |x| x.session.set_brush_opacity_percent(pct as f32)));
    let c = ctx.clone();
    engine.register_fn("brush_opacity", move |pct: f64| with(&c, |x| x.session.set_brush_opacity_percent(pct as f32)));

    // spray(u, v) — one stamp at a UV point
    let c = ctx.clone();
    engine.register_fn("spray", move |u: f64, v: f64| with(&c, |x| x.session.spray_at(uv(u, v))));

    // stroke(u0, v0, u1, v1) — a full interpolated stroke
    let c = ctx.clone();
    engine.register_fn("stroke", move |u0: f64, v0: f64, u1: f64, v1: f64| {
        with(&c, |x| x.session.stroke(uv(u0, v0), uv(u1, v1)))
    });

    let c = ctx;
    engine.register_fn("clear_paint", move || with(&c, |x| x.session.clear_paint()));
}

// ============================================================================
// Pointer API (client coordinates)
// ============================================================================

fn register_pointer_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("pointer_down", move |px: f64, py: f64| with(&c, |x| x.session.pointer_down(px as f32, py as f32)));
    let c = ctx.clone();
    engine.register_fn("pointer_down", move |px: i64, py: i64| with(&c, |x| x.session.pointer_down(px as f32, py as f32)));

    let c = ctx.clone();
    engine.register_fn("pointer_move", move |px: f64, py: f64| with(&c, |x| x.session.pointer_move(px as f32, py as f32)));
    let c = ctx.clone();
    engine.register_fn("pointer_move", move |px: i64, py: i64| with(&c, |x| x.session.pointer_move(px as f32, py as f32)));

    let c = ctx.clone();
    engine.register_fn("pointer_up", move |px: f64, py: f64| with(&c, |x| x.session.pointer_up(px as f32, py as f32)));
    let c = ctx.clone();
    engine.register_fn("pointer_up", move |px: i64, py: i64| with(&c, |x| x.session.pointer_up(px as f32, py as f32)));

    let c = ctx;
    engine.register_fn("pointer_leave", move || with(&c, |x| x.session.pointer_leave()));
}

// ============================================================================
// Sticker API
// ============================================================================

fn register_sticker_api(engine: &mut Engine, ctx: SharedContext) {
    // place_sticker(name, u, v) -> id string
    let c = ctx.clone();
    engine.register_fn("place_sticker", move |name: ImmutableString, u: f64, v: f64| -> HostResult<ImmutableString> {
        with(&c, |x| {
            if !x.session.has_sticker(&name) {
                return Err(format!("sticker '{}' is not loaded", name).into());
            }
            match x.session.place_sticker(&name, uv(u, v)) {
                Some(id) => Ok(id.to_string().into()),
                None => Err("no car view is displayed".into()),
            }
        })
    });

    // arm_sticker(name) — next pointer_down in sticker mode drops it
    let c = ctx.clone();
    engine.register_fn("arm_sticker", move |name: ImmutableString| -> HostResult<()> {
        if with(&c, |x| x.session.begin_sticker_placement(&name)) {
            Ok(())
        } else {
            Err(format!("sticker '{}' is not loaded", name).into())
        }
    });

    let c = ctx.clone();
    engine.register_fn("select_at", move |u: f64, v: f64| -> bool { with(&c, |x| x.session.select_at(uv(u, v)).is_some()) });

    let c = ctx.clone();
    engine.register_fn("move_selected", move |u: f64, v: f64| with(&c, |x| x.session.move_selected(uv(u, v))));

    let c = ctx.clone();
    engine.register_fn("scale_selected", move |pct: i64| with(&c, |x| x.session.set_selected_scale_percent(pct as f32)));
    let c = ctx.clone();
    engine.register_fn("scale_selected", move |pct: f64| with(&c, |x| x.session.set_selected_scale_percent(pct as f32)));

    let c = ctx.clone();
    engine.register_fn("rotate_selected", move |deg: i64| with(&c, |x| x.session.set_selected_rotation(deg as f32)));
    let c = ctx.clone();
    engine.register_fn("rotate_selected", move |deg: f64| with(&c, |x| x.session.set_selected_rotation(deg as f32)));

    let c = ctx.clone();
    engine.register_fn("remove_selected", move || -> bool { with(&c, |x| x.session.remove_selected()) });

    let c = ctx;
    engine.register_fn("sticker_count", move || -> i64 { with(&c, |x| x.session.sticker_count() as i64) });
}

// ============================================================================
// View & camera API
// ============================================================================

fn register_view_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("next_view", move || with(&c, |x| x.session.next_view()));

    let c = ctx.clone();
    engine.register_fn("prev_view", move || with(&c, |x| x.session.prev_view()));

    let c = ctx.clone();
    engine.register_fn("view_name", move || -> ImmutableString {
        with(&c, |x| x.session.view_name().unwrap_or("").into())
    });

    let c = ctx.clone();
    engine.register_fn("view_count", move || -> i64 { with(&c, |x| x.session.views().len() as i64) });

    let c = ctx.clone();
    engine.register_fn("reset_camera", move || with(&c, |x| x.session.reset_camera()));

    let c = ctx.clone();
    engine.register_fn("orbit", move |dx: f64, dy: f64| with(&c, |x| x.session.orbit_by(dx as f32, dy as f32)));
    let c = ctx.clone();
    engine.register_fn("orbit", move |dx: i64, dy: i64| with(&c, |x| x.session.orbit_by(dx as f32, dy as f32)));

    let c = ctx;
    engine.register_fn("zoom", move |factor: f64| with(&c, |x| x.session.zoom(factor as f32)));
}

// ============================================================================
// Utility API
// ============================================================================

fn register_utility_api(engine: &mut Engine, ctx: SharedContext) {
    // export_png() -> path of the written file, or "" when it failed
    let c = ctx.clone();
    engine.register_fn("export_png", move || -> ImmutableString {
        with(&c, |x| {
            let dir = x.export_dir.clone();
            match x.session.export_or_notify(&dir) {
                Some(path) => {
                    let s = path.display().to_string();
                    x.exports.push(path);
                    s.into()
                }
                None => {
                    if let Some(n) = x.session.notice() {
                        log_warn!("Script export failed: {}", n.message);
                    }
                    ImmutableString::new()
                }
            }
        })
    });

    let c = ctx;
    engine.on_print(move |msg| {
        log_info!("[script] {}", msg);
        with(&c, |x| x.console_output.push(msg.to_string()));
    });
}
