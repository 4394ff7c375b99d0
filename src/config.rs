/// External configuration loader: the single tuning table for the game.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
///
/// Physics constants are expressed per 60 Hz frame (units/frame,
/// units/frame²) and scaled by the simulation's delta time.

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::physics;

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub canvas: CanvasConfig,
    pub player: PlayerConfig,
    pub platforms: PlatformConfig,
    pub game: RulesConfig,
    pub gamepad: GamepadConfig,
    pub seed: Option<u64>,
    pub report_file: Option<PathBuf>,
    pub log_level: String,
    /// Show the debug overlay from the first frame (toggle with F3).
    pub debug_overlay: bool,
}

/// Logical playfield size in world units.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub width: f32,
    pub height: f32,
    pub jump_force: f32,      // negative: up
    pub gravity: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub friction: f32,
    pub max_fall_speed: f32,
    pub steer_gain: f32,      // drag-to-target follow factor
    pub death_margin: f32,    // below the view bottom
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub width: f32,
    pub height: f32,
    pub min_gap: f32,
    pub max_gap: f32,
    pub start_count: usize,
    pub move_speed: f32,
    pub move_range_min: f32,
    pub move_range_max: f32,
    pub breaking_time: f32,   // seconds
    pub collision_cooldown_ms: u64,
    pub collision_margin: f32,
    pub edge_padding: f32,
    pub max_platforms: usize,
    pub normal: f32,
    pub breaking: f32,
    pub moving: f32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub tick_rate_ms: u64,
    pub scroll_threshold: f32,
    pub score_multiplier: f32,
    pub jump_cooldown_ms: u64,
    pub start_platform_y: f32,
    pub victory_score: u32,   // 0 = endless
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub pause: Vec<String>,
}

// ── Defaults ──

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig { width: 360.0, height: 600.0 }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            width: 40.0,
            height: 40.0,
            jump_force: -9.5,
            gravity: 0.4,
            max_speed: 4.0,
            acceleration: 0.3,
            friction: 0.85,
            max_fall_speed: 8.0,
            steer_gain: 0.15,
            death_margin: 100.0,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            width: 70.0,
            height: 20.0,
            min_gap: 60.0,
            max_gap: 95.0,     // apex of a -9.5/0.4 jump is ~108
            start_count: 12,
            move_speed: 1.5,
            move_range_min: 80.0,
            move_range_max: 120.0,
            breaking_time: 0.5,
            collision_cooldown_ms: 300,
            collision_margin: 5.0,
            edge_padding: 20.0,
            max_platforms: 40,
            normal: 0.75,
            breaking: 0.15,
            moving: 0.10,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            tick_rate_ms: 16,
            scroll_threshold: 200.0,
            score_multiplier: 0.1,
            jump_cooldown_ms: 200,
            start_platform_y: 500.0,
            victory_score: 5000,
        }
    }
}

impl Default for GamepadConfig {
    fn default() -> Self {
        GamepadConfig {
            confirm: default_confirm(),
            cancel: default_cancel(),
            pause: default_pause(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default())
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    canvas: CanvasConfig,
    #[serde(default)]
    player: PlayerConfig,
    #[serde(default)]
    platforms: PlatformConfig,
    #[serde(default)]
    game: RulesConfig,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    report_file: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    debug: bool,
}

fn default_confirm() -> Vec<String> { vec!["A".into(), "Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_pause() -> Vec<String> { vec!["Start".into()] }
fn default_log_level() -> String { "info".into() }

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            confirm: default_confirm(),
            cancel: default_cancel(),
            pause: default_pause(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            seed: None,
            report_file: None,
            log_level: default_log_level(),
            debug: false,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg)
    }

    /// Parse a config document. Unknown keys are ignored.
    #[cfg(test)]
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str::<TomlConfig>(text)
            .map(GameConfig::from_toml)
            .map_err(|e| format!("config parse error: {e}"))
    }

    fn from_toml(t: TomlConfig) -> Self {
        GameConfig {
            canvas: t.canvas,
            player: t.player,
            platforms: t.platforms,
            game: t.game,
            gamepad: GamepadConfig {
                confirm: t.gamepad.confirm,
                cancel: t.gamepad.cancel,
                pause: t.gamepad.pause,
            },
            seed: t.general.seed,
            report_file: t.general.report_file.map(PathBuf::from),
            log_level: t.general.log_level,
            debug_overlay: t.general.debug,
        }
    }

    /// Normalize the table so the game stays playable.
    /// Returns a human-readable line for every correction made.
    pub fn validate(&mut self) -> Vec<String> {
        let mut fixes = vec![];
        let defaults = GameConfig::default();

        if self.canvas.width <= 0.0 || self.canvas.height <= 0.0 {
            fixes.push(format!(
                "canvas {}x{} is not positive; using {}x{}",
                self.canvas.width, self.canvas.height,
                defaults.canvas.width, defaults.canvas.height,
            ));
            self.canvas = defaults.canvas.clone();
        }

        let p = &mut self.player;
        if p.width <= 0.0 || p.height <= 0.0 {
            fixes.push("player size must be positive; using default".into());
            p.width = defaults.player.width;
            p.height = defaults.player.height;
        }
        if p.gravity <= 0.0 {
            fixes.push(format!("gravity {} must be positive; using {}", p.gravity, defaults.player.gravity));
            p.gravity = defaults.player.gravity;
        }
        if p.jump_force > 0.0 {
            fixes.push(format!("jump_force {} points down; negated", p.jump_force));
            p.jump_force = -p.jump_force;
        } else if p.jump_force == 0.0 {
            fixes.push("jump_force is zero; using default".into());
            p.jump_force = defaults.player.jump_force;
        }
        if p.max_fall_speed <= 0.0 {
            fixes.push("max_fall_speed must be positive; using default".into());
            p.max_fall_speed = defaults.player.max_fall_speed;
        }
        if p.max_speed.is_nan() || p.max_speed <= 0.0 {
            fixes.push(format!("max_speed {} must be positive; using {}", p.max_speed, defaults.player.max_speed));
            p.max_speed = defaults.player.max_speed;
        }
        if p.acceleration.is_nan() || p.acceleration <= 0.0 {
            fixes.push(format!("acceleration {} must be positive; using {}", p.acceleration, defaults.player.acceleration));
            p.acceleration = defaults.player.acceleration;
        }
        if p.steer_gain.is_nan() || p.steer_gain <= 0.0 || p.steer_gain > 1.0 {
            fixes.push(format!("steer_gain {} outside (0, 1]; using {}", p.steer_gain, defaults.player.steer_gain));
            p.steer_gain = defaults.player.steer_gain;
        }
        if !(0.0..=1.0).contains(&p.friction) {
            fixes.push(format!("friction {} outside [0, 1]; using {}", p.friction, defaults.player.friction));
            p.friction = defaults.player.friction;
        }

        let canvas_w = self.canvas.width;
        let pf = &mut self.platforms;
        if pf.width <= 0.0 || pf.height <= 0.0 || pf.width >= canvas_w {
            fixes.push(format!("platform width {} does not fit the canvas; using default", pf.width));
            pf.width = defaults.platforms.width.min(canvas_w / 2.0);
            pf.height = defaults.platforms.height;
        }
        if pf.width + 2.0 * pf.edge_padding > canvas_w || pf.edge_padding < 0.0 {
            fixes.push(format!("edge_padding {} leaves no room; using 0", pf.edge_padding));
            pf.edge_padding = 0.0;
        }
        if pf.collision_margin.is_nan() || pf.collision_margin < 0.0 {
            fixes.push(format!("collision_margin {} is negative; using 0", pf.collision_margin));
            pf.collision_margin = 0.0;
        }
        if pf.min_gap > pf.max_gap {
            fixes.push(format!("min_gap {} > max_gap {}; swapped", pf.min_gap, pf.max_gap));
            std::mem::swap(&mut pf.min_gap, &mut pf.max_gap);
        }

        // Stacked platforms must not overlap, and each must sit clear of
        // the landing band of the one below.
        let floor = (pf.height + pf.collision_margin).max(MIN_GAP_FLOOR);
        if pf.min_gap.is_nan() || pf.min_gap < floor {
            fixes.push(format!("min_gap {} overlaps platforms; raised to {:.1}", pf.min_gap, floor));
            pf.min_gap = floor;
        }
        if pf.max_gap < pf.min_gap {
            pf.max_gap = pf.min_gap;
        }

        // Every generated gap must be clearable by a single bounce.
        let mut reach = physics::jump_apex(self.player.jump_force, self.player.gravity) * REACH_SAFETY;
        if reach < pf.min_gap {
            fixes.push(format!(
                "jump reaches {:.1}, below min_gap {:.1}; using default platform size and jump",
                reach, pf.min_gap,
            ));
            self.player.jump_force = defaults.player.jump_force;
            self.player.gravity = defaults.player.gravity;
            pf.height = defaults.platforms.height;
            pf.collision_margin = defaults.platforms.collision_margin;
            pf.min_gap = defaults.platforms.min_gap;
            reach = physics::jump_apex(self.player.jump_force, self.player.gravity) * REACH_SAFETY;
        }
        if pf.max_gap > reach {
            fixes.push(format!(
                "max_gap {:.1} exceeds reachable jump height {:.1}; clamped",
                pf.max_gap, reach,
            ));
            pf.max_gap = reach;
            if pf.min_gap > pf.max_gap {
                pf.min_gap = pf.max_gap;
            }
        }

        if pf.normal < 0.0 || pf.breaking < 0.0 || pf.moving < 0.0
            || pf.normal + pf.breaking + pf.moving <= 0.0
        {
            fixes.push("platform type weights must be non-negative with a positive sum; using defaults".into());
            pf.normal = defaults.platforms.normal;
            pf.breaking = defaults.platforms.breaking;
            pf.moving = defaults.platforms.moving;
        }
        if pf.move_range_min > pf.move_range_max {
            fixes.push("move_range_min > move_range_max; swapped".into());
            std::mem::swap(&mut pf.move_range_min, &mut pf.move_range_max);
        }
        if pf.breaking_time <= 0.0 {
            fixes.push("breaking_time must be positive; using default".into());
            pf.breaking_time = defaults.platforms.breaking_time;
        }
        if pf.start_count < 2 {
            fixes.push(format!("start_count {} too small; using 2", pf.start_count));
            pf.start_count = 2;
        }
        if pf.max_platforms < pf.start_count {
            fixes.push(format!(
                "max_platforms {} below start_count {}; raised",
                pf.max_platforms, pf.start_count,
            ));
            pf.max_platforms = pf.start_count;
        }

        if self.game.tick_rate_ms == 0 {
            fixes.push("tick_rate_ms must be at least 1; using default".into());
            self.game.tick_rate_ms = defaults.game.tick_rate_ms;
        }

        fixes
    }

    /// World y of the player's top edge when standing on the start platform.
    pub fn player_start_y(&self) -> f32 {
        self.game.start_platform_y - self.player.height
    }
}

/// Fraction of the theoretical apex allowed as the largest gap.
const REACH_SAFETY: f32 = 0.9;

/// Smallest gap accepted regardless of platform size.
const MIN_GAP_FLOOR: f32 = 1.0;

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/skyhop");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    let sys = PathBuf::from("/usr/share/skyhop");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => {
                        log::info!("loaded {}", path.display());
                        return cfg;
                    }
                    Err(e) => {
                        log::warn!("config.toml parse error: {e}; using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}
