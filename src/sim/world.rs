/// WorldState: the complete snapshot of a running game.
///
/// ## Camera
///
/// World y grows downward and the player climbs toward negative y. The
/// camera is a single vertical offset: `camera.y` is the world y shown at
/// the top row of the playfield.
///   - It only ever moves up (its y never increases during a run).
///   - It scrolls once the player rises above `threshold` units from the
///     top of the view.
///   - Renderer maps: `view_y = world_y - camera.y`.

use crate::config::GameConfig;
use crate::domain::player::Player;
use super::diagnostics::{self, RunStats};
use super::platforms::PlatformManager;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Loading,
    Menu,
    Playing,
    Paused,
    GameOver,
    Victory,
}

#[derive(Clone, Debug)]
pub struct Camera {
    /// World y of the top edge of the view.
    pub y: f32,
    pub view_height: f32,
    /// Distance from the top of the view the player may reach before
    /// the camera scrolls.
    pub threshold: f32,
}

impl Camera {
    pub fn new(cfg: &GameConfig) -> Self {
        Camera {
            y: 0.0,
            view_height: cfg.canvas.height,
            threshold: cfg.game.scroll_threshold,
        }
    }

    /// Scroll up so the player stays at least `threshold` below the top.
    pub fn follow(&mut self, player_y: f32) {
        let target = player_y - self.threshold;
        if target < self.y {
            self.y = target;
        }
    }

    /// World y of the bottom edge of the view.
    pub fn bottom(&self) -> f32 {
        self.y + self.view_height
    }

    pub fn to_view(&self, world_y: f32) -> f32 {
        world_y - self.y
    }
}

pub struct WorldState {
    pub phase: Phase,

    // ── Entities ──
    pub player: Player,
    pub platforms: PlatformManager,
    pub camera: Camera,

    // ── Score ──
    pub score: u32,
    pub high_score: u32,
    /// Highest climb above the start position this run (world units).
    pub best_height: f32,
    pub new_high_score: bool,

    // ── Clock ──
    /// Simulation time in milliseconds since the run started.
    pub clock_ms: u64,
    pub tick: u64,
    pub seed: u64,

    /// Recent landings and jumps, for anomaly checks and the overlay.
    pub stats: RunStats,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
    pub anim_tick: u32,
    pub debug_overlay: bool,
}

impl WorldState {
    pub fn new(cfg: &GameConfig, seed: u64, high_score: u32) -> Self {
        WorldState {
            phase: Phase::Loading,
            player: Player::new(cfg),
            platforms: PlatformManager::new(cfg, seed),
            camera: Camera::new(cfg),
            score: 0,
            high_score,
            best_height: 0.0,
            new_high_score: false,
            clock_ms: 0,
            tick: 0,
            seed,
            stats: RunStats::default(),
            message: String::new(),
            message_timer: 0,
            anim_tick: 0,
            debug_overlay: cfg.debug_overlay,
        }
    }

    /// Begin a fresh run with the current seed.
    pub fn start_game(&mut self, cfg: &GameConfig) {
        self.score = 0;
        self.best_height = 0.0;
        self.new_high_score = false;
        self.clock_ms = 0;
        self.tick = 0;
        self.anim_tick = 0;
        self.player.reset(cfg);
        self.platforms.reset(self.seed);
        self.camera = Camera::new(cfg);
        self.stats.clear();
        self.message.clear();
        self.message_timer = 0;
        self.phase = Phase::Playing;
        if !self.ensure_start_state(cfg) {
            self.set_message("Layout error, press R to retry", 180);
        }
        log::info!("run started (seed {})", self.platforms.seed());
    }

    /// Check the run can begin (player standing on the start platform).
    /// On failure, regenerate the layout and reset the player once.
    /// Returns false if the state is still broken afterwards.
    pub fn ensure_start_state(&mut self, cfg: &GameConfig) -> bool {
        let problems = diagnostics::start_state_problems(self, cfg);
        if problems.is_empty() {
            return true;
        }
        log::error!("invalid start state {problems:?}; regenerating");
        self.platforms.reset(self.seed);
        self.player.reset(cfg);
        self.camera = Camera::new(cfg);

        let remaining = diagnostics::start_state_problems(self, cfg);
        if remaining.is_empty() {
            log::info!("start state recovered");
            true
        } else {
            log::error!("start state recovery failed: {remaining:?}");
            false
        }
    }

    /// Use a different layout for the next `start_game`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Playing ↔ Paused. Other phases are left alone.
    pub fn toggle_pause(&mut self) {
        self.phase = match self.phase {
            Phase::Playing => Phase::Paused,
            Phase::Paused => Phase::Playing,
            other => other,
        };
    }

    /// Flip the diagnostics panel; returns the new setting. Survives restarts.
    pub fn toggle_debug_overlay(&mut self) -> bool {
        self.debug_overlay = !self.debug_overlay;
        self.debug_overlay
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    /// World y below which the player is lost.
    pub fn death_line(&self, cfg: &GameConfig) -> f32 {
        self.camera.bottom() + cfg.player.death_margin
    }
}
