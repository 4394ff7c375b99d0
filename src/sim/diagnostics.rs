/// Run diagnostics: bounded landing/jump history, per-tick anomaly checks,
/// start-state validation and the text of the debug overlay.
///
/// Anomalies are logged, never fatal:
///   - |vy| above `VELOCITY_ANOMALY` → error (the integrator clamps far
///     below this, so it means corrupted state)
///   - falling fast with no landing for `MISS_WINDOW_MS` → warning, once
///     per fall

use std::collections::VecDeque;

use crate::config::GameConfig;
use super::world::WorldState;

pub const HISTORY_LEN: usize = 10;
pub const VELOCITY_ANOMALY: f32 = 15.0;

/// Fall speed (units/frame) at which a missing landing becomes suspicious.
const MISS_FALL_SPEED: f32 = 5.0;
/// No miss warnings before this many ticks into a run.
const WARMUP_TICKS: u64 = 60;
const MISS_WINDOW_MS: u64 = 1500;

// ── History ──

/// Fixed-capacity log; the oldest entry drops out first.
#[derive(Clone, Debug)]
pub struct History<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> History<T> {
    pub fn new(cap: usize) -> Self {
        History { items: VecDeque::with_capacity(cap), cap: cap.max(1) }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.cap {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandingRecord {
    pub clock_ms: u64,
    pub tick: u64,
    pub platform_id: u64,
    /// Fall speed at contact.
    pub vy_before: f32,
    pub player_y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpRecord {
    pub clock_ms: u64,
    pub sequence: u32,
    pub vy: f32,
}

#[derive(Clone, Debug)]
pub struct RunStats {
    pub landings: History<LandingRecord>,
    pub jumps: History<JumpRecord>,
    miss_reported: bool,
}

impl Default for RunStats {
    fn default() -> Self {
        RunStats {
            landings: History::new(HISTORY_LEN),
            jumps: History::new(HISTORY_LEN),
            miss_reported: false,
        }
    }
}

impl RunStats {
    pub fn record_landing(&mut self, rec: LandingRecord) {
        self.landings.push(rec);
        self.miss_reported = false;
    }

    pub fn record_jump(&mut self, rec: JumpRecord) {
        self.jumps.push(rec);
    }

    pub fn clear(&mut self) {
        self.landings.clear();
        self.jumps.clear();
        self.miss_reported = false;
    }
}

// ── Anomalies ──

#[derive(Clone, Debug, PartialEq)]
pub enum Anomaly {
    Velocity { vy: f32 },
    /// `lowest_top` is None when no platform is left at all.
    MissedPlatform { vy: f32, feet: f32, lowest_top: Option<f32> },
}

/// Inspect the world after a tick. A miss is reported once per fall.
pub fn check_anomalies(world: &mut WorldState) -> Vec<Anomaly> {
    let mut found = vec![];
    let p = &world.player;

    if p.vy.abs() > VELOCITY_ANOMALY || !p.vy.is_finite() {
        found.push(Anomaly::Velocity { vy: p.vy });
    }

    if p.vy > MISS_FALL_SPEED && world.tick > WARMUP_TICKS && !world.stats.miss_reported {
        let since_landing = world.stats.landings.last().map(|l| world.clock_ms.saturating_sub(l.clock_ms));
        if since_landing.map_or(true, |ms| ms >= MISS_WINDOW_MS) {
            found.push(Anomaly::MissedPlatform {
                vy: p.vy,
                feet: p.bounds().bottom(),
                lowest_top: world.platforms.lowest().map(|l| l.y),
            });
            world.stats.miss_reported = true;
        }
    }

    found
}

pub fn log_anomaly(anomaly: &Anomaly, world: &WorldState) {
    match anomaly {
        Anomaly::Velocity { vy } => {
            let recent: Vec<&JumpRecord> = world.stats.jumps.iter().rev().take(3).collect();
            log::error!(
                "velocity anomaly: vy={vy:.2} at tick {} ({} jumps, recent {:?})",
                world.tick, world.player.total_jumps, recent,
            );
        }
        Anomaly::MissedPlatform { vy, feet, lowest_top } => match lowest_top {
            Some(top) if feet > top => {
                log::warn!("falling below every platform: feet y={feet:.0}, lowest top y={top:.0}, vy={vy:.2}");
            }
            Some(top) => {
                log::warn!("falling without landings: feet y={feet:.0}, lowest top y={top:.0}, vy={vy:.2}");
            }
            None => log::warn!("falling with no platforms left: feet y={feet:.0}, vy={vy:.2}"),
        },
    }
}

// ── Start state ──

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartProblem {
    PlayerNotFinite,
    NoPlatforms,
    NoStartPlatform,
    NotStanding,
}

/// What is wrong with a freshly started run (empty when playable).
pub fn start_state_problems(world: &WorldState, cfg: &GameConfig) -> Vec<StartProblem> {
    let mut problems = vec![];
    let p = &world.player;
    if !(p.x.is_finite() && p.y.is_finite() && p.vx.is_finite() && p.vy.is_finite()) {
        problems.push(StartProblem::PlayerNotFinite);
    }
    if world.platforms.is_empty() {
        problems.push(StartProblem::NoPlatforms);
        return problems;
    }
    match world.platforms.start_platform() {
        None => problems.push(StartProblem::NoStartPlatform),
        Some(start) => {
            let feet = p.bounds().bottom();
            let on_top = (feet - start.y).abs() < 0.5 && (feet - cfg.game.start_platform_y).abs() < 0.5;
            if !on_top || !p.bounds().overlaps_x(&start.bounds()) {
                problems.push(StartProblem::NotStanding);
            }
        }
    }
    problems
}

// ── Debug overlay ──

pub fn debug_lines(world: &WorldState) -> Vec<String> {
    let p = &world.player;
    let last_landing = match world.stats.landings.last() {
        Some(l) => format!("{} ms ago", world.clock_ms.saturating_sub(l.clock_ms)),
        None => "never".to_string(),
    };
    vec![
        format!("tick {}  t={}ms", world.tick, world.clock_ms),
        format!("phase {:?}", world.phase),
        format!("pos {:.0},{:.0}", p.x, p.y),
        format!("vel {:.2},{:.2}", p.vx, p.vy),
        format!("{:?} can_jump={}", p.state, p.can_jump),
        format!("jumps {}", p.total_jumps),
        format!("platforms {}", world.platforms.len()),
        format!("landed {last_landing}"),
        format!("score {}", world.score),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::JumpState;

    fn playing(cfg: &GameConfig) -> WorldState {
        let mut w = WorldState::new(cfg, 4, 0);
        w.start_game(cfg);
        w
    }

    #[test]
    fn history_keeps_newest_entries() {
        let mut h = History::new(3);
        for i in 0..5 { h.push(i); }
        assert_eq!(h.len(), 3);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(h.last(), Some(&4));
    }

    #[test]
    fn runaway_velocity_is_flagged() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg);
        w.player.vy = -20.0;
        assert_eq!(check_anomalies(&mut w), vec![Anomaly::Velocity { vy: -20.0 }]);
        w.player.vy = f32::NAN;
        assert!(matches!(check_anomalies(&mut w)[..], [Anomaly::Velocity { .. }]));
    }

    #[test]
    fn missed_platform_reported_once_per_fall() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg);
        w.tick = WARMUP_TICKS + 1;
        w.clock_ms = 10_000;
        w.player.state = JumpState::Airborne;
        w.player.vy = 7.0;
        w.stats.record_landing(LandingRecord { clock_ms: 9_900, tick: 1, platform_id: 0, vy_before: 3.0, player_y: 0.0 });
        assert!(check_anomalies(&mut w).is_empty(), "landed too recently");

        w.clock_ms = 9_900 + MISS_WINDOW_MS;
        assert!(matches!(check_anomalies(&mut w)[..], [Anomaly::MissedPlatform { lowest_top: Some(_), .. }]));
        assert!(check_anomalies(&mut w).is_empty());

        w.stats.record_landing(LandingRecord { clock_ms: 12_000, tick: 2, platform_id: 0, vy_before: 3.0, player_y: 0.0 });
        w.clock_ms = 12_000 + MISS_WINDOW_MS;
        assert_eq!(check_anomalies(&mut w).len(), 1);
    }

    #[test]
    fn no_miss_warning_during_warmup() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg);
        w.tick = 10;
        w.player.vy = 7.0;
        assert!(check_anomalies(&mut w).is_empty());
    }

    #[test]
    fn fresh_run_has_no_start_problems() {
        let cfg = GameConfig::default();
        let w = playing(&cfg);
        assert!(start_state_problems(&w, &cfg).is_empty());
    }

    #[test]
    fn broken_start_state_is_detected() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg);
        w.player.x = f32::NAN;
        w.player.y -= 50.0;
        let problems = start_state_problems(&w, &cfg);
        assert!(problems.contains(&StartProblem::PlayerNotFinite));
        assert!(problems.contains(&StartProblem::NotStanding));

        let mut w = playing(&cfg);
        w.platforms.update(crate::domain::physics::FRAME_SECS, -3000.0);
        assert_eq!(start_state_problems(&w, &cfg), vec![StartProblem::NoStartPlatform]);
    }

    #[test]
    fn debug_lines_describe_the_player() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg);
        w.player.vy = -9.5;
        let lines = debug_lines(&w);
        assert!(lines.iter().any(|l| l.contains("-9.50")));
        assert!(lines.iter().any(|l| l == &format!("platforms {}", cfg.platforms.start_count)));
        assert!(lines.iter().any(|l| l == "landed never"));
    }
}
