/// PlatformManager: owns the platform column, its generator and the
/// landing check.
///
/// ## Generation
///
/// Platforms are generated bottom-up. `frontier_y` is the y of the most
/// recently generated platform; the next one goes `gap` units above it,
/// `gap ∈ [min_gap, max_gap]`. Every platform is generated, never skipped,
/// so consecutive generated platforms are always reachable.
///
/// ## Lifetime
///
/// A platform leaves the list when it
///   - finishes breaking,
///   - falls more than `CULL_MARGIN` below the view,
///   - is the lowest platform while the list is over `max_platforms`.
///
/// All randomness comes from one `StdRng`, so a seed fully determines the
/// layout.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{CanvasConfig, GameConfig, PlatformConfig};
use crate::domain::physics;
use crate::domain::platform::{Platform, PlatformKind};
use crate::domain::player::Player;
use super::event::GameEvent;

/// Platforms this far below the view bottom are dropped.
const CULL_MARGIN: f32 = 200.0;

/// Upper bound on platforms generated by one `update`, as a multiple of
/// `max_platforms`.
const SPAWN_BUDGET_FACTOR: usize = 4;

/// A registered landing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landing {
    pub platform_id: u64,
    pub kind: PlatformKind,
    /// World y of the platform's top edge.
    pub top: f32,
    pub started_breaking: bool,
}

pub struct PlatformManager {
    platforms: Vec<Platform>,
    rng: StdRng,
    seed: u64,
    next_id: u64,
    frontier_y: f32,
    start_id: u64,
    cfg: PlatformConfig,
    canvas: CanvasConfig,
    start_platform_y: f32,
}

impl PlatformManager {
    pub fn new(cfg: &GameConfig, seed: u64) -> Self {
        let mut pm = PlatformManager {
            platforms: Vec::with_capacity(cfg.platforms.max_platforms),
            rng: StdRng::seed_from_u64(seed),
            seed,
            next_id: 0,
            frontier_y: cfg.game.start_platform_y,
            start_id: 0,
            cfg: cfg.platforms.clone(),
            canvas: cfg.canvas.clone(),
            start_platform_y: cfg.game.start_platform_y,
        };
        pm.generate_initial();
        pm
    }

    /// Drop everything and regenerate from `seed`.
    pub fn reset(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self.next_id = 0;
        self.generate_initial();
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Start platform centred under the player, then `start_count - 1`
    /// platforms stacked above it.
    pub fn generate_initial(&mut self) {
        self.platforms.clear();

        let x = (self.canvas.width - self.cfg.width) / 2.0;
        let id = self.alloc_id();
        self.platforms.push(Platform::new(id, x, self.start_platform_y, PlatformKind::Normal, &self.cfg));
        self.start_id = id;
        self.frontier_y = self.start_platform_y;

        for _ in 1..self.cfg.start_count {
            self.spawn_next();
        }
        log::debug!(
            "generated {} platforms (seed {}), top at y={:.0}",
            self.platforms.len(), self.seed, self.frontier_y,
        );
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Generate one platform a random gap above the frontier.
    fn spawn_next(&mut self) {
        let gap = if self.cfg.max_gap > self.cfg.min_gap {
            self.rng.gen_range(self.cfg.min_gap..=self.cfg.max_gap)
        } else {
            self.cfg.min_gap
        };
        let y = self.frontier_y - gap;
        let kind = self.random_kind();
        let x = self.random_x();
        let id = self.alloc_id();

        let platform = match kind {
            PlatformKind::Moving => {
                let range = if self.cfg.move_range_max > self.cfg.move_range_min {
                    self.rng.gen_range(self.cfg.move_range_min..=self.cfg.move_range_max)
                } else {
                    self.cfg.move_range_min
                };
                let dir = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                Platform::moving(id, x, y, self.cfg.move_speed * dir, range, &self.cfg)
            }
            k => Platform::new(id, x, y, k, &self.cfg),
        };

        self.platforms.push(platform);
        self.frontier_y = y;
    }

    /// Weighted draw over the configured type weights.
    pub fn random_kind(&mut self) -> PlatformKind {
        const KINDS: [PlatformKind; 3] = [PlatformKind::Normal, PlatformKind::Breaking, PlatformKind::Moving];
        match WeightedIndex::new([self.cfg.normal, self.cfg.breaking, self.cfg.moving]) {
            Ok(dist) => KINDS[dist.sample(&mut self.rng)],
            Err(e) => {
                log::warn!("bad platform weights ({e}); generating normal platform");
                PlatformKind::Normal
            }
        }
    }

    /// Left edge inside `[edge_padding, width - platform_width - edge_padding]`.
    pub fn random_x(&mut self) -> f32 {
        let lo = self.cfg.edge_padding;
        let hi = self.canvas.width - self.cfg.width - self.cfg.edge_padding;
        if hi > lo { self.rng.gen_range(lo..=hi) } else { lo.max(0.0) }
    }

    /// Advance all platforms, then spawn, cull and evict relative to the
    /// camera's top edge `camera_y`.
    pub fn update(&mut self, dt: f32, camera_y: f32) -> Vec<GameEvent> {
        let mut events = vec![];

        let cfg = &self.cfg;
        let canvas = &self.canvas;
        self.platforms.retain_mut(|p| {
            let alive = p.update(dt, cfg, canvas);
            if !alive {
                events.push(GameEvent::PlatformBroken { platform_id: p.id });
            }
            alive
        });

        let horizon = camera_y - self.canvas.height;
        let budget = self.cfg.max_platforms.max(1) * SPAWN_BUDGET_FACTOR;
        let mut spawned = 0;
        while self.frontier_y > horizon {
            if spawned == budget {
                log::warn!(
                    "spawn budget of {budget} used up, frontier y={:.0} still below horizon y={horizon:.0}",
                    self.frontier_y,
                );
                break;
            }
            self.spawn_next();
            spawned += 1;
        }
        if spawned > 0 {
            events.push(GameEvent::PlatformsSpawned { count: spawned });
        }

        // After spawning, so a long camera jump cannot leave fresh
        // platforms behind below the view.
        let cull_line = camera_y + self.canvas.height + CULL_MARGIN;
        self.platforms.retain(|p| p.y <= cull_line);

        while self.platforms.len() > self.cfg.max_platforms {
            let Some(idx) = self.lowest_index() else { break };
            let evicted = self.platforms.remove(idx);
            log::debug!("evicted platform {} at y={:.0} (capacity {})", evicted.id, evicted.y, self.cfg.max_platforms);
        }

        events
    }

    /// First platform the falling player touches down on. The hit is
    /// ignored while the platform is crumbling or inside its cooldown.
    pub fn check_collisions(&mut self, player: &Player, now_ms: u64) -> Option<Landing> {
        let body = player.bounds();
        let margin = self.cfg.collision_margin;
        let cooldown = self.cfg.collision_cooldown_ms;

        let platform = self.platforms.iter_mut().find(|p| {
            p.is_landable()
                && p.cooldown_elapsed(now_ms, cooldown)
                && physics::lands_on(&body, player.vy, &p.bounds(), margin)
        })?;

        platform.last_hit_ms = Some(now_ms);
        let started_breaking = platform.start_breaking();
        Some(Landing {
            platform_id: platform.id,
            kind: platform.kind,
            top: platform.y,
            started_breaking,
        })
    }

    fn lowest_index(&self) -> Option<usize> {
        self.platforms
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.y.total_cmp(&b.y))
            .map(|(i, _)| i)
    }

    /// Platform with the smallest y (furthest up).
    pub fn highest(&self) -> Option<&Platform> {
        self.platforms.iter().min_by(|a, b| a.y.total_cmp(&b.y))
    }

    pub fn lowest(&self) -> Option<&Platform> {
        self.lowest_index().map(|i| &self.platforms[i])
    }

    /// The platform the run started on, while it is still in the list.
    pub fn start_platform(&self) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == self.start_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::JumpState;

    const DT: f32 = physics::FRAME_SECS;

    fn gaps(pm: &PlatformManager) -> Vec<f32> {
        let ys: Vec<f32> = pm.iter().map(|p| p.y).collect();
        ys.windows(2).map(|w| w[0] - w[1]).collect()
    }

    fn assert_gaps_in_range(pm: &PlatformManager, cfg: &GameConfig) {
        for g in gaps(pm) {
            assert!(
                g >= cfg.platforms.min_gap - 1e-3 && g <= cfg.platforms.max_gap + 1e-3,
                "gap {g} outside [{}, {}]", cfg.platforms.min_gap, cfg.platforms.max_gap,
            );
        }
    }

    /// A player falling onto the start platform.
    fn falling_onto(pm: &PlatformManager, cfg: &GameConfig) -> Player {
        let start = pm.start_platform().unwrap();
        let mut p = Player::new(cfg);
        p.x = start.x + 10.0;
        p.y = start.y - p.height + 2.0;
        p.vy = 3.0;
        p.state = JumpState::Airborne;
        p
    }

    #[test]
    fn initial_layout() {
        let cfg = GameConfig::default();
        let pm = PlatformManager::new(&cfg, 7);
        assert_eq!(pm.len(), cfg.platforms.start_count);

        let start = pm.start_platform().unwrap();
        assert_eq!(start.kind, PlatformKind::Normal);
        assert_eq!(start.y, cfg.game.start_platform_y);
        assert!((start.x + start.width / 2.0 - cfg.canvas.width / 2.0).abs() < 1e-3);
        assert_eq!(pm.lowest().unwrap().id, start.id);
    }

    #[test]
    fn initial_gaps_in_range() {
        let cfg = GameConfig::default();
        for seed in 0..50 {
            let pm = PlatformManager::new(&cfg, seed);
            assert_gaps_in_range(&pm, &cfg);
        }
    }

    #[test]
    fn gaps_stay_in_range_while_climbing() {
        let cfg = GameConfig::default();
        let mut pm = PlatformManager::new(&cfg, 3);
        let mut camera_y = 0.0;
        for _ in 0..2000 {
            camera_y -= 5.0;
            pm.update(DT, camera_y);
            assert_gaps_in_range(&pm, &cfg);
            assert!(pm.len() <= cfg.platforms.max_platforms);
        }
        let top = pm.highest().unwrap().y;
        assert!(top <= camera_y - cfg.canvas.height);
    }

    #[test]
    fn same_seed_same_layout() {
        let cfg = GameConfig::default();
        let a = PlatformManager::new(&cfg, 42);
        let mut b = PlatformManager::new(&cfg, 1);
        b.reset(42);
        let la: Vec<(f32, f32, PlatformKind)> = a.iter().map(|p| (p.x, p.y, p.kind)).collect();
        let lb: Vec<(f32, f32, PlatformKind)> = b.iter().map(|p| (p.x, p.y, p.kind)).collect();
        assert_eq!(la, lb);
        assert_eq!(b.seed(), 42);
    }

    #[test]
    fn random_x_respects_padding() {
        let cfg = GameConfig::default();
        let mut pm = PlatformManager::new(&cfg, 9);
        let hi = cfg.canvas.width - cfg.platforms.width - cfg.platforms.edge_padding;
        for _ in 0..1000 {
            let x = pm.random_x();
            assert!(x >= cfg.platforms.edge_padding && x <= hi, "x = {x}");
        }
    }

    #[test]
    fn kind_weights_are_honoured() {
        let mut cfg = GameConfig::default();
        cfg.platforms.normal = 0.0;
        cfg.platforms.breaking = 0.0;
        cfg.platforms.moving = 1.0;
        let mut pm = PlatformManager::new(&cfg, 5);
        for _ in 0..100 {
            assert_eq!(pm.random_kind(), PlatformKind::Moving);
        }
        assert!(pm.iter().skip(1).all(|p| p.kind == PlatformKind::Moving && p.motion.is_some()));
    }

    #[test]
    fn no_double_collision_within_cooldown() {
        let cfg = GameConfig::default();
        let mut pm = PlatformManager::new(&cfg, 11);
        let player = falling_onto(&pm, &cfg);

        let hit = pm.check_collisions(&player, 1000).unwrap();
        assert_eq!(hit.top, cfg.game.start_platform_y);
        assert!(pm.check_collisions(&player, 1000 + cfg.platforms.collision_cooldown_ms - 1).is_none());
        assert!(pm.check_collisions(&player, 1000 + cfg.platforms.collision_cooldown_ms).is_some());
    }

    #[test]
    fn rising_player_passes_through() {
        let cfg = GameConfig::default();
        let mut pm = PlatformManager::new(&cfg, 11);
        let mut player = falling_onto(&pm, &cfg);
        player.vy = -3.0;
        assert!(pm.check_collisions(&player, 1000).is_none());
    }

    #[test]
    fn breaking_platform_bounces_once_then_disappears() {
        let mut cfg = GameConfig::default();
        cfg.platforms.normal = 0.0;
        cfg.platforms.breaking = 1.0;
        cfg.platforms.moving = 0.0;
        let mut pm = PlatformManager::new(&cfg, 2);

        let target = pm.iter().nth(1).unwrap().clone();
        assert_eq!(target.kind, PlatformKind::Breaking);
        let mut player = Player::new(&cfg);
        player.x = target.x + 5.0;
        player.y = target.y - player.height + 1.0;
        player.vy = 2.0;
        player.state = JumpState::Airborne;

        let hit = pm.check_collisions(&player, 500).unwrap();
        assert_eq!(hit.platform_id, target.id);
        assert!(hit.started_breaking);
        assert!(pm.check_collisions(&player, 5000).is_none());

        let mut broken = false;
        for _ in 0..60 {
            let events = pm.update(DT, 0.0);
            if events.contains(&GameEvent::PlatformBroken { platform_id: target.id }) {
                broken = true;
                break;
            }
        }
        assert!(broken);
        assert!(pm.iter().all(|p| p.id != target.id));
    }

    #[test]
    fn platforms_below_view_are_culled() {
        let cfg = GameConfig::default();
        let mut pm = PlatformManager::new(&cfg, 4);
        let camera_y = -2000.0;
        pm.update(DT, camera_y);
        let cull_line = camera_y + cfg.canvas.height + CULL_MARGIN;
        assert!(pm.iter().all(|p| p.y <= cull_line));
        assert!(pm.start_platform().is_none());
    }

    #[test]
    fn long_camera_jump_culls_fresh_platforms() {
        let cfg = GameConfig::default();
        let mut pm = PlatformManager::new(&cfg, 4);
        let camera_y = -5000.0;
        pm.update(DT, camera_y);
        let cull_line = camera_y + cfg.canvas.height + CULL_MARGIN;
        assert!(!pm.is_empty());
        assert!(pm.iter().all(|p| p.y <= cull_line));
        assert!(pm.highest().unwrap().y <= camera_y - cfg.canvas.height);
        assert_gaps_in_range(&pm, &cfg);
    }

    #[test]
    fn zero_gap_cannot_hang_the_generator() {
        let mut cfg = GameConfig::default();
        cfg.platforms.min_gap = 0.0;
        cfg.platforms.max_gap = 0.0;
        let mut pm = PlatformManager::new(&cfg, 6);
        let events = pm.update(DT, -1000.0);
        let budget = cfg.platforms.max_platforms * SPAWN_BUDGET_FACTOR;
        assert!(events.contains(&GameEvent::PlatformsSpawned { count: budget }));
        assert!(pm.len() <= cfg.platforms.max_platforms);
    }

    #[test]
    fn validated_small_gaps_keep_platforms_apart() {
        let mut cfg = GameConfig::default();
        cfg.platforms.min_gap = 5.0;
        cfg.platforms.max_gap = 8.0;
        cfg.validate();
        let mut pm = PlatformManager::new(&cfg, 13);
        for step in 1..200 {
            pm.update(DT, -10.0 * step as f32);
            for g in gaps(&pm) {
                assert!(g >= cfg.platforms.height + cfg.platforms.collision_margin - 1e-3, "gap {g}");
            }
        }
    }

    #[test]
    fn capacity_evicts_lowest() {
        let mut cfg = GameConfig::default();
        cfg.platforms.max_platforms = cfg.platforms.start_count;
        let mut pm = PlatformManager::new(&cfg, 8);
        let events = pm.update(DT, -300.0);
        assert!(events.iter().any(|e| matches!(e, GameEvent::PlatformsSpawned { .. })));
        assert_eq!(pm.len(), cfg.platforms.max_platforms);
        assert!(pm.start_platform().is_none());
    }
}
