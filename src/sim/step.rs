/// The step function: advances the world by one tick.
///
/// A tick longer than one 60 Hz frame is integrated in frame-sized
/// slices (`physics::substeps`) so a stalled frame cannot skip a
/// platform's landing band. Each slice runs, in order:
///   1. Clock
///   2. Player integration (falling out of view ends the run)
///   3. Landing check → snap onto the platform
///   4. Bounce: a grounded player jumps; a rejected jump retries next slice
///   5. Camera follow
///   6. Score from the best height reached (never decreases)
///   7. Platform motion, generation and culling around the camera
///   8. Victory check
///
/// Anomaly checks run once per tick, after the last slice.

use crate::config::GameConfig;
use crate::domain::physics;
use crate::domain::player::{JumpState, Steering};
use super::diagnostics::{self, JumpRecord, LandingRecord};
use super::event::GameEvent;
use super::world::{Phase, WorldState};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, steering: Steering, dt: f32, cfg: &GameConfig) -> Vec<GameEvent> {
    if world.phase != Phase::Playing { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 { world.message.clear(); }
    }

    let dt = if dt.is_finite() { dt.clamp(0.0, physics::MAX_DT) } else { 0.0 };
    let slices = physics::substeps(dt);
    let slice = dt / slices as f32;
    let start_ms = world.clock_ms;

    for i in 1..=slices {
        world.clock_ms = start_ms + (slice * i as f32 * 1000.0).round() as u64;
        advance(world, steering, slice, cfg, &mut events);
        if world.phase != Phase::Playing {
            return events;
        }
    }

    for anomaly in diagnostics::check_anomalies(world) {
        diagnostics::log_anomaly(&anomaly, world);
    }
    events
}

/// One frame-sized slice of a tick.
fn advance(world: &mut WorldState, steering: Steering, dt: f32, cfg: &GameConfig, events: &mut Vec<GameEvent>) {
    let now = world.clock_ms;

    let death_line = world.death_line(cfg);
    if !world.player.update(dt, steering, death_line, cfg) {
        log::debug!("player fell below y={death_line:.0} at tick {}", world.tick);
        events.push(GameEvent::PlayerFell);
        events.extend(finish_run(world, Phase::GameOver));
        return;
    }

    resolve_landing(world, now, events);
    resolve_bounce(world, now, cfg, events);

    world.camera.follow(world.player.y);
    resolve_score(world, cfg);

    let camera_y = world.camera.y;
    events.extend(world.platforms.update(dt, camera_y));

    if cfg.game.victory_score > 0 && world.score >= cfg.game.victory_score {
        events.extend(finish_run(world, Phase::Victory));
    }
}

// ══════════════════════════════════════════════════════════════
// Landing and bounce
// ══════════════════════════════════════════════════════════════

fn resolve_landing(world: &mut WorldState, now: u64, events: &mut Vec<GameEvent>) {
    let Some(hit) = world.platforms.check_collisions(&world.player, now) else { return };

    let vy_before = world.player.vy;
    world.player.land_on(hit.top);
    world.stats.record_landing(LandingRecord {
        clock_ms: now,
        tick: world.tick,
        platform_id: hit.platform_id,
        vy_before,
        player_y: world.player.y,
    });
    log::trace!("landed on platform {} ({:?}) at y={:.0}", hit.platform_id, hit.kind, hit.top);
    events.push(GameEvent::Landed { platform_id: hit.platform_id, kind: hit.kind });
    if hit.started_breaking {
        events.push(GameEvent::PlatformBreaking { platform_id: hit.platform_id });
    }
}

fn resolve_bounce(world: &mut WorldState, now: u64, cfg: &GameConfig, events: &mut Vec<GameEvent>) {
    if world.player.state != JumpState::Grounded { return; }
    if world.player.jump(now, cfg) {
        world.stats.record_jump(JumpRecord {
            clock_ms: now,
            sequence: world.player.total_jumps,
            vy: world.player.vy,
        });
        events.push(GameEvent::Jumped);
    }
}

// ══════════════════════════════════════════════════════════════
// Score
// ══════════════════════════════════════════════════════════════

fn resolve_score(world: &mut WorldState, cfg: &GameConfig) {
    let climbed = cfg.player_start_y() - world.player.y;
    if climbed > world.best_height {
        world.best_height = climbed;
    }
    let score = (world.best_height * cfg.game.score_multiplier).floor().max(0.0) as u32;
    world.score = world.score.max(score);
}

// ══════════════════════════════════════════════════════════════
// End of run
// ══════════════════════════════════════════════════════════════

/// Close the run with `outcome` (GameOver or Victory), folding the score
/// into the high score.
pub fn finish_run(world: &mut WorldState, outcome: Phase) -> Vec<GameEvent> {
    let mut events = vec![];
    world.phase = outcome;
    world.anim_tick = 0;

    if world.score > world.high_score {
        world.high_score = world.score;
        world.new_high_score = true;
        events.push(GameEvent::NewHighScore { score: world.score });
    }

    match outcome {
        Phase::Victory => {
            world.set_message("You made it to the top!", 0);
            events.push(GameEvent::Victory { score: world.score });
        }
        _ => events.push(GameEvent::GameOver { score: world.score }),
    }
    log::info!(
        "run ended: {:?}, score {} (best {}), {} jumps, {} ticks",
        outcome, world.score, world.high_score, world.player.total_jumps, world.tick,
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::PlatformKind;

    const DT: f32 = physics::FRAME_SECS;

    fn playing(cfg: &GameConfig, seed: u64) -> WorldState {
        let mut w = WorldState::new(cfg, seed, 0);
        w.start_game(cfg);
        w
    }

    fn layout(w: &WorldState) -> Vec<(u64, f32, f32)> {
        w.platforms.iter().map(|p| (p.id, p.x, p.y)).collect()
    }

    #[test]
    fn first_tick_bounces_off_start_platform() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 1);
        let events = step(&mut w, Steering::default(), DT, &cfg);
        assert!(events.contains(&GameEvent::Jumped));
        assert_eq!(w.player.state, JumpState::Jumping);
        assert_eq!(w.player.vy, cfg.player.jump_force);
    }

    #[test]
    fn nothing_moves_while_paused() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 1);
        w.toggle_pause();
        let y = w.player.y;
        assert!(step(&mut w, Steering::keys(true, false), DT, &cfg).is_empty());
        assert_eq!(w.player.y, y);
        assert_eq!(w.clock_ms, 0);
    }

    #[test]
    fn score_never_decreases() {
        let cfg = GameConfig { game: crate::config::RulesConfig { victory_score: 0, ..Default::default() }, ..Default::default() };
        let mut w = playing(&cfg, 21);
        let mut last = 0;
        for i in 0..3000 {
            // Drift back and forth so the player also falls past platforms
            let steering = if (i / 120) % 2 == 0 { Steering::keys(true, false) } else { Steering::keys(false, true) };
            step(&mut w, steering, DT, &cfg);
            assert!(w.score >= last, "score dropped from {last} to {}", w.score);
            last = w.score;
            if w.phase != Phase::Playing { break; }
        }
    }

    #[test]
    fn vertical_speed_stays_clamped_in_play() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 5);
        for _ in 0..1500 {
            step(&mut w, Steering::keys(false, true), DT, &cfg);
            assert!(w.player.vy >= cfg.player.jump_force - 1e-4);
            assert!(w.player.vy <= cfg.player.max_fall_speed + 1e-4);
            if w.phase != Phase::Playing { break; }
        }
    }

    #[test]
    fn falling_out_of_view_is_game_over() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 1);
        w.high_score = 1000;
        w.player.state = JumpState::Airborne;
        w.player.y = w.death_line(&cfg) + 1.0;
        let events = step(&mut w, Steering::default(), DT, &cfg);
        assert_eq!(w.phase, Phase::GameOver);
        assert!(events.contains(&GameEvent::PlayerFell));
        assert!(events.contains(&GameEvent::GameOver { score: 0 }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::NewHighScore { .. })));
        assert_eq!(w.high_score, 1000);
    }

    #[test]
    fn restart_resets_score_and_layout() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 99);
        let fresh = layout(&w);

        for _ in 0..200 {
            step(&mut w, Steering::default(), DT, &cfg);
        }
        assert!(w.score > 0);

        w.start_game(&cfg);
        assert_eq!(w.score, 0);
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(layout(&w), fresh);
    }

    #[test]
    fn reaching_victory_score_wins() {
        let cfg = GameConfig { game: crate::config::RulesConfig { victory_score: 5, ..Default::default() }, ..Default::default() };
        let mut w = playing(&cfg, 3);
        let mut all = vec![];
        for _ in 0..120 {
            all.extend(step(&mut w, Steering::default(), DT, &cfg));
            if w.phase != Phase::Playing { break; }
        }
        assert_eq!(w.phase, Phase::Victory);
        assert!(all.iter().any(|e| matches!(e, GameEvent::Victory { .. })));
        assert!(all.contains(&GameEvent::NewHighScore { score: w.score }));
        assert!(w.new_high_score);
        assert_eq!(w.high_score, w.score);
    }

    #[test]
    fn stalled_frame_still_lands() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 1);
        let (start_id, top) = {
            let start = w.platforms.start_platform().unwrap();
            (start.id, start.y)
        };
        w.player.state = JumpState::Airborne;
        w.player.can_jump = false;
        w.player.vy = cfg.player.max_fall_speed;
        w.player.y = top - w.player.height - 10.0;

        // A single 60 Hz frame would move 48 units at this speed, past the
        // whole landing band.
        let events = step(&mut w, Steering::default(), physics::MAX_DT, &cfg);
        assert!(
            events.contains(&GameEvent::Landed { platform_id: start_id, kind: PlatformKind::Normal }),
            "events: {events:?}",
        );
        assert!(w.player.bounds().bottom() <= top);
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.clock_ms, 100);
        assert_eq!(w.stats.landings.last().map(|l| l.platform_id), Some(start_id));
    }

    #[test]
    fn jumps_are_recorded() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 1);
        step(&mut w, Steering::default(), DT, &cfg);
        let jump = w.stats.jumps.last().copied().unwrap();
        assert_eq!(jump.sequence, 1);
        assert_eq!(jump.vy, cfg.player.jump_force);
    }

    #[test]
    fn camera_follows_climb() {
        let cfg = GameConfig::default();
        let mut w = playing(&cfg, 8);
        let mut prev = w.camera.y;
        for _ in 0..600 {
            step(&mut w, Steering::default(), DT, &cfg);
            assert!(w.camera.y <= prev);
            prev = w.camera.y;
            if w.phase != Phase::Playing { break; }
        }
    }
}
