/// Physics primitives: the movement math shared by player and platforms.
///
/// ## Units
///
/// Velocities are world units per 60 Hz frame; accelerations are units per
/// frame². The simulation passes real seconds (`dt`) and every integrator
/// converts with `frame_scale(dt)`, so a 16 ms tick behaves like one frame.
///
/// ## Landing contact
///
/// A landing registers only when ALL of:
///   - the player is falling (`vy > 0`)
///   - the boxes overlap horizontally
///   - the player's bottom edge is inside the platform's top band
///     `(top, top + height + margin)`
///
/// Cooldown and landability are decided by the platform manager, not here.

/// Nominal frame duration the per-frame constants were tuned for.
pub const FRAME_SECS: f32 = 1.0 / 60.0;

/// Largest delta time accepted by one step (a stalled terminal must not
/// teleport the player through platforms).
pub const MAX_DT: f32 = 0.1;

/// Axis-aligned box. `(x, y)` is the top-left corner, y grows downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Aabb { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> f32 { self.x + self.w }

    #[inline]
    pub fn bottom(&self) -> f32 { self.y + self.h }

    #[inline]
    pub fn overlaps_x(&self, other: &Aabb) -> bool {
        self.right() > other.x && self.x < other.right()
    }
}

/// Seconds → frames, with the stall clamp applied.
#[inline]
pub fn frame_scale(dt: f32) -> f32 {
    dt.clamp(0.0, MAX_DT) / FRAME_SECS
}

/// Number of frame-sized slices a tick of `dt` is integrated in, so a
/// stalled frame cannot carry the player through a platform's top band.
pub fn substeps(dt: f32) -> u32 {
    (frame_scale(dt) - 1e-3).ceil().max(1.0) as u32
}

/// Vertical velocity is bounded by the jump impulse upward and the
/// terminal fall speed downward.
#[inline]
pub fn clamp_vertical(vy: f32, jump_force: f32, max_fall: f32) -> f32 {
    vy.clamp(jump_force, max_fall)
}

/// Horizontal screen wrap: leaving fully off one edge re-enters at the other.
#[inline]
pub fn wrap_x(x: f32, width: f32, world_width: f32) -> f32 {
    if x < -width {
        world_width
    } else if x > world_width {
        -width
    } else {
        x
    }
}

/// Does a falling player touch down on the platform's top band?
pub fn lands_on(player: &Aabb, vy: f32, platform: &Aabb, margin: f32) -> bool {
    if vy <= 0.0 { return false; }
    if !player.overlaps_x(platform) { return false; }
    let feet = player.bottom();
    feet > platform.y && feet < platform.bottom() + margin
}

/// Height gained by one bounce, integrated exactly as the player update
/// does it (gravity first, then position) at one-frame steps.
pub fn jump_apex(jump_force: f32, gravity: f32) -> f32 {
    if gravity <= 0.0 || jump_force >= 0.0 { return 0.0; }
    let mut vy = jump_force;
    let mut rise = 0.0;
    loop {
        vy += gravity;
        if vy >= 0.0 { break; }
        rise -= vy;
    }
    rise
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(x: f32, y: f32) -> Aabb {
        Aabb::new(x, y, 40.0, 40.0)
    }

    fn platform_at(x: f32, y: f32) -> Aabb {
        Aabb::new(x, y, 70.0, 20.0)
    }

    // ── lands_on ──

    #[test]
    fn lands_when_falling_into_top_band() {
        let p = player_at(100.0, 462.0); // feet at 502, platform top 500
        assert!(lands_on(&p, 3.0, &platform_at(90.0, 500.0), 5.0));
    }

    #[test]
    fn no_landing_while_rising() {
        let p = player_at(100.0, 462.0);
        assert!(!lands_on(&p, -3.0, &platform_at(90.0, 500.0), 5.0));
        assert!(!lands_on(&p, 0.0, &platform_at(90.0, 500.0), 5.0));
    }

    #[test]
    fn no_landing_without_horizontal_overlap() {
        let p = player_at(0.0, 462.0);
        assert!(!lands_on(&p, 3.0, &platform_at(40.0, 500.0), 5.0)); // edges touch only
    }

    #[test]
    fn no_landing_above_or_below_band() {
        let plat = platform_at(90.0, 500.0);
        assert!(!lands_on(&player_at(100.0, 455.0), 3.0, &plat, 5.0)); // feet 495: above
        assert!(!lands_on(&player_at(100.0, 486.0), 3.0, &plat, 5.0)); // feet 526: below band
        assert!(lands_on(&player_at(100.0, 484.0), 3.0, &plat, 5.0));  // feet 524: inside
    }

    // ── integrator helpers ──

    #[test]
    fn frame_scale_is_one_frame_at_60hz() {
        assert!((frame_scale(FRAME_SECS) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn long_ticks_split_into_frames() {
        assert_eq!(substeps(FRAME_SECS), 1);
        assert_eq!(substeps(0.016), 1);
        assert_eq!(substeps(0.0), 1);
        assert_eq!(substeps(f32::NAN), 1);
        assert_eq!(substeps(MAX_DT), 6);
        assert_eq!(substeps(2.0), 6);
    }

    #[test]
    fn frame_scale_clamps_stalls_and_negatives() {
        assert!((frame_scale(5.0) - MAX_DT / FRAME_SECS).abs() < 1e-3);
        assert_eq!(frame_scale(-1.0), 0.0);
    }

    #[test]
    fn clamp_vertical_bounds() {
        assert_eq!(clamp_vertical(20.0, -9.5, 8.0), 8.0);
        assert_eq!(clamp_vertical(-20.0, -9.5, 8.0), -9.5);
        assert_eq!(clamp_vertical(1.0, -9.5, 8.0), 1.0);
    }

    #[test]
    fn wrap_x_both_edges() {
        assert_eq!(wrap_x(-41.0, 40.0, 360.0), 360.0);
        assert_eq!(wrap_x(361.0, 40.0, 360.0), -40.0);
        assert_eq!(wrap_x(-39.0, 40.0, 360.0), -39.0);
    }

    #[test]
    fn apex_matches_discrete_integration() {
        let apex = jump_apex(-9.5, 0.4);
        assert!((apex - 108.1).abs() < 0.1, "apex = {apex}");
        assert_eq!(jump_apex(9.5, 0.4), 0.0);
    }
}
