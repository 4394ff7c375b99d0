/// Platforms: the things the player bounces on.
///
/// Kind-specific state lives in optional sub-structs so a plain platform
/// carries nothing it does not use:
///   - `Moving`   → `motion`   (horizontal oscillation around an anchor)
///   - `Breaking` → `breaking` (timed disappearance, only after first hit)

use crate::config::{CanvasConfig, PlatformConfig};
use super::physics::{self, Aabb};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlatformKind {
    Normal,
    Breaking,
    Moving,
}

/// Horizontal oscillation state for moving platforms.
#[derive(Clone, Copy, Debug)]
pub struct Motion {
    pub velocity_x: f32,  // units/frame, sign = direction
    pub range: f32,       // max distance from anchor
    pub anchor_x: f32,
}

/// Disappearance progress for a breaking platform that has been hit.
#[derive(Clone, Copy, Debug, Default)]
pub struct BreakState {
    pub elapsed: f32,   // seconds since first contact
    pub progress: f32,  // 0.0 → 1.0
}

#[derive(Clone, Debug)]
pub struct Platform {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: PlatformKind,
    pub motion: Option<Motion>,
    pub breaking: Option<BreakState>,
    /// Simulation time of the last registered landing (debounce).
    pub last_hit_ms: Option<u64>,
}

impl Platform {
    pub fn new(id: u64, x: f32, y: f32, kind: PlatformKind, cfg: &PlatformConfig) -> Self {
        Platform {
            id, x, y,
            width: cfg.width,
            height: cfg.height,
            kind,
            motion: None,
            breaking: None,
            last_hit_ms: None,
        }
    }

    /// A moving platform; `velocity_x` sign picks the initial direction.
    pub fn moving(id: u64, x: f32, y: f32, velocity_x: f32, range: f32, cfg: &PlatformConfig) -> Self {
        let mut p = Platform::new(id, x, y, PlatformKind::Moving, cfg);
        p.motion = Some(Motion { velocity_x, range, anchor_x: x });
        p
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }

    /// Advance motion and break progress by `dt` seconds.
    /// Returns false once the platform has fully broken and must be removed.
    pub fn update(&mut self, dt: f32, cfg: &PlatformConfig, canvas: &CanvasConfig) -> bool {
        if let Some(m) = self.motion.as_mut() {
            // Travel limits: the oscillation range, cut by the playfield edges
            let max_x = (canvas.width - self.width).max(0.0);
            let lo = (m.anchor_x - m.range).max(0.0);
            let hi = (m.anchor_x + m.range).min(max_x);

            self.x += m.velocity_x * physics::frame_scale(dt);
            if self.x <= lo {
                self.x = lo;
                m.velocity_x = m.velocity_x.abs();
            } else if self.x >= hi {
                self.x = hi;
                m.velocity_x = -m.velocity_x.abs();
            }
        }

        if let Some(b) = self.breaking.as_mut() {
            b.elapsed += dt.clamp(0.0, physics::MAX_DT);
            b.progress = (b.elapsed / cfg.breaking_time).min(1.0);
            if b.progress >= 1.0 {
                return false;
            }
        }

        true
    }

    /// Begin the timed disappearance. Only breaking platforms break, and
    /// only once. Returns true if this call started it.
    pub fn start_breaking(&mut self) -> bool {
        if self.kind == PlatformKind::Breaking && self.breaking.is_none() {
            self.breaking = Some(BreakState::default());
            return true;
        }
        false
    }

    pub fn is_breaking(&self) -> bool {
        self.breaking.is_some()
    }

    /// A crumbling platform no longer catches the player.
    pub fn is_landable(&self) -> bool {
        !self.is_breaking()
    }

    /// Has the debounce window passed since the last landing?
    pub fn cooldown_elapsed(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        match self.last_hit_ms {
            Some(t) => now_ms.saturating_sub(t) >= cooldown_ms,
            None => true,
        }
    }

    /// Render alpha: 1.0 solid → 0.0 gone.
    pub fn opacity(&self) -> f32 {
        match self.breaking {
            Some(b) => 1.0 - b.progress,
            None => 1.0,
        }
    }
}
