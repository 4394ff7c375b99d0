/// Player: physics state and the jump state machine.
///
/// ```text
///   Grounded ──jump()──▶ Jumping ──apex (vy ≥ 0)──▶ Airborne
///      ▲                                              │
///      └──────────────── land_on() ───────────────────┘
/// ```
///
/// `jump()` is a no-op (velocity untouched) when either gate is closed:
///   - less than `jump_cooldown_ms` since the previous jump
///   - `can_jump` is false: re-armed only by landing or by falling
///     faster than `REARM_FALL_SPEED`

use crate::config::{GameConfig, PlayerConfig};
use super::physics::{self, Aabb};

/// Fall speed (units/frame) above which a mid-air jump is re-armed.
const REARM_FALL_SPEED: f32 = 0.5;

/// Keyboard horizontal speed below this snaps to rest.
const REST_SPEED: f32 = 0.1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpState {
    Grounded,
    Airborne,
    Jumping,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

/// Normalized horizontal intent for one frame.
///
/// Keyboard / gamepad produce `left` / `right`; a pointer drag produces
/// `target_x` (desired centre, world units). A target wins over keys.
/// A target that carried the player across a screen edge is ignored
/// until the pointer moves or is released.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Steering {
    pub left: bool,
    pub right: bool,
    pub target_x: Option<f32>,
}

impl Steering {
    pub fn keys(left: bool, right: bool) -> Self {
        Steering { left, right, target_x: None }
    }

    pub fn toward(x: f32) -> Self {
        Steering { left: false, right: false, target_x: Some(x) }
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub state: JumpState,
    pub facing: Facing,
    pub can_jump: bool,
    /// Simulation time of the last accepted jump (None = never).
    pub last_jump_ms: Option<u64>,
    pub total_jumps: u32,
    /// Drag target in force when the player last wrapped.
    spent_target: Option<f32>,
}

impl Player {
    /// Player standing centred on the start platform.
    pub fn new(cfg: &GameConfig) -> Self {
        let mut p = Player {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            width: cfg.player.width,
            height: cfg.player.height,
            state: JumpState::Grounded,
            facing: Facing::Right,
            can_jump: true,
            last_jump_ms: None,
            total_jumps: 0,
            spent_target: None,
        };
        p.reset(cfg);
        p
    }

    pub fn reset(&mut self, cfg: &GameConfig) {
        self.width = cfg.player.width;
        self.height = cfg.player.height;
        self.x = cfg.canvas.width / 2.0 - self.width / 2.0;
        self.y = cfg.player_start_y();
        self.vx = 0.0;
        self.vy = 0.0;
        self.state = JumpState::Grounded;
        self.facing = Facing::Right;
        self.can_jump = true;
        self.last_jump_ms = None;
        self.total_jumps = 0;
        self.spent_target = None;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Integrate one step. Returns false once the player has dropped
    /// below `death_line` (world y).
    pub fn update(&mut self, dt: f32, steering: Steering, death_line: f32, cfg: &GameConfig) -> bool {
        let pc = &cfg.player;
        let k = physics::frame_scale(dt);

        if self.state != JumpState::Grounded {
            self.vy += pc.gravity * k;
        }
        self.vy = physics::clamp_vertical(self.vy, pc.jump_force, pc.max_fall_speed);

        let target = steering.target_x;
        if target != self.spent_target {
            self.spent_target = None;
        }
        let steering = if self.spent_target.is_some() {
            Steering { target_x: None, ..steering }
        } else {
            steering
        };

        self.steer(steering, k, pc);
        self.x += self.vx * k;
        self.y += self.vy * k;

        let wrapped = physics::wrap_x(self.x, self.width, cfg.canvas.width);
        if wrapped != self.x {
            self.x = wrapped;
            if target.is_some() {
                self.spent_target = target;
            }
        }

        if self.vx < -REST_SPEED {
            self.facing = Facing::Left;
        } else if self.vx > REST_SPEED {
            self.facing = Facing::Right;
        }

        if self.state == JumpState::Jumping && self.vy >= 0.0 {
            self.state = JumpState::Airborne;
        }
        if self.vy > REARM_FALL_SPEED {
            self.can_jump = true;
        }

        self.y <= death_line
    }

    fn steer(&mut self, steering: Steering, k: f32, pc: &PlayerConfig) {
        if let Some(target) = steering.target_x {
            let diff = (target - self.width / 2.0) - self.x;
            self.vx = (diff * pc.steer_gain).clamp(-pc.max_speed, pc.max_speed);
        } else if steering.left && !steering.right {
            self.vx = (self.vx - pc.acceleration * k).max(-pc.max_speed);
        } else if steering.right && !steering.left {
            self.vx = (self.vx + pc.acceleration * k).min(pc.max_speed);
        } else {
            self.vx *= pc.friction.powf(k);
            if self.vx.abs() < REST_SPEED {
                self.vx = 0.0;
            }
        }
    }

    /// Try to jump. Returns true if the jump happened.
    pub fn jump(&mut self, now_ms: u64, cfg: &GameConfig) -> bool {
        if let Some(last) = self.last_jump_ms {
            let since = now_ms.saturating_sub(last);
            if since < cfg.game.jump_cooldown_ms {
                log::trace!("jump rejected: cooldown ({since} ms < {} ms)", cfg.game.jump_cooldown_ms);
                return false;
            }
        }
        if !self.can_jump {
            log::trace!("jump rejected: not re-armed (vy {:.2})", self.vy);
            return false;
        }

        self.vy = cfg.player.jump_force;
        self.state = JumpState::Jumping;
        self.can_jump = false;
        self.last_jump_ms = Some(now_ms);
        self.total_jumps += 1;
        true
    }

    /// Touch down on a platform whose top edge is at world y `top`.
    pub fn land_on(&mut self, top: f32) {
        self.y = top - self.height;
        self.vy = 0.0;
        self.state = JumpState::Grounded;
        self.can_jump = true;
    }
}
