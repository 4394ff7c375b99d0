/// Input state tracker.
///
/// Tracks which keys are currently held down and where the mouse is being
/// dragged, enabling:
///   - Continuous steering while a key is held
///   - Edge-triggered actions (pause, restart, share) on initial press
///   - Drag-to-steer: while the left button is down, the player follows
///     the pointer column
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};

use crate::domain::player::Steering;
use super::renderer::Viewport;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
pub const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Terminal column under the pointer while the left button is down.
    drag_column: Option<u16>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            drag_column: None,
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(ev) => self.handle_event(ev, Instant::now()),
                Err(e) => {
                    log::warn!("reading terminal event failed: {e}");
                    break;
                }
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn handle_event(&mut self, ev: Event, now: Instant) {
        match ev {
            Event::Key(key) => {
                self.raw_events.push(key);
                match key.kind {
                    KeyEventKind::Release if self.honor_release => {
                        self.last_active.remove(&key.code);
                    }
                    KeyEventKind::Release => {}
                    _ => {
                        let was_held = self.held_at(key.code, now);
                        self.last_active.insert(key.code, now);
                        if !was_held {
                            self.fresh_presses.push(key.code);
                        }
                    }
                }
            }
            Event::Mouse(MouseEvent { kind, column, .. }) => match kind {
                MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => {
                    self.drag_column = Some(column);
                }
                MouseEventKind::Up(MouseButton::Left) => {
                    self.drag_column = None;
                }
                _ => {}
            },
            Event::FocusLost => {
                self.last_active.clear();
                self.drag_column = None;
            }
            _ => {}
        }
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held_at(code, Instant::now())
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// Horizontal intent for this frame. A drag over the playfield wins
    /// over the arrow keys.
    pub fn steering(&self, viewport: &Viewport) -> Steering {
        if let Some(x) = self.drag_column.and_then(|c| viewport.world_x_at(c)) {
            return Steering::toward(x);
        }
        let left = self.any_held(KEYS_LEFT) || self.any_pressed(KEYS_LEFT);
        let right = self.any_held(KEYS_RIGHT) || self.any_pressed(KEYS_RIGHT);
        Steering::keys(left, right)
    }

    // ── Internal ──

    fn held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active.get(&code)
            .map(|t| now.duration_since(*t) < HOLD_TIMEOUT)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, kind: KeyEventKind) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        })
    }

    fn mouse(kind: MouseEventKind, column: u16) -> Event {
        Event::Mouse(MouseEvent { kind, column, row: 5, modifiers: KeyModifiers::NONE })
    }

    fn viewport() -> Viewport {
        Viewport::fit(&GameConfig::default(), 80)
    }

    #[test]
    fn press_is_fresh_once_then_held() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_event(key(KeyCode::Left, KeyEventKind::Press), now);
        assert!(input.was_pressed(KeyCode::Left));
        assert!(input.is_held(KeyCode::Left));

        input.fresh_presses.clear();
        input.handle_event(key(KeyCode::Left, KeyEventKind::Repeat), now);
        assert!(!input.was_pressed(KeyCode::Left));
        assert_eq!(input.steering(&viewport()), Steering::keys(true, false));
    }

    #[test]
    fn release_only_counts_when_honored() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_event(key(KeyCode::Right, KeyEventKind::Press), now);
        input.handle_event(key(KeyCode::Right, KeyEventKind::Release), now);
        assert!(input.is_held(KeyCode::Right));

        input.honor_release = true;
        input.handle_event(key(KeyCode::Right, KeyEventKind::Release), now);
        assert!(!input.is_held(KeyCode::Right));
    }

    #[test]
    fn drag_steers_toward_pointer() {
        let vp = viewport();
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_event(key(KeyCode::Left, KeyEventKind::Press), now);
        input.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), (vp.left + 30) as u16), now);
        input.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), (vp.left + 40) as u16), now);

        let s = input.steering(&vp);
        assert_eq!(s.target_x, vp.world_x_at((vp.left + 40) as u16));

        input.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), (vp.left + 40) as u16), now);
        assert_eq!(input.steering(&vp), Steering::keys(true, false));
    }

    #[test]
    fn drag_outside_field_falls_back_to_keys() {
        let vp = viewport();
        let mut input = InputState::new();
        input.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 0), Instant::now());
        assert_eq!(input.steering(&vp), Steering::default());
    }

    #[test]
    fn ctrl_c_detected() {
        let mut input = InputState::new();
        input.handle_event(Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)), Instant::now());
        assert!(input.ctrl_c_pressed());
    }
}
