/// Gamepad steering and menu buttons via gilrs.
///
/// The D-pad or left stick steers. Confirm, cancel and pause are bound by
/// button name in the `[gamepad]` section of config.toml; the defaults are
/// confirm = A/Start, cancel = Select, pause = Start.

use std::collections::HashSet;

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::domain::player::Steering;

/// Stick deflection below this is treated as centred.
const DEADZONE: f32 = 0.25;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PadButton {
    South,
    East,
    West,
    North,
    LeftBumper,
    RightBumper,
    Start,
    Select,
    DPadLeft,
    DPadRight,
}

impl PadButton {
    /// Case-insensitive. Face buttons take the Xbox letter or the compass name.
    fn parse(name: &str) -> Option<PadButton> {
        let button = match name.trim().to_ascii_lowercase().as_str() {
            "a" | "south" => PadButton::South,
            "b" | "east" => PadButton::East,
            "x" | "west" => PadButton::West,
            "y" | "north" => PadButton::North,
            "l1" | "lb" => PadButton::LeftBumper,
            "r1" | "rb" => PadButton::RightBumper,
            "start" => PadButton::Start,
            "select" | "back" => PadButton::Select,
            _ => return None,
        };
        Some(button)
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(button: Button) -> Option<PadButton> {
        Some(match button {
            Button::South => PadButton::South,
            Button::East => PadButton::East,
            Button::West => PadButton::West,
            Button::North => PadButton::North,
            Button::LeftTrigger => PadButton::LeftBumper,
            Button::RightTrigger => PadButton::RightBumper,
            Button::Start => PadButton::Start,
            Button::Select => PadButton::Select,
            Button::DPadLeft => PadButton::DPadLeft,
            Button::DPadRight => PadButton::DPadRight,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadAction {
    Confirm,
    Cancel,
    Pause,
}

#[derive(Debug, PartialEq)]
struct Bindings {
    confirm: Vec<PadButton>,
    cancel: Vec<PadButton>,
    pause: Vec<PadButton>,
}

impl Default for Bindings {
    fn default() -> Self {
        Bindings {
            confirm: vec![PadButton::South, PadButton::Start],
            cancel: vec![PadButton::Select],
            pause: vec![PadButton::Start],
        }
    }
}

impl Bindings {
    /// Unrecognised names are skipped. An action whose list ends up
    /// empty keeps its default binding.
    fn from_config(cfg: &GamepadConfig) -> Self {
        let defaults = Bindings::default();
        let pick = |names: &[String], fallback: Vec<PadButton>| {
            let parsed: Vec<PadButton> = names.iter().filter_map(|n| PadButton::parse(n)).collect();
            if parsed.is_empty() { fallback } else { parsed }
        };
        Bindings {
            confirm: pick(&cfg.confirm, defaults.confirm),
            cancel: pick(&cfg.cancel, defaults.cancel),
            pause: pick(&cfg.pause, defaults.pause),
        }
    }

    fn buttons(&self, action: PadAction) -> &[PadButton] {
        match action {
            PadAction::Confirm => &self.confirm,
            PadAction::Cancel => &self.cancel,
            PadAction::Pause => &self.pause,
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    held: HashSet<PadButton>,
    /// Buttons that went down since the last `update()`.
    pressed: Vec<PadButton>,
    stick_x: f32,
    bindings: Bindings,

    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut pad = GamepadState::detached();

        #[cfg(feature = "gamepad")]
        match Gilrs::new() {
            Ok(g) => {
                pad.connected = g.gamepads().next().is_some();
                pad.gilrs = Some(g);
            }
            Err(e) => log::warn!("gamepad support unavailable: {e}"),
        }

        pad
    }

    /// No backend attached; only `press`/`release` change state.
    fn detached() -> Self {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: None,
            held: HashSet::new(),
            pressed: Vec::new(),
            stick_x: 0.0,
            bindings: Bindings::default(),
            connected: false,
        }
    }

    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        self.bindings = Bindings::from_config(cfg);
        log::debug!("gamepad bindings: {:?}", self.bindings);
    }

    /// Once per frame, before reading any action.
    pub fn update(&mut self) {
        self.pressed.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else { return };
        let events: Vec<EventType> = std::iter::from_fn(|| gilrs.next_event()).map(|e| e.event).collect();

        for event in events {
            match event {
                EventType::ButtonPressed(b, _) => {
                    self.connected = true;
                    if let Some(b) = PadButton::from_gilrs(b) { self.press(b); }
                }
                EventType::ButtonReleased(b, _) => {
                    if let Some(b) = PadButton::from_gilrs(b) { self.release(b); }
                }
                EventType::AxisChanged(Axis::LeftStickX, value, _) => {
                    self.connected = true;
                    self.stick_x = value;
                }
                EventType::Connected => {
                    self.connected = true;
                    log::info!("gamepad connected");
                }
                EventType::Disconnected => {
                    self.disconnect();
                    log::info!("gamepad disconnected");
                }
                _ => {}
            }
        }
    }

    fn press(&mut self, button: PadButton) {
        if self.held.insert(button) {
            self.pressed.push(button);
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release(&mut self, button: PadButton) {
        self.held.remove(&button);
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn disconnect(&mut self) {
        self.connected = false;
        self.held.clear();
        self.pressed.clear();
        self.stick_x = 0.0;
    }

    pub fn action_pressed(&self, action: PadAction) -> bool {
        self.bindings.buttons(action).iter().any(|b| self.pressed.contains(b))
    }

    pub fn confirm_pressed(&self) -> bool { self.action_pressed(PadAction::Confirm) }
    pub fn cancel_pressed(&self) -> bool { self.action_pressed(PadAction::Cancel) }
    pub fn pause_pressed(&self) -> bool { self.action_pressed(PadAction::Pause) }

    pub fn steering(&self) -> Steering {
        let left = self.held.contains(&PadButton::DPadLeft) || self.stick_x < -DEADZONE;
        let right = self.held.contains(&PadButton::DPadRight) || self.stick_x > DEADZONE;
        Steering::keys(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn button_names_are_case_insensitive() {
        assert_eq!(PadButton::parse("start"), Some(PadButton::Start));
        assert_eq!(PadButton::parse(" Back "), Some(PadButton::Select));
        assert_eq!(PadButton::parse("SOUTH"), Some(PadButton::South));
        assert_eq!(PadButton::parse("rb"), Some(PadButton::RightBumper));
        assert_eq!(PadButton::parse("Turbo"), None);
    }

    #[test]
    fn config_overrides_bindings() {
        let cfg = GamepadConfig {
            confirm: names(&["B"]),
            cancel: names(&["Y", "L1"]),
            pause: names(&["R1"]),
        };
        let b = Bindings::from_config(&cfg);
        assert_eq!(b.confirm, vec![PadButton::East]);
        assert_eq!(b.cancel, vec![PadButton::North, PadButton::LeftBumper]);
        assert_eq!(b.pause, vec![PadButton::RightBumper]);
    }

    #[test]
    fn unknown_names_keep_defaults() {
        let cfg = GamepadConfig {
            confirm: names(&["Turbo"]),
            cancel: vec![],
            pause: names(&["Start"]),
        };
        assert_eq!(Bindings::from_config(&cfg), Bindings::default());
    }

    #[test]
    fn presses_are_edge_triggered() {
        let mut pad = GamepadState::detached();
        pad.press(PadButton::Start);
        assert!(pad.confirm_pressed());
        assert!(pad.pause_pressed());
        assert!(!pad.cancel_pressed());

        pad.update();
        pad.press(PadButton::Start);
        assert!(!pad.confirm_pressed(), "still held, not a new press");

        pad.release(PadButton::Start);
        pad.press(PadButton::Start);
        assert!(pad.confirm_pressed());
    }

    #[test]
    fn dpad_and_stick_steer() {
        let mut pad = GamepadState::detached();
        assert_eq!(pad.steering(), Steering::default());

        pad.press(PadButton::DPadLeft);
        assert_eq!(pad.steering(), Steering::keys(true, false));
        pad.release(PadButton::DPadLeft);

        pad.stick_x = 0.1;
        assert_eq!(pad.steering(), Steering::default());
        pad.stick_x = 0.8;
        assert_eq!(pad.steering(), Steering::keys(false, true));

        pad.disconnect();
        assert_eq!(pad.steering(), Steering::default());
    }
}
