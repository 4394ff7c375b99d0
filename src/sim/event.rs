/// Events emitted during a simulation step.
/// The presentation layer consumes these for messages, saving and reporting.

use crate::domain::platform::PlatformKind;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Landed { platform_id: u64, kind: PlatformKind },
    Jumped,
    PlatformBreaking { platform_id: u64 },
    PlatformBroken { platform_id: u64 },
    PlatformsSpawned { count: usize },
    PlayerFell,
    NewHighScore { score: u32 },
    GameOver { score: u32 },
    Victory { score: u32 },
}
