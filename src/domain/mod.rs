pub mod physics;
pub mod platform;
pub mod player;
