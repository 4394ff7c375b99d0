pub mod diagnostics;
pub mod event;
pub mod platforms;
pub mod report;
pub mod save;
pub mod step;
pub mod world;
