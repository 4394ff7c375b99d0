/// Score reporting to an external host.
///
/// The game hands finished scores to a `HostBridge` as one JSON document per
/// message. With a `report_file` configured, messages are appended as JSON
/// lines for a wrapper process to pick up; otherwise they are dropped.
///
/// Payload:
///   `{"action":"gameOver","score":812,"highScore":1290,"timestamp":1700000000000}`
/// `action` is `gameOver`, `victory` or `share`; a share also carries `text`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::GameConfig;

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ReportAction {
    GameOver,
    Victory,
    Share,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub action: ReportAction,
    pub score: u32,
    pub high_score: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ScoreReport {
    pub fn new(action: ReportAction, score: u32, high_score: u32) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let text = (action == ReportAction::Share).then(|| share_text(score));
        ScoreReport { action, score, high_score, timestamp, text }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("Encoding score report failed: {}", e))
    }
}

/// The message offered when the player shares a score.
pub fn share_text(score: u32) -> String {
    format!("I scored {} points in Skyhop! Can you beat my score?", score)
}

/// Outbound channel to whatever hosts the game.
pub trait HostBridge {
    fn send_data(&mut self, json: &str) -> Result<(), String>;

    fn send_report(&mut self, report: &ScoreReport) -> Result<(), String> {
        let json = report.to_json()?;
        self.send_data(&json)
    }
}

/// Appends each message as one line to a file.
pub struct JsonLinesBridge {
    path: PathBuf,
}

impl JsonLinesBridge {
    pub fn new(path: PathBuf) -> Self {
        JsonLinesBridge { path }
    }
}

impl HostBridge for JsonLinesBridge {
    fn send_data(&mut self, json: &str) -> Result<(), String> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("Opening report file {} failed: {}", self.path.display(), e))?;
        writeln!(file, "{}", json)
            .map_err(|e| format!("Writing report file {} failed: {}", self.path.display(), e))
    }
}

/// No host attached.
pub struct NullBridge;

impl HostBridge for NullBridge {
    fn send_data(&mut self, json: &str) -> Result<(), String> {
        log::debug!("no report host; dropped {json}");
        Ok(())
    }
}

pub fn bridge_for(cfg: &GameConfig) -> Box<dyn HostBridge> {
    match &cfg.report_file {
        Some(path) => {
            log::info!("reporting scores to {}", path.display());
            Box::new(JsonLinesBridge::new(path.clone()))
        }
        None => Box::new(NullBridge),
    }
}
