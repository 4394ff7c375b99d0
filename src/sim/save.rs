/// High score persistence: a single integer in `best.dat`.
///
/// ## File format:
///   Key-value lines, currently just `best=<n>`. Unknown keys are ignored,
///   a missing or unreadable file reads as 0.
///
/// The save directory is also where the log file goes.

use std::path::{Path, PathBuf};

const BEST_FILE: &str = "best.dat";

/// Where persistent files live: a writable exe directory (portable
/// installs), then `~/.local/share/skyhop`, then the CWD.
pub fn save_dir() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            // System installs like /usr/games/ are read-only
            let marker = parent.join(".write_test_skyhop");
            if std::fs::write(&marker, "").is_ok() {
                let _ = std::fs::remove_file(&marker);
                return parent.to_path_buf();
            }
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/skyhop");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn best_path() -> PathBuf {
    save_dir().join(BEST_FILE)
}

pub fn load_high_score() -> u32 {
    load_high_score_from(&best_path())
}

pub fn save_high_score(score: u32) -> Result<(), String> {
    save_high_score_to(&best_path(), score)
}

pub fn load_high_score_from(path: &Path) -> u32 {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_best(&content).unwrap_or_else(|| {
            log::warn!("{} is corrupt; high score reset to 0", path.display());
            0
        }),
        Err(_) => 0,
    }
}

pub fn save_high_score_to(path: &Path, score: u32) -> Result<(), String> {
    std::fs::write(path, format!("best={}\n", score))
        .map_err(|e| format!("Saving high score to {} failed: {}", path.display(), e))
}

fn parse_best(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("best="))
        .and_then(|val| val.trim().parse().ok())
}
