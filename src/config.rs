use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::{Tile, DEFAULT_SIZE, WIN_TILE};
use crate::progress::Identity;

/// User settings, read from `settings.json` in the data directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub board_size: usize,
    pub win_threshold: Tile,
    /// Signed-in user id; absent means guest.
    pub user: Option<String>,
    /// Where saves live; defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_SIZE,
            win_threshold: WIN_TILE,
            user: None,
            data_dir: None,
        }
    }
}

impl Settings {
    pub fn identity(&self) -> Identity { Identity::from_user_id(self.user.as_deref()) }
}

pub struct Paths {
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "neon-arcade", "Neon2048")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    Ok(Paths { settings_path: dir.join("settings.json"), data_dir: dir })
}

/// Read settings from `path`, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_settings(path: &Path) -> Settings {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Settings::default(),
    };
    match serde_json::from_str::<Settings>(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("ignoring malformed settings {}: {e}", path.display());
            Settings::default()
        }
    }
}

pub fn save_settings(path: &Path, s: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(s)?;
    write_atomic(path, &data).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write through `<path>.tmp` and rename over `path`. The temp file is
/// removed if either step fails.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let res = fs::write(&tmp, data).and_then(|()| fs::rename(&tmp, path));
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let s = load_settings(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.identity(), Identity::Guest);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"user": "99"}"#).unwrap();
        let s = load_settings(&path);
        assert_eq!(s.board_size, 4);
        assert_eq!(s.win_threshold, 2048);
        assert_eq!(s.identity(), Identity::User("99".into()));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = Settings { board_size: 5, win_threshold: 4096, user: None, data_dir: Some(dir.path().into()) };
        save_settings(&path, &s).unwrap();
        assert_eq!(load_settings(&path), s);
    }

    #[test]
    fn failed_save_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::create_dir_all(path.join("blocker")).unwrap();
        assert!(save_settings(&path, &Settings::default()).is_err());
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "board_size = 5").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }
}
