//! Saved progress keyed by player identity and game id.
//!
//! Two stores ship with the crate: [`MemoryStore`] for tests/embedding and
//! [`FileStore`], which keeps one JSON document per key in a directory.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rand::Rng;

use crate::config::write_atomic;
use crate::session::{Session, SessionError, SessionState};

const STORAGE_PREFIX: &str = "arcade:progress:";

#[derive(thiserror::Error, Debug)]
pub enum ProgressError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who the progress belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    User(String),
    Guest,
}

impl Identity {
    /// `Some(id)` maps to a user, `None` (or a blank id) to the guest bucket.
    pub fn from_user_id(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            Some(id) if !id.is_empty() => Identity::User(id.to_string()),
            _ => Identity::Guest,
        }
    }

    pub fn profile_key(&self) -> String {
        match self {
            Identity::User(id) => format!("user:{id}"),
            Identity::Guest => "guest".to_string(),
        }
    }
}

/// Full storage key, e.g. `arcade:progress:user:42:2048`.
pub fn storage_key(identity: &Identity, game_id: &str) -> String {
    format!("{}{}:{}", STORAGE_PREFIX, identity.profile_key(), game_id)
}

/// Load/save/clear of one [`SessionState`] per identity and game.
///
/// `load` returns `Ok(None)` both when nothing was saved and when the stored
/// data cannot be parsed; only genuine storage failures are errors.
pub trait ProgressStore {
    fn load(&self, identity: &Identity, game_id: &str) -> Result<Option<SessionState>, ProgressError>;
    fn save(&mut self, identity: &Identity, game_id: &str, state: &SessionState) -> Result<(), ProgressError>;
    fn clear(&mut self, identity: &Identity, game_id: &str) -> Result<(), ProgressError>;
}

fn parse_saved(key: &str, raw: &str) -> Option<SessionState> {
    match serde_json::from_str(raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("ignoring unreadable progress under {key}: {e}");
            None
        }
    }
}

/// Progress held in a map of raw JSON strings.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Store raw text under a key, bypassing serialization.
    pub fn insert_raw(&mut self, identity: &Identity, game_id: &str, raw: impl Into<String>) {
        self.entries.insert(storage_key(identity, game_id), raw.into());
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl ProgressStore for MemoryStore {
    fn load(&self, identity: &Identity, game_id: &str) -> Result<Option<SessionState>, ProgressError> {
        let key = storage_key(identity, game_id);
        Ok(self.entries.get(&key).and_then(|raw| parse_saved(&key, raw)))
    }

    fn save(&mut self, identity: &Identity, game_id: &str, state: &SessionState) -> Result<(), ProgressError> {
        let raw = serde_json::to_string(state)?;
        self.entries.insert(storage_key(identity, game_id), raw);
        Ok(())
    }

    fn clear(&mut self, identity: &Identity, game_id: &str) -> Result<(), ProgressError> {
        self.entries.remove(&storage_key(identity, game_id));
        Ok(())
    }
}

/// Progress stored as pretty JSON files under `dir`, one per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// File backing `identity`/`game_id`.
    ///
    /// Bytes of the storage key outside `[A-Za-z0-9-]` are written as `_XX`
    /// (hex), `_` included, so distinct keys never share a file.
    pub fn path_for(&self, identity: &Identity, game_id: &str) -> PathBuf {
        let mut name = String::new();
        for b in storage_key(identity, game_id).bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' {
                name.push(b as char);
            } else {
                name.push_str(&format!("_{b:02X}"));
            }
        }
        self.dir.join(format!("{name}.json"))
    }
}

impl ProgressStore for FileStore {
    fn load(&self, identity: &Identity, game_id: &str) -> Result<Option<SessionState>, ProgressError> {
        let path = self.path_for(identity, game_id);
        let raw = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_saved(&path.display().to_string(), &raw))
    }

    fn save(&mut self, identity: &Identity, game_id: &str, state: &SessionState) -> Result<(), ProgressError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(identity, game_id);
        let data = serde_json::to_vec_pretty(state)?;
        write_atomic(&path, &data)?;
        debug!("saved progress to {}", path.display());
        Ok(())
    }

    fn clear(&mut self, identity: &Identity, game_id: &str) -> Result<(), ProgressError> {
        match fs::remove_file(self.path_for(identity, game_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resume saved progress, or start a new `size` game when there is none or
/// it cannot be loaded.
pub fn load_session<S, R>(
    store: &S,
    identity: &Identity,
    game_id: &str,
    size: usize,
    rng: &mut R,
) -> Result<Session, SessionError>
where
    S: ProgressStore + ?Sized,
    R: Rng + ?Sized,
{
    match store.load(identity, game_id) {
        Ok(Some(state)) => return Ok(Session::restore(state, rng)),
        Ok(None) => debug!("no saved progress for {}", storage_key(identity, game_id)),
        Err(e) => warn!("failed to load progress, starting fresh: {e}"),
    }
    Session::new(size, rng)
}

/// Persist `session` and mark it saved. On failure the session is untouched.
pub fn save_session<S>(
    store: &mut S,
    identity: &Identity,
    game_id: &str,
    session: &mut Session,
) -> Result<(), ProgressError>
where
    S: ProgressStore + ?Sized,
{
    store.save(identity, game_id, session.state())?;
    session.mark_saved();
    Ok(())
}
