use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Marker assumed for state files written before versioning existed.
const LEGACY_SCHEMA: &str = "1";

fn legacy_schema() -> String {
    LEGACY_SCHEMA.to_string()
}

/// Cross-invocation memory used for compaction detection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PersistentState {
    #[serde(default)]
    pub previous_context_tokens: u64,
    #[serde(default)]
    pub last_compaction_from: u64,
    #[serde(default)]
    pub last_compaction_to: u64,
    #[serde(default = "legacy_schema")]
    pub schema_version: String,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            previous_context_tokens: 0,
            last_compaction_from: 0,
            last_compaction_to: 0,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

impl PersistentState {
    /// Same counters, ignoring the format marker.
    pub fn same_counters(&self, other: &Self) -> bool {
        self.previous_context_tokens == other.previous_context_tokens
            && self.last_compaction_from == other.last_compaction_from
            && self.last_compaction_to == other.last_compaction_to
    }
}

/// Resolve `compaction.state_file`, expanding a leading `~`.
/// `None` means persistence is unavailable for this run.
pub fn state_path(cfg: &Config) -> Option<PathBuf> {
    expand_home(&cfg.compaction.state_file, dirs::home_dir().as_deref())
}

fn expand_home(raw: &str, home: Option<&Path>) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    if raw == "~" {
        return home.map(Path::to_path_buf);
    }
    match raw.strip_prefix("~/") {
        Some(rest) => home.map(|h| h.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

/// Load state; any failure yields the zero-valued default.
pub fn load(path: &Path) -> PersistentState {
    match try_load(path) {
        Ok(state) => state,
        Err(e) => {
            debug!(error = %e, path = %path.display(), "state load failed, using defaults");
            PersistentState::default()
        }
    }
}

fn try_load(path: &Path) -> Result<PersistentState> {
    if !path.exists() {
        return Ok(PersistentState::default());
    }
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(Error::State)
}

/// Best-effort atomic save. Failures are logged and swallowed.
pub fn save(path: &Path, state: &PersistentState) {
    let result = stage(path, state).and_then(|tmp| commit(tmp, path));
    if let Err(e) = result {
        debug!(error = %e, path = %path.display(), "state save failed");
    }
}

/// Write the serialized state to a temp file beside `path`.
/// Dropping the returned file without committing removes it.
fn stage(path: &Path, state: &PersistentState) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut out = state.clone();
    out.schema_version = SCHEMA_VERSION.to_string();
    let data = serde_json::to_vec(&out).map_err(Error::State)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn commit(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
