use crate::transcript::{self, ToolTokens};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Parsed transcripts keyed by path, reused while younger than the TTL.
/// Owned by the caller; lives only as long as the process.
pub struct TranscriptCache {
    ttl: Duration,
    entries: HashMap<PathBuf, (Instant, ToolTokens)>,
}

impl TranscriptCache {
    pub fn new(ttl_secs: f64) -> Self {
        let ttl = Duration::try_from_secs_f64(ttl_secs.max(0.0)).unwrap_or(Duration::ZERO);
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Tool totals for `path`, parsing only when no fresh entry exists.
    /// An unreadable transcript yields an empty map and is not cached.
    pub fn get(&mut self, path: &Path, now: Instant) -> ToolTokens {
        if let Some((at, tokens)) = self.entries.get(path) {
            if now.saturating_duration_since(*at) < self.ttl {
                debug!(path = %path.display(), "using cached transcript data");
                return tokens.clone();
            }
        }
        match transcript::parse_file(path) {
            Ok(tokens) => {
                debug!(path = %path.display(), buckets = tokens.len(), "parsed transcript");
                self.entries.insert(path.to_path_buf(), (now, tokens.clone()));
                tokens
            }
            Err(e) => {
                debug!(error = %e, path = %path.display(), "transcript read failed");
                ToolTokens::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn line(name: &str, chars: usize) -> String {
        serde_json::json!({"message": {"content": [
            {"type": "tool_use", "name": name, "input": "a".repeat(chars)}
        ]}})
        .to_string()
    }

    #[test]
    fn fresh_entry_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.jsonl");
        fs::write(&p, line("Read", 400)).unwrap();

        let mut cache = TranscriptCache::new(5.0);
        let t0 = Instant::now();
        assert_eq!(cache.get(&p, t0)["Read"], 100);

        fs::write(&p, line("Read", 800)).unwrap();
        assert_eq!(cache.get(&p, t0 + Duration::from_secs(1))["Read"], 100);
        assert_eq!(cache.get(&p, t0 + Duration::from_secs(6))["Read"], 200);
    }

    #[test]
    fn zero_ttl_always_reparses() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.jsonl");
        fs::write(&p, line("Bash", 40)).unwrap();
        let mut cache = TranscriptCache::new(0.0);
        let now = Instant::now();
        assert_eq!(cache.get(&p, now)["Bash"], 10);
        fs::write(&p, line("Bash", 80)).unwrap();
        assert_eq!(cache.get(&p, now)["Bash"], 20);
    }

    #[test]
    fn missing_transcript_is_empty() {
        let mut cache = TranscriptCache::new(5.0);
        assert!(cache
            .get(Path::new("/nonexistent/t.jsonl"), Instant::now())
            .is_empty());
    }
}
