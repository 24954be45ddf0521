//! Derived values computed from the session snapshot and configuration.
//!
//! Everything here is a pure function of its arguments; compaction detection
//! is the one extractor that also updates the caller's [`PersistentState`].

use crate::cache::TranscriptCache;
use crate::config::Config;
use crate::session::{count, Session};
use crate::state::PersistentState;
use crate::transcript;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Window size assumed when the snapshot does not report one.
const DEFAULT_WINDOW: f64 = 200_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Opus,
    Sonnet,
    Haiku,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub display_name: String,
    pub tier: ModelTier,
}

pub fn model_info(sess: &Session) -> ModelInfo {
    let id = sess.model.id.to_lowercase();
    let tier = if id.contains("opus") {
        ModelTier::Opus
    } else if id.contains("haiku") {
        ModelTier::Haiku
    } else {
        ModelTier::Sonnet
    };
    ModelInfo {
        display_name: sess
            .model
            .display_name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        tier,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextUsage {
    /// Used / window size; may exceed 1.0.
    pub ratio: f64,
    pub used: u64,
    pub size: u64,
    pub estimated: bool,
}

pub fn context_usage(sess: &Session, cfg: &Config) -> ContextUsage {
    let cw = &sess.context_window;
    let size = cw.context_window_size.unwrap_or(DEFAULT_WINDOW);

    let (used, mut estimated) = match cw.current() {
        Some(cu) => (cu.context_total(), false),
        None => (count(cw.total_input_tokens), true),
    };
    // Cumulative counters keep growing past the window after a compaction.
    if used as f64 > size && cfg.advanced.handle_cumulative_bug {
        estimated = true;
    }

    let ratio = if size > 0.0 { used as f64 / size } else { 0.0 };
    ContextUsage {
        ratio,
        used,
        size: count(size),
        estimated,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostInfo {
    pub total_usd: f64,
    pub duration_ms: u64,
}

pub fn cost_info(sess: &Session) -> CostInfo {
    let usd = sess.cost.total_cost_usd;
    CostInfo {
        total_usd: if usd.is_finite() { usd } else { 0.0 },
        duration_ms: count(sess.cost.total_duration_ms),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenSplit {
    pub fresh: u64,
    pub cached: u64,
}

pub fn token_split(sess: &Session) -> TokenSplit {
    sess.context_window
        .current()
        .map(|cu| TokenSplit {
            fresh: cu.input(),
            cached: cu.cache_read(),
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTotals {
    pub elapsed_secs: u64,
    pub total_tokens: u64,
}

pub fn session_totals(sess: &Session) -> SessionTotals {
    let cw = &sess.context_window;
    SessionTotals {
        elapsed_secs: cost_info(sess).duration_ms / 1000,
        total_tokens: count(cw.total_input_tokens).saturating_add(count(cw.total_output_tokens)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionEvent {
    pub from: u64,
    pub to: u64,
}

/// Compare this run's context total against the previous one in `state`.
///
/// A drop larger than `compaction.detection_threshold` records a new event.
/// The last recorded event is reported on every run until a newer one
/// replaces it. `previous_context_tokens` is always advanced to this run.
pub fn detect_compaction(
    sess: &Session,
    cfg: &Config,
    state: &mut PersistentState,
) -> Option<CompactionEvent> {
    let current = sess.context_window.current()?.context_total();
    let previous = state.previous_context_tokens;

    if previous > 0 && previous.saturating_sub(current) > cfg.compaction.detection_threshold {
        debug!(from = previous, to = current, "compaction detected");
        state.last_compaction_from = previous;
        state.last_compaction_to = current;
    }
    state.previous_context_tokens = current;

    (state.last_compaction_from > 0 && state.last_compaction_to > 0).then_some(CompactionEvent {
        from: state.last_compaction_from,
        to: state.last_compaction_to,
    })
}

/// Directory label: workspace dir, then cwd, then "~", shortened per config.
pub fn workspace_display(sess: &Session, cfg: &Config, home: Option<&Path>) -> String {
    let dc = &cfg.directory;
    let mut dir = sess.working_dir().unwrap_or("~").to_string();

    if dc.abbreviate_home {
        if let Some(home) = home.and_then(Path::to_str).filter(|h| !h.is_empty()) {
            if let Some(rest) = dir.strip_prefix(home) {
                if rest.is_empty() || rest.starts_with('/') {
                    dir = format!("~{}", rest);
                }
            }
        }
    }

    if dc.basename_only {
        if let Some(base) = Path::new(&dir).file_name().and_then(|b| b.to_str()) {
            dir = base.to_string();
        }
    }

    crate::format::truncate_start(&dir, dc.max_length)
}

/// Top tools by estimated tokens, or empty when disabled or unavailable.
pub fn top_tools(
    sess: &Session,
    cfg: &Config,
    cache: &mut TranscriptCache,
    now: Instant,
) -> Vec<(String, u64)> {
    let tc = &cfg.tools;
    if !tc.enabled || sess.transcript_path.is_empty() {
        return Vec::new();
    }
    let tokens = cache.get(Path::new(&sess.transcript_path), now);
    transcript::top(&tokens, tc.min_tokens, tc.top_n)
}
