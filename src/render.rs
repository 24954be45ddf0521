use crate::cache::TranscriptCache;
use crate::config::{Config, Display};
use crate::git::GitStatus;
use crate::metrics;
use crate::segments::{self, Palette};
use crate::session::Session;
use crate::state::PersistentState;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Width assumed when the terminal cannot be measured.
pub const FALLBACK_WIDTH: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Full,
    Compact,
}

/// Forced compact mode wins; otherwise compare the measured width against
/// `auto_compact_width`. The probe is only consulted when it matters.
pub fn layout(display: &Display, width: impl FnOnce() -> Option<u16>) -> Layout {
    if display.compact_mode {
        return Layout::Compact;
    }
    if display.auto_compact_width == 0 {
        return Layout::Full;
    }
    let cols = width().unwrap_or(FALLBACK_WIDTH);
    if cols < display.auto_compact_width {
        Layout::Compact
    } else {
        Layout::Full
    }
}

/// Terminal columns from `COLUMNS`, then the stdout tty.
pub fn terminal_width() -> Option<u16> {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.trim().parse::<u16>().ok())
        .filter(|&c| c > 0)
        .or_else(tty_columns)
}

#[cfg(unix)]
fn tty_columns() -> Option<u16> {
    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ only writes into the winsize we hand it.
    let rc = unsafe {
        libc::ioctl(
            libc::STDOUT_FILENO,
            libc::TIOCGWINSZ,
            &mut ws as *mut libc::winsize,
        )
    };
    (rc == 0 && ws.ws_col > 0).then_some(ws.ws_col)
}

#[cfg(not(unix))]
fn tty_columns() -> Option<u16> {
    None
}

/// Per-run rendering inputs that do not come from the snapshot.
pub struct Frame<'a> {
    pub cfg: &'a Config,
    pub layout: Layout,
    pub palette: Palette,
    pub home: Option<PathBuf>,
    pub now: Instant,
}

/// Compose the status line. `state` is updated in place by compaction
/// detection; the caller decides whether to persist it. `git` is only
/// invoked when the git segment is on and a working directory is known.
pub fn render(
    sess: &Session,
    frame: &Frame,
    state: &mut PersistentState,
    transcripts: &mut TranscriptCache,
    git: impl FnOnce(&Path) -> Option<GitStatus>,
) -> String {
    let cfg = frame.cfg;
    let seg = &cfg.segments;
    let pal = frame.palette;
    let full = frame.layout == Layout::Full;
    let mut parts: Vec<String> = Vec::new();

    // --- Model ---
    if seg.model {
        parts.push(segments::model(&metrics::model_info(sess), cfg, pal));
    }

    // --- Context ---
    if seg.context {
        let usage = metrics::context_usage(sess, cfg);
        debug!(
            used = usage.used,
            size = usage.size,
            estimated = usage.estimated,
            "context usage"
        );
        parts.push(segments::context(&usage, cfg, pal));
    }

    // --- Cost ---
    if seg.cost {
        parts.push(segments::cost(&metrics::cost_info(sess), cfg, pal));
    }

    // Runs in either layout; only full displays it.
    let compaction = if seg.compaction {
        metrics::detect_compaction(sess, cfg, state)
    } else {
        None
    };

    if full {
        // --- Tokens ---
        if seg.tokens {
            parts.push(segments::tokens(&metrics::token_split(sess), cfg, pal));
        }

        // --- Session ---
        if seg.session {
            parts.push(segments::session(&metrics::session_totals(sess), cfg, pal));
        }

        // --- Compaction ---
        if seg.compaction {
            parts.push(segments::compaction(compaction, cfg, pal));
        }

        // --- Tools ---
        if seg.tools {
            let top = metrics::top_tools(sess, cfg, transcripts, frame.now);
            parts.push(segments::tools(&top, cfg, pal));
        }
    }

    // --- Git ---
    if seg.git {
        if let Some(dir) = sess.working_dir() {
            let status = git(Path::new(dir));
            parts.push(segments::git(status.as_ref(), cfg, pal));
        }
    }

    // --- Directory ---
    if full && seg.directory {
        parts.push(segments::directory(
            &metrics::workspace_display(sess, cfg, frame.home.as_deref()),
            cfg,
            pal,
        ));
    }

    parts.retain(|p| !p.is_empty());
    parts.join(&segments::separator(cfg, pal))
}
