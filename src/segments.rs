use crate::config::{Colors, Config};
use crate::format::{self, Level};
use crate::git::GitStatus;
use crate::metrics::{
    CompactionEvent, ContextUsage, CostInfo, ModelInfo, ModelTier, SessionTotals, TokenSplit,
};

const RST: &str = "\x1b[0m";

/// ANSI 256-color output, or nothing at all when color is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Color is on only if `use_color` is set and NO_COLOR is absent.
    pub fn from_env(use_color: bool) -> Self {
        Self::new(use_color && std::env::var_os("NO_COLOR").is_none())
    }

    pub fn fg(&self, code: u8) -> String {
        if !self.enabled {
            String::new()
        } else if code == 0 {
            RST.to_string()
        } else {
            format!("\x1b[38;5;{}m", code)
        }
    }

    pub fn reset(&self) -> &'static str {
        if self.enabled {
            RST
        } else {
            ""
        }
    }

    pub fn paint(&self, code: u8, text: &str) -> String {
        format!("{}{}{}", self.fg(code), text, self.reset())
    }
}

fn level_color(level: Level, colors: &Colors) -> u8 {
    match level {
        Level::Green => colors.green,
        Level::Yellow => colors.yellow,
        Level::Red => colors.red,
    }
}

/// Emoji glyph when enabled, else the ASCII fallback.
fn glyph<'a>(cfg: &Config, emoji: &'a str, ascii: &'a str) -> &'a str {
    if cfg.display.use_emoji {
        emoji
    } else {
        ascii
    }
}

pub fn model(info: &ModelInfo, cfg: &Config, pal: Palette) -> String {
    let (icon, code) = match info.tier {
        ModelTier::Opus => ("\u{1f535}", cfg.colors.opus),
        ModelTier::Sonnet => ("\u{1f7e3}", cfg.colors.sonnet),
        ModelTier::Haiku => ("\u{1f7e2}", cfg.colors.haiku),
    };
    let text = if cfg.display.use_emoji {
        format!("{} {}", icon, info.display_name)
    } else {
        info.display_name.clone()
    };
    pal.paint(code, &text)
}

pub fn context(usage: &ContextUsage, cfg: &Config, pal: Palette) -> String {
    let pb = &cfg.display.progress_bar;
    let th = &cfg.context;
    let code = level_color(
        format::level(usage.ratio, th.warning_threshold, th.critical_threshold, false),
        &cfg.colors,
    );

    let filled = glyph(cfg, &pb.filled_char, "#");
    let empty = glyph(cfg, &pb.empty_char, "-");
    let mut body = format!("[{}]", format::bar(usage.ratio, pb.width, filled, empty));
    if pb.show_percentage {
        body.push_str(&format!(" {}%", format::percent(usage.ratio)));
    }

    let icon = glyph(cfg, "\u{1f4ca} ", "");
    let marker = if usage.estimated { "~" } else { "" };
    format!("{}{}{}", icon, marker, pal.paint(code, &body))
}

pub fn cost(info: &CostInfo, cfg: &Config, pal: Palette) -> String {
    let cc = &cfg.cost;
    let code = level_color(
        format::level(info.total_usd, cc.green_max, cc.yellow_max, false),
        &cfg.colors,
    );
    let icon = glyph(cfg, "\u{1f4b0} ", "");
    let text = format!("{}{:.2}", cc.currency_symbol, info.total_usd);
    format!("{}{}", icon, pal.paint(code, &text))
}

pub fn tokens(split: &TokenSplit, cfg: &Config, pal: Palette) -> String {
    let tc = &cfg.tokens;
    let fresh_code = match format::level(
        split.fresh as f64,
        tc.fresh_warning as f64,
        tc.fresh_critical as f64,
        false,
    ) {
        Level::Green => cfg.colors.tokens_fresh,
        other => level_color(other, &cfg.colors),
    };
    let icon = glyph(cfg, "\u{26a1} ", "");
    let fresh = format!("{}{}", format::fmt_tokens(split.fresh), glyph(cfg, "\u{2192}", ">"));
    let cached = format!("{}{}", format::fmt_tokens(split.cached), glyph(cfg, "\u{21ba}", "<"));
    format!(
        "{}{} {}",
        icon,
        pal.paint(fresh_code, &fresh),
        pal.paint(cfg.colors.tokens_cached, &cached)
    )
}

pub fn session(totals: &SessionTotals, cfg: &Config, pal: Palette) -> String {
    let icon = glyph(cfg, "\u{23f1}\u{fe0f} ", "");
    let text = format!(
        "{} {}tok",
        format::fmt_duration(totals.elapsed_secs),
        format::fmt_tokens(totals.total_tokens)
    );
    format!("{}{}", icon, pal.paint(cfg.colors.cyan, &text))
}

/// Empty when no compaction has been recorded.
pub fn compaction(event: Option<CompactionEvent>, cfg: &Config, pal: Palette) -> String {
    let Some(ev) = event else {
        return String::new();
    };
    let icon = glyph(cfg, "\u{1f4c9} ", "v ");
    let text = format!(
        "{}{}{}",
        format::fmt_tokens(ev.from),
        glyph(cfg, "\u{2192}", ">"),
        format::fmt_tokens(ev.to)
    );
    format!("{}{}", icon, pal.paint(cfg.colors.compaction, &text))
}

/// Empty when tools are disabled or nothing meets the token floor.
pub fn tools(top: &[(String, u64)], cfg: &Config, pal: Palette) -> String {
    if !cfg.tools.enabled || top.is_empty() {
        return String::new();
    }
    let list = top
        .iter()
        .map(|(name, n)| format!("{}:{}", name, format::fmt_tokens(*n)))
        .collect::<Vec<_>>()
        .join(" ");
    let icon = glyph(cfg, "\u{1f527} ", "");
    format!("{}{}", icon, pal.paint(cfg.colors.tools, &list))
}

/// Empty outside a repository.
pub fn git(status: Option<&GitStatus>, cfg: &Config, pal: Palette) -> String {
    let Some(gs) = status else {
        return String::new();
    };
    let gc = &cfg.git;

    let (marker, code) = if gs.is_clean {
        let m = if gc.show_status {
            glyph(cfg, "\u{2713}", "+").to_string()
        } else {
            String::new()
        };
        (m, cfg.colors.git_clean)
    } else {
        let dirty = glyph(cfg, "\u{25cf}", "*");
        let m = if gc.show_uncommitted_count {
            format!("{}{}", dirty, gs.dirty_count)
        } else if gc.show_status {
            dirty.to_string()
        } else {
            String::new()
        };
        (m, cfg.colors.git_dirty)
    };

    let mut parts = Vec::new();
    if gc.show_branch && !gs.branch.is_empty() {
        parts.push(format::truncate_end(&gs.branch, gc.max_branch_length));
    }
    if !marker.is_empty() {
        parts.push(marker);
    }
    if parts.is_empty() {
        return String::new();
    }

    let icon = glyph(cfg, "\u{1f33f} ", "");
    format!("{}{}", icon, pal.paint(code, &parts.join(" ")))
}

pub fn directory(dir: &str, cfg: &Config, pal: Palette) -> String {
    let icon = glyph(cfg, "\u{1f4c2} ", "");
    format!("{}{}", icon, pal.paint(cfg.colors.directory, dir))
}

pub fn separator(cfg: &Config, pal: Palette) -> String {
    pal.paint(cfg.colors.separator, &cfg.display.separator)
}
