use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Format revision of config and state files.
pub const SCHEMA_VERSION: &str = "2";

pub const CONFIG_FILE_NAME: &str = "ecw-statusline-config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProgressBar {
    pub width: usize,
    pub filled_char: String,
    pub empty_char: String,
    pub show_percentage: bool,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            width: 10,
            filled_char: "\u{2593}".to_string(),
            empty_char: "\u{2591}".to_string(),
            show_percentage: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Display {
    pub compact_mode: bool,
    /// Switch to compact below this many columns; 0 disables the probe.
    pub auto_compact_width: u16,
    pub separator: String,
    pub use_emoji: bool,
    pub use_color: bool,
    pub progress_bar: ProgressBar,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            compact_mode: false,
            auto_compact_width: 80,
            separator: " | ".to_string(),
            use_emoji: true,
            use_color: true,
            progress_bar: ProgressBar::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Segments {
    pub model: bool,
    pub context: bool,
    pub cost: bool,
    pub tokens: bool,
    pub session: bool,
    pub compaction: bool,
    pub tools: bool,
    pub git: bool,
    pub directory: bool,
}

impl Default for Segments {
    fn default() -> Self {
        Self {
            model: true,
            context: true,
            cost: true,
            tokens: true,
            session: true,
            compaction: true,
            tools: true,
            git: true,
            directory: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ContextThresholds {
    pub warning_threshold: f64,
    pub critical_threshold: f64,
}

impl Default for ContextThresholds {
    fn default() -> Self {
        Self {
            warning_threshold: 0.65,
            critical_threshold: 0.85,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CostThresholds {
    pub currency_symbol: String,
    pub green_max: f64,
    pub yellow_max: f64,
}

impl Default for CostThresholds {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            green_max: 1.0,
            yellow_max: 5.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TokenThresholds {
    pub fresh_warning: u64,
    pub fresh_critical: u64,
}

impl Default for TokenThresholds {
    fn default() -> Self {
        Self {
            fresh_warning: 5000,
            fresh_critical: 20000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Compaction {
    /// Minimum drop in context tokens counted as a compaction.
    pub detection_threshold: u64,
    pub state_file: String,
}

impl Default for Compaction {
    fn default() -> Self {
        Self {
            detection_threshold: 10000,
            state_file: "~/.claude/ecw-statusline-state.json".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Tools {
    pub enabled: bool,
    pub top_n: usize,
    pub min_tokens: u64,
    pub cache_ttl_seconds: f64,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            enabled: false,
            top_n: 3,
            min_tokens: 100,
            cache_ttl_seconds: 5.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Git {
    pub show_branch: bool,
    pub show_status: bool,
    pub show_uncommitted_count: bool,
    pub max_branch_length: usize,
}

impl Default for Git {
    fn default() -> Self {
        Self {
            show_branch: true,
            show_status: true,
            show_uncommitted_count: true,
            max_branch_length: 20,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Directory {
    pub abbreviate_home: bool,
    pub max_length: usize,
    pub basename_only: bool,
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            abbreviate_home: true,
            max_length: 25,
            basename_only: false,
        }
    }
}

/// ANSI 256-color indices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Colors {
    pub green: u8,
    pub yellow: u8,
    pub red: u8,
    pub cyan: u8,
    pub opus: u8,
    pub sonnet: u8,
    pub haiku: u8,
    pub separator: u8,
    pub directory: u8,
    pub git_clean: u8,
    pub git_dirty: u8,
    pub tools: u8,
    pub tokens_fresh: u8,
    pub tokens_cached: u8,
    pub compaction: u8,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            green: 82,
            yellow: 220,
            red: 196,
            cyan: 87,
            opus: 75,
            sonnet: 141,
            haiku: 84,
            separator: 240,
            directory: 250,
            git_clean: 82,
            git_dirty: 220,
            tools: 147,
            tokens_fresh: 214,
            tokens_cached: 81,
            compaction: 213,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Advanced {
    pub handle_cumulative_bug: bool,
    /// Seconds allowed for each git subprocess.
    pub git_timeout: f64,
    pub debug: bool,
}

impl Default for Advanced {
    fn default() -> Self {
        Self {
            handle_cumulative_bug: true,
            git_timeout: 2.0,
            debug: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "version_string")]
    pub schema_version: String,
    pub display: Display,
    pub segments: Segments,
    pub context: ContextThresholds,
    pub cost: CostThresholds,
    pub tokens: TokenThresholds,
    pub compaction: Compaction,
    pub tools: Tools,
    pub git: Git,
    pub directory: Directory,
    pub colors: Colors,
    pub advanced: Advanced,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            display: Display::default(),
            segments: Segments::default(),
            context: ContextThresholds::default(),
            cost: CostThresholds::default(),
            tokens: TokenThresholds::default(),
            compaction: Compaction::default(),
            tools: Tools::default(),
            git: Git::default(),
            directory: Directory::default(),
            colors: Colors::default(),
            advanced: Advanced::default(),
        }
    }
}

/// Accept any scalar as a version marker; `2` and `"2"` are the same.
fn version_string<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(version_text(&Value::deserialize(de)?))
}

fn version_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => SCHEMA_VERSION.to_string(),
        other => other.to_string(),
    }
}

/// Override file locations, highest priority first.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = env::var_os("ECW_STATUSLINE_CONFIG").filter(|p| !p.is_empty()) {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = env::current_exe().ok().and_then(|e| e.parent().map(Path::to_path_buf)) {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".claude").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Build the configuration from defaults and the discovered override file.
pub fn resolve() -> Config {
    resolve_from(&candidate_paths())
}

/// Defaults overlaid with the first candidate that exists and loads cleanly.
pub fn resolve_from(paths: &[PathBuf]) -> Config {
    for path in paths {
        if !path.is_file() {
            continue;
        }
        match load_override(path) {
            Ok(cfg) => {
                debug!(path = %path.display(), "loaded config");
                return cfg;
            }
            Err(e) => debug!(error = %e, "config load failed"),
        }
    }
    Config::default()
}

fn load_override(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)?;
    let wrap = |source: serde_json::Error| Error::Config {
        path: path.to_path_buf(),
        source,
    };
    let user: Value = serde_json::from_str(&data).map_err(wrap)?;
    if !user.is_object() {
        return Err(wrap(serde::de::Error::custom("expected a JSON object")));
    }
    check_schema_version(path, &user);

    let mut merged = serde_json::to_value(Config::default()).map_err(wrap)?;
    let mut parts = Vec::new();
    leaves(Some(&merged), user, &[], &mut parts);
    for (key, value) in parts {
        let mut candidate = merged.clone();
        deep_merge(&mut candidate, nest(&key, value));
        if serde_json::from_value::<Config>(candidate.clone()).is_ok() {
            merged = candidate;
        } else {
            debug!(
                path = %path.display(),
                key = %key.join("."),
                "config value has the wrong type, keeping default"
            );
        }
    }
    serde_json::from_value(merged).map_err(wrap)
}

/// Split `over` into single-value overrides. Objects are descended only
/// where `base` holds an object too; everything else is one leaf.
fn leaves(
    base: Option<&Value>,
    over: Value,
    prefix: &[String],
    out: &mut Vec<(Vec<String>, Value)>,
) {
    match over {
        Value::Object(map) if base.is_some_and(Value::is_object) => {
            for (k, v) in map {
                let mut key = prefix.to_vec();
                key.push(k.clone());
                leaves(base.and_then(|b| b.get(&k)), v, &key, out);
            }
        }
        other => out.push((prefix.to_vec(), other)),
    }
}

/// Wrap `leaf` in one object per path component.
fn nest(key: &[String], leaf: Value) -> Value {
    key.iter().rev().fold(leaf, |acc, k| {
        let mut m = serde_json::Map::new();
        m.insert(k.clone(), acc);
        Value::Object(m)
    })
}

fn check_schema_version(path: &Path, user: &Value) {
    if let Some(msg) = schema_warning(path, user) {
        let _ = writeln!(io::stderr(), "{}", msg);
    }
}

fn schema_warning(path: &Path, user: &Value) -> Option<String> {
    let found = version_text(user.get("schema_version")?);
    (found != SCHEMA_VERSION).then(|| {
        format!(
            "ecw-statusline: warning: {} has schema_version {} (expected {})",
            path.display(),
            found,
            SCHEMA_VERSION
        )
    })
}

/// Recursively overlay `over` onto `base`. Objects merge key by key; any
/// other value, arrays included, replaces the base value wholesale.
pub fn deep_merge(base: &mut Value, over: Value) {
    match (base, over) {
        (Value::Object(b), Value::Object(o)) => {
            for (k, v) in o {
                let nested = v.is_object() && b.get(&k).is_some_and(Value::is_object);
                match b.get_mut(&k) {
                    Some(slot) if nested => deep_merge(slot, v),
                    _ => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (b, o) => *b = o,
    }
}
