use crate::error::{Error, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

/// Deserialize a field, falling back to its default when the JSON type is
/// not the expected one. Keeps one odd field from discarding the snapshot.
fn lenient<'de, D, T>(de: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = Value::deserialize(de)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

/// Convert a JSON number to a non-negative token or millisecond count.
pub fn count(v: f64) -> u64 {
    v.max(0.0) as u64
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct Model {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub display_name: Option<String>,
}

#[derive(Deserialize, Default, Debug, Clone, PartialEq)]
pub struct CurrentUsage {
    #[serde(default, deserialize_with = "lenient")]
    pub input_tokens: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub output_tokens: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub cache_creation_input_tokens: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub cache_read_input_tokens: Option<f64>,
}

impl CurrentUsage {
    fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.cache_creation_input_tokens.is_none()
            && self.cache_read_input_tokens.is_none()
    }

    pub fn input(&self) -> u64 {
        count(self.input_tokens.unwrap_or(0.0))
    }

    pub fn cache_creation(&self) -> u64 {
        count(self.cache_creation_input_tokens.unwrap_or(0.0))
    }

    pub fn cache_read(&self) -> u64 {
        count(self.cache_read_input_tokens.unwrap_or(0.0))
    }

    /// Tokens occupying the context window this turn.
    pub fn context_total(&self) -> u64 {
        self.input()
            .saturating_add(self.cache_creation())
            .saturating_add(self.cache_read())
    }
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct ContextWindow {
    #[serde(default, deserialize_with = "lenient")]
    pub context_window_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_input_tokens: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub total_output_tokens: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub current_usage: Option<CurrentUsage>,
}

impl ContextWindow {
    /// The current-usage record, treating an empty object as absent.
    pub fn current(&self) -> Option<&CurrentUsage> {
        self.current_usage.as_ref().filter(|u| !u.is_empty())
    }
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct Cost {
    #[serde(default, deserialize_with = "lenient")]
    pub total_cost_usd: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub total_duration_ms: f64,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct Workspace {
    #[serde(default, deserialize_with = "lenient")]
    pub current_dir: String,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct Session {
    #[serde(default, deserialize_with = "lenient")]
    pub cwd: String,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Model,
    #[serde(default, deserialize_with = "lenient")]
    pub context_window: ContextWindow,
    #[serde(default, deserialize_with = "lenient")]
    pub cost: Cost,
    #[serde(default, deserialize_with = "lenient")]
    pub workspace: Workspace,
    #[serde(default, deserialize_with = "lenient")]
    pub transcript_path: String,
}

impl Session {
    /// Working directory for external probes: workspace dir, then cwd.
    pub fn working_dir(&self) -> Option<&str> {
        [&self.workspace.current_dir, &self.cwd]
            .into_iter()
            .map(String::as_str)
            .find(|d| !d.is_empty())
    }
}

/// Read stdin to completion, replacing undecodable bytes.
pub fn read_input(mut reader: impl Read) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::NoData);
    }
    Ok(trimmed.to_string())
}

/// Parse a snapshot. Invalid JSON is an error; valid JSON of an unexpected
/// shape yields an all-default snapshot.
pub fn parse(input: &str) -> Result<Session> {
    let value: Value = serde_json::from_str(input).map_err(Error::Parse)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_is_no_data() {
        assert!(matches!(read_input(&b""[..]), Err(Error::NoData)));
        assert!(matches!(read_input(&b"  \n\t "[..]), Err(Error::NoData)));
    }

    #[test]
    fn undecodable_bytes_are_replaced() {
        let text = read_input(&b"{\"cwd\": \"a\xffb\"}"[..]).unwrap();
        assert!(text.contains('\u{fffd}'));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(parse("{invalid"), Err(Error::Parse(_))));
    }

    #[test]
    fn non_object_yields_defaults() {
        let s = parse("[1, 2, 3]").unwrap();
        assert!(s.model.display_name.is_none());
        assert!(s.context_window.current().is_none());
    }

    #[test]
    fn wrong_field_types_fall_back_per_field() {
        let s = parse(
            r#"{"model": "opus", "cost": {"total_cost_usd": "3", "total_duration_ms": 60000},
                "cwd": "/tmp/x"}"#,
        )
        .unwrap();
        assert_eq!(s.model.id, "");
        assert_eq!(s.cost.total_cost_usd, 0.0);
        assert_eq!(s.cost.total_duration_ms, 60000.0);
        assert_eq!(s.cwd, "/tmp/x");
    }

    #[test]
    fn current_usage_totals() {
        let s = parse(
            r#"{"context_window": {"current_usage": {
                "input_tokens": 8500, "cache_creation_input_tokens": 5000,
                "cache_read_input_tokens": 12000}}}"#,
        )
        .unwrap();
        let cu = s.context_window.current().unwrap();
        assert_eq!(cu.context_total(), 25500);
    }

    #[test]
    fn empty_or_null_current_usage_is_absent() {
        let s = parse(r#"{"context_window": {"current_usage": {}}}"#).unwrap();
        assert!(s.context_window.current().is_none());
        let s = parse(r#"{"context_window": {"current_usage": null}}"#).unwrap();
        assert!(s.context_window.current().is_none());
    }

    #[test]
    fn working_dir_prefers_workspace() {
        let s = parse(r#"{"cwd": "/a", "workspace": {"current_dir": "/b"}}"#).unwrap();
        assert_eq!(s.working_dir(), Some("/b"));
        let s = parse(r#"{"cwd": "/a"}"#).unwrap();
        assert_eq!(s.working_dir(), Some("/a"));
        assert_eq!(Session::default().working_dir(), None);
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(count(-5.0), 0);
        assert_eq!(count(f64::NAN), 0);
        assert_eq!(count(12.9), 12);
    }
}
