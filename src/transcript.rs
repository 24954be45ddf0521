use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Estimated tokens per bucket: tool names plus "results", "assistant", "user".
pub type ToolTokens = HashMap<String, u64>;

/// Parse a JSONL transcript into per-tool token estimates.
/// Blank and unparseable lines are skipped.
pub fn parse_file(path: &Path) -> io::Result<ToolTokens> {
    let bytes = fs::read(path)?;
    let data = String::from_utf8_lossy(&bytes);

    let mut tokens = ToolTokens::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        accumulate(&entry, &mut tokens);
    }
    Ok(tokens)
}

fn add(tokens: &mut ToolTokens, key: &str, n: u64) {
    *tokens.entry(key.to_string()).or_insert(0) += n;
}

/// Fold one transcript record into the running totals.
pub fn accumulate(entry: &Value, tokens: &mut ToolTokens) {
    let message = entry.get("message");

    let blocks = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array);
    for block in blocks.into_iter().flatten() {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                add(tokens, name, estimate(block.get("input")));
            }
            Some("tool_result") => {
                add(tokens, "results", estimate(block.get("content")));
            }
            _ => {}
        }
    }

    let usage = entry
        .get("usage")
        .or_else(|| message.and_then(|m| m.get("usage")))
        .filter(|u| u.as_object().is_some_and(|o| !o.is_empty()));
    let Some(usage) = usage else {
        return;
    };
    let field = |k: &str| usage.get(k).and_then(Value::as_u64).unwrap_or(0);
    match message.and_then(|m| m.get("role")).and_then(Value::as_str) {
        Some("assistant") => add(tokens, "assistant", field("output_tokens")),
        Some("user") => add(tokens, "user", field("input_tokens")),
        _ => {}
    }
}

/// Rough token estimate: serialized size / 4.
fn estimate(data: Option<&Value>) -> u64 {
    let len = match data {
        Some(Value::String(s)) => s.chars().count(),
        Some(v @ (Value::Object(_) | Value::Array(_))) => spaced_json(v).chars().count(),
        _ => 0,
    };
    (len / 4) as u64
}

/// JSON with `", "` between items and `": "` after keys.
struct Spaced;

impl Formatter for Spaced {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn spaced_json(v: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, Spaced);
    if v.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

/// Entries at or above `min_tokens`, largest first, at most `top_n`.
pub fn top(tokens: &ToolTokens, min_tokens: u64, top_n: usize) -> Vec<(String, u64)> {
    let mut list: Vec<(String, u64)> = tokens
        .iter()
        .filter(|(_, n)| **n >= min_tokens)
        .map(|(k, &n)| (k.clone(), n))
        .collect();
    list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    list.truncate(top_n);
    list
}
