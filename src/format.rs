/// Abbreviate counts: 1234567->"1.2M", 45231->"45.2k", 523->"523".
pub fn fmt_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

/// Format seconds: >=1h->"2h05m", <1h->"15m".
pub fn fmt_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h{:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Keep the first `max_len - 3` chars and append "...".
pub fn truncate_end(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let mut out: String = s.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}

/// Keep the last `max_len - 3` chars behind a leading "...".
pub fn truncate_start(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let tail: String = s.chars().skip(count - keep).collect();
    format!("...{}", tail)
}

/// Filled cells for a ratio drawn `width` cells wide; the ratio is clamped to [0, 1].
pub fn filled_cells(ratio: f64, width: usize) -> usize {
    let clamped = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    ((clamped * width as f64).floor() as usize).min(width)
}

/// Render the bar body, e.g. "▓▓░░░░░░░░".
pub fn bar(ratio: f64, width: usize, filled: &str, empty: &str) -> String {
    let n = filled_cells(ratio, width);
    filled.repeat(n) + &empty.repeat(width - n)
}

/// Unclamped percentage, rounded to the nearest integer and never negative.
pub fn percent(ratio: f64) -> u64 {
    if ratio.is_nan() || ratio <= 0.0 {
        return 0;
    }
    (ratio * 100.0).round() as u64
}

/// Threshold band a value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Green,
    Yellow,
    Red,
}

/// Lower is better unless `invert`, in which case higher is better.
pub fn level(value: f64, green_max: f64, yellow_max: f64, invert: bool) -> Level {
    if invert {
        if value >= green_max {
            Level::Green
        } else if value >= yellow_max {
            Level::Yellow
        } else {
            Level::Red
        }
    } else if value <= green_max {
        Level::Green
    } else if value <= yellow_max {
        Level::Yellow
    } else {
        Level::Red
    }
}

/// Strip terminal escape sequences (CSI, OSC and other string controls,
/// two-byte escapes) and any remaining control characters.
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !c.is_control() {
                out.push(c);
            }
            continue;
        }
        match chars.next() {
            // CSI: parameter and intermediate bytes up to one final byte.
            Some('[') => {
                for p in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&p) {
                        break;
                    }
                }
            }
            // OSC, DCS, SOS, PM, APC: payload up to BEL or ST.
            Some(']' | 'P' | 'X' | '^' | '_') => {
                while let Some(p) = chars.next() {
                    if p == '\x07' {
                        break;
                    }
                    if p == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            // Intermediates then a final byte, e.g. ESC ( B.
            Some(p) if ('\x20'..='\x2f').contains(&p) => {
                for q in chars.by_ref() {
                    if !('\x20'..='\x2f').contains(&q) {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    out
}
