mod cache;
mod config;
mod error;
mod format;
mod git;
mod metrics;
mod render;
mod segments;
mod session;
mod state;
mod transcript;

use cache::TranscriptCache;
use config::Config;
use error::{Error, Result};
use render::Frame;
use segments::Palette;
use std::any::Any;
use std::env;
use std::io::{self, Write};
use std::panic;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Used when `advanced.git_timeout` is negative or not a number.
const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(2);

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        let _ = writeln!(
            io::stdout(),
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        return;
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    if env::var("ECW_DEBUG").is_ok_and(|v| v == "1") {
        init_logging();
    }

    // Panics are reported as a diagnostic line, never as a backtrace.
    panic::set_hook(Box::new(|_| {}));

    let line = match panic::catch_unwind(run) {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            debug!(error = %e, "render failed");
            e.diagnostic()
        }
        Err(payload) => {
            let e = Error::Panic(panic_message(payload.as_ref()));
            debug!(error = %e, "render panicked");
            e.diagnostic()
        }
    };
    let _ = writeln!(io::stdout(), "{}", line);
}

fn run() -> Result<String> {
    let input = session::read_input(io::stdin().lock())?;
    let sess = session::parse(&input)?;

    let cfg = config::resolve();
    if cfg.advanced.debug {
        init_logging();
    }
    debug!(model = %sess.model.id, cwd = ?sess.working_dir(), "session parsed");

    let frame = Frame {
        cfg: &cfg,
        layout: render::layout(&cfg.display, render::terminal_width),
        palette: Palette::from_env(cfg.display.use_color),
        home: dirs::home_dir(),
        now: Instant::now(),
    };
    debug!(layout = ?frame.layout, "layout selected");

    let path = state::state_path(&cfg);
    let before = path.as_deref().map(state::load).unwrap_or_default();
    let mut current = before.clone();
    let mut transcripts = TranscriptCache::new(cfg.tools.cache_ttl_seconds);
    let timeout = git_timeout(&cfg);

    let line = render::render(&sess, &frame, &mut current, &mut transcripts, |dir| {
        git::probe(dir, timeout)
    });

    if let Some(p) = path.as_deref() {
        if !current.same_counters(&before) {
            state::save(p, &current);
        }
    }
    Ok(line)
}

fn git_timeout(cfg: &Config) -> Duration {
    Duration::try_from_secs_f64(cfg.advanced.git_timeout).unwrap_or(DEFAULT_GIT_TIMEOUT)
}

/// Stderr logging, filtered by `ECW_LOG` (debug by default). Safe to call
/// more than once; later calls are no-ops.
fn init_logging() {
    let filter = EnvFilter::try_from_env("ECW_LOG").unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn print_help() {
    let _ = io::stderr().write_all(
        b"Usage: ecw-statusline [OPTIONS]\n\
          Reads a session JSON snapshot from stdin and prints one status line.\n\
          \n\
          Options:\n\
          \x20 --version  Show version\n\
          \x20 --help     Show this help\n\
          \n\
          Environment:\n\
          \x20 ECW_STATUSLINE_CONFIG  Path to a config override file\n\
          \x20 ECW_DEBUG=1            Log diagnostics to stderr\n\
          \x20 ECW_LOG                Log filter (e.g. debug, ecw_statusline=trace)\n\
          \x20 NO_COLOR               Disable ANSI colors\n\
          \x20 COLUMNS                Terminal width for compact-mode selection\n\
          \n\
          Config lookup: $ECW_STATUSLINE_CONFIG, ecw-statusline-config.json next to\n\
          the binary, then ~/.claude/ecw-statusline-config.json\n",
    );
}
