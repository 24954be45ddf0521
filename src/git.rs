use crate::error::{Error, Result};
use crate::format;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: String,
    pub is_clean: bool,
    pub dirty_count: usize,
}

/// Branch and working-tree status for `cwd`, or None when git is missing,
/// slow, failing, or `cwd` is not inside a repository.
pub fn probe(cwd: &Path, timeout: Duration) -> Option<GitStatus> {
    let result = run(cwd, &["rev-parse", "--abbrev-ref", "HEAD"], timeout)
        .and_then(|branch| Ok((branch, run(cwd, &["status", "--porcelain"], timeout)?)));
    match result {
        Ok((branch, status)) => Some(parse(&branch, &status)),
        Err(e) => {
            debug!(error = %e, cwd = %cwd.display(), "git probe failed");
            None
        }
    }
}

/// Reduce raw command output to a status. The branch name is sanitized
/// because it is echoed straight into the terminal.
fn parse(branch_out: &str, status_out: &str) -> GitStatus {
    let dirty_count = status_out
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count();
    GitStatus {
        branch: format::sanitize(branch_out.trim()),
        is_clean: dirty_count == 0,
        dirty_count,
    }
}

/// Run one git command with a hard deadline. Output goes to an anonymous
/// temp file so a large status listing cannot stall on a full pipe.
fn run(cwd: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    let mut out = tempfile::tempfile()?;
    let mut child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_OPTIONAL_LOCKS", "0")
        .stdin(Stdio::null())
        .stdout(out.try_clone()?)
        .stderr(Stdio::null())
        .spawn()?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Probe(format!("git {} timed out", args.join(" "))));
        }
        thread::sleep(POLL);
    };
    if !status.success() {
        return Err(Error::Probe(format!("git {} exited with {}", args.join(" "), status)));
    }

    out.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    out.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
