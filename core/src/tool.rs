//! Optional external programs (fingerprinters, metadata extractors).

use std::io::{self, ErrorKind};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

pub enum ToolRun {
    /// Program is not on PATH.
    Missing,
    Output { ok: bool, stdout: String, stderr: String },
}

/// Run `program args...` to completion within `limit`. A program that cannot
/// be found is `Missing`, not an error.
pub async fn run_tool(program: &str, args: &[&str], limit: Duration) -> io::Result<ToolRun> {
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);
    let out = match timeout(limit, cmd.output()).await {
        Ok(res) => res,
        Err(_) => return Err(io::Error::new(ErrorKind::TimedOut, format!("{} timed out after {} ms", program, limit.as_millis()))),
    };
    match out {
        Ok(out) => Ok(ToolRun::Output {
            ok: out.status.success(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ToolRun::Missing),
        Err(e) => Err(e),
    }
}
