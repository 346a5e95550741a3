//! Local file inspection: content hashes, magic-byte type detection, and
//! metadata extraction through `exiftool` with a printable-strings fallback.

use anyhow::Result;
use async_trait::async_trait;
use recon_core::tool::{run_tool, ToolRun};
use recon_core::{unsupported, LookupProvider, LookupResult, Target};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Bytes read by the strings fallback.
pub const STRINGS_WINDOW: usize = 4096;
pub const MIN_RUN: usize = 4;
pub const MAX_STRING_LINES: usize = 80;

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub blake3: String,
    pub mime: Option<String>,
    pub ext: Option<String>,
}

impl FileInfo {
    pub fn into_result(self) -> LookupResult {
        LookupResult::fields([
            ("Path", self.path.display().to_string()),
            ("Size", format!("{} bytes", self.size)),
            ("SHA-256", self.sha256),
            ("BLAKE3", self.blake3),
            ("MIME", self.mime.unwrap_or_else(|| "unknown".into())),
            ("Extension", self.ext.unwrap_or_else(|| "unknown".into())),
        ])
    }
}

pub fn hash_file(path: &Path) -> Result<FileInfo> {
    let f = File::open(path)?;
    let size = f.metadata()?.len();
    let mut reader = BufReader::new(f);
    let mut sha = Sha256::new();
    let mut bl = blake3::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha.update(&buf[..n]);
        bl.update(&buf[..n]);
    }
    let kind = infer::get_from_path(path).ok().flatten();
    Ok(FileInfo {
        path: path.to_path_buf(),
        size,
        sha256: hex::encode(sha.finalize()),
        blake3: bl.finalize().to_hex().to_string(),
        mime: kind.as_ref().map(|t| t.mime_type().to_string()),
        ext: kind.as_ref().map(|t| t.extension().to_string()),
    })
}

pub struct FileIdentity;

#[async_trait]
impl LookupProvider for FileIdentity {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::File(path) = target else { return unsupported("file identity", target) };
        let path = path.clone();
        debug!(path = %path.display(), "hashing");
        match tokio::task::spawn_blocking(move || hash_file(&path)).await {
            Ok(Ok(info)) => info.into_result(),
            Ok(Err(e)) => LookupResult::failed(e.to_string()),
            Err(e) => LookupResult::failed(format!("hashing task aborted: {}", e)),
        }
    }
}

/// Runs of at least `min` printable ASCII bytes, at most `cap` of them.
pub fn printable_runs(bytes: &[u8], min: usize, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut run = String::new();
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' || b == b'\t' {
            run.push(b as char);
            continue;
        }
        if run.len() >= min {
            out.push(std::mem::take(&mut run));
            if out.len() == cap {
                return out;
            }
        }
        run.clear();
    }
    if run.len() >= min && out.len() < cap {
        out.push(run);
    }
    out
}

fn read_window(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit);
    File::open(path)?.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

async fn strings_fallback(path: &Path) -> LookupResult {
    let owned = path.to_path_buf();
    let window = tokio::task::spawn_blocking(move || read_window(&owned, STRINGS_WINDOW)).await;
    match window {
        Ok(Ok(bytes)) => {
            let runs = printable_runs(&bytes, MIN_RUN, MAX_STRING_LINES);
            let r = if runs.is_empty() { LookupResult::lines(["(no printable strings)"]) } else { LookupResult::lines(runs) };
            r.with_note(format!("metadata extractor unavailable; printable strings from the first {} bytes", STRINGS_WINDOW))
        }
        Ok(Err(e)) => LookupResult::failed(e.to_string()),
        Err(e) => LookupResult::failed(format!("read task aborted: {}", e)),
    }
}

/// Metadata via `exiftool`, degrading to printable strings when it is absent.
pub struct FileMetadata {
    program: String,
    timeout: Duration,
}

impl FileMetadata {
    pub fn new(timeout: Duration) -> Self {
        FileMetadata { program: "exiftool".into(), timeout }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl LookupProvider for FileMetadata {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::File(path) = target else { return unsupported("file metadata", target) };
        let arg = path.to_string_lossy();
        match run_tool(&self.program, &[arg.as_ref()], self.timeout).await {
            Ok(ToolRun::Missing) => {
                debug!(program = %self.program, "extractor not installed, using strings");
                strings_fallback(path).await
            }
            Ok(ToolRun::Output { ok: true, stdout, .. }) => LookupResult::lines(stdout.lines()),
            Ok(ToolRun::Output { stdout, stderr, .. }) => {
                warn!(program = %self.program, "extractor exited non-zero");
                let mut r = LookupResult::failed(format!("{} exited with an error: {}", self.program, stderr.trim()));
                r.entries = LookupResult::lines(stdout.lines()).entries;
                r
            }
            Err(e) => LookupResult::failed(e.to_string()),
        }
    }
}
