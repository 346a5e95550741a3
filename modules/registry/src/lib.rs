//! Registration data: WHOIS over TCP/43 with IANA referral, and RDAP over HTTP.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use recon_core::{unsupported, LookupProvider, LookupResult, Target};
use reqwest::Client;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const WHOIS_PORT: u16 = 43;
pub const DEFAULT_IANA_SERVER: &str = "whois.iana.org";
pub const DEFAULT_MAX_LINES: usize = 200;

/// Ceiling on one WHOIS reply; anything past it is dropped unread.
pub const MAX_REPLY_BYTES: u64 = 256 * 1024;

async fn read_reply<R: AsyncRead + Unpin>(reader: R, cap: u64) -> std::io::Result<String> {
    let mut buf = Vec::new();
    reader.take(cap).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn whois_raw(server: &str, query: &str, limit: Duration) -> Result<String> {
    let mut stream = timeout(limit, TcpStream::connect((server, WHOIS_PORT))).await??;
    timeout(limit, stream.write_all(format!("{}\r\n", query).as_bytes())).await??;
    Ok(timeout(limit, read_reply(stream, MAX_REPLY_BYTES)).await??)
}

/// The authoritative server named by an IANA answer (`refer:` or `whois:`).
pub fn referral(iana_answer: &str) -> Option<String> {
    iana_answer.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if (key == "refer" || key == "whois") && !value.is_empty() { Some(value.to_string()) } else { None }
    })
}

/// First `max` lines plus the original line count.
pub fn truncate_lines(text: &str, max: usize) -> (Vec<String>, usize) {
    let all: Vec<&str> = text.lines().collect();
    let total = all.len();
    (all.into_iter().take(max).map(str::to_string).collect(), total)
}

pub struct Whois {
    iana_server: String,
    timeout: Duration,
    max_lines: usize,
}

impl Whois {
    pub fn new(iana_server: impl Into<String>, timeout: Duration, max_lines: usize) -> Self {
        Whois { iana_server: iana_server.into(), timeout, max_lines: max_lines.max(1) }
    }

    async fn lookup(&self, query: &str) -> Result<(String, Option<String>)> {
        debug!(query, server = %self.iana_server, "whois via iana");
        let iana = whois_raw(&self.iana_server, query, self.timeout).await?;
        let Some(server) = referral(&iana) else { return Ok((iana, None)) };
        if server.eq_ignore_ascii_case(&self.iana_server) {
            return Ok((iana, None));
        }
        debug!(query, %server, "whois referral");
        match whois_raw(&server, query, self.timeout).await {
            Ok(text) if !text.trim().is_empty() => Ok((text, None)),
            Ok(_) => Ok((iana, Some(format!("referral server {} returned nothing; showing IANA answer", server)))),
            Err(e) => {
                warn!(%server, error = %e, "whois referral failed");
                Ok((iana, Some(format!("referral to {} failed ({}); showing IANA answer", server, e))))
            }
        }
    }
}

#[async_trait]
impl LookupProvider for Whois {
    async fn query(&self, target: &Target) -> LookupResult {
        let query = match target {
            Target::Domain(d) => d.as_str(),
            Target::Ip(ip) => ip.as_str(),
            _ => return unsupported("whois", target),
        };
        match self.lookup(query).await {
            Ok((text, note)) => {
                let (lines, total) = truncate_lines(&text, self.max_lines);
                let mut r = LookupResult::lines(lines);
                if total > self.max_lines {
                    r = r.with_note(format!("truncated to {} of {} lines", self.max_lines, total));
                }
                if let Some(n) = note {
                    r.push_line(format!("[i] {}", n));
                }
                r
            }
            Err(e) => LookupResult::failed(e.to_string()),
        }
    }
}

/// Pretty JSON when the body parses, raw text otherwise.
pub fn render_rdap(body: &str) -> LookupResult {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => match serde_json::to_string_pretty(&v) {
            Ok(pretty) => LookupResult::lines(pretty.lines()),
            Err(_) => LookupResult::lines(body.lines()),
        },
        Err(_) => LookupResult::lines(body.lines()).with_note("response was not JSON; shown raw"),
    }
}

pub struct Rdap {
    client: Client,
    base: String,
}

impl Rdap {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        Rdap { client, base: base.into().trim_end_matches('/').to_string() }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).header(reqwest::header::ACCEPT, "application/rdap+json, application/json").send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("HTTP {} from {}", status.as_u16(), url));
        }
        Ok(body)
    }
}

#[async_trait]
impl LookupProvider for Rdap {
    async fn query(&self, target: &Target) -> LookupResult {
        let url = match target {
            Target::Domain(d) => format!("{}/domain/{}", self.base, d),
            Target::Ip(ip) => format!("{}/ip/{}", self.base, ip),
            _ => return unsupported("rdap", target),
        };
        debug!(%url, "rdap fetch");
        match self.fetch(&url).await {
            Ok(body) => render_rdap(&body),
            Err(e) => LookupResult::failed(e.to_string()),
        }
    }
}
