//! HTTP surface of a URL: raw response headers, a page summary with cheap
//! technology hints, and the optional `whatweb` fingerprinter.

use anyhow::Result;
use async_trait::async_trait;
use recon_core::tool::{run_tool, ToolRun};
use recon_core::{unsupported, LookupProvider, LookupResult, Target};
use reqwest::{header::HeaderMap, redirect::Policy};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub use reqwest::Client;

const MAX_BODY: usize = 128 * 1024;

#[derive(Debug, Clone)]
pub struct WebProbeOptions {
    pub timeout_ms: u64,
    pub redirects: usize,
    pub user_agent: String,
}

pub fn build_client(opts: &WebProbeOptions) -> Result<Client> {
    let policy = if opts.redirects == 0 { Policy::none() } else { Policy::limited(opts.redirects) };
    Ok(Client::builder()
        .redirect(policy)
        .timeout(Duration::from_millis(opts.timeout_ms))
        .user_agent(opts.user_agent.clone())
        .brotli(true)
        .gzip(true)
        .deflate(true)
        .build()?)
}

fn url_of(target: &Target) -> Option<&Url> {
    match target {
        Target::Url(u) => Some(u),
        _ => None,
    }
}

/// Render a status line and headers the way a raw HEAD response reads.
pub fn header_block(status_line: &str, headers: &HeaderMap) -> Vec<String> {
    let mut out = vec![status_line.to_string()];
    for (name, value) in headers {
        out.push(format!("{}: {}", name.as_str(), String::from_utf8_lossy(value.as_bytes())));
    }
    out
}

/// HEAD request without following redirects.
pub struct HeaderFetch {
    client: Client,
}

impl HeaderFetch {
    pub fn new(opts: &WebProbeOptions) -> Result<Self> {
        let opts = WebProbeOptions { redirects: 0, ..opts.clone() };
        Ok(HeaderFetch { client: build_client(&opts)? })
    }

    async fn fetch_head(&self, url: &Url) -> Result<Vec<String>> {
        let resp = self.client.head(url.as_str()).send().await?;
        let status_line = format!("{:?} {}", resp.version(), resp.status());
        Ok(header_block(&status_line, resp.headers()))
    }
}

#[async_trait]
impl LookupProvider for HeaderFetch {
    async fn query(&self, target: &Target) -> LookupResult {
        let Some(url) = url_of(target) else { return unsupported("http headers", target) };
        debug!(%url, "HEAD");
        match self.fetch_head(url).await {
            Ok(lines) => LookupResult::lines(lines),
            Err(e) => LookupResult::failed(e.to_string()),
        }
    }
}

/// Small GET for status, final URL, title and header/body hints.
pub struct PageProbe {
    client: Client,
}

impl PageProbe {
    pub fn new(opts: &WebProbeOptions) -> Result<Self> {
        Ok(PageProbe { client: build_client(opts)? })
    }

    async fn fetch_page_info(&self, url: &Url) -> Result<LookupResult> {
        let resp = self.client.get(url.as_str()).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let headers = resp.headers().clone();
        let ct_is_html = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.contains("text/html"))
            .unwrap_or(false);
        let bytes = resp.bytes().await?;

        let mut r = LookupResult::fields([("Status", status.to_string()), ("Final URL", final_url)]);
        if let Some(server) = headers.get(reqwest::header::SERVER).and_then(|v| v.to_str().ok()) {
            r.push_field("Server", server);
        }
        let (title, fps) = if bytes.len() > MAX_BODY {
            r = r.with_note(format!("body over {} KiB; header hints only", MAX_BODY / 1024));
            (None, compute_fingerprints(&headers, None, ""))
        } else {
            let body = String::from_utf8_lossy(&bytes);
            let title = if ct_is_html || body.to_lowercase().contains("<html") { extract_title(&body) } else { None };
            let fps = compute_fingerprints(&headers, title.as_deref(), &body);
            (title, fps)
        };
        r.push_field("Title", title.unwrap_or_else(|| "(none)".into()));
        r.push_field("Hints", if fps.is_empty() { "(none)".to_string() } else { fps.join(", ") });
        Ok(r)
    }
}

#[async_trait]
impl LookupProvider for PageProbe {
    async fn query(&self, target: &Target) -> LookupResult {
        let Some(url) = url_of(target) else { return unsupported("page probe", target) };
        debug!(%url, "GET");
        self.fetch_page_info(url).await.unwrap_or_else(|e| LookupResult::failed(e.to_string()))
    }
}

fn title_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("title pattern"))
}

fn extract_title(body: &str) -> Option<String> {
    let t = title_pattern().captures(body)?.get(1)?.as_str().trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

fn compute_fingerprints(headers: &HeaderMap, title: Option<&str>, body: &str) -> Vec<String> {
    let mut fps = Vec::new();
    if let Some(v) = headers.get(reqwest::header::SERVER).and_then(|v| v.to_str().ok()) {
        let l = v.to_lowercase();
        if l.contains("nginx") { fps.push("server:nginx".into()); }
        if l.contains("apache") { fps.push("server:apache".into()); }
        if l.contains("iis") { fps.push("server:iis".into()); }
        if l.contains("cloudflare") { fps.push("cdn:cloudflare".into()); }
        if l.contains("caddy") { fps.push("server:caddy".into()); }
    }
    if let Some(v) = headers.get("x-powered-by").and_then(|v| v.to_str().ok()) {
        let l = v.to_lowercase();
        if l.contains("php") { fps.push("lang:php".into()); }
        if l.contains("express") { fps.push("framework:express".into()); }
        if l.contains("asp.net") { fps.push("framework:aspnet".into()); }
        if l.contains("django") { fps.push("framework:django".into()); }
    }
    if headers.get("x-drupal-cache").is_some() { fps.push("cms:drupal".into()); }
    if headers.get("cf-ray").is_some() { fps.push("cdn:cloudflare".into()); }

    if let Some(t) = title.map(|s| s.to_lowercase()) {
        if t.contains("index of /") { fps.push("feature:dir-listing".into()); }
        if t.contains("wordpress") { fps.push("cms:wordpress".into()); }
        if t.contains("grafana") { fps.push("product:grafana".into()); }
    }
    let bl = body.to_lowercase();
    if bl.contains("wp-content/") { fps.push("cms:wordpress".into()); }
    if bl.contains("joomla!") { fps.push("cms:joomla".into()); }
    if bl.contains("/sites/default/files") { fps.push("cms:drupal".into()); }
    if bl.contains("react-dom") || bl.contains("data-reactroot") { fps.push("js:react".into()); }
    if bl.contains("__next_data__") { fps.push("framework:nextjs".into()); }
    fps.sort();
    fps.dedup();
    fps
}

/// Technology fingerprint via `whatweb`; skipped when it is not installed.
pub struct WhatWeb {
    program: String,
    timeout: Duration,
}

impl WhatWeb {
    pub fn new(timeout: Duration) -> Self {
        WhatWeb { program: "whatweb".into(), timeout }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl LookupProvider for WhatWeb {
    async fn query(&self, target: &Target) -> LookupResult {
        let Some(url) = url_of(target) else { return unsupported("fingerprint", target) };
        match run_tool(&self.program, &["--color=never", "--no-errors", url.as_str()], self.timeout).await {
            Ok(ToolRun::Missing) => {
                debug!(program = %self.program, "fingerprinter not installed");
                LookupResult::skipped(format!("{} not installed", self.program))
            }
            Ok(ToolRun::Output { ok: true, stdout, .. }) => LookupResult::lines(stdout.lines()),
            Ok(ToolRun::Output { stdout, stderr, .. }) => {
                warn!(program = %self.program, "fingerprinter exited non-zero");
                let mut r = LookupResult::failed(format!("{} exited with an error: {}", self.program, stderr.trim()));
                r.entries = LookupResult::lines(stdout.lines()).entries;
                r
            }
            Err(e) => LookupResult::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, SERVER};

    #[test]
    fn header_block_is_name_colon_value() {
        let mut h = HeaderMap::new();
        h.insert("strict-transport-security", HeaderValue::from_static("max-age=1"));
        let lines = header_block("HTTP/1.1 200 OK", &h);
        assert_eq!(lines, vec!["HTTP/1.1 200 OK", "strict-transport-security: max-age=1"]);
    }

    #[test]
    fn title_extraction() {
        assert_eq!(extract_title("<html><TITLE> Hello </TITLE></html>").as_deref(), Some("Hello"));
        assert_eq!(extract_title("<html><title></title></html>"), None);
        assert_eq!(extract_title("no markup"), None);
    }

    #[test]
    fn title_after_multibyte_text() {
        assert_eq!(extract_title("<html><head>\u{e9}\u{212a}<title>Welcome</title></head></html>").as_deref(), Some("Welcome"));
        assert_eq!(extract_title("<p>\u{212a}\u{212a}</p><TiTlE lang=en>K\u{212a}</TITLE>").as_deref(), Some("K\u{212a}"));
    }

    #[test]
    fn fingerprints_are_sorted_and_unique() {
        let mut h = HeaderMap::new();
        h.insert(SERVER, HeaderValue::from_static("cloudflare"));
        h.insert("cf-ray", HeaderValue::from_static("abc"));
        let fps = compute_fingerprints(&h, Some("WordPress site"), "<link href=/wp-content/x.css>");
        assert_eq!(fps, vec!["cdn:cloudflare", "cms:wordpress"]);
    }

    #[tokio::test]
    async fn missing_tool_is_skipped_not_failed() {
        let ww = WhatWeb::new(Duration::from_secs(5)).with_program("definitely-not-a-real-fingerprinter");
        let t = Target::Url(Url::parse("https://example.com/").unwrap());
        let r = ww.query(&t).await;
        assert!(r.success);
        assert_eq!(r.render_lines(), vec!["(definitely-not-a-real-fingerprinter not installed)"]);
    }
}
