//! Third-party passive sources: certificate transparency (crt.sh), the
//! Wayback CDX index, and ip-api geo/ASN data.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use recon_core::{unsupported, LookupProvider, LookupResult, Target};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

pub const MAX_SUBDOMAINS: usize = 100;
pub const MAX_SNAPSHOTS: usize = 5;

async fn get_text(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(anyhow!("rate limited by {} (HTTP 429)", url));
    }
    if !status.is_success() {
        return Err(anyhow!("HTTP {} from {}", status.as_u16(), url));
    }
    Ok(resp.text().await?)
}

#[derive(Debug, Deserialize)]
struct CrtEntry {
    name_value: String,
}

/// Lowercase, dedupe, sort, cap. Returns the kept names and the distinct total.
pub fn normalize_subdomains<I, S>(names: I, cap: usize) -> (Vec<String>, usize)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = names
        .into_iter()
        .flat_map(|n| n.as_ref().lines().map(|l| l.trim().to_ascii_lowercase()).collect::<Vec<_>>())
        .filter(|n| !n.is_empty())
        .collect();
    let total = set.len();
    (set.into_iter().take(cap).collect(), total)
}

pub fn parse_crt(body: &str) -> Result<(Vec<String>, usize)> {
    let entries: Vec<CrtEntry> = serde_json::from_str(body)?;
    Ok(normalize_subdomains(entries.iter().map(|e| e.name_value.as_str()), MAX_SUBDOMAINS))
}

pub struct CertTransparency {
    client: Client,
    base: String,
}

impl CertTransparency {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        CertTransparency { client, base: base.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl LookupProvider for CertTransparency {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::Domain(domain) = target else { return unsupported("certificate transparency", target) };
        let url = format!("{}/?q=%25.{}&output=json", self.base, domain);
        debug!(%url, "crt.sh query");
        let body = match get_text(&self.client, &url).await {
            Ok(b) => b,
            Err(e) => return LookupResult::failed(e.to_string()),
        };
        match parse_crt(&body) {
            Ok((names, total)) => {
                let mut r = LookupResult::lines(names);
                if total > MAX_SUBDOMAINS {
                    r = r.with_note(format!("showing {} of {} unique names", MAX_SUBDOMAINS, total));
                }
                r
            }
            Err(e) => LookupResult::failed(format!("unparseable crt.sh response: {}", e)),
        }
    }
}

/// CDX JSON output: a header row followed by `[timestamp, original]` rows.
pub fn parse_cdx(body: &str, cap: usize) -> Result<Vec<String>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<Vec<String>> = serde_json::from_str(body)?;
    Ok(rows
        .into_iter()
        .filter(|row| row.len() >= 2 && row[0] != "timestamp")
        .take(cap)
        .map(|row| format!("{}\t{}", row[0], row[1]))
        .collect())
}

pub struct WebArchive {
    client: Client,
    base: String,
}

impl WebArchive {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        WebArchive { client, base: base.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl LookupProvider for WebArchive {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::Domain(domain) = target else { return unsupported("web archive", target) };
        let url = format!(
            "{}/cdx/search/cdx?url={}&output=json&fl=timestamp,original&limit={}",
            self.base, domain, MAX_SNAPSHOTS
        );
        debug!(%url, "cdx query");
        match get_text(&self.client, &url).await.and_then(|b| parse_cdx(&b, MAX_SNAPSHOTS)) {
            Ok(rows) if rows.is_empty() => LookupResult::lines(["(no snapshots)"]),
            Ok(rows) => LookupResult::lines(rows),
            Err(e) => LookupResult::failed(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeoAnswer {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, rename = "regionName")]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default, rename = "as")]
    pub asn: Option<String>,
}

pub fn render_geo(answer: GeoAnswer) -> LookupResult {
    if answer.status != "success" {
        return LookupResult::failed(format!(
            "geo service answered {}: {}",
            answer.status,
            answer.message.unwrap_or_default()
        ));
    }
    let field = |v: Option<String>| v.unwrap_or_default();
    LookupResult::fields([
        ("Status", answer.status.clone()),
        ("Country", field(answer.country)),
        ("Region", field(answer.region)),
        ("City", field(answer.city)),
        ("ISP", field(answer.isp)),
        ("Org", field(answer.org)),
        ("AS", field(answer.asn)),
    ])
}

pub struct GeoAsn {
    client: Client,
    base: String,
}

impl GeoAsn {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        GeoAsn { client, base: base.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl LookupProvider for GeoAsn {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::Ip(ip) = target else { return unsupported("geo/asn", target) };
        let url = format!("{}/json/{}?fields=status,message,country,regionName,city,isp,org,as", self.base, ip);
        debug!(%url, "geo query");
        let body = match get_text(&self.client, &url).await {
            Ok(b) => b,
            Err(e) => return LookupResult::failed(e.to_string()),
        };
        match serde_json::from_str::<GeoAnswer>(&body) {
            Ok(answer) => render_geo(answer),
            Err(e) => LookupResult::failed(format!("unparseable geo response: {}", e)),
        }
    }
}
