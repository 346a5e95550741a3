use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "osint.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct TimeoutConfig {
    pub dns_ms: Option<u64>,
    pub whois_ms: Option<u64>,
    pub http_ms: Option<u64>,
    pub tls_ms: Option<u64>,
    pub tool_ms: Option<u64>,
    pub provider_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct WhoisConfig {
    pub max_lines: Option<usize>,
    pub iana_server: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct EndpointConfig {
    pub rdap: Option<String>,
    pub crt: Option<String>,
    pub wayback: Option<String>,
    pub geo: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub timeouts: Option<TimeoutConfig>,
    pub whois: Option<WhoisConfig>,
    pub endpoints: Option<EndpointConfig>,
    pub user_agent: Option<String>,
}

/// Explicit path, else `./osint.yaml` when present. Unreadable or malformed
/// files fall back to defaults with a warning.
pub fn load_config(path: Option<&Path>) -> Option<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return None; }
        }
    };
    let s = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), "config unreadable, using defaults: {}", e);
            return None;
        }
    };
    match serde_yaml::from_str(&s) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), "config unparseable, using defaults: {}", e);
            None
        }
    }
}

/// Config with every default filled in.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dns_timeout: Duration,
    pub whois_timeout: Duration,
    pub http_timeout: Duration,
    pub tls_timeout: Duration,
    pub tool_timeout: Duration,
    pub provider_deadline: Duration,
    pub whois_max_lines: usize,
    pub iana_server: String,
    pub rdap_base: String,
    pub crt_base: String,
    pub wayback_base: String,
    pub geo_base: String,
    pub user_agent: String,
}

impl Settings {
    pub fn resolve(cfg: Option<Config>) -> Self {
        let cfg = cfg.unwrap_or_default();
        let t = cfg.timeouts.unwrap_or_default();
        let w = cfg.whois.unwrap_or_default();
        let e = cfg.endpoints.unwrap_or_default();
        let ms = |v: Option<u64>, d: u64| Duration::from_millis(v.unwrap_or(d));
        Settings {
            dns_timeout: ms(t.dns_ms, 5_000),
            whois_timeout: ms(t.whois_ms, 10_000),
            http_timeout: ms(t.http_ms, 15_000),
            tls_timeout: ms(t.tls_ms, 8_000),
            tool_timeout: ms(t.tool_ms, 60_000),
            provider_deadline: ms(t.provider_ms, 90_000),
            whois_max_lines: w.max_lines.unwrap_or(registry::DEFAULT_MAX_LINES),
            iana_server: w.iana_server.unwrap_or_else(|| registry::DEFAULT_IANA_SERVER.into()),
            rdap_base: e.rdap.unwrap_or_else(|| "https://rdap.org".into()),
            crt_base: e.crt.unwrap_or_else(|| "https://crt.sh".into()),
            wayback_base: e.wayback.unwrap_or_else(|| "https://web.archive.org".into()),
            geo_base: e.geo.unwrap_or_else(|| "http://ip-api.com".into()),
            user_agent: cfg.user_agent.unwrap_or_else(|| format!("osint-toolbox/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}
