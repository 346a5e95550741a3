//! Target kinds and the validators that gate their construction.

use crate::error::{ReconError, ReconResult};
use regex::Regex;
use std::fmt;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[A-Za-z0-9-]+\.)+[A-Za-z]{2,}$").expect("domain pattern"))
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,3}(?:\.\d{1,3}){3}$").expect("ipv4 pattern"))
}

/// Dot-separated labels of alphanumerics/hyphens ending in a 2+ letter TLD.
pub fn validate_domain(s: &str) -> bool {
    domain_re().is_match(s)
}

/// Dotted-quad IPv4 (octet digits only, no range check) or an IPv6 literal.
pub fn validate_ip(s: &str) -> bool {
    if s.contains(':') {
        return s.parse::<Ipv6Addr>().is_ok();
    }
    ipv4_re().is_match(s)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Domain(String),
    Ip(String),
    Url(Url),
    File(PathBuf),
}

impl Target {
    pub fn domain(s: &str) -> ReconResult<Self> {
        let s = s.trim();
        if validate_domain(s) { Ok(Target::Domain(s.to_ascii_lowercase())) } else { Err(ReconError::invalid("domain", s)) }
    }

    pub fn ip(s: &str) -> ReconResult<Self> {
        let s = s.trim();
        if validate_ip(s) { Ok(Target::Ip(s.to_string())) } else { Err(ReconError::invalid("IP address", s)) }
    }

    /// Any absolute URL with a host. Scheme is checked later, before TLS.
    pub fn url(s: &str) -> ReconResult<Self> {
        let s = s.trim();
        match Url::parse(s) {
            Ok(u) if u.host_str().is_some() => Ok(Target::Url(u)),
            _ => Err(ReconError::invalid("URL", s)),
        }
    }

    pub fn file(p: impl AsRef<Path>) -> ReconResult<Self> {
        let p = p.as_ref();
        if p.is_file() { Ok(Target::File(p.to_path_buf())) } else { Err(ReconError::MissingFile(p.to_path_buf())) }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::Domain(_) => "domain",
            Target::Ip(_) => "ip",
            Target::Url(_) => "url",
            Target::File(_) => "file",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Domain(d) => f.write_str(d),
            Target::Ip(ip) => f.write_str(ip),
            Target::Url(u) => f.write_str(u.as_str()),
            Target::File(p) => write!(f, "{}", p.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        assert!(validate_domain("example.com"));
        assert!(validate_domain("sub-1.example.co.uk"));
        assert!(!validate_domain("ex ample.com"));
        assert!(!validate_domain("example"));
        assert!(!validate_domain("example.c"));
        assert!(!validate_domain("exa_mple.com"));
        assert!(!validate_domain("example.com/"));
    }

    #[test]
    fn ipv4_shape_only() {
        assert!(validate_ip("1.1.1.1"));
        assert!(validate_ip("999.1.1.1"));
        assert!(!validate_ip("1.1.1.1.1"));
        assert!(!validate_ip("1.1.1"));
        assert!(!validate_ip("a.b.c.d"));
    }

    #[test]
    fn ipv6_must_parse() {
        assert!(validate_ip("2001:db8::1"));
        assert!(validate_ip("::1"));
        assert!(!validate_ip("not:an:address"));
    }

    #[test]
    fn invalid_strings_never_become_targets() {
        assert!(matches!(Target::domain("bad domain"), Err(ReconError::InvalidTarget { .. })));
        assert!(matches!(Target::ip("1.2.3"), Err(ReconError::InvalidTarget { .. })));
        assert!(matches!(Target::url("no scheme here"), Err(ReconError::InvalidTarget { .. })));
        assert!(matches!(Target::file("/definitely/not/here.bin"), Err(ReconError::MissingFile(_))));
    }

    #[test]
    fn domain_is_lowercased() {
        assert_eq!(Target::domain("Example.COM").unwrap(), Target::Domain("example.com".into()));
    }
}
