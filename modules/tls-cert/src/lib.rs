//! TLS handshake to host:port and a summary of the leaf certificate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use recon_core::{unsupported, LookupProvider, LookupResult, Target};
use rustls::ClientConfig;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;

pub const DEFAULT_TLS_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub sans: Vec<String>,
}

impl CertSummary {
    pub fn into_result(self, host: &str, port: u16, protocol: Option<String>) -> LookupResult {
        let mut r = LookupResult::fields([
            ("Endpoint", format!("{}:{}", host, port)),
            ("Subject", self.subject),
            ("Issuer", self.issuer),
            ("Not Before", self.not_before),
            ("Not After", self.not_after),
        ]);
        if let Some(p) = protocol {
            r.push_field("Protocol", p);
        }
        if self.sans.is_empty() {
            r.push_field("SAN", "(none)");
        }
        for san in self.sans {
            r.push_field("SAN", san);
        }
        r
    }
}

/// Host and port to handshake with; the port defaults to 443 whatever the scheme.
pub fn endpoint(url: &Url) -> Option<(String, u16)> {
    let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']').to_string();
    Some((host, url.port().unwrap_or(DEFAULT_TLS_PORT)))
}

fn ip_from_bytes(b: &[u8]) -> String {
    match b.len() {
        4 => IpAddr::from([b[0], b[1], b[2], b[3]]).to_string(),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(b);
            Ipv6Addr::from(octets).to_string()
        }
        _ => format!("{:02x?}", b),
    }
}

pub fn summarize(der: &[u8]) -> Result<CertSummary> {
    use x509_parser::prelude::*;
    let (_, x509) = X509Certificate::from_der(der).map_err(|e| anyhow!("certificate parse failed: {}", e))?;
    let stamp = |t: &ASN1Time| t.to_datetime().format(&Rfc3339).unwrap_or_else(|_| t.to_string());
    let mut sans = Vec::new();
    for ext in x509.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                match name {
                    GeneralName::DNSName(d) => sans.push(d.to_string()),
                    GeneralName::IPAddress(b) => sans.push(ip_from_bytes(b)),
                    _ => {}
                }
            }
        }
    }
    Ok(CertSummary {
        subject: x509.subject().to_string(),
        issuer: x509.issuer().to_string(),
        not_before: stamp(&x509.validity().not_before),
        not_after: stamp(&x509.validity().not_after),
        sans,
    })
}

async fn resolve_first(host: &str, port: u16, limit: Duration) -> Result<SocketAddr> {
    let mut it = timeout(limit, lookup_host((host, port)))
        .await
        .map_err(|_| anyhow!("resolving {} timed out after {} ms", host, limit.as_millis()))??;
    it.next().ok_or_else(|| anyhow!("failed to resolve: {}", host))
}

/// Handshake and return the leaf certificate DER plus the negotiated version.
async fn leaf_certificate(host: &str, port: u16, limit: Duration) -> Result<(Vec<u8>, Option<String>)> {
    // Ensure a crypto provider is installed (ring)
    let _ = rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());
    let addr = resolve_first(host, port, limit).await?;
    let stream = timeout(limit, TcpStream::connect(addr)).await??;
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder().with_root_certificates(root_store).with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = match host.parse::<IpAddr>() {
        Ok(ip) => rustls::pki_types::ServerName::IpAddress(ip.into()),
        Err(_) => rustls::pki_types::ServerName::try_from(host.to_owned()).map_err(|_| anyhow!("invalid server name"))?,
    };
    let tls = timeout(limit, connector.connect(server_name, stream)).await??;
    let conn = tls.get_ref().1;
    let version = conn.protocol_version().map(|v| format!("{:?}", v));
    let leaf = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|c| c.as_ref().to_vec())
        .ok_or_else(|| anyhow!("server presented no certificate"))?;
    Ok((leaf, version))
}

pub struct TlsInspector {
    timeout: Duration,
}

impl TlsInspector {
    pub fn new(timeout: Duration) -> Self {
        TlsInspector { timeout }
    }
}

#[async_trait]
impl LookupProvider for TlsInspector {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::Url(url) = target else { return unsupported("tls", target) };
        if !matches!(url.scheme(), "http" | "https") {
            return LookupResult::skipped(format!("TLS check skipped for scheme '{}'", url.scheme()));
        }
        let Some((host, port)) = endpoint(url) else { return LookupResult::failed("URL has no host") };
        debug!(%host, port, "tls handshake");
        let outcome = match leaf_certificate(&host, port, self.timeout).await {
            Ok((der, version)) => summarize(&der).map(|s| s.into_result(&host, port, version)),
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| LookupResult::failed(e.to_string()))
    }
}
