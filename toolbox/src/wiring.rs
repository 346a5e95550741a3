//! Builds the concrete providers a session runs against.

use crate::config::Settings;
use anyhow::Result;
use async_trait::async_trait;
use dns_records::{DnsRecords, ReverseDns, TokioResolver};
use passive_intel::{CertTransparency, GeoAsn, WebArchive};
use recon_core::{LookupProvider, LookupResult, Providers, ReconError, ReconResult, Target};
use registry::{Rdap, Whois};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use web_surface::{build_client, Client, HeaderFetch, PageProbe, WebProbeOptions, WhatWeb};

const FOLLOW_REDIRECTS: usize = 5;

fn probe_options(settings: &Settings) -> WebProbeOptions {
    WebProbeOptions {
        timeout_ms: settings.http_timeout.as_millis() as u64,
        redirects: FOLLOW_REDIRECTS,
        user_agent: settings.user_agent.clone(),
    }
}

fn web_providers(settings: &Settings) -> Result<(HeaderFetch, PageProbe, Client)> {
    let opts = probe_options(settings);
    Ok((HeaderFetch::new(&opts)?, PageProbe::new(&opts)?, build_client(&opts)?))
}

/// Stands in for a capability the host lacks; every query fails with `reason`.
struct Unavailable(String);

#[async_trait]
impl LookupProvider for Unavailable {
    async fn query(&self, _target: &Target) -> LookupResult {
        LookupResult::failed(self.0.clone())
    }
}

type DnsPair = (Box<dyn LookupProvider>, Box<dyn LookupProvider>);

/// Forward and reverse DNS providers. Without a resolver the run only stops
/// when `required`; otherwise both sections report the gap.
fn dns_pair(resolver: Result<Arc<TokioResolver>>, required: bool, limit: Duration) -> ReconResult<DnsPair> {
    match resolver {
        Ok(r) => {
            let forward: Box<dyn LookupProvider> = Box::new(DnsRecords::new(r.clone(), limit));
            let reverse: Box<dyn LookupProvider> = Box::new(ReverseDns::new(r, limit));
            Ok((forward, reverse))
        }
        Err(e) => {
            let reason = format!("system DNS configuration: {}", e);
            if required {
                return Err(ReconError::MissingCapability(reason));
            }
            warn!("{}", reason);
            let forward: Box<dyn LookupProvider> = Box::new(Unavailable(reason.clone()));
            let reverse: Box<dyn LookupProvider> = Box::new(Unavailable(reason));
            Ok((forward, reverse))
        }
    }
}

/// An HTTP client is always required. The system DNS configuration is
/// required only when `dns_required`; anything else missing only degrades
/// individual sections.
pub fn providers(settings: &Settings, dns_required: bool) -> ReconResult<Providers> {
    let (dns, reverse_dns) = dns_pair(dns_records::system_resolver(), dns_required, settings.dns_timeout)?;
    let (http_headers, page, client) =
        web_providers(settings).map_err(|e| ReconError::MissingCapability(format!("HTTP client: {}", e)))?;

    Ok(Providers {
        dns,
        reverse_dns,
        whois: Box::new(Whois::new(settings.iana_server.clone(), settings.whois_timeout, settings.whois_max_lines)),
        rdap: Box::new(Rdap::new(client.clone(), settings.rdap_base.clone())),
        cert_transparency: Box::new(CertTransparency::new(client.clone(), settings.crt_base.clone())),
        web_archive: Box::new(WebArchive::new(client.clone(), settings.wayback_base.clone())),
        geo: Box::new(GeoAsn::new(client, settings.geo_base.clone())),
        http_headers: Box::new(http_headers),
        tls: Box::new(tls_cert::TlsInspector::new(settings.tls_timeout)),
        page: Box::new(page),
        fingerprint: Box::new(WhatWeb::new(settings.tool_timeout)),
        file_identity: Box::new(forensics::FileIdentity),
        file_metadata: Box::new(forensics::FileMetadata::new(settings.tool_timeout)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_resolver_degrades_when_optional() {
        let (dns, rdns) = dns_pair(Err(anyhow::anyhow!("no resolv.conf")), false, Duration::from_secs(1)).unwrap();
        let r = dns.query(&Target::Domain("example.com".into())).await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("no resolv.conf"));
        assert!(!rdns.query(&Target::Ip("192.0.2.1".into())).await.success);
    }

    #[test]
    fn missing_resolver_is_fatal_when_required() {
        let err = dns_pair(Err(anyhow::anyhow!("no resolv.conf")), true, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, ReconError::MissingCapability(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn probe_options_follow_settings() {
        let s = Settings::resolve(None);
        let o = probe_options(&s);
        assert_eq!(o.timeout_ms, 15_000);
        assert_eq!(o.redirects, FOLLOW_REDIRECTS);
        assert!(o.user_agent.starts_with("osint-toolbox/"));
    }
}
