//! DNS record fetch (A/AAAA/MX/NS/TXT) and PTR lookups over the system resolver.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::system_conf::read_system_conf;
pub use hickory_resolver::TokioResolver;
use recon_core::{unsupported, LookupProvider, LookupResult, Target};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub const RECORD_TYPES: [&str; 5] = ["A", "AAAA", "MX", "NS", "TXT"];

/// Resolver built from the host's resolv.conf (or platform equivalent).
pub fn system_resolver() -> Result<Arc<TokioResolver>> {
    let (config, opts) = read_system_conf()?;
    let resolver = TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(opts)
        .build();
    Ok(Arc::new(resolver))
}

type Outcome = std::result::Result<Vec<String>, String>;

async fn fetch(resolver: &TokioResolver, name: &str, rtype: &str) -> Result<Vec<String>> {
    let found: std::result::Result<Vec<String>, hickory_resolver::ResolveError> = match rtype {
        "A" => resolver.ipv4_lookup(name).await.map(|r| r.iter().map(|a| a.to_string()).collect()),
        "AAAA" => resolver.ipv6_lookup(name).await.map(|r| r.iter().map(|a| a.to_string()).collect()),
        "MX" => resolver.mx_lookup(name).await.map(|r| {
            r.iter()
                .map(|mx| format!("{} {}", mx.preference(), mx.exchange().to_string().trim_end_matches('.')))
                .collect()
        }),
        "NS" => resolver
            .ns_lookup(name)
            .await
            .map(|r| r.iter().map(|ns| ns.to_string().trim_end_matches('.').to_string()).collect()),
        "TXT" => resolver.txt_lookup(name).await.map(|r| {
            r.iter()
                .map(|txt| txt.iter().map(|d| String::from_utf8_lossy(d).into_owned()).collect::<String>())
                .collect()
        }),
        other => return Err(anyhow!("unsupported record type {}", other)),
    };
    match found {
        Ok(v) => Ok(v),
        Err(e) if e.is_no_records_found() => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Fold per-type outcomes into one section body. A failed type becomes an
/// annotated line; only when every type failed is the whole lookup failed.
fn assemble(outcomes: Vec<(&'static str, Outcome)>) -> LookupResult {
    let total = outcomes.len();
    let mut out = LookupResult::ok(Vec::new());
    let mut failures = 0usize;
    for (rtype, outcome) in outcomes {
        match outcome {
            Ok(values) if values.is_empty() => out.push_line(format!("{}: (no records)", rtype)),
            Ok(values) => {
                for v in values {
                    out.push_field(rtype, v);
                }
            }
            Err(e) => {
                failures += 1;
                out.push_line(format!("{}: [!] {}", rtype, e));
            }
        }
    }
    if failures == total && total > 0 {
        out.success = false;
        out.error = Some("every record query failed".into());
    } else if failures > 0 {
        out = out.with_note(format!("{} of {} record queries failed", failures, total));
    }
    out
}

pub struct DnsRecords {
    resolver: Arc<TokioResolver>,
    timeout: Duration,
}

impl DnsRecords {
    pub fn new(resolver: Arc<TokioResolver>, timeout: Duration) -> Self {
        DnsRecords { resolver, timeout }
    }
}

#[async_trait]
impl LookupProvider for DnsRecords {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::Domain(name) = target else { return unsupported("dns", target) };
        let queries = RECORD_TYPES.iter().map(|&rtype| async move {
            debug!(name = %name, rtype, "dns query");
            let outcome = match timeout(self.timeout, fetch(&self.resolver, name, rtype)).await {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {} ms", self.timeout.as_millis())),
            };
            (rtype, outcome)
        });
        // join_all keeps input order, so the section order is fixed
        assemble(join_all(queries).await)
    }
}

pub struct ReverseDns {
    resolver: Arc<TokioResolver>,
    timeout: Duration,
}

impl ReverseDns {
    pub fn new(resolver: Arc<TokioResolver>, timeout: Duration) -> Self {
        ReverseDns { resolver, timeout }
    }
}

#[async_trait]
impl LookupProvider for ReverseDns {
    async fn query(&self, target: &Target) -> LookupResult {
        let Target::Ip(raw) = target else { return unsupported("reverse dns", target) };
        let ip: IpAddr = match raw.parse() {
            Ok(ip) => ip,
            Err(_) => return LookupResult::failed(format!("{} is not a routable address", raw)),
        };
        debug!(%ip, "ptr query");
        let outcome = match timeout(self.timeout, self.resolver.reverse_lookup(ip)).await {
            Ok(Ok(names)) => PtrOutcome::Names(names.iter().map(|n| n.to_string()).collect()),
            Ok(Err(e)) if e.is_no_records_found() => PtrOutcome::NoRecords,
            Ok(Err(e)) => PtrOutcome::Failed(e.to_string()),
            Err(_) => PtrOutcome::TimedOut(self.timeout),
        };
        ptr_result(raw, outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtrOutcome {
    Names(Vec<String>),
    NoRecords,
    Failed(String),
    TimedOut(Duration),
}

/// One `ip: name, name` field. No PTR is an empty answer, not a failure.
pub fn ptr_result(ip: &str, outcome: PtrOutcome) -> LookupResult {
    match outcome {
        PtrOutcome::Names(names) => {
            let names: Vec<&str> = names.iter().map(|n| n.trim_end_matches('.')).collect();
            LookupResult::fields([(ip, names.join(", "))])
        }
        PtrOutcome::NoRecords => LookupResult::fields([(ip, String::new())]),
        PtrOutcome::Failed(e) => LookupResult::failed(e),
        PtrOutcome::TimedOut(limit) => LookupResult::failed(format!("timed out after {} ms", limit.as_millis())),
    }
}
