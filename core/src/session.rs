//! Per-kind orchestration: validate, write a run header, then run each
//! provider in a fixed order and append its section as soon as it returns.

use crate::audit::audit_result;
use crate::error::ReconResult;
use crate::format::ReportSection;
use crate::lookup::{LookupProvider, LookupResult};
use crate::report::{iso8601, Report};
use crate::target::Target;
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const DEFAULT_PROVIDER_DEADLINE: Duration = Duration::from_secs(90);

const CHECKLIST: &[&str] = &[
    "[ ] Confirm scope and written authorization for every target",
    "[ ] Domain: registrar, registrant, creation/expiry dates (WHOIS/RDAP)",
    "[ ] DNS: A/AAAA/MX/NS/TXT, SPF/DMARC policy in TXT records",
    "[ ] Subdomains from certificate-transparency logs",
    "[ ] Historical snapshots in the web archive",
    "[ ] Hosting: reverse DNS, ASN, network owner, geolocation",
    "[ ] Web: security headers, TLS issuer/validity/SANs, technology stack",
    "[ ] Files: embedded metadata (authors, software, GPS, timestamps)",
    "[ ] Record sources and timestamps for every finding",
];

/// Every external capability a session can call on.
pub struct Providers {
    pub dns: Box<dyn LookupProvider>,
    pub reverse_dns: Box<dyn LookupProvider>,
    pub whois: Box<dyn LookupProvider>,
    pub rdap: Box<dyn LookupProvider>,
    pub cert_transparency: Box<dyn LookupProvider>,
    pub web_archive: Box<dyn LookupProvider>,
    pub geo: Box<dyn LookupProvider>,
    pub http_headers: Box<dyn LookupProvider>,
    pub tls: Box<dyn LookupProvider>,
    pub page: Box<dyn LookupProvider>,
    pub fingerprint: Box<dyn LookupProvider>,
    pub file_identity: Box<dyn LookupProvider>,
    pub file_metadata: Box<dyn LookupProvider>,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Dns,
    ReverseDns,
    Whois,
    Rdap,
    CertTransparency,
    WebArchive,
    Geo,
    HttpHeaders,
    Tls,
    Page,
    Fingerprint,
    FileIdentity,
    FileMetadata,
}

impl Providers {
    fn get(&self, source: Source) -> &dyn LookupProvider {
        match source {
            Source::Dns => self.dns.as_ref(),
            Source::ReverseDns => self.reverse_dns.as_ref(),
            Source::Whois => self.whois.as_ref(),
            Source::Rdap => self.rdap.as_ref(),
            Source::CertTransparency => self.cert_transparency.as_ref(),
            Source::WebArchive => self.web_archive.as_ref(),
            Source::Geo => self.geo.as_ref(),
            Source::HttpHeaders => self.http_headers.as_ref(),
            Source::Tls => self.tls.as_ref(),
            Source::Page => self.page.as_ref(),
            Source::Fingerprint => self.fingerprint.as_ref(),
            Source::FileIdentity => self.file_identity.as_ref(),
            Source::FileMetadata => self.file_metadata.as_ref(),
        }
    }
}

/// Invocation context: the one report plus the providers that feed it.
pub struct Session {
    report: Report,
    providers: Providers,
    provider_deadline: Duration,
}

impl Session {
    pub fn new(report: Report, providers: Providers) -> Self {
        Session { report, providers, provider_deadline: DEFAULT_PROVIDER_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.provider_deadline = deadline;
        self
    }

    pub fn report(&self) -> &Report { &self.report }

    pub async fn domain(&mut self, input: &str) -> ReconResult<()> {
        let target = Target::domain(input)?;
        info!(%target, "domain run");
        self.header("Domain Recon", Some(&target))?;

        let dns = self.section("DNS Records", Source::Dns, &target).await?;
        self.section("WHOIS", Source::Whois, &target).await?;
        self.section("RDAP", Source::Rdap, &target).await?;
        self.section("Certificate Transparency", Source::CertTransparency, &target).await?;
        self.section("Wayback Snapshots", Source::WebArchive, &target).await?;

        let a_records: Vec<String> = dns.values_for("A").map(str::to_string).collect();
        let rdns = self.reverse_each(&a_records).await;
        self.emit("Reverse DNS", rdns)?;

        let site = Target::url(&format!("https://{}", target))?;
        self.http_target(&site).await
    }

    pub async fn ip(&mut self, input: &str) -> ReconResult<()> {
        let target = Target::ip(input)?;
        info!(%target, "ip run");
        self.header("IP Recon", Some(&target))?;
        self.section("WHOIS", Source::Whois, &target).await?;
        self.section("Geo/ASN", Source::Geo, &target).await?;
        self.section("Reverse DNS", Source::ReverseDns, &target).await?;
        Ok(())
    }

    pub async fn http(&mut self, input: &str) -> ReconResult<()> {
        let target = Target::url(input)?;
        info!(%target, "http run");
        self.http_target(&target).await
    }

    pub async fn file(&mut self, path: &Path) -> ReconResult<()> {
        let target = Target::file(path)?;
        info!(%target, "file run");
        self.header("File Recon", Some(&target))?;
        self.section("File Identity", Source::FileIdentity, &target).await?;
        self.section("File Metadata", Source::FileMetadata, &target).await?;
        Ok(())
    }

    pub fn checklist(&mut self) -> ReconResult<()> {
        self.header("OSINT Checklist", None)?;
        self.emit("Manual Checklist", LookupResult::lines(CHECKLIST.iter().copied()))
    }

    async fn http_target(&mut self, target: &Target) -> ReconResult<()> {
        self.header("HTTP/TLS Recon", Some(target))?;
        let headers = self.section("HTTP Headers", Source::HttpHeaders, target).await?;
        let audit = if headers.success {
            let block: Vec<String> = headers.entries.iter().map(|e| e.render()).collect();
            audit_result(&block.join("\n"))
        } else {
            LookupResult::failed("no header block retrieved")
        };
        self.emit("Security Header Audit", audit)?;

        let scheme = match target {
            Target::Url(u) => u.scheme().to_string(),
            _ => String::new(),
        };
        if scheme == "http" || scheme == "https" {
            self.section("TLS Certificate", Source::Tls, target).await?;
        } else {
            self.emit("TLS Certificate", LookupResult::skipped(format!("TLS check skipped for scheme '{}'", scheme)))?;
        }
        self.section("Page Summary", Source::Page, target).await?;
        self.section("Technology Fingerprint", Source::Fingerprint, target).await?;
        Ok(())
    }

    async fn reverse_each(&self, ips: &[String]) -> LookupResult {
        let mut out = LookupResult::ok(Vec::new());
        if ips.is_empty() {
            return out.with_note("no A records to resolve");
        }
        for ip in ips {
            let target = match Target::ip(ip) {
                Ok(t) => t,
                Err(e) => {
                    out.push_field(ip.as_str(), format!("[!] {}", e));
                    continue;
                }
            };
            let r = self.lookup(Source::ReverseDns, &target).await;
            if r.success {
                out.entries.extend(r.entries);
            } else {
                out.push_field(ip.as_str(), format!("[!] {}", r.error.unwrap_or_else(|| "lookup failed".into())));
            }
        }
        out
    }

    async fn lookup(&self, source: Source, target: &Target) -> LookupResult {
        debug!(?source, %target, "provider call");
        let provider = self.providers.get(source);
        match tokio::time::timeout(self.provider_deadline, provider.query(target)).await {
            Ok(r) => {
                if !r.success {
                    warn!(?source, %target, error = r.error.as_deref().unwrap_or(""), "provider failed");
                }
                r
            }
            Err(_) => {
                warn!(?source, %target, "provider deadline hit");
                LookupResult::failed(format!("timed out after {} ms", self.provider_deadline.as_millis()))
            }
        }
    }

    async fn section(&mut self, title: &str, source: Source, target: &Target) -> ReconResult<LookupResult> {
        let r = self.lookup(source, target).await;
        self.emit(title, r.clone())?;
        Ok(r)
    }

    fn emit(&mut self, title: &str, body: LookupResult) -> ReconResult<()> {
        let section = ReportSection::new(title, self.report.format(), body);
        self.report.append(section)
    }

    fn header(&mut self, title: &str, target: Option<&Target>) -> ReconResult<()> {
        let mut body = LookupResult::ok(Vec::new());
        if let Some(t) = target {
            body.push_field("Kind", t.kind());
            body.push_field("Target", t.to_string());
        }
        body.push_field("Started (UTC)", iso8601(OffsetDateTime::now_utc()));
        let artifact = self
            .report
            .artifact_path()
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        body.push_field("Report", artifact);
        self.emit(title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconError;
    use crate::format::OutputFormat;
    use crate::lookup::Entry;
    use crate::report::{MemorySink, ReportWriter};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Canned(LookupResult);

    #[async_trait]
    impl LookupProvider for Canned {
        async fn query(&self, _target: &Target) -> LookupResult { self.0.clone() }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl LookupProvider for Recorder {
        async fn query(&self, target: &Target) -> LookupResult {
            self.0.lock().unwrap().push(target.to_string());
            LookupResult::fields([(target.to_string(), format!("host-{}.example.net", target))])
        }
    }

    struct Stalls;

    #[async_trait]
    impl LookupProvider for Stalls {
        async fn query(&self, _target: &Target) -> LookupResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            LookupResult::lines(["too late"])
        }
    }

    struct NoPtr;

    #[async_trait]
    impl LookupProvider for NoPtr {
        async fn query(&self, target: &Target) -> LookupResult {
            LookupResult::fields([(target.to_string(), String::new())])
        }
    }

    fn canned(r: LookupResult) -> Box<dyn LookupProvider> { Box::new(Canned(r)) }

    fn providers(reverse: Recorder, tls: Recorder) -> Providers {
        Providers {
            dns: canned(LookupResult::fields([("A", "192.0.2.10"), ("MX", "10 mx.example.com"), ("A", "192.0.2.11")])),
            reverse_dns: Box::new(reverse),
            whois: canned(LookupResult::failed("connection reset by peer")),
            rdap: canned(LookupResult::lines(["{", "  \"ldhName\": \"example.com\"", "}"])),
            cert_transparency: canned(LookupResult::lines(["a.example.com", "b.example.com"])),
            web_archive: canned(LookupResult::lines(["20200101000000\thttp://example.com/"])),
            geo: canned(LookupResult::fields([("country", "Nowhere")])),
            http_headers: canned(LookupResult::lines(["HTTP/1.1 200 OK", "strict-transport-security: max-age=1"])),
            tls: Box::new(tls),
            page: canned(LookupResult::fields([("status", "200")])),
            fingerprint: canned(LookupResult::skipped("whatweb not installed")),
            file_identity: canned(LookupResult::fields([("size", "3")])),
            file_metadata: canned(LookupResult::lines(["abc"])),
        }
    }

    fn session(format: OutputFormat) -> (Session, MemorySink) {
        let sink = MemorySink::default();
        let writer = ReportWriter::new(Box::new(sink.clone()), Box::new(MemorySink::default()));
        let report = Report::with_writer(format, OffsetDateTime::UNIX_EPOCH, writer);
        (Session::new(report, providers(Recorder::default(), Recorder::default())), sink)
    }

    const DOMAIN_TITLES: [&str; 13] = [
        "Domain Recon",
        "DNS Records",
        "WHOIS",
        "RDAP",
        "Certificate Transparency",
        "Wayback Snapshots",
        "Reverse DNS",
        "HTTP/TLS Recon",
        "HTTP Headers",
        "Security Header Audit",
        "TLS Certificate",
        "Page Summary",
        "Technology Fingerprint",
    ];

    #[tokio::test]
    async fn whois_failure_does_not_stop_the_domain_run() {
        let (mut s, _) = session(OutputFormat::Text);
        s.domain("example.com").await.unwrap();
        assert_eq!(s.report().section_titles(), DOMAIN_TITLES.to_vec());
        let sections = s.report().sections();
        assert!(sections[1].body().success && !sections[1].body().entries.is_empty());
        assert!(!sections[2].body().success);
        assert!(sections[3].body().success);
    }

    #[tokio::test]
    async fn reverse_dns_follows_every_a_record_in_order() {
        let reverse = Recorder::default();
        let sink = MemorySink::default();
        let writer = ReportWriter::new(Box::new(sink.clone()), Box::new(MemorySink::default()));
        let report = Report::with_writer(OutputFormat::Text, OffsetDateTime::UNIX_EPOCH, writer);
        let mut s = Session::new(report, providers(reverse.clone(), Recorder::default()));
        s.domain("example.com").await.unwrap();
        assert_eq!(*reverse.0.lock().unwrap(), vec!["192.0.2.10", "192.0.2.11"]);
        let rdns = &s.report().sections()[6];
        assert_eq!(rdns.body().entries.len(), 2);
    }

    #[tokio::test]
    async fn domain_chains_https_subrun() {
        let (mut s, _) = session(OutputFormat::Text);
        s.domain("example.com").await.unwrap();
        let sub = &s.report().sections()[7];
        assert!(sub.body().entries.contains(&Entry::Field { key: "Target".into(), value: "https://example.com/".into() }));
        let audit = s.report().sections()[9].body().render_lines();
        assert_eq!(audit[0], "[PASS] Strict-Transport-Security");
    }

    #[tokio::test]
    async fn invalid_domain_writes_nothing() {
        let (mut s, sink) = session(OutputFormat::Text);
        let err = s.domain("ex ample.com").await.unwrap_err();
        assert!(matches!(err, ReconError::InvalidTarget { .. }));
        assert_eq!(err.exit_code(), 1);
        assert!(s.report().sections().is_empty());
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn missing_file_writes_nothing() {
        let (mut s, sink) = session(OutputFormat::Text);
        let err = s.file(Path::new("/no/such/file.jpg")).await.unwrap_err();
        assert!(matches!(err, ReconError::MissingFile(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(s.report().sections().is_empty());
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn ip_run_order() {
        let (mut s, _) = session(OutputFormat::Text);
        s.ip("192.0.2.1").await.unwrap();
        assert_eq!(s.report().section_titles(), vec!["IP Recon", "WHOIS", "Geo/ASN", "Reverse DNS"]);
    }

    #[tokio::test]
    async fn non_web_scheme_skips_tls() {
        let tls = Recorder::default();
        let writer = ReportWriter::new(Box::new(MemorySink::default()), Box::new(MemorySink::default()));
        let report = Report::with_writer(OutputFormat::Text, OffsetDateTime::UNIX_EPOCH, writer);
        let mut s = Session::new(report, providers(Recorder::default(), tls.clone()));
        s.http("ftp://example.com/").await.unwrap();
        assert!(tls.0.lock().unwrap().is_empty());
        let section = &s.report().sections()[3];
        assert_eq!(section.title(), "TLS Certificate");
        assert!(section.body().success);
        assert!(section.body().render_lines()[0].contains("skipped"));
    }

    #[tokio::test]
    async fn http_scheme_still_gets_tls() {
        let tls = Recorder::default();
        let writer = ReportWriter::new(Box::new(MemorySink::default()), Box::new(MemorySink::default()));
        let report = Report::with_writer(OutputFormat::Text, OffsetDateTime::UNIX_EPOCH, writer);
        let mut s = Session::new(report, providers(Recorder::default(), tls.clone()));
        s.http("http://example.com:8443/").await.unwrap();
        assert_eq!(tls.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stalled_provider_is_reported_as_timeout() {
        let (s, _) = session(OutputFormat::Text);
        let mut s = s.with_deadline(Duration::from_millis(50));
        s.providers.geo = Box::new(Stalls);
        s.ip("192.0.2.1").await.unwrap();
        let geo = &s.report().sections()[2];
        assert!(!geo.body().success);
        assert!(geo.body().error.as_deref().unwrap().contains("timed out"));
        assert_eq!(s.report().sections().len(), 4);
    }

    #[tokio::test]
    async fn markdown_and_text_carry_the_same_content() {
        let (mut text, text_out) = session(OutputFormat::Text);
        let (mut md, md_out) = session(OutputFormat::Markdown);
        text.domain("example.com").await.unwrap();
        md.domain("example.com").await.unwrap();
        assert_eq!(text.report().section_titles(), md.report().section_titles());

        // start time is the only field allowed to differ between two runs
        let body = |s: &Session| -> Vec<Vec<String>> {
            s.report()
                .sections()
                .iter()
                .map(|sec| {
                    sec.body()
                        .entries
                        .iter()
                        .filter(|e| !matches!(e, Entry::Field { key, .. } if key == "Started (UTC)"))
                        .map(Entry::render)
                        .collect()
                })
                .collect()
        };
        assert_eq!(body(&text), body(&md));

        let md_text = md_out.contents();
        let plain = text_out.contents();
        assert!(md_text.contains("## WHOIS\n") && !md_text.contains(&"=".repeat(80)));
        assert!(plain.contains(&"=".repeat(80)) && !plain.contains("## "));
    }

    #[tokio::test]
    async fn run_header_names_the_artifact_without_extension() {
        let (mut s, _) = session(OutputFormat::Markdown);
        s.ip("192.0.2.1").await.unwrap();
        let header = s.report().sections()[0].body();
        assert_eq!(header.values_for("Report").collect::<Vec<_>>(), vec!["osint_report_19700101_000000"]);
        assert_eq!(header.values_for("Kind").collect::<Vec<_>>(), vec!["ip"]);
    }

    #[tokio::test]
    async fn missing_ptr_keeps_the_domain_run_going() {
        let (mut s, _) = session(OutputFormat::Text);
        s.providers.reverse_dns = Box::new(NoPtr);
        s.domain("example.com").await.unwrap();
        assert_eq!(s.report().section_titles(), DOMAIN_TITLES.to_vec());
        let rdns = s.report().sections()[6].body();
        assert!(rdns.success);
        assert_eq!(rdns.render_lines(), vec!["192.0.2.10:", "192.0.2.11:"]);
    }

    #[test]
    fn checklist_is_static() {
        let (mut s, sink) = session(OutputFormat::Markdown);
        s.checklist().unwrap();
        assert_eq!(s.report().section_titles(), vec!["OSINT Checklist", "Manual Checklist"]);
        assert!(sink.contents().contains("certificate-transparency"));
    }
}
