//! Numbered interactive loop. Every selection appends to the same report
//! until the user quits or input ends.

use recon_core::{ReconError, ReconResult, Session};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;

const MENU: &str = "\
  [1] Domain recon
  [2] IP recon
  [3] HTTP/TLS recon
  [4] File recon
  [5] OSINT checklist
  [0] Quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Domain,
    Ip,
    Http,
    File,
    Checklist,
    Quit,
}

impl Choice {
    pub fn parse(input: &str) -> Option<Choice> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "domain" => Some(Choice::Domain),
            "2" | "ip" => Some(Choice::Ip),
            "3" | "http" => Some(Choice::Http),
            "4" | "file" => Some(Choice::File),
            "5" | "checklist" => Some(Choice::Checklist),
            "0" | "q" | "quit" | "exit" => Some(Choice::Quit),
            _ => None,
        }
    }

    fn prompt(self) -> Option<&'static str> {
        match self {
            Choice::Domain => Some("domain"),
            Choice::Ip => Some("ip"),
            Choice::Http => Some("url"),
            Choice::File => Some("path"),
            Choice::Checklist | Choice::Quit => None,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> ReconResult<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> ReconResult<Option<String>> {
    write!(out, "{}> ", label)?;
    out.flush()?;
    read_line(input)
}

pub async fn run<R: BufRead, W: Write>(session: &mut Session, mut input: R, mut out: W) -> ReconResult<()> {
    loop {
        writeln!(out, "{}", MENU)?;
        let Some(line) = ask(&mut input, &mut out, "select")? else { break };
        let Some(choice) = Choice::parse(&line) else {
            writeln!(out, "[-] unknown selection '{}'", line)?;
            continue;
        };
        if choice == Choice::Quit {
            break;
        }
        let arg = match choice.prompt() {
            Some(label) => match ask(&mut input, &mut out, label)? {
                Some(a) => a,
                None => break,
            },
            None => String::new(),
        };
        let outcome = match choice {
            Choice::Domain => session.domain(&arg).await,
            Choice::Ip => session.ip(&arg).await,
            Choice::Http => session.http(&arg).await,
            Choice::File => session.file(Path::new(&arg)).await,
            Choice::Checklist => session.checklist(),
            Choice::Quit => Ok(()),
        };
        match outcome {
            Err(e @ ReconError::Io(_)) => return Err(e),
            Err(e) => writeln!(out, "[-] {}", e)?,
            Ok(()) => {}
        }
    }
    info!(artifact = %session.report().artifact_path().display(), "menu closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recon_core::{LookupProvider, LookupResult, MemorySink, OutputFormat, Providers, Report, ReportWriter, Target};
    use std::io::Cursor;
    use time::OffsetDateTime;

    struct Answer;

    #[async_trait]
    impl LookupProvider for Answer {
        async fn query(&self, _target: &Target) -> LookupResult {
            LookupResult::lines(["ok"])
        }
    }

    fn answer() -> Box<dyn LookupProvider> { Box::new(Answer) }

    fn session() -> (Session, MemorySink) {
        let sink = MemorySink::default();
        let writer = ReportWriter::new(Box::new(sink.clone()), Box::new(MemorySink::default()));
        let created = OffsetDateTime::from_unix_timestamp(1_709_967_903).unwrap();
        let report = Report::with_writer(OutputFormat::Text, created, writer);
        let providers = Providers {
            dns: answer(),
            reverse_dns: answer(),
            whois: answer(),
            rdap: answer(),
            cert_transparency: answer(),
            web_archive: answer(),
            geo: answer(),
            http_headers: answer(),
            tls: answer(),
            page: answer(),
            fingerprint: answer(),
            file_identity: answer(),
            file_metadata: answer(),
        };
        (Session::new(report, providers), sink)
    }

    #[test]
    fn choices_by_number_or_word() {
        assert_eq!(Choice::parse(" 1 "), Some(Choice::Domain));
        assert_eq!(Choice::parse("Checklist"), Some(Choice::Checklist));
        assert_eq!(Choice::parse("q"), Some(Choice::Quit));
        assert_eq!(Choice::parse("9"), None);
    }

    #[tokio::test]
    async fn one_report_across_selections() {
        let (mut s, sink) = session();
        let mut out = Vec::new();
        run(&mut s, Cursor::new("5\n2\n1.1.1.1\n0\n"), &mut out).await.unwrap();
        let titles = s.report().section_titles();
        assert!(titles.contains(&"Manual Checklist"));
        assert!(titles.contains(&"Geo/ASN"));
        assert!(sink.contents().contains("Manual Checklist"));
    }

    #[tokio::test]
    async fn bad_input_keeps_the_loop_alive() {
        let (mut s, _sink) = session();
        let mut out = Vec::new();
        run(&mut s, Cursor::new("7\n1\nex ample.com\n5\n"), &mut out).await.unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("[-] unknown selection '7'"));
        assert!(shown.contains("[-] "));
        assert!(!s.report().section_titles().contains(&"DNS Records"));
        assert!(s.report().section_titles().contains(&"Manual Checklist"));
    }
}
