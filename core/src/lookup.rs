//! Provider contract and the result type every provider returns.

use crate::target::Target;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Line(String),
    Field { key: String, value: String },
}

impl Entry {
    pub fn render(&self) -> String {
        match self {
            Entry::Line(l) => l.clone(),
            Entry::Field { key, value } if value.is_empty() => format!("{}:", key),
            Entry::Field { key, value } => format!("{}: {}", key, value),
        }
    }
}

/// Output of one provider call.
///
/// A partial answer (truncated, rate-limited, some sub-queries failed) is still
/// `success` and carries a `note`. Only a provider that produced nothing usable
/// sets `success = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub entries: Vec<Entry>,
    pub success: bool,
    pub error: Option<String>,
    pub note: Option<String>,
}

impl LookupResult {
    pub fn ok(entries: Vec<Entry>) -> Self {
        LookupResult { entries, success: true, error: None, note: None }
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ok(lines.into_iter().map(|l| Entry::Line(l.into())).collect())
    }

    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::ok(pairs.into_iter().map(|(k, v)| Entry::Field { key: k.into(), value: v.into() }).collect())
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        LookupResult { entries: Vec::new(), success: false, error: Some(cause.into()), note: None }
    }

    /// Optional capability absent: not an error, just a placeholder line.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::lines([format!("({})", reason.into())])
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.entries.push(Entry::Line(line.into()));
    }

    pub fn push_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Entry::Field { key: key.into(), value: value.into() });
    }

    /// Values of every field named `key`, in order.
    pub fn values_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter_map(move |e| match e {
            Entry::Field { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Body lines as they appear in the report.
    pub fn render_lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self.entries.iter().map(Entry::render).collect();
        if self.success && out.is_empty() {
            out.push("(no data)".to_string());
        }
        if let Some(err) = &self.error {
            out.push(format!("[!] lookup failed: {}", err));
        } else if !self.success {
            out.push("[!] lookup failed".to_string());
        }
        if let Some(note) = &self.note {
            out.push(format!("[i] {}", note));
        }
        out
    }
}

/// One external capability. Implementations absorb every remote failure and
/// report it through [`LookupResult::failed`]; they never panic or return early
/// with an error.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    async fn query(&self, target: &Target) -> LookupResult;
}

/// Shared refusal for a provider handed a target kind it does not serve.
pub fn unsupported(provider: &str, target: &Target) -> LookupResult {
    LookupResult::failed(format!("{} does not handle {} targets", provider, target.kind()))
}
