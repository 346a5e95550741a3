use crate::lookup::LookupResult;

const RULE_WIDTH: usize = 80;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    Text,
    Markdown,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Markdown => "md",
        }
    }
}

/// A titled, formatted provider result. Fields are private so a section cannot
/// change after it has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    title: String,
    format: OutputFormat,
    body: LookupResult,
}

impl ReportSection {
    pub fn new(title: impl Into<String>, format: OutputFormat, body: LookupResult) -> Self {
        ReportSection { title: title.into(), format, body }
    }

    pub fn title(&self) -> &str { &self.title }
    pub fn format(&self) -> OutputFormat { self.format }
    pub fn body(&self) -> &LookupResult { &self.body }

    pub fn render(&self) -> String {
        format_section(&self.title, &self.body, self.format)
    }
}

/// Frame a title and pass the body lines through untouched.
pub fn format_section(title: &str, result: &LookupResult, format: OutputFormat) -> String {
    let mut out = String::new();
    match format {
        OutputFormat::Markdown => {
            out.push_str("## ");
            out.push_str(title);
            out.push_str("\n\n");
        }
        OutputFormat::Text => {
            let rule = "=".repeat(RULE_WIDTH);
            out.push_str(&rule);
            out.push('\n');
            out.push_str(title);
            out.push('\n');
            out.push_str(&rule);
            out.push('\n');
        }
    }
    for line in result.render_lines() {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frame_is_eighty_columns() {
        let s = format_section("WHOIS", &LookupResult::lines(["x"]), OutputFormat::Text);
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[1], "WHOIS");
        assert_eq!(lines[2], lines[0]);
        assert_eq!(lines[3], "x");
    }

    #[test]
    fn markdown_uses_level_two_heading() {
        let s = format_section("WHOIS", &LookupResult::lines(["x"]), OutputFormat::Markdown);
        assert!(s.starts_with("## WHOIS\n"));
        assert!(s.contains("\nx\n"));
    }

    #[test]
    fn body_is_not_escaped() {
        let body = LookupResult::lines(["*raw* | <b>"]);
        let md = format_section("T", &body, OutputFormat::Markdown);
        assert!(md.contains("*raw* | <b>"));
    }
}
