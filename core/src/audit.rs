use crate::lookup::LookupResult;

pub const SECURITY_HEADERS: [&str; 5] = [
    "Strict-Transport-Security",
    "Content-Security-Policy",
    "X-Frame-Options",
    "X-Content-Type-Options",
    "Referrer-Policy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCheck {
    pub header: &'static str,
    pub present: bool,
}

/// Case-insensitive substring match of each checklist header against the raw
/// header block.
pub fn audit_security_headers(raw: &str) -> Vec<HeaderCheck> {
    let block = raw.to_ascii_lowercase();
    SECURITY_HEADERS
        .iter()
        .map(|&header| HeaderCheck { header, present: block.contains(&header.to_ascii_lowercase()) })
        .collect()
}

pub fn audit_result(raw: &str) -> LookupResult {
    LookupResult::lines(audit_security_headers(raw).into_iter().map(|c| {
        if c.present { format!("[PASS] {}", c.header) } else { format!("[FAIL] {} (missing)", c.header) }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_header_counts_as_present() {
        let checks = audit_security_headers("HTTP/2 200\nstrict-transport-security: max-age=1\n");
        assert!(checks.iter().find(|c| c.header == "Strict-Transport-Security").unwrap().present);
        assert_eq!(checks.iter().filter(|c| c.present).count(), 1);
    }

    #[test]
    fn order_of_headers_does_not_matter() {
        let a = audit_security_headers("X-Frame-Options: DENY\nReferrer-Policy: no-referrer\n");
        let b = audit_security_headers("referrer-policy: no-referrer\nx-frame-options: deny\n");
        assert_eq!(a, b);
    }

    #[test]
    fn one_line_per_checklist_entry() {
        let r = audit_result("");
        assert_eq!(r.entries.len(), SECURITY_HEADERS.len());
        assert!(r.render_lines().iter().all(|l| l.starts_with("[FAIL]")));
    }
}
