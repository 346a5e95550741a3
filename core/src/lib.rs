//! Core types and orchestration for the OSINT toolbox: targets, provider
//! contract, section formatting, the append-only report and the per-kind
//! run sequences.

pub mod audit;
pub mod error;
pub mod format;
pub mod lookup;
pub mod report;
pub mod session;
pub mod target;
pub mod tool;

pub use error::{ReconError, ReconResult};
pub use format::{format_section, OutputFormat, ReportSection};
pub use lookup::{unsupported, Entry, LookupProvider, LookupResult};
pub use report::{MemorySink, Report, ReportWriter};
pub use session::{Providers, Session};
pub use target::{validate_domain, validate_ip, Target};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
