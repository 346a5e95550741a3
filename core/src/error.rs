use std::path::PathBuf;

/// Errors that stop a command. Provider failures never surface here; they are
/// folded into a failed [`LookupResult`](crate::LookupResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("invalid {kind}: {value:?}")]
    InvalidTarget { kind: &'static str, value: String },
    #[error("file not found or not a regular file: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("required capability unavailable: {0}")]
    MissingCapability(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconError {
    pub fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        ReconError::InvalidTarget { kind, value: value.into() }
    }

    /// Process exit code for this error: validation-class errors exit 1,
    /// anything internal exits 2.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconError::InvalidTarget { .. }
            | ReconError::MissingFile(_)
            | ReconError::MissingCapability(_) => 1,
            ReconError::Io(_) => 2,
        }
    }
}

pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_message_does_not_assume_the_report() {
        let e = ReconError::from(io::Error::new(io::ErrorKind::NotFound, "no cwd"));
        assert_eq!(e.to_string(), "i/o error: no cwd");
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn validation_errors_exit_one() {
        assert_eq!(ReconError::invalid("domain", "ex ample").exit_code(), 1);
        assert_eq!(ReconError::MissingCapability("dns".into()).exit_code(), 1);
    }
}
