use thiserror::Error;

/// Failure taxonomy shared by the fetch, normalize and ledger stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidDateFormat,
    NoDataInWindow,
    Transport,
    Parse,
    UnknownRegion,
    WriteFailure,
    Config,
}

impl ErrorKind {
    /// Stable upper-case label used in logs and status payloads.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::InvalidDateFormat => "INVALID_DATE_FORMAT",
            ErrorKind::NoDataInWindow => "NO_DATA_IN_WINDOW",
            ErrorKind::Transport => "TRANSPORT_ERROR",
            ErrorKind::Parse => "PARSE_ERROR",
            ErrorKind::UnknownRegion => "UNKNOWN_REGION",
            ErrorKind::WriteFailure => "WRITE_FAILURE",
            ErrorKind::Config => "CONFIG",
        }
    }

    /// Process exit code for run-fatal errors.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidDateFormat | ErrorKind::Config => 2,
            ErrorKind::Parse => 3,
            ErrorKind::Transport | ErrorKind::NoDataInWindow => 4,
            ErrorKind::UnknownRegion => 5,
            ErrorKind::WriteFailure => 6,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}
