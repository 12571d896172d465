use thiserror::Error;

/// Hard failures are confined to input acquisition; malformed SQL never
/// errors, it becomes diagnostics beside the repaired text.
#[derive(Debug, Error)]
pub enum MendError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl MendError {
    /// Exit code for the CLI: read/decode failures are usage-level errors.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

pub type MendResult<T> = Result<T, MendError>;
