use std::fmt;

use wirelink_peer::PeerError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    let code = match err {
        PeerError::Transport(_) => TRANSPORT_ERROR,
        PeerError::Wire(_) => FAILURE,
        PeerError::NotConnected => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}
