use std::fmt;

use crate::config::ConfigError;
use crate::server::ChannelError;

/// Custom error type that includes exit codes
#[derive(Debug)]
pub enum AnalysisdError {
    /// Server could not be reached (exit code 2)
    ServerUnreachable(String),
    /// Invalid log directory or socket path (exit code 3)
    InvalidConfiguration(String),
    /// Generic error (exit code 1)
    Other(anyhow::Error),
}

impl AnalysisdError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalysisdError::ServerUnreachable(_) => 2,
            AnalysisdError::InvalidConfiguration(_) => 3,
            AnalysisdError::Other(_) => 1,
        }
    }
}

impl fmt::Display for AnalysisdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisdError::ServerUnreachable(msg) => {
                write!(f, "Server unreachable: {}", msg)
            }
            AnalysisdError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            AnalysisdError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AnalysisdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisdError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AnalysisdError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(config) = err.downcast_ref::<ConfigError>() {
            AnalysisdError::InvalidConfiguration(config.to_string())
        } else if let Some(channel) = err.downcast_ref::<ChannelError>() {
            AnalysisdError::ServerUnreachable(channel.to_string())
        } else {
            AnalysisdError::Other(err)
        }
    }
}
