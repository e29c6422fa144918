//! Client configuration and the well-known paths under the log directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use interprocess::local_socket::{GenericFilePath, Name, ToFsName};
use thiserror::Error;

/// Default log directory, relative to the directory the client runs in
pub const DEFAULT_LOG_DIRECTORY: &str = ".analysisd";

/// Default bound on a single request/response exchange with the server
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

const SERVER_DIRECTORY: &str = "server";
const SOCKET_FILE: &str = "server.sock";
const PID_FILE: &str = "server.pid";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("log directory must not be empty")]
    EmptyLogDirectory,
    #[error("socket path {path} cannot be used as a local socket name: {source}")]
    InvalidSocketPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings shared by every command of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory holding the server's socket, pid file and watcher state
    pub log_directory: PathBuf,
    /// Verbose diagnostics requested on the command line
    pub debug: bool,
    pub rpc_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            debug: false,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(
        log_directory: PathBuf,
        debug: bool,
        rpc_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if log_directory.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLogDirectory);
        }

        let config = Self {
            log_directory,
            debug,
            rpc_timeout,
        };
        // Fail early rather than on the first connection attempt
        config.socket_name()?;
        Ok(config)
    }

    pub fn server_directory(&self) -> PathBuf {
        self.log_directory.join(SERVER_DIRECTORY)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.server_directory().join(SOCKET_FILE)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.server_directory().join(PID_FILE)
    }

    pub fn socket_name(&self) -> Result<Name<'static>, ConfigError> {
        socket_name(&self.socket_path())
    }

    /// Flags forwarded with requests from commands other than `stop`
    pub fn flags(&self) -> Vec<String> {
        let mut flags = log_directory_flags(&self.log_directory);
        if self.debug {
            flags.push("-debug".to_string());
        }
        flags
    }
}

/// The `-log-directory <dir>` pair every request carries
pub fn log_directory_flags(log_directory: &Path) -> Vec<String> {
    vec![
        "-log-directory".to_string(),
        log_directory.display().to_string(),
    ]
}

pub fn socket_name(path: &Path) -> Result<Name<'static>, ConfigError> {
    path.to_path_buf()
        .to_fs_name::<GenericFilePath>()
        .map_err(|source| ConfigError::InvalidSocketPath {
            path: path.to_path_buf(),
            source,
        })
}
