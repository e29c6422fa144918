use interprocess::local_socket::{Name, Stream, traits::Stream as StreamTrait};
use std::io::{self, BufRead, BufReader, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{ServerRequest, ServerResponse};

/// Transport-level failure of a request; the server may or may not have seen it
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect to server: {0}")]
    Connect(#[source] std::io::Error),
    #[error("i/o error talking to server: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("server closed connection without sending response")]
    Closed,
    #[error("server rejected '{command}': {message}")]
    Rejected { command: String, message: String },
    #[error("no response from server within {0:?}")]
    Timeout(Duration),
}

/// Request/response access to the running server
pub trait RpcChannel: Send + Sync {
    fn send(&self, request: &ServerRequest) -> Result<ServerResponse, ChannelError>;
}

/// Newline-delimited JSON over the server's local socket
pub struct SocketChannel {
    name: Name<'static>,
    timeout: Duration,
}

impl SocketChannel {
    pub fn new(name: Name<'static>, timeout: Duration) -> Self {
        Self { name, timeout }
    }

    fn exchange(
        name: Name<'static>,
        request_json: String,
        timeout: Duration,
    ) -> Result<String, ChannelError> {
        let mut stream = Stream::connect(name).map_err(ChannelError::Connect)?;

        // Bounds the exchange itself, so an abandoned worker still exits
        if let Err(e) = stream
            .set_recv_timeout(Some(timeout))
            .and_then(|()| stream.set_send_timeout(Some(timeout)))
        {
            debug!("Socket timeouts unavailable, relying on caller deadline: {}", e);
        }

        let io_error = |e: io::Error| match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ChannelError::Timeout(timeout),
            _ => ChannelError::Io(e),
        };

        stream.write_all(request_json.as_bytes()).map_err(io_error)?;
        stream.write_all(b"\n").map_err(io_error)?;
        stream.flush().map_err(io_error)?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        match reader.read_line(&mut response_line).map_err(io_error)? {
            0 => Err(ChannelError::Closed),
            _ if response_line.trim().is_empty() => Err(ChannelError::Closed),
            _ => Ok(response_line),
        }
    }
}

impl RpcChannel for SocketChannel {
    fn send(&self, request: &ServerRequest) -> Result<ServerResponse, ChannelError> {
        let request_json = serde_json::to_string(request)?;
        debug!("Sending request: {}", request_json);

        // The exchange runs on its own thread so a wedged server cannot block
        // the caller past the timeout. A late reply is simply dropped.
        let (tx, rx) = mpsc::channel();
        let name = self.name.clone();
        let timeout = self.timeout;
        thread::spawn(move || {
            let _ = tx.send(Self::exchange(name, request_json, timeout));
        });

        let response_line = match rx.recv_timeout(self.timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(ChannelError::Timeout(self.timeout));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Err(ChannelError::Closed),
        };

        let response: ServerResponse = serde_json::from_str(response_line.trim())?;
        debug!("Received response: {:?}", response);

        match response {
            ServerResponse::Error(message) => Err(ChannelError::Rejected {
                command: request.command.clone(),
                message,
            }),
            response => Ok(response),
        }
    }
}
