// Common test utilities: a scripted stand-in for the analysis server and
// helpers for laying out its state directory.

#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use analysisd::config::{ClientConfig, socket_name};
use analysisd::server::{ServerRequest, ServerResponse};
use analysisd::subscriber::Subscriber;
use interprocess::local_socket::{ListenerOptions, traits::ListenerExt};
use tempfile::TempDir;

/// How the fake server reacts to a stop request
pub enum Behavior {
    /// Kill and reap the given "server" process, then acknowledge
    Cooperative(Child),
    /// Accept the request and never answer
    Wedged,
    /// Answer with an error
    Refusing,
}

/// Listens on the configured socket and records every request it receives
pub struct FakeServer {
    pub requests: Arc<Mutex<Vec<ServerRequest>>>,
}

impl FakeServer {
    pub fn start(config: &ClientConfig, behavior: Behavior) -> Self {
        fs::create_dir_all(config.server_directory()).expect("Failed to create server dir");

        let name = socket_name(&config.socket_path()).expect("Invalid socket name");
        let listener = ListenerOptions::new()
            .name(name)
            .create_sync()
            .expect("Failed to bind fake server");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        thread::spawn(move || {
            let mut behavior = behavior;
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };

                let mut line = String::new();
                let read = BufReader::new(&mut stream).read_line(&mut line);
                // Empty connections are liveness checks
                if !matches!(read, Ok(n) if n > 0) || line.trim().is_empty() {
                    continue;
                }

                let request: ServerRequest =
                    serde_json::from_str(line.trim()).expect("Malformed request");
                recorded.lock().unwrap().push(request);

                let response = match &mut behavior {
                    Behavior::Cooperative(child) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        ServerResponse::Success("Server shutting down".to_string())
                    }
                    Behavior::Wedged => {
                        thread::sleep(Duration::from_secs(30));
                        continue;
                    }
                    Behavior::Refusing => ServerResponse::Error("busy".to_string()),
                };

                let json = serde_json::to_string(&response).unwrap();
                let _ = stream.write_all(json.as_bytes());
                let _ = stream.write_all(b"\n");
                let _ = stream.flush();

                if matches!(behavior, Behavior::Cooperative(_)) {
                    break;
                }
            }
        });

        Self { requests }
    }

    pub fn requests(&self) -> Vec<ServerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// A log directory in a fresh temp dir
pub fn temp_config(debug: bool, rpc_timeout: Duration) -> (TempDir, ClientConfig) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = ClientConfig::new(temp_dir.path().join(".analysisd"), debug, rpc_timeout)
        .expect("Invalid config");
    (temp_dir, config)
}

/// Start a long-running process to stand in for the server or a watcher
pub fn spawn_sleeper() -> Child {
    Command::new("sleep")
        .arg("60")
        .spawn()
        .expect("Failed to spawn sleep")
}

pub fn write_pid(path: &Path, pid: u32) {
    fs::create_dir_all(path.parent().unwrap()).expect("Failed to create pid dir");
    fs::write(path, pid.to_string()).expect("Failed to write pid file");
}

/// Spawn both watchers and record their pids where the client looks for them
pub fn spawn_watchers(config: &ClientConfig) -> Vec<(PathBuf, Child)> {
    Subscriber::watchers(&config.log_directory)
        .into_iter()
        .map(|subscriber| {
            let child = spawn_sleeper();
            write_pid(&subscriber.pid_path(), child.id());
            (subscriber.pid_path(), child)
        })
        .collect()
}

/// The signal that ended a child, after reaping it
#[cfg(unix)]
pub fn terminating_signal(child: &mut Child) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    child.wait().expect("Failed to reap child").signal()
}
