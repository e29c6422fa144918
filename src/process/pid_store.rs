use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::ProcessId;
use super::start_time::started_at;

/// Allowance between a process starting and it writing its own pid file
const RECORD_SLACK: Duration = Duration::from_secs(2);

/// Access to the server's recorded process id
pub trait PidStore: Send + Sync {
    /// Returns `None` when nothing usable is recorded; never fails
    fn read(&self) -> Option<ProcessId>;

    /// Forget the recorded pid (idempotent - no error if nothing is recorded)
    fn clear(&self) -> io::Result<()>;
}

/// Pid recorded as plain decimal text in a file.
///
/// A pid whose process started after the file was last written belongs to
/// some other program that was handed a recycled id, and reads as absent.
pub struct FilePidStore {
    path: PathBuf,
}

impl FilePidStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn recorded_before_start(&self, pid: ProcessId) -> bool {
        let Ok(recorded) = fs::metadata(&self.path).and_then(|meta| meta.modified()) else {
            return false;
        };
        let Some(started) = started_at(pid) else {
            return false;
        };
        started > recorded + RECORD_SLACK
    }
}

impl PidStore for FilePidStore {
    fn read(&self) -> Option<ProcessId> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No pid recorded at {}: {}", self.path.display(), e);
                return None;
            }
        };

        let Some(pid) = ProcessId::parse(&content) else {
            debug!(
                "Ignoring unparsable pid file {}: {:?}",
                self.path.display(),
                content
            );
            return None;
        };

        if self.recorded_before_start(pid) {
            warn!(
                "Process {} started after {} was written, ignoring reused pid",
                pid,
                self.path.display()
            );
            return None;
        }
        Some(pid)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed stale {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
