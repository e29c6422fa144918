//! When a process started, used to tell a recorded pid from a reused one

use std::time::SystemTime;

use super::ProcessId;

/// Wall-clock start time of a process, if the platform exposes it
#[cfg(target_os = "linux")]
pub(crate) fn started_at(pid: ProcessId) -> Option<SystemTime> {
    use nix::unistd::{SysconfVar, sysconf};
    use std::fs;
    use std::time::Duration;

    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let start_ticks = parse_start_ticks(&stat)?;
    let boot_time = parse_boot_time(&fs::read_to_string("/proc/stat").ok()?)?;
    let ticks_per_second = sysconf(SysconfVar::CLK_TCK)
        .ok()
        .flatten()
        .and_then(|ticks| u64::try_from(ticks).ok())
        .filter(|ticks| *ticks > 0)?;

    let since_boot = Duration::from_millis(start_ticks.saturating_mul(1000) / ticks_per_second);
    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(boot_time) + since_boot)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn started_at(_pid: ProcessId) -> Option<SystemTime> {
    None
}

/// Field 22 of `/proc/<pid>/stat`, in clock ticks since boot. The command name
/// may itself contain spaces and parentheses, so fields are counted from the
/// last `)`.
#[cfg(any(target_os = "linux", test))]
fn parse_start_ticks(stat: &str) -> Option<u64> {
    let (_, fields) = stat.rsplit_once(')')?;
    fields.split_whitespace().nth(19)?.parse().ok()
}

/// The `btime` line of `/proc/stat`: boot time in seconds since the epoch
#[cfg(any(target_os = "linux", test))]
fn parse_boot_time(stat: &str) -> Option<u64> {
    stat.lines()
        .find_map(|line| line.strip_prefix("btime "))?
        .trim()
        .parse()
        .ok()
}
