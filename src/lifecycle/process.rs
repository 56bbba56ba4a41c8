//! Spawned daemon process handling.
//!
//! # Responsibilities
//! - Launch the daemon executable with its config, datadir and network flag
//! - Publish the exit status once the child terminates
//! - Interrupt the child and wait a bounded time for it to exit
//! - Shut down a stale daemon left behind by a previous run (pid file)
//!
//! # Design Decisions
//! - The child is reaped by a dedicated task; everyone else observes the
//!   exit through a watch channel, so stop and respawn never race on `wait`
//! - Signals go through `libc::kill` so a stale pid from a file can be
//!   addressed the same way as our own child

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::{Network, SpawnConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::lifecycle::shutdown::Shutdown;

/// How the daemon terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Code(i32),
    /// Terminated by a signal without an exit code.
    Signal,
}

/// Command line for the daemon: `--conf=<file> --datadir=<dir> [--testnet|--regtest]`.
pub fn daemon_args(spawn: &SpawnConfig, network: Network) -> Vec<String> {
    let mut args = vec![
        format!("--conf={}", spawn.conf_file().display()),
        format!("--datadir={}", spawn.datadir.display()),
    ];
    if let Some(flag) = network.daemon_flag() {
        args.push(flag.to_string());
    }
    args
}

/// A running (or exited) daemon child.
#[derive(Debug)]
pub struct DaemonProcess {
    pid: u32,
    exit: watch::Receiver<Option<ProcessExit>>,
}

impl DaemonProcess {
    /// Start `exec` with `args`, inheriting stdout and stderr.
    pub fn spawn(exec: &Path, args: &[String]) -> ServiceResult<Self> {
        let mut child = tokio::process::Command::new(exec)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                ServiceError::Process(format!("failed to spawn {}: {}", exec.display(), e))
            })?;
        let pid = child
            .id()
            .ok_or_else(|| ServiceError::Process("spawned daemon has no pid".to_string()))?;

        let (tx, exit) = watch::channel(None);
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => match status.code() {
                    Some(code) => ProcessExit::Code(code),
                    None => ProcessExit::Signal,
                },
                Err(e) => {
                    tracing::error!(pid, error = %e, "Failed to wait for daemon process");
                    ProcessExit::Code(-1)
                }
            };
            tracing::info!(pid, exit = ?status, "Daemon process exited");
            let _ = tx.send(Some(status));
        });

        tracing::info!(pid, exec = %exec.display(), "Spawned daemon process");
        Ok(Self { pid, exit })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status, if the process has already terminated.
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit.borrow()
    }

    /// Resolve once the process has terminated.
    pub async fn exited(&self) -> ProcessExit {
        let mut rx = self.exit.clone();
        let status = match rx.wait_for(Option::is_some).await {
            Ok(status) => *status,
            // Reaper dropped without reporting; the child is gone either way.
            Err(_) => None,
        };
        status.unwrap_or(ProcessExit::Code(-1))
    }

    /// Send SIGINT and wait up to `timeout` for a clean exit.
    ///
    /// A non-zero exit code becomes [`ServiceError::ExitStatus`]; running out
    /// of time becomes [`ServiceError::Timeout`].
    pub async fn stop(&self, timeout: Duration) -> ServiceResult<()> {
        if self.exit_status().is_none() {
            interrupt(self.pid)?;
        }
        match tokio::time::timeout(timeout, self.exited()).await {
            Ok(ProcessExit::Code(0)) | Ok(ProcessExit::Signal) => Ok(()),
            Ok(ProcessExit::Code(code)) => Err(ServiceError::ExitStatus(code)),
            Err(_) => Err(ServiceError::Timeout(format!(
                "alterdotd process {} did not exit within {:?}",
                self.pid, timeout
            ))),
        }
    }
}

/// Outcome of signalling a pid.
#[derive(Debug, PartialEq, Eq)]
enum Signalled {
    Delivered,
    NoSuchProcess,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> ServiceResult<Signalled> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| ServiceError::Process(format!("pid {} out of range", pid)))?;
    // SAFETY: kill(2) only reads its integer arguments.
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 {
        return Ok(Signalled::Delivered);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(Signalled::NoSuchProcess)
    } else {
        Err(ServiceError::Process(format!("failed to signal pid {}: {}", pid, err)))
    }
}

#[cfg(unix)]
fn send_sigint(pid: u32) -> ServiceResult<Signalled> {
    send_signal(pid, libc::SIGINT)
}

/// Signal 0 probes for existence without delivering anything.
#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    !matches!(send_signal(pid, 0), Ok(Signalled::NoSuchProcess))
}

#[cfg(not(unix))]
fn send_sigint(pid: u32) -> ServiceResult<Signalled> {
    Err(ServiceError::Process(format!(
        "cannot interrupt pid {} on this platform",
        pid
    )))
}

#[cfg(not(unix))]
fn is_alive(_pid: u32) -> bool {
    true
}

fn interrupt(pid: u32) -> ServiceResult<()> {
    match send_sigint(pid)? {
        Signalled::Delivered => Ok(()),
        Signalled::NoSuchProcess => {
            tracing::warn!(pid, "Daemon process already gone when interrupted");
            Ok(())
        }
    }
}

/// Parse a pid file. Zero and our own pid would make `kill` hit this
/// process, so they count as malformed.
fn parse_pid(contents: &str) -> Option<u32> {
    let pid: u32 = contents.trim().parse().ok()?;
    (pid != 0 && pid != std::process::id()).then_some(pid)
}

/// Ask a daemon left over from a previous run to exit, then wait until it
/// removes its pid file or is gone.
///
/// A missing, empty or malformed pid file is not an error, and neither is a
/// pid that no longer exists. The wait ends with [`ServiceError::Stopping`]
/// once `shutdown` fires.
pub async fn stop_stale(pid_file: &Path, poll: Duration, shutdown: &Shutdown) -> ServiceResult<()> {
    let contents = match tokio::fs::read_to_string(pid_file).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let Some(pid) = parse_pid(&contents) else {
        tracing::debug!(path = %pid_file.display(), "Ignoring unreadable pid file");
        return Ok(());
    };

    tracing::warn!(pid, path = %pid_file.display(), "Stopping existing alterdotd process");
    if send_sigint(pid)? == Signalled::NoSuchProcess {
        tracing::warn!(pid, "Unclean alterdotd process shutdown, process not found");
        return Ok(());
    }

    wait_for_exit(pid, pid_file.to_path_buf(), poll, shutdown).await
}

async fn wait_for_exit(
    pid: u32,
    path: PathBuf,
    poll: Duration,
    shutdown: &Shutdown,
) -> ServiceResult<()> {
    loop {
        if shutdown.is_stopping() {
            return Err(ServiceError::Stopping(
                "Stopping while waiting for existing alterdotd to exit".to_string(),
            ));
        }
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        if !is_alive(pid) {
            tracing::warn!(pid, path = %path.display(), "alterdotd exited without removing its pid file");
            return Ok(());
        }
        tracing::info!(path = %path.display(), "Waiting for alterdotd process to exit");
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = shutdown.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_args() {
        let spawn = SpawnConfig {
            datadir: PathBuf::from("testdir"),
            exec: PathBuf::from("testexec"),
            conf_path: Some(PathBuf::from("testdir/alterdot.conf")),
            rpc_timeout_secs: 30,
        };
        assert_eq!(
            daemon_args(&spawn, Network::Testnet),
            vec!["--conf=testdir/alterdot.conf", "--datadir=testdir", "--testnet"]
        );
        assert_eq!(daemon_args(&spawn, Network::Livenet).len(), 2);
    }

    #[tokio::test]
    async fn test_stop_stale_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        stop_stale(&dir.path().join("alterdotd.pid"), Duration::from_millis(1), &Shutdown::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_stale_with_unparsable_pid() {
        let dir = tempfile::tempdir().unwrap();
        for contents in ["", "     "] {
            let path = dir.path().join("alterdotd.pid");
            std::fs::write(&path, contents).unwrap();
            stop_stale(&path, Duration::from_millis(1), &Shutdown::new()).await.unwrap();
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_stale_with_dead_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alterdotd.pid");
        // Above the default pid_max, never a live process.
        std::fs::write(&path, "4194304").unwrap();
        tokio::time::timeout(Duration::from_secs(2), stop_stale(&path, Duration::from_millis(1), &Shutdown::new()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_stale_ignores_pids_that_would_hit_this_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alterdotd.pid");
        for contents in ["0".to_string(), std::process::id().to_string()] {
            std::fs::write(&path, &contents).unwrap();
            tokio::time::timeout(
                Duration::from_secs(1),
                stop_stale(&path, Duration::from_millis(1), &Shutdown::new()),
            )
            .await
            .unwrap()
            .unwrap();
        }
        assert_eq!(parse_pid(" 42\n"), Some(42));
        assert_eq!(parse_pid("0"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_stale_wait_is_cancelled_by_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alterdotd.pid");
        let mut child = std::process::Command::new("/bin/sh")
            .args(["-c", "trap '' INT; while true; do sleep 0.05; done"])
            .spawn()
            .unwrap();
        std::fs::write(&path, child.id().to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let shutdown = std::sync::Arc::new(Shutdown::new());
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.trigger();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            stop_stale(&path, Duration::from_millis(20), &shutdown),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(ServiceError::Stopping(_))));

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_stale_ends_when_process_is_gone_but_file_remains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alterdotd.pid");
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(&path, child.id().to_string()).unwrap();
        let reaper = std::thread::spawn(move || child.wait());

        tokio::time::timeout(
            Duration::from_secs(2),
            stop_stale(&path, Duration::from_millis(20), &Shutdown::new()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(path.exists());
        assert!(reaper.join().unwrap().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_published() {
        let process =
            DaemonProcess::spawn(Path::new("/bin/sh"), &["-c".to_string(), "exit 3".to_string()])
                .unwrap();
        assert_eq!(process.exited().await, ProcessExit::Code(3));
        assert_eq!(process.exit_status(), Some(ProcessExit::Code(3)));
        let err = process.stop(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_interrupts_child() {
        let script = "trap 'exit 0' INT; while true; do sleep 0.05; done".to_string();
        let process = DaemonProcess::spawn(Path::new("/bin/sh"), &["-c".to_string(), script]).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        process.stop(Duration::from_secs(5)).await.unwrap();
        assert!(process.exit_status().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_times_out() {
        let script = "trap '' INT; sleep 2".to_string();
        let process = DaemonProcess::spawn(Path::new("/bin/sh"), &["-c".to_string(), script]).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = process.stop(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let err = DaemonProcess::spawn(Path::new("/nonexistent/alterdotd"), &[]).unwrap_err();
        assert!(matches!(err, ServiceError::Process(_)));
    }
}
