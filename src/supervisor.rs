//! Child process supervision with license-expiry enforcement
//!
//! Two threads race to decide how a run ends: a waiter blocked on the child's
//! exit and, for bounded licenses, a one-shot [`ExpiryTimer`]. Both report into
//! one channel and only the first message is acted on.
//!
//! - child exits first: the timer is cancelled and never fires
//! - timer fires first: the child is killed; if it exited in the meantime the
//!   kill is skipped
//!
//! The child's PID sits in a [`LivePid`] slot. The waiter empties the slot
//! after the child has exited but before reaping it, and the kill is sent
//! while holding the slot, so a kill never lands on a recycled PID.

use crate::license::Remaining;
use log::{debug, error, info, trace, warn};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long to wait for the killed child to be reaped
const KILL_GRACE: Duration = Duration::from_secs(1);

/// What to run and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// How a supervised run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The child exited on its own with this code (1 if killed by a signal)
    Exited(i32),
    /// The license expired and the child was killed
    Expired,
}

/// Supervision failures
#[derive(Debug)]
pub enum SupervisorError {
    /// The child could not be started
    Spawn { executable: PathBuf, source: io::Error },
    /// A supervision thread could not be started
    Thread(io::Error),
    /// Waiting on the child failed
    Wait(io::Error),
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::Spawn { executable, source } => {
                write!(f, "failed to spawn {}: {source}", executable.display())
            }
            SupervisorError::Thread(err) => write!(f, "failed to start supervision thread: {err}"),
            SupervisorError::Wait(err) => write!(f, "failed to wait for child: {err}"),
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::Spawn { source, .. } => Some(source),
            SupervisorError::Thread(err) | SupervisorError::Wait(err) => Some(err),
        }
    }
}

enum Event {
    Exited(io::Result<ExitStatus>),
    Expired,
}

/// One-shot timer running on its own thread
///
/// Dropping or cancelling the timer before its deadline guarantees the
/// callback never runs.
#[derive(Debug)]
pub struct ExpiryTimer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryTimer {
    /// Arm a timer for a bounded license; unbounded licenses get none
    pub fn arm<F>(remaining: Remaining, on_fire: F) -> io::Result<Option<Self>>
    where
        F: FnOnce() + Send + 'static,
    {
        match remaining {
            Remaining::Unbounded => {
                debug!("⏳ Unbounded license, no expiry timer");
                Ok(None)
            }
            Remaining::Bounded(after) => Self::arm_after(after, on_fire).map(Some),
        }
    }

    /// Run `on_fire` once after `after` unless cancelled first
    pub fn arm_after<F>(after: Duration, on_fire: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("xlaunch-expiry".to_string())
            .spawn(move || match cancel_rx.recv_timeout(after) {
                Err(RecvTimeoutError::Timeout) => on_fire(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    trace!("⏳ Expiry timer cancelled");
                }
            })?;

        debug!("⏳ Expiry timer armed for {after:?}");
        Ok(ExpiryTimer {
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    /// Cancel the timer and wait for its thread to finish
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the channel wakes the timer thread
        self.cancel.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the child, hand it `payload` on stdin, and supervise it
///
/// Stdout and stderr are inherited. Blocks until the child exits or, for a
/// bounded license, until the remaining time runs out and the child is killed.
///
/// # Errors
///
/// Returns an error if the child cannot be spawned or waited on.
pub fn run(
    command: &LaunchCommand,
    payload: &[u8],
    remaining: Remaining,
) -> Result<RunOutcome, SupervisorError> {
    info!("🚀 Spawning: {:?}", command.executable);
    debug!("🚀 Args: {:?} in {:?}", command.args, command.working_dir);

    let mut child = Command::new(&command.executable)
        .args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            executable: command.executable.clone(),
            source,
        })?;

    let live_pid = Arc::new(LivePid::new(child.id()));
    let (events_tx, events_rx) = mpsc::channel::<Event>();

    let timer_tx = events_tx.clone();
    let timer = ExpiryTimer::arm(remaining, move || {
        let _ = timer_tx.send(Event::Expired);
    })
    .map_err(|e| abort_child(&mut child, SupervisorError::Thread(e)))?;

    hand_off(&mut child, payload);

    let waiter_pid = Arc::clone(&live_pid);
    let waiter_tx = events_tx;
    thread::Builder::new()
        .name("xlaunch-waiter".to_string())
        .spawn(move || {
            let status = wait_and_release(&mut child, &waiter_pid);
            let _ = waiter_tx.send(Event::Exited(status));
        })
        .map_err(|e| {
            live_pid.kill();
            SupervisorError::Thread(e)
        })?;

    // The waiter always reports, so this only ends with a message
    match events_rx.recv() {
        Ok(Event::Exited(status)) => {
            if let Some(timer) = timer {
                timer.cancel();
            }
            let status = status.map_err(SupervisorError::Wait)?;
            debug!("👶 Child exited: {status}");
            Ok(RunOutcome::Exited(status.code().unwrap_or(1)))
        }
        Ok(Event::Expired) => {
            warn!("⌛ License expired, stopping child");
            live_pid.kill();
            match events_rx.recv_timeout(KILL_GRACE) {
                Ok(_) => debug!("👶 Child reaped after kill"),
                Err(_) => warn!("⚠️ Child not reaped within {KILL_GRACE:?}"),
            }
            Ok(RunOutcome::Expired)
        }
        Err(_) => Err(SupervisorError::Wait(io::Error::other(
            "supervision channel closed",
        ))),
    }
}

/// Write the key payload and close stdin
///
/// The payload is a few hundred bytes, well under the pipe buffer, so this
/// never blocks on a child that does not read.
fn hand_off(child: &mut Child, payload: &[u8]) {
    let Some(mut stdin) = child.stdin.take() else {
        warn!("⚠️ Child has no stdin pipe, key not delivered");
        return;
    };
    match stdin.write_all(payload).and_then(|()| stdin.flush()) {
        Ok(()) => trace!("🔑 Handed {} bytes to child stdin", payload.len()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("🔑 Child closed stdin before reading the key");
        }
        Err(e) => warn!("⚠️ Failed to hand key to child: {e}"),
    }
}

fn abort_child(child: &mut Child, err: SupervisorError) -> SupervisorError {
    if let Err(e) = child.kill() {
        error!("kill process error: {e}");
    }
    let _ = child.wait();
    err
}

/// PID of a child that has not been reaped yet
#[derive(Debug)]
struct LivePid(Mutex<Option<u32>>);

impl LivePid {
    fn new(pid: u32) -> Self {
        LivePid(Mutex::new(Some(pid)))
    }

    fn lock(&self) -> MutexGuard<'_, Option<u32>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Empty the slot; must happen before the child is reaped
    fn release(&self) -> Option<u32> {
        self.lock().take()
    }

    /// Kill the child if its PID is still held
    ///
    /// The slot stays locked while the signal is sent, which holds off the
    /// reap until the kill has landed.
    fn kill(&self) {
        let slot = self.lock();
        let Some(pid) = *slot else {
            debug!("👶 Child already exited, nothing to kill");
            return;
        };
        match terminate_pid(pid) {
            Ok(()) => info!("🛑 Killed child (PID: {pid})"),
            Err(e) => error!("kill process error: {e}"),
        }
    }
}

/// Wait for the child to exit, release its PID, then reap it
#[cfg(unix)]
fn wait_and_release(child: &mut Child, live_pid: &LivePid) -> io::Result<ExitStatus> {
    match wait_without_reaping(child.id()) {
        Ok(()) => {
            live_pid.release();
            child.wait()
        }
        Err(e) => {
            warn!("⚠️ waitid failed ({e}), reaping directly");
            let status = child.wait();
            live_pid.release();
            status
        }
    }
}

/// Wait for the child to exit, then release its PID
///
/// The open process handle in `child` keeps the PID from being reused until
/// it is dropped, so the order here does not matter.
#[cfg(not(unix))]
fn wait_and_release(child: &mut Child, live_pid: &LivePid) -> io::Result<ExitStatus> {
    let status = child.wait();
    live_pid.release();
    status
}

/// Block until `pid` has exited, leaving it a zombie for a later `wait`
#[cfg(unix)]
#[allow(unsafe_code)]
fn wait_without_reaping(pid: u32) -> io::Result<()> {
    let id = libc::id_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    loop {
        // SAFETY: siginfo_t is plain old data and all-zero is a valid value
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a live, writable siginfo_t for the whole call
        let rc = unsafe { libc::waitid(libc::P_PID, id, &mut info, libc::WEXITED | libc::WNOWAIT) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn terminate_pid(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) takes plain integers and touches no memory of ours
    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate_pid(pid: u32) -> io::Result<()> {
    let status = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
