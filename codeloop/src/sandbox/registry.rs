//! Session-keyed registry of running sandbox processes.
//!
//! The sandbox owns the child handle and its lifecycle; the registry only
//! tracks pids so a concurrent caller can cancel a session's execution while
//! the sandbox is blocked waiting on it.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Grace period between SIGTERM and SIGKILL.
const CANCEL_GRACE: Duration = Duration::from_secs(2);
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct Entry {
    pid: u32,
    started_at: Instant,
}

/// Tracks at most one running process per session. Registering a new pid for
/// a session replaces the previous entry.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    inner: Mutex<HashMap<String, Entry>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: &str, pid: u32) {
        debug!(session, pid, "registering process");
        let mut map = lock(&self.inner);
        map.insert(
            session.to_string(),
            Entry {
                pid,
                started_at: Instant::now(),
            },
        );
    }

    /// Remove a session's entry without signalling. Idempotent; called on
    /// every execution path including errors and timeouts.
    pub fn unregister(&self, session: &str) {
        let mut map = lock(&self.inner);
        if map.remove(session).is_some() {
            debug!(session, "unregistered process");
        }
    }

    pub fn is_running(&self, session: &str) -> bool {
        lock(&self.inner).contains_key(session)
    }

    pub fn active_sessions(&self) -> Vec<String> {
        let mut sessions: Vec<String> = lock(&self.inner).keys().cloned().collect();
        sessions.sort();
        sessions
    }

    /// Cancel a session's running process: SIGTERM, a bounded grace period,
    /// then SIGKILL if it is still alive. Returns false only when the session
    /// has no registered process; a process that already exited counts as a
    /// successful cancellation.
    pub fn cancel(&self, session: &str) -> bool {
        let entry = {
            let mut map = lock(&self.inner);
            map.remove(session)
        };
        let Some(entry) = entry else {
            debug!(session, "cancel requested for unknown session");
            return false;
        };

        info!(
            session,
            pid = entry.pid,
            running_secs = entry.started_at.elapsed().as_secs(),
            "cancelling process"
        );

        if signal(entry.pid, libc::SIGTERM).is_err() {
            // Already gone.
            return true;
        }

        let deadline = Instant::now() + CANCEL_GRACE;
        while Instant::now() < deadline {
            if !alive(entry.pid) {
                debug!(session, pid = entry.pid, "process exited after SIGTERM");
                return true;
            }
            thread::sleep(CANCEL_POLL);
        }

        warn!(session, pid = entry.pid, "grace period elapsed, sending SIGKILL");
        let _ = signal(entry.pid, libc::SIGKILL);
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[allow(unsafe_code)]
fn signal(pid: u32, sig: i32) -> io::Result<()> {
    // SAFETY: kill(2) takes a pid and a signal number; no memory is touched.
    let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Probe liveness with signal 0. A zombie still counts as alive until the
/// sandbox reaps it, which is fine: the grace loop just runs its course.
fn alive(pid: u32) -> bool {
    signal(pid, 0).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn register_and_unregister_round_trip() {
        let registry = ProcessRegistry::new();
        assert!(!registry.is_running("s1"));

        registry.register("s1", 12345);
        assert!(registry.is_running("s1"));
        assert_eq!(registry.active_sessions(), vec!["s1".to_string()]);

        registry.unregister("s1");
        assert!(!registry.is_running("s1"));
        assert!(registry.active_sessions().is_empty());
    }

    #[test]
    fn cancel_unknown_session_returns_false() {
        let registry = ProcessRegistry::new();
        assert!(!registry.cancel("nope"));
    }

    #[test]
    fn cancel_terminates_a_live_process() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn sleep");
        let registry = ProcessRegistry::new();
        registry.register("s1", child.id());

        assert!(registry.cancel("s1"));
        assert!(!registry.is_running("s1"));

        let status = child.wait().expect("wait");
        assert!(!status.success());
    }

    #[test]
    fn cancel_of_already_exited_process_succeeds() {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let pid = child.id();
        child.wait().expect("wait");

        let registry = ProcessRegistry::new();
        registry.register("s1", pid);
        assert!(registry.cancel("s1"));
    }

    #[test]
    fn new_registration_replaces_the_previous_one() {
        let registry = ProcessRegistry::new();
        registry.register("s1", 100);
        registry.register("s1", 200);
        assert_eq!(registry.active_sessions().len(), 1);
    }
}
