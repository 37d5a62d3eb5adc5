//! Build-session identity and cooperative cancellation.
//!
//! One logical invocation of the engine — the outermost process plus every
//! engine subprocess its recipes spawn — shares a single `TreeTime`,
//! exported through the environment.  Within one process, all concurrent
//! walkers and runners share one `Session` value: the first non-recoverable
//! error cancels the rest and interrupts any running recipes.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Absolute path of the target whose recipe is currently running; consumed
/// by `redo-ifchange` and friends to find the record to append to.
pub const PARENT_ENV: &str = "REDOPARENT";

/// Unix-seconds stamp of the outermost invocation.
pub const TREE_TIME_ENV: &str = "REDOTREETIME";

pub struct Session {
    tree_time: SystemTime,
    cancelled: AtomicBool,
    cause: Mutex<Option<Error>>,
    /// Pids of recipe processes currently running under this session.
    children: Mutex<Vec<u32>>,
}

impl Session {
    pub fn new(tree_time: SystemTime) -> Session {
        Session {
            tree_time,
            cancelled: AtomicBool::new(false),
            cause: Mutex::new(None),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Build the session from `REDOTREETIME`, or start a new tree: stamp it
    /// now and export the stamp so child engine processes join this session.
    pub fn from_env() -> Result<Session> {
        match std::env::var(TREE_TIME_ENV) {
            Ok(val) => Ok(Session::new(parse_tree_time(&val)?)),
            Err(std::env::VarError::NotPresent) => {
                let now = SystemTime::now();
                let secs = now
                    .duration_since(UNIX_EPOCH)
                    .expect("system clock before epoch")
                    .as_secs();
                std::env::set_var(TREE_TIME_ENV, secs.to_string());
                Ok(Session::new(now))
            }
            Err(std::env::VarError::NotUnicode(_)) => {
                Err(Error::BadTreeTime("<non-unicode>".to_string()))
            }
        }
    }

    pub fn tree_time(&self) -> SystemTime {
        self.tree_time
    }

    /// Cancellation checkpoint.  Converts a pending SIGINT into a
    /// cancellation, then reports the session's cause if one is set.
    pub fn check(&self) -> Result<()> {
        if was_interrupted() && !self.cancelled.load(Ordering::Relaxed) {
            self.cancel(Error::Cancelled("interrupted".to_string()));
        }
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled(self.cause_message()));
        }
        Ok(())
    }

    /// Record the first failure and fan the cancellation out: later
    /// checkpoints fail, and running recipes get an interrupt.
    pub fn cancel(&self, err: Error) {
        {
            let mut cause = self.cause.lock().unwrap();
            if cause.is_none() {
                *cause = Some(err);
            }
        }
        self.cancelled.store(true, Ordering::Relaxed);
        self.interrupt_children();
    }

    /// The first error recorded by `cancel`, if any.
    pub fn take_cause(&self) -> Option<Error> {
        self.cause.lock().unwrap().take()
    }

    fn cause_message(&self) -> String {
        match self.cause.lock().unwrap().as_ref() {
            Some(err) => err.to_string(),
            None => "cancelled".to_string(),
        }
    }

    pub fn track_child(&self, pid: u32) {
        self.children.lock().unwrap().push(pid);
    }

    pub fn untrack_child(&self, pid: u32) {
        self.children.lock().unwrap().retain(|&p| p != pid);
    }

    #[cfg(unix)]
    fn interrupt_children(&self) {
        for &pid in self.children.lock().unwrap().iter() {
            // Safety: sending a signal is libc unsafe code.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGINT);
            }
        }
    }

    #[cfg(not(unix))]
    fn interrupt_children(&self) {}
}

fn parse_tree_time(val: &str) -> Result<SystemTime> {
    let secs: u64 = val
        .parse()
        .map_err(|_| Error::BadTreeTime(val.to_string()))?;
    Ok(UNIX_EPOCH + Duration::from_secs(secs))
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn sigint_handler(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
    // SA_RESETHAND clears the handler, so a second interrupt kills us.
}

/// Let the first SIGINT cancel the session cooperatively: running recipes
/// get to fail and report before we exit.
#[cfg(unix)]
pub fn register_sigint() {
    // Safety: registering a signal handler is libc unsafe code.
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigint_handler as libc::sighandler_t;
        sa.sa_flags = libc::SA_RESETHAND;
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
pub fn register_sigint() {}

fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}
