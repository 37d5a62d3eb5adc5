//! Per-target filesystem locks.
//!
//! `<target>.lock` is the canonical mutex for one target's build; it lives
//! exactly as long as that build.  Acquisition also detects work already
//! done this session: a `.prereqs` record written after `TreeTime` means
//! some builder in the same tree rebuilt the target already, and a lock
//! held by someone else means we just wait for their result.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::session::Session;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::time::Duration;

pub enum Lock {
    /// The target is already up to date for this session; skip the build.
    Done,
    /// We own the build; the lock file is removed when the guard drops.
    Held(Guard),
}

pub struct Guard {
    path: String,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn acquire(node: &Node, session: &Session) -> Result<Lock> {
    let lock_path = node.lock_path();

    if exists(&lock_path)? {
        wait_for(&lock_path, &node.path(), session)?;
        return Ok(Lock::Done);
    }

    match std::fs::metadata(node.prereqs_path()) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .map_err(|err| Error::io(node.prereqs_path(), err))?;
            if mtime > session.tree_time() {
                return Ok(Lock::Done);
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(Error::io(node.prereqs_path(), err)),
    }

    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&lock_path)
    {
        Ok(_) => Ok(Lock::Held(Guard { path: lock_path })),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            // Lost the creation race; the winner builds, we wait.
            wait_for(&lock_path, &node.path(), session)?;
            Ok(Lock::Done)
        }
        Err(err) => Err(Error::io(&lock_path, err)),
    }
}

/// Poll until the lock disappears, meaning its holder finished (or died and
/// left it behind, in which case we wait until someone cleans up).
fn wait_for(lock_path: &str, target: &str, session: &Session) -> Result<()> {
    loop {
        std::thread::sleep(Duration::from_secs(1));
        session.check()?;
        if !exists(lock_path)? {
            return Ok(());
        }
        eprintln!("redo: waiting for {}...", target);
    }
}

fn exists(path: &str) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(Error::io(path, err)),
    }
}
