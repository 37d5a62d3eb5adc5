//! Runs recipes and atomically publishes their outputs.
//!
//! A recipe may produce its artifact either on stdout or by writing the file
//! named by its third argument, never both.  Whatever it wrote is fsynced
//! and renamed over the target in one step, so a partially-written artifact
//! is never observable under the final name.

use crate::error::{Error, Result};
use crate::lock::{self, Lock};
use crate::node::{self, Node};
use crate::prereqs;
use crate::session::{Session, PARENT_ENV};
use crate::trace;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

/// Run `node`'s recipe under its lock.  Skips silently when the target was
/// already built this session or another builder holds the lock.
pub fn build(node: &Node, session: &Session) -> Result<()> {
    let _guard = match lock::acquire(node, session)? {
        Lock::Done => return Ok(()),
        Lock::Held(guard) => guard,
    };
    run_recipe(node, session)
}

fn run_recipe(node: &Node, session: &Session) -> Result<()> {
    eprintln!("redo {}", node.path());
    let start = Instant::now();

    let do_script = node
        .do_script
        .as_deref()
        .expect("recipe runner needs a resolved do script");
    let do_node = node::resolve(&format!("{}{}", node.dir, do_script))?;

    // The record always opens with the recipe itself, so editing the recipe
    // invalidates the target; a default recipe additionally arms the record
    // against a target-specific recipe appearing later.
    let mut record = prereqs::Writer::create(&node.prereqs_path())?;
    record.ifchange(do_script, &do_node.hash()?)?;
    if node.uses_default_do {
        record.ifcreate(&format!("{}.do", node.file))?;
    }

    let parent = std::path::absolute(node.path()).map_err(|err| Error::io(node.path(), err))?;

    let stdout_path = node.stdout_sink_path();
    let arg3_path = node.arg3_path();
    let sink = File::create(&stdout_path).map_err(|err| Error::io(&stdout_path, err))?;
    let _cleanup = Sinks {
        stdout: &stdout_path,
        arg3: &arg3_path,
    };

    let mut cmd = Command::new(format!("./{}", do_script));
    cmd.arg(&node.file)
        .arg(node.stem())
        .arg(node.arg3_name())
        .stdout(sink.try_clone().map_err(|err| Error::io(&stdout_path, err))?)
        .env(PARENT_ENV, &parent);
    if !node.dir.is_empty() {
        cmd.current_dir(&node.dir);
    }
    let mut child = cmd
        .spawn()
        .map_err(|err| Error::io(format!("{}{}", node.dir, do_script), err))?;

    session.track_child(child.id());
    let status = child.wait();
    session.untrack_child(child.id());
    let status = status.map_err(|err| Error::io(node.path(), err))?;
    if !status.success() {
        return Err(Error::RecipeFailed {
            target: node.path(),
            reason: describe_status(status),
        });
    }

    publish(node, &sink, &stdout_path, &arg3_path)?;
    trace::write_complete(&node.path(), start, Instant::now());
    Ok(())
}

/// Commit the recipe's output under the target name.
fn publish(node: &Node, sink: &File, stdout_path: &str, arg3_path: &str) -> Result<()> {
    let stdout_len = std::fs::metadata(stdout_path)
        .map_err(|err| Error::io(stdout_path, err))?
        .len();
    let arg3_written = match std::fs::symlink_metadata(arg3_path) {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => return Err(Error::io(arg3_path, err)),
    };

    if arg3_written && stdout_len > 0 {
        return Err(Error::DoubleWrite(node.path()));
    }
    if stdout_len > 0 {
        sink.sync_all().map_err(|err| Error::io(stdout_path, err))?;
        std::fs::rename(stdout_path, node.path()).map_err(|err| Error::io(node.path(), err))?;
    } else if arg3_written {
        if node.exists && node.is_dir {
            std::fs::remove_dir_all(node.path()).map_err(|err| Error::io(node.path(), err))?;
        }
        sync_tree(Path::new(arg3_path))?;
        std::fs::rename(arg3_path, node.path()).map_err(|err| Error::io(node.path(), err))?;
    }
    // Neither written: the recipe built nothing; any existing artifact stays.
    Ok(())
}

/// Flush `path` and everything under it to stable storage before the rename
/// makes it visible.
fn sync_tree(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|err| Error::io(path, err))?;
    if meta.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|err| Error::io(path, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| Error::io(path, err))?;
            sync_tree(&entry.path())?;
        }
    } else if meta.is_file() {
        File::open(path)
            .and_then(|f| f.sync_all())
            .map_err(|err| Error::io(path, err))?;
    }
    Ok(())
}

#[cfg(unix)]
fn describe_status(status: std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    if let Some(sig) = status.signal() {
        return match sig {
            libc::SIGINT => "interrupted".to_string(),
            _ => format!("killed by signal {}", sig),
        };
    }
    match status.code() {
        Some(code) => format!("exited with status {}", code),
        None => status.to_string(),
    }
}

#[cfg(not(unix))]
fn describe_status(status: std::process::ExitStatus) -> String {
    status.to_string()
}

/// Scoped cleanup for the transient output files; after a successful
/// publish the renamed one is already gone.
struct Sinks<'a> {
    stdout: &'a str,
    arg3: &'a str,
}

impl Drop for Sinks<'_> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.stdout);
        if let Ok(meta) = std::fs::symlink_metadata(self.arg3) {
            if meta.is_dir() {
                let _ = std::fs::remove_dir_all(self.arg3);
            } else {
                let _ = std::fs::remove_file(self.arg3);
            }
        }
    }
}
