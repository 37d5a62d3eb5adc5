//! Command-line entry points, multiplexed on the program name: one binary
//! behaves as `redo`, `redo-ifchange`, `redo-ifcreate`, or
//! `redo-unless-change` (alias `stop-ifchange`) depending on what it was
//! invoked as.

use crate::error::{Error, Result};
use crate::session::{self, Session, PARENT_ENV};
use crate::{build, node, prereqs, trace, walk};
use std::io::ErrorKind;
use std::path::Path;

#[derive(argh::FromArgs)]
/// redo, a file-based incremental build system
struct Opts {
    /// debugging tools
    #[argh(option, short = 'd')]
    debug: Option<String>,

    /// targets to build, or dependencies to record
    #[argh(positional)]
    paths: Vec<String>,
}

pub fn run() -> i32 {
    let prog = program_name();
    let result = run_impl(&prog);
    trace::close();
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}: {}", prog, err);
            1
        }
    }
}

fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "redo".to_string())
}

fn run_impl(prog: &str) -> Result<i32> {
    let opts: Opts = argh::from_env();

    if let Some(debug) = &opts.debug {
        match debug.as_str() {
            "list" => {
                println!("debug tools:");
                println!("  trace  generate json performance trace");
                return Ok(1);
            }
            "trace" => trace::open("trace.json").map_err(|err| Error::io("trace.json", err))?,
            _ => {
                return Err(Error::Usage(format!(
                    "unknown -d {:?}, use -d list to list",
                    debug
                )))
            }
        }
    }

    session::register_sigint();
    let session = Session::from_env()?;

    match prog {
        "redo" => redo(&opts.paths, &session)?,
        "redo-ifchange" => redo_ifchange(&opts.paths, &session)?,
        "redo-ifcreate" => redo_ifcreate(&opts.paths)?,
        "redo-unless-change" | "stop-ifchange" => redo_unless_change(&opts.paths)?,
        other => {
            return Err(Error::Usage(format!(
                "unrecognized executable name: {}",
                other
            )))
        }
    }
    Ok(0)
}

/// `redo <target>...`: rebuild the named targets, stale or not.
fn redo(paths: &[String], session: &Session) -> Result<()> {
    let mut targets = Vec::new();
    for path in paths {
        let n = node::resolve(path)?;
        if !n.is_target {
            return Err(Error::Usage(format!("{} is a source, not a target", path)));
        }
        targets.push(n);
    }

    std::thread::scope(|s| {
        for n in &targets {
            s.spawn(move || {
                // The walk rebuilds if anything is stale; if it found nothing
                // to do, the rebuild is forced.
                let result = walk::redo_if_change(n, session).and_then(|changed| {
                    if changed {
                        Ok(())
                    } else {
                        build::build(n, session)
                    }
                });
                if let Err(err) = result {
                    session.cancel(err);
                }
            });
        }
    });
    finish(session)
}

/// `redo-ifchange <dep>...`, called by a running recipe: bring every dep up
/// to date, then record each as a content dependency of `$REDOPARENT`.
fn redo_ifchange(paths: &[String], session: &Session) -> Result<()> {
    let parent = require_parent("redo-ifchange")?;

    std::thread::scope(|s| {
        for path in paths {
            s.spawn(move || {
                let result =
                    node::resolve(path).and_then(|n| walk::redo_if_change(&n, session).map(|_| ()));
                if let Err(err) = result {
                    session.cancel(err);
                }
            });
        }
    });
    finish(session)?;

    let mut record = prereqs::Writer::append_to(&format!("{}.prereqs", parent))?;
    for path in paths {
        // Re-resolve: the walk may have brought the dep into existence.
        let n = node::resolve(path)?;
        record.ifchange(path, &n.hash()?)?;
    }
    Ok(())
}

/// `redo-ifcreate <dep>...`, called by a running recipe: record that
/// `$REDOPARENT` must rebuild when any of the named paths appears.
fn redo_ifcreate(paths: &[String]) -> Result<()> {
    let parent = require_parent("redo-ifcreate")?;

    for path in paths {
        let n = node::resolve(path)?;
        if n.exists {
            eprintln!("{} created since last run", n.path());
        }
    }

    let mut record = prereqs::Writer::append_to(&format!("{}.prereqs", parent))?;
    for path in paths {
        record.ifcreate(path)?;
    }
    Ok(())
}

/// `redo-unless-change <file>...`: pin a file by hash.  The first call
/// stores the hash in `<file>.md5`; later calls fail if the file no longer
/// matches it.
fn redo_unless_change(paths: &[String]) -> Result<()> {
    require_parent("redo-unless-change")?;

    for path in paths {
        let n = node::resolve(path)?;
        if !n.exists {
            return Err(Error::io(
                n.path(),
                std::io::Error::new(ErrorKind::NotFound, "does not exist"),
            ));
        }
        let hash = n.hash()?;
        match std::fs::read_to_string(n.md5_path()) {
            Ok(stored) => {
                if !stored.starts_with(&hash) {
                    return Err(Error::HashDrift(n.path()));
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                eprintln!(
                    "hashing {} for the first time, integrity will be preserved hereafter.",
                    n.path()
                );
                std::fs::write(n.md5_path(), format!("{}\t{}\n", hash, n.file))
                    .map_err(|err| Error::io(n.md5_path(), err))?;
            }
            Err(err) => return Err(Error::io(n.md5_path(), err)),
        }
    }
    Ok(())
}

fn require_parent(prog: &str) -> Result<String> {
    match std::env::var(PARENT_ENV) {
        Ok(parent) if !parent.is_empty() => Ok(parent),
        _ => Err(Error::Usage(format!(
            "{} must be called from a do script",
            prog
        ))),
    }
}

/// Surface the first failure any concurrent walker hit, if there was one.
fn finish(session: &Session) -> Result<()> {
    match session.take_cause() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
