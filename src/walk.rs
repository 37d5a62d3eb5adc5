//! The freshness walker: reads a target's prerequisite record, decides
//! whether the target is stale, and schedules rebuilds, fanning sub-targets
//! out onto parallel threads.

use crate::build;
use crate::error::{Error, Result};
use crate::node::{self, Node};
use crate::prereqs::{self, Dep};
use crate::session::Session;
use std::path::PathBuf;

/// Bring `node` up to date.  Returns whether the artifact changed (a rebuild
/// happened, or would be needed by a caller recording this node as a dep).
pub fn redo_if_change(node: &Node, session: &Session) -> Result<bool> {
    walk(node, session, &[])
}

/// One step of the walk.  `ancestry` holds the absolute paths of the targets
/// currently being walked on this dependency stack, for cycle detection.
fn walk(node: &Node, session: &Session, ancestry: &[PathBuf]) -> Result<bool> {
    session.check()?;

    if !node.is_target {
        // Sources are never rebuilt; the caller hashes them itself.
        return Ok(false);
    }

    let abs = std::path::absolute(node.path()).map_err(|err| Error::io(node.path(), err))?;
    if ancestry.contains(&abs) {
        return Err(cycle_error(ancestry, &abs));
    }
    let mut stack = ancestry.to_vec();
    stack.push(abs);

    if !node.exists {
        build::build(node, session)?;
        return Ok(true);
    }

    let mut changed = false;
    let mut subs = Vec::new();
    for dep in prereqs::read(&node.prereqs_path())? {
        match dep {
            Dep::IfCreate { name } => {
                let o = node::resolve(&format!("{}{}", node.dir, name))?;
                if o.exists {
                    eprintln!("{} created since last run", o.path());
                    changed = true;
                }
            }
            Dep::IfChange { name, digest } => {
                let o = node::resolve(&format!("{}{}", node.dir, name))?;
                if !o.is_target {
                    if o.hash()? != digest {
                        changed = true;
                    }
                } else if !o.exists {
                    changed = true;
                    build::build(&o, session)?;
                } else if o.hash()? != digest {
                    // The artifact was edited outside the build system;
                    // refuse to paper over that.
                    return Err(Error::HashDrift(o.path()));
                } else {
                    subs.push(o);
                }
            }
        }
    }

    if !subs.is_empty() {
        let stack = &stack;
        let results: Vec<Result<bool>> = std::thread::scope(|s| {
            let handles: Vec<_> = subs
                .iter()
                .map(|o| s.spawn(move || walk(o, session, stack)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in results {
            match result {
                // A rebuilt child means our recorded digest for it is stale,
                // so we must rebuild against the new content.
                Ok(sub_changed) => changed = changed || sub_changed,
                Err(err) => session.cancel(err),
            }
        }
        session.check()?;
    }

    if changed {
        build::build(node, session)?;
    }
    Ok(changed)
}

fn cycle_error(ancestry: &[PathBuf], repeated: &PathBuf) -> Error {
    let mut chain: Vec<String> = ancestry
        .iter()
        .skip_while(|p| *p != repeated)
        .map(|p| p.display().to_string())
        .collect();
    chain.push(repeated.display().to_string());
    Error::Cycle(chain.join(" -> "))
}
