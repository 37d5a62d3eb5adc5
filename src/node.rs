//! Classifies filesystem paths as sources or targets and derives the sidecar
//! filenames (`.prereqs`, `.do`, `.lock`, ...) everything else works with.

use crate::digest;
use crate::error::{Error, Result};

/// A path the engine knows how to talk about, split into `(dir, file)` at the
/// last separator.  `dir` is empty or ends with `/`, so `dir + file`
/// reproduces the original path.  Immutable once resolved; the flags reflect
/// filesystem state at resolution time.
#[derive(Debug, Clone)]
pub struct Node {
    pub dir: String,
    pub file: String,
    /// Filename of the recipe within `dir`, when the node is a target.
    pub do_script: Option<String>,
    pub is_target: bool,
    pub uses_default_do: bool,
    pub exists: bool,
    pub is_dir: bool,
}

/// Classify `path` against the true filesystem state.
///
/// A co-located `<path>.do` wins; otherwise a `default<ext>.do` in the same
/// directory makes it a default-recipe target; otherwise it is a source.  A
/// `.prereqs` record with no recipe found by either rule is a hard error.
pub fn resolve(path: &str) -> Result<Node> {
    let (dir, file) = split(path);
    if file.is_empty() {
        return Err(Error::BadPath(path.to_string()));
    }

    let mut n = Node {
        dir,
        file,
        do_script: None,
        is_target: false,
        uses_default_do: false,
        exists: false,
        is_dir: false,
    };

    if stat(&n.prereqs_path())?.is_some() {
        n.is_target = true;
    }

    if let Some(meta) = stat(path)? {
        n.exists = true;
        n.is_dir = meta.is_dir();
    }

    if stat(&format!("{}.do", path))?.is_some() {
        n.is_target = true;
        n.do_script = Some(format!("{}.do", n.file));
    } else {
        let default = format!("default{}.do", ext(&n.file));
        if stat(&format!("{}{}", n.dir, default))?.is_some() {
            n.is_target = true;
            n.uses_default_do = true;
            n.do_script = Some(default);
        }
    }

    if n.is_target && n.do_script.is_none() {
        return Err(Error::MissingRecipe(n.path()));
    }
    Ok(n)
}

impl Node {
    pub fn path(&self) -> String {
        format!("{}{}", self.dir, self.file)
    }

    pub fn prereqs_path(&self) -> String {
        format!("{}{}.prereqs", self.dir, self.file)
    }

    pub fn lock_path(&self) -> String {
        format!("{}{}.lock", self.dir, self.file)
    }

    pub fn md5_path(&self) -> String {
        format!("{}{}.md5", self.dir, self.file)
    }

    /// Transient capture of the recipe's stdout, renamed over the artifact on
    /// success.
    pub fn stdout_sink_path(&self) -> String {
        format!("{}redo-stdout---{}", self.dir, self.file)
    }

    /// Name handed to the recipe as `$3`, relative to its working directory.
    pub fn arg3_name(&self) -> String {
        format!("redo-redoArg3---{}", self.file)
    }

    pub fn arg3_path(&self) -> String {
        format!("{}{}", self.dir, self.arg3_name())
    }

    /// The recipe's `$2`: the target filename with its final extension
    /// stripped.
    pub fn stem(&self) -> &str {
        &self.file[..self.file.len() - ext(&self.file).len()]
    }

    /// Content digest of the node as it is on disk right now.
    pub fn hash(&self) -> Result<String> {
        if self.is_dir {
            digest::hash_dir(&self.path())
        } else {
            digest::hash_file(&self.path())
        }
    }
}

fn split(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(i) => (path[..i + 1].to_string(), path[i + 1..].to_string()),
        None => (String::new(), path.to_string()),
    }
}

/// The final dotted suffix of `file`, including the dot; empty if none.
fn ext(file: &str) -> &str {
    match file.rfind('.') {
        Some(i) => &file[i..],
        None => "",
    }
}

fn stat(path: &str) -> Result<Option<std::fs::Metadata>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::io(path, err)),
    }
}
