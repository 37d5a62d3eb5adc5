//! Per-target prerequisite records.
//!
//! `<target>.prereqs` is a line-oriented, tab-separated log of the
//! dependencies discovered while the target's recipe ran:
//!
//! ```text
//! <dep>\tifchange\t<32-char-hex-digest>
//! <dep>\tifcreate
//! ```
//!
//! The record is recreated at the start of every rebuild by the recipe
//! runner, which holds the target's lock; child engine processes append to
//! it through the `REDOPARENT` handoff.  Each line is committed with a
//! single write, so concurrent appends cannot interleave mid-line.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};

#[derive(Debug, PartialEq, Eq)]
pub enum Dep {
    /// Rebuild when the dependency's content digest no longer matches.
    IfChange { name: String, digest: String },
    /// Rebuild when the named path comes into existence.
    IfCreate { name: String },
}

/// Read and parse a whole record.  Dep names are relative to the owning
/// target's directory; order is insertion order and duplicates are kept.
pub fn read(path: &str) -> Result<Vec<Dep>> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let mut deps = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| Error::io(path, err))?;
        deps.push(parse_line(&line)?);
    }
    Ok(deps)
}

fn parse_line(line: &str) -> Result<Dep> {
    let mut fields = line.split('\t');
    let name = fields.next().unwrap_or_default();
    match fields.next() {
        Some("ifcreate") => Ok(Dep::IfCreate {
            name: name.to_string(),
        }),
        Some("ifchange") => match fields.next() {
            Some(digest) => Ok(Dep::IfChange {
                name: name.to_string(),
                digest: digest.to_string(),
            }),
            None => Err(Error::BadRecord(line.to_string())),
        },
        Some(verb) => Err(Error::UnknownDepKind {
            line: line.to_string(),
            verb: verb.to_string(),
        }),
        None => Err(Error::BadRecord(line.to_string())),
    }
}

pub struct Writer {
    path: String,
    file: File,
}

impl Writer {
    /// Truncate and open a record; the sole way a record comes into being.
    /// Callers must hold the target's lock.
    pub fn create(path: &str) -> Result<Writer> {
        let file = File::create(path).map_err(|err| Error::io(path, err))?;
        Ok(Writer {
            path: path.to_string(),
            file,
        })
    }

    /// Open an existing record for appending; used by child engine processes
    /// handed a `REDOPARENT`.  Fails if the record does not exist, since
    /// only a running recipe execution has one open.
    pub fn append_to(path: &str) -> Result<Writer> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|err| Error::io(path, err))?;
        Ok(Writer {
            path: path.to_string(),
            file,
        })
    }

    pub fn ifchange(&mut self, name: &str, digest: &str) -> Result<()> {
        self.write_line(format!("{}\tifchange\t{}\n", name, digest))
    }

    pub fn ifcreate(&mut self, name: &str) -> Result<()> {
        self.write_line(format!("{}\tifcreate\n", name))
    }

    fn write_line(&mut self, line: String) -> Result<()> {
        self.file
            .write_all(line.as_bytes())
            .map_err(|err| Error::io(&self.path, err))
    }
}
