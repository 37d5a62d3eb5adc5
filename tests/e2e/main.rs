//! Support code for e2e tests, which run the redo binary against a temp
//! directory.  The binary multiplexes on its program name, so the harness
//! symlinks every tool name to it in a private bin dir that also goes on
//! `PATH` for the recipes under test.  Unix-only, as are recipes themselves.
#![cfg(unix)]

mod drift;
mod ifcreate;
mod unless_change;

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

pub const TOOL_NAMES: &[&str] = &[
    "redo",
    "redo-ifchange",
    "redo-ifcreate",
    "redo-unless-change",
    "stop-ifchange",
];

pub fn redo_binary() -> PathBuf {
    std::env::current_exe()
        .expect("test binary path")
        .parent()
        .expect("test binary directory")
        .parent()
        .expect("binary directory")
        .join("redo")
}

fn print_output(out: &std::process::Output) {
    // Gross: use print! instead of writing to stdout so Rust test
    // framework can capture it.
    print!("{}", String::from_utf8_lossy(&out.stdout));
    print!("{}", String::from_utf8_lossy(&out.stderr));
}

pub fn assert_stderr_contains(out: &std::process::Output, text: &str) {
    let err = String::from_utf8_lossy(&out.stderr);
    if !err.contains(text) {
        panic!(
            "assertion failed; expected stderr to contain {:?} but got:\n{}",
            text, err
        );
    }
}

/// Manages a temporary directory for invoking redo, plus a bin dir holding
/// the multiplexed tool names.
pub struct TestSpace {
    dir: tempfile::TempDir,
    bin: tempfile::TempDir,
}

impl TestSpace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let bin = tempfile::tempdir()?;
        for name in TOOL_NAMES {
            std::os::unix::fs::symlink(redo_binary(), bin.path().join(name))?;
        }
        Ok(TestSpace { dir, bin })
    }

    /// Absolute path of a file in the working space.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file into the working space.
    pub fn write(&self, path: &str, content: &str) -> std::io::Result<()> {
        std::fs::write(self.path(path), content)
    }

    /// Write an executable `#!/bin/sh` recipe into the working space.
    pub fn write_script(&self, path: &str, body: &str) -> std::io::Result<()> {
        let path = self.path(path);
        std::fs::write(&path, format!("#!/bin/sh\n{}", body))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
    }

    /// Read a file from the working space.
    pub fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(path))
    }

    pub fn read_string(&self, path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.path(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path(path).exists()
    }

    /// Number of times a recipe that logs with `echo run >> <name>` ran.
    pub fn runs(&self, path: &str) -> usize {
        self.read_string(path).map_or(0, |s| s.lines().count())
    }

    /// A command for one of the multiplexed tool names, set up to run in the
    /// working space with a fresh session.
    pub fn tool(&self, name: &str, args: &[&str]) -> std::process::Command {
        let mut cmd = std::process::Command::new(self.bin.path().join(name));
        cmd.args(args).current_dir(self.dir.path());
        let path = match std::env::var("PATH") {
            Ok(old) => format!("{}:{}", self.bin.path().display(), old),
            Err(_) => self.bin.path().display().to_string(),
        };
        cmd.env("PATH", path)
            .env_remove("REDOTREETIME")
            .env_remove("REDOPARENT");
        cmd
    }

    /// Like `tool`, but with `REDOPARENT` pointing at a target in the space
    /// whose (possibly empty) record already exists, as if called from that
    /// target's running recipe.
    pub fn tool_under_parent(
        &self,
        name: &str,
        args: &[&str],
        parent: &str,
    ) -> anyhow::Result<std::process::Command> {
        let record = format!("{}.prereqs", parent);
        if !self.exists(&record) {
            self.write(&record, "")?;
        }
        let mut cmd = self.tool(name, args);
        cmd.env("REDOPARENT", self.path(parent));
        Ok(cmd)
    }

    /// Run a command, returning its output.
    pub fn run(&self, cmd: &mut std::process::Command) -> std::io::Result<std::process::Output> {
        cmd.output()
    }

    /// Like run, but also print output if the invocation failed.
    pub fn run_expect(
        &self,
        cmd: &mut std::process::Command,
    ) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if !out.status.success() {
            print_output(&out);
            anyhow::bail!("build failed, status {}", out.status);
        }
        Ok(out)
    }

    /// Run a command and require it to fail, returning its output.
    pub fn run_expect_fail(
        &self,
        cmd: &mut std::process::Command,
    ) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if out.status.success() {
            print_output(&out);
            anyhow::bail!("expected failure but the invocation succeeded");
        }
        Ok(out)
    }

    /// Add an extra (bogus) tool name pointing at the redo binary.
    pub fn link_tool(&self, name: &str) -> std::io::Result<()> {
        std::os::unix::fs::symlink(redo_binary(), self.bin.path().join(name))
    }
}

/// A recipe body that concatenates `a.txt` with itself to stdout, tracking
/// its dependency and logging each run.
pub const DOUBLE_CAT_RECIPE: &str = "redo-ifchange a.txt
echo run >> main.runs
cat a.txt a.txt
";
