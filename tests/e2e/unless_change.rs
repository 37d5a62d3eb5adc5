//! Pinning files by hash with `redo-unless-change` / `stop-ifchange`.

use crate::*;

#[test]
fn first_call_pins_later_calls_verify() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("data", "v1")?;

    let mut cmd = space.tool_under_parent("redo-unless-change", &["data"], "outer")?;
    let out = space.run_expect(&mut cmd)?;
    assert_stderr_contains(&out, "hashing data for the first time");

    let hash = redo::digest::hash_file(&space.path("data").display().to_string())?;
    assert_eq!(space.read_string("data.md5")?, format!("{}\tdata\n", hash));

    // Unchanged: fine, under either name.
    let mut cmd = space.tool_under_parent("stop-ifchange", &["data"], "outer")?;
    space.run_expect(&mut cmd)?;

    // Changed: fatal.
    space.write("data", "v2")?;
    let mut cmd = space.tool_under_parent("stop-ifchange", &["data"], "outer")?;
    let out = space.run_expect_fail(&mut cmd)?;
    assert_stderr_contains(&out, "hash changed since last build");
    Ok(())
}

#[test]
fn pinning_a_missing_file_is_fatal() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let mut cmd = space.tool_under_parent("redo-unless-change", &["ghost"], "outer")?;
    let out = space.run_expect_fail(&mut cmd)?;
    assert_stderr_contains(&out, "ghost");
    Ok(())
}
