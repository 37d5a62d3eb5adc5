//! Creation-negative dependencies: a target is stable while the named path
//! is absent and rebuilds once it appears.

use crate::*;

#[test]
fn target_rebuilds_when_the_watched_file_appears() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write_script(
        "gen.do",
        "redo-ifcreate config\necho run >> gen.runs\necho base\n",
    )?;

    space.run_expect(&mut space.tool("redo", &["gen"]))?;
    assert_eq!(space.read("gen")?, b"base\n");
    let record = space.read_string("gen.prereqs")?;
    assert!(record.contains("config\tifcreate"), "record was {:?}", record);

    // Absent: stable.
    let mut cmd = space.tool_under_parent("redo-ifchange", &["gen"], "outer")?;
    space.run_expect(&mut cmd)?;
    assert_eq!(space.runs("gen.runs"), 1);

    // Present: one rebuild.
    space.write("config", "exists now")?;
    let mut cmd = space.tool_under_parent("redo-ifchange", &["gen"], "outer")?;
    let out = space.run_expect(&mut cmd)?;
    assert_stderr_contains(&out, "config created since last run");
    assert_eq!(space.runs("gen.runs"), 2);
    Ok(())
}
