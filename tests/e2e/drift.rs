//! Out-of-band edits to built artifacts are detected, not overwritten.

use crate::*;

#[test]
fn tampered_dep_fails_without_rebuilding() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("a.txt", "hi")?;
    space.write_script("main.do", DOUBLE_CAT_RECIPE)?;
    space.write_script("outer.do", "redo-ifchange main\necho run >> outer.runs\ncat main\n")?;

    space.run_expect(&mut space.tool("redo", &["outer"]))?;
    assert_eq!(space.runs("main.runs"), 1);
    assert_eq!(space.runs("outer.runs"), 1);

    space.write("main", "tampered")?;
    let out = space.run_expect_fail(&mut space.tool("redo", &["outer"]))?;
    assert_stderr_contains(&out, "hash changed since last build");

    // Nothing was rebuilt, and the edit is still there to inspect.
    assert_eq!(space.runs("main.runs"), 1);
    assert_eq!(space.runs("outer.runs"), 1);
    assert_eq!(space.read("main")?, b"tampered");
    Ok(())
}
