use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use scb::cli::{Cli, run};
use scb::scb_core::{ErrorCategory, Stage, emit::Aborted};
use tempfile::TempDir;

const LAMP: &str = "\
[STATECHART]
name = Lamp

[OPTIONS]
gencallbacks = True

[INITIAL]

[EVENTS_1]
base = 1
name = Evt
event_1 = on
event_2 = off

[STATE_1]
name = Dark
parent = None
type = State
entry = None
do = None
exit = None

[STATE_2]
name = Lit
parent = None
type = State
entry = [glow(), Evt.off]
do = None
exit = None

[TRANSITION_1]
start = Start
end = Dark
event = None
guard = None
action = None

[TRANSITION_2]
start = Dark
end = Lit
event = Evt.on
guard = None
action = None

[TRANSITION_3]
start = Lit
end = Dark
event = Evt.off
guard = None
action = None
";

fn design_in(dir: &TempDir, text: &str) -> Result<String> {
    let path = dir.path().join("lamp.ini");
    fs::write(&path, text)?;
    Ok(path.display().to_string())
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("scb").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[test]
fn compiles_next_to_the_design() -> Result<()> {
    let dir = TempDir::new()?;
    let design = design_in(&dir, LAMP)?;

    let compilation = run(&cli(&["-d", &design]))?;

    let output = dir.path().join("Lamp.rs");
    assert_eq!(compilation.output_path, output);
    let source = fs::read_to_string(&output)?;
    assert!(source.starts_with("// @generated"));
    assert!(source.contains("pub fn glow(param: &mut Lamp)"));
    assert!(dir.path().join("Lamp_cb.rs").exists());
    Ok(())
}

#[test]
fn callbacks_file_is_never_overwritten() -> Result<()> {
    let dir = TempDir::new()?;
    let design = design_in(&dir, LAMP)?;
    let callbacks = dir.path().join("Lamp_cb.rs");
    fs::write(&callbacks, "// mine\n")?;

    run(&cli(&["-d", &design]))?;

    assert_eq!(fs::read_to_string(&callbacks)?, "// mine\n");
    Ok(())
}

#[test]
fn check_mode_writes_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let design = design_in(&dir, LAMP)?;

    run(&cli(&["-d", &design, "--check"]))?;

    assert!(!dir.path().join("Lamp.rs").exists());
    assert!(!dir.path().join("Lamp_cb.rs").exists());
    Ok(())
}

#[test]
fn explicit_output_and_overrides_are_used() -> Result<()> {
    let dir = TempDir::new()?;
    let design = design_in(&dir, LAMP)?;
    let overrides = dir.path().join("hand.rs");
    fs::write(
        &overrides,
        "#[action]\npub fn glow(param: &mut Lamp) {\n    param.send_event(Evt::off, Some(EventData::from(7)));\n}\n\n#[guard]\npub fn spare(param: &Lamp) -> bool {\n    false\n}\n",
    )?;
    let output = dir.path().join("gen").join("lamp_chart.rs");
    fs::create_dir_all(output.parent().unwrap_or(Path::new(".")))?;

    let compilation = run(&cli(&[
        "-d",
        &design,
        "-o",
        &output.display().to_string(),
        "-c",
        &overrides.display().to_string(),
    ]))?;

    assert_eq!(compilation.orphans, ["spare"]);
    let source = fs::read_to_string(&output)?;
    assert!(source.contains("EventData::from(7)"));
    assert!(!source.contains("#[action]"));
    Ok(())
}

#[test]
fn invalid_design_fails_without_output() -> Result<()> {
    let dir = TempDir::new()?;
    let broken = LAMP.replace("base = 1", "base = 0");
    let design = design_in(&dir, &broken)?;

    let err = run(&cli(&["-d", &design])).unwrap_err();
    let aborted = err
        .downcast_ref::<Aborted>()
        .expect("error should carry the aborted run");
    assert_eq!(aborted.stage, Stage::AllocateEvents);
    assert_eq!(aborted.error.category(), ErrorCategory::RangeCollision);
    assert!(!dir.path().join("Lamp.rs").exists());
    Ok(())
}
