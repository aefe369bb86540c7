//! End-to-end compilation tests

use std::fs;

use crate::common::*;
use scb_core::{CompileError, CompileOptions, ErrorCategory, Outcome, Pipeline, Stage, compile};
use tempfile::TempDir;

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn two_state_machine() -> Design {
    Design::new("Machine")
        .events("Evt", Some(1), &names(&["go"]))
        .state("Idle", "None", "State")
        .state("Run", "None", "State")
        .transition("Start", "Idle", "None")
        .transition("Idle", "Run", "Evt.go")
}

#[test]
fn two_state_machine_compiles_cleanly() {
    setup_tracing();

    let compilation = two_state_machine()
        .compile()
        .into_result()
        .expect("design should compile");

    assert!(compilation.warnings.is_empty(), "{:?}", compilation.warnings);
    let source = compilation.source.expect("generated source");
    assert_eq!(source.matches(".add_state(").count(), 2);
    assert_eq!(source.matches(".add_transition(").count(), 2);
}

#[test]
fn equal_bases_collide() {
    setup_tracing();

    let design = Design::new("Machine")
        .events("A", Some(10), &event_names("a", 5))
        .events("B", Some(10), &event_names("b", 5));
    let aborted = design.compile().into_result().unwrap_err();

    assert_eq!(aborted.stage, Stage::AllocateEvents);
    assert_eq!(aborted.error.category(), ErrorCategory::RangeCollision);
    assert_eq!(
        aborted.error.to_string(),
        "event range collision: A [10, 15) overlaps B [10, 15)"
    );
}

#[test]
fn charts_without_states_or_transitions_are_rejected() {
    setup_tracing();

    let header = "[STATECHART]\nname = Lamp\n\n[OPTIONS]\n\n[INITIAL]\n\n[EVENTS_1]\nbase = 1\nname = Evt\nevent_1 = go\n\n";
    let state = "[STATE_1]\nname = Off\nparent = None\ntype = State\nentry = None\ndo = None\nexit = None\n\n";

    for (text, missing) in [
        (header.to_string(), "STATE_1"),
        (format!("{header}{state}"), "TRANSITION_1"),
    ] {
        let aborted = Pipeline::with_source(CompileOptions::new("lamp.ini"), text)
            .run()
            .into_result()
            .unwrap_err();
        assert_eq!(aborted.stage, Stage::ParseDesign);
        assert_eq!(aborted.error.category(), ErrorCategory::MissingSection);
        assert_eq!(
            aborted.error.to_string(),
            format!("lamp.ini: missing section [{missing}]")
        );
    }
}

#[test]
fn concurrent_children_need_a_start() {
    setup_tracing();

    let design = Design::new("Machine")
        .state("C", "None", "ConcurrentState")
        .state("A", "C", "State")
        .state("B", "C", "State")
        .transition("Start", "C", "None");
    let aborted = design.compile().into_result().unwrap_err();

    assert_eq!(aborted.stage, Stage::ValidateStart);
    match &aborted.error {
        CompileError::MissingStartTransition { candidates } => assert_eq!(candidates, &["A", "B"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        aborted.error.to_string(),
        "no Start transition into any of [A, B]"
    );
}

#[test]
fn structured_entry_submits_its_event() {
    setup_tracing();

    let design = Design::new("Machine")
        .events("Evt", Some(1), &names(&["go"]))
        .state_with_entry("Idle", "None", "State", "[doThing(), Evt.go, extra]")
        .transition("Start", "Idle", "None");
    let compilation = design.compile().into_result().expect("design should compile");
    let source = compilation.source.expect("generated source");

    assert!(source.contains("pub fn doThing(param: &mut Machine) {"));
    assert!(source.contains("param.send_event(Evt::go, Some(EventData::from(extra)));"));
    assert!(compilation.warnings.is_empty(), "{:?}", compilation.warnings);
}

#[test]
fn debug_traces_transitions() {
    setup_tracing();

    let compilation = two_state_machine()
        .option("debug", "True")
        .compile()
        .into_result()
        .expect("design should compile");
    let source = compilation.source.expect("generated source");

    assert!(source.contains("pub fn trace_TRANSITION_2(param: &mut Machine)"));
    assert!(source.contains("\"Idle -> Run\""));
}

#[test]
fn disabled_states_are_left_out() {
    setup_tracing();

    let design = two_state_machine().state("Spare", "None", "State");
    let text = format!("{}disable = True\n", design.text());
    let outcome = Pipeline::with_source(CompileOptions::new("design.ini"), text).run();
    let source = outcome.into_result().unwrap().source.unwrap();

    assert!(!source.contains("\"Spare\""));
    assert_eq!(source.matches(".add_state(").count(), 2);
}

#[test]
fn files_are_written_only_after_success() -> anyhow::Result<()> {
    setup_tracing();

    let dir = TempDir::new()?;
    let design = dir.path().join("machine.ini");
    fs::write(&design, two_state_machine().text())?;

    let outcome = compile(&CompileOptions::new(&design));
    assert!(matches!(outcome, Outcome::Emitted(_)));
    assert!(dir.path().join("Machine.rs").exists());

    let broken = dir.path().join("broken.ini");
    fs::write(&broken, two_state_machine().text().replace("Evt.go", "Evt.gone"))?;
    let output = dir.path().join("broken.rs");
    let outcome = compile(&CompileOptions::new(&broken).with_output(&output));
    let aborted = outcome.into_result().unwrap_err();
    assert_eq!(aborted.stage, Stage::ValidateTransitions);
    assert!(!output.exists());
    Ok(())
}

#[test]
fn insert_cb_is_resolved_next_to_the_design() -> anyhow::Result<()> {
    setup_tracing();

    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("hand.rs"),
        "#[action]\npub fn doThing(param: &mut Machine) {\n    param.send_event(Evt::go, None);\n}\n",
    )?;
    let design = dir.path().join("machine.ini");
    let text = Design::new("Machine")
        .option("insertcb", "hand.rs")
        .events("Evt", Some(1), &names(&["go"]))
        .state_with_entry("Idle", "None", "State", "[doThing(), Evt.go, 1]")
        .transition("Start", "Idle", "None");
    fs::write(&design, text.text())?;

    let compilation = compile(&CompileOptions::new(&design))
        .into_result()
        .map_err(anyhow::Error::new)?;
    let source = fs::read_to_string(&compilation.output_path)?;

    assert!(source.contains("param.send_event(Evt::go, None);"));
    assert!(!source.contains("EventData::from(1)"));
    assert!(compilation.orphans.is_empty());
    Ok(())
}
