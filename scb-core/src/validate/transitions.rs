//! Transition consistency checks.
//!
//! The checks run in a fixed order: the end-event scan of case 2 produces the [`EndScan`]
//! that the event-less check of case 3 consumes, and events are only qualified (case 4) after
//! both compared the events as written.

use std::collections::HashSet;

use tracing::info;

use super::{Ancestry, Validator, lookup_event};
use crate::diagnostics::WarningKind;
use crate::error::{CompileError, Result};
use crate::model::{Endpoint, StateKind};

/// Result of the end-event scan. Only [`Validator::check_end_event_reuse`] creates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndScan {
    has_end_transition: bool,
}

impl EndScan {
    pub fn has_end_transition(self) -> bool {
        self.has_end_transition
    }
}

impl Validator<'_> {
    /// Runs every transition check in order.
    pub fn check_transitions(&mut self) -> Result<()> {
        self.warn_untriggerable_sources();
        let scan = self.check_end_event_reuse()?;
        self.check_eventless(scan)?;
        self.resolve_transition_events()?;
        self.check_common_ancestors()?;
        self.verify_end_transitions()?;
        self.report_disabled_transitions();
        info!("transitions verified");
        Ok(())
    }

    /// Case 1: a source that is not hierarchical under a parent that is not hierarchical
    /// never sees the event.
    pub fn warn_untriggerable_sources(&mut self) {
        let mut seen = HashSet::new();
        let mut findings = Vec::new();
        for transition in self.model.enabled_transitions() {
            let Some(start) = transition.start.state() else {
                continue;
            };
            if !seen.insert(start) {
                continue;
            }
            let Some(state) = self.model.enabled_state(start) else {
                continue;
            };
            if state.kind == StateKind::Hierarchical {
                continue;
            }
            let Some(parent) = state
                .parent
                .as_deref()
                .and_then(|p| self.model.enabled_state(p))
            else {
                continue;
            };
            if parent.kind != StateKind::Hierarchical {
                findings.push(format!(
                    "state {} is not hierarchical, nor its parent {}. Transition will not trigger",
                    state.name, parent.name
                ));
            }
        }
        for message in findings {
            self.diag.warn(WarningKind::DesignSmell, message);
        }
    }

    /// Compares events as written, qualifying them where that is possible without warnings.
    fn normalized_event(&self, event: &str) -> String {
        lookup_event(&self.model.groups, "", event)
            .map(|(qualified, _)| qualified)
            .unwrap_or_else(|_| event.trim().to_string())
    }

    /// Case 2: an event that ends the chart cannot also drive an ordinary transition.
    pub fn check_end_event_reuse(&mut self) -> Result<EndScan> {
        let mut has_end_transition = false;
        for end in self.model.enabled_transitions() {
            if end.end != Endpoint::End {
                continue;
            }
            has_end_transition = true;
            let Some(end_event) = end.event.as_deref() else {
                continue;
            };
            let end_event = self.normalized_event(end_event);
            let reuse = self.model.enabled_transitions().find(|t| {
                t.end != Endpoint::End
                    && t.event
                        .as_deref()
                        .is_some_and(|e| self.normalized_event(e) == end_event)
            });
            if let Some(reuse) = reuse {
                return Err(CompileError::ReusedEndEvent {
                    transition: reuse.name.clone(),
                    event: end_event,
                    state: reuse.start.label().to_string(),
                });
            }
        }
        Ok(EndScan { has_end_transition })
    }

    /// Case 3: event-less transitions out of a default state fire on the end transition.
    pub fn check_eventless(&mut self, scan: EndScan) -> Result<()> {
        let mut findings = Vec::new();
        for transition in self.model.enabled_transitions() {
            if transition.event.is_some() || transition.start == Endpoint::Start {
                continue;
            }
            let from_default = self
                .model
                .enabled_transitions()
                .any(|t| t.start == Endpoint::Start && t.end == transition.start);
            if from_default && scan.has_end_transition() {
                return Err(CompileError::MissingEvent {
                    transition: transition.name.clone(),
                    start: transition.start.label().to_string(),
                    end: transition.end.label().to_string(),
                });
            }
            findings.push(format!(
                "{}: transition {} -> {} has no event",
                transition.name,
                transition.start.label(),
                transition.end.label()
            ));
        }
        for message in findings {
            self.diag.warn(WarningKind::DesignSmell, message);
        }
        Ok(())
    }

    /// Case 4: every event resolves to exactly one `Group.event`; rewritten in place.
    pub fn resolve_transition_events(&mut self) -> Result<()> {
        for idx in 0..self.model.transitions.len() {
            let transition = &self.model.transitions[idx];
            if transition.disabled {
                continue;
            }
            let Some(event) = transition.event.clone() else {
                continue;
            };
            let context = transition.name.clone();
            let qualified = self.resolve_event(&context, &event)?;
            self.model.transitions[idx].event = Some(qualified);
        }
        Ok(())
    }

    /// Case 5: start and end need a common hierarchical ancestor (the chart itself counts).
    pub fn check_common_ancestors(&mut self) -> Result<()> {
        for idx in 0..self.model.transitions.len() {
            let transition = &self.model.transitions[idx];
            if transition.disabled {
                continue;
            }
            let (Some(start), Some(end)) = (transition.start.state(), transition.end.state())
            else {
                continue;
            };

            let (start_chain, end_chain) = match (self.ancestry(start)?, self.ancestry(end)?) {
                (Ancestry::Complete(s), Ancestry::Complete(e)) => (s, e),
                (Ancestry::Disabled(state), _) | (_, Ancestry::Disabled(state)) => {
                    let message = format!(
                        "{} disabled because state {state} is disabled",
                        transition.name
                    );
                    self.model.transitions[idx].disabled = true;
                    self.diag.warn(WarningKind::CascadingDisable, message);
                    continue;
                }
            };

            // A self transition leaves and re-enters the state, so it lives in the parent.
            let skip = usize::from(start == end);
            if !self.shares_hierarchical_ancestor(&start_chain[skip..], &end_chain[skip..]) {
                return Err(CompileError::NoCommonAncestor {
                    transition: transition.name.clone(),
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Walks the common ancestors innermost first: a hierarchical one accepts, a concurrent
    /// one rejects (the transition would cross regions), running out means the chart root.
    fn shares_hierarchical_ancestor(&self, start_chain: &[String], end_chain: &[String]) -> bool {
        for name in start_chain.iter().filter(|name| end_chain.contains(name)) {
            match self.model.state(name).map(|s| s.kind) {
                Some(StateKind::Hierarchical) => return true,
                Some(StateKind::Concurrent) => return false,
                _ => {}
            }
        }
        true
    }

    /// The chart owns the only end state, so end transitions start at top level.
    pub fn verify_end_transitions(&mut self) -> Result<()> {
        for transition in self.model.enabled_transitions() {
            if transition.end != Endpoint::End {
                continue;
            }
            let Some(start) = transition.start.state() else {
                continue;
            };
            if self.model.state(start).is_some_and(|s| s.parent.is_some()) {
                return Err(CompileError::NestedEndTransition {
                    transition: transition.name.clone(),
                    state: start.to_string(),
                });
            }
        }
        Ok(())
    }

    fn report_disabled_transitions(&mut self) {
        let disabled: Vec<String> = self
            .model
            .transitions
            .iter()
            .filter(|t| t.disabled)
            .map(|t| {
                format!(
                    "{} ({} -> {}) is disabled and will not be generated",
                    t.name,
                    t.start.label(),
                    t.end.label()
                )
            })
            .collect();
        for message in disabled {
            self.diag.warn(WarningKind::DesignSmell, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::error::ErrorCategory;
    use crate::test_support::DesignText;

    fn check(design: &DesignText) -> (Result<crate::model::DesignModel>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let mut validator = Validator::new(design.model(), &mut diag);
        let result = validator
            .allocate_event_ids()
            .and_then(|()| validator.check_transitions())
            .map(|()| validator.into_model());
        (result, diag)
    }

    fn two_state_chart() -> DesignText {
        DesignText::new("Chart")
            .state("Idle", "None", "State")
            .state("Run", "None", "State")
            .events("Evt", Some(1), &["go", "stop"])
    }

    #[test]
    fn simple_chart_is_clean() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "Evt.go");
        let (model, diag) = check(&design);
        assert!(model.is_ok());
        assert!(diag.is_empty(), "unexpected warnings: {:?}", diag.warnings());
    }

    #[test]
    fn source_under_simple_parent_will_not_trigger() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state("P", "None", "State")
            .state("A", "P", "State")
            .transition("Start", "P", "None")
            .transition("Start", "A", "None")
            .transition("A", "A", "Evt.go");
        let (model, diag) = check(&design);
        assert!(model.is_ok());
        assert!(
            diag.warnings()
                .iter()
                .any(|w| w.message.contains("Transition will not trigger"))
        );
    }

    #[test]
    fn end_event_reuse_is_fatal() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "Evt.stop")
            .transition("Run", "End", "stop");
        let (model, _) = check(&design);
        match model.unwrap_err() {
            CompileError::ReusedEndEvent {
                transition, event, ..
            } => {
                assert_eq!(transition, "TRANSITION_2");
                assert_eq!(event, "Evt.stop");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn eventless_exit_from_default_state_is_fatal_with_end() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "None")
            .transition("Run", "End", "Evt.stop");
        let (model, _) = check(&design);
        let err = model.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::StructuralInconsistency);
        assert_eq!(
            err.to_string(),
            "TRANSITION_2: missing event causes Idle -> Run to fire on the end transition"
        );
    }

    #[test]
    fn eventless_without_end_only_warns() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "None");
        let (model, diag) = check(&design);
        assert!(model.is_ok());
        assert_eq!(diag.count_of(WarningKind::DesignSmell), 1);
    }

    #[test]
    fn unqualified_events_are_rewritten() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "go");
        let (model, diag) = check(&design);
        let model = model.unwrap();
        assert_eq!(model.transitions[1].event.as_deref(), Some("Evt.go"));
        assert_eq!(diag.count_of(WarningKind::AutoQualifiedEvent), 1);
    }

    #[test]
    fn unresolved_transition_event_is_fatal() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "Evt.jump");
        let (model, _) = check(&design);
        assert_eq!(
            model.unwrap_err().category(),
            ErrorCategory::UnresolvedReference
        );
    }

    #[test]
    fn crossing_concurrent_regions_is_fatal() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state("C", "None", "ConcurrentState")
            .state("Left", "C", "HierarchicalState")
            .state("Right", "C", "HierarchicalState")
            .state("L1", "Left", "State")
            .state("R1", "Right", "State")
            .transition("Start", "C", "None")
            .transition("Start", "L1", "None")
            .transition("Start", "R1", "None")
            .transition("L1", "R1", "Evt.go");
        let (model, _) = check(&design);
        assert_eq!(
            model.unwrap_err().to_string(),
            "TRANSITION_4: L1 and R1 share no hierarchical ancestor"
        );
    }

    #[test]
    fn transitions_inside_a_region_are_fine() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state("C", "None", "ConcurrentState")
            .state("Left", "C", "HierarchicalState")
            .state("L1", "Left", "State")
            .state("L2", "Left", "State")
            .transition("Start", "C", "None")
            .transition("Start", "L1", "None")
            .transition("L1", "L2", "Evt.go");
        let (model, _) = check(&design);
        assert!(model.is_ok());
    }

    #[test]
    fn nested_end_transition_is_fatal() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["stop"])
            .state("Outer", "None", "HierarchicalState")
            .state("Inner", "Outer", "State")
            .transition("Start", "Outer", "None")
            .transition("Start", "Inner", "None")
            .transition("Inner", "End", "Evt.stop");
        let (model, _) = check(&design);
        assert!(matches!(
            model.unwrap_err(),
            CompileError::NestedEndTransition { state, .. } if state == "Inner"
        ));
    }

    #[test]
    fn disabled_transitions_are_reported() {
        let design = two_state_chart()
            .transition("Start", "Idle", "None")
            .transition("Idle", "Run", "Evt.go")
            .raw("disable = 1");
        let (model, diag) = check(&design);
        assert!(model.unwrap().transitions[1].disabled);
        assert_eq!(diag.count_of(WarningKind::DesignSmell), 1);
    }
}
