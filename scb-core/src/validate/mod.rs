//! Semantic validation of a [`DesignModel`].
//!
//! The [`Validator`] owns the model while it checks it. Besides reporting, it rewrites the
//! model in a few well-defined ways: event ids are allocated, unqualified events are
//! qualified, and states or transitions that depend on disabled states are disabled with a
//! warning. Once every check passed, [`Validator::into_model`] hands the model to the code
//! generator.

mod events;
mod transitions;

pub use events::lookup_event;
pub use transitions::EndScan;

use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{CompileError, Result};
use crate::model::{DesignModel, Endpoint, StateSpec};

pub struct Validator<'d> {
    model: DesignModel,
    diag: &'d mut Diagnostics,
}

impl<'d> Validator<'d> {
    pub fn new(model: DesignModel, diag: &'d mut Diagnostics) -> Self {
        Self { model, diag }
    }

    pub fn model(&self) -> &DesignModel {
        &self.model
    }

    pub fn into_model(self) -> DesignModel {
        self.model
    }

    /// Disables states whose parent is disabled, to a fixpoint, and rejects unknown parents.
    pub fn verify_state_parents(&mut self) -> Result<()> {
        loop {
            let mut changed = false;
            for idx in 0..self.model.states.len() {
                let state = &self.model.states[idx];
                if state.disabled {
                    continue;
                }
                let Some(parent) = state.parent.as_deref() else {
                    continue;
                };
                match self.model.state(parent) {
                    None => {
                        return Err(CompileError::UnresolvedReference {
                            context: state.section.clone(),
                            kind: "parent state",
                            reference: parent.to_string(),
                        });
                    }
                    Some(p) if p.disabled => {
                        let message = format!(
                            "state {} disabled because its parent {} is disabled",
                            state.name, p.name
                        );
                        self.model.states[idx].disabled = true;
                        self.diag.warn(WarningKind::CascadingDisable, message);
                        changed = true;
                    }
                    Some(_) => {}
                }
            }
            if !changed {
                break;
            }
        }

        for state in self.model.enabled_states() {
            self.ancestry(&state.name)?;
        }
        Ok(())
    }

    /// `[state, parent, grandparent, ...]`, stopping at the first disabled state.
    pub(crate) fn ancestry(&self, name: &str) -> Result<Ancestry> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(state_name) = current {
            let state = self.lookup_state(state_name)?;
            if state.disabled {
                return Ok(Ancestry::Disabled(state.name.clone()));
            }
            if chain.len() > self.model.states.len() {
                return Err(CompileError::ParentCycle {
                    state: name.to_string(),
                });
            }
            chain.push(state.name.clone());
            current = state.parent.as_deref();
        }
        Ok(Ancestry::Complete(chain))
    }

    fn lookup_state(&self, name: &str) -> Result<&StateSpec> {
        self.model
            .state(name)
            .ok_or_else(|| CompileError::UnresolvedReference {
                context: "hierarchy".into(),
                kind: "state",
                reference: name.to_string(),
            })
    }

    /// Transition endpoints must name declared states; disabled ones disable the transition.
    pub fn verify_transition_states(&mut self) -> Result<()> {
        for idx in 0..self.model.transitions.len() {
            let transition = &self.model.transitions[idx];
            if transition.disabled {
                continue;
            }
            let mut disabled_by = None;
            for endpoint in [&transition.start, &transition.end] {
                let Some(name) = endpoint.state() else {
                    continue;
                };
                match self.model.state(name) {
                    None => {
                        return Err(CompileError::UnresolvedReference {
                            context: transition.name.clone(),
                            kind: "state",
                            reference: name.to_string(),
                        });
                    }
                    Some(state) if state.disabled => disabled_by = Some(state.name.clone()),
                    Some(_) => {}
                }
            }
            if let Some(state) = disabled_by {
                let message = format!(
                    "{} disabled because state {state} is disabled",
                    transition.name
                );
                self.model.transitions[idx].disabled = true;
                self.diag.warn(WarningKind::CascadingDisable, message);
            }
        }
        Ok(())
    }

    fn has_start_into(&self, state: &str) -> bool {
        self.model.enabled_transitions().any(|t| {
            t.start == Endpoint::Start && t.end.state() == Some(state)
        })
    }

    /// Case A: composite states without a start warn. Case B: every sibling set holding a
    /// non-composite state needs a start into one of its members.
    pub fn verify_start_transitions(&mut self) -> Result<()> {
        let unstarted: Vec<String> = self
            .model
            .enabled_states()
            .filter(|s| s.kind.is_composite() && !self.has_start_into(&s.name))
            .map(|s| s.name.clone())
            .collect();
        for name in unstarted {
            self.diag.warn(
                WarningKind::DesignSmell,
                format!("no Start transition into composite state {name}, it is never entered by default"),
            );
        }

        let mut checked_parents: Vec<Option<&str>> = Vec::new();
        for state in self.model.enabled_states() {
            if state.kind.is_composite() {
                continue;
            }
            let parent = state.parent.as_deref();
            if checked_parents.contains(&parent) {
                continue;
            }
            checked_parents.push(parent);

            let siblings: Vec<String> = self
                .model
                .enabled_states()
                .filter(|s| s.parent.as_deref() == parent)
                .map(|s| s.name.clone())
                .collect();
            if !siblings.iter().any(|s| self.has_start_into(s)) {
                let disabled = self
                    .model
                    .transitions
                    .iter()
                    .filter(|t| t.disabled && t.start == Endpoint::Start)
                    .count();
                debug!(disabled, "disabled Start transitions in design");
                return Err(CompileError::MissingStartTransition {
                    candidates: siblings,
                });
            }
        }
        info!("start transitions verified");
        Ok(())
    }

    /// Output ports filtering on an unknown group only warn: the group may live elsewhere.
    pub fn verify_ports(&mut self) {
        let unknown: Vec<(String, String)> = self
            .model
            .ports
            .iter()
            .filter(|p| !p.direction.is_input())
            .filter_map(|p| {
                let filter = p.event_filter.as_deref()?;
                self.model
                    .group(filter)
                    .is_none()
                    .then(|| (p.name.clone(), filter.to_string()))
            })
            .collect();
        for (port, group) in unknown {
            self.diag.warn(
                WarningKind::DesignSmell,
                format!("output port {port} filters on unknown event group {group}"),
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ancestry {
    /// Every state from the start up to a top-level state.
    Complete(Vec<String>),
    /// The named state on the way up is disabled.
    Disabled(String),
}
