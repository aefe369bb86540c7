//! Design-text builders shared by the unit tests.

use std::fmt::Write as _;
use std::path::Path;

use crate::builder::build_model;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::model::DesignModel;

#[derive(Debug, Clone)]
pub(crate) struct DesignText {
    text: String,
    states: usize,
    groups: usize,
    transitions: usize,
    first_state: Option<String>,
}

impl DesignText {
    pub fn new(name: &str) -> Self {
        Self {
            text: format!("[STATECHART]\nname = {name}\n\n[OPTIONS]\n\n[INITIAL]\n\n"),
            states: 0,
            groups: 0,
            transitions: 0,
            first_state: None,
        }
    }

    /// Adds an `OPTIONS` entry; repeated headers merge into one section.
    pub fn option(mut self, key: &str, value: &str) -> Self {
        let _ = writeln!(self.text, "[OPTIONS]\n{key} = {value}\n");
        self
    }

    pub fn state(self, name: &str, parent: &str, kind: &str) -> Self {
        self.state_with(name, parent, kind, ["None", "None", "None"])
    }

    pub fn state_with(mut self, name: &str, parent: &str, kind: &str, hooks: [&str; 3]) -> Self {
        self.states += 1;
        self.first_state.get_or_insert_with(|| name.to_string());
        let [entry, during, exit] = hooks;
        let _ = writeln!(
            self.text,
            "[STATE_{}]\nname = {name}\nparent = {parent}\ntype = {kind}\nentry = {entry}\ndo = {during}\nexit = {exit}\n",
            self.states
        );
        self
    }

    pub fn disabled_state(mut self, name: &str, parent: &str, kind: &str) -> Self {
        self = self.state(name, parent, kind);
        self.text.push_str("disable = True\n\n");
        self
    }

    pub fn events(mut self, name: &str, base: Option<u32>, events: &[&str]) -> Self {
        self.groups += 1;
        let base = base.map_or_else(|| "None".to_string(), |b| b.to_string());
        let _ = writeln!(
            self.text,
            "[EVENTS_{}]\nbase = {base}\nname = {name}",
            self.groups
        );
        for (n, event) in events.iter().enumerate() {
            let _ = writeln!(self.text, "event_{} = {event}", n + 1);
        }
        self.text.push('\n');
        self
    }

    pub fn transition(self, start: &str, end: &str, event: &str) -> Self {
        self.transition_with(start, end, event, "None", "None")
    }

    pub fn transition_with(
        mut self,
        start: &str,
        end: &str,
        event: &str,
        guard: &str,
        action: &str,
    ) -> Self {
        self.transitions += 1;
        let _ = writeln!(
            self.text,
            "[TRANSITION_{}]\nstart = {start}\nend = {end}\nevent = {event}\nguard = {guard}\naction = {action}\n",
            self.transitions
        );
        self
    }

    pub fn raw(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self.text.push('\n');
        self
    }

    /// The design text. A design without states gets a lone `Idle` state and one without
    /// transitions gets a start transition into its first state, so tests that only care
    /// about events or ports still describe a complete chart.
    pub fn text(&self) -> String {
        let mut text = self.text.clone();
        if !text.contains("[STATE_") {
            text.push_str(
                "[STATE_1]\nname = Idle\nparent = None\ntype = State\nentry = None\ndo = None\nexit = None\n\n",
            );
        }
        if !text.contains("[TRANSITION_") {
            let first = self.first_state.as_deref().unwrap_or("Idle");
            let _ = writeln!(
                text,
                "[TRANSITION_1]\nstart = Start\nend = {first}\nevent = None\nguard = None\naction = None\n"
            );
        }
        text
    }

    pub fn build(&self) -> (Result<DesignModel>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let model = build_model("test.ini", &self.text(), Path::new("."), &mut diag);
        (model, diag)
    }

    pub fn model(&self) -> DesignModel {
        self.build().0.expect("design should build")
    }
}
