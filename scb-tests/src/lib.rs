//! Integration and property tests for scb
//!
//! Everything here drives the compiler through its public API, from design text to
//! generated source.

#![cfg(test)]

pub mod integration;

/// Common test utilities and fixtures
pub mod common {
    use std::fmt::Write as _;

    use scb_core::{CompileOptions, Outcome, Pipeline};

    /// Setup tracing for tests
    pub fn setup_tracing() {
        use tracing_subscriber::{EnvFilter, fmt};

        let _ = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    /// Design text assembled section by section.
    #[derive(Debug, Clone)]
    pub struct Design {
        text: String,
        states: usize,
        groups: usize,
        transitions: usize,
        first_state: Option<String>,
    }

    impl Design {
        pub fn new(name: &str) -> Self {
            Self {
                text: format!("[STATECHART]\nname = {name}\n\n[OPTIONS]\n\n[INITIAL]\n\n"),
                states: 0,
                groups: 0,
                transitions: 0,
                first_state: None,
            }
        }

        pub fn option(mut self, key: &str, value: &str) -> Self {
            let _ = writeln!(self.text, "[OPTIONS]\n{key} = {value}\n");
            self
        }

        pub fn state(self, name: &str, parent: &str, kind: &str) -> Self {
            self.state_with_entry(name, parent, kind, "None")
        }

        pub fn state_with_entry(
            mut self,
            name: &str,
            parent: &str,
            kind: &str,
            entry: &str,
        ) -> Self {
            self.states += 1;
            self.first_state.get_or_insert_with(|| name.to_string());
            let _ = writeln!(
                self.text,
                "[STATE_{}]\nname = {name}\nparent = {parent}\ntype = {kind}\nentry = {entry}\ndo = None\nexit = None\n",
                self.states
            );
            self
        }

        pub fn events(mut self, name: &str, base: Option<u32>, events: &[String]) -> Self {
            self.groups += 1;
            let base = base.map_or_else(|| "None".to_string(), |b| b.to_string());
            let _ = writeln!(self.text, "[EVENTS_{}]\nbase = {base}\nname = {name}", self.groups);
            for (n, event) in events.iter().enumerate() {
                let _ = writeln!(self.text, "event_{} = {event}", n + 1);
            }
            self.text.push('\n');
            self
        }

        pub fn transition(mut self, start: &str, end: &str, event: &str) -> Self {
            self.transitions += 1;
            let _ = writeln!(
                self.text,
                "[TRANSITION_{}]\nstart = {start}\nend = {end}\nevent = {event}\nguard = None\naction = None\n",
                self.transitions
            );
            self
        }

        /// The design text, completed with an `Idle` state and a start transition when
        /// the design declares none of its own.
        pub fn text(&self) -> String {
            let mut text = self.text.clone();
            if self.states == 0 {
                text.push_str(
                    "[STATE_1]\nname = Idle\nparent = None\ntype = State\nentry = None\ndo = None\nexit = None\n\n",
                );
            }
            if self.transitions == 0 {
                let first = self.first_state.as_deref().unwrap_or("Idle");
                let _ = writeln!(
                    text,
                    "[TRANSITION_1]\nstart = Start\nend = {first}\nevent = None\nguard = None\naction = None\n"
                );
            }
            text
        }

        /// Runs the whole pipeline without touching the filesystem.
        pub fn compile(&self) -> Outcome {
            Pipeline::with_source(CompileOptions::new("design.ini").check_only(true), self.text()).run()
        }
    }

    /// `["e0", "e1", ...]` prefixed with `prefix`.
    pub fn event_names(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|n| format!("{prefix}{n}")).collect()
    }
}
