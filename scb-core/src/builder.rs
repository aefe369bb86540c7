//! Builds a [`DesignModel`] out of a parsed [`DesignFile`].
//!
//! Numbered section families (`STATE_`, `EVENTS_`, `TRANSITION_`, `PORT_`) are collected in
//! chunks: `STATE_1, STATE_2, ...` first, then `STATE_1_1, STATE_1_2, ...`, then
//! `STATE_2_1, ...`, stopping at the first chunk whose opening section is missing. That lets a
//! large design be split into independently numbered pieces.

use std::path::Path;

use tracing::info;

use crate::config::{DesignOptions, parse_flag};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{CompileError, Result};
use crate::model::{
    Callback, DesignModel, Endpoint, EventGroup, NONE_SENTINEL, PortDirection, PortFormat,
    PortInit, PortSpec, StateKind, StateSpec, TransitionSpec, is_none_value,
};
use crate::section::{DesignFile, Section, Value};

/// Collects a numbered section family in chunk order.
pub fn collect_family<'f>(file: &'f DesignFile, prefix: &str) -> Vec<&'f Section> {
    let mut found = Vec::new();
    let mut base = prefix.to_string();
    let mut chunk = 0;
    loop {
        let mut n = 1;
        while let Some(section) = file.section(&format!("{base}{n}")) {
            found.push(section);
            n += 1;
        }
        if n == 1 && chunk > 0 {
            break;
        }
        chunk += 1;
        base = format!("{prefix}{chunk}_");
    }
    found
}

pub struct ModelBuilder<'a> {
    file: &'a DesignFile,
    /// Directory relative paths in the design (initializer file) resolve against.
    base_dir: &'a Path,
    diag: &'a mut Diagnostics,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(file: &'a DesignFile, base_dir: &'a Path, diag: &'a mut Diagnostics) -> Self {
        Self {
            file,
            base_dir,
            diag,
        }
    }

    pub fn build(mut self) -> Result<DesignModel> {
        let chart = self.file.require_section("STATECHART")?;
        let name = self.scalar(chart, "name")?;

        let options_section = self.file.require_section("OPTIONS")?;
        let options = DesignOptions::from_section(options_section, self.diag);

        let initial = self.read_initial()?;
        let states = self.read_states()?;
        let groups = self.read_event_groups()?;
        let suppressed = self.read_suppressed();
        let transitions = self.read_transitions()?;
        let (port_init, ports) = self.read_ports()?;

        Ok(DesignModel {
            name,
            options,
            initial,
            states,
            groups,
            suppressed,
            transitions,
            port_init,
            ports,
        })
    }

    fn scalar(&mut self, section: &Section, key: &str) -> Result<String> {
        let mut values = section.read_keys(self.file.label(), &[key], self.diag)?;
        Ok(values.pop().map(Value::into_text).unwrap_or_default())
    }

    fn required(&mut self, section: &Section, keys: &[&str]) -> Result<Vec<String>> {
        Ok(section
            .read_keys(self.file.label(), keys, self.diag)?
            .into_iter()
            .map(Value::into_text)
            .collect())
    }

    fn disabled(section: &Section) -> bool {
        section.get("disable").is_some_and(parse_flag)
    }

    /// A family the design cannot do without; its first section must exist.
    fn required_family(&mut self, prefix: &str) -> Result<Vec<&'a Section>> {
        let sections = self.family(prefix);
        if sections.is_empty() {
            return Err(CompileError::MissingSection {
                file: self.file.label().to_string(),
                section: format!("{prefix}1"),
            });
        }
        Ok(sections)
    }

    fn family(&mut self, prefix: &str) -> Vec<&'a Section> {
        let sections = collect_family(self.file, prefix);
        let headers = self.file.count_headers(prefix);
        if headers != sections.len() {
            self.diag.warn(
                WarningKind::SectionCountMismatch,
                format!(
                    "{headers} [{prefix}*] headers in {} but {} sections collected, check for duplicated or misnumbered sections",
                    self.file.label(),
                    sections.len()
                ),
            );
        }
        sections
    }

    fn read_initial(&mut self) -> Result<Vec<String>> {
        let Some(section) = self.file.section("INITIAL") else {
            self.diag
                .warn(WarningKind::MissingOptional, "no [INITIAL] section");
            return Ok(Vec::new());
        };
        let mut lines = section
            .read_optional("code", self.diag)
            .map(Value::into_list)
            .unwrap_or_default();
        let init_file = section.get("file").filter(|f| !is_none_value(f));

        if let Some(init_file) = init_file {
            if !lines.is_empty() {
                self.diag.warn(
                    WarningKind::DesignSmell,
                    "[INITIAL] has both code lines and a file, using both",
                );
            }
            let path = self.base_dir.join(init_file.trim());
            let text = std::fs::read_to_string(&path).map_err(|e| CompileError::io(&path, e))?;
            lines.extend(text.lines().map(str::to_string));
        }
        Ok(lines)
    }

    fn read_states(&mut self) -> Result<Vec<StateSpec>> {
        let mut states: Vec<StateSpec> = Vec::new();
        for section in self.required_family("STATE_")? {
            let [name, parent, kind, entry, during, exit]: [String; 6] = self
                .required(section, &["name", "parent", "type", "entry", "do", "exit"])?
                .try_into()
                .unwrap_or_default();
            let name = name.trim().to_string();
            if name == NONE_SENTINEL || name.is_empty() {
                return Err(CompileError::InvalidValue {
                    section: section.name().to_string(),
                    key: "name".into(),
                    value: name,
                    expected: "a state name other than None".into(),
                });
            }
            if states.iter().any(|s| s.name == name) {
                return Err(CompileError::DuplicateDefinition {
                    kind: "state",
                    name,
                });
            }
            let kind = StateKind::parse(&kind).ok_or_else(|| CompileError::InvalidValue {
                section: section.name().to_string(),
                key: "type".into(),
                value: kind.clone(),
                expected: StateKind::ACCEPTED.into(),
            })?;
            states.push(StateSpec {
                section: section.name().to_string(),
                name,
                parent: (!is_none_value(&parent)).then(|| parent.trim().to_string()),
                kind,
                entry: Callback::parse(&entry),
                during: Callback::parse(&during),
                exit: Callback::parse(&exit),
                disabled: Self::disabled(section),
            });
        }

        let disabled = states.iter().filter(|s| s.disabled).count();
        let top = states.iter().filter(|s| s.parent.is_none()).count();
        info!(
            total = states.len(),
            enabled = states.len() - disabled,
            disabled,
            top_level = top,
            "states loaded"
        );
        Ok(states)
    }

    fn read_event_groups(&mut self) -> Result<Vec<EventGroup>> {
        let sections = self.family("EVENTS_");
        if sections.is_empty() {
            self.diag
                .warn(WarningKind::MissingOptional, "no [EVENTS_1] section");
        }
        let mut groups: Vec<EventGroup> = Vec::new();
        for section in sections {
            let [base, name]: [String; 2] = self
                .required(section, &["base", "name"])?
                .try_into()
                .unwrap_or_default();
            let events = self
                .required_list(section, "event")?
                .into_iter()
                .map(|e| e.trim().to_string())
                .collect::<Vec<_>>();

            let name = name.trim().to_string();
            if groups.iter().any(|g| g.name == name) {
                return Err(CompileError::DuplicateDefinition {
                    kind: "event group",
                    name,
                });
            }
            for (idx, event) in events.iter().enumerate() {
                if events[..idx].contains(event) {
                    return Err(CompileError::DuplicateDefinition {
                        kind: "event",
                        name: format!("{name}.{event}"),
                    });
                }
            }
            let base = if is_none_value(&base) {
                None
            } else {
                Some(
                    base.trim()
                        .parse::<u32>()
                        .map_err(|_| CompileError::InvalidValue {
                            section: section.name().to_string(),
                            key: "base".into(),
                            value: base.clone(),
                            expected: "an integer or None".into(),
                        })?,
                )
            };
            groups.push(EventGroup {
                section: section.name().to_string(),
                name,
                base,
                events,
                ids: Vec::new(),
            });
        }
        info!(
            groups = groups.len(),
            events = groups.iter().map(|g| g.events.len()).sum::<usize>(),
            "event groups loaded"
        );
        Ok(groups)
    }

    /// `key_1..key_n`, at least `key_1` required.
    fn required_list(&mut self, section: &Section, key: &str) -> Result<Vec<String>> {
        let first = format!("{key}_1");
        if !section.contains(key) && !section.contains(&first) {
            return Err(CompileError::MissingKey {
                file: self.file.label().to_string(),
                section: section.name().to_string(),
                key: first,
            });
        }
        Ok(section
            .read_optional(key, self.diag)
            .map(Value::into_list)
            .unwrap_or_default())
    }

    fn read_suppressed(&mut self) -> Vec<String> {
        let suppressed: Vec<String> = self
            .file
            .section("SUPPRESS_PRINT")
            .and_then(|section| section.read_optional("event", self.diag))
            .map(Value::into_list)
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !is_none_value(e))
            .collect();
        if !suppressed.is_empty() {
            info!(count = suppressed.len(), "suppressed events loaded");
        }
        suppressed
    }

    fn read_transitions(&mut self) -> Result<Vec<TransitionSpec>> {
        let mut transitions = Vec::new();
        for section in self.required_family("TRANSITION_")? {
            let [start, end, event, guard, action]: [String; 5] = self
                .required(section, &["start", "end", "event", "guard", "action"])?
                .try_into()
                .unwrap_or_default();
            let event = (!is_none_value(&event)).then(|| event.trim().to_string());
            if let Some(event) = &event {
                if event.contains("Event(") {
                    return Err(CompileError::EventDeclaration {
                        transition: section.name().to_string(),
                        event: event.clone(),
                    });
                }
            }
            transitions.push(TransitionSpec {
                name: section.name().to_string(),
                start: Endpoint::parse(&start),
                end: Endpoint::parse(&end),
                event,
                guard: Callback::parse(&guard),
                action: Callback::parse(&action),
                disabled: Self::disabled(section),
            });
        }
        let disabled = transitions.iter().filter(|t| t.disabled).count();
        info!(
            total = transitions.len(),
            enabled = transitions.len() - disabled,
            disabled,
            "transitions loaded"
        );
        Ok(transitions)
    }

    fn read_ports(&mut self) -> Result<(Option<PortInit>, Vec<PortSpec>)> {
        let sections = self.family("PORT_");
        let init = match (self.file.section("PORT_INIT"), sections.is_empty()) {
            (None, true) => return Ok((None, Vec::new())),
            (None, false) => {
                return Err(CompileError::MissingSection {
                    file: self.file.label().to_string(),
                    section: "PORT_INIT".into(),
                });
            }
            (Some(_), true) => {
                return Err(CompileError::MissingSection {
                    file: self.file.label().to_string(),
                    section: "PORT_1".into(),
                });
            }
            (Some(init), false) => init,
        };

        let [transport, module]: [String; 2] = self
            .required(init, &["import_type", "import_name"])?
            .try_into()
            .unwrap_or_default();
        let port_init = PortInit {
            transport: transport.trim().to_string(),
            module: module.trim().to_string(),
        };

        let mut ports: Vec<PortSpec> = Vec::new();
        for section in sections {
            let [host, port, name, direction, format, events]: [String; 6] = self
                .required(section, &["host", "port", "name", "type", "format", "events"])?
                .try_into()
                .unwrap_or_default();
            let invalid = |key: &str, value: &str, expected: &str| CompileError::InvalidValue {
                section: section.name().to_string(),
                key: key.into(),
                value: value.into(),
                expected: expected.into(),
            };
            let number = port
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid("port", &port, "a port number"))?;
            let direction = PortDirection::parse(&direction)
                .ok_or_else(|| invalid("type", &direction, PortDirection::ACCEPTED))?;
            let format = PortFormat::parse(&format)
                .ok_or_else(|| invalid("format", &format, PortFormat::ACCEPTED))?;
            let name = name.trim().to_string();
            if ports.iter().any(|p| p.name == name) {
                return Err(CompileError::DuplicateDefinition { kind: "port", name });
            }
            ports.push(PortSpec {
                section: section.name().to_string(),
                host: host.trim().to_string(),
                port: number,
                name,
                direction,
                format,
                event_filter: (!is_none_value(&events)).then(|| events.trim().to_string()),
                disabled: Self::disabled(section),
            });
        }
        info!(
            total = ports.len(),
            disabled = ports.iter().filter(|p| p.disabled).count(),
            "ports loaded"
        );
        Ok((Some(port_init), ports))
    }
}

/// Parses `text` and builds the model in one go.
pub fn build_model(
    label: &str,
    text: &str,
    base_dir: &Path,
    diag: &mut Diagnostics,
) -> Result<DesignModel> {
    let file = DesignFile::parse(label, text)?;
    ModelBuilder::new(&file, base_dir, diag).build()
}
