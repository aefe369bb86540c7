//! The in-memory design model.
//!
//! Built once by [`crate::builder`], then owned and mutated by the validator (id allocation,
//! event qualification, cascading disables) and finally read by the code generator.

use crate::config::DesignOptions;

/// Parent value marking a top-level state; also the "absent" marker for optional fields.
pub const NONE_SENTINEL: &str = "None";

pub(crate) fn is_none_value(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == NONE_SENTINEL
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum StateKind {
    Simple,
    Hierarchical,
    Concurrent,
    History,
}

impl StateKind {
    pub const ACCEPTED: &'static str =
        "State, HierarchicalState, ConcurrentState or HistoryState";

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "State" | "Simple" | "SimpleState" => Some(Self::Simple),
            "HierarchicalState" | "Hierarchical" => Some(Self::Hierarchical),
            "ConcurrentState" | "Concurrent" => Some(Self::Concurrent),
            "HistoryState" | "History" => Some(Self::History),
            _ => None,
        }
    }

    pub fn is_composite(self) -> bool {
        matches!(self, Self::Hierarchical | Self::Concurrent)
    }
}

/// Shape of an entry/do/exit/guard/action field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum Callback {
    Absent,
    /// `name` or `name()`; kept verbatim so built-in calls like `CountingGuard(3)` survive.
    BareRef(String),
    /// `[name(), piece; piece, ...]`; `args` holds the `;`-separated pieces after the name.
    Structured { name: String, args: Vec<String> },
}

impl Callback {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if is_none_value(text) {
            return Self::Absent;
        }
        let Some(body) = text.strip_prefix('[') else {
            return Self::BareRef(text.to_string());
        };
        let body = body.strip_suffix(']').unwrap_or(body).replace('\n', " ");
        let (head, rest) = match body.find(',') {
            Some(idx) => (&body[..idx], &body[idx + 1..]),
            None => (body.as_str(), ""),
        };
        let args = rest
            .split(';')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect();
        Self::Structured {
            name: strip_call_parens(head.trim()).to_string(),
            args,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// `doThing()` -> `doThing`; anything else is returned unchanged.
pub(crate) fn strip_call_parens(text: &str) -> &str {
    text.strip_suffix("()").unwrap_or(text).trim()
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct StateSpec {
    /// Section the state was read from.
    pub section: String,
    pub name: String,
    /// `None` for top-level states.
    pub parent: Option<String>,
    pub kind: StateKind,
    pub entry: Callback,
    /// The `do` hook.
    pub during: Callback,
    pub exit: Callback,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct EventGroup {
    pub section: String,
    pub name: String,
    pub base: Option<u32>,
    pub events: Vec<String>,
    /// Filled by id allocation, parallel to `events`.
    pub ids: Vec<u32>,
}

impl EventGroup {
    /// One past the last id of the group, once a base is known.
    pub fn end(&self) -> Option<u32> {
        self.base.map(|base| base.saturating_add(self.len()))
    }

    pub fn len(&self) -> u32 {
        u32::try_from(self.events.len()).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

/// A transition endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum Endpoint {
    Start,
    End,
    State(String),
}

impl Endpoint {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case("start") {
            Self::Start
        } else if text.eq_ignore_ascii_case("end") {
            Self::End
        } else {
            Self::State(text.to_string())
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            Self::State(name) => Some(name),
            Self::Start | Self::End => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Start => "Start",
            Self::End => "End",
            Self::State(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct TransitionSpec {
    /// Section identifier, e.g. `TRANSITION_3`.
    pub name: String,
    pub start: Endpoint,
    pub end: Endpoint,
    /// `Group.event` after validation; possibly unqualified before.
    pub event: Option<String>,
    pub guard: Callback,
    pub action: Callback,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum PortDirection {
    Reply,
    Pull,
    Subscribe,
    Request,
    Push,
    Publish,
}

impl PortDirection {
    pub const ACCEPTED: &'static str = "reply, pull, subscribe, request, push or publish";

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "reply" => Some(Self::Reply),
            "pull" => Some(Self::Pull),
            "subscribe" => Some(Self::Subscribe),
            "request" => Some(Self::Request),
            "push" => Some(Self::Push),
            "publish" => Some(Self::Publish),
            _ => None,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Self::Reply | Self::Pull | Self::Subscribe)
    }

    pub fn variant_name(self) -> &'static str {
        match self {
            Self::Reply => "Reply",
            Self::Pull => "Pull",
            Self::Subscribe => "Subscribe",
            Self::Request => "Request",
            Self::Push => "Push",
            Self::Publish => "Publish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum PortFormat {
    AnyEvent,
    JsonData,
    YamlData,
}

impl PortFormat {
    pub const ACCEPTED: &'static str = "AnyEvent, JsonData or YamlData";

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "AnyEvent" => Some(Self::AnyEvent),
            "JsonData" => Some(Self::JsonData),
            "YamlData" => Some(Self::YamlData),
            _ => None,
        }
    }

    pub fn variant_name(self) -> &'static str {
        match self {
            Self::AnyEvent => "AnyEvent",
            Self::JsonData => "JsonData",
            Self::YamlData => "YamlData",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct PortSpec {
    pub section: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub direction: PortDirection,
    pub format: PortFormat,
    /// Event group allowed on the port; `None` means any.
    pub event_filter: Option<String>,
    pub disabled: bool,
}

/// The `PORT_INIT` section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct PortInit {
    pub transport: String,
    pub module: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct DesignModel {
    /// Statechart name, used for the generated wrapper type.
    pub name: String,
    pub options: DesignOptions,
    /// Initializer source lines, inline lines first.
    pub initial: Vec<String>,
    pub states: Vec<StateSpec>,
    pub groups: Vec<EventGroup>,
    /// Qualified after validation.
    pub suppressed: Vec<String>,
    pub transitions: Vec<TransitionSpec>,
    pub port_init: Option<PortInit>,
    pub ports: Vec<PortSpec>,
}

impl DesignModel {
    pub fn state(&self, name: &str) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.name == name)
    }

    /// An enabled state by name.
    pub fn enabled_state(&self, name: &str) -> Option<&StateSpec> {
        self.state(name).filter(|s| !s.disabled)
    }

    pub fn enabled_states(&self) -> impl Iterator<Item = &StateSpec> {
        self.states.iter().filter(|s| !s.disabled)
    }

    pub fn enabled_transitions(&self) -> impl Iterator<Item = &TransitionSpec> {
        self.transitions.iter().filter(|t| !t.disabled)
    }

    pub fn group(&self, name: &str) -> Option<&EventGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn port(&self, name: &str) -> Option<&PortSpec> {
        self.ports.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_shapes() {
        assert_eq!(Callback::parse("None"), Callback::Absent);
        assert_eq!(Callback::parse("  "), Callback::Absent);
        assert_eq!(
            Callback::parse("doThing()"),
            Callback::BareRef("doThing()".into())
        );
        assert_eq!(
            Callback::parse("[doThing(), Evt.go, extra]"),
            Callback::Structured {
                name: "doThing".into(),
                args: vec!["Evt.go, extra".into()],
            }
        );
        assert_eq!(
            Callback::parse("[tick(), count += 1; println!(\"{}\", count)]"),
            Callback::Structured {
                name: "tick".into(),
                args: vec!["count += 1".into(), "println!(\"{}\", count)".into()],
            }
        );
        assert_eq!(
            Callback::parse("[solo]"),
            Callback::Structured {
                name: "solo".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn endpoints_are_case_insensitive() {
        assert_eq!(Endpoint::parse("start"), Endpoint::Start);
        assert_eq!(Endpoint::parse("End"), Endpoint::End);
        assert_eq!(Endpoint::parse("Idle"), Endpoint::State("Idle".into()));
    }

    #[test]
    fn state_kinds_accept_both_spellings() {
        assert_eq!(StateKind::parse("State"), Some(StateKind::Simple));
        assert_eq!(
            StateKind::parse("ConcurrentState"),
            Some(StateKind::Concurrent)
        );
        assert_eq!(
            StateKind::parse("Hierarchical"),
            Some(StateKind::Hierarchical)
        );
        assert_eq!(StateKind::parse("Parallel"), None);
        assert!(StateKind::Concurrent.is_composite());
        assert!(!StateKind::History.is_composite());
    }

    #[test]
    fn group_ids_follow_events() {
        let group = EventGroup {
            section: "EVENTS_1".into(),
            name: "Evt".into(),
            base: Some(10),
            events: vec!["go".into(), "stop".into()],
            ids: vec![10, 11],
        };
        assert_eq!(group.end(), Some(12));
        assert!(group.contains("stop"));
        assert!(!group.contains("missing"));
    }
}
