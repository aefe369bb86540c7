//! Callback generation.
//!
//! Every entry, do, exit, guard and action field of an enabled state or transition turns
//! into a reference to a generated function. Names are generated once: the first use
//! produces the body, later uses only reference it. Passes run field by field (all entry
//! hooks, then all do hooks, then exit hooks, guards and actions), which fixes the order of
//! the emitted functions.

pub mod overrides;
pub mod tokens;

use std::collections::HashMap;

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use tracing::debug;

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{CompileError, Result};
use crate::model::{Callback, DesignModel, StateSpec, TransitionSpec, strip_call_parens};
use tokens::{TokenKind, classify, event_data, event_path, literal_statements, split_tokens};

/// Shared stub for absent entry, do, exit and action fields.
pub const DO_NOTHING: &str = "do_nothing";
/// Shared stub for absent guards.
pub const ALWAYS_TRUE: &str = "always_true";

/// Parses `text` as a Rust identifier, reporting `section` when it isn't one.
pub(crate) fn ident(section: &str, text: &str) -> Result<Ident> {
    syn::parse_str::<Ident>(text.trim()).map_err(|_| CompileError::InvalidIdentifier {
        section: section.to_string(),
        value: text.trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Action,
    Guard,
}

impl CallbackKind {
    /// Marker attribute used in override files.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Guard => "guard",
        }
    }
}

/// How a state or transition field names its callback in `build_statechart`.
#[derive(Debug, Clone, PartialEq)]
pub enum HookRef {
    Named(String),
    /// A runtime-provided guard such as `CountingGuard(3)`, passed through as written.
    Builtin(syn::Expr),
}

impl HookRef {
    pub fn to_tokens(&self) -> TokenStream {
        match self {
            Self::Named(name) => {
                let name = format_ident!("{}", name);
                quote! { #name }
            }
            Self::Builtin(expr) => quote! { #expr },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateHooks {
    pub entry: HookRef,
    pub during: HookRef,
    pub exit: HookRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionHooks {
    pub guard: HookRef,
    pub action: HookRef,
}

/// One generated function.
#[derive(Debug, Clone)]
pub struct CallbackUnit {
    pub name: String,
    pub kind: CallbackKind,
    body: Vec<TokenStream>,
    replacement: Option<syn::ItemFn>,
}

impl CallbackUnit {
    fn new(name: String, kind: CallbackKind, body: Vec<TokenStream>) -> Self {
        Self {
            name,
            kind,
            body,
            replacement: None,
        }
    }

    pub fn is_overridden(&self) -> bool {
        self.replacement.is_some()
    }

    pub(crate) fn replace(&mut self, item: syn::ItemFn) {
        self.replacement = Some(item);
    }

    /// The generated function, or the override when one was merged.
    pub fn to_tokens(&self, chart: &Ident) -> TokenStream {
        match &self.replacement {
            Some(item) => quote! { #item },
            None => self.generated(chart),
        }
    }

    /// The generated function carrying its override marker, as written to a callbacks file.
    pub fn to_marked_tokens(&self, chart: &Ident) -> TokenStream {
        let marker = format_ident!("{}", self.kind.marker());
        let item = self.generated(chart);
        quote! {
            #[#marker]
            #item
        }
    }

    fn generated(&self, chart: &Ident) -> TokenStream {
        let name = format_ident!("{}", self.name);
        let body = &self.body;
        match self.kind {
            CallbackKind::Action => quote! {
                pub fn #name(param: &mut #chart) {
                    #(#body)*
                }
            },
            CallbackKind::Guard => quote! {
                pub fn #name(param: &#chart) -> bool {
                    #(#body)*
                    true
                }
            },
        }
    }
}

/// Everything the declaration emitter needs from the callback passes.
#[derive(Debug, Clone, Default)]
pub struct Callbacks {
    pub units: Vec<CallbackUnit>,
    pub states: HashMap<String, StateHooks>,
    pub transitions: HashMap<String, TransitionHooks>,
}

impl Callbacks {
    pub fn unit(&self, name: &str) -> Option<&CallbackUnit> {
        self.units.iter().find(|u| u.name == name)
    }
}

#[derive(Clone, Copy)]
enum Site<'a> {
    State(&'a StateSpec),
    Transition(&'a TransitionSpec),
}

impl Site<'_> {
    fn context(&self) -> &str {
        match self {
            Self::State(state) => &state.section,
            Self::Transition(transition) => &transition.name,
        }
    }

    fn trace(&self) -> String {
        match self {
            Self::State(state) => format!("-> {}", state.name),
            Self::Transition(t) => format!("{} -> {}", t.start.label(), t.end.label()),
        }
    }
}

pub struct CallbackGenerator<'m, 'd> {
    model: &'m DesignModel,
    diag: &'d mut Diagnostics,
    /// Every name generated so far and its kind.
    kinds: HashMap<String, CallbackKind>,
    out: Callbacks,
}

impl<'m, 'd> CallbackGenerator<'m, 'd> {
    pub fn new(model: &'m DesignModel, diag: &'d mut Diagnostics) -> Self {
        Self::resume(model, diag, Callbacks::default())
    }

    /// Continues from the output of an earlier pass, keeping its names and kinds.
    pub fn resume(
        model: &'m DesignModel,
        diag: &'d mut Diagnostics,
        previous: Callbacks,
    ) -> Self {
        let kinds = previous
            .units
            .iter()
            .map(|unit| (unit.name.clone(), unit.kind))
            .collect();
        Self {
            model,
            diag,
            kinds,
            out: previous,
        }
    }

    /// Entry hooks of every enabled state, then do hooks, then exit hooks.
    pub fn generate_state_hooks(&mut self) -> Result<()> {
        let model = self.model;
        let states: Vec<&StateSpec> = model.enabled_states().collect();
        let mut fields: [Vec<HookRef>; 3] = Default::default();
        for (field, slot) in fields.iter_mut().enumerate() {
            for state in &states {
                let callback = match field {
                    0 => &state.entry,
                    1 => &state.during,
                    _ => &state.exit,
                };
                slot.push(self.reference(callback, CallbackKind::Action, Site::State(state))?);
            }
        }

        let [entries, during, exits] = fields;
        for (((state, entry), during), exit) in states.iter().zip(entries).zip(during).zip(exits) {
            self.out.states.insert(
                state.name.clone(),
                StateHooks {
                    entry,
                    during,
                    exit,
                },
            );
        }
        debug!(states = states.len(), callbacks = self.out.units.len(), "state hooks generated");
        Ok(())
    }

    /// Guards of every enabled transition, then actions.
    pub fn generate_transition_hooks(&mut self) -> Result<()> {
        let model = self.model;
        let transitions: Vec<&TransitionSpec> = model.enabled_transitions().collect();
        let mut guards = Vec::with_capacity(transitions.len());
        for transition in &transitions {
            guards.push(self.reference(
                &transition.guard,
                CallbackKind::Guard,
                Site::Transition(transition),
            )?);
        }
        let mut actions = Vec::with_capacity(transitions.len());
        for transition in &transitions {
            actions.push(self.reference(
                &transition.action,
                CallbackKind::Action,
                Site::Transition(transition),
            )?);
        }

        for ((transition, guard), action) in transitions.iter().zip(guards).zip(actions) {
            self.out
                .transitions
                .insert(transition.name.clone(), TransitionHooks { guard, action });
        }
        debug!(
            transitions = transitions.len(),
            callbacks = self.out.units.len(),
            "transition hooks generated"
        );
        Ok(())
    }

    pub fn finish(self) -> Callbacks {
        self.out
    }

    fn reference(
        &mut self,
        callback: &Callback,
        kind: CallbackKind,
        site: Site<'_>,
    ) -> Result<HookRef> {
        match callback {
            Callback::Absent => self.absent(kind, site),
            Callback::BareRef(text) => self.bare(text, kind, site),
            Callback::Structured { name, args } => self.structured(name, args, kind, site),
        }
    }

    fn absent(&mut self, kind: CallbackKind, site: Site<'_>) -> Result<HookRef> {
        match (kind, site) {
            (CallbackKind::Action, Site::Transition(t)) if self.model.options.debug => {
                self.stub(&format!("trace_{}", t.name), kind, site, true)
            }
            (CallbackKind::Action, _) => self.stub(DO_NOTHING, kind, site, false),
            (CallbackKind::Guard, _) => self.stub(ALWAYS_TRUE, kind, site, false),
        }
    }

    fn bare(&mut self, text: &str, kind: CallbackKind, site: Site<'_>) -> Result<HookRef> {
        let name = strip_call_parens(text);
        // Only guards may name a runtime built-in with arguments; anything else falls
        // through to the identifier check.
        if kind == CallbackKind::Guard && name.contains('(') {
            let expr = syn::parse_str::<syn::Expr>(name).map_err(|_| {
                CompileError::InvalidIdentifier {
                    section: site.context().to_string(),
                    value: name.to_string(),
                }
            })?;
            return Ok(HookRef::Builtin(expr));
        }
        let debug = self.model.options.debug;
        self.stub(name, kind, site, debug)
    }

    /// Declares a body-less function once; later uses just reference it.
    fn stub(
        &mut self,
        name: &str,
        kind: CallbackKind,
        site: Site<'_>,
        trace: bool,
    ) -> Result<HookRef> {
        ident(site.context(), name)?;
        if self.declare(name, kind)? {
            let body = if trace {
                let line = site.trace();
                vec![quote! { println!("{}", #line); }]
            } else {
                Vec::new()
            };
            self.out
                .units
                .push(CallbackUnit::new(name.to_string(), kind, body));
        }
        Ok(HookRef::Named(name.to_string()))
    }

    fn structured(
        &mut self,
        name: &str,
        args: &[String],
        kind: CallbackKind,
        site: Site<'_>,
    ) -> Result<HookRef> {
        ident(site.context(), name)?;
        if !self.declare(name, kind)? {
            if !args.is_empty() {
                self.diag.warn(
                    WarningKind::DesignSmell,
                    format!(
                        "{}: callback {name} is already generated, its arguments here are ignored",
                        site.context()
                    ),
                );
            }
            return Ok(HookRef::Named(name.to_string()));
        }
        let body = self.structured_body(name, args, site.context())?;
        self.out
            .units
            .push(CallbackUnit::new(name.to_string(), kind, body));
        Ok(HookRef::Named(name.to_string()))
    }

    /// Records `name` with `kind`. Returns true the first time the name is seen.
    fn declare(&mut self, name: &str, kind: CallbackKind) -> Result<bool> {
        match self.kinds.get(name) {
            Some(existing) if *existing != kind => Err(CompileError::CallbackKindConflict {
                name: name.to_string(),
            }),
            Some(_) => Ok(false),
            None => {
                self.kinds.insert(name.to_string(), kind);
                Ok(true)
            }
        }
    }

    fn structured_body(
        &mut self,
        name: &str,
        args: &[String],
        context: &str,
    ) -> Result<Vec<TokenStream>> {
        let model = self.model;
        let tokens = split_tokens(model, context, args)?;
        // A callback named after a port sends through it.
        let mut port = model
            .port(name)
            .filter(|p| !p.disabled)
            .map(|p| p.name.clone());
        let mut explicit_port = false;
        let mut body = Vec::new();

        let mut idx = 0;
        while idx < tokens.len() {
            let token = &tokens[idx];
            match classify(model, context, token)? {
                TokenKind::Event {
                    qualified,
                    rewritten,
                } => {
                    if rewritten {
                        self.diag.warn(
                            WarningKind::AutoQualifiedEvent,
                            format!("{context}: event {token} resolved to {qualified}"),
                        );
                    }
                    let event = event_path(context, &qualified)?;
                    let data = event_data(&tokens[idx + 1..]);
                    body.push(match port.take() {
                        Some(port) => quote! { param.send_event_as_msg(#port, #event, #data); },
                        None => quote! { param.send_event(#event, #data); },
                    });
                    explicit_port = false;
                    break;
                }
                TokenKind::Port(via) => {
                    port = Some(via);
                    explicit_port = true;
                }
                TokenKind::Literal => {
                    let limit = model.options.limit_actions;
                    for stmt in literal_statements(name, token, limit, self.diag)? {
                        body.push(quote! { #stmt });
                    }
                }
            }
            idx += 1;
        }

        if let Some(port) = port.filter(|_| explicit_port) {
            return Err(CompileError::UnresolvedReference {
                context: context.to_string(),
                kind: "event to send on port",
                reference: port,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::test_support::DesignText;
    use crate::validate::Validator;

    fn validated(design: &DesignText) -> DesignModel {
        let mut diag = Diagnostics::new();
        let mut validator = Validator::new(design.model(), &mut diag);
        validator.allocate_event_ids().expect("ids");
        validator.check_transitions().expect("transitions");
        validator.into_model()
    }

    fn generate(model: &DesignModel) -> (Result<Callbacks>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let mut generator = CallbackGenerator::new(model, &mut diag);
        let result = generator
            .generate_state_hooks()
            .and_then(|()| generator.generate_transition_hooks())
            .map(|()| generator.finish());
        (result, diag)
    }

    fn chart() -> Ident {
        format_ident!("Chart")
    }

    fn render(callbacks: &Callbacks, name: &str) -> String {
        callbacks
            .unit(name)
            .unwrap_or_else(|| panic!("no callback {name}"))
            .to_tokens(&chart())
            .to_string()
    }

    #[test]
    fn structured_entry_sends_event_with_data() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state_with("Idle", "None", "State", ["[doThing(), Evt.go, extra]", "None", "None"])
            .transition("Start", "Idle", "None");
        let model = validated(&design);
        let (callbacks, diag) = generate(&model);
        let callbacks = callbacks.unwrap();

        let expected = quote! {
            pub fn doThing(param: &mut Chart) {
                param.send_event(Evt::go, Some(EventData::from(extra)));
            }
        };
        assert_eq!(render(&callbacks, "doThing"), expected.to_string());
        assert!(diag.is_empty());
        assert_eq!(
            callbacks.states["Idle"].entry,
            HookRef::Named("doThing".into())
        );
    }

    #[test]
    fn absent_fields_share_stubs() {
        let design = DesignText::new("Chart")
            .state("A", "None", "State")
            .state("B", "None", "State")
            .transition("Start", "A", "None");
        let model = validated(&design);
        let callbacks = generate(&model).0.unwrap();

        let names: Vec<&str> = callbacks.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, [DO_NOTHING, ALWAYS_TRUE]);
        assert_eq!(
            render(&callbacks, ALWAYS_TRUE),
            quote! { pub fn always_true(param: &Chart) -> bool { true } }.to_string()
        );
    }

    #[test]
    fn debug_traces_absent_transition_actions() {
        let design = DesignText::new("Chart")
            .option("debug", "True")
            .events("Evt", Some(1), &["go"])
            .state("A", "None", "State")
            .state("B", "None", "State")
            .transition("Start", "A", "None")
            .transition("A", "B", "Evt.go");
        let model = validated(&design);
        let callbacks = generate(&model).0.unwrap();

        assert_eq!(
            callbacks.transitions["TRANSITION_2"].action,
            HookRef::Named("trace_TRANSITION_2".into())
        );
        assert_eq!(
            render(&callbacks, "trace_TRANSITION_2"),
            quote! { pub fn trace_TRANSITION_2(param: &mut Chart) { println!("{}", "A -> B"); } }
                .to_string()
        );
    }

    #[test]
    fn functions_follow_field_order() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state_with("A", "None", "State", ["enterA", "None", "leaveA"])
            .state_with("B", "None", "State", ["enterB", "whileB", "None"])
            .transition_with("Start", "A", "None", "None", "boot")
            .transition_with("A", "B", "Evt.go", "ready", "None");
        let model = validated(&design);
        let callbacks = generate(&model).0.unwrap();

        let names: Vec<&str> = callbacks.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            ["enterA", "enterB", DO_NOTHING, "whileB", "leaveA", ALWAYS_TRUE, "ready", "boot"]
        );
    }

    #[test]
    fn reuse_of_a_structured_name_warns() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state_with("A", "None", "State", ["[notify(), Evt.go]", "None", "None"])
            .state_with("B", "None", "State", ["[notify(), Evt.go, 1]", "None", "None"])
            .transition("Start", "A", "None");
        let model = validated(&design);
        let (callbacks, diag) = generate(&model);
        assert_eq!(callbacks.unwrap().units.iter().filter(|u| u.name == "notify").count(), 1);
        assert_eq!(diag.count_of(WarningKind::DesignSmell), 1);
    }

    #[test]
    fn guard_and_action_with_one_name_conflict() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state_with("A", "None", "State", ["check", "None", "None"])
            .state("B", "None", "State")
            .transition("Start", "A", "None")
            .transition_with("A", "B", "Evt.go", "check", "None");
        let model = validated(&design);
        let err = generate(&model).0.unwrap_err();
        assert!(matches!(err, CompileError::CallbackKindConflict { name } if name == "check"));
    }

    #[test]
    fn builtin_guards_pass_through() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state("A", "None", "State")
            .transition("Start", "A", "None")
            .transition_with("A", "A", "Evt.go", "CountingGuard(3)", "None");
        let model = validated(&design);
        let callbacks = generate(&model).0.unwrap();
        let guard = &callbacks.transitions["TRANSITION_2"].guard;
        assert_eq!(guard.to_tokens().to_string(), quote! { CountingGuard(3) }.to_string());
        assert!(callbacks.unit("CountingGuard").is_none());
    }

    #[test]
    fn actions_cannot_name_builtins() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state("A", "None", "State")
            .transition("Start", "A", "None")
            .transition_with("A", "A", "Evt.go", "None", "Blink(3)");
        let model = validated(&design);
        match generate(&model).0.unwrap_err() {
            CompileError::InvalidIdentifier { section, value } => {
                assert_eq!(section, "TRANSITION_2");
                assert_eq!(value, "Blink(3)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ambiguous_event_in_structured_callback_is_fatal() {
        let design = DesignText::new("Lamp")
            .events("Evt", Some(1), &["go"])
            .events("Other", Some(5), &["go"])
            .state_with("A", "None", "State", ["[notify(), go]", "None", "None"])
            .transition("Start", "A", "None");
        let model = validated(&design);
        let (result, diag) = generate(&model);
        let err = result.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::AmbiguousReference);
        assert_eq!(diag.count_of(WarningKind::EmbeddedCode), 0);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let design = DesignText::new("Chart")
            .state_with("A", "None", "State", ["fn", "None", "None"])
            .transition("Start", "A", "None");
        let model = validated(&design);
        let err = generate(&model).0.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MissingKey);
        assert_eq!(err.to_string(), CompileError::InvalidIdentifier {
            section: "STATE_1".into(),
            value: "fn".into(),
        }
        .to_string());
    }

    #[test]
    fn callback_named_after_a_port_sends_through_it() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state_with("A", "None", "State", ["[out(), Evt.go]", "None", "None"])
            .transition("Start", "A", "None")
            .raw("[PORT_INIT]\nimport_type = zmq\nimport_name = transport\n\n[PORT_1]\nhost = localhost\nport = 6000\nname = out\ntype = push\nformat = AnyEvent\nevents = Evt\n");
        let model = validated(&design);
        let callbacks = generate(&model).0.unwrap();
        assert_eq!(
            render(&callbacks, "out"),
            quote! { pub fn out(param: &mut Chart) { param.send_event_as_msg("out", Evt::go, None); } }
                .to_string()
        );
    }

    #[test]
    fn port_without_event_is_rejected() {
        let design = DesignText::new("Chart")
            .events("Evt", Some(1), &["go"])
            .state_with("A", "None", "State", ["[relay(), out]", "None", "None"])
            .transition("Start", "A", "None")
            .raw("[PORT_INIT]\nimport_type = zmq\nimport_name = transport\n\n[PORT_1]\nhost = localhost\nport = 6000\nname = out\ntype = push\nformat = AnyEvent\nevents = Evt\n");
        let model = validated(&design);
        let err = generate(&model).0.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnresolvedReference);
    }

    #[test]
    fn marked_tokens_carry_the_marker() {
        let unit = CallbackUnit::new("ready".into(), CallbackKind::Guard, Vec::new());
        let expected = quote! {
            #[guard]
            pub fn ready(param: &Chart) -> bool { true }
        };
        assert_eq!(unit.to_marked_tokens(&chart()).to_string(), expected.to_string());
    }
}
