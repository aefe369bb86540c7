//! Event, port and callback declarations plus the `build_statechart` constructor.

use std::collections::HashMap;

use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use crate::codegen::{Callbacks, ident, tokens::event_path};
use crate::error::{CompileError, Result};
use crate::model::{DesignModel, Endpoint, StateKind, StateSpec};

/// Event group types carrying one `EventId` constant per event.
pub fn event_groups(model: &DesignModel) -> Result<TokenStream> {
    let mut items = Vec::with_capacity(model.groups.len());
    for group in &model.groups {
        let name = ident(&group.section, &group.name)?;
        let mut consts = Vec::with_capacity(group.events.len());
        for (event, id) in group.events.iter().zip(&group.ids) {
            let event = ident(&group.section, event)?;
            let id = Literal::u32_unsuffixed(*id);
            consts.push(quote! { pub const #event: EventId = EventId(#id); });
        }
        items.push(quote! {
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct #name;

            impl #name {
                #(#consts)*
            }
        });
    }
    Ok(quote! { #(#items)* })
}

/// `EVENT_GROUPS` and `SUPPRESSED_EVENTS`.
pub fn event_tables(model: &DesignModel) -> Result<TokenStream> {
    let groups = model.groups.iter().map(|group| {
        let name = &group.name;
        let base = Literal::u32_unsuffixed(group.base.unwrap_or_default());
        let events = &group.events;
        quote! {
            EventGroupInfo { name: #name, base: #base, events: &[#(#events),*] }
        }
    });
    let suppressed = model
        .suppressed
        .iter()
        .map(|event| event_path("SUPPRESS_PRINT", event))
        .collect::<Result<Vec<_>>>()?;
    Ok(quote! {
        pub const EVENT_GROUPS: &[EventGroupInfo] = &[#(#groups),*];
        pub const SUPPRESSED_EVENTS: &[EventId] = &[#(#suppressed),*];
    })
}

/// `PORT_TRANSPORT` and `PORTS`; disabled ports are left out. Empty without ports.
pub fn port_tables(model: &DesignModel) -> TokenStream {
    let Some(init) = &model.port_init else {
        return TokenStream::new();
    };
    let transport = &init.transport;
    let module = &init.module;
    let ports = model.ports.iter().filter(|p| !p.disabled).map(|port| {
        let name = &port.name;
        let host = &port.host;
        let number = Literal::u16_unsuffixed(port.port);
        let direction = format_ident!("{}", port.direction.variant_name());
        let format = format_ident!("{}", port.format.variant_name());
        let events = match &port.event_filter {
            Some(group) => quote! { Some(#group) },
            None => quote! { None },
        };
        quote! {
            PortConfig {
                name: #name,
                host: #host,
                port: #number,
                direction: PortDirection::#direction,
                format: PortFormat::#format,
                events: #events,
            }
        }
    });
    quote! {
        pub const PORT_TRANSPORT: Transport = Transport { kind: #transport, module: #module };
        pub const PORTS: &[PortConfig] = &[#(#ports),*];
    }
}

/// Every callback function, in generation order.
pub fn callback_fns(callbacks: &Callbacks, chart: &Ident) -> TokenStream {
    let fns = callbacks.units.iter().map(|unit| unit.to_tokens(chart));
    quote! { #(#fns)* }
}

/// Enabled states, parents before children, keeping declaration order otherwise.
pub fn parent_first(model: &DesignModel) -> Vec<&StateSpec> {
    let enabled: Vec<&StateSpec> = model.enabled_states().collect();
    let mut ordered: Vec<&StateSpec> = Vec::with_capacity(enabled.len());
    while ordered.len() < enabled.len() {
        let before = ordered.len();
        for state in &enabled {
            if ordered.iter().any(|s| s.name == state.name) {
                continue;
            }
            let ready = match state.parent.as_deref() {
                None => true,
                Some(parent) => ordered.iter().any(|s| s.name == parent),
            };
            if ready {
                ordered.push(state);
            }
        }
        if ordered.len() == before {
            break;
        }
    }
    ordered
}

fn kind_tokens(kind: StateKind) -> TokenStream {
    match kind {
        StateKind::Simple => quote! { StateKind::Simple },
        StateKind::Hierarchical => quote! { StateKind::Hierarchical },
        StateKind::Concurrent => quote! { StateKind::Concurrent },
        StateKind::History => quote! { StateKind::History },
    }
}

/// The `build_statechart` function wiring states and transitions to their callbacks.
pub fn build_statechart(
    model: &DesignModel,
    callbacks: &Callbacks,
    chart: &Ident,
) -> Result<TokenStream> {
    let top = format_ident!("top");
    let mut bindings: HashMap<&str, Ident> = HashMap::new();
    let mut body = Vec::new();

    for state in parent_first(model) {
        let binding = format_ident!("st_{}", ident(&state.section, &state.name)?);
        let parent = match state.parent.as_deref() {
            None => &top,
            Some(parent) => bindings.get(parent).ok_or_else(|| missing("parent state", parent))?,
        };
        let hooks = callbacks
            .states
            .get(&state.name)
            .ok_or_else(|| missing("state callbacks", &state.name))?;
        let name = &state.name;
        let kind = kind_tokens(state.kind);
        let entry = hooks.entry.to_tokens();
        let during = hooks.during.to_tokens();
        let exit = hooks.exit.to_tokens();
        body.push(quote! {
            let #binding = sc.add_state(#parent, #name, #kind, #entry, #during, #exit);
        });
        bindings.insert(name.as_str(), binding);
    }

    // Start pseudo-states, one per parent, declared on first use.
    let mut starts: HashMap<Option<&str>, Ident> = HashMap::new();
    let end_binding = format_ident!("end");
    let mut end_declared = false;

    for transition in model.enabled_transitions() {
        let source = match &transition.start {
            Endpoint::Start => {
                let target = transition
                    .end
                    .state()
                    .and_then(|name| model.state(name))
                    .ok_or_else(|| missing("state", transition.end.label()))?;
                let parent = target.parent.as_deref();
                if !starts.contains_key(&parent) {
                    let (binding, owner) = match parent {
                        None => (format_ident!("start_top"), top.clone()),
                        Some(parent) => (
                            format_ident!("start_{}", ident(&transition.name, parent)?),
                            bindings
                                .get(parent)
                                .cloned()
                                .ok_or_else(|| missing("parent state", parent))?,
                        ),
                    };
                    body.push(quote! { let #binding = sc.start_state(#owner); });
                    starts.insert(parent, binding);
                }
                starts
                    .get(&parent)
                    .cloned()
                    .ok_or_else(|| missing("start state", transition.end.label()))?
            }
            endpoint => endpoint_binding(endpoint, &bindings, &end_binding)?,
        };

        if transition.end == Endpoint::End && !end_declared {
            body.push(quote! { let #end_binding = sc.end_state(); });
            end_declared = true;
        }
        let target = endpoint_binding(&transition.end, &bindings, &end_binding)?;

        let event = match &transition.event {
            Some(event) => {
                let path = event_path(&transition.name, event)?;
                quote! { Some(#path) }
            }
            None => quote! { None },
        };
        let hooks = callbacks
            .transitions
            .get(&transition.name)
            .ok_or_else(|| missing("transition callbacks", &transition.name))?;
        let guard = hooks.guard.to_tokens();
        let action = hooks.action.to_tokens();
        body.push(quote! {
            sc.add_transition(#source, #target, #event, #guard, #action);
        });
    }

    Ok(quote! {
        pub fn build_statechart() -> Statechart<#chart> {
            let mut sc = Statechart::new(#chart::NAME);
            let #top = sc.root();
            #(#body)*
            sc
        }
    })
}

fn endpoint_binding(
    endpoint: &Endpoint,
    bindings: &HashMap<&str, Ident>,
    end: &Ident,
) -> Result<Ident> {
    match endpoint {
        Endpoint::End => Ok(end.clone()),
        Endpoint::State(name) => bindings
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| missing("state", name)),
        Endpoint::Start => Err(missing("state", endpoint.label())),
    }
}

fn missing(kind: &'static str, reference: &str) -> CompileError {
    CompileError::UnresolvedReference {
        context: "build_statechart".into(),
        kind,
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CallbackGenerator;
    use crate::diagnostics::Diagnostics;
    use crate::test_support::DesignText;
    use crate::validate::Validator;

    fn prepare(design: &DesignText) -> (DesignModel, Callbacks) {
        let mut diag = Diagnostics::new();
        let mut validator = Validator::new(design.model(), &mut diag);
        validator.allocate_event_ids().unwrap();
        validator.resolve_suppressed().unwrap();
        validator.check_transitions().unwrap();
        let model = validator.into_model();
        let mut generator = CallbackGenerator::new(&model, &mut diag);
        generator.generate_state_hooks().unwrap();
        generator.generate_transition_hooks().unwrap();
        let callbacks = generator.finish();
        (model, callbacks)
    }

    fn nested() -> DesignText {
        DesignText::new("Chart")
            .events("Evt", Some(10), &["go", "stop"])
            .state("Leaf", "Busy", "State")
            .state("Idle", "None", "State")
            .state("Busy", "None", "HierarchicalState")
            .transition("Start", "Idle", "None")
            .transition("Start", "Leaf", "None")
            .transition("Idle", "Busy", "Evt.go")
            .transition("Busy", "End", "stop")
            .raw("[SUPPRESS_PRINT]\nevent_1 = Evt.stop\n")
    }

    #[test]
    fn event_constants_use_allocated_ids() {
        let (model, _) = prepare(&nested());
        let expected = quote! {
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct Evt;

            impl Evt {
                pub const go: EventId = EventId(10);
                pub const stop: EventId = EventId(11);
            }
        };
        assert_eq!(event_groups(&model).unwrap().to_string(), expected.to_string());

        let tables = event_tables(&model).unwrap().to_string();
        assert!(tables.contains(&quote! { &[Evt::stop] }.to_string()));
    }

    #[test]
    fn parents_are_declared_before_children() {
        let (model, _) = prepare(&nested());
        let names: Vec<&str> = parent_first(&model).iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Idle", "Busy", "Leaf"]);
    }

    #[test]
    fn build_statechart_wires_everything_once() {
        let (model, callbacks) = prepare(&nested());
        let chart = format_ident!("Chart");
        let code = build_statechart(&model, &callbacks, &chart).unwrap().to_string();

        assert_eq!(code.matches("add_state").count(), 3);
        assert_eq!(code.matches("add_transition").count(), 4);
        assert_eq!(code.matches("start_state").count(), 2);
        assert_eq!(code.matches("end_state").count(), 1);
        let leaf = quote! {
            let st_Leaf = sc.add_state(st_Busy, "Leaf", StateKind::Simple, do_nothing, do_nothing, do_nothing);
        };
        assert!(code.contains(&leaf.to_string()));
        let to_end = quote! {
            sc.add_transition(st_Busy, end, Some(Evt::stop), always_true, do_nothing);
        };
        assert!(code.contains(&to_end.to_string()));
    }

    #[test]
    fn concurrent_regions_share_one_start() {
        let design = DesignText::new("Chart")
            .state("C", "None", "ConcurrentState")
            .state("A", "C", "State")
            .state("B", "C", "State")
            .transition("Start", "C", "None")
            .transition("Start", "A", "None")
            .transition("Start", "B", "None");
        let (model, callbacks) = prepare(&design);
        let code = build_statechart(&model, &callbacks, &format_ident!("Chart"))
            .unwrap()
            .to_string();

        let start_c = quote! { let start_C = sc.start_state(st_C); };
        assert_eq!(code.matches(&start_c.to_string()).count(), 1);
        assert_eq!(code.matches("start_state").count(), 2);
        for target in ["st_A", "st_B"] {
            let target = format_ident!("{target}");
            let wired = quote! {
                sc.add_transition(start_C, #target, None, always_true, do_nothing);
            };
            assert!(code.contains(&wired.to_string()));
        }
    }

    #[test]
    fn ports_are_tabulated() {
        let design = DesignText::new("Chart").raw(
            "[PORT_INIT]\nimport_type = zmq\nimport_name = transport\n\n[PORT_1]\nhost = localhost\nport = 6000\nname = out\ntype = push\nformat = JsonData\nevents = None\n",
        );
        let tables = port_tables(&design.model()).to_string();
        let expected = quote! {
            PortConfig {
                name: "out",
                host: "localhost",
                port: 6000,
                direction: PortDirection::Push,
                format: PortFormat::JsonData,
                events: None,
            }
        };
        assert!(tables.contains(&expected.to_string()));
        assert!(port_tables(&DesignText::new("Chart").model()).is_empty());
    }
}
