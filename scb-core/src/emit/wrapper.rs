//! The chart wrapper type: construction, event submission, shutdown and port plumbing.

use proc_macro2::{Ident, Literal, TokenStream};
use quote::quote;

use crate::model::{DesignModel, PortDirection};

fn has_ports(model: &DesignModel) -> bool {
    model.port_init.is_some() && model.ports.iter().any(|p| !p.disabled)
}

/// Output ports that capture a whole event group, as `(first id, last id, port)`.
fn routes(model: &DesignModel) -> Vec<(u32, u32, &str)> {
    model
        .ports
        .iter()
        .filter(|p| !p.disabled && !p.direction.is_input())
        .filter_map(|port| {
            let group = model.group(port.event_filter.as_deref()?)?;
            let first = *group.ids.first()?;
            let last = *group.ids.last()?;
            Some((first, last, port.name.as_str()))
        })
        .collect()
}

fn route_fn(model: &DesignModel) -> TokenStream {
    let arms = routes(model).into_iter().map(|(first, last, port)| {
        let first = Literal::u32_unsuffixed(first);
        let last = Literal::u32_unsuffixed(last);
        quote! { #first..=#last => Some(#port), }
    });
    quote! {
        /// Output port capturing the group of `event`, if any.
        fn route(event: EventId) -> Option<&'static str> {
            match event.0 {
                #(#arms)*
                _ => None,
            }
        }
    }
}

pub fn wrapper(model: &DesignModel, chart: &Ident) -> TokenStream {
    let name = &model.name;
    if !has_ports(model) {
        return quote! {
            pub struct #chart {
                queue: EventQueue,
            }

            impl #chart {
                pub const NAME: &'static str = #name;

                pub fn new() -> Self {
                    Self {
                        queue: EventQueue::new(EVENT_GROUPS, SUPPRESSED_EVENTS),
                    }
                }

                pub fn statechart() -> Statechart<Self> {
                    build_statechart()
                }

                pub fn send_event(&self, event: EventId, data: Option<EventData>) {
                    self.queue.push(event, data);
                }

                pub fn shutdown(&self) {
                    self.queue.close();
                }
            }

            impl Default for #chart {
                fn default() -> Self {
                    Self::new()
                }
            }
        };
    }

    let route = route_fn(model);
    let listeners = model
        .ports
        .iter()
        .filter(|p| !p.disabled && p.direction.is_input())
        .map(|port| {
            let port_name = &port.name;
            let filter = port.event_filter.as_deref().unwrap_or_default();
            if port.direction == PortDirection::Subscribe {
                quote! {
                    self.ports.subscribe(#port_name, #filter)?;
                    self.ports.listen(#port_name)?;
                }
            } else {
                quote! { self.ports.listen(#port_name)?; }
            }
        });

    quote! {
        #route

        pub struct #chart {
            queue: EventQueue,
            ports: PortSet,
        }

        impl #chart {
            pub const NAME: &'static str = #name;

            pub fn new() -> Self {
                Self {
                    queue: EventQueue::new(EVENT_GROUPS, SUPPRESSED_EVENTS),
                    ports: PortSet::new(&PORT_TRANSPORT, PORTS),
                }
            }

            pub fn statechart() -> Statechart<Self> {
                build_statechart()
            }

            /// Queues `event` locally unless an output port captures its group.
            pub fn send_event(&self, event: EventId, data: Option<EventData>) {
                match route(event) {
                    Some(port) => self.send_event_as_msg(port, event, data),
                    None => self.queue.push(event, data),
                }
            }

            pub fn send_event_as_msg(&self, port: &str, event: EventId, data: Option<EventData>) {
                if let Err(err) = self.ports.send(port, event, data) {
                    eprintln!("{}: cannot send {:?} on port {}: {}", Self::NAME, event, port, err);
                }
            }

            /// Starts listening on every input port.
            pub fn subscribe(&self) -> Result<(), PortError> {
                #(#listeners)*
                Ok(())
            }

            /// Decodes a message received on `port` and queues its event locally.
            pub fn on_port_message(&self, port: &str, message: &[u8]) -> Result<(), PortError> {
                let (event, data) = self.ports.decode(port, message)?;
                self.queue.push(event, data);
                Ok(())
            }

            pub fn shutdown(&self) {
                self.ports.close();
                self.queue.close();
            }
        }

        impl Default for #chart {
            fn default() -> Self {
                Self::new()
            }
        }
    }
}
