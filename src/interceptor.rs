//! The interceptor: configuration plus both installation strategies.

use std::sync::Arc;

use crate::gate::{Gate, GateOutcome, check_fail_open};
use crate::registry::{self, GateMap};
use crate::target::{EventContext, EventTarget, Listener, RegisterFn, RegisterRequest};

/// Registration method name assumed when the builder is not told otherwise.
pub const DEFAULT_METHOD_NAME: &str = "add_event_listener";

/// Which event names the method strategy gates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventSelection {
    /// Nothing selected: the method strategy installs nothing.
    #[default]
    None,
    /// A single event name.
    Single(String),
    /// An ordered collection of event names.
    Ordered(Vec<String>),
}

impl From<&str> for EventSelection {
    fn from(name: &str) -> Self {
        EventSelection::Single(name.to_string())
    }
}

impl From<String> for EventSelection {
    fn from(name: String) -> Self {
        EventSelection::Single(name)
    }
}

impl From<Vec<String>> for EventSelection {
    fn from(names: Vec<String>) -> Self {
        EventSelection::Ordered(names)
    }
}

impl<const N: usize> From<[&str; N]> for EventSelection {
    fn from(names: [&str; N]) -> Self {
        EventSelection::Ordered(names.iter().map(|name| name.to_string()).collect())
    }
}

/// Installation errors.
///
/// These face the instrumentation author only. Code registering listeners
/// through the target never sees an error from the interception layer; from
/// its point of view the registration API is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Target has no handler slot named '{name}'")]
    MissingSlot { name: String },

    #[error("Target has no registration method named '{name}'")]
    MissingMethod { name: String },
}

/// Intercepts listener registration on one target object.
///
/// Configured once per target with the names of the registration entry
/// points to intercept and the gate to run in front of them;
/// [`install`](Self::install) activates whichever of the two strategies are
/// configured. Installs are idempotent and additive: the registration method
/// is wrapped at most once per (target, method) pair, and repeat installs
/// only contribute event names to the shared gate mapping.
pub struct Interceptor {
    target: Arc<dyn EventTarget>,
    slot_name: Option<String>,
    method_name: Option<String>,
    events: EventSelection,
    gate: Arc<dyn Gate>,
    /// Shared per (target, method); `None` when the method strategy is off.
    gates: Option<GateMap>,
}

impl Interceptor {
    /// Start configuring an interceptor for `target` guarded by `gate`.
    pub fn builder(target: Arc<dyn EventTarget>, gate: Arc<dyn Gate>) -> InterceptorBuilder {
        InterceptorBuilder {
            target,
            slot_name: None,
            method_name: Some(DEFAULT_METHOD_NAME.to_string()),
            events: EventSelection::None,
            gate,
        }
    }

    /// Perform whichever installation strategies are configured.
    pub fn install(&self) -> Result<(), InstallError> {
        if let Some(slot) = &self.slot_name {
            self.install_slot(slot)?;
        }
        if let (Some(method), Some(gates)) = (&self.method_name, &self.gates) {
            self.install_method(method, gates)?;
        }
        Ok(())
    }

    /// Map `event` to `gate`, replacing any earlier gate for that name.
    ///
    /// The mapping is consulted at dispatch time, so this applies to
    /// listeners that were registered before the call.
    pub fn set_gate(&self, event: impl Into<String>, gate: Arc<dyn Gate>) {
        if let Some(gates) = &self.gates {
            gates
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(event.into(), gate);
        }
    }

    /// Drop the gate mapped to `event`. Returns whether one was mapped.
    pub fn remove_gate(&self, event: &str) -> bool {
        match &self.gates {
            Some(gates) => gates
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(event)
                .is_some(),
            None => false,
        }
    }

    fn install_slot(&self, name: &str) -> Result<(), InstallError> {
        let slot = self
            .target
            .handler_slot(name)
            .ok_or_else(|| InstallError::MissingSlot {
                name: name.to_string(),
            })?;
        slot.guard(Arc::clone(&self.gate));
        tracing::debug!(slot = name, "Handler slot guarded");
        Ok(())
    }

    fn install_method(&self, method: &str, gates: &GateMap) -> Result<(), InstallError> {
        let names: &[String] = match &self.events {
            // Nothing selected: nothing to gate, and the method stays
            // untouched.
            EventSelection::None => return Ok(()),
            EventSelection::Single(name) => std::slice::from_ref(name),
            EventSelection::Ordered(names) => names,
        };

        {
            let mut map = gates.write().unwrap_or_else(|e| e.into_inner());
            for name in names {
                // A later install for the same event name overwrites.
                map.insert(name.clone(), Arc::clone(&self.gate));
            }
        }

        let Some(original) = self.target.registration_method(method) else {
            return Err(InstallError::MissingMethod {
                name: method.to_string(),
            });
        };

        if !registry::mark_wrapped(&self.target, method) {
            // Already wrapped by an earlier install; the mapping refresh
            // above is all a repeat install contributes.
            tracing::debug!(method, "Registration method already wrapped");
            return Ok(());
        }

        let wrapper: RegisterFn = {
            let gates = Arc::clone(gates);
            Arc::new(move |target: &dyn EventTarget, mut request: RegisterRequest| {
                match (request.event.take(), request.listener.take()) {
                    (Some(event), Some(listener)) => {
                        let guarded = guard_listener(event.clone(), listener, Arc::clone(&gates));
                        request.event = Some(event);
                        request.listener = Some(guarded);
                        original(target, request)
                    }
                    // Requests that don't carry both an event name and a
                    // listener are not ours; they follow the native path
                    // untouched.
                    (event, listener) => {
                        request.event = event;
                        request.listener = listener;
                        original(target, request)
                    }
                }
            })
        };
        self.target.replace_registration_method(method, wrapper);
        tracing::debug!(method, "Registration method wrapped");
        Ok(())
    }
}

/// Wrap `listener` so the gate mapped to `event` runs first.
///
/// The mapping lookup happens at dispatch time, not registration time, so a
/// mapping update made after registration applies to listeners already
/// registered.
fn guard_listener(event: String, listener: Listener, gates: GateMap) -> Listener {
    Arc::new(move |cx: &EventContext<'_>| {
        let gate = {
            let map = gates.read().unwrap_or_else(|e| e.into_inner());
            map.get(&event).cloned()
        };
        if let Some(gate) = gate {
            if check_fail_open(gate.as_ref(), cx) == GateOutcome::Suppress {
                tracing::debug!(event = %event, gate = gate.name(), "Dispatch suppressed");
                return None;
            }
        }
        listener(cx)
    })
}

/// Builder for [`Interceptor`]; see [`Interceptor::builder`].
pub struct InterceptorBuilder {
    target: Arc<dyn EventTarget>,
    slot_name: Option<String>,
    method_name: Option<String>,
    events: EventSelection,
    gate: Arc<dyn Gate>,
}

impl InterceptorBuilder {
    /// Guard the settable handler slot `name` (attribute strategy).
    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slot_name = Some(name.into());
        self
    }

    /// Intercept the registration method `name` instead of the default.
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.method_name = Some(name.into());
        self
    }

    /// Disable the method strategy entirely.
    pub fn without_method(mut self) -> Self {
        self.method_name = None;
        self
    }

    /// Select which event names the method strategy gates.
    pub fn events(mut self, events: impl Into<EventSelection>) -> Self {
        self.events = events.into();
        self
    }

    pub fn build(self) -> Interceptor {
        let gates = self
            .method_name
            .as_deref()
            .map(|method| registry::gates_for(&self.target, method));
        Interceptor {
            target: self.target,
            slot_name: self.slot_name,
            method_name: self.method_name,
            events: self.events,
            gate: self.gate,
            gates,
        }
    }
}
