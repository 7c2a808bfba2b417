//! The registration surface a host object exposes to the interception layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::slot::HandlerSlot;

/// An event listener as the host invokes it: receives the dispatch context
/// and returns whatever the host's convention says a listener returns.
pub type Listener = Arc<dyn Fn(&EventContext<'_>) -> Option<Value> + Send + Sync>;

/// A registration entry point: a callable value bound to a method name on the
/// target, replaceable so a wrapper can be substituted for the original.
pub type RegisterFn =
    Arc<dyn Fn(&dyn EventTarget, RegisterRequest) -> Option<Value> + Send + Sync>;

/// What a listener — and any gate guarding it — receives when an event
/// fires: the receiver and the arguments of the dispatch.
pub struct EventContext<'a> {
    /// The object dispatching the event.
    pub target: &'a dyn EventTarget,
    /// Arguments the host passes to the listener.
    pub args: &'a [Value],
}

impl<'a> EventContext<'a> {
    pub fn new(target: &'a dyn EventTarget, args: &'a [Value]) -> Self {
        Self { target, args }
    }

    /// The argument at position `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// Options accompanying a listener registration.
///
/// The typed counterpart of the trailing arguments a conventional "add
/// listener" call accepts. The interception layer forwards every field
/// untouched; interpretation belongs to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterOptions {
    /// Dispatch during the capture phase.
    #[serde(default)]
    pub capture: bool,
    /// Drop the listener after its first invocation.
    #[serde(default)]
    pub once: bool,
    /// Host-specific extension data, forwarded verbatim.
    #[serde(default)]
    pub extra: Value,
}

/// A call to a registration method.
///
/// `event` and `listener` are optional because the surface being modeled
/// accepts calls of any shape. A request missing either field is not gated;
/// it passes through to the original method untouched.
#[derive(Clone)]
pub struct RegisterRequest {
    pub event: Option<String>,
    pub listener: Option<Listener>,
    pub options: RegisterOptions,
}

impl RegisterRequest {
    /// A complete registration: event name plus listener.
    pub fn new(event: impl Into<String>, listener: Listener) -> Self {
        Self {
            event: Some(event.into()),
            listener: Some(listener),
            options: RegisterOptions::default(),
        }
    }

    /// A call carrying only an event name.
    pub fn event_only(event: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            listener: None,
            options: RegisterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RegisterOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the request carries everything needed for gated registration.
    pub fn is_complete(&self) -> bool {
        self.event.is_some() && self.listener.is_some()
    }
}

/// The surface a host object exposes so listener registration on it can be
/// intercepted.
///
/// Implementors are "targets": objects other code wires event listeners
/// onto. The interception layer never owns a target; it holds a reference
/// for as long as it is installed.
pub trait EventTarget: Send + Sync {
    /// The settable handler slot registered under `name`, if the target has
    /// one. Targets without slot-style registration keep the default.
    fn handler_slot(&self, name: &str) -> Option<Arc<HandlerSlot>> {
        let _ = name;
        None
    }

    /// The callable currently bound to the registration method `name`.
    fn registration_method(&self, name: &str) -> Option<RegisterFn>;

    /// Bind `method` under `name`, replacing whatever was there.
    fn replace_registration_method(&self, name: &str, method: RegisterFn);
}
