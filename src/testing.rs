//! Test doubles for exercising the interception layer.
//!
//! Provides:
//! - [`Emitter`]: an in-memory host with the conventional registration
//!   surface — named handler slots, named registration methods, and a
//!   dispatch loop
//! - [`CountingGate`]: a gate with a fixed verdict that counts invocations
//! - [`counting_listener`]: a listener paired with an invocation counter

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::gate::{Gate, GateError, GateOutcome};
use crate::interceptor::DEFAULT_METHOD_NAME;
use crate::slot::HandlerSlot;
use crate::target::{
    EventContext, EventTarget, Listener, RegisterFn, RegisterOptions, RegisterRequest,
};

struct Registration {
    listener: Listener,
    options: RegisterOptions,
}

/// An in-memory event target with the conventional registration surface.
pub struct Emitter {
    slots: RwLock<HashMap<String, Arc<HandlerSlot>>>,
    methods: RwLock<HashMap<String, RegisterFn>>,
    listeners: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    native_calls: Arc<AtomicU64>,
}

impl Emitter {
    /// An emitter whose native registration method is bound under the
    /// conventional default name.
    pub fn new() -> Arc<Self> {
        Self::with_method_name(DEFAULT_METHOD_NAME)
    }

    /// An emitter whose native registration method is bound under `method`.
    pub fn with_method_name(method: &str) -> Arc<Self> {
        let listeners: Arc<RwLock<HashMap<String, Vec<Registration>>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let native_calls = Arc::new(AtomicU64::new(0));
        let native = native_register(Arc::clone(&listeners), Arc::clone(&native_calls));
        let mut methods = HashMap::new();
        methods.insert(method.to_string(), native);
        Arc::new(Self {
            slots: RwLock::new(HashMap::new()),
            methods: RwLock::new(methods),
            listeners,
            native_calls,
        })
    }

    /// Expose a settable handler slot under `name`.
    pub fn add_slot(&self, name: &str) -> Arc<HandlerSlot> {
        let slot = Arc::new(HandlerSlot::new());
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::clone(&slot));
        slot
    }

    /// Call the registration method currently bound under `method`, the way
    /// host-facing code would.
    pub fn register(&self, method: &str, request: RegisterRequest) -> Option<Value> {
        let bound = self.registration_method(method)?;
        bound(self, request)
    }

    /// Dispatch `event` to every registered listener, honoring `once`.
    pub fn emit(&self, event: &str, args: &[Value]) -> Vec<Option<Value>> {
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
            match listeners.get_mut(event) {
                Some(list) => {
                    let snapshot = list.iter().map(|r| Arc::clone(&r.listener)).collect();
                    list.retain(|r| !r.options.once);
                    snapshot
                }
                None => Vec::new(),
            }
        };
        let cx = EventContext::new(self, args);
        snapshot.into_iter().map(|listener| listener(&cx)).collect()
    }

    /// Fire the handler slot `name`, if the emitter has one.
    pub fn fire_slot(&self, name: &str, args: &[Value]) -> Option<Value> {
        let slot = self.handler_slot(name)?;
        let cx = EventContext::new(self, args);
        slot.fire(&cx)
    }

    /// Listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map_or(0, Vec::len)
    }

    /// How many times the native registration method ran, wrapped or not.
    pub fn native_register_calls(&self) -> u64 {
        self.native_calls.load(Ordering::SeqCst)
    }
}

fn native_register(
    listeners: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    calls: Arc<AtomicU64>,
) -> RegisterFn {
    Arc::new(move |_target: &dyn EventTarget, request: RegisterRequest| {
        calls.fetch_add(1, Ordering::SeqCst);
        let RegisterRequest {
            event,
            listener,
            options,
        } = request;
        // Native convention: incomplete calls register nothing.
        if let (Some(event), Some(listener)) = (event, listener) {
            listeners
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .entry(event)
                .or_default()
                .push(Registration { listener, options });
        }
        None
    })
}

impl EventTarget for Emitter {
    fn handler_slot(&self, name: &str) -> Option<Arc<HandlerSlot>> {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    fn registration_method(&self, name: &str) -> Option<RegisterFn> {
        self.methods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    fn replace_registration_method(&self, name: &str, method: RegisterFn) {
        self.methods
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), method);
    }
}

/// A gate that counts how often it runs and returns a fixed verdict.
pub struct CountingGate {
    name: String,
    verdict: GateOutcome,
    fail: bool,
    calls: AtomicU64,
}

impl CountingGate {
    /// A gate that always lets dispatch proceed.
    pub fn proceeding(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: GateOutcome::Proceed,
            fail: false,
            calls: AtomicU64::new(0),
        }
    }

    /// A gate that always vetoes dispatch.
    pub fn suppressing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: GateOutcome::Suppress,
            fail: false,
            calls: AtomicU64::new(0),
        }
    }

    /// A gate that always errors, for exercising fail-open containment.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: GateOutcome::Proceed,
            fail: true,
            calls: AtomicU64::new(0),
        }
    }

    /// How many times the gate has run.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Gate for CountingGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, _cx: &EventContext<'_>) -> Result<GateOutcome, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GateError::failed("test gate error"));
        }
        Ok(self.verdict)
    }
}

/// A listener paired with its invocation counter. The listener returns its
/// running call count as a JSON number.
pub fn counting_listener() -> (Listener, Arc<AtomicU64>) {
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);
    let listener: Listener = Arc::new(move |_cx: &EventContext<'_>| {
        let calls = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Some(Value::from(calls))
    });
    (listener, count)
}
