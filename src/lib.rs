//! Transparent gating for event-listener registration.
//!
//! Turnstile sits between code that wires event listeners onto a host object
//! and the host object itself. An installed [`Interceptor`] guarantees that a
//! caller-supplied [`Gate`] runs before any listener the host would invoke,
//! and may veto it, while the registration surface the wiring code sees keeps
//! its shape.
//!
//! Two installation strategies, usable together on one target:
//!
//! - **Handler slot** — for hosts that expose a single settable "on-event"
//!   handler ([`HandlerSlot`]). The slot stays externally assignable; every
//!   dispatch passes through the guard, however often the handler is
//!   reassigned.
//! - **Registration method** — for hosts that expose an explicit "add
//!   listener" callable taking an event name and a listener. The callable is
//!   replaced with a wrapper that substitutes a gated listener before
//!   forwarding, once per (target, method) pair no matter how many
//!   interceptors are aimed at it.
//!
//! Gates are fail-open: a gate that returns an error is logged and treated as
//! "continue", so instrumentation can never break the host's event flow.
//!
//! ```
//! use turnstile::testing::{CountingGate, Emitter};
//! use turnstile::{Interceptor, RegisterRequest};
//! use std::sync::Arc;
//!
//! let emitter = Emitter::with_method_name("on");
//! let gate = Arc::new(CountingGate::suppressing("block-clicks"));
//!
//! Interceptor::builder(emitter.clone(), gate.clone())
//!     .method("on")
//!     .events("click")
//!     .build()
//!     .install()
//!     .unwrap();
//!
//! // Registration looks exactly like it did before the install.
//! let noisy: turnstile::Listener = Arc::new(|_cx: &turnstile::EventContext<'_>| panic!("vetoed"));
//! emitter.register("on", RegisterRequest::new("click", noisy));
//!
//! emitter.emit("click", &[]);
//! assert_eq!(gate.calls(), 1); // the gate ran, the listener did not
//! ```

pub mod gate;
pub mod interceptor;
mod registry;
pub mod slot;
pub mod target;
pub mod testing;

pub use gate::{FnGate, Gate, GateError, GateOutcome};
pub use interceptor::{
    DEFAULT_METHOD_NAME, EventSelection, InstallError, Interceptor, InterceptorBuilder,
};
pub use slot::HandlerSlot;
pub use target::{
    EventContext, EventTarget, Listener, RegisterFn, RegisterOptions, RegisterRequest,
};
