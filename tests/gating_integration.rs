//! End-to-end tests driving the interception layer through a stub host.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;
use serde_json::json;
use turnstile::testing::{CountingGate, Emitter, counting_listener};
use turnstile::{
    DEFAULT_METHOD_NAME, EventContext, FnGate, GateOutcome, Interceptor, RegisterOptions,
    RegisterRequest,
};

#[test]
fn guarded_slot_gates_every_reassignment() {
    let emitter = Emitter::new();
    let slot = emitter.add_slot("onmessage");
    let gate = Arc::new(CountingGate::proceeding("slot-guard"));

    Interceptor::builder(emitter.clone(), gate.clone())
        .slot("onmessage")
        .without_method()
        .build()
        .install()
        .unwrap();

    let (first, first_calls) = counting_listener();
    let (second, second_calls) = counting_listener();

    slot.assign(first);
    emitter.fire_slot("onmessage", &[]);
    assert_eq!(gate.calls(), 1);
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);

    // Reassignment stays guarded and the stale handler never runs again.
    slot.assign(second);
    emitter.fire_slot("onmessage", &[]);
    assert_eq!(gate.calls(), 2);
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn both_strategies_can_guard_one_target() {
    let emitter = Emitter::new();
    let slot = emitter.add_slot("onmessage");
    let gate = Arc::new(CountingGate::suppressing("veto-all"));

    Interceptor::builder(emitter.clone(), gate.clone())
        .slot("onmessage")
        .events("message")
        .build()
        .install()
        .unwrap();

    let (slot_handler, slot_calls) = counting_listener();
    slot.assign(slot_handler);

    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("message", listener));

    emitter.fire_slot("onmessage", &[]);
    emitter.emit("message", &[]);

    assert_eq!(gate.calls(), 2);
    assert_eq!(slot_calls.load(Ordering::SeqCst), 0);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_gate_fails_open_on_both_paths() {
    let emitter = Emitter::new();
    let slot = emitter.add_slot("onmessage");
    let gate = Arc::new(CountingGate::failing("broken"));

    Interceptor::builder(emitter.clone(), gate.clone())
        .slot("onmessage")
        .events("message")
        .build()
        .install()
        .unwrap();

    let (slot_handler, slot_calls) = counting_listener();
    slot.assign(slot_handler);
    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("message", listener));

    emitter.fire_slot("onmessage", &[]);
    emitter.emit("message", &[]);

    // The gate ran and errored both times, and both listeners still ran
    // exactly once.
    assert_eq!(gate.calls(), 2);
    assert_eq!(slot_calls.load(Ordering::SeqCst), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn independent_events_have_independent_gates() {
    let emitter = Emitter::new();
    let alpha_gate = Arc::new(CountingGate::proceeding("alpha"));
    let beta_gate = Arc::new(CountingGate::proceeding("beta"));

    Interceptor::builder(emitter.clone(), alpha_gate.clone())
        .events("alpha")
        .build()
        .install()
        .unwrap();
    Interceptor::builder(emitter.clone(), beta_gate.clone())
        .events("beta")
        .build()
        .install()
        .unwrap();

    let (alpha_listener, _) = counting_listener();
    let (beta_listener, _) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("alpha", alpha_listener));
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("beta", beta_listener));

    emitter.emit("alpha", &[]);
    assert_eq!(alpha_gate.calls(), 1);
    assert_eq!(beta_gate.calls(), 0);
}

#[test]
fn repeat_install_does_not_double_wrap() {
    let emitter = Emitter::new();
    let first_gate = Arc::new(CountingGate::proceeding("first"));
    let second_gate = Arc::new(CountingGate::proceeding("second"));

    Interceptor::builder(emitter.clone(), first_gate.clone())
        .events("click")
        .build()
        .install()
        .unwrap();

    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("click", listener));

    emitter.emit("click", &[]);
    assert_eq!(first_gate.calls(), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);

    // Overlapping second install: no double wrap, but the new event name
    // and the overwritten gate for "click" are honored.
    Interceptor::builder(emitter.clone(), second_gate.clone())
        .events(["click", "keydown"])
        .build()
        .install()
        .unwrap();

    emitter.emit("click", &[]);
    assert_eq!(first_gate.calls() + second_gate.calls(), 2);
    assert_eq!(second_gate.calls(), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 2);

    let (keydown_listener, keydown_calls) = counting_listener();
    emitter.register(
        DEFAULT_METHOD_NAME,
        RegisterRequest::new("keydown", keydown_listener),
    );
    emitter.emit("keydown", &[]);
    assert_eq!(second_gate.calls(), 2);
    assert_eq!(keydown_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn reinstalling_the_same_interceptor_is_idempotent() {
    let emitter = Emitter::new();
    let gate = Arc::new(CountingGate::proceeding("guard"));
    let interceptor = Interceptor::builder(emitter.clone(), gate.clone())
        .events("click")
        .build();

    interceptor.install().unwrap();
    interceptor.install().unwrap();

    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("click", listener));
    emitter.emit("click", &[]);

    assert_eq!(gate.calls(), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn incomplete_registration_passes_through_ungated() {
    let emitter = Emitter::new();
    let gate = Arc::new(CountingGate::proceeding("guard"));

    Interceptor::builder(emitter.clone(), gate.clone())
        .events("click")
        .build()
        .install()
        .unwrap();

    let before = emitter.native_register_calls();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::event_only("click"));

    // Native behavior saw the call; the gate was not involved.
    assert_eq!(emitter.native_register_calls(), before + 1);
    assert_eq!(emitter.listener_count("click"), 0);
    assert_eq!(gate.calls(), 0);

    emitter.emit("click", &[]);
    assert_eq!(gate.calls(), 0);
}

#[test]
fn suppressed_click_runs_after_remapping() {
    let emitter = Emitter::with_method_name("on");
    let veto = Arc::new(CountingGate::suppressing("veto-clicks"));

    let interceptor = Interceptor::builder(emitter.clone(), veto.clone())
        .method("on")
        .events("click")
        .build();
    interceptor.install().unwrap();

    let (real_handler, real_calls) = counting_listener();
    emitter.register("on", RegisterRequest::new("click", real_handler));

    emitter.emit("click", &[json!({"button": 0})]);
    assert_eq!(veto.calls(), 1);
    assert_eq!(real_calls.load(Ordering::SeqCst), 0);

    // The mapping is read at dispatch time: remapping applies to the
    // already-registered listener.
    let allow = Arc::new(CountingGate::proceeding("allow-clicks"));
    interceptor.set_gate("click", allow.clone());

    emitter.emit("click", &[json!({"button": 0})]);
    assert_eq!(allow.calls(), 1);
    assert_eq!(real_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn removing_a_gate_leaves_the_listener_ungated() {
    let emitter = Emitter::new();
    let gate = Arc::new(CountingGate::suppressing("veto"));
    let interceptor = Interceptor::builder(emitter.clone(), gate.clone())
        .events("tick")
        .build();
    interceptor.install().unwrap();

    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("tick", listener));

    emitter.emit("tick", &[]);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 0);

    assert!(interceptor.remove_gate("tick"));
    assert!(!interceptor.remove_gate("tick"));

    emitter.emit("tick", &[]);
    assert_eq!(gate.calls(), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn options_forward_through_the_wrapper() {
    let emitter = Emitter::new();
    let gate = Arc::new(CountingGate::proceeding("guard"));

    Interceptor::builder(emitter.clone(), gate.clone())
        .events("tick")
        .build()
        .install()
        .unwrap();

    let (listener, listener_calls) = counting_listener();
    let request = RegisterRequest::new("tick", listener).with_options(RegisterOptions {
        once: true,
        extra: json!({"passive": true}),
        ..RegisterOptions::default()
    });
    emitter.register(DEFAULT_METHOD_NAME, request);

    // `once` semantics survive the wrapper: one dispatch, then gone.
    emitter.emit("tick", &[]);
    emitter.emit("tick", &[]);
    assert_eq!(gate.calls(), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);
    assert_eq!(emitter.listener_count("tick"), 0);
}

#[test]
fn gate_sees_the_dispatch_arguments_and_receiver() {
    let emitter = Emitter::new();
    let gate = turnstile::gate::predicate("left-clicks-only", |cx: &EventContext<'_>| {
        cx.arg(0).and_then(|v| v.get("button")).and_then(|b| b.as_u64()) == Some(0)
    });

    Interceptor::builder(emitter.clone(), gate)
        .events("click")
        .build()
        .install()
        .unwrap();

    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("click", listener));

    emitter.emit("click", &[json!({"button": 2})]);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 0);

    emitter.emit("click", &[json!({"button": 0})]);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn reentrant_gate_may_register_more_listeners() {
    let emitter = Emitter::new();
    let gate = Arc::new(FnGate::new("recruiter", |cx: &EventContext<'_>| {
        if let Some(register) = cx.target.registration_method(DEFAULT_METHOD_NAME) {
            let (listener, _) = counting_listener();
            register(cx.target, RegisterRequest::new("follow-up", listener));
        }
        Ok(GateOutcome::Proceed)
    }));

    Interceptor::builder(emitter.clone(), gate)
        .events("tick")
        .build()
        .install()
        .unwrap();

    let (listener, listener_calls) = counting_listener();
    emitter.register(DEFAULT_METHOD_NAME, RegisterRequest::new("tick", listener));

    emitter.emit("tick", &[]);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 1);
    assert_eq!(emitter.listener_count("follow-up"), 1);
}

#[test]
fn a_fresh_target_is_wrappable_after_the_old_one_is_dropped() {
    let first = Emitter::new();
    let first_gate = Arc::new(CountingGate::proceeding("old"));
    Interceptor::builder(first.clone(), first_gate)
        .events("tick")
        .build()
        .install()
        .unwrap();
    drop(first);

    let second = Emitter::new();
    let gate = Arc::new(CountingGate::suppressing("new"));
    Interceptor::builder(second.clone(), gate.clone())
        .events("tick")
        .build()
        .install()
        .unwrap();

    let (listener, listener_calls) = counting_listener();
    second.register(DEFAULT_METHOD_NAME, RegisterRequest::new("tick", listener));
    second.emit("tick", &[]);

    assert_eq!(gate.calls(), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 0);
}
