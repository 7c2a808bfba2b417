//! Core gate types and the fail-open containment policy.

use std::sync::Arc;

use crate::target::EventContext;

/// Verdict returned by a [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Let the real listener run.
    Proceed,
    /// Veto the real listener.
    Suppress,
}

impl GateOutcome {
    /// Whether dispatch continues to the real listener.
    pub fn should_proceed(self) -> bool {
        matches!(self, GateOutcome::Proceed)
    }
}

impl From<bool> for GateOutcome {
    fn from(allow: bool) -> Self {
        if allow {
            GateOutcome::Proceed
        } else {
            GateOutcome::Suppress
        }
    }
}

/// Gate execution errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Gate execution failed: {reason}")]
    Failed { reason: String },
}

impl GateError {
    /// Shorthand for [`GateError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        GateError::Failed {
            reason: reason.into(),
        }
    }
}

/// A gating callback that runs before a real event listener and decides
/// whether it executes.
///
/// Gates receive the exact arguments and receiver the listener would receive.
/// An error from a gate never reaches the code that registered the listener:
/// the interception layer logs it and continues as if the gate had returned
/// [`GateOutcome::Proceed`].
pub trait Gate: Send + Sync {
    /// A name for this gate, used in log lines.
    fn name(&self) -> &str {
        "gate"
    }

    /// Inspect a pending dispatch and decide whether it proceeds.
    fn check(&self, cx: &EventContext<'_>) -> Result<GateOutcome, GateError>;
}

/// Adapts a closure to the [`Gate`] trait.
pub struct FnGate<F> {
    name: String,
    func: F,
}

impl<F> FnGate<F>
where
    F: Fn(&EventContext<'_>) -> Result<GateOutcome, GateError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Gate for FnGate<F>
where
    F: Fn(&EventContext<'_>) -> Result<GateOutcome, GateError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, cx: &EventContext<'_>) -> Result<GateOutcome, GateError> {
        (self.func)(cx)
    }
}

/// Wrap a boolean predicate as a [`Gate`]: `true` proceeds, `false`
/// suppresses.
pub fn predicate<P>(name: impl Into<String>, pred: P) -> Arc<dyn Gate>
where
    P: Fn(&EventContext<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(FnGate::new(name, move |cx: &EventContext<'_>| {
        Ok(GateOutcome::from(pred(cx)))
    }))
}

/// Run a gate under the fail-open containment policy: an error is logged and
/// treated as [`GateOutcome::Proceed`].
pub(crate) fn check_fail_open(gate: &dyn Gate, cx: &EventContext<'_>) -> GateOutcome {
    match gate.check(cx) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(gate = gate.name(), "Gate failed (fail-open): {}", err);
            GateOutcome::Proceed
        }
    }
}
