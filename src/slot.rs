//! The attribute-slot strategy: a guarded, settable handler slot.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::gate::{Gate, GateOutcome, check_fail_open};
use crate::target::{EventContext, Listener};

/// A settable "on-event" handler slot with a fixed dispatch shim.
///
/// Hosts that historically let callers assign a function to a property to
/// register a handler expose one of these instead: assignment goes through
/// [`assign`](Self::assign), dispatch through [`fire`](Self::fire). Guarding
/// the slot never changes its external assignability — the setter only swaps
/// the stored handler, and the shim consults the guard on every dispatch, so
/// every assignment is observed, indefinitely, across any number of
/// reassignments.
pub struct HandlerSlot {
    handler: RwLock<Option<Listener>>,
    guard: RwLock<Option<Arc<dyn Gate>>>,
}

impl HandlerSlot {
    pub fn new() -> Self {
        Self {
            handler: RwLock::new(None),
            guard: RwLock::new(None),
        }
    }

    /// Assign a handler, replacing the previous one.
    pub fn assign(&self, handler: Listener) {
        *self.handler.write().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    /// Remove the current handler.
    pub fn clear(&self) {
        *self.handler.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Whether a handler is currently assigned. Reading is unaffected by
    /// guarding.
    pub fn is_assigned(&self) -> bool {
        self.handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Install `gate` in front of every future dispatch. A later guard
    /// replaces the earlier one.
    pub(crate) fn guard(&self, gate: Arc<dyn Gate>) {
        *self.guard.write().unwrap_or_else(|e| e.into_inner()) = Some(gate);
    }

    /// Dispatch through the slot: run the guard, then the most recently
    /// assigned handler.
    ///
    /// With no handler assigned nothing runs, the guard included. A
    /// suppressed dispatch returns `None`.
    pub fn fire(&self, cx: &EventContext<'_>) -> Option<Value> {
        // Clone both out before calling anything: a handler that reassigns
        // the slot, or a gate that re-installs, must not meet a held guard.
        let handler = self
            .handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(handler) = handler else {
            return None;
        };
        let guard = self.guard.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(gate) = guard {
            if check_fail_open(gate.as_ref(), cx) == GateOutcome::Suppress {
                tracing::debug!(gate = gate.name(), "Slot dispatch suppressed");
                return None;
            }
        }
        handler(cx)
    }
}

impl Default for HandlerSlot {
    fn default() -> Self {
        Self::new()
    }
}
