//! Per-(target, method) interception state, keyed by target identity.
//!
//! The "already wrapped" marker lives here rather than on the callable
//! itself, and the event-name → gate mapping is shared by every interceptor
//! aimed at the same (target, method) pair. A repeat install therefore adds
//! event names to the mapping the in-place wrapper already consults instead
//! of wrapping a second time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use crate::gate::Gate;
use crate::target::EventTarget;

/// The shared event-name → gate mapping for one (target, method) pair.
pub(crate) type GateMap = Arc<RwLock<HashMap<String, Arc<dyn Gate>>>>;

struct MethodEntry {
    /// Keeps identity honest: a dead handle invalidates the entry, so a new
    /// target reusing the allocation starts unwrapped.
    target: Weak<dyn EventTarget>,
    gates: GateMap,
    /// Monotonic for the lifetime of the target; never resets.
    wrapped: bool,
}

static ENTRIES: OnceLock<Mutex<HashMap<(usize, String), MethodEntry>>> = OnceLock::new();

fn entries() -> &'static Mutex<HashMap<(usize, String), MethodEntry>> {
    ENTRIES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn identity(target: &Arc<dyn EventTarget>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}

fn entry_for<'m>(
    map: &'m mut HashMap<(usize, String), MethodEntry>,
    target: &Arc<dyn EventTarget>,
    method: &str,
) -> &'m mut MethodEntry {
    map.retain(|_, entry| entry.target.strong_count() > 0);
    map.entry((identity(target), method.to_string()))
        .or_insert_with(|| MethodEntry {
            target: Arc::downgrade(target),
            gates: Arc::new(RwLock::new(HashMap::new())),
            wrapped: false,
        })
}

/// The shared gate mapping for `(target, method)`, created on first use.
pub(crate) fn gates_for(target: &Arc<dyn EventTarget>, method: &str) -> GateMap {
    let mut map = entries().lock().unwrap_or_else(|e| e.into_inner());
    Arc::clone(&entry_for(&mut map, target, method).gates)
}

/// Flip the wrapped marker for `(target, method)`.
///
/// Returns `true` exactly once per live pair: the caller that sees `true`
/// installs the wrapper; every later caller finds the marker set.
pub(crate) fn mark_wrapped(target: &Arc<dyn EventTarget>, method: &str) -> bool {
    let mut map = entries().lock().unwrap_or_else(|e| e.into_inner());
    let entry = entry_for(&mut map, target, method);
    if entry.wrapped {
        false
    } else {
        entry.wrapped = true;
        true
    }
}
