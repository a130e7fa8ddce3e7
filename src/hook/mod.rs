//! Hook Bus
//!
//! Named, synchronous extension points. Callbacks latched onto a hook are
//! called in registration order when the hook is invoked, and their results
//! are folded by a [`Reducer`] into one value.
//!
//! # Example
//!
//! ```
//! use microkernel::{HookBus, HookValue, Reducer};
//! use serde_json::json;
//!
//! let hooks = HookBus::new();
//! hooks.latch("config", |_args, _acc| Ok(HookValue::data(json!({ "a": 1 }))));
//! hooks.latch("config", |_args, _acc| Ok(HookValue::data(json!({ "b": 2 }))));
//!
//! let merged = hooks.invoke("config", Reducer::Assign, &[]).unwrap();
//! assert_eq!(merged, json!({ "a": 1, "b": 2 }));
//! ```

mod reducer;
mod value;

pub use reducer::Reducer;
pub use value::HookValue;

use crate::error::{KernelError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one latched callback, unique per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(pub u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback signature: the invocation arguments and the running result.
pub type HookFn = dyn Fn(&[HookValue], &HookValue) -> anyhow::Result<HookValue> + Send + Sync;

struct HookEntry {
    id: HookId,
    callback: Arc<HookFn>,
}

pub struct HookBus {
    hooks: DashMap<String, Vec<HookEntry>>,
    next_id: AtomicU64,
}

impl Default for HookBus {
    fn default() -> Self {
        Self::new()
    }
}

impl HookBus {
    pub fn new() -> Self {
        Self {
            hooks: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Latch `callback` onto the hook `name`
    pub fn latch<F>(&self, name: impl Into<String>, callback: F) -> HookId
    where
        F: Fn(&[HookValue], &HookValue) -> anyhow::Result<HookValue> + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.entry(name.into()).or_default().push(HookEntry {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a callback previously latched with [`HookBus::latch`]
    pub fn unlatch(&self, name: &str, id: HookId) -> Result<()> {
        let mut entries = self
            .hooks
            .get_mut(name)
            .ok_or_else(|| KernelError::NoSuchHook {
                name: name.to_string(),
            })?;
        let position = entries.iter().position(|e| e.id == id).ok_or_else(|| {
            KernelError::NoSuchHookRegistration {
                name: name.to_string(),
                id: id.0,
            }
        })?;
        entries.remove(position);
        Ok(())
    }

    /// Invoke the hook `name`, folding every callback result with `reducer`.
    ///
    /// Every callback runs even when the fold outcome is already decided.
    /// A hook without callbacks yields the reducer's seed.
    pub fn invoke(&self, name: &str, reducer: Reducer, args: &[HookValue]) -> Result<HookValue> {
        // Snapshot so callbacks may latch or unlatch while running.
        let callbacks: Vec<Arc<HookFn>> = match self.hooks.get(name) {
            Some(entries) => entries.iter().map(|e| Arc::clone(&e.callback)).collect(),
            None => Vec::new(),
        };

        let mut result = reducer.seed(args);
        for callback in callbacks {
            let next = callback(args, &result).map_err(|e| KernelError::hook(name, e))?;
            result = reducer
                .step(result, next)
                .map_err(|e| KernelError::hook(name, e))?;
        }
        Ok(result)
    }

    /// Like [`HookBus::invoke`] with the reducer given by name
    pub fn invoke_named(&self, name: &str, reducer: &str, args: &[HookValue]) -> Result<HookValue> {
        let reducer: Reducer = reducer.parse().map_err(|_| {
            KernelError::configuration(format!("hook {}: no such reducer: {}", name, reducer))
        })?;
        self.invoke(name, reducer, args)
    }

    /// Number of callbacks latched onto `name`
    pub fn latched(&self, name: &str) -> usize {
        self.hooks.get(name).map_or(0, |entries| entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let hooks = HookBus::new();
        hooks.latch("names", |_, _| Ok(HookValue::data("first")));
        hooks.latch("names", |_, _| Ok(HookValue::data("second")));
        let result = hooks.invoke("names", Reducer::Push, &[]).unwrap();
        assert_eq!(result, json!(["first", "second"]));
    }

    #[test]
    fn test_callbacks_see_arguments_and_running_result() {
        let hooks = HookBus::new();
        hooks.latch("greet", |args, acc| {
            let name = args[0].as_str().unwrap_or_default();
            let acc = acc.as_str().unwrap_or_default();
            Ok(HookValue::data(format!("{}hello {}", acc, name)))
        });
        hooks.latch("greet", |_, acc| {
            Ok(HookValue::data(format!("{}!", acc.as_str().unwrap_or_default())))
        });
        let result = hooks
            .invoke("greet", Reducer::Pass, &[HookValue::data("")])
            .unwrap();
        assert_eq!(result, json!("hello !"));
    }

    #[test]
    fn test_and_runs_every_callback() {
        let hooks = HookBus::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        for (index, answer) in [false, true].into_iter().enumerate() {
            let seen = std::sync::Arc::clone(&seen);
            hooks.latch("check", move |_, _| {
                seen.lock().unwrap().push(index);
                Ok(HookValue::from(answer))
            });
        }
        let result = hooks.invoke("check", Reducer::And, &[]).unwrap();
        assert_eq!(result, json!(false));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_assign_merges_objects() {
        let hooks = HookBus::new();
        hooks.latch("cfg", |_, _| Ok(HookValue::data(json!({ "a": 1 }))));
        hooks.latch("cfg", |_, _| Ok(HookValue::data(json!({ "b": 2 }))));
        let result = hooks.invoke_named("cfg", "assign", &[]).unwrap();
        assert_eq!(result, json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn test_unregistered_hook_yields_seed() {
        let hooks = HookBus::new();
        assert_eq!(hooks.invoke("empty", Reducer::Add, &[]).unwrap(), json!(0));
        assert_eq!(
            hooks
                .invoke("empty", Reducer::Pass, &[HookValue::data(7)])
                .unwrap(),
            json!(7)
        );
    }

    #[test]
    fn test_unlatch_removes_callback() {
        let hooks = HookBus::new();
        let first = hooks.latch("sum", |_, _| Ok(HookValue::data(1)));
        hooks.latch("sum", |_, _| Ok(HookValue::data(10)));
        hooks.unlatch("sum", first).unwrap();
        assert_eq!(hooks.latched("sum"), 1);
        assert_eq!(hooks.invoke("sum", Reducer::Add, &[]).unwrap(), json!(10));
    }

    #[test]
    fn test_unlatch_unknown_fails() {
        let hooks = HookBus::new();
        let id = hooks.latch("known", |_, acc| Ok(acc.clone()));
        assert!(matches!(
            hooks.unlatch("unknown", id),
            Err(KernelError::NoSuchHook { .. })
        ));
        hooks.unlatch("known", id).unwrap();
        let err = hooks.unlatch("known", id).unwrap_err();
        assert!(matches!(err, KernelError::NoSuchHookRegistration { .. }));
        assert_eq!(err.kind(), ErrorKind::Registration);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let hooks = HookBus::new();
        let a = hooks.latch("x", |_, acc| Ok(acc.clone()));
        hooks.unlatch("x", a).unwrap();
        let b = hooks.latch("x", |_, acc| Ok(acc.clone()));
        assert!(b > a);
    }

    #[test]
    fn test_failing_callback_names_hook() {
        let hooks = HookBus::new();
        hooks.latch("boom", |_, _| Err(anyhow::anyhow!("exploded")));
        let err = hooks.invoke("boom", Reducer::None, &[]).unwrap_err();
        assert!(matches!(err, KernelError::Hook { ref name, .. } if name == "boom"));
    }

    #[test]
    fn test_unknown_reducer_name() {
        let hooks = HookBus::new();
        let err = hooks.invoke_named("x", "merge", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
