use super::phase::{Direction, PhaseLadder, PhaseStep};
use crate::error::{KernelError, Result};
use crate::hook::{HookValue, Reducer};
use crate::kernel::Kernel;
use crate::module::{LifecycleMethod, Module};
use crate::resolver::DependencyResolver;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Published with the freshly resolved execution order
pub const TOPOSORT_EVENT: &str = "kernel:state:toposort";
/// Published before every phase step with `(from, to, method)`
pub const TRANSIT_BEFORE_EVENT: &str = "kernel:state:transit:before";
/// Published after every completed phase step with `(from, to, method)`
pub const TRANSIT_AFTER_EVENT: &str = "kernel:state:transit:after";
/// Pass hook over `(method, module, method name)`, must yield a method
pub const METHOD_HOOK: &str = "kernel:state:method";
/// Pass hook over `(outcome, module, method name)`, must yield an outcome
pub const RESULT_HOOK: &str = "kernel:state:result";

/// Walks the phase ladder.
///
/// The machine owns the current phase index and the cached execution order.
/// Module membership, hooks and events are reached through the [`Kernel`]
/// handed to [`StateMachine::transit`].
pub struct StateMachine {
    ladder: RwLock<Arc<PhaseLadder>>,
    current: AtomicUsize,
    busy: AtomicBool,
    order: Mutex<Option<Arc<Vec<String>>>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(PhaseLadder::default())
    }
}

/// Marks a transition in flight; released on drop, even on failure.
struct TransitionGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> TransitionGuard<'a> {
    fn acquire(busy: &'a AtomicBool) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| KernelError::configuration("transition already in progress"))?;
        Ok(Self { busy })
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl StateMachine {
    pub fn new(ladder: PhaseLadder) -> Self {
        Self {
            ladder: RwLock::new(Arc::new(ladder)),
            current: AtomicUsize::new(0),
            busy: AtomicBool::new(false),
            order: Mutex::new(None),
        }
    }

    pub fn ladder(&self) -> Arc<PhaseLadder> {
        Arc::clone(&self.ladder.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap the ladder. The caller checks that the machine is idle.
    pub(crate) fn set_ladder(&self, ladder: PhaseLadder) {
        *self.ladder.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(ladder);
        self.current.store(0, Ordering::Release);
        self.invalidate();
    }

    pub fn phase_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> String {
        self.ladder().name(self.phase_index()).to_string()
    }

    /// Resting in the lowest phase with no transition running
    pub fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::Acquire) && self.phase_index() == 0
    }

    pub fn is_transiting(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Drop the cached execution order
    pub fn invalidate(&self) {
        self.order.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn cached_order(&self) -> Option<Arc<Vec<String>>> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The execution order, resolving and caching it when missing.
    pub async fn execution_order(&self, kernel: &Kernel) -> Result<Arc<Vec<String>>> {
        if let Some(order) = self.cached_order() {
            return Ok(order);
        }

        let groups = kernel.group_sequence();
        let descriptors = kernel.descriptors();
        let order = Arc::new(DependencyResolver::new(&groups).resolve(&descriptors)?);
        tracing::debug!("Resolved execution order: {:?}", order);

        *self.order.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&order));
        announce(kernel, TOPOSORT_EVENT, vec![json!(order.as_slice())]).await;
        Ok(order)
    }

    /// Walk from the current phase to `target`, returning the phase reached.
    ///
    /// Every call of one step settles before the next step starts, and the
    /// phase index moves only once a step has fully succeeded. The first
    /// failing call aborts the walk; completed steps are not rolled back.
    pub async fn transit(&self, kernel: &Kernel, target: &str) -> Result<String> {
        let ladder = self.ladder();
        let to = ladder
            .index_of(target)
            .ok_or_else(|| KernelError::UnknownPhase {
                phase: target.to_string(),
            })?;
        let _guard = TransitionGuard::acquire(&self.busy)?;

        let from = self.phase_index();
        if from == to {
            tracing::debug!("Already in phase {}", target);
            return Ok(target.to_string());
        }

        let order = self
            .execution_order(kernel)
            .await
            .map_err(|e| KernelError::Toposort(Box::new(e)))?;
        let steps = ladder.steps(from, to)?;

        tracing::info!("Transition {} -> {}", ladder.name(from), target);
        for step in &steps {
            if let Err(e) = self.run_step(kernel, &ladder, &order, step).await {
                tracing::error!(
                    "Transition to {} aborted in phase {}: {}",
                    target,
                    ladder.name(self.phase_index()),
                    e
                );
                return Err(e);
            }
        }

        if to == ladder.lowest() {
            self.invalidate();
        }
        tracing::info!("Reached phase {}", target);
        Ok(target.to_string())
    }

    async fn run_step(
        &self,
        kernel: &Kernel,
        ladder: &PhaseLadder,
        order: &[String],
        step: &PhaseStep,
    ) -> Result<()> {
        let args = vec![
            json!(ladder.name(step.from)),
            json!(ladder.name(step.to)),
            json!(step.method),
        ];
        tracing::debug!(
            "Phase step {} -> {} ({})",
            ladder.name(step.from),
            ladder.name(step.to),
            step.method
        );
        announce(kernel, TRANSIT_BEFORE_EVENT, args.clone()).await;

        let names: Vec<&String> = match step.direction {
            Direction::Up => order.iter().collect(),
            Direction::Down => order.iter().rev().collect(),
        };

        let mut calls = Vec::with_capacity(names.len());
        for name in names {
            let module = kernel.get(name)?;
            if !module.provides(&step.method) {
                tracing::trace!("Module {} has no {} method", name, step.method);
                continue;
            }
            calls.push(invoke(kernel, name, module, &step.method));
        }

        // Outcomes come back in issue order, so the first error is the
        // earliest failing module of the step.
        if let Some(e) = join_all(calls).await.into_iter().find_map(Result::err) {
            return Err(e);
        }

        self.current.store(step.to, Ordering::Release);
        announce(kernel, TRANSIT_AFTER_EVENT, args).await;
        Ok(())
    }
}

/// Issue one module call through the method and result hooks.
///
/// The method hook runs immediately so calls are issued in order; a failure
/// there becomes this call's outcome without stopping its siblings.
fn invoke(
    kernel: &Kernel,
    module_name: &str,
    module: Arc<dyn Module>,
    method: &str,
) -> BoxFuture<'static, Result<()>> {
    let wrapped = kernel
        .hooks()
        .invoke(
            METHOD_HOOK,
            Reducer::Pass,
            &[
                HookValue::Method(LifecycleMethod::bound(module, method)),
                HookValue::from(module_name),
                HookValue::from(method),
            ],
        )
        .and_then(|value| {
            value.into_method().ok_or_else(|| {
                KernelError::hook(METHOD_HOOK, anyhow::anyhow!("hook did not yield a method"))
            })
        });

    call_through(
        kernel.clone(),
        module_name.to_string(),
        method.to_string(),
        wrapped,
    )
    .boxed()
}

async fn call_through(
    kernel: Kernel,
    module_name: String,
    method: String,
    wrapped: Result<LifecycleMethod>,
) -> Result<()> {
    let lifecycle = wrapped.map_err(|e| KernelError::invocation(&module_name, &method, e))?;

    tracing::debug!("Calling {}.{}", module_name, method);
    let outcome = lifecycle
        .call(kernel.clone())
        .await
        .map_err(|e| KernelError::invocation(&module_name, &method, e));

    kernel
        .hooks()
        .invoke(
            RESULT_HOOK,
            Reducer::Pass,
            &[
                HookValue::Outcome(outcome),
                HookValue::from(module_name.as_str()),
                HookValue::from(method.as_str()),
            ],
        )
        .and_then(|value| {
            value.into_outcome().ok_or_else(|| {
                KernelError::hook(RESULT_HOOK, anyhow::anyhow!("hook did not yield an outcome"))
            })
        })
        .map_err(|e| KernelError::invocation(&module_name, &method, e))?
}

async fn announce(kernel: &Kernel, event: &str, args: Vec<Value>) {
    if let Err(e) = kernel.events().publish(event, args).await {
        tracing::warn!("Notification {} failed: {}", event, e);
    }
}
