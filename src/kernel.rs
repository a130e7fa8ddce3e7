//! Kernel
//!
//! The composition root. A [`Kernel`] owns one instance of every component
//! (module registry, state machine, hook bus, event bus, service registry,
//! resource store) and forwards calls to them explicitly.

use crate::config::{self, KernelConfig, TransitionSpec};
use crate::error::{KernelError, Result};
use crate::hook::{HookBus, HookId, HookValue, Reducer};
use crate::lifecycle::{PhaseLadder, ShutdownHandler, StateMachine};
use crate::messaging::{EventBus, SubscriptionId};
use crate::module::{Module, ModuleDescriptor, ModuleRegistry};
use crate::resource::ResourceStore;
use crate::service::ServiceRegistry;
use serde_json::{Value, json};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

/// Published with the module name after a module was added
pub const ADD_EVENT: &str = "kernel:add";
/// Published with the module name after a module was removed
pub const DEL_EVENT: &str = "kernel:del";

struct KernelInner {
    registry: RwLock<ModuleRegistry>,
    groups: RwLock<Arc<Vec<String>>>,
    machine: StateMachine,
    hooks: HookBus,
    events: EventBus,
    services: ServiceRegistry,
    resources: ResourceStore,
}

/// Handle to a module orchestrator.
///
/// Cloning is cheap and every clone drives the same kernel; lifecycle methods
/// receive one as their context.
///
/// # Example
///
/// ```rust,ignore
/// use microkernel::{Component, Kernel, ModuleDescriptor};
///
/// let kernel = Kernel::new();
/// kernel.add(Component::new(ModuleDescriptor::new("db").group("RESOURCE")))?;
/// kernel.add(Component::new(ModuleDescriptor::new("api").group("SERVICE").after("db")))?;
///
/// kernel.request_phase("started").await?;
/// assert_eq!(kernel.phase(), "started");
/// ```
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("phase", &self.phase())
            .field("modules", &self.modules())
            .finish()
    }
}

impl Kernel {
    /// A kernel with the default phase ladder and group sequence
    pub fn new() -> Self {
        Self::from_parts(PhaseLadder::default(), config::default_groups())
    }

    pub fn with_config(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        let ladder = PhaseLadder::new(config.transitions)?;
        Ok(Self::from_parts(ladder, config.groups))
    }

    fn from_parts(ladder: PhaseLadder, groups: Vec<String>) -> Self {
        Self {
            inner: Arc::new(KernelInner {
                registry: RwLock::new(ModuleRegistry::new()),
                groups: RwLock::new(Arc::new(groups)),
                machine: StateMachine::new(ladder),
                hooks: HookBus::new(),
                events: EventBus::new(),
                services: ServiceRegistry::new(),
                resources: ResourceStore::new(),
            }),
        }
    }

    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    // ---- configuration ----

    pub fn group_sequence(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.inner.groups.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the group sequence.
    ///
    /// Every registered module must still name a known group.
    pub fn set_groups(&self, groups: Vec<String>) -> Result<()> {
        let registry = self.frozen_registry()?;
        config::validate_groups(&groups)?;
        for descriptor in registry.descriptors() {
            descriptor.validate(&groups)?;
        }
        *self.inner.groups.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(groups);
        self.inner.machine.invalidate();
        Ok(())
    }

    /// Replace the phase ladder
    pub fn set_transitions(&self, transitions: Vec<TransitionSpec>) -> Result<()> {
        let _registry = self.frozen_registry()?;
        let ladder = PhaseLadder::new(transitions)?;
        self.inner.machine.set_ladder(ladder);
        Ok(())
    }

    // ---- module registry ----

    /// Write access to the registry, granted only while resting in the
    /// lowest phase with no transition running.
    fn frozen_registry(&self) -> Result<RwLockWriteGuard<'_, ModuleRegistry>> {
        let registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let machine = &self.inner.machine;
        if machine.is_transiting() {
            return Err(KernelError::configuration("transition in progress"));
        }
        if machine.phase_index() != 0 {
            return Err(KernelError::NotInLowestPhase {
                phase: machine.phase(),
            });
        }
        Ok(registry)
    }

    /// Add a module. Its concrete type stays available to [`Kernel::get_as`].
    pub fn add<M: Module>(&self, module: M) -> Result<String> {
        let groups = self.group_sequence();
        let module = Arc::new(module);
        let name = self
            .frozen_registry()?
            .insert(Arc::clone(&module), &groups)?;
        self.added(&name, module.as_ref());
        Ok(name)
    }

    pub fn add_shared(&self, module: Arc<dyn Module>) -> Result<String> {
        let groups = self.group_sequence();
        let name = self
            .frozen_registry()?
            .insert_shared(Arc::clone(&module), &groups)?;
        self.added(&name, module.as_ref());
        Ok(name)
    }

    /// Construct and add a module from its type
    pub fn add_default<M: Module + Default>(&self) -> Result<String> {
        self.add(M::default())
    }

    // Runs with the registry lock released, so `attached` may use the kernel.
    fn added(&self, name: &str, module: &dyn Module) {
        self.inner.machine.invalidate();
        tracing::info!("Module {} added", name);
        self.inner.events.notify(ADD_EVENT, vec![json!(name)]);
        module.attached(Some(self));
    }

    pub fn remove(&self, name: &str) -> Result<Arc<dyn Module>> {
        let module = self.frozen_registry()?.remove(name)?;
        self.removed(name, module.as_ref());
        Ok(module)
    }

    /// Remove every module added with concrete type `M`
    pub fn remove_all<M: Module>(&self) -> Result<Vec<String>> {
        let removed = self.frozen_registry()?.remove_all::<M>();
        let mut names = Vec::with_capacity(removed.len());
        for (name, module) in removed {
            self.removed(&name, module.as_ref());
            names.push(name);
        }
        Ok(names)
    }

    fn removed(&self, name: &str, module: &dyn Module) {
        self.inner.machine.invalidate();
        tracing::info!("Module {} removed", name);
        self.inner.events.notify(DEL_EVENT, vec![json!(name)]);
        module.attached(None);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Module>> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
    }

    pub fn get_as<M: Module>(&self, name: &str) -> Result<Arc<M>> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_as(name)
    }

    /// Module names in registration order
    pub fn modules(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    pub(crate) fn descriptors(&self) -> Vec<ModuleDescriptor> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .descriptors()
    }

    // ---- phases ----

    pub fn machine(&self) -> &StateMachine {
        &self.inner.machine
    }

    /// Name of the current phase
    pub fn phase(&self) -> String {
        self.inner.machine.phase()
    }

    pub fn phase_index(&self) -> usize {
        self.inner.machine.phase_index()
    }

    /// Walk to the phase `name`, resolving with the phase reached
    pub async fn request_phase(&self, name: &str) -> Result<String> {
        self.inner.machine.transit(self, name).await
    }

    /// Move exactly one phase up
    pub async fn phase_up(&self) -> Result<String> {
        let ladder = self.inner.machine.ladder();
        let current = self.phase_index();
        if current >= ladder.highest() {
            return Err(KernelError::configuration(format!(
                "no phase above {}",
                ladder.name(current)
            )));
        }
        self.request_phase(ladder.name(current + 1)).await
    }

    /// Move exactly one phase down
    pub async fn phase_down(&self) -> Result<String> {
        let ladder = self.inner.machine.ladder();
        let current = self.phase_index();
        if current == ladder.lowest() {
            return Err(KernelError::configuration(format!(
                "no phase below {}",
                ladder.name(current)
            )));
        }
        self.request_phase(ladder.name(current - 1)).await
    }

    /// The execution order, resolving it if no order is cached
    pub async fn execution_order(&self) -> Result<Vec<String>> {
        let order = self.inner.machine.execution_order(self).await?;
        Ok(order.as_ref().clone())
    }

    /// Run a background task that walks down to the lowest phase on
    /// Ctrl+C or SIGTERM.
    pub fn spawn_shutdown_handler(&self) -> tokio::task::JoinHandle<()> {
        let handler = ShutdownHandler::new(self.clone());
        tokio::spawn(async move {
            handler.wait_for_shutdown().await;
        })
    }

    // ---- hooks ----

    pub fn hooks(&self) -> &HookBus {
        &self.inner.hooks
    }

    pub fn latch<F>(&self, name: impl Into<String>, callback: F) -> HookId
    where
        F: Fn(&[HookValue], &HookValue) -> anyhow::Result<HookValue> + Send + Sync + 'static,
    {
        self.inner.hooks.latch(name, callback)
    }

    pub fn unlatch(&self, name: &str, id: HookId) -> Result<()> {
        self.inner.hooks.unlatch(name, id)
    }

    pub fn hook(&self, name: &str, reducer: Reducer, args: &[HookValue]) -> Result<HookValue> {
        self.inner.hooks.invoke(name, reducer, args)
    }

    // ---- events ----

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe<F, Fut>(&self, name: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.events.subscribe(name, callback)
    }

    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> Result<()> {
        self.inner.events.unsubscribe(name, id)
    }

    pub async fn publish(&self, name: &str, args: Vec<Value>) -> Result<()> {
        self.inner.events.publish(name, args).await
    }

    // ---- services ----

    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    pub fn register<F>(&self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.inner.services.register(name, callback)
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.inner.services.unregister(name)
    }

    pub fn service(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.inner.services.call(name, args)
    }

    // ---- resources ----

    pub fn resources(&self) -> &ResourceStore {
        &self.inner.resources
    }

    pub fn set_resource<T: 'static + Send + Sync>(&self, key: impl Into<String>, value: T) -> Arc<T> {
        self.inner.resources.set(key, value)
    }

    pub fn resource<T: 'static + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        self.inner.resources.resolve(key)
    }
}

type PendingModule = Box<dyn FnOnce(&Kernel) -> Result<String> + Send>;

/// Builder for [`Kernel`]
///
/// # Example
///
/// ```rust,ignore
/// let kernel = Kernel::builder()
///     .groups(["BASE", "SERVICE"])
///     .module(Database::default())
///     .module(Api::default())
///     .launch("started")
///     .await?;
/// ```
pub struct KernelBuilder {
    config: KernelConfig,
    modules: Vec<PendingModule>,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
            modules: Vec::new(),
        }
    }

    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn transitions(mut self, transitions: Vec<TransitionSpec>) -> Self {
        self.config.transitions = transitions;
        self
    }

    /// Add a module once the kernel is built
    pub fn module<M: Module>(mut self, module: M) -> Self {
        self.modules.push(Box::new(move |kernel| kernel.add(module)));
        self
    }

    pub fn shared_module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules
            .push(Box::new(move |kernel| kernel.add_shared(module)));
        self
    }

    pub fn build(self) -> Result<Kernel> {
        let kernel = Kernel::with_config(self.config)?;
        for add in self.modules {
            add(&kernel)?;
        }
        Ok(kernel)
    }

    /// Build, then walk up to `phase`
    pub async fn launch(self, phase: &str) -> Result<Kernel> {
        let kernel = self.build()?;
        kernel.request_phase(phase).await?;
        Ok(kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::module::Component;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Cache;

    #[async_trait::async_trait]
    impl Module for Cache {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("cache").group("RESOURCE")
        }

        fn provides(&self, _method: &str) -> bool {
            false
        }

        async fn call(&self, _method: &str, _kernel: &Kernel) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_add_get_remove() {
        let kernel = Kernel::new();
        assert_eq!(kernel.add(Component::named("db")).unwrap(), "db");
        kernel.add_default::<Cache>().unwrap();
        assert_eq!(kernel.modules(), vec!["db", "cache"]);

        assert!(kernel.get_as::<Cache>("cache").is_ok());
        assert!(matches!(
            kernel.get_as::<Cache>("db"),
            Err(KernelError::ModuleTypeMismatch { .. })
        ));

        kernel.remove("db").unwrap();
        assert!(matches!(
            kernel.get("db"),
            Err(KernelError::ModuleNotFound { .. })
        ));
        assert_eq!(kernel.remove_all::<Cache>().unwrap(), vec!["cache"]);
        assert!(kernel.modules().is_empty());
    }

    /// Records what `attached` observed
    #[derive(Default)]
    struct Watcher {
        seen: Mutex<Vec<Option<Vec<String>>>>,
    }

    #[async_trait::async_trait]
    impl Module for Watcher {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("watcher")
        }

        fn provides(&self, _method: &str) -> bool {
            false
        }

        async fn call(&self, _method: &str, _kernel: &Kernel) -> anyhow::Result<()> {
            Ok(())
        }

        fn attached(&self, kernel: Option<&Kernel>) {
            self.seen
                .lock()
                .unwrap()
                .push(kernel.map(Kernel::modules));
        }
    }

    #[test]
    fn test_attached_follows_membership() {
        let kernel = Kernel::new();
        kernel.add(Component::named("db")).unwrap();
        kernel.add_default::<Watcher>().unwrap();
        let watcher = kernel.get_as::<Watcher>("watcher").unwrap();
        assert_eq!(
            *watcher.seen.lock().unwrap(),
            vec![Some(vec!["db".to_string(), "watcher".to_string()])]
        );

        kernel.remove("watcher").unwrap();
        assert_eq!(watcher.seen.lock().unwrap().last(), Some(&None));

        kernel.add_shared(watcher.clone()).unwrap();
        kernel.remove_all::<Component>().unwrap();
        kernel.remove("watcher").unwrap();
        assert_eq!(watcher.seen.lock().unwrap().len(), 4);
        assert_eq!(
            watcher.seen.lock().unwrap()[2],
            Some(vec!["db".to_string(), "watcher".to_string()])
        );
        assert_eq!(watcher.seen.lock().unwrap()[3], None);
    }

    #[test]
    fn test_remove_all_detaches_each_module() {
        let kernel = Kernel::new();
        let detached = Arc::new(Mutex::new(0));
        for name in ["a", "b"] {
            let detached = Arc::clone(&detached);
            kernel
                .add(Component::named(name).on_attached(move |kernel| {
                    if kernel.is_none() {
                        *detached.lock().unwrap() += 1;
                    }
                }))
                .unwrap();
        }
        assert_eq!(kernel.remove_all::<Component>().unwrap(), vec!["a", "b"]);
        assert_eq!(*detached.lock().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_and_unknown_group() {
        let kernel = Kernel::new();
        kernel.add(Component::named("db")).unwrap();
        let err = kernel.add(Component::named("db")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);

        let err = kernel
            .add(Component::new(ModuleDescriptor::new("x").group("NOWHERE")))
            .unwrap_err();
        assert!(matches!(err, KernelError::UnknownGroup { .. }));
    }

    #[tokio::test]
    async fn test_membership_frozen_outside_lowest_phase() {
        let kernel = Kernel::new();
        kernel.add(Component::named("db")).unwrap();
        kernel.request_phase("booted").await.unwrap();

        let err = kernel.add(Component::named("late")).unwrap_err();
        assert!(matches!(err, KernelError::NotInLowestPhase { .. }));
        assert!(kernel.remove("db").is_err());
        assert!(kernel.set_groups(vec!["A".into()]).is_err());

        kernel.request_phase("dead").await.unwrap();
        kernel.add(Component::named("late")).unwrap();
    }

    #[tokio::test]
    async fn test_membership_change_invalidates_order() {
        let kernel = Kernel::new();
        kernel.add(Component::named("b")).unwrap();
        assert_eq!(kernel.execution_order().await.unwrap(), vec!["b"]);
        kernel
            .add(Component::new(ModuleDescriptor::new("a").before("b")))
            .unwrap();
        assert_eq!(kernel.execution_order().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_phase_up_and_down() {
        let kernel = Kernel::new();
        assert!(kernel.phase_down().await.is_err());
        assert_eq!(kernel.phase_up().await.unwrap(), "booted");
        assert_eq!(kernel.phase_up().await.unwrap(), "latched");
        assert_eq!(kernel.phase_index(), 2);
        assert_eq!(kernel.phase_down().await.unwrap(), "booted");

        kernel.request_phase("started").await.unwrap();
        assert!(kernel.phase_up().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_transition_rejected() {
        let kernel = Kernel::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        kernel
            .add(Component::named("gate").on("boot", move |_| {
                let rx = Arc::clone(&rx);
                async move {
                    if let Some(rx) = rx.lock().await.take() {
                        let _ = rx.await;
                    }
                    Ok(())
                }
            }))
            .unwrap();

        let walker = kernel.clone();
        let pending = tokio::spawn(async move { walker.request_phase("booted").await });
        while !kernel.machine().is_transiting() {
            tokio::task::yield_now().await;
        }

        let err = kernel.request_phase("started").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(kernel.add(Component::named("late")).is_err());

        tx.send(()).unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), "booted");
    }

    #[tokio::test]
    async fn test_add_notification() {
        let kernel = Kernel::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        kernel.subscribe(ADD_EVENT, move |args| {
            let tx = Arc::clone(&tx);
            async move {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(args);
                }
                Ok(())
            }
        });
        kernel.add(Component::named("db")).unwrap();
        assert_eq!(rx.await.unwrap(), vec![json!("db")]);
    }

    #[test]
    fn test_custom_transitions() {
        let kernel = Kernel::new();
        kernel
            .set_transitions(vec![
                TransitionSpec::rest("off"),
                TransitionSpec::new("on", "power_on", "power_off"),
            ])
            .unwrap();
        assert_eq!(kernel.phase(), "off");
        assert!(kernel.set_transitions(vec![]).is_err());
    }

    #[test]
    fn test_set_groups_revalidates_modules() {
        let kernel = Kernel::new();
        kernel.add_default::<Cache>().unwrap();
        let err = kernel.set_groups(vec!["BASE".into()]).unwrap_err();
        assert!(matches!(err, KernelError::UnknownGroup { .. }));
        kernel
            .set_groups(vec!["RESOURCE".into(), "SERVICE".into()])
            .unwrap();
        assert_eq!(kernel.group_sequence().len(), 2);
    }

    #[tokio::test]
    async fn test_builder_launch() {
        let kernel = Kernel::builder()
            .groups(["RESOURCE"])
            .module(Cache)
            .launch("configured")
            .await
            .unwrap();
        assert_eq!(kernel.phase(), "configured");
        assert_eq!(kernel.modules(), vec!["cache"]);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Kernel::builder().groups(["A", "A"]).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_services_and_resources() {
        let kernel = Kernel::new();
        kernel.register("echo", |args| Ok(json!(args))).unwrap();
        assert_eq!(kernel.service("echo", &[json!(1)]).unwrap(), json!([1]));
        kernel.set_resource("limit", 10usize);
        assert_eq!(*kernel.resource::<usize>("limit").unwrap(), 10);
        assert!(!Kernel::version().is_empty());
    }
}
