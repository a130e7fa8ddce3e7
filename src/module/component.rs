use super::{LifecycleMethod, Module, ModuleDescriptor};
use crate::kernel::Kernel;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type AttachFn = dyn Fn(Option<&Kernel>) + Send + Sync;

/// A module assembled from closures, one per lifecycle method.
///
/// # Example
///
/// ```
/// use microkernel::{Component, ModuleDescriptor};
///
/// let cache = Component::new(ModuleDescriptor::new("cache").group("RESOURCE"))
///     .on("boot", |_kernel| async { Ok(()) })
///     .on("shutdown", |_kernel| async { Ok(()) });
/// ```
pub struct Component {
    descriptor: ModuleDescriptor,
    methods: HashMap<String, LifecycleMethod>,
    attached: Option<Arc<AttachFn>>,
}

impl Component {
    pub fn new(descriptor: ModuleDescriptor) -> Self {
        Self {
            descriptor,
            methods: HashMap::new(),
            attached: None,
        }
    }

    /// Shorthand for a component with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(ModuleDescriptor::new(name))
    }

    /// Provide the lifecycle method `method`
    pub fn on<F, Fut>(mut self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Kernel) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.methods.insert(method.into(), LifecycleMethod::new(f));
        self
    }

    /// Run `f` when the component is added to (`Some`) or removed from
    /// (`None`) a kernel
    pub fn on_attached<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Kernel>) + Send + Sync + 'static,
    {
        self.attached = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl Module for Component {
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }

    fn provides(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    async fn call(&self, method: &str, kernel: &Kernel) -> anyhow::Result<()> {
        match self.methods.get(method) {
            Some(f) => f.call(kernel.clone()).await,
            None => Err(anyhow::anyhow!(
                "module {} does not provide {}",
                self.descriptor.name,
                method
            )),
        }
    }

    fn attached(&self, kernel: Option<&Kernel>) {
        if let Some(f) = &self.attached {
            f(kernel);
        }
    }
}
