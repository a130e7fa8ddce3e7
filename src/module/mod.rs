//! Modules: the pluggable components driven through the phase ladder.

mod component;
mod descriptor;
mod registry;

pub use component::Component;
pub use descriptor::ModuleDescriptor;
pub use registry::ModuleRegistry;

use crate::kernel::Kernel;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Trait for kernel modules
///
/// A module describes itself once (when it is added) and answers, per phase
/// step, whether it provides the lifecycle method of that step. Modules are
/// usually declared with the `#[module]` and `#[lifecycle]` attributes, or
/// assembled from closures with [`Component`].
///
/// # Example
///
/// ```rust,ignore
/// use microkernel::{async_trait, Kernel, Module, ModuleDescriptor};
///
/// struct Database;
///
/// #[async_trait]
/// impl Module for Database {
///     fn descriptor(&self) -> ModuleDescriptor {
///         ModuleDescriptor::new("db").group("RESOURCE")
///     }
///
///     fn provides(&self, method: &str) -> bool {
///         matches!(method, "boot" | "shutdown")
///     }
///
///     async fn call(&self, method: &str, kernel: &Kernel) -> anyhow::Result<()> {
///         tracing::info!("db: {}", method);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Identity and ordering constraints of this module
    fn descriptor(&self) -> ModuleDescriptor;

    /// Whether this module implements the lifecycle method `method`
    ///
    /// Modules without the method are skipped for that phase step.
    fn provides(&self, method: &str) -> bool;

    /// Run the lifecycle method `method`
    async fn call(&self, method: &str, kernel: &Kernel) -> anyhow::Result<()>;

    /// Called with the kernel once the module is added, and with `None` once
    /// it is removed.
    fn attached(&self, kernel: Option<&Kernel>) {
        let _ = kernel;
    }
}

type MethodFn = dyn Fn(Kernel) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// A callable lifecycle method.
///
/// This is the value passed through the `kernel:state:method` hook, so a hook
/// may replace it with a wrapper that runs code around the original.
#[derive(Clone)]
pub struct LifecycleMethod {
    call: Arc<MethodFn>,
}

impl LifecycleMethod {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Kernel) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            call: Arc::new(move |kernel: Kernel| f(kernel).boxed()),
        }
    }

    /// The method `method` of `module`
    pub fn bound(module: Arc<dyn Module>, method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(move |kernel| {
            let module = Arc::clone(&module);
            let method = method.clone();
            async move { module.call(&method, &kernel).await }
        })
    }

    pub async fn call(&self, kernel: Kernel) -> anyhow::Result<()> {
        (self.call)(kernel).await
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for LifecycleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMethod").finish_non_exhaustive()
    }
}
