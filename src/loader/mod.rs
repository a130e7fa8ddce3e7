//! Loader
//!
//! A catalog of named module factories and procedures. Entries are selected
//! with wildcard patterns (`*` for any run of characters, `?` for exactly
//! one) and matched in definition order.

use crate::error::{KernelError, Result};
use crate::kernel::Kernel;
use crate::module::Module;
use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

type Factory = Arc<dyn Fn(&Kernel, &Value) -> Result<String> + Send + Sync>;
type Procedure = Arc<dyn Fn(Kernel) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Loader {
    factories: Vec<(String, Factory)>,
    procedures: Vec<(String, Procedure)>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a module factory. The factory receives the load options.
    ///
    /// Loaded modules keep their concrete type, so [`Kernel::get_as`] finds
    /// them as `M`.
    pub fn define<F, M>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<M> + Send + Sync + 'static,
        M: Module,
    {
        let name = name.into();
        let label = name.clone();
        let factory: Factory = Arc::new(move |kernel: &Kernel, options: &Value| {
            let module = factory(options).map_err(|e| KernelError::Procedure {
                name: label.clone(),
                reason: Arc::new(e),
            })?;
            kernel.add(module)
        });
        self.factories.push((name, factory));
        self
    }

    /// Define a factory building `M` from its `Default`
    pub fn define_default<M: Module + Default>(self, name: impl Into<String>) -> Self {
        self.define(name, |_| Ok(M::default()))
    }

    /// Define a procedure run by [`Loader::exec`]
    pub fn procedure<F, Fut>(mut self, name: impl Into<String>, procedure: F) -> Self
    where
        F: Fn(Kernel) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let procedure: Procedure = Arc::new(move |kernel: Kernel| procedure(kernel).boxed());
        self.procedures.push((name.into(), procedure));
        self
    }

    /// Names of the factories matching `pattern`, in definition order
    pub fn select(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = wildcard(pattern)?;
        Ok(self
            .factories
            .iter()
            .filter(|(name, _)| matcher.is_match(name))
            .map(|(name, _)| name.clone())
            .collect())
    }

    pub fn load(&self, kernel: &Kernel, pattern: &str) -> Result<Vec<String>> {
        self.load_with(kernel, pattern, &Value::Null)
    }

    /// Instantiate every matching factory with `options` and add the modules.
    pub fn load_with(
        &self,
        kernel: &Kernel,
        pattern: &str,
        options: &Value,
    ) -> Result<Vec<String>> {
        let matcher = wildcard(pattern)?;
        let selected: Vec<_> = self
            .factories
            .iter()
            .filter(|(name, _)| matcher.is_match(name))
            .collect();
        if selected.is_empty() {
            return Err(nothing_matches(pattern));
        }

        let mut added = Vec::with_capacity(selected.len());
        for (name, factory) in selected {
            let module = factory(kernel, options)?;
            tracing::debug!("Loaded module {} from factory {}", module, name);
            added.push(module);
        }
        Ok(added)
    }

    /// Run every matching procedure in order, stopping at the first failure.
    pub async fn exec(&self, kernel: &Kernel, pattern: &str) -> Result<Vec<String>> {
        let matcher = wildcard(pattern)?;
        let selected: Vec<_> = self
            .procedures
            .iter()
            .filter(|(name, _)| matcher.is_match(name))
            .collect();
        if selected.is_empty() {
            return Err(nothing_matches(pattern));
        }

        let mut ran = Vec::with_capacity(selected.len());
        for (name, procedure) in selected {
            tracing::debug!("Running procedure {}", name);
            procedure(kernel.clone())
                .await
                .map_err(|e| KernelError::Procedure {
                    name: name.clone(),
                    reason: Arc::new(e),
                })?;
            ran.push(name.clone());
        }
        Ok(ran)
    }
}

fn nothing_matches(pattern: &str) -> KernelError {
    KernelError::configuration(format!("nothing matches {}", pattern))
}

fn wildcard(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| KernelError::configuration(format!("invalid pattern {}: {}", pattern, e)))
}
