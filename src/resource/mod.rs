use crate::error::{KernelError, Result};
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// Thread-safe key/value store for values shared between modules.
#[derive(Clone, Default)]
pub struct ResourceStore {
    resources: Arc<DashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value, and return it.
    pub fn set<T: 'static + Send + Sync>(&self, key: impl Into<String>, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.resources
            .insert(key.into(), Arc::clone(&value) as Arc<dyn Any + Send + Sync>);
        value
    }

    pub fn resolve<T: 'static + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        let entry = self
            .resources
            .get(key)
            .ok_or_else(|| KernelError::ResourceNotFound {
                key: key.to_string(),
            })?;
        Arc::clone(entry.value())
            .downcast::<T>()
            .map_err(|_| KernelError::ResourceTypeMismatch {
                key: key.to_string(),
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn get<T: 'static + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.resolve(key).ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.resources.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
