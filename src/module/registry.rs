use super::{Module, ModuleDescriptor};
use crate::error::{KernelError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

struct ModuleEntry {
    descriptor: ModuleDescriptor,
    module: Arc<dyn Module>,
    instance: Option<Arc<dyn Any + Send + Sync>>,
    type_id: Option<TypeId>,
}

/// Registered modules in registration order.
///
/// The registry only stores; phase checks and notifications belong to the
/// [`Kernel`](crate::Kernel) that owns it.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
    by_name: HashMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module whose concrete type is known, enabling typed lookup.
    pub fn insert<M: Module>(&mut self, module: Arc<M>, groups: &[String]) -> Result<String> {
        let instance: Arc<dyn Any + Send + Sync> = Arc::clone(&module) as _;
        self.push(module, Some(instance), Some(TypeId::of::<M>()), groups)
    }

    /// Add a type-erased module.
    pub fn insert_shared(&mut self, module: Arc<dyn Module>, groups: &[String]) -> Result<String> {
        self.push(module, None, None, groups)
    }

    fn push(
        &mut self,
        module: Arc<dyn Module>,
        instance: Option<Arc<dyn Any + Send + Sync>>,
        type_id: Option<TypeId>,
        groups: &[String],
    ) -> Result<String> {
        let descriptor = module.descriptor();
        descriptor.validate(groups)?;
        if self.by_name.contains_key(&descriptor.name) {
            return Err(KernelError::DuplicateModule {
                name: descriptor.name,
            });
        }

        let name = descriptor.name.clone();
        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push(ModuleEntry {
            descriptor,
            module,
            instance,
            type_id,
        });
        Ok(name)
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn Module>> {
        let index = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| KernelError::ModuleNotFound {
                name: name.to_string(),
            })?;
        let entry = self.entries.remove(index);
        self.reindex();
        Ok(entry.module)
    }

    /// Remove every module added with concrete type `M`, in registration order.
    pub fn remove_all<M: Module>(&mut self) -> Vec<(String, Arc<dyn Module>)> {
        let wanted = Some(TypeId::of::<M>());
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if entry.type_id == wanted {
                removed.push((entry.descriptor.name.clone(), Arc::clone(&entry.module)));
                false
            } else {
                true
            }
        });
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.by_name = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.descriptor.name.clone(), index))
            .collect();
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Module>> {
        self.by_name
            .get(name)
            .map(|&index| Arc::clone(&self.entries[index].module))
            .ok_or_else(|| KernelError::ModuleNotFound {
                name: name.to_string(),
            })
    }

    /// Look a module up by name and downcast it to its concrete type.
    pub fn get_as<M: Module>(&self, name: &str) -> Result<Arc<M>> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| KernelError::ModuleNotFound {
                name: name.to_string(),
            })?;
        let mismatch = || KernelError::ModuleTypeMismatch {
            name: name.to_string(),
            type_name: std::any::type_name::<M>().to_string(),
        };
        self.entries[index]
            .instance
            .clone()
            .ok_or_else(mismatch)?
            .downcast::<M>()
            .map_err(|_| mismatch())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> Vec<ModuleDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
