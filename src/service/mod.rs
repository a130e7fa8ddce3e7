use crate::error::{KernelError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::Arc;

type ServiceFn = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Named synchronous services, exactly one callback per name.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<DashMap<String, Arc<ServiceFn>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        match self.services.entry(name.into()) {
            Entry::Occupied(entry) => Err(KernelError::ServiceAlreadyRegistered {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(callback));
                Ok(())
            }
        }
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.services
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KernelError::NoSuchService {
                name: name.to_string(),
            })
    }

    /// Call the service `name` with `args`
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let callback = self
            .services
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| KernelError::NoSuchService {
                name: name.to_string(),
            })?;
        callback(args).map_err(|e| KernelError::Service {
            name: name.to_string(),
            reason: Arc::new(e),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_register_and_call() {
        let services = ServiceRegistry::new();
        services
            .register("sum", |args| {
                Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
            })
            .unwrap();
        assert_eq!(services.call("sum", &[json!(2), json!(3)]).unwrap(), json!(5));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let services = ServiceRegistry::new();
        services.register("svc", |_| Ok(Value::Null)).unwrap();
        let err = services.register("svc", |_| Ok(Value::Null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
    }

    #[test]
    fn test_unregister() {
        let services = ServiceRegistry::new();
        services.register("svc", |_| Ok(Value::Null)).unwrap();
        services.unregister("svc").unwrap();
        assert!(!services.contains("svc"));
        assert!(matches!(
            services.unregister("svc"),
            Err(KernelError::NoSuchService { .. })
        ));
        assert!(matches!(
            services.call("svc", &[]),
            Err(KernelError::NoSuchService { .. })
        ));
    }

    #[test]
    fn test_failing_service() {
        let services = ServiceRegistry::new();
        services
            .register("fail", |_| Err(anyhow::anyhow!("nope")))
            .unwrap();
        let err = services.call("fail", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invocation);
    }
}
