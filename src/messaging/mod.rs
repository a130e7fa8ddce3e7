use crate::error::{KernelError, Result};
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one subscription, unique per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Subscriber = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    callback: Subscriber,
}

/// A simple in-memory event bus
///
/// Every subscriber of a published event runs on its own task; publishing
/// completes once all of them have settled.
#[derive(Clone)]
pub struct EventBus {
    // Map of event name -> subscriptions in subscription order
    subscriptions: Arc<DashMap<String, Vec<Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to an event
    pub fn subscribe<F, Fut>(&self, name: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let callback: Subscriber = Arc::new(move |args| callback(args).boxed());
        self.subscriptions
            .entry(name.into())
            .or_default()
            .push(Subscription { id, callback });
        id
    }

    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> Result<()> {
        let missing = || KernelError::NoSuchSubscription {
            name: name.to_string(),
            id: id.0,
        };
        let mut subscriptions = self.subscriptions.get_mut(name).ok_or_else(missing)?;
        let position = subscriptions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(missing)?;
        subscriptions.remove(position);
        Ok(())
    }

    /// Publish an event and wait for every subscriber.
    ///
    /// A failing subscriber does not stop the others; the first failure (in
    /// subscription order) is returned once all have settled.
    pub async fn publish(&self, name: &str, args: Vec<Value>) -> Result<()> {
        let subscribers: Vec<Subscriber> = match self.subscriptions.get(name) {
            Some(subscriptions) => subscriptions
                .iter()
                .map(|s| Arc::clone(&s.callback))
                .collect(),
            None => return Ok(()),
        };

        let handles: Vec<_> = subscribers
            .into_iter()
            .map(|callback| {
                let args = args.clone();
                tokio::spawn(async move { callback(args).await })
            })
            .collect();

        let mut failure = None;
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join) => Err(anyhow::Error::new(join)),
            };
            if let Err(reason) = outcome {
                tracing::debug!("Subscriber of {} failed: {}", name, reason);
                failure.get_or_insert(reason);
            }
        }

        match failure {
            Some(reason) => Err(KernelError::Event {
                name: name.to_string(),
                reason: Arc::new(reason),
            }),
            None => Ok(()),
        }
    }

    /// Publish without waiting, for callers outside async code.
    ///
    /// Does nothing when called outside a tokio runtime.
    pub fn notify(&self, name: &str, args: Vec<Value>) {
        if self.subscriber_count(name) == 0 {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let bus = self.clone();
                let name = name.to_string();
                runtime.spawn(async move {
                    if let Err(e) = bus.publish(&name, args).await {
                        tracing::warn!("Notification failed: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::debug!("No runtime available, dropping notification {}", name);
            }
        }
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.subscriptions.get(name).map_or(0, |s| s.len())
    }
}
