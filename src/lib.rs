//! # Microkernel
//!
//! An in-process module orchestrator.
//!
//! Modules declare a name, an optional group, tags and before/after
//! constraints. The kernel orders them once, then walks a fixed ladder of
//! phases, calling each phase's lifecycle method on every module in order on
//! the way up and in reverse order on the way down.
//!
//! ## Features
//!
//! - **Dependency ordering**: before/after references to modules, tags or groups, plus a fixed group sequence
//! - **Phase ladder**: staged, symmetric startup and shutdown with per-step joins
//! - **Hooks**: synchronous extension points folded by reducers, used to wrap every lifecycle call
//! - **Collaborators**: event bus, service registry, resource store and a module loader
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use microkernel::{Kernel, lifecycle, module};
//!
//! #[module(group = "RESOURCE")]
//! #[derive(Default)]
//! pub struct Database;
//!
//! #[lifecycle]
//! impl Database {
//!     async fn boot(&self, _kernel: &Kernel) -> anyhow::Result<()> {
//!         tracing::info!("Opening connection pool");
//!         Ok(())
//!     }
//!
//!     async fn shutdown(&self, _kernel: &Kernel) -> anyhow::Result<()> {
//!         tracing::info!("Closing connection pool");
//!         Ok(())
//!     }
//! }
//!
//! #[module(group = "SERVICE", after = "database")]
//! #[derive(Default)]
//! pub struct Api;
//!
//! #[lifecycle]
//! impl Api {
//!     async fn start(&self, _kernel: &Kernel) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> microkernel::Result<()> {
//!     let kernel = Kernel::builder()
//!         .module(Database)
//!         .module(Api)
//!         .launch("started")
//!         .await?;
//!
//!     // ... application runs ...
//!
//!     kernel.request_phase("dead").await?;
//!     Ok(())
//! }
//! ```

extern crate self as microkernel;

pub mod config;
pub mod error;
pub mod hook;
pub mod kernel;
pub mod lifecycle;
pub mod loader;
pub mod messaging;
pub mod module;
pub mod resolver;
pub mod resource;
pub mod service;

// Re-export core types
pub use config::{KernelConfig, TransitionSpec};
pub use error::{ErrorKind, KernelError, Result};
pub use hook::{HookBus, HookId, HookValue, Reducer};
pub use kernel::{Kernel, KernelBuilder};
pub use lifecycle::{PhaseLadder, ShutdownHandler, StateMachine, shutdown_signal};
pub use loader::Loader;
pub use messaging::{EventBus, SubscriptionId};
pub use module::{Component, LifecycleMethod, Module, ModuleDescriptor};
pub use resolver::DependencyResolver;
pub use resource::ResourceStore;
pub use service::ServiceRegistry;

// Re-export macros
pub use microkernel_macro::{lifecycle, module};

// Re-export commonly used types from dependencies
pub use anyhow;
pub use async_trait::async_trait;
pub use serde_json;

/// Prelude module for convenient imports
///
/// ```
/// use microkernel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{KernelConfig, TransitionSpec};
    pub use crate::error::{ErrorKind, KernelError, Result};
    pub use crate::hook::{HookBus, HookId, HookValue, Reducer};
    pub use crate::kernel::{Kernel, KernelBuilder};
    pub use crate::lifecycle::{
        METHOD_HOOK, RESULT_HOOK, ShutdownHandler, TRANSIT_AFTER_EVENT, TRANSIT_BEFORE_EVENT,
        shutdown_signal,
    };
    pub use crate::loader::Loader;
    pub use crate::module::{Component, LifecycleMethod, Module, ModuleDescriptor};
    pub use crate::{lifecycle, module};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
