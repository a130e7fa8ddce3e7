use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KernelError>;

/// A failure raised by user code (lifecycle method, hook, subscriber, service).
///
/// Shared so that outcomes can be cloned through the hook bus.
pub type Reason = Arc<anyhow::Error>;

/// Coarse classification of every [`KernelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad phase name, unknown group, malformed descriptor, mutation outside the lowest phase
    Configuration,
    /// Unresolved before/after reference or circular dependency
    Resolution,
    /// Duplicate names and unknown ids/names on removal or lookup
    Registration,
    /// A lifecycle method, hook, subscriber or service failed while running
    Invocation,
}

#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unknown phase: {phase}")]
    UnknownPhase { phase: String },

    #[error("Unknown group {group} on module {module}")]
    UnknownGroup { module: String, group: String },

    #[error("Kernel is not in lowest phase (current: {phase})")]
    NotInLowestPhase { phase: String },

    #[error("Unresolved reference {reference} in module {module}")]
    UnresolvedReference { module: String, reference: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Dependency ordering failed: {0}")]
    Toposort(Box<KernelError>),

    #[error("Module {name} already added")]
    DuplicateModule { name: String },

    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    #[error("Module {name} is not of type {type_name}")]
    ModuleTypeMismatch { name: String, type_name: String },

    #[error("No such hook: {name}")]
    NoSuchHook { name: String },

    #[error("No such latched callback {id} on hook {name}")]
    NoSuchHookRegistration { name: String, id: u64 },

    #[error("No such subscription {id} on event {name}")]
    NoSuchSubscription { name: String, id: u64 },

    #[error("Service already registered: {name}")]
    ServiceAlreadyRegistered { name: String },

    #[error("No such service registered: {name}")]
    NoSuchService { name: String },

    #[error("Resource not found: {key}")]
    ResourceNotFound { key: String },

    #[error("Resource {key} is not of type {type_name}")]
    ResourceTypeMismatch { key: String, type_name: String },

    #[error("{method} failed on module {module}: {reason}")]
    Invocation {
        module: String,
        method: String,
        reason: Reason,
    },

    #[error("Hook {name} failed: {reason}")]
    Hook { name: String, reason: Reason },

    #[error("Event {name} delivery failed: {reason}")]
    Event { name: String, reason: Reason },

    #[error("Service {name} failed: {reason}")]
    Service { name: String, reason: Reason },

    #[error("Procedure {name} failed: {reason}")]
    Procedure { name: String, reason: Reason },
}

impl KernelError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invocation(
        module: impl Into<String>,
        method: impl Into<String>,
        reason: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Invocation {
            module: module.into(),
            method: method.into(),
            reason: Arc::new(reason.into()),
        }
    }

    pub fn hook(name: impl Into<String>, reason: impl Into<anyhow::Error>) -> Self {
        Self::Hook {
            name: name.into(),
            reason: Arc::new(reason.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. }
            | Self::UnknownPhase { .. }
            | Self::UnknownGroup { .. }
            | Self::NotInLowestPhase { .. } => ErrorKind::Configuration,
            Self::UnresolvedReference { .. } | Self::CircularDependency { .. } => {
                ErrorKind::Resolution
            }
            Self::Toposort(inner) => inner.kind(),
            Self::DuplicateModule { .. }
            | Self::ModuleNotFound { .. }
            | Self::ModuleTypeMismatch { .. }
            | Self::NoSuchHook { .. }
            | Self::NoSuchHookRegistration { .. }
            | Self::NoSuchSubscription { .. }
            | Self::ServiceAlreadyRegistered { .. }
            | Self::NoSuchService { .. }
            | Self::ResourceNotFound { .. }
            | Self::ResourceTypeMismatch { .. } => ErrorKind::Registration,
            Self::Invocation { .. }
            | Self::Hook { .. }
            | Self::Event { .. }
            | Self::Service { .. }
            | Self::Procedure { .. } => ErrorKind::Invocation,
        }
    }
}
