//! Lifecycle Module
//!
//! The phase ladder and the engine that walks it.
//!
//! # Lifecycle Phases
//!
//! ```text
//! dead
//!  ↓ boot          ↑ shutdown
//! booted
//!  ↓ latch         ↑ unlatch
//! latched
//!  ↓ configure     ↑ reset
//! configured
//!  ↓ prepare       ↑ release
//! prepared
//!  ↓ start         ↑ stop
//! started
//! ```
//!
//! Going up, each step calls its `enter` method on every module in execution
//! order. Going down, each step calls its `leave` method in reverse order.
//! Modules without the method are skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use microkernel::{Component, Kernel};
//!
//! let kernel = Kernel::new();
//! kernel.add(Component::named("db").on("boot", |_| async {
//!     tracing::info!("Opening database connection");
//!     Ok(())
//! }))?;
//!
//! kernel.request_phase("started").await?;
//! // ... application runs ...
//! kernel.request_phase("dead").await?;
//! ```

mod machine;
mod phase;
mod shutdown;

pub use machine::{
    METHOD_HOOK, RESULT_HOOK, StateMachine, TOPOSORT_EVENT, TRANSIT_AFTER_EVENT,
    TRANSIT_BEFORE_EVENT,
};
pub use phase::{Direction, Phase, PhaseLadder, PhaseStep};
pub use shutdown::{ShutdownHandler, shutdown_signal};
