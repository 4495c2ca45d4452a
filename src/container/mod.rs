//! Container module

pub mod registry;
pub mod stats;
pub mod value;

pub use registry::{Container, WeakContainer};
pub use stats::ContainerStats;
pub use value::{Invocable, ServiceExtender, ServiceProvider, Value};

/// How a stored invocable is treated by `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// Invoked once, the result is memoized and the slot frozen
    Shared,
    /// Invoked on every access, never memoized
    Factory,
    /// Returned as-is, never invoked
    Protected,
}
