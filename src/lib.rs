//! Wart: a small dependency injection container.
//!
//! Values are registered under string identifiers. Plain values are returned
//! as-is, invocable definitions are resolved once and memoized (shared), or
//! resolved on every access when marked as a factory.
//!
//! ```
//! use wart::{Container, Invocable, Value};
//!
//! let container = Container::new();
//! container.set("greeting", "hello")?;
//! container.set(
//!     "shout",
//!     Invocable::new(|c| {
//!         let greeting = c.get_as::<String>("greeting")?;
//!         Ok(Value::new(greeting.to_uppercase()))
//!     }),
//! )?;
//!
//! assert_eq!(container.get_as::<String>("shout")?.as_str(), "HELLO");
//! # Ok::<(), wart::ContainerError>(())
//! ```

pub mod config;
pub mod container;
pub mod errors;

// Re-export commonly used items for convenience
pub use config::ContainerConfig;
pub use container::{
    Container, ContainerStats, Invocable, ServiceExtender, ServiceLifetime, ServiceProvider,
    Value, WeakContainer,
};
pub use errors::{ConfigError, ContainerError, Result};
