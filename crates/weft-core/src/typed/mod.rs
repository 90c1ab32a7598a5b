//! Typed - typed job API.
//!
//! Job types are Rust types with a `TYPE` name; the code that runs them is
//! a `Handler<T>` registered with the queue. Nothing is looked up by class
//! name at runtime beyond the registry map.
//!
//! # Two layers
//! - **Typed**: `Job`, `Handler<T>` - what applications implement
//! - **Dyn**: `DynHandler` - object-safe, what the registry stores

pub mod context;
pub mod handler;
pub mod job;
pub mod registry;

#[cfg(test)]
pub(crate) mod fixtures;

pub use self::context::JobContext;
pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::job::Job;
pub use self::registry::{JobRegistry, RegistryError};
