//! Sandbox facade, named bindings and the error type
//!
//! - [`engine`]: [`Sandbox`], which owns the heap, the class registry and the
//!   captured terminal
//! - [`bindings`]: ordered name → handle table used by scenarios
//! - [`errors`]: [`SandboxError`]

pub mod bindings;
pub mod engine;
pub mod errors;

pub use bindings::{Binding, Bindings};
pub use engine::Sandbox;
pub use errors::SandboxError;
