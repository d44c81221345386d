//! Dispatch model: classes, layouts, member resolution
//!
//! - [`registry`]: class declarations, sub-object layouts, lookup, overload
//!   selection and final overriders
//! - [`instance`]: object payloads and the receiver passed to method bodies
//! - `call`: running a resolved method against a heap object
//! - [`capability`]: the same behaviors written with native traits

pub(crate) mod call;
pub mod capability;
pub mod instance;
pub mod registry;

pub use instance::{Instance, Receiver};
pub use registry::{ClassDef, Layout, MethodBody, MethodDef, SubobjectInfo, TypeRegistry, Visibility};
