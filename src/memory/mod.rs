//! Memory model for the ownership sandbox
//!
//! This module provides the core memory abstractions:
//! - [`handle`]: Copyable shared, weak and exclusive handle tokens
//! - [`heap`]: Generational arena with strong/weak counts, fields and teardown
//! - [`value`]: Payload values (scalars and object instances)
//!
//! # Ownership relations
//!
//! ```text
//! shared    ──► node   strong += 1, destroyed when strong reaches 0
//! weak      ─ ► node   weak += 1, never keeps the node alive
//! exclusive ──► node   one owner, transfer marks the source as moved
//! ```
//!
//! Relations between nodes are named fields. Shared and exclusive fields own
//! their targets and are released when the owning node is torn down; weak
//! fields only observe.

pub mod handle;
pub mod heap;
pub mod value;

pub use handle::{ExclusiveHandle, Handle, HandleId, HandleKind, NodeId, SharedHandle, WeakHandle};
pub use heap::{Edge, Heap, HeapNode, Reclaimed, TeardownEvent, TeardownPhase};
pub use value::{ObjectRef, Value, ValueKind};
