//! # Introduction
//!
//! reftty is an ownership-graph sandbox. Scripted scenarios allocate nodes
//! behind shared, weak and exclusive handles, wire them into graphs and call
//! methods on objects built from a runtime class model. A snapshot of the full
//! sandbox state is captured after every step, and the history is navigated
//! forward and backward through a terminal UI built with
//! [ratatui](https://docs.rs/ratatui).
//!
//! ## Pipeline
//!
//! ```text
//! Scenario → Session → Sandbox (Heap + TypeRegistry) → Snapshots → TUI
//! ```
//!
//! 1. [`memory`]: typed handles over a generational arena
//!    ([`memory::heap::Heap`]) with strong and weak counts, move tracking and
//!    depth-first teardown.
//! 2. [`dispatch`]: classes, sub-object layouts, virtual and static method
//!    resolution, overloads and field access checks.
//! 3. [`sandbox`]: the [`sandbox::Sandbox`] facade tying a heap to a class
//!    registry, plus the error type shared by every module.
//! 4. [`scenario`]: scripted walks and the [`scenario::Session`] that runs
//!    them and owns their snapshot history.
//! 5. [`snapshot`]: snapshot storage with a memory limit and the captured
//!    terminal output.
//! 6. [`ui`]: ratatui-based TUI; not part of the stable library API.

pub mod config;
pub mod dispatch;
pub mod memory;
pub mod sandbox;
pub mod scenario;
pub mod snapshot;
pub mod ui;
