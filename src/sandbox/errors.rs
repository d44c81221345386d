//! Error types for the ownership sandbox
//!
//! This module defines [`SandboxError`], which represents every misuse the
//! sandbox can detect: handle lifetime violations on the heap, member
//! resolution failures in the class model, and history/snapshot failures.
//!
//! All errors are reported synchronously at the point of misuse. None of them
//! are transient; they describe a programming error in the caller.

use crate::memory::handle::{HandleId, HandleKind, NodeId};
use thiserror::Error;

/// Errors raised by the heap, the type registry and the scenario session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    /// Dereferenced a weak handle whose target has been destroyed
    #[error("Expired reference: weak handle {handle} outlived its target")]
    ExpiredReference { handle: HandleId },

    /// Used an exclusive handle after its ownership was transferred
    #[error("Use after move: exclusive handle {handle} was moved from")]
    UseAfterMove { handle: HandleId },

    /// Released a shared (or weak) handle more than once
    #[error("Double release of handle {handle}")]
    DoubleRelease { handle: HandleId },

    /// A member is reachable through more than one distinct sub-object
    #[error("Ambiguous resolution of '{member}': reachable via {}", .paths.join(", "))]
    AmbiguousResolution { member: String, paths: Vec<String> },

    /// Used a handle that was already released
    #[error("Use after release: handle {handle} was already released")]
    UseAfterRelease { handle: HandleId },

    /// The handle was never issued by this heap
    #[error("Unknown handle {handle}")]
    UnknownHandle { handle: HandleId },

    /// The handle's record disagrees with its static kind
    #[error("Handle {handle} is {found}, expected {expected}")]
    KindMismatch {
        handle: HandleId,
        expected: HandleKind,
        found: HandleKind,
    },

    /// The handle belongs to a field of another node and cannot be released directly
    #[error("Handle {handle} is held by a field of node {owner}; clear the field instead")]
    HeldByField { handle: HandleId, owner: NodeId },

    /// The heap reached its node limit
    #[error("Heap capacity exceeded: limit is {limit} live nodes")]
    CapacityExceeded { limit: usize },

    /// A class name was not registered
    #[error("Unknown class '{name}'")]
    UnknownClass { name: String },

    /// A class name was registered twice
    #[error("Class '{name}' is already registered")]
    DuplicateClass { name: String },

    /// A class lists the same direct base twice
    #[error("Class '{class}' lists base '{base}' more than once")]
    DuplicateBase { class: String, base: String },

    /// No field or method with this name is visible from the class
    #[error("Class '{class}' has no member '{member}'")]
    UnknownMember { class: String, member: String },

    /// No overload accepts the argument kinds at the call site
    #[error("No overload of '{member}' accepts ({args})")]
    NoMatchingOverload { member: String, args: String },

    /// Instantiated a class that still has a pure method
    #[error("Cannot instantiate abstract class '{class}': '{method}' has no implementation")]
    AbstractInstantiation { class: String, method: String },

    /// Accessed a private field from outside its declaring class
    #[error("Field '{field}' of class '{class}' is private")]
    AccessViolation { class: String, field: String },

    /// The handle's payload is not an object instance
    #[error("Handle {handle} does not refer to an object")]
    NotAnObject { handle: HandleId },

    /// A method body called back into an object whose method is still running
    #[error("Reentrant call: the object behind handle {handle} is busy running a method")]
    ReentrantCall { handle: HandleId },

    /// A view or qualified path does not exist in the dynamic type
    #[error("Cannot view '{from}' as '{to}'")]
    InvalidCast { from: String, to: String },

    /// A scenario referred to a variable that was never bound
    #[error("Unbound name '{name}'")]
    UnboundName { name: String },

    /// A step that demonstrates a misuse did not fail
    #[error("Expected '{operation}' to fail, but it succeeded")]
    ExpectedFailure { operation: String },

    /// Snapshot history limit exceeded
    #[error("Snapshot memory limit exceeded: {current} bytes used, limit is {limit}")]
    SnapshotLimitExceeded { current: usize, limit: usize },

    /// History/snapshot navigation failed
    #[error("History operation failed: {message}")]
    HistoryOperationFailed { message: String },
}

impl SandboxError {
    /// The handle the error is about, if it concerns a single handle
    pub fn handle(&self) -> Option<HandleId> {
        match self {
            SandboxError::ExpiredReference { handle }
            | SandboxError::UseAfterMove { handle }
            | SandboxError::DoubleRelease { handle }
            | SandboxError::UseAfterRelease { handle }
            | SandboxError::UnknownHandle { handle }
            | SandboxError::KindMismatch { handle, .. }
            | SandboxError::HeldByField { handle, .. }
            | SandboxError::NotAnObject { handle }
            | SandboxError::ReentrantCall { handle } => Some(*handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_paths() {
        let err = SandboxError::AmbiguousResolution {
            member: "eat".to_string(),
            paths: vec!["Bat::Mammal::Animal".to_string(), "Bat::Bird::Animal".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous resolution of 'eat': reachable via Bat::Mammal::Animal, Bat::Bird::Animal"
        );
        assert_eq!(err.handle(), None);
    }

    #[test]
    fn test_handle_accessor() {
        let err = SandboxError::DoubleRelease { handle: HandleId(7) };
        assert_eq!(err.handle(), Some(HandleId(7)));
        assert_eq!(err.to_string(), "Double release of handle #7");
    }
}
