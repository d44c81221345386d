// Limits and defaults for the sandbox

/// Default limit on simultaneously live heap nodes
pub const DEFAULT_MAX_NODES: usize = 4096;

/// Default snapshot history limit (256 MB)
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 256 * 1024 * 1024;

/// Runtime limits for a sandbox session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Maximum number of live nodes in the heap
    pub max_nodes: usize,

    /// Maximum estimated size of the snapshot history in bytes
    pub snapshot_memory_limit: usize,
}

impl SandboxConfig {
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_snapshot_limit(mut self, bytes: usize) -> Self {
        self.snapshot_memory_limit = bytes;
        self
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            max_nodes: DEFAULT_MAX_NODES,
            snapshot_memory_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }
}
