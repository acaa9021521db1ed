//! Configuration for the expand resolver.

/// Configuration for the expand resolver.
#[derive(Debug, Clone)]
pub struct ExpandConfig {
    /// Maximum relation-path length.
    pub max_depth: u32,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self { max_depth: 6 }
    }
}

impl ExpandConfig {
    /// Creates a new configuration with the specified max depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}
