//! Engine configuration

/// Tunables for one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Allocations after which the outermost scope exit collects
    pub gc_threshold: usize,
    /// Nested calls allowed before `RangeError`
    pub max_call_depth: usize,
    /// Longest string, in bytes, accepted by the engine and the boundary
    pub max_string_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gc_threshold: 4096,
            max_call_depth: 64,
            max_string_length: (1 << 28) - 1,
        }
    }
}
