use serde::{Deserialize, Serialize};

/// Per-run settings for a [`Vm`](crate::Vm).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Log every fetched instruction at `trace` level.
    pub trace_instructions: bool,
    /// Fail the run once this many instructions have executed.
    pub max_instructions: Option<u64>,
    /// Initial capacity of each typed stack.
    pub stack_capacity: usize,
    /// Maximum number of compiled `LIKE` patterns kept per run. `0` disables caching.
    pub like_cache_capacity: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            trace_instructions: false,
            max_instructions: None,
            stack_capacity: 64,
            like_cache_capacity: 256,
        }
    }
}

impl VmOptions {
    #[must_use]
    pub fn with_max_instructions(mut self, max: u64) -> Self {
        self.max_instructions = Some(max);
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace_instructions = trace;
        self
    }
}
