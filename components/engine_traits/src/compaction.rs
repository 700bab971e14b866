// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

/// Context handed to a factory when a background compaction starts.
#[derive(Debug, Default)]
pub struct CompactionFilterContext {
    pub bottommost_level: bool,
}

/// Consulted for every key/value a background compaction rewrites. Returning
/// `true` elides the entry from the compaction output.
pub trait CompactionFilter: Send {
    fn filter(&mut self, level: usize, key: &[u8], value: &[u8]) -> bool;
}

pub trait CompactionFilterFactory: Send + Sync {
    /// Returns `None` to skip filtering for this compaction run.
    fn create_compaction_filter(
        &self,
        context: &CompactionFilterContext,
    ) -> Option<Box<dyn CompactionFilter>>;
}
