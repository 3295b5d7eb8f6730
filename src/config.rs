//! Sorting configuration.

use std::path::{Path, PathBuf};

use crate::compare::{self, Collation, Comparer, Order};

/// Memory budget used when a zero budget is configured (64 MiB).
pub const DEFAULT_MEMORY_BUDGET: u64 = 64 * 1024 * 1024;
/// Maximum number of simultaneously open chunk cursors used when the configured value is below 2.
///
/// Every open cursor holds one file descriptor, the merge output holds one more. The default stays well
/// under the common `RLIMIT_NOFILE` soft limit of 1024 descriptors.
pub const DEFAULT_MAX_CURSORS: usize = 50;
/// Default chunk file name prefix.
pub const DEFAULT_CHUNK_PREFIX: &str = "chunk";
/// Lower bound of any read or write buffer.
pub const MIN_IO_BUF_SIZE: usize = 64;

/// Immutable configuration of a single sort.
#[derive(Debug, Clone)]
pub struct SortConfig {
    entry: PathBuf,
    output: PathBuf,
    workspace: PathBuf,
    memory_budget: u64,
    order: Order,
    collation: Collation,
    max_cursors: usize,
    chunk_prefix: String,
    remove_workspace: bool,
    filter_empty_lines: bool,
    threads_number: Option<usize>,
}

impl SortConfig {
    /// File to be sorted.
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Result file.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Directory chunk files are stored in.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn memory_budget(&self) -> u64 {
        self.memory_budget
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    /// Maximum number of chunk cursors open at the same time (merge fan-in).
    pub fn max_cursors(&self) -> usize {
        self.max_cursors
    }

    pub fn chunk_prefix(&self) -> &str {
        &self.chunk_prefix
    }

    pub fn remove_workspace(&self) -> bool {
        self.remove_workspace
    }

    pub fn filter_empty_lines(&self) -> bool {
        self.filter_empty_lines
    }

    pub fn threads_number(&self) -> Option<usize> {
        self.threads_number
    }

    /// Returns the line comparer for the configured order and collation.
    pub fn comparer(&self) -> Comparer {
        compare::comparer(self.order, self.collation)
    }

    /// Returns the memory plan derived from the budget.
    pub fn memory_plan(&self) -> MemoryPlan {
        MemoryPlan::new(self.memory_budget)
    }
}

/// Sort configuration builder. Provides methods for [`SortConfig`] initialization.
#[derive(Debug, Clone)]
pub struct SortConfigBuilder {
    config: SortConfig,
}

impl SortConfigBuilder {
    /// Creates a builder with default parameters.
    ///
    /// # Arguments
    /// * `entry` - File to be sorted
    /// * `output` - Result file (created or truncated)
    /// * `workspace` - Directory to store chunks in; it is cleared at the start of every sort
    pub fn new<E, O, W>(entry: E, output: O, workspace: W) -> Self
    where
        E: Into<PathBuf>,
        O: Into<PathBuf>,
        W: Into<PathBuf>,
    {
        SortConfigBuilder {
            config: SortConfig {
                entry: entry.into(),
                output: output.into(),
                workspace: workspace.into(),
                memory_budget: DEFAULT_MEMORY_BUDGET,
                order: Order::default(),
                collation: Collation::default(),
                max_cursors: DEFAULT_MAX_CURSORS,
                chunk_prefix: DEFAULT_CHUNK_PREFIX.to_string(),
                remove_workspace: false,
                filter_empty_lines: true,
                threads_number: None,
            },
        }
    }

    /// Sets the total memory budget in bytes. Zero falls back to [`DEFAULT_MEMORY_BUDGET`].
    pub fn with_memory_budget(mut self, bytes: u64) -> SortConfigBuilder {
        self.config.memory_budget = if bytes == 0 { DEFAULT_MEMORY_BUDGET } else { bytes };
        return self;
    }

    pub fn with_order(mut self, order: Order) -> SortConfigBuilder {
        self.config.order = order;
        return self;
    }

    pub fn with_collation(mut self, collation: Collation) -> SortConfigBuilder {
        self.config.collation = collation;
        return self;
    }

    /// Sets the merge fan-in. Values below 2 fall back to [`DEFAULT_MAX_CURSORS`].
    pub fn with_max_cursors(mut self, max_cursors: usize) -> SortConfigBuilder {
        self.config.max_cursors = if max_cursors >= 2 {
            max_cursors
        } else {
            DEFAULT_MAX_CURSORS
        };
        return self;
    }

    /// Sets the chunk file name prefix. An empty prefix falls back to [`DEFAULT_CHUNK_PREFIX`].
    pub fn with_chunk_prefix(mut self, prefix: &str) -> SortConfigBuilder {
        self.config.chunk_prefix = if prefix.is_empty() {
            DEFAULT_CHUNK_PREFIX.to_string()
        } else {
            prefix.to_string()
        };
        return self;
    }

    /// Removes the workspace directory after a successful sort.
    pub fn with_remove_workspace(mut self, remove: bool) -> SortConfigBuilder {
        self.config.remove_workspace = remove;
        return self;
    }

    /// Drops empty lines from the result.
    pub fn with_filter_empty_lines(mut self, filter: bool) -> SortConfigBuilder {
        self.config.filter_empty_lines = filter;
        return self;
    }

    /// Sets number of threads to be used to sort chunk data in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> SortConfigBuilder {
        self.config.threads_number = Some(threads_number);
        return self;
    }

    pub fn build(self) -> SortConfig {
        self.config
    }
}

/// Partitioning of the memory budget between read buffers, write buffers and the sort buffer.
///
/// A tenth of the budget is held back as a safety margin; the remainder is the working size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPlan {
    working_size: u64,
}

impl MemoryPlan {
    pub fn new(budget: u64) -> Self {
        MemoryPlan {
            working_size: ((budget as u128 * 9 + 9) / 10) as u64,
        }
    }

    pub fn working_size(&self) -> u64 {
        self.working_size
    }

    /// Entry file read buffer during the split phase (20%).
    pub fn split_read_buf(&self) -> usize {
        io_buf(self.fraction(2, 10))
    }

    /// Chunk write buffer during the split phase (20%).
    pub fn split_write_buf(&self) -> usize {
        io_buf(self.fraction(2, 10))
    }

    /// Accumulated line bytes that trigger a chunk flush (60%).
    pub fn chunk_threshold(&self) -> usize {
        usize::try_from(self.fraction(6, 10)).unwrap_or(usize::MAX)
    }

    /// Per cursor read buffer of a merge pass over `runs` runs (80% shared fairly).
    pub fn merge_read_buf(&self, runs: usize) -> usize {
        io_buf(self.fraction(8, 10) / runs.max(1) as u64)
    }

    /// Output write buffer of a merge pass (10%).
    pub fn merge_write_buf(&self) -> usize {
        io_buf(self.fraction(1, 10))
    }

    fn fraction(&self, numerator: u64, denominator: u64) -> u64 {
        (self.working_size as u128 * numerator as u128 / denominator as u128) as u64
    }
}

fn io_buf(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX).max(MIN_IO_BUF_SIZE)
}
