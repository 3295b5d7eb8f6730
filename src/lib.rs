//! `line-ext-sort` sorts newline-delimited text files that are far larger than the available memory.
//!
//! Sorting is achieved in two phases. During the first phase the entry file is split into chunks that fit
//! the memory budget; every chunk is sorted in memory and saved to a workspace directory. During the second
//! phase the sorted chunks are merged together by a k-way merge. The number of simultaneously open chunks
//! is bounded: when there are more chunks than the bound, they are merged in groups into intermediate runs,
//! generation after generation, until a single final merge produces the result.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Memory budget:**
//!   the budget is partitioned between read buffers, write buffers and the in-memory sort buffer.
//! * **Bounded fan-in:**
//!   at most `max_cursors` chunk files are open during a merge pass.
//! * **Backpressure:**
//!   every chunk is read through a [`LineCursor`] that only reads ahead when its decoded lines are consumed.
//! * **Collation:**
//!   locale-aware (Unicode Collation Algorithm) or ordinal ordering, ascending or descending.
//!
//! # Example
//!
//! ```no_run
//! use line_ext_sort::{Collation, ExternalSorter, Order, SortConfigBuilder};
//!
//! fn main() {
//!     let config = SortConfigBuilder::new("input.txt", "output.txt", "./chunks")
//!         .with_memory_budget(500 * 1024 * 1024)
//!         .with_order(Order::Asc)
//!         .with_collation(Collation::Locale)
//!         .with_remove_workspace(true)
//!         .build();
//!
//!     let sorter = ExternalSorter::new(config).unwrap();
//!     sorter.sort().unwrap();
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod compare;
pub mod config;
pub mod merger;
pub mod reader;
pub mod sort;
pub mod splitter;

pub use buffer::LineBuffer;
pub use chunk::{Chunk, Generation};
pub use compare::{comparer, Collation, Comparer, Order};
pub use config::{MemoryPlan, SortConfig, SortConfigBuilder};
pub use merger::{BoundedMerger, MergeOutput};
pub use reader::{CursorEvent, CursorState, LineCursor};
pub use sort::{ExternalSorter, SortError, SortPhase, SortReport};
pub use splitter::{ChunkSplitter, SplitOutput};
