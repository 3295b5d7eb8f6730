//! Chunk splitter.

use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use rayon::slice::ParallelSliceMut;

use crate::buffer::LineBuffer;
use crate::chunk::{Chunk, Generation};
use crate::compare::Comparer;
use crate::config::MemoryPlan;
use crate::sort::SortError;

/// Result of the split phase.
#[derive(Debug)]
pub struct SplitOutput {
    /// Sorted initial runs in creation order.
    pub chunks: Vec<Chunk>,
    /// Number of lines read from the entry file.
    pub lines_read: u64,
}

/// Partitions an entry file into individually sorted chunk files.
pub struct ChunkSplitter<'a> {
    workspace: &'a Path,
    prefix: &'a str,
    plan: MemoryPlan,
    compare: Comparer,
    filter_empty: bool,
    thread_pool: &'a rayon::ThreadPool,
}

impl<'a> ChunkSplitter<'a> {
    /// Creates a new splitter.
    ///
    /// # Arguments
    /// * `workspace` - Directory chunk files are written to
    /// * `prefix` - Chunk file name prefix
    /// * `plan` - Memory plan the read, write and accumulation buffers are sized from
    /// * `compare` - Function to be used to order the lines of a chunk
    /// * `filter_empty` - Drop empty lines while reading
    /// * `thread_pool` - Pool the accumulation buffer is sorted in
    pub fn new(
        workspace: &'a Path,
        prefix: &'a str,
        plan: MemoryPlan,
        compare: Comparer,
        filter_empty: bool,
        thread_pool: &'a rayon::ThreadPool,
    ) -> Self {
        ChunkSplitter {
            workspace,
            prefix,
            plan,
            compare,
            filter_empty,
            thread_pool,
        }
    }

    /// Reads the entry file to exhaustion and flushes a sorted chunk every time the accumulated
    /// line bytes reach the chunk threshold. The last chunk may be undersized.
    pub fn split(&self, entry: &Path) -> Result<SplitOutput, SortError> {
        let file = fs::File::open(entry).map_err(SortError::InputError)?;
        let input = io::BufReader::with_capacity(self.plan.split_read_buf(), file);

        let threshold = self.plan.chunk_threshold();
        log::debug!(
            "splitting {} (chunk threshold: {} bytes)",
            entry.display(),
            threshold
        );

        let mut chunk_buf = LineBuffer::new(threshold);
        let mut chunks = Vec::new();
        let mut lines_read = 0;

        for line in input.lines() {
            let line = line.map_err(SortError::InputError)?;
            lines_read += 1;

            if self.filter_empty && line.is_empty() {
                continue;
            }
            chunk_buf.push(line);

            if chunk_buf.is_full() {
                chunks.push(self.create_chunk(chunk_buf, chunks.len())?);
                chunk_buf = LineBuffer::new(threshold);
            }
        }

        if !chunk_buf.is_empty() {
            chunks.push(self.create_chunk(chunk_buf, chunks.len())?);
        }

        log::debug!("split done ({} lines, {} chunks)", lines_read, chunks.len());

        return Ok(SplitOutput { chunks, lines_read });
    }

    fn create_chunk(&self, mut buffer: LineBuffer, index: usize) -> Result<Chunk, SortError> {
        let compare = self.compare;
        let lines = buffer.len();
        let bytes = buffer.mem_size();

        self.thread_pool.install(|| {
            buffer.par_sort_by(|a, b| compare(a, b));
        });

        let mut chunk = Chunk::new(self.workspace, self.prefix, Generation::Initial, index);
        chunk
            .write(buffer, self.plan.split_write_buf())
            .map_err(SortError::IO)?;

        log::debug!(
            "chunk {} saved ({} lines, {} bytes)",
            chunk.path().display(),
            lines,
            bytes
        );

        return Ok(chunk);
    }
}
