//! Sorted runs stored in the workspace.

use std::fmt;
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use crate::reader::LineCursor;

/// Run generation. Runs produced by the splitter belong to the initial generation,
/// runs produced by the n-th batched merge pass belong to `Merge(n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Initial,
    Merge(usize),
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Initial => write!(f, "initial"),
            Generation::Merge(n) => write!(f, "sub{}", n),
        }
    }
}

/// A sorted, newline-delimited file in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    path: PathBuf,
    generation: Generation,
    index: usize,
    lines: u64,
}

impl Chunk {
    /// Creates a chunk descriptor with the conventional file name:
    /// `<prefix>_<index>.tmp` for initial runs and `sub<n>_<prefix>_<index>.tmp` for merged runs.
    pub fn new(workspace: &Path, prefix: &str, generation: Generation, index: usize) -> Self {
        let file_name = match generation {
            Generation::Initial => format!("{}_{}.tmp", prefix, index),
            Generation::Merge(n) => format!("sub{}_{}_{}.tmp", n, prefix, index),
        };

        Chunk {
            path: workspace.join(file_name),
            generation,
            index,
            lines: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of lines stored in the chunk file.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub(crate) fn set_lines(&mut self, lines: u64) {
        self.lines = lines;
    }

    /// Writes lines to the chunk file, one per physical line, through a write buffer of `buf_size` bytes.
    /// Returns the number of lines written.
    pub fn write(&mut self, lines: impl IntoIterator<Item = String>, buf_size: usize) -> io::Result<u64> {
        let file = fs::File::create(&self.path)?;
        let mut chunk_writer = io::BufWriter::with_capacity(buf_size, file);

        let mut written = 0;
        for line in lines.into_iter() {
            chunk_writer.write_all(line.as_bytes())?;
            chunk_writer.write_all(b"\n")?;
            written += 1;
        }
        chunk_writer.flush()?;
        self.lines = written;

        return Ok(written);
    }

    /// Opens a line cursor over the chunk file.
    pub fn open(&self, buf_size: usize, filter_empty: bool) -> io::Result<LineCursor> {
        LineCursor::open(&self.path, buf_size, filter_empty)
    }

    /// Moves the chunk file to `dest`, falling back to copying when the rename is not possible
    /// (e.g. `dest` is on another file system).
    pub fn promote(self, dest: &Path) -> io::Result<()> {
        if fs::rename(&self.path, dest).is_ok() {
            return Ok(());
        }
        fs::copy(&self.path, dest)?;
        fs::remove_file(&self.path)?;

        return Ok(());
    }

    /// Deletes the chunk file.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}
