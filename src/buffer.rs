//! Byte limited line buffer.

use rayon;

/// In-memory accumulation buffer limited by the total byte length of the lines it holds.
pub struct LineBuffer {
    limit: usize,
    current_size: usize,
    inner: Vec<String>,
}

impl LineBuffer {
    pub fn new(limit: usize) -> Self {
        LineBuffer {
            limit,
            current_size: 0,
            inner: Vec::new(),
        }
    }

    /// Adds a new line to the buffer.
    pub fn push(&mut self, line: String) {
        self.current_size += line.len();
        self.inner.push(line);
    }

    /// Returns the number of buffered lines.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the accumulated byte length of the buffered lines.
    pub fn mem_size(&self) -> usize {
        self.current_size
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.current_size >= self.limit
    }
}

impl IntoIterator for LineBuffer {
    type Item = String;
    type IntoIter = <Vec<String> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl rayon::slice::ParallelSliceMut<String> for LineBuffer {
    fn as_parallel_slice_mut(&mut self) -> &mut [String] {
        self.inner.as_mut_slice()
    }
}
