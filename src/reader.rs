//! Pausable line cursor.
//!
//! A [`LineCursor`] presents one file as a sequence of logical lines. The consumer pulls lines one at a time
//! with [`LineCursor::next_event`] and may pause the cursor at any moment: pausing suspends emission but keeps
//! every already decoded line queued. The underlying file is read only when the decoded-line queue is empty,
//! so reading can never outrun consumption by more than one read buffer.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, prelude::*};
use std::mem;
use std::path::{Path, PathBuf};

/// Observable cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Lines are emitted on demand, the source is read when the queue runs dry.
    Streaming,
    /// Emission is suspended by the consumer.
    Paused,
    /// The source reached end-of-input, queued lines and the trailing fragment are still pending.
    Draining,
    /// Every line has been emitted and the file handle is released.
    Finished,
    /// A read or decoding error occurred; the cursor is unusable.
    Failed,
}

/// Result of a single pull from a cursor.
#[derive(Debug, PartialEq, Eq)]
pub enum CursorEvent {
    /// The next line in file order.
    Line(String),
    /// The cursor is paused, nothing is emitted until [`LineCursor::resume`] is called.
    Paused,
    /// The cursor has no more lines.
    Finished,
}

/// Buffered, pausable line source over a single file.
pub struct LineCursor {
    path: PathBuf,
    source: Option<fs::File>,
    read_buf: Vec<u8>,
    filter_empty: bool,

    /// Decoded lines not emitted yet.
    lines: VecDeque<String>,
    /// Bytes read but not terminated by a line break yet.
    fragment: Vec<u8>,

    paused: bool,
    exhausted: bool,
    finished: bool,
    failed: bool,
}

impl LineCursor {
    /// Opens a cursor over the file.
    ///
    /// # Arguments
    /// * `path` - File to be read
    /// * `buf_size` - Size of a single read from the file
    /// * `filter_empty` - Drop empty lines instead of emitting them
    pub fn open<P: AsRef<Path>>(path: P, buf_size: usize, filter_empty: bool) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let source = fs::File::open(&path)?;
        log::trace!("line cursor opened on {} (buffer: {})", path.display(), buf_size);

        return Ok(LineCursor {
            path,
            source: Some(source),
            read_buf: vec![0; buf_size.max(1)],
            filter_empty,
            lines: VecDeque::new(),
            fragment: Vec::new(),
            paused: false,
            exhausted: false,
            finished: false,
            failed: false,
        });
    }

    /// Returns the path of the file the cursor reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> CursorState {
        if self.failed {
            CursorState::Failed
        } else if self.finished {
            CursorState::Finished
        } else if self.paused {
            CursorState::Paused
        } else if self.exhausted {
            CursorState::Draining
        } else {
            CursorState::Streaming
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of decoded lines waiting to be emitted.
    pub fn queued(&self) -> usize {
        self.lines.len()
    }

    /// Suspends line emission. Queued lines are kept.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Re-enables line emission.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Pulls the next event from the cursor.
    ///
    /// A paused cursor emits nothing and performs no I/O. Otherwise a queued line is returned if one is
    /// available; the file is only read when the queue is empty. The retained fragment is emitted as the
    /// final line once the file reaches end-of-input.
    pub fn next_event(&mut self) -> io::Result<CursorEvent> {
        if self.failed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("line cursor on {} is in a failed state", self.path.display()),
            ));
        }
        if self.finished {
            return Ok(CursorEvent::Finished);
        }
        if self.paused {
            return Ok(CursorEvent::Paused);
        }

        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(CursorEvent::Line(line));
            }

            if self.exhausted {
                if !self.fragment.is_empty() {
                    let fragment = mem::take(&mut self.fragment);
                    return match self.decode(fragment) {
                        Ok(line) => Ok(CursorEvent::Line(line)),
                        Err(err) => {
                            self.fail();
                            Err(err)
                        }
                    };
                }
                self.finish();
                return Ok(CursorEvent::Finished);
            }

            if let Err(err) = self.fill() {
                self.fail();
                return Err(err);
            }
        }
    }

    /// Performs a single read from the source and queues every complete line it yields.
    fn fill(&mut self) -> io::Result<()> {
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => {
                self.exhausted = true;
                return Ok(());
            }
        };

        let read = loop {
            match source.read(&mut self.read_buf) {
                Ok(read) => break read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };

        if read == 0 {
            self.exhausted = true;
            self.source = None;
            return Ok(());
        }

        self.fragment.extend_from_slice(&self.read_buf[..read]);

        let last_break = match self.fragment.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos,
            None => return Ok(()),
        };
        let tail = self.fragment.split_off(last_break + 1);
        let complete = mem::replace(&mut self.fragment, tail);

        for raw in complete[..last_break].split(|&b| b == b'\n') {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if self.filter_empty && raw.is_empty() {
                continue;
            }
            let line = self.decode(raw.to_vec())?;
            self.lines.push_back(line);
        }

        return Ok(());
    }

    fn decode(&self, raw: Vec<u8>) -> io::Result<String> {
        String::from_utf8(raw).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} contains invalid UTF-8: {}", self.path.display(), err),
            )
        })
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.source = None;
            self.lines.clear();
            log::trace!("line cursor on {} finished", self.path.display());
        }
    }

    fn fail(&mut self) {
        self.failed = true;
        self.source = None;
        self.lines.clear();
        self.fragment.clear();
    }
}

impl Iterator for LineCursor {
    type Item = io::Result<String>;

    /// Returns the next line, resuming the cursor if it was paused.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.resume();

        match self.next_event() {
            Ok(CursorEvent::Line(line)) => Some(Ok(line)),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
