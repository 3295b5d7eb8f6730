//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SortConfig;
use crate::merger::BoundedMerger;
use crate::splitter::ChunkSplitter;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Entry file does not exist. Raised before the workspace is touched.
    EntryNotFound(PathBuf),
    /// Workspace directory reset or removal error.
    Workspace(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Entry file read error.
    InputError(io::Error),
    /// Chunk, run or output file I/O error.
    IO(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::EntryNotFound(_) => None,
            SortError::Workspace(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::InputError(err) => Some(err),
            SortError::IO(err) => Some(err),
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::EntryNotFound(path) => write!(f, "entry file {} does not exist", path.display()),
            SortError::Workspace(err) => write!(f, "workspace directory operation failed: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::InputError(err) => write!(f, "entry file read error: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
        }
    }
}

/// Sorting phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPhase {
    Validate,
    ResetWorkspace,
    Split,
    Merge,
    CleanupWorkspace,
    Done,
}

impl Display for SortPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortPhase::Validate => "validate",
            SortPhase::ResetWorkspace => "reset workspace",
            SortPhase::Split => "split",
            SortPhase::Merge => "merge",
            SortPhase::CleanupWorkspace => "cleanup workspace",
            SortPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Summary of a successful sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortReport {
    /// Lines read from the entry file, empty ones included.
    pub lines_read: u64,
    /// Lines written to the output file.
    pub lines_written: u64,
    /// Initial runs produced by the split phase.
    pub chunks: usize,
    /// Batched merge generations run before the final merge.
    pub generations: usize,
    /// Whether the workspace directory was removed.
    pub workspace_removed: bool,
}

/// External sorter of newline-delimited text files.
pub struct ExternalSorter {
    config: SortConfig,
    /// Chunk sorting thread pool.
    thread_pool: rayon::ThreadPool,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `config` - Sort configuration, fixed for the lifetime of the sorter
    pub fn new(config: SortConfig) -> Result<Self, SortError> {
        let thread_pool = Self::init_thread_pool(config.threads_number())?;

        return Ok(ExternalSorter { config, thread_pool });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, SortError> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Sorts the entry file into the output file.
    ///
    /// Phases run strictly in sequence: validate, reset workspace, split, merge and, if configured,
    /// cleanup. On failure the workspace is left as is.
    pub fn sort(&self) -> Result<SortReport, SortError> {
        let config = &self.config;
        let plan = config.memory_plan();
        let compare = config.comparer();

        let mut phase = SortPhase::Validate;
        let mut report = SortReport {
            lines_read: 0,
            lines_written: 0,
            chunks: 0,
            generations: 0,
            workspace_removed: false,
        };
        let mut chunks = Vec::new();

        loop {
            log::info!("sort phase: {}", phase);

            phase = match phase {
                SortPhase::Validate => {
                    if !config.entry().is_file() {
                        log::error!("entry file {} does not exist", config.entry().display());
                        return Err(SortError::EntryNotFound(config.entry().to_path_buf()));
                    }
                    SortPhase::ResetWorkspace
                }
                SortPhase::ResetWorkspace => {
                    reset_workspace(config.workspace()).map_err(SortError::Workspace)?;
                    log::info!("using {} as a workspace directory", config.workspace().display());
                    SortPhase::Split
                }
                SortPhase::Split => {
                    let splitter = ChunkSplitter::new(
                        config.workspace(),
                        config.chunk_prefix(),
                        plan,
                        compare,
                        config.filter_empty_lines(),
                        &self.thread_pool,
                    );
                    let output = splitter.split(config.entry())?;
                    report.lines_read = output.lines_read;
                    report.chunks = output.chunks.len();
                    chunks = output.chunks;
                    SortPhase::Merge
                }
                SortPhase::Merge => {
                    let merger = BoundedMerger::new(
                        config.workspace(),
                        config.chunk_prefix(),
                        plan,
                        compare,
                        config.max_cursors(),
                    )
                    .with_filter_empty(config.filter_empty_lines())
                    .with_remove_consumed(config.remove_workspace());

                    let output = merger
                        .merge(std::mem::take(&mut chunks), config.output())
                        .map_err(SortError::IO)?;
                    report.generations = output.generations;
                    report.lines_written = output.lines_written;

                    if config.remove_workspace() {
                        SortPhase::CleanupWorkspace
                    } else {
                        SortPhase::Done
                    }
                }
                SortPhase::CleanupWorkspace => {
                    remove_workspace(config.workspace()).map_err(SortError::Workspace)?;
                    report.workspace_removed = true;
                    SortPhase::Done
                }
                SortPhase::Done => break,
            };
        }

        log::info!(
            "sorted {} into {} ({} lines read, {} lines written, {} chunks, {} merge generations)",
            config.entry().display(),
            config.output().display(),
            report.lines_read,
            report.lines_written,
            report.chunks,
            report.generations
        );

        return Ok(report);
    }
}

/// Removes the workspace directory if it exists and recreates it empty.
fn reset_workspace(path: &Path) -> io::Result<()> {
    remove_workspace(path)?;
    fs::create_dir_all(path)
}

/// Removes the workspace directory with everything in it. Missing directory is not an error.
fn remove_workspace(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}
