//! Bounded fan-in merger.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use crate::chunk::{Chunk, Generation};
use crate::compare::Comparer;
use crate::config::MemoryPlan;
use crate::reader::{CursorEvent, LineCursor};

/// Result of a complete merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutput {
    /// Number of batched merge generations run before the final pass.
    pub generations: usize,
    /// Number of merge passes (group merges and the final merge).
    pub passes: usize,
    /// Number of lines in the output file.
    pub lines_written: u64,
}

/// Frontier entry: the pending line of a single cursor.
struct FrontierEntry {
    line: String,
    cursor: usize,
    compare: Comparer,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    // binary heap is max-heap so the order is reversed to pop the comparer minimum first,
    // ties go to the lower cursor index
    fn cmp(&self, other: &Self) -> Ordering {
        (self.compare)(&self.line, &other.line)
            .then_with(|| self.cursor.cmp(&other.cursor))
            .reverse()
    }
}

/// Pending lines of the active cursors, at most one per cursor.
struct Frontier {
    entries: BinaryHeap<FrontierEntry>,
    compare: Comparer,
}

impl Frontier {
    fn new(compare: Comparer, cursors: usize) -> Self {
        Frontier {
            entries: BinaryHeap::with_capacity(cursors),
            compare,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, cursor: usize, line: String) {
        self.entries.push(FrontierEntry {
            line,
            cursor,
            compare: self.compare,
        });
    }

    /// Removes and returns the comparer-extreme entry.
    fn pop(&mut self) -> Option<(usize, String)> {
        let entry = self.entries.pop()?;
        Some((entry.cursor, entry.line))
    }
}

/// Merges sorted runs into a single sorted file while keeping at most `max_cursors` runs open at once.
///
/// When there are more runs than the fan-in bound, runs are merged in groups of `max_cursors` into
/// intermediate runs, generation after generation, until the final merge can open every remaining run.
pub struct BoundedMerger<'a> {
    workspace: &'a Path,
    prefix: &'a str,
    plan: MemoryPlan,
    compare: Comparer,
    max_cursors: usize,
    filter_empty: bool,
    remove_consumed: bool,
}

impl<'a> BoundedMerger<'a> {
    /// Creates a new merger.
    ///
    /// # Arguments
    /// * `workspace` - Directory intermediate runs are written to
    /// * `prefix` - Chunk file name prefix
    /// * `plan` - Memory plan the cursor and output buffers are sized from
    /// * `compare` - Function the runs are sorted by
    /// * `max_cursors` - Maximum number of simultaneously open runs, at least 2
    pub fn new(workspace: &'a Path, prefix: &'a str, plan: MemoryPlan, compare: Comparer, max_cursors: usize) -> Self {
        BoundedMerger {
            workspace,
            prefix,
            plan,
            compare,
            max_cursors: max_cursors.max(2),
            filter_empty: false,
            remove_consumed: false,
        }
    }

    /// Drops empty lines while reading runs.
    pub fn with_filter_empty(mut self, filter_empty: bool) -> Self {
        self.filter_empty = filter_empty;
        return self;
    }

    /// Deletes every run as soon as it has been merged.
    pub fn with_remove_consumed(mut self, remove_consumed: bool) -> Self {
        self.remove_consumed = remove_consumed;
        return self;
    }

    /// Merges the runs into `output`.
    pub fn merge(&self, runs: Vec<Chunk>, output: &Path) -> io::Result<MergeOutput> {
        let mut runs = runs;
        let mut generations = 0;
        let mut passes = 0;
        let lines_written;

        while runs.len() > self.max_cursors {
            log::debug!(
                "merge generation {}: {} runs, fan-in {}",
                generations,
                runs.len(),
                self.max_cursors
            );
            let (next, group_passes) = self.merge_generation(runs, generations)?;
            runs = next;
            passes += group_passes;
            generations += 1;
        }

        match runs.len() {
            0 => {
                log::debug!("no runs to merge, creating empty {}", output.display());
                fs::File::create(output)?;
                lines_written = 0;
            }
            1 => {
                let run = runs.remove(0);
                log::debug!("single run {} promoted to {}", run.path().display(), output.display());
                lines_written = run.lines();
                run.promote(output)?;
            }
            _ => {
                lines_written = self.merge_runs(&runs, output)?;
                passes += 1;
                self.consume(runs)?;
            }
        }

        return Ok(MergeOutput {
            generations,
            passes,
            lines_written,
        });
    }

    /// Merges consecutive groups of at most `max_cursors` runs into runs of the given generation.
    /// A trailing group of a single run is carried over unchanged.
    fn merge_generation(&self, runs: Vec<Chunk>, generation: usize) -> io::Result<(Vec<Chunk>, usize)> {
        let mut next = Vec::with_capacity(runs.len() / self.max_cursors + 1);
        let mut passes = 0;
        let mut runs = runs.into_iter().peekable();

        while runs.peek().is_some() {
            let group: Vec<Chunk> = runs.by_ref().take(self.max_cursors).collect();
            if group.len() == 1 {
                next.extend(group);
                continue;
            }

            let mut merged = Chunk::new(self.workspace, self.prefix, Generation::Merge(generation), passes);
            merged.set_lines(self.merge_runs(&group, merged.path())?);
            self.consume(group)?;
            next.push(merged);
            passes += 1;
        }

        return Ok((next, passes));
    }

    /// Single-level k-way merge of `runs` into `output`, one cursor per run.
    ///
    /// Every cursor contributes one line to the frontier and pauses itself. A winner is chosen only when
    /// every still-active cursor has contributed; only the winning cursor is resumed afterwards.
    /// Returns the number of lines written.
    pub fn merge_runs(&self, runs: &[Chunk], output: &Path) -> io::Result<u64> {
        log::debug!("merging {} runs into {}", runs.len(), output.display());

        let read_buf = self.plan.merge_read_buf(runs.len());
        let mut cursors = runs
            .iter()
            .map(|run| run.open(read_buf, self.filter_empty))
            .collect::<io::Result<Vec<LineCursor>>>()?;

        let file = fs::File::create(output)?;
        let mut output_writer = io::BufWriter::with_capacity(self.plan.merge_write_buf(), file);

        let mut frontier = Frontier::new(self.compare, cursors.len());
        let mut active = cursors.len();
        let mut pending: Vec<usize> = (0..cursors.len()).collect();
        let mut written = 0;

        loop {
            for idx in pending.drain(..) {
                let cursor = &mut cursors[idx];
                match cursor.next_event()? {
                    CursorEvent::Line(line) => {
                        cursor.pause();
                        frontier.push(idx, line);
                    }
                    CursorEvent::Finished => active -= 1,
                    CursorEvent::Paused => {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            format!("cursor on {} paused while selected", cursor.path().display()),
                        ))
                    }
                }
            }
            if frontier.len() != active {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("frontier holds {} lines for {} active cursors", frontier.len(), active),
                ));
            }

            let (winner, line) = match frontier.pop() {
                Some(entry) => entry,
                None => break,
            };
            output_writer.write_all(line.as_bytes())?;
            output_writer.write_all(b"\n")?;
            written += 1;

            cursors[winner].resume();
            pending.push(winner);
        }

        output_writer.flush()?;
        log::debug!("merged {} lines into {}", written, output.display());

        return Ok(written);
    }

    fn consume(&self, runs: Vec<Chunk>) -> io::Result<()> {
        if self.remove_consumed {
            for run in runs {
                run.remove()?;
            }
        }
        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::Path;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{BoundedMerger, MergeOutput};
    use crate::chunk::{Chunk, Generation};
    use crate::compare::{comparer, Collation, Order};
    use crate::config::MemoryPlan;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_runs(dir: &Path, runs: Vec<Vec<&str>>) -> Vec<Chunk> {
        runs.into_iter()
            .enumerate()
            .map(|(idx, lines)| {
                let mut chunk = Chunk::new(dir, "chunk", Generation::Initial, idx);
                chunk.write(lines.into_iter().map(String::from), 64).unwrap();
                chunk
            })
            .collect()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(String::from).collect()
    }

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec![vec![], vec![]], vec![])]
    #[case(vec![vec!["b", "d"]], vec!["b", "d"])]
    #[case(
        vec![
            vec!["d", "e", "g"],
            vec!["a", "f"],
            vec!["c"],
            vec![],
        ],
        vec!["a", "c", "d", "e", "f", "g"],
    )]
    #[case(
        vec![
            vec!["a", "b", "b"],
            vec!["b", "c"],
        ],
        vec!["a", "b", "b", "b", "c"],
    )]
    fn test_merge_runs(tmp_dir: tempfile::TempDir, #[case] runs: Vec<Vec<&str>>, #[case] expected: Vec<&str>) {
        let chunks = write_runs(tmp_dir.path(), runs);
        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Asc, Collation::Ordinal);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 10);
        merger.merge(chunks, &output).unwrap();

        assert_eq!(read_lines(&output), expected);
    }

    #[rstest]
    #[case(vec![], 0)]
    #[case(vec![vec!["a", "b", "c"]], 3)]
    #[case(vec![vec!["a", "b"], vec!["c"]], 3)]
    #[case(vec![vec!["e"], vec!["d"], vec!["c"], vec!["b", "a"]], 5)]
    fn test_lines_written(tmp_dir: tempfile::TempDir, #[case] runs: Vec<Vec<&str>>, #[case] expected: u64) {
        let chunks = write_runs(tmp_dir.path(), runs);
        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Asc, Collation::Ordinal);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 3);
        let result = merger.merge(chunks, &output).unwrap();

        assert_eq!(result.lines_written, expected);
        assert_eq!(read_lines(&output).len() as u64, expected);
    }

    #[rstest]
    fn test_merge_descending(tmp_dir: tempfile::TempDir) {
        let chunks = write_runs(tmp_dir.path(), vec![vec!["cherry", "apple"], vec!["banana"]]);
        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Desc, Collation::Locale);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 2);
        let lines = merger.merge_runs(&chunks, &output).unwrap();

        assert_eq!(lines, 3);
        assert_eq!(read_lines(&output), vec!["cherry", "banana", "apple"]);
    }

    #[rstest]
    #[case(2, 10, MergeOutput { generations: 3, passes: 9, lines_written: 200 })]
    #[case(3, 10, MergeOutput { generations: 2, passes: 5, lines_written: 200 })]
    #[case(4, 10, MergeOutput { generations: 1, passes: 4, lines_written: 200 })]
    #[case(10, 10, MergeOutput { generations: 0, passes: 1, lines_written: 200 })]
    #[case(1000, 10, MergeOutput { generations: 0, passes: 1, lines_written: 200 })]
    fn test_bounded_merge(
        tmp_dir: tempfile::TempDir,
        #[case] max_cursors: usize,
        #[case] runs_number: usize,
        #[case] expected_output: MergeOutput,
    ) {
        let mut input: Vec<String> = (0..200).map(|i| format!("line{:04}", i)).collect();
        input.shuffle(&mut rand::thread_rng());

        let mut runs: Vec<Vec<String>> = input.chunks(200 / runs_number).map(|c| c.to_vec()).collect();
        for run in runs.iter_mut() {
            run.sort();
        }
        let chunks: Vec<Chunk> = runs
            .into_iter()
            .enumerate()
            .map(|(idx, lines)| {
                let mut chunk = Chunk::new(tmp_dir.path(), "chunk", Generation::Initial, idx);
                chunk.write(lines, 64).unwrap();
                chunk
            })
            .collect();

        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Asc, Collation::Locale);
        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1), compare, max_cursors);

        let actual_output = merger.merge(chunks, &output).unwrap();

        input.sort();
        assert_eq!(read_lines(&output), input);
        assert_eq!(actual_output, expected_output);
    }

    #[rstest]
    fn test_intermediate_runs(tmp_dir: tempfile::TempDir) {
        let chunks = write_runs(tmp_dir.path(), vec![vec!["e"], vec!["d"], vec!["c"], vec!["b"], vec!["a"]]);
        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Asc, Collation::Ordinal);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 2);
        let result = merger.merge(chunks, &output).unwrap();

        // 5 runs -> sub0 (0, 1) + chunk_4 -> sub1 (0) + chunk_4 -> output
        assert_eq!(result, MergeOutput { generations: 2, passes: 4, lines_written: 5 });
        assert_eq!(read_lines(&output), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(read_lines(&tmp_dir.path().join("sub0_chunk_0.tmp")), vec!["d", "e"]);
        assert_eq!(read_lines(&tmp_dir.path().join("sub0_chunk_1.tmp")), vec!["b", "c"]);
        assert_eq!(read_lines(&tmp_dir.path().join("sub1_chunk_0.tmp")), vec!["b", "c", "d", "e"]);
        assert!(tmp_dir.path().join("chunk_0.tmp").exists());
    }

    #[rstest]
    fn test_remove_consumed(tmp_dir: tempfile::TempDir) {
        let chunks = write_runs(tmp_dir.path(), vec![vec!["c"], vec!["b"], vec!["a"]]);
        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Asc, Collation::Ordinal);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 2)
            .with_remove_consumed(true);
        merger.merge(chunks, &output).unwrap();

        assert_eq!(read_lines(&output), vec!["a", "b", "c"]);
        let leftovers: Vec<_> = fs::read_dir(tmp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec!["out.txt"]);
    }

    #[rstest]
    fn test_filter_empty(tmp_dir: tempfile::TempDir) {
        let chunks = write_runs(tmp_dir.path(), vec![vec!["", "b"], vec!["", "a", ""]]);
        let output = tmp_dir.path().join("out.txt");
        let compare = comparer(Order::Asc, Collation::Ordinal);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 2)
            .with_filter_empty(true);
        merger.merge(chunks, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\n");
    }

    #[rstest]
    fn test_missing_run(tmp_dir: tempfile::TempDir) {
        let mut chunks = write_runs(tmp_dir.path(), vec![vec!["a"], vec!["b"]]);
        chunks.push(Chunk::new(tmp_dir.path(), "chunk", Generation::Initial, 7));
        let compare = comparer(Order::Asc, Collation::Ordinal);

        let merger = BoundedMerger::new(tmp_dir.path(), "chunk", MemoryPlan::new(1024), compare, 5);
        let result = merger.merge(chunks, &tmp_dir.path().join("out.txt"));

        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }
}
