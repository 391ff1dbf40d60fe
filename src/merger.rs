//! K-way merge of sorted chunks.

use log;
use std::fs;
use std::io;
use std::io::prelude::*;

use crate::chunk::SortedChunk;
use crate::heap::MinHeap;

/// Output is staged in blocks of this size before being written through.
const OUTPUT_BLOCK_SIZE: usize = 1024 * 1024;

enum CursorState {
    Unopened,
    Open(io::Lines<io::BufReader<fs::File>>),
    Exhausted,
}

/// Sequential single-pass reader over one sorted chunk.
///
/// The underlying file is opened lazily on the first read and released as
/// soon as the last line has been returned, so an exhausted cursor holds
/// no file handle.
pub struct ChunkCursor {
    chunk: SortedChunk,
    buf_size: Option<usize>,
    state: CursorState,
}

impl ChunkCursor {
    pub fn new(chunk: SortedChunk, buf_size: Option<usize>) -> Self {
        ChunkCursor {
            chunk,
            buf_size,
            state: CursorState::Unopened,
        }
    }

    /// Returns the chunk's next line, or [`None`] once the chunk is fully
    /// consumed.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            match &mut self.state {
                CursorState::Unopened => {
                    let reader = self.chunk.open(self.buf_size)?;
                    self.state = CursorState::Open(reader.lines());
                }
                CursorState::Open(lines) => match lines.next() {
                    Some(line) => return Ok(Some(line?)),
                    None => self.state = CursorState::Exhausted,
                },
                CursorState::Exhausted => return Ok(None),
            }
        }
    }

    fn into_chunk(self) -> SortedChunk {
        self.chunk
    }
}

/// Merges sorted chunks into a single sorted, duplicate-free output
/// stream.
///
/// The engine keeps one cursor per chunk and at most one pending line per
/// non-exhausted cursor in a fixed-capacity min-heap. Each extracted
/// minimum is compared against the last emitted line: equal lines are
/// discarded, survivors are appended to a block buffer that is written
/// through once it reaches [`OUTPUT_BLOCK_SIZE`]. The terminator is
/// written before every line but the first, so the output never carries a
/// trailing terminator. Once the heap drains, all chunk files are
/// deleted.
pub struct MergeEngine<W: Write> {
    cursors: Vec<ChunkCursor>,
    heap: MinHeap,
    output: W,
    block: String,
    last_emitted: Option<String>,
    lines_written: u64,
}

impl<W: Write> MergeEngine<W> {
    /// Creates a merge engine over the given sorted chunks.
    ///
    /// # Arguments
    /// * `chunks` - Sorted chunks to be merged, in creation order
    /// * `output` - Stream the merged lines are written to
    /// * `buf_size` - Chunk read buffer size, defaulted if [`None`]
    pub fn new(chunks: Vec<SortedChunk>, output: W, buf_size: Option<usize>) -> Self {
        let heap = MinHeap::with_capacity(chunks.len());
        let cursors = Vec::from_iter(chunks.into_iter().map(|chunk| ChunkCursor::new(chunk, buf_size)));

        MergeEngine {
            cursors,
            heap,
            output,
            block: String::with_capacity(OUTPUT_BLOCK_SIZE),
            last_emitted: None,
            lines_written: 0,
        }
    }

    /// Runs the merge to completion and returns the number of distinct
    /// lines written.
    pub fn run(mut self) -> io::Result<u64> {
        for idx in 0..self.cursors.len() {
            if let Some(line) = self.cursors[idx].next_line()? {
                self.heap.insert(line, idx);
            }
        }
        log::debug!("merge heap initialized (size: {})", self.heap.len());

        while let Some(entry) = self.heap.extract_min() {
            if self.last_emitted.as_deref() != Some(entry.line.as_str()) {
                self.emit(entry.line)?;
            }

            if let Some(next) = self.cursors[entry.chunk_index].next_line()? {
                self.heap.insert(next, entry.chunk_index);
            }
        }

        self.flush_block()?;
        self.output.flush()?;
        log::debug!("merge finished ({} distinct lines)", self.lines_written);

        for cursor in self.cursors {
            cursor.into_chunk().remove()?;
        }

        return Ok(self.lines_written);
    }

    fn emit(&mut self, line: String) -> io::Result<()> {
        if self.lines_written > 0 {
            self.block.push('\n');
        }
        self.block.push_str(&line);
        self.lines_written += 1;
        self.last_emitted = Some(line);

        if self.block.len() >= OUTPUT_BLOCK_SIZE {
            self.flush_block()?;
        }

        return Ok(());
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if !self.block.is_empty() {
            self.output.write_all(self.block.as_bytes())?;
            self.block.clear();
        }

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use rstest::*;

    use crate::chunk::{ChunkWriter, SortedChunk};

    use super::MergeEngine;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    fn sorted_chunk(dir: &Path, index: usize, lines: &[&str]) -> SortedChunk {
        let writer = ChunkWriter::create(dir, index, u64::MAX, None).unwrap();
        let lines = Vec::from_iter(lines.iter().map(|line| line.to_string()));

        writer.finish().unwrap().rewrite_sorted(lines, None).unwrap()
    }

    fn merge(chunks: Vec<SortedChunk>) -> (String, u64) {
        let mut output = Vec::new();
        let lines_written = MergeEngine::new(chunks, &mut output, None).run().unwrap();

        (String::from_utf8(output).unwrap(), lines_written)
    }

    #[rstest]
    fn test_merges_chunks_in_order(tmp_dir: tempfile::TempDir) {
        let chunks = vec![
            sorted_chunk(tmp_dir.path(), 0, &["banana", "cherry"]),
            sorted_chunk(tmp_dir.path(), 1, &["apple", "date"]),
        ];

        let (output, lines_written) = merge(chunks);
        assert_eq!(output, "apple\nbanana\ncherry\ndate");
        assert_eq!(lines_written, 4);
    }

    #[rstest]
    fn test_removes_duplicates_across_chunks(tmp_dir: tempfile::TempDir) {
        let chunks = vec![
            sorted_chunk(tmp_dir.path(), 0, &["a", "b"]),
            sorted_chunk(tmp_dir.path(), 1, &["a", "b"]),
            sorted_chunk(tmp_dir.path(), 2, &["b", "c"]),
        ];

        let (output, lines_written) = merge(chunks);
        assert_eq!(output, "a\nb\nc");
        assert_eq!(lines_written, 3);
    }

    #[rstest]
    fn test_removes_duplicates_within_a_chunk(tmp_dir: tempfile::TempDir) {
        let chunks = vec![sorted_chunk(tmp_dir.path(), 0, &["x", "x", "y"])];

        let (output, _) = merge(chunks);
        assert_eq!(output, "x\ny");
    }

    #[rstest]
    fn test_empty_chunk_contributes_nothing(tmp_dir: tempfile::TempDir) {
        let chunks = vec![
            sorted_chunk(tmp_dir.path(), 0, &[]),
            sorted_chunk(tmp_dir.path(), 1, &["only"]),
        ];

        let (output, lines_written) = merge(chunks);
        assert_eq!(output, "only");
        assert_eq!(lines_written, 1);
    }

    #[rstest]
    fn test_no_chunks_produce_empty_output() {
        let (output, lines_written) = merge(Vec::new());
        assert_eq!(output, "");
        assert_eq!(lines_written, 0);
    }

    #[rstest]
    fn test_chunk_files_removed_after_merge(tmp_dir: tempfile::TempDir) {
        let chunks = vec![
            sorted_chunk(tmp_dir.path(), 0, &["a"]),
            sorted_chunk(tmp_dir.path(), 1, &["b"]),
        ];
        let paths = Vec::from_iter(chunks.iter().map(|chunk| chunk.path().to_path_buf()));

        merge(chunks);

        for path in paths {
            assert!(!path.exists());
        }
    }
}
