//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use rayon::slice::ParallelSliceMut;

use crate::chunk::{ChunkFile, ChunkWriter, SortedChunk};
use crate::merger::MergeEngine;

/// Default chunk byte threshold (10 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::TempDir(err) => err,
            SortError::ThreadPoolBuildError(err) => err,
            SortError::IO(err) => err,
        })
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
        }
    }
}

/// Counters reported by a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSummary {
    /// Lines consumed from the input, blank ones included.
    pub lines_read: u64,
    /// Chunk files created during the split phase.
    pub chunks: usize,
    /// Distinct lines written to the output.
    pub lines_written: u64,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Chunk byte threshold.
    chunk_size: u64,
    /// Number of threads to be used to sort a chunk in parallel.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.chunk_size,
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.rw_buf_size,
        )
    }

    /// Sets the chunk byte threshold.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> ExternalSorterBuilder {
        self.chunk_size = chunk_size;
        return self;
    }

    /// Sets number of threads to be used to sort a chunk in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            chunk_size: DEFAULT_CHUNK_SIZE,
            threads_number: None,
            tmp_dir: None,
            rw_buf_size: None,
        }
    }
}

/// External sorter.
///
/// Sorts a stream of newline-delimited text in two strictly sequential
/// phases: the split phase writes size-bounded chunks and sorts each one
/// on disk as soon as it is closed, the merge phase streams all sorted
/// chunks through [`MergeEngine`] into the output, dropping duplicate
/// lines. Peak memory stays at one chunk's worth of lines plus one pending
/// line per chunk.
pub struct ExternalSorter {
    /// Chunk byte threshold.
    chunk_size: u64,
    /// Chunk sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `chunk_size` - Chunk byte threshold, counted as line bytes plus one terminator byte per line.
    /// * `threads_number` - Number of threads to be used to sort a chunk in parallel. If the parameter is
    ///   [`None`] threads number will be selected based on available CPU core number.
    /// * `tmp_path` - Directory to be used to store temporary data. If parameter is [`None`] default OS
    ///   temporary directory will be used.
    /// * `rw_buf_size` - Chunk file read/write buffer size.
    pub fn new(
        chunk_size: u64,
        threads_number: Option<usize>,
        tmp_path: Option<&Path>,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, SortError> {
        return Ok(ExternalSorter {
            chunk_size,
            rw_buf_size,
            thread_pool: Self::init_thread_pool(threads_number)?,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
        });
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

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts data from the input stream and writes every distinct line
    /// exactly once, in ascending lexicographic order, to the output
    /// stream. The output carries no terminator after the last line.
    ///
    /// # Arguments
    /// * `input` - Stream the lines to be sorted are fetched from
    /// * `output` - Stream the sorted deduplicated lines are written to
    pub fn sort<R, W>(&self, input: R, output: W) -> Result<SortSummary, SortError>
    where
        R: BufRead,
        W: Write,
    {
        let (chunks, lines_read) = self.split(input)?;
        let chunks_created = chunks.len();

        log::info!("lines read: {}", lines_read);
        log::info!("chunks created: {}", chunks_created);

        let merger = MergeEngine::new(chunks, output, self.rw_buf_size);
        let lines_written = merger.run().map_err(SortError::IO)?;

        log::info!("lines written: {}", lines_written);

        return Ok(SortSummary {
            lines_read,
            chunks: chunks_created,
            lines_written,
        });
    }

    /// Split phase: consumes the input line stream sequentially, closing
    /// and sorting the open chunk whenever the byte threshold is reached.
    /// Chunk writers are created lazily so an input ending exactly at a
    /// chunk boundary leaves no empty chunk file behind.
    fn split<R: BufRead>(&self, input: R) -> Result<(Vec<SortedChunk>, u64), SortError> {
        let mut chunks = Vec::new();
        let mut lines_read = 0u64;
        let mut writer: Option<ChunkWriter> = None;

        for line in input.lines() {
            let mut line = line.map_err(SortError::IO)?;
            if line.ends_with('\r') {
                line.pop();
            }
            lines_read += 1;

            let mut chunk_writer = match writer.take() {
                Some(chunk_writer) => chunk_writer,
                None => ChunkWriter::create(self.tmp_dir.path(), chunks.len(), self.chunk_size, self.rw_buf_size)
                    .map_err(SortError::IO)?,
            };
            chunk_writer.push(&line).map_err(SortError::IO)?;

            if chunk_writer.is_full() {
                let chunk = chunk_writer.finish().map_err(SortError::IO)?;
                chunks.push(self.sort_chunk(chunk)?);
            } else {
                writer = Some(chunk_writer);
            }
        }

        if let Some(chunk_writer) = writer {
            let chunk = chunk_writer.finish().map_err(SortError::IO)?;
            chunks.push(self.sort_chunk(chunk)?);
        }

        return Ok((chunks, lines_read));
    }

    /// Loads a chunk, drops blank and whitespace-only lines, sorts the
    /// rest ascending and rewrites the chunk file sorted. The comparison
    /// is plain `String` ordering, the same one the merge heap uses.
    fn sort_chunk(&self, chunk: ChunkFile) -> Result<SortedChunk, SortError> {
        log::debug!("sorting chunk {} ...", chunk.index());

        let mut lines = chunk.read_lines().map_err(SortError::IO)?;
        lines.retain(|line| !line.trim().is_empty());
        self.thread_pool.install(|| lines.par_sort_unstable());

        let sorted = chunk.rewrite_sorted(lines, self.rw_buf_size).map_err(SortError::IO)?;
        log::debug!("chunk {} sorted ({} lines)", sorted.index(), sorted.lines());

        return Ok(sorted);
    }
}
