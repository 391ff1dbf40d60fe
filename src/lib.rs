//! `ext-uniq` is an external merge sort for newline-delimited text with duplicate removal.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must
//! be resided in slower external memory, usually a hard disk drive. `ext-uniq` sorts in two passes: during the
//! first pass the input is split into size-bounded chunks that are sorted individually and stored on disk,
//! during the second pass the sorted chunks are merged through a binary min-heap while lines equal to the last
//! emitted one are discarded. The result contains every distinct non-blank input line exactly once, in
//! ascending lexicographic order, with no terminator after the last line. Peak memory consumption is bounded by
//! the chunk size plus one pending line per chunk, independent of the input size.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//!
//! use bytesize::MIB;
//! use env_logger;
//! use log;
//!
//! use ext_uniq::ExternalSorterBuilder;
//!
//! fn main() {
//!     env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();
//!
//!     let input = io::BufReader::new(fs::File::open("input.txt").unwrap());
//!     let output = io::BufWriter::new(fs::File::create("output.txt").unwrap());
//!
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_chunk_size(10 * MIB)
//!         .with_tmp_dir(std::path::Path::new("./"))
//!         .build()
//!         .unwrap();
//!
//!     let summary = sorter.sort(input, output).unwrap();
//!     println!("{} distinct lines written", summary.lines_written);
//! }
//! ```

pub mod chunk;
pub mod heap;
pub mod merger;
pub mod sort;

pub use chunk::{ChunkFile, ChunkWriter, SortedChunk};
pub use heap::{HeapEntry, MinHeap};
pub use merger::{ChunkCursor, MergeEngine};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortSummary, DEFAULT_CHUNK_SIZE};
