//! On-disk chunk storage.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

/// Chunk files are numbered sequentially within the run's temporary
/// directory.
fn chunk_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("chunk_{}.txt", index))
}

/// Incremental writer for one chunk file.
///
/// Lines are appended as they arrive from the input; the writer keeps a
/// running account of `line bytes + 1` (one terminator byte per line) so
/// the caller can close the chunk once the configured threshold is
/// reached.
pub struct ChunkWriter {
    writer: io::BufWriter<fs::File>,
    path: PathBuf,
    index: usize,
    size_limit: u64,
    bytes: u64,
}

impl ChunkWriter {
    /// Creates the chunk file and an instance of a writer over it.
    ///
    /// # Arguments
    /// * `dir` - Directory the chunk file is created in
    /// * `index` - Chunk sequence number, also determines the file name
    /// * `size_limit` - Byte threshold at which the chunk counts as full
    /// * `buf_size` - Write buffer size, defaulted if [`None`]
    pub fn create(dir: &Path, index: usize, size_limit: u64, buf_size: Option<usize>) -> io::Result<Self> {
        let path = chunk_path(dir, index);
        let file = fs::File::create(&path)?;

        let writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        return Ok(ChunkWriter {
            writer,
            path,
            index,
            size_limit,
            bytes: 0,
        });
    }

    /// Appends a line plus its terminator to the chunk file.
    pub fn push(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.bytes += line.len() as u64 + 1;

        return Ok(());
    }

    /// Checks if the accumulated byte count reached the chunk threshold.
    pub fn is_full(&self) -> bool {
        self.bytes >= self.size_limit
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Flushes the chunk file and returns a handle to it.
    pub fn finish(mut self) -> io::Result<ChunkFile> {
        self.writer.flush()?;

        return Ok(ChunkFile {
            path: self.path,
            index: self.index,
        });
    }
}

/// Handle to a completely written but not yet sorted chunk file.
pub struct ChunkFile {
    path: PathBuf,
    index: usize,
}

impl ChunkFile {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Loads the whole chunk into memory, one string per line.
    pub fn read_lines(&self) -> io::Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)?;

        return Ok(Vec::from_iter(content.lines().map(str::to_owned)));
    }

    /// Rewrites the chunk file with the given lines joined by a single
    /// terminator and no trailing terminator. The lines are expected to be
    /// sorted; the returned handle is read-only from here on.
    pub fn rewrite_sorted(self, lines: Vec<String>, buf_size: Option<usize>) -> io::Result<SortedChunk> {
        let file = fs::File::create(&self.path)?;

        let mut writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                writer.write_all(b"\n")?;
            }
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()?;

        return Ok(SortedChunk {
            path: self.path,
            index: self.index,
            lines: lines.len() as u64,
        });
    }
}

/// Handle to a sorted chunk file, owned read-only by the merge phase until
/// the chunk is consumed and removed.
pub struct SortedChunk {
    path: PathBuf,
    index: usize,
    lines: u64,
}

impl SortedChunk {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of lines the chunk holds.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a buffered reader over the chunk file.
    pub fn open(&self, buf_size: Option<usize>) -> io::Result<io::BufReader<fs::File>> {
        let file = fs::File::open(&self.path)?;

        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(reader);
    }

    /// Deletes the chunk file.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::ChunkWriter;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    #[rstest]
    fn test_writer_accounts_terminator_bytes(tmp_dir: tempfile::TempDir) {
        let mut writer = ChunkWriter::create(tmp_dir.path(), 0, 8, None).unwrap();

        writer.push("abc").unwrap();
        assert_eq!(writer.bytes(), 4);
        assert!(!writer.is_full());

        writer.push("def").unwrap();
        assert_eq!(writer.bytes(), 8);
        assert!(writer.is_full());
    }

    #[rstest]
    fn test_chunk_rewrite(tmp_dir: tempfile::TempDir) {
        let mut writer = ChunkWriter::create(tmp_dir.path(), 3, 1024, None).unwrap();
        writer.push("banana").unwrap();
        writer.push("apple").unwrap();

        let chunk = writer.finish().unwrap();
        assert_eq!(chunk.index(), 3);
        assert_eq!(chunk.read_lines().unwrap(), vec!["banana", "apple"]);

        let sorted = chunk
            .rewrite_sorted(vec!["apple".to_owned(), "banana".to_owned()], None)
            .unwrap();
        assert_eq!(sorted.lines(), 2);
        assert_eq!(fs::read_to_string(sorted.path()).unwrap(), "apple\nbanana");
    }

    #[rstest]
    fn test_empty_chunk_rewrite(tmp_dir: tempfile::TempDir) {
        let writer = ChunkWriter::create(tmp_dir.path(), 0, 1024, None).unwrap();

        let sorted = writer.finish().unwrap().rewrite_sorted(Vec::new(), None).unwrap();
        assert_eq!(sorted.lines(), 0);
        assert_eq!(fs::read_to_string(sorted.path()).unwrap(), "");
    }

    #[rstest]
    fn test_chunk_removal(tmp_dir: tempfile::TempDir) {
        let writer = ChunkWriter::create(tmp_dir.path(), 0, 1024, None).unwrap();
        let sorted = writer.finish().unwrap().rewrite_sorted(Vec::new(), None).unwrap();

        let path = sorted.path().to_path_buf();
        assert!(path.exists());

        sorted.remove().unwrap();
        assert!(!path.exists());
    }
}
