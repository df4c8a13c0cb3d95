use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use stowage_protocol::DEFAULT_CHUNK_SIZE;

use crate::plan::ChunkPlan;
use crate::validation::validate_file_name;
use crate::TransferError;

/// One chunk of file data, read into its own buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based ordinal within the file.
    pub index: u64,
    /// Byte position of the payload within the file.
    pub offset: u64,
    /// Raw payload; empty only for the single chunk of a zero-length file.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a file sequentially as the chunk sequence its [`ChunkPlan`]
/// describes.
///
/// Every call to [`next_chunk`](Self::next_chunk) allocates a fresh buffer
/// sized to that chunk's packet, so a caller may hand the chunk to an
/// in-flight request while continuing to read.
pub struct ChunkReader {
    file: File,
    plan: ChunkPlan,
    next_index: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            plan: ChunkPlan::new(file_size, chunk_size),
            next_index: 0,
        })
    }

    /// The plan this reader walks.
    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }

    /// Reads the next chunk. Returns `None` once every planned chunk has
    /// been produced.
    ///
    /// A zero-length file yields exactly one empty chunk.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.next_index >= self.plan.total_chunks() {
            return Ok(None);
        }
        let spec = self.plan.spec(self.next_index);
        let mut data = vec![0u8; spec.size as usize];
        self.file.read_exact(&mut data)?;
        self.next_index += 1;
        Ok(Some(Chunk {
            index: spec.index,
            offset: spec.offset,
            data,
        }))
    }

    /// Chunks not yet produced.
    pub fn remaining(&self) -> u64 {
        self.plan.total_chunks() - self.next_index
    }
}

// ---------------------------------------------------------------------------
// ChunkWriter
// ---------------------------------------------------------------------------

/// Writes chunk payloads into files under a data directory at exact byte
/// offsets.
///
/// The destination is created on the first write; subsequent opens never
/// truncate, so previously written regions survive. Every call seeks on
/// its own file handle, so concurrent writes to disjoint ranges of the
/// same file do not share a cursor.
pub struct ChunkWriter {
    data_dir: PathBuf,
}

impl ChunkWriter {
    /// Creates a writer rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The directory uploads are written into.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolves (and validates) the on-disk path for `file_name`.
    pub fn target_path(&self, file_name: &str) -> Result<PathBuf, TransferError> {
        validate_file_name(file_name)?;
        Ok(self.data_dir.join(file_name))
    }

    /// Persists `payload` at byte position `offset` of the target file
    /// without disturbing other regions.
    pub fn write_chunk(
        &self,
        file_name: &str,
        offset: u64,
        payload: &[u8],
    ) -> Result<(), TransferError> {
        let path = self.target_path(file_name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(payload)?;
        Ok(())
    }

    /// Current on-disk size of the target file.
    pub fn persisted_size(&self, file_name: &str) -> Result<u64, TransferError> {
        let path = self.target_path(file_name)?;
        Ok(std::fs::metadata(path)?.len())
    }

    /// Removes the target file. Returns `false` if it did not exist.
    pub fn remove(&self, file_name: &str) -> Result<bool, TransferError> {
        let path = self.target_path(file_name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn chunk_reader_reads_all() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let mut reader = ChunkReader::open(&path, 4).unwrap();
        assert_eq!(reader.plan().total_chunks(), 3);
        assert_eq!(reader.remaining(), 3);

        let c1 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c1.index, c1.offset), (0, 0));
        assert_eq!(&c1.data, b"AABB");

        let c2 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c2.index, c2.offset), (1, 4));
        assert_eq!(&c2.data, b"CCDD");

        let c3 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c3.index, c3.offset), (2, 8));
        assert_eq!(&c3.data, b"EE");

        assert!(reader.next_chunk().unwrap().is_none());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn chunk_reader_empty_file_yields_one_empty_chunk() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "empty.bin", b"");

        let mut reader = ChunkReader::open(&path, 8).unwrap();
        let c = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c.index, c.offset), (0, 0));
        assert!(c.data.is_empty());
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn chunk_reader_buffers_are_independent() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"01234567");

        let mut reader = ChunkReader::open(&path, 4).unwrap();
        let c1 = reader.next_chunk().unwrap().unwrap();
        let c2 = reader.next_chunk().unwrap().unwrap();
        assert_eq!(&c1.data, b"0123");
        assert_eq!(&c2.data, b"4567");
    }

    #[test]
    fn chunk_reader_zero_chunk_size_uses_default() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"x");
        let reader = ChunkReader::open(&path, 0).unwrap();
        assert_eq!(reader.plan().chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn chunk_writer_writes_at_offset() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        writer.write_chunk("out.bin", 0, b"Hello").unwrap();
        writer.write_chunk("out.bin", 5, b" World").unwrap();

        let content = std::fs::read(dir.path().join("out.bin")).unwrap();
        assert_eq!(&content, b"Hello World");
        assert_eq!(writer.persisted_size("out.bin").unwrap(), 11);
    }

    #[test]
    fn chunk_writer_out_of_order_writes_reassemble() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        writer.write_chunk("out.bin", 5, b" World").unwrap();
        writer.write_chunk("out.bin", 0, b"Hello").unwrap();

        let content = std::fs::read(dir.path().join("out.bin")).unwrap();
        assert_eq!(&content, b"Hello World");
    }

    #[test]
    fn chunk_writer_never_truncates_on_reopen() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        writer.write_chunk("out.bin", 0, b"AAAA").unwrap();
        writer.write_chunk("out.bin", 4, b"BBBB").unwrap();
        // Rewriting an earlier chunk must leave later bytes intact.
        writer.write_chunk("out.bin", 0, b"CCCC").unwrap();

        let content = std::fs::read(dir.path().join("out.bin")).unwrap();
        assert_eq!(&content, b"CCCCBBBB");
    }

    #[test]
    fn chunk_writer_creates_subdirectories() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        writer.write_chunk("sub/dir/file.txt", 0, b"data").unwrap();
        let content = std::fs::read(dir.path().join("sub/dir/file.txt")).unwrap();
        assert_eq!(&content, b"data");
    }

    #[test]
    fn chunk_writer_empty_payload_creates_file() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        writer.write_chunk("empty.bin", 0, b"").unwrap();
        assert_eq!(writer.persisted_size("empty.bin").unwrap(), 0);
    }

    #[test]
    fn chunk_writer_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        let result = writer.write_chunk("../../etc/evil", 0, b"x");
        assert!(matches!(result, Err(TransferError::InvalidFileName(_))));

        let result = writer.write_chunk("/tmp/evil", 0, b"x");
        assert!(matches!(result, Err(TransferError::InvalidFileName(_))));
    }

    #[test]
    fn chunk_writer_remove() {
        let dir = TempDir::new().unwrap();
        let writer = ChunkWriter::new(dir.path());

        writer.write_chunk("gone.bin", 0, b"x").unwrap();
        assert!(writer.remove("gone.bin").unwrap());
        assert!(!writer.remove("gone.bin").unwrap());
    }

    #[test]
    fn reader_writer_roundtrip() {
        let dir = TempDir::new().unwrap();
        let src = create_test_file(
            dir.path(),
            "src.txt",
            b"The quick brown fox jumps over the lazy dog",
        );
        let dst_dir = dir.path().join("dst");

        let mut reader = ChunkReader::open(&src, 10).unwrap();
        let writer = ChunkWriter::new(&dst_dir);
        while let Some(chunk) = reader.next_chunk().unwrap() {
            writer.write_chunk("dst.txt", chunk.offset, &chunk.data).unwrap();
        }

        let result = std::fs::read(dst_dir.join("dst.txt")).unwrap();
        assert_eq!(&result, b"The quick brown fox jumps over the lazy dog");
    }
}
