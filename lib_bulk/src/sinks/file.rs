//! Per-block log files.
//!
//! Every block goes to its own file named after the block's capture time,
//! `bulk<timestamp>.log`. Blocks sealed within the same second would share a
//! name; instead of overwriting, later ones get a sequence suffix
//! (`bulk<timestamp>_1.log`, `bulk<timestamp>_2.log`, ...). The name is
//! claimed with create-new semantics, so two workers never pick the same one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::block::Block;
use crate::core::metrics::Metrics;
use crate::error::BulkError;

use super::pool::{BlockRenderer, QueuedSink};

/// Upper bound on suffixes tried for one timestamp.
const MAX_SUFFIX: u32 = 100_000;

/// Writes each block into a fresh file under `dir`.
#[derive(Debug, Clone)]
pub struct FileWriter {
    dir: PathBuf,
}

impl FileWriter {
    /// Files go to `dir`, which is created on first use if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The file name a block with `timestamp` gets when nothing collides.
    pub fn file_name(timestamp: i64) -> String {
        format!("bulk{}.log", timestamp)
    }

    fn candidate(&self, timestamp: i64, suffix: u32) -> PathBuf {
        match suffix {
            0 => self.dir.join(Self::file_name(timestamp)),
            n => self.dir.join(format!("bulk{}_{}.log", timestamp, n)),
        }
    }

    /// Claims the first free name for `timestamp`.
    fn create(&self, timestamp: i64) -> Result<(PathBuf, File), BulkError> {
        if !self.dir.as_os_str().is_empty() && !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        for suffix in 0..MAX_SUFFIX {
            let path = self.candidate(timestamp, suffix);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name left for timestamp {}", timestamp),
        )
        .into())
    }
}

impl BlockRenderer for FileWriter {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn render(&self, block: &Block) -> Result<(), BulkError> {
        let (path, mut file) = self.create(block.timestamp())?;
        block.write_line(&mut file)?;
        file.flush()?;
        log::trace!("Wrote {} commands to {}", block.len(), path.display());
        Ok(())
    }
}

impl QueuedSink<FileWriter> {
    /// File sink writing into `dir` with `worker_count` workers.
    pub fn in_dir(
        dir: impl Into<PathBuf>,
        metrics: Arc<Metrics>,
        worker_count: usize,
    ) -> Result<Self, BulkError> {
        Self::spawn(FileWriter::new(dir), metrics, worker_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::FileSink;
    use tempfile::tempdir;

    fn block(ts: i64, cmds: &[&str]) -> Block {
        Block::new(ts, cmds.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn writes_block_to_timestamped_file() {
        let dir = tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        writer.render(&block(1700000000, &["cmd1", "cmd2"])).unwrap();

        let contents = fs::read_to_string(dir.path().join("bulk1700000000.log")).unwrap();
        assert_eq!(contents, "bulk: cmd1, cmd2\n");
    }

    #[test]
    fn same_second_blocks_get_suffixes() {
        let dir = tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        writer.render(&block(5, &["a"])).unwrap();
        writer.render(&block(5, &["b"])).unwrap();
        writer.render(&block(5, &["c"])).unwrap();

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("bulk5.log"), "bulk: a\n");
        assert_eq!(read("bulk5_1.log"), "bulk: b\n");
        assert_eq!(read("bulk5_2.log"), "bulk: c\n");
    }

    #[test]
    fn creates_missing_output_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("out").join("blocks");
        FileWriter::new(&nested).render(&block(9, &["x"])).unwrap();
        assert!(nested.join("bulk9.log").is_file());
    }

    #[test]
    fn unwritable_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let err = FileWriter::new(&blocker).render(&block(1, &["x"])).unwrap_err();
        assert!(matches!(err, BulkError::Io(_)));
    }

    #[test]
    fn concurrent_workers_never_overwrite() {
        let dir = tempdir().unwrap();
        let metrics = Arc::new(Metrics::new());
        let sink = FileSink::in_dir(dir.path(), Arc::clone(&metrics), 4).unwrap();
        for i in 0..40 {
            sink.enqueue(Arc::new(block(77, &[&format!("c{i}")]))).unwrap();
        }
        sink.stop();

        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 40);
        assert_eq!(metrics.totals("file").blocks, 40);
    }
}
