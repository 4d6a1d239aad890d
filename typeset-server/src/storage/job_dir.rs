//! Job directory storage
//!
//! Every job owns exactly one directory, `<root>/<job id>`, which holds the
//! uploaded inputs and, after a successful render, the artifact. The location
//! is a pure function of the job id, so no lookup table exists.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, pin_mut};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use typeset_core::domain::job::JobId;

/// Chunk size used when streaming an artifact back to a caller
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Errors raised while writing into a job directory
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("upload stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

/// Filesystem-backed job directory store
#[derive(Debug, Clone)]
pub struct JobDirectoryStore {
    root: PathBuf,
}

impl JobDirectoryStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    ///
    /// The root is canonicalized so every resolved location is absolute.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        let root = std::fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a job's directory. Performs no I/O.
    pub fn resolve(&self, id: JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Create the job directory if absent. Repeated calls are no-ops.
    pub async fn ensure(&self, id: JobId) -> Result<PathBuf, std::io::Error> {
        let dir = self.resolve(id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Stream a payload into `<job dir>/<name>` chunk by chunk.
    ///
    /// Returns the number of bytes written. An existing file with the same
    /// name is replaced. When the stream or the write fails the partial file
    /// is removed.
    pub async fn write<S, E>(&self, id: JobId, name: &str, stream: S) -> Result<u64, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let file_name = sanitize_file_name(name)
            .ok_or_else(|| StorageError::InvalidFileName(name.to_string()))?;
        let path = self.ensure(id).await?.join(file_name);

        let result = write_stream(&path, stream).await;
        if result.is_err() {
            let _ = fs::remove_file(&path).await;
        }
        result
    }

    /// Whether `<job dir>/<name>` exists as a regular file
    pub async fn exists(&self, id: JobId, name: &str) -> Result<bool, std::io::Error> {
        match fs::metadata(self.resolve(id).join(name)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Open `<job dir>/<name>` for streaming reads
    pub async fn open_for_read(
        &self,
        id: JobId,
        name: &str,
    ) -> Result<ArtifactFile, std::io::Error> {
        let file = fs::File::open(self.resolve(id).join(name)).await?;
        let size = file.metadata().await?.len();
        Ok(ArtifactFile { file, size })
    }
}

async fn write_stream<S, E>(path: &Path, stream: S) -> Result<u64, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: StdError + Send + Sync + 'static,
{
    let mut file = fs::File::create(path).await?;
    let mut total_bytes: u64 = 0;

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| StorageError::PayloadStream {
            source: Box::new(err),
        })?;
        total_bytes += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(total_bytes)
}

/// Reduce a caller-supplied file name to its final path component.
///
/// Returns `None` when nothing usable remains, which keeps every write
/// inside the job directory.
pub fn sanitize_file_name(name: &str) -> Option<&str> {
    let candidate = name.rsplit(['/', '\\']).next()?.trim();
    match candidate {
        "" | "." | ".." => None,
        valid => Some(valid),
    }
}

/// An opened file inside a job directory
#[derive(Debug)]
pub struct ArtifactFile {
    file: fs::File,
    size: u64,
}

impl ArtifactFile {
    /// Size in bytes when the file was opened
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the file contents in fixed-size chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        futures::stream::try_unfold(self.file, read_chunk)
    }
}

async fn read_chunk(mut file: fs::File) -> Result<Option<(Bytes, fs::File)>, std::io::Error> {
    let mut buf = BytesMut::zeroed(READ_CHUNK_BYTES);
    let read = file.read(&mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    buf.truncate(read);
    Ok(Some((buf.freeze(), file)))
}
