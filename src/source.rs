//! Local sources of upload data.
use crate::error::{ErrorRepr, Result};
use crate::transfer::ByteRange;

use bytes::Bytes;
use std::fmt::{self, Debug, Formatter};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncSeek, AsyncSeekExt as _};

/// Content type of a transfer when nothing better is known.
const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// A byte stream that can be repositioned.
pub trait SeekableRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableRead for T {}

/// Where the bytes of an upload come from.
pub enum UploadSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An open stream that can seek, read from its current position.
    Seekable(Box<dyn SeekableRead>),
    /// An open stream that cannot seek.
    ///
    /// It is read into memory in full when the size of the upload is measured.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// Bytes already in memory.
    Bytes(Bytes),
}

impl UploadSource {
    /// Use an open stream that can seek.
    pub fn seekable<R: SeekableRead + 'static>(reader: R) -> Self {
        Self::Seekable(Box::new(reader))
    }

    /// Use an open stream that cannot seek.
    pub fn stream<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Self {
        Self::Stream(Box::new(reader))
    }

    /// Returns the size of the source in bytes.
    ///
    /// Paths are resolved with `stat` and seekable streams by seeking to the
    /// end and back, so neither is consumed. A stream that cannot seek is
    /// read in full and this source becomes [`UploadSource::Bytes`].
    pub async fn measure_size(&mut self) -> Result<u64> {
        let size = match self {
            Self::Path(path) => tokio::fs::metadata(&path)
                .await
                .map_err(ErrorRepr::from)?
                .len(),
            Self::Seekable(reader) => {
                let start = reader.stream_position().await.map_err(ErrorRepr::from)?;
                let end = reader.seek(SeekFrom::End(0)).await.map_err(ErrorRepr::from)?;
                reader
                    .seek(SeekFrom::Start(start))
                    .await
                    .map_err(ErrorRepr::from)?;
                end.saturating_sub(start)
            }
            Self::Stream(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await.map_err(ErrorRepr::from)?;
                let size = buf.len() as u64;
                *self = Self::Bytes(Bytes::from(buf));
                size
            }
            Self::Bytes(bytes) => bytes.len() as u64,
        };
        trace!(size, source = ?self, "measured source size");
        Ok(size)
    }

    /// The content type announced when transferring this source.
    pub(crate) fn content_type(&self) -> String {
        let ext = match self {
            Self::Path(path) => path.extension().and_then(|ext| ext.to_str()),
            _ => None,
        };
        match ext {
            Some(ext) => format!("video/{}", ext.to_ascii_lowercase()),
            None => DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    /// The file name of this source, if it has one.
    pub(crate) fn file_name(&self) -> Option<&str> {
        match self {
            Self::Path(path) => path.file_name().and_then(|name| name.to_str()),
            _ => None,
        }
    }

    /// Open the source for reading.
    ///
    /// The returned value owns any file handle, which is closed when it is
    /// dropped.
    pub(crate) async fn open(self) -> Result<OpenSource> {
        let reader = match self {
            Self::Path(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(ErrorRepr::from)?;
                Reader::Seekable {
                    inner: Box::new(file),
                    base: 0,
                }
            }
            Self::Seekable(mut inner) => {
                let base = inner.stream_position().await.map_err(ErrorRepr::from)?;
                Reader::Seekable { inner, base }
            }
            Self::Stream(mut inner) => {
                let mut buf = Vec::new();
                inner.read_to_end(&mut buf).await.map_err(ErrorRepr::from)?;
                Reader::Memory(Bytes::from(buf))
            }
            Self::Bytes(bytes) => Reader::Memory(bytes),
        };
        Ok(OpenSource(reader))
    }
}

impl From<PathBuf> for UploadSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for UploadSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<&str> for UploadSource {
    fn from(value: &str) -> Self {
        Self::Path(PathBuf::from(value))
    }
}

impl From<String> for UploadSource {
    fn from(value: String) -> Self {
        Self::Path(PathBuf::from(value))
    }
}

impl From<Bytes> for UploadSource {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl Debug for UploadSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Seekable(_) => f.debug_tuple("Seekable").field(&"SeekableRead").finish(),
            Self::Stream(_) => f.debug_tuple("Stream").field(&"AsyncRead").finish(),
            Self::Bytes(bytes) => f
                .debug_tuple("Bytes")
                .field(&format_args!("{} bytes", bytes.len()))
                .finish(),
        }
    }
}

enum Reader {
    Seekable {
        inner: Box<dyn SeekableRead>,
        base: u64,
    },
    Memory(Bytes),
}

/// An opened [`UploadSource`] that chunks are read from.
pub(crate) struct OpenSource(Reader);

impl OpenSource {
    /// Read exactly the bytes in `range`.
    pub(crate) async fn read_range(&mut self, range: &ByteRange) -> io::Result<Bytes> {
        let len = usize::try_from(range.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk too large"))?;
        match &mut self.0 {
            Reader::Seekable { inner, base } => {
                inner.seek(SeekFrom::Start(*base + range.start)).await?;
                let mut buf = vec![0; len];
                inner.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            Reader::Memory(bytes) => {
                let start = usize::try_from(range.start)
                    .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                let end = start
                    .checked_add(len)
                    .filter(|end| *end <= bytes.len())
                    .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
                Ok(bytes.slice(start..end))
            }
        }
    }
}
