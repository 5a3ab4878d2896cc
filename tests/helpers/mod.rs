pub mod server;
pub use self::server::{MockServer, ServerState};

use resumable_upload::{ByteSize, UploadBuilder, Uploader};
use std::io::Write as _;
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

pub static TRACER: LazyLock<()> = LazyLock::new(|| {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
});

/// An uploader against `server` with chunks of `chunk_size` bytes.
pub fn uploader(server: &MockServer, chunk_size: u64) -> Uploader {
    UploadBuilder::new(server.clone())
        .chunk_size(ByteSize::b(chunk_size))
        .build()
}

/// A temporary `.mp4` file holding `len` bytes of a repeating pattern.
pub fn video_file(len: usize) -> (NamedTempFile, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|n| (n % 251) as u8).collect();
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    (file, data)
}
