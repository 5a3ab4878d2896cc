//! Configuration of an [`Uploader`].
//!
//! [`Uploader`]: crate::Uploader
use bytesize::ByteSize;
use http::StatusCode;
use std::borrow::Cow;
use std::time::Duration;

/// Upper bound on the number of chunks an upload is split into.
pub const MAX_CHUNK_COUNT: u64 = 1024;
/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: ByteSize = ByteSize::mib(200);
/// Endpoint that issues tickets for new uploads.
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "/me/videos";
/// Timeout for ticket, progress, finalize, quota and attachment requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// All of the settings an upload is run with.
///
/// Set through [`UploadBuilder`].
///
/// [`UploadBuilder`]: crate::UploadBuilder
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Proposed size of a chunk.
    ///
    /// The size actually used may be larger so that an upload never has more
    /// than [`MAX_CHUNK_COUNT`] chunks.
    pub chunk_size: ByteSize,
    /// Path of the endpoint that creates tickets for new uploads.
    pub upload_endpoint: Cow<'static, str>,
    /// Status expected from the ticket request of a new upload.
    pub ticket_status: StatusCode,
    /// Status expected from the ticket request that replaces the file of an
    /// existing resource.
    pub replace_status: StatusCode,
    /// Status expected from the completion request.
    pub finalize_status: StatusCode,
    /// Timeout applied to every request other than chunk transfers.
    pub request_timeout: Option<Duration>,
    /// Timeout applied to chunk transfers.
    ///
    /// Unlike other requests, a timed out transfer is not an error: the
    /// upload asks the server how much it received and carries on from there.
    pub transfer_timeout: Option<Duration>,
    /// Check the remote free space before creating a ticket.
    pub check_quota: bool,
    /// Ask the service to transcode up to 1080p.
    pub upgrade_to_1080: bool,
    /// Give up after this many consecutive rounds without progress.
    ///
    /// Unset by default, so a transfer keeps retrying for as long as every
    /// progress check succeeds.
    pub stall_limit: Option<u32>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_endpoint: Cow::Borrowed(DEFAULT_UPLOAD_ENDPOINT),
            ticket_status: StatusCode::CREATED,
            replace_status: StatusCode::OK,
            finalize_status: StatusCode::CREATED,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            transfer_timeout: None,
            check_quota: false,
            upgrade_to_1080: false,
            stall_limit: None,
        }
    }
}

impl UploadConfig {
    /// The configured chunk size as the signed proposal taken by
    /// [`plan_chunk_size`](crate::plan::plan_chunk_size).
    pub(crate) fn proposed_chunk_size(&self) -> i64 {
        i64::try_from(self.chunk_size.as_u64()).unwrap_or(i64::MAX)
    }
}
